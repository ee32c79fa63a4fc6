//! Time-of-day parsing and the office-hours window.

use crate::config::OfficeHoursConfig;
use crate::error::{Result, SmartClassError};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Minutes since midnight for `HH:MM` or `HH:MM:SS`. Seconds are ignored
/// but must be numeric when present.
pub fn to_minutes(time: &str) -> Result<u32> {
    let malformed = || SmartClassError::Parse(format!("malformed time string {:?}", time));

    let mut parts = time.trim().split(':');
    let (Some(h), Some(m)) = (parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let seconds = parts.next();
    if parts.next().is_some() {
        return Err(malformed());
    }

    let hour: u32 = h.trim().parse().map_err(|_| malformed())?;
    let minute: u32 = m.trim().parse().map_err(|_| malformed())?;
    if let Some(s) = seconds {
        let second: u32 = s.trim().parse().map_err(|_| malformed())?;
        if second > 59 {
            return Err(malformed());
        }
    }
    if hour > 23 || minute > 59 {
        return Err(malformed());
    }

    Ok(hour * 60 + minute)
}

/// Half-open window `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfficeHours {
    start: u32,
    end: u32,
}

impl Default for OfficeHours {
    fn default() -> Self {
        Self {
            start: 8 * 60,
            end: 18 * 60,
        }
    }
}

impl OfficeHours {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start >= end || end > MINUTES_PER_DAY {
            return Err(SmartClassError::InvalidConfig(format!(
                "office hours must satisfy start < end <= {}, got [{}, {})",
                MINUTES_PER_DAY, start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn from_config(config: &OfficeHoursConfig) -> Result<Self> {
        let to_config_err =
            |e: SmartClassError| SmartClassError::InvalidConfig(format!("office hours: {}", e));
        let start = to_minutes(&config.start).map_err(to_config_err)?;
        let end = if config.end.trim() == "24:00" {
            MINUTES_PER_DAY
        } else {
            to_minutes(&config.end).map_err(to_config_err)?
        };
        Self::new(start, end)
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn contains(&self, minutes: u32) -> bool {
        self.start <= minutes && minutes < self.end
    }

    /// Parse and classify in one step.
    pub fn contains_time(&self, time: &str) -> Result<bool> {
        to_minutes(time).map(|m| self.contains(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(to_minutes("08:00").unwrap(), 480);
        assert_eq!(to_minutes("08:00:59").unwrap(), 480);
        assert_eq!(to_minutes("00:00").unwrap(), 0);
        assert_eq!(to_minutes("23:59:59").unwrap(), 1439);
        assert_eq!(to_minutes("7:05").unwrap(), 425);
    }

    #[test]
    fn test_to_minutes_rejects_malformed() {
        for bad in ["", "08", "ab:cd", "24:00", "12:60", "12:00:61", "1:2:3:4", "08:xx:00"] {
            let err = to_minutes(bad).unwrap_err();
            assert!(err.is_parse(), "{:?} should not parse", bad);
        }
    }

    #[test]
    fn test_default_window_is_half_open() {
        let hours = OfficeHours::default();
        assert!(!hours.contains(479));
        assert!(hours.contains(480));
        assert!(hours.contains(1079));
        assert!(!hours.contains(1080));
    }

    #[test]
    fn test_from_config() {
        let hours = OfficeHours::from_config(&OfficeHoursConfig {
            start: "07:30".into(),
            end: "24:00".into(),
        })
        .unwrap();
        assert_eq!(hours.start(), 450);
        assert_eq!(hours.end(), MINUTES_PER_DAY);

        let inverted = OfficeHours::from_config(&OfficeHoursConfig {
            start: "18:00".into(),
            end: "08:00".into(),
        });
        assert!(matches!(inverted, Err(SmartClassError::InvalidConfig(_))));
    }
}
