use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum SmartClassError {
    /// Malformed message payload or time string. Never retried.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Identity resolution unavailable. Callers degrade to "Unknown".
    #[error("Identity lookup failed: {0}")]
    LookupFailure(String),

    #[error("Store write failed: {0}")]
    StoreWrite(String),

    #[error("Store read failed: {0}")]
    StoreRead(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    MqttClient(#[from] rumqttc::ClientError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl SmartClassError {
    /// Parse failures drop the offending message; everything else is
    /// reported and the consumer keeps going.
    pub fn is_parse(&self) -> bool {
        matches!(self, SmartClassError::Parse(_))
    }
}

pub type Result<T> = std::result::Result<T, SmartClassError>;
