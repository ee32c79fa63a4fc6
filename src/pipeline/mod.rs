//! Event ingestion and state derivation.
//!
//! Three lock domains, never held together:
//! - occupancy baseline (`OccupancyTracker`), held across the usage
//!   read-modify-write
//! - snapshot and latest status (`SnapshotCache`)
//! - attendance check-then-insert (`AttendanceDeduper`)
//!
//! Store calls inside the first and last block other callers of that
//! domain for their duration. At one classroom controller's message rate
//! that is fine; it is the first thing to revisit for more controllers.

pub mod access;
pub mod attendance;
pub mod clock;
pub mod identity;
pub mod occupancy;
pub mod office_hours;
pub mod router;
pub mod snapshot;

pub use access::AccessClassifier;
pub use attendance::{AttendanceDeduper, AttendanceOutcome};
pub use identity::IdentityResolver;
pub use occupancy::{OccupancyState, OccupancyTracker, RolloverMode};
pub use office_hours::OfficeHours;
pub use router::{Dispatch, EventRouter};
pub use snapshot::{CacheSnapshot, SnapshotCache};
