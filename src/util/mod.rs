//! Utility modules for s3idx-rs.

pub mod clock;
pub mod single_flight;

pub use clock::{Clock, ManualClock, SystemClock};
pub use single_flight::SingleFlight;
