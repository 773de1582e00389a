//! Display formatting for sizes and timestamps.

mod datetime;
mod size;

use thiserror::Error;

pub use datetime::{render_datetime, DatetimeFormat};
pub use size::{render_size, SizeFormat};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown size format {0:?} (expected iec, iso or bytes)")]
    UnknownSizeFormat(String),

    #[error("invalid datetime format {0:?}")]
    InvalidDatetimeFormat(String),
}
