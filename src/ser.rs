//! Writer error and result types.

pub use crate::ser_error::Error;

/// Result alias for the writing APIs.
pub type Result<T> = std::result::Result<T, Error>;
