use std::{fmt, io};

/// Error type used by the writer.
///
/// This type is re-exported as `refjson::ser::Error` and is returned by the public
/// writing APIs (for example `refjson::to_string`).
///
/// - `Format` wraps a `std::fmt::Error` produced when writing to a `fmt::Write` target.
/// - `IO` wraps a `std::io::Error` produced when writing to an `io::Write` target.
#[derive(Debug)]
pub enum Error {
    /// Free-form error.
    Message { msg: String },
    /// Wrapper for formatting errors.
    Format { error: fmt::Error },
    /// Wrapper for I/O errors.
    IO { error: io::Error },
    /// Nesting deeper than [`crate::WriterOptions::max_depth`], usually a cycle with
    /// reference handling turned off.
    DepthLimitExceeded { limit: usize },
    /// Error raised by a user converter or self-serializing type.
    Converter { msg: String },
}

impl From<fmt::Error> for Error {
    fn from(error: fmt::Error) -> Self {
        Error::Format { error }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::IO { error }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message { msg: message }
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Message {
            msg: message.to_string(),
        }
    }
}

impl Error {
    /// Error for converters to return.
    #[cold]
    pub fn converter(msg: impl fmt::Display) -> Self {
        Error::Converter { msg: msg.to_string() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Message { msg } => f.write_str(msg),
            Error::Format { error } => write!(f, "formatting error: {error}"),
            Error::IO { error } => write!(f, "I/O error: {error}"),
            Error::DepthLimitExceeded { limit } => {
                write!(f, "nesting exceeds {limit} levels; is there a cycle with references disabled?")
            }
            Error::Converter { msg } => write!(f, "converter failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Format { error } => Some(error),
            Error::IO { error } => Some(error),
            Error::Message { .. } | Error::DepthLimitExceeded { .. } | Error::Converter { .. } => None,
        }
    }
}
