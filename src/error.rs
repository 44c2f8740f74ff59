//! Defines reader errors and their locations.

use std::fmt;

use crate::Location;

/// Grammar construct that was still open when input ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Construct {
    Comment,
    Object,
    Array,
    String,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Construct::Comment => "comment",
            Construct::Object => "object",
            Construct::Array => "array",
            Construct::String => "string",
        })
    }
}

/// What the grammar required at the position where something else was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expected {
    String,
    Object,
    Array,
    PropertyName,
    PropertyNameDelimiter,
    /// A value was required (e.g. after `:`), but a structural token was found.
    Value,
    /// The document ended but more content followed.
    EndOfInput,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Expected::String => "string",
            Expected::Object => "object",
            Expected::Array => "array",
            Expected::PropertyName => "property name",
            Expected::PropertyNameDelimiter => "property name delimiter ':'",
            Expected::Value => "value",
            Expected::EndOfInput => "end of input",
        })
    }
}

/// Error returned by the reader.
///
/// Every grammar and coercion error carries the [`Location`] of the offending input.
/// Errors raised away from the cursor (e.g. by [`crate::coerce`]) start with
/// [`Location::UNKNOWN`] and receive a location from the reader on the way out.
#[derive(Debug)]
pub enum Error {
    /// Unrecognized character sequence.
    MalformedToken {
        found: char,
        /// Short window of the surrounding source text.
        context: String,
        location: Location,
    },
    /// End of input before the closing delimiter of a construct.
    Unterminated {
        construct: Construct,
        location: Location,
    },
    /// Malformed numeric lexeme: bad sign placement or missing digits.
    IllegalNumber { lexeme: String, location: Location },
    /// Token kind does not match the grammar position.
    Expected { expected: Expected, location: Location },
    /// A map-like target type has non-string keys.
    UnsupportedKeyType { type_name: String, location: Location },
    /// Abstract target type without a type hint.
    UninstantiableType { type_name: String, location: Location },
    /// `@`-prefixed string or `@ref`/`@tag` value that is not an integer id.
    MalformedReference { text: String, location: Location },
    /// A forward reference with no reference-typed container that could be patched later.
    DetachedReference { id: usize, location: Location },
    /// References still pending at the end of the document
    /// (only with [`crate::UnresolvedReferencePolicy::Error`]).
    UnresolvedReferences { ids: Vec<usize> },
    /// Value present but not convertible to the statically expected type.
    TypeCoercion {
        value: String,
        target: String,
        location: Location,
    },
    /// Target type cannot be constructed without arguments.
    NoDefaultConstructor { type_name: String, location: Location },
    /// Type hint names a type the registry does not know
    /// (only with `strict_type_hints`).
    UnknownType { type_name: String, location: Location },
    /// Nesting deeper than `max_depth`.
    DepthLimitExceeded { limit: usize, location: Location },
    /// Failure reported by a custom converter.
    Converter { msg: String, location: Location },
    /// Free-form error with optional source location.
    Message { msg: String, location: Location },
    /// Unexpected I/O error. This may happen only when reading from `std::io::Read`.
    IOError { cause: std::io::Error },
    /// Wrap an error with a rendered source snippet.
    WithSnippet {
        /// Pre-rendered snippet output (cropped) for display.
        text: String,
        crop_radius: usize,
        error: Box<Error>,
    },
}

impl Error {
    /// Construct a `TypeCoercion` error with no known location.
    ///
    /// Arguments:
    /// - `value`: short rendering of the offending value.
    /// - `target`: name of the expected type.
    ///
    /// Called by:
    /// - the coercion engine, the reader attaches the location later.
    pub(crate) fn coercion(value: impl Into<String>, target: impl fmt::Display) -> Self {
        Error::TypeCoercion {
            value: value.into(),
            target: target.to_string(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn uninstantiable(type_name: impl Into<String>) -> Self {
        Error::UninstantiableType {
            type_name: type_name.into(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn no_default_constructor(type_name: impl Into<String>) -> Self {
        Error::NoDefaultConstructor {
            type_name: type_name.into(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn unsupported_key_type(type_name: impl Into<String>) -> Self {
        Error::UnsupportedKeyType {
            type_name: type_name.into(),
            location: Location::UNKNOWN,
        }
    }

    /// Construct an error for a custom converter failure.
    pub fn converter<S: Into<String>>(msg: S) -> Self {
        Error::Converter {
            msg: msg.into(),
            location: Location::UNKNOWN,
        }
    }

    fn location_mut(&mut self) -> Option<&mut Location> {
        match self {
            Error::MalformedToken { location, .. }
            | Error::Unterminated { location, .. }
            | Error::IllegalNumber { location, .. }
            | Error::Expected { location, .. }
            | Error::UnsupportedKeyType { location, .. }
            | Error::UninstantiableType { location, .. }
            | Error::MalformedReference { location, .. }
            | Error::DetachedReference { location, .. }
            | Error::TypeCoercion { location, .. }
            | Error::NoDefaultConstructor { location, .. }
            | Error::UnknownType { location, .. }
            | Error::DepthLimitExceeded { location, .. }
            | Error::Converter { location, .. }
            | Error::Message { location, .. } => Some(location),
            Error::UnresolvedReferences { .. } | Error::IOError { .. } => None,
            Error::WithSnippet { error, .. } => error.location_mut(),
        }
    }

    /// Attach/override a concrete location to this error and return it.
    ///
    /// Called by:
    /// - most error paths once the token position becomes known.
    pub(crate) fn with_location(mut self, set_location: Location) -> Self {
        if let Some(location) = self.location_mut() {
            *location = set_location;
        }
        self
    }

    /// Attach a location only if the error does not have one yet.
    ///
    /// Nested reads already know the most precise position; outer frames must not
    /// overwrite it with the position of their own opening token.
    pub(crate) fn or_location(mut self, fallback: impl FnOnce() -> Location) -> Self {
        if let Some(location) = self.location_mut()
            && *location == Location::UNKNOWN
        {
            *location = fallback();
        }
        self
    }

    /// If the error has a known location, return it.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::WithSnippet { error, .. } => error.location(),
            Error::UnresolvedReferences { .. } | Error::IOError { .. } => None,
            Error::MalformedToken { location, .. }
            | Error::Unterminated { location, .. }
            | Error::IllegalNumber { location, .. }
            | Error::Expected { location, .. }
            | Error::UnsupportedKeyType { location, .. }
            | Error::UninstantiableType { location, .. }
            | Error::MalformedReference { location, .. }
            | Error::DetachedReference { location, .. }
            | Error::TypeCoercion { location, .. }
            | Error::NoDefaultConstructor { location, .. }
            | Error::UnknownType { location, .. }
            | Error::DepthLimitExceeded { location, .. }
            | Error::Converter { location, .. }
            | Error::Message { location, .. } => {
                if location != &Location::UNKNOWN {
                    Some(*location)
                } else {
                    None
                }
            }
        }
    }

    /// Return the error without the snippet wrapper, if any.
    pub fn without_snippet(&self) -> &Self {
        match self {
            Error::WithSnippet { error, .. } => error.without_snippet(),
            other => other,
        }
    }

    /// Wrap this error with a snippet rendered from `text`.
    ///
    /// Nested wrappers are not created: an already wrapped error is re-rendered.
    pub(crate) fn with_snippet(self, text: &str, crop_radius: usize) -> Self {
        let inner = match self {
            Error::WithSnippet { error, .. } => *error,
            other => other,
        };
        let rendered = match inner.location() {
            Some(location) => crate::snippet::render(
                text,
                "<input>",
                &inner.message(),
                &location,
                crop_radius,
            ),
            None => inner.to_string(),
        };
        Error::WithSnippet {
            text: rendered,
            crop_radius,
            error: Box::new(inner),
        }
    }

    /// Message text without the location suffix.
    pub(crate) fn message(&self) -> String {
        match self {
            Error::MalformedToken { found, context, .. } => {
                format!("malformed token '{}' near `{context}`", found.escape_debug())
            }
            Error::Unterminated { construct, .. } => format!("unterminated {construct}"),
            Error::IllegalNumber { lexeme, .. } => format!("illegal number `{lexeme}`"),
            Error::Expected { expected, .. } => format!("expected {expected}"),
            Error::UnsupportedKeyType { type_name, .. } => {
                format!("map type {type_name} has non-string keys, object keys are always text")
            }
            Error::UninstantiableType { type_name, .. } => {
                format!("cannot instantiate abstract type {type_name} without a type hint")
            }
            Error::MalformedReference { text, .. } => {
                format!("malformed reference `{text}`, expected an integer id")
            }
            Error::DetachedReference { id, .. } => format!(
                "forward reference @{id} has no enclosing object or array that could be patched later"
            ),
            Error::UnresolvedReferences { ids } => {
                let ids: Vec<String> = ids.iter().map(|id| format!("@{id}")).collect();
                format!("unresolved references: {}", ids.join(", "))
            }
            Error::TypeCoercion { value, target, .. } => {
                format!("cannot convert {value} to {target}")
            }
            Error::NoDefaultConstructor { type_name, .. } => {
                format!("type {type_name} has no default constructor")
            }
            Error::UnknownType { type_name, .. } => format!("unknown type hint `{type_name}`"),
            Error::DepthLimitExceeded { limit, .. } => {
                format!("nesting depth exceeds the limit of {limit}")
            }
            Error::Converter { msg, .. } | Error::Message { msg, .. } => msg.clone(),
            Error::IOError { cause } => format!("IO error: {cause}"),
            Error::WithSnippet { error, .. } => error.message(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WithSnippet {
                text,
                crop_radius,
                error,
            } => {
                if *crop_radius == 0 {
                    // Treat as "snippet disabled".
                    return write!(f, "{error}");
                }
                f.write_str(text)
            }
            other => fmt_with_location(f, &other.message(), other.location()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError { cause } => Some(cause),
            Error::WithSnippet { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(cause: std::io::Error) -> Self {
        Error::IOError { cause }
    }
}

fn fmt_with_location(
    f: &mut fmt::Formatter<'_>,
    msg: &str,
    location: Option<Location>,
) -> fmt::Result {
    match location {
        Some(location) => write!(
            f,
            "{msg} at line {}, column {}",
            location.line, location.column
        ),
        None => f.write_str(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_appends_location() {
        let err = Error::Unterminated {
            construct: Construct::String,
            location: Location::new(3, 7, 20),
        };
        assert_eq!(err.to_string(), "unterminated string at line 3, column 7");
    }

    #[test]
    fn or_location_keeps_existing() {
        let err = Error::coercion("\"x\"", "Int").or_location(|| Location::new(1, 2, 1));
        assert_eq!(err.location(), Some(Location::new(1, 2, 1)));
        let err = err.or_location(|| Location::new(9, 9, 9));
        assert_eq!(err.location(), Some(Location::new(1, 2, 1)));
    }

    #[test]
    fn unresolved_has_no_location() {
        let err = Error::UnresolvedReferences { ids: vec![2, 5] };
        assert_eq!(err.location(), None);
        assert_eq!(err.to_string(), "unresolved references: @2, @5");
    }
}
