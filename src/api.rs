//! Entry points for reading documents.

use std::io::Read;

use crate::error::Error;
use crate::input::read_decoded;
use crate::options::Options;
use crate::reader::Reader;
use crate::registry::TypeRegistry;
use crate::types::Ty;
use crate::value::{ObjectRef, Value};

/// Read a document without a declared type.
///
/// Objects become untyped dictionaries unless they carry a type hint naming a registered
/// type.
///
/// ```rust
/// use refjson::{from_str, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// let value = from_str(&registry, r#"{"xs": [1, 2, 3], /* note */ "ok": true}"#).unwrap();
/// assert_eq!(value.member("ok").and_then(|v| v.as_bool()), Some(true));
/// ```
pub fn from_str(registry: &TypeRegistry, input: &str) -> Result<Value, Error> {
    from_str_with_options(registry, input, &Ty::Any, Options::default())
}

/// Read a document into `expected`.
///
/// ```rust
/// use refjson::{from_str_as, Ty, TypeDescriptor, TypeRegistry};
///
/// let registry = TypeRegistry::new().with(
///     TypeDescriptor::class("Point").field("x", Ty::Int).field("y", Ty::Int),
/// );
/// let point = from_str_as(&registry, r#"{"x": 1, "y": "2"}"#, &Ty::named("Point")).unwrap();
/// assert_eq!(point.member("y").and_then(|v| v.as_i64()), Some(2));
/// ```
pub fn from_str_as(registry: &TypeRegistry, input: &str, expected: &Ty) -> Result<Value, Error> {
    from_str_with_options(registry, input, expected, Options::default())
}

/// Read a document without a declared type, optionally in auto-type mode: objects whose type
/// hint names no registered type read as null, and nulls are dropped from arrays and
/// dictionaries.
pub fn from_str_auto(registry: &TypeRegistry, input: &str, auto_type: bool) -> Result<Value, Error> {
    let options = Options {
        auto_type,
        ..Options::default()
    };
    from_str_with_options(registry, input, &Ty::Any, options)
}

/// Read a document into `expected` with custom [`Options`].
///
/// The whole input must be one value; anything but whitespace and comments after it is an
/// error. When `options.with_snippet` is set, returned errors render a source snippet.
pub fn from_str_with_options(
    registry: &TypeRegistry,
    input: &str,
    expected: &Ty,
    options: Options,
) -> Result<Value, Error> {
    let snippet = snippet_radius(&options);
    let mut reader = Reader::new(input, registry, options);
    reader
        .deserialize(expected)
        .map_err(|e| maybe_with_snippet(e, input, snippet))
}

/// Read a document from any [`std::io::Read`]. UTF-8 and UTF-16 input with a byte order mark
/// are decoded; input without one is taken as UTF-8.
pub fn from_reader<R: Read>(registry: &TypeRegistry, reader: R, expected: &Ty) -> Result<Value, Error> {
    from_reader_with_options(registry, reader, expected, Options::default())
}

pub fn from_reader_with_options<R: Read>(
    registry: &TypeRegistry,
    reader: R,
    expected: &Ty,
    options: Options,
) -> Result<Value, Error> {
    let text = read_decoded(reader, options.max_input_bytes)?;
    from_str_with_options(registry, &text, expected, options)
}

/// Read an object document into `target`, an existing instance.
///
/// Members present in the input are overwritten; the rest keep their values.
///
/// ```rust
/// use refjson::{populate_object, Ty, TypeDescriptor, TypeRegistry};
///
/// let registry = TypeRegistry::new().with(
///     TypeDescriptor::class("Settings").field("volume", Ty::Int).field("muted", Ty::Bool),
/// );
/// let settings = registry.instantiate(registry.get("Settings").unwrap()).unwrap();
/// let mut target = settings.as_object().unwrap().clone();
/// target.borrow_mut().insert("volume", refjson::Value::Int(7));
///
/// populate_object(&registry, r#"{"muted": true}"#, &mut target).unwrap();
/// assert_eq!(target.borrow().get("volume"), Some(&refjson::Value::Int(7)));
/// assert_eq!(target.borrow().get("muted"), Some(&refjson::Value::Bool(true)));
/// ```
pub fn populate_object(registry: &TypeRegistry, input: &str, target: &mut ObjectRef) -> Result<(), Error> {
    populate_object_with_options(registry, input, target, Options::default())
}

pub fn populate_object_with_options(
    registry: &TypeRegistry,
    input: &str,
    target: &mut ObjectRef,
    options: Options,
) -> Result<(), Error> {
    let snippet = snippet_radius(&options);
    let mut reader = Reader::new(input, registry, options);
    reader
        .populate_object(target)
        .and_then(|()| reader.finish())
        .map_err(|e| maybe_with_snippet(e, input, snippet))
}

fn snippet_radius(options: &Options) -> Option<usize> {
    (options.with_snippet && options.crop_radius > 0).then_some(options.crop_radius)
}

fn maybe_with_snippet(err: Error, input: &str, crop_radius: Option<usize>) -> Error {
    match crop_radius {
        Some(radius) => err.with_snippet(input, radius),
        None => err,
    }
}
