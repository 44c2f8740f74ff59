//! Extension points: custom converters and self-serializing types.

use crate::error::Error;
use crate::reader::Reader;
use crate::ser;
use crate::token::Token;
use crate::types::Ty;
use crate::value::{Object, Value};
use crate::writer::Writer;

/// What a converter learns about the slot it is reading.
#[derive(Clone, Copy, Debug)]
pub struct ConverterContext<'t> {
    /// Nesting depth of the value being read (the document root is 1).
    pub depth: usize,
    /// Expected type of the slot.
    pub expected: &'t Ty,
    /// The expected type is only a hint inferred from earlier array elements.
    pub type_is_hint: bool,
    /// Next token; the reader cursor sits right before it.
    pub token: Token,
}

/// Custom conversion for a set of types.
///
/// A converter that claims a type takes over completely: the reader cursor sits right before
/// the value when the reader hands itself over. Converters usually call [`Reader::read`] with a simpler
/// type and build their own value from it, or [`Reader::read_skip_converters`] to delegate
/// back to the default logic.
///
/// ```
/// use refjson::{Converter, ConverterContext, Reader, Ty, Value, TypeRegistry};
///
/// /// Reads `"x,y"` strings into `[x, y]` arrays.
/// struct Pair;
///
/// impl Converter for Pair {
///     fn can_convert(&self, ty: &Ty) -> bool {
///         ty.name() == Some("Pair")
///     }
///
///     fn read(&self, reader: &mut Reader<'_>, _: &ConverterContext<'_>) -> Result<Value, refjson::Error> {
///         let text = reader.read(&Ty::String, false)?;
///         let items = text
///             .as_str()
///             .unwrap_or_default()
///             .split(',')
///             .map(|n| Value::Int(n.trim().parse().unwrap_or_default()))
///             .collect();
///         Ok(Value::array(items))
///     }
/// }
///
/// let registry = TypeRegistry::new();
/// let options = refjson::Options::default().with_converter(Pair);
/// let v = refjson::from_str_with_options(&registry, "\"3, 4\"", &Ty::named("Pair"), options).unwrap();
/// assert_eq!(v, Value::array(vec![Value::Int(3), Value::Int(4)]));
/// ```
pub trait Converter {
    /// Whether this converter handles values of type `ty`.
    fn can_convert(&self, ty: &Ty) -> bool;

    /// Read one value. The cursor sits right before `ctx.token`.
    fn read(&self, reader: &mut Reader<'_>, ctx: &ConverterContext<'_>) -> Result<Value, Error>;

    /// Write one value declared as `declared`. Defaults to the built-in writer.
    fn write(&self, writer: &mut Writer<'_>, value: &Value, declared: &Ty) -> ser::Result<()> {
        writer.write_value_skip_converters(value, declared)
    }
}

/// A type that reads and writes its own representation.
///
/// Attached to a [`crate::TypeDescriptor`] with
/// [`crate::TypeDescriptor::self_serializing`]. On read, a default instance is created first
/// and handed over together with the reader, positioned at the start of the value.
pub trait SelfSerializing: Send + Sync {
    fn read_json(&self, target: &mut Object, reader: &mut Reader<'_>) -> Result<(), Error>;

    fn write_json(&self, source: &Object, writer: &mut Writer<'_>) -> ser::Result<()>;
}
