pub use api::{
    from_reader, from_reader_with_options, from_str, from_str_as, from_str_auto, from_str_with_options,
    populate_object, populate_object_with_options,
};
pub use coerce::{assign_member, coerce_type, set_member_value};
pub use converter::{Converter, ConverterContext, SelfSerializing};
pub use error::{Construct, Error, Expected};
pub use location::Location;
pub use options::{Options, UnresolvedReferencePolicy};
pub use reader::{REF_KEY, Reader, TAG_KEY};
pub use references::{Container, DelayedTarget, ReferenceHandler, Segment};
pub use registry::{MemberMap, TypeRegistry};
pub use token::Token;
pub use types::{MemberDescriptor, Ty, TypeDescriptor, TypeKind};
pub use value::{Array, ArrayRef, EnumValue, Object, ObjectRef, Value};
pub use writer::{Writer, to_fmt_writer, to_string, to_string_as, to_string_with_options, to_writer};
pub use writer_options::{TypeHints, WriterOptions};

/// Default member name of type hints.
pub const DEFAULT_TYPE_HINT: &str = "Class/Type";

mod api;
pub mod coerce;
mod converter;
mod error;
mod input;
mod location;
#[macro_use]
mod macros;
#[cfg(feature = "miette")]
pub mod miette;
pub mod options;
mod parse_scalars;
mod reader;
mod references;
mod registry;
pub mod ser;
mod ser_error;
mod snippet;
mod token;
mod types;
mod value;
mod writer;
mod writer_options;
mod zmij_format;
