//! Writer options.
//!
//! Example: pretty-print with four-space indentation and type hints on every object.
//!
//! ```rust
//! use refjson::{to_string_with_options, Object, Ty, TypeHints, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::new();
//! let value = Value::object(Object::dictionary().with("a", Value::Int(1)));
//! let opts = refjson::writer_options! {
//!     pretty: true,
//!     indent_step: 4,
//!     type_hints: TypeHints::Always,
//! };
//! let text = to_string_with_options(&registry, &value, &Ty::Any, opts).unwrap();
//! assert_eq!(text, "{\n    \"a\": 1\n}");
//! ```

use std::rc::Rc;

use crate::converter::Converter;
use crate::types::Ty;

/// When to write the type hint member of an object.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TypeHints {
    /// When the runtime type differs from the declared slot type, or the type asks for it.
    #[default]
    Auto,
    /// On every typed object.
    Always,
    /// Never; polymorphic slots will read back as their declared type.
    Never,
}

/// Writer options.
///
/// Construct `WriterOptions` using the [`writer_options!`](crate::writer_options!) macro to
/// stay compatible when fields are added.
#[derive(Clone)]
pub struct WriterOptions {
    /// Break objects and arrays over several lines. Default: false.
    pub pretty: bool,
    /// Spaces per nesting level when `pretty` is set (2 by default).
    pub indent_step: usize,
    /// Member name for type hints. Default: `"Class/Type"`.
    pub type_hint_name: String,
    /// Type hint policy.
    pub type_hints: TypeHints,
    /// Tag shared objects with `"@tag"` and write repeats as references. When false, every
    /// occurrence is written in full (cycles then hit `max_depth`). Default: true.
    pub handle_references: bool,
    /// Tag every object, shared or not. Default: false.
    pub tag_all: bool,
    /// Write repeats in typed slots as `"@N"` strings instead of `{"@ref": N}`. Default: false.
    pub string_references: bool,
    /// Maximum nesting of objects and arrays. Default: 128.
    pub max_depth: usize,
    /// Custom converters, consulted in registration order.
    pub converters: Vec<Rc<dyn Converter>>,
}

impl WriterOptions {
    /// Adds a converter. Converters added earlier win when several claim the same type.
    pub fn with_converter<C: Converter + 'static>(mut self, converter: C) -> Self {
        self.converters.push(Rc::new(converter));
        self
    }

    pub(crate) fn converter_for(&self, ty: &Ty) -> Option<Rc<dyn Converter>> {
        self.converters.iter().find(|c| c.can_convert(ty)).cloned()
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent_step: 2,
            type_hint_name: crate::DEFAULT_TYPE_HINT.to_owned(),
            type_hints: TypeHints::Auto,
            handle_references: true,
            tag_all: false,
            string_references: false,
            max_depth: 128,
            converters: Vec::new(),
        }
    }
}

impl std::fmt::Debug for WriterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterOptions")
            .field("pretty", &self.pretty)
            .field("indent_step", &self.indent_step)
            .field("type_hint_name", &self.type_hint_name)
            .field("type_hints", &self.type_hints)
            .field("handle_references", &self.handle_references)
            .field("tag_all", &self.tag_all)
            .field("string_references", &self.string_references)
            .field("max_depth", &self.max_depth)
            .field("converters", &self.converters.len())
            .finish()
    }
}
