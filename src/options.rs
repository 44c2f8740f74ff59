use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::converter::Converter;
use crate::types::Ty;

/// What to do with references that are still unresolved when the document ends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReferencePolicy {
    /// Leave the placeholders (null or the default value) in place.
    #[default]
    Ignore,
    /// Fail with [`crate::Error::UnresolvedReferences`].
    Error,
}

/// Reader configuration options.
///
/// Example: read an unquoted-key document into an untyped dictionary.
///
/// ```rust
/// use refjson::{from_str_with_options, Ty, TypeRegistry};
///
/// let registry = TypeRegistry::new();
/// let options = refjson::options! {
///     allow_unquoted_object_keys: true,
/// };
///
/// let value = from_str_with_options(&registry, "{ name: 'box', size: 3 }", &Ty::Any, options).unwrap();
/// assert_eq!(value.member("size").and_then(|v| v.as_i64()), Some(3));
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Options {
    /// Accept object keys that are not quoted. Default: false.
    pub allow_unquoted_object_keys: bool,
    /// Interpret `"@tag"`, `"@ref"` and `"@N"` strings as reference markup. When false, they
    /// are ordinary data. Default: true.
    pub handle_references: bool,
    /// Member name that carries the runtime type of an object. Default: `"Class/Type"`.
    pub type_hint_name: String,
    /// Namespace tried as a prefix when a type hint does not match a registered name as is.
    pub default_namespace: Option<String>,
    /// Unknown type hints turn the object into null and nulls are dropped from arrays
    /// and dictionaries. Default: false.
    pub auto_type: bool,
    /// Fail on type hints naming unregistered types instead of ignoring them. Has no effect
    /// in `auto_type` mode. Default: false.
    pub strict_type_hints: bool,
    /// Policy for references that never resolve.
    pub unresolved_references: UnresolvedReferencePolicy,
    /// Maximum nesting of objects and arrays. Default: 128.
    pub max_depth: usize,
    /// Hard cap on decoded input size for [`crate::from_reader`]. Default: none.
    pub max_input_bytes: Option<usize>,
    /// Called with the hint text whenever a type hint names no registered type.
    #[serde(skip)]
    pub on_invalid_type_hint: Option<fn(&str)>,
    /// Custom converters, consulted in registration order.
    #[serde(skip)]
    pub converters: Vec<Rc<dyn Converter>>,

    /// If true (default), public APIs that have access to the input text wrap returned
    /// errors with a snippet wrapper, enabling rustc-like snippet rendering when a location
    /// is available.
    pub with_snippet: bool,

    /// Horizontal crop radius (in character columns) when rendering snippet diagnostics.
    ///
    /// If set to `0`, snippet wrapping is disabled (the original, unwrapped error is returned).
    pub crop_radius: usize,
}

impl Options {
    /// Adds a converter. Converters added earlier win when several claim the same type.
    pub fn with_converter<C: Converter + 'static>(mut self, converter: C) -> Self {
        self.converters.push(Rc::new(converter));
        self
    }

    /// First converter that claims `ty`.
    pub(crate) fn converter_for(&self, ty: &Ty) -> Option<Rc<dyn Converter>> {
        self.converters.iter().find(|c| c.can_convert(ty)).cloned()
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_unquoted_object_keys: false,
            handle_references: true,
            type_hint_name: crate::DEFAULT_TYPE_HINT.to_owned(),
            default_namespace: None,
            auto_type: false,
            strict_type_hints: false,
            unresolved_references: UnresolvedReferencePolicy::Ignore,
            max_depth: 128,
            max_input_bytes: None,
            on_invalid_type_hint: None,
            converters: Vec::new(),
            with_snippet: true,
            crop_radius: 64,
        }
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("allow_unquoted_object_keys", &self.allow_unquoted_object_keys)
            .field("handle_references", &self.handle_references)
            .field("type_hint_name", &self.type_hint_name)
            .field("default_namespace", &self.default_namespace)
            .field("auto_type", &self.auto_type)
            .field("strict_type_hints", &self.strict_type_hints)
            .field("unresolved_references", &self.unresolved_references)
            .field("max_depth", &self.max_depth)
            .field("max_input_bytes", &self.max_input_bytes)
            .field(
                "on_invalid_type_hint",
                &if self.on_invalid_type_hint.is_some() { "set" } else { "none" },
            )
            .field("converters", &self.converters.len())
            .field("with_snippet", &self.with_snippet)
            .field("crop_radius", &self.crop_radius)
            .finish()
    }
}
