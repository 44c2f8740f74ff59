//! Static type expectations and registration-time type descriptors.
//!
//! There is no runtime reflection: every class, struct, abstract type or enum the reader may
//! instantiate is described once by a [`TypeDescriptor`] and registered in a
//! [`crate::TypeRegistry`].

use std::fmt;
use std::sync::Arc;

use crate::converter::SelfSerializing;

/// Expected type of a slot (member, element, document root).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// No expectation: the value keeps whatever representation the text implies.
    Any,
    Bool,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    Double,
    /// Arbitrary precision decimal.
    Decimal,
    String,
    /// RFC 3339 timestamp.
    DateTime,
    /// Growable list.
    List(Box<Ty>),
    /// Fixed typed array.
    Array(Box<Ty>),
    /// Keyed map. Keys must be [`Ty::String`].
    Map(Box<Ty>, Box<Ty>),
    /// Registered class, struct, abstract type or enum.
    Named(Arc<str>),
}

impl Ty {
    pub fn named(name: &str) -> Ty {
        Ty::Named(Arc::from(name))
    }

    pub fn list(element: Ty) -> Ty {
        Ty::List(Box::new(element))
    }

    pub fn array(element: Ty) -> Ty {
        Ty::Array(Box::new(element))
    }

    /// String-keyed map with values of type `value`.
    pub fn map(value: Ty) -> Ty {
        Ty::Map(Box::new(Ty::String), Box::new(value))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Ty::Any)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Ty::String)
    }

    /// Element type of a list or array.
    pub fn element(&self) -> Option<&Ty> {
        match self {
            Ty::List(element) | Ty::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Ty::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Any => f.write_str("object"),
            Ty::Bool => f.write_str("bool"),
            Ty::Int => f.write_str("int"),
            Ty::Long => f.write_str("long"),
            Ty::Double => f.write_str("double"),
            Ty::Decimal => f.write_str("decimal"),
            Ty::String => f.write_str("string"),
            Ty::DateTime => f.write_str("DateTime"),
            Ty::List(element) => write!(f, "List<{element}>"),
            Ty::Array(element) => write!(f, "{element}[]"),
            Ty::Map(key, value) => write!(f, "Dictionary<{key}, {value}>"),
            Ty::Named(name) => f.write_str(name),
        }
    }
}

/// Kind of a registered type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// Reference type: instances have identity and can be tagged.
    Class,
    /// Value type: copied on assignment, never referenced by identity.
    Struct,
    /// Cannot be instantiated; a type hint must name a concrete subtype.
    Abstract,
    /// Named integer constants, in declaration order.
    Enum(Vec<(String, i64)>),
}

/// Settable member of a registered type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub ty: Ty,
    /// Read-only members are parsed but never assigned.
    pub writable: bool,
    /// Excluded from reading and writing.
    pub ignored: bool,
    /// Member is serialized even when its type is opt-in.
    pub opt_in: bool,
}

impl MemberDescriptor {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
            writable: true,
            ignored: false,
            opt_in: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn opt_in(mut self) -> Self {
        self.opt_in = true;
        self
    }
}

/// Registration-time description of a type: its members, base type and construction policy.
///
/// Built with a small builder API:
///
/// ```
/// use refjson::{Ty, TypeDescriptor};
///
/// let node = TypeDescriptor::class("Graph.Node")
///     .base("Graph.Element")
///     .field("name", Ty::String)
///     .field("next", Ty::named("Graph.Node"));
/// assert_eq!(node.fields().len(), 2);
/// ```
#[derive(Clone)]
pub struct TypeDescriptor {
    pub(crate) name: Arc<str>,
    pub(crate) kind: TypeKind,
    pub(crate) base: Option<Arc<str>>,
    pub(crate) fields: Vec<MemberDescriptor>,
    pub(crate) opt_in: bool,
    pub(crate) emit_type_hint: bool,
    pub(crate) dictionary: Option<Ty>,
    pub(crate) dictionary_key: Ty,
    pub(crate) constructible: bool,
    pub(crate) hook: Option<Arc<dyn SelfSerializing>>,
}

impl TypeDescriptor {
    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            base: None,
            fields: Vec::new(),
            opt_in: false,
            emit_type_hint: false,
            dictionary: None,
            dictionary_key: Ty::String,
            constructible: true,
            hook: None,
        }
    }

    pub fn class(name: &str) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn structure(name: &str) -> Self {
        Self::new(name, TypeKind::Struct)
    }

    pub fn abstract_class(name: &str) -> Self {
        Self::new(name, TypeKind::Abstract)
    }

    /// Enum with the given `(name, value)` variants. The first variant is the default.
    pub fn enumeration(name: &str, variants: &[(&str, i64)]) -> Self {
        let variants = variants
            .iter()
            .map(|(name, value)| ((*name).to_owned(), *value))
            .collect();
        Self::new(name, TypeKind::Enum(variants))
    }

    pub fn base(mut self, base: &str) -> Self {
        self.base = Some(Arc::from(base));
        self
    }

    pub fn field(self, name: &str, ty: Ty) -> Self {
        self.member(MemberDescriptor::new(name, ty))
    }

    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.fields.push(member);
        self
    }

    /// Only members marked [`MemberDescriptor::opt_in`] take part in (de)serialization.
    pub fn opt_in(mut self) -> Self {
        self.opt_in = true;
        self
    }

    /// Always write the type hint for instances of this type.
    pub fn emit_type_hint(mut self) -> Self {
        self.emit_type_hint = true;
        self
    }

    /// Make the type map-like: keys without a matching member are kept as dynamic entries
    /// of type `value`.
    pub fn dictionary(mut self, value: Ty) -> Self {
        self.dictionary = Some(value);
        self
    }

    /// Like [`TypeDescriptor::dictionary`] with an explicit key type. Any key type other than
    /// [`Ty::String`] is rejected when the type is read.
    pub fn dictionary_keyed(mut self, key: Ty, value: Ty) -> Self {
        self.dictionary_key = key;
        self.dictionary = Some(value);
        self
    }

    pub fn no_default_constructor(mut self) -> Self {
        self.constructible = false;
        self
    }

    /// Let the type read and write itself.
    pub fn self_serializing(mut self, hook: impl SelfSerializing + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Members declared on this type (not including the base chain).
    pub fn fields(&self) -> &[MemberDescriptor] {
        &self.fields
    }

    pub fn is_struct(&self) -> bool {
        self.kind == TypeKind::Struct
    }

    pub fn is_abstract(&self) -> bool {
        self.kind == TypeKind::Abstract
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum(_))
    }

    pub fn variants(&self) -> &[(String, i64)] {
        match &self.kind {
            TypeKind::Enum(variants) => variants,
            _ => &[],
        }
    }

    pub fn dictionary_value(&self) -> Option<&Ty> {
        self.dictionary.as_ref()
    }

    pub fn emits_type_hint(&self) -> bool {
        self.emit_type_hint
    }

    pub(crate) fn hook(&self) -> Option<&Arc<dyn SelfSerializing>> {
        self.hook.as_ref()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base)
            .field("fields", &self.fields)
            .field("opt_in", &self.opt_in)
            .field("emit_type_hint", &self.emit_type_hint)
            .field("dictionary", &self.dictionary)
            .field("constructible", &self.constructible)
            .field("hook", &if self.hook.is_some() { "set" } else { "none" })
            .finish()
    }
}
