//! Type registry: name lookup, type-hint resolution and the member-map cache.

use std::sync::{Arc, RwLock};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::error::Error;
use crate::types::{MemberDescriptor, Ty, TypeDescriptor, TypeKind};
use crate::value::{EnumValue, Object, Value};

/// Settable members of a type, base members first, keyed by exact (case-sensitive) name.
pub type MemberMap = IndexMap<String, MemberDescriptor>;

/// Guards base chains and nested struct defaults against malformed registrations.
const MAX_TYPE_NESTING: usize = 64;

/// Registry of every type the reader may instantiate by name.
///
/// Member maps are computed on first use and cached for the lifetime of the registry.
/// The cache sits behind a read-mostly lock, so one registry can be shared by readers on
/// several threads.
///
/// ```
/// use refjson::{Ty, TypeDescriptor, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// registry
///     .register(TypeDescriptor::abstract_class("Shapes.Shape").field("name", Ty::String))
///     .register(TypeDescriptor::class("Shapes.Circle").base("Shapes.Shape").field("r", Ty::Double));
///
/// let circle = registry.get("Shapes.Circle").unwrap();
/// let members: Vec<_> = registry.member_map(circle).keys().cloned().collect();
/// assert_eq!(members, ["name", "r"]);
/// assert!(registry.is_subtype("Shapes.Circle", "Shapes.Shape"));
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    types: AHashMap<Arc<str>, Arc<TypeDescriptor>>,
    member_maps: RwLock<AHashMap<Arc<str>, Arc<MemberMap>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a type descriptor.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        // Derived maps include base members, so any replacement invalidates all of them.
        self.member_maps
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        self
    }

    /// Builder-style [`TypeRegistry::register`].
    pub fn with(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Descriptor behind a [`Ty::Named`] type.
    pub fn descriptor(&self, ty: &Ty) -> Option<&Arc<TypeDescriptor>> {
        ty.name().and_then(|name| self.get(name))
    }

    /// Resolve the value of a type-hint member.
    ///
    /// An assembly qualifier after the first `,` is ignored. The name is looked up as is,
    /// then prefixed with `default_namespace`.
    pub fn resolve_type_hint(
        &self,
        hint: &str,
        default_namespace: Option<&str>,
    ) -> Option<Arc<TypeDescriptor>> {
        let name = hint.split(',').next().unwrap_or(hint).trim();
        if name.is_empty() {
            return None;
        }
        if let Some(found) = self.get(name) {
            return Some(found.clone());
        }
        let namespace = default_namespace?;
        self.get(&format!("{namespace}.{name}")).cloned()
    }

    /// Member map of `ty`: its own and inherited members, minus ignored ones and, for
    /// opt-in types, minus members that did not opt in.
    pub fn member_map(&self, ty: &TypeDescriptor) -> Arc<MemberMap> {
        {
            let cache = self
                .member_maps
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(map) = cache.get(&ty.name) {
                return map.clone();
            }
        }

        let map = Arc::new(self.build_member_map(ty));
        self.member_maps
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(ty.name.clone())
            .or_insert(map)
            .clone()
    }

    fn build_member_map(&self, ty: &TypeDescriptor) -> MemberMap {
        let mut chain = vec![ty];
        let mut base = ty.base.as_deref();
        while let Some(name) = base {
            let Some(parent) = self.get(name) else {
                break;
            };
            if chain.len() >= MAX_TYPE_NESTING {
                break;
            }
            chain.push(parent);
            base = parent.base.as_deref();
        }

        let mut map = MemberMap::new();
        for declaring in chain.iter().rev() {
            for member in &declaring.fields {
                if member.ignored || (declaring.opt_in && !member.opt_in) {
                    map.shift_remove(&member.name);
                    continue;
                }
                map.insert(member.name.clone(), member.clone());
            }
        }
        map
    }

    /// `true` if `derived` equals `base` or inherits from it.
    pub fn is_subtype(&self, derived: &str, base: &str) -> bool {
        let mut current = Some(derived);
        for _ in 0..MAX_TYPE_NESTING {
            match current {
                Some(name) if name == base => return true,
                Some(name) => current = self.get(name).and_then(|d| d.base.as_deref()),
                None => return false,
            }
        }
        false
    }

    /// Whether a value of type `source` can be stored in a slot of type `target`
    /// without conversion.
    pub fn is_assignable(&self, target: &Ty, source: &Ty) -> bool {
        if target == source || target.is_any() {
            return true;
        }
        match (target, source) {
            (Ty::Named(target), Ty::Named(source)) => self.is_subtype(source, target),
            (Ty::Array(target), Ty::Array(source)) => {
                !self.is_value_type(source) && self.is_assignable(target, source)
            }
            _ => false,
        }
    }

    /// Value types are copied on assignment: primitives, structs and enums.
    pub fn is_value_type(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Bool | Ty::Int | Ty::Long | Ty::Double | Ty::Decimal | Ty::DateTime => true,
            Ty::Named(_) => self
                .descriptor(ty)
                .is_some_and(|d| matches!(d.kind, TypeKind::Struct | TypeKind::Enum(_))),
            _ => false,
        }
    }

    /// Value type of the dynamic entries when an object is read into `ty`.
    ///
    /// Returns:
    /// - `Ok(Some(value_ty))` for maps and map-like classes;
    /// - `Ok(None)` for types without dynamic entries;
    /// - `Err(UnsupportedKeyType)` when the keys are not strings.
    pub(crate) fn entry_type(&self, ty: &Ty) -> Result<Option<Ty>, Error> {
        match ty {
            Ty::Map(key, value) => {
                if !key.is_string() {
                    return Err(Error::unsupported_key_type(ty.to_string()));
                }
                Ok(Some((**value).clone()))
            }
            Ty::Named(_) => match self.descriptor(ty) {
                Some(d) => d.dictionary.as_ref().map_or(Ok(None), |value| {
                    if d.dictionary_key.is_string() {
                        Ok(Some(value.clone()))
                    } else {
                        Err(Error::unsupported_key_type(d.name.to_string()))
                    }
                }),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Create an instance with every member at its default value.
    ///
    /// Classes become [`Value::Object`], structs [`Value::Struct`], enums their first
    /// variant.
    pub fn instantiate(&self, ty: &Arc<TypeDescriptor>) -> Result<Value, Error> {
        self.instantiate_at(ty, 0)
    }

    fn instantiate_at(&self, ty: &Arc<TypeDescriptor>, nesting: usize) -> Result<Value, Error> {
        match &ty.kind {
            TypeKind::Abstract => return Err(Error::uninstantiable(ty.name.to_string())),
            TypeKind::Enum(variants) => {
                return Ok(match variants.first() {
                    Some((name, value)) => Value::Enum(EnumValue {
                        type_name: ty.name.clone(),
                        name: name.clone(),
                        value: *value,
                    }),
                    None => Value::Null,
                });
            }
            TypeKind::Class | TypeKind::Struct => {}
        }
        if !ty.constructible {
            return Err(Error::no_default_constructor(ty.name.to_string()));
        }

        let mut object = Object::typed(ty.clone());
        for member in self.member_map(ty).values() {
            object.insert(member.name.clone(), self.default_value_at(&member.ty, nesting + 1));
        }
        Ok(if ty.is_struct() {
            Value::Struct(Box::new(object))
        } else {
            Value::object(object)
        })
    }

    /// Default value of a slot: zero for numbers, `false`, the Unix epoch for timestamps,
    /// default instances for structs and enums, [`Value::Null`] for reference types.
    pub fn default_value(&self, ty: &Ty) -> Value {
        self.default_value_at(ty, 0)
    }

    fn default_value_at(&self, ty: &Ty, nesting: usize) -> Value {
        match ty {
            Ty::Bool => Value::Bool(false),
            Ty::Int => Value::Int(0),
            Ty::Long => Value::Long(0),
            Ty::Double => Value::Double(0.0),
            Ty::Decimal => Value::Decimal(Decimal::ZERO),
            Ty::DateTime => Value::DateTime(DateTime::<Utc>::UNIX_EPOCH.fixed_offset()),
            Ty::Named(_) if nesting < MAX_TYPE_NESTING => match self.descriptor(ty) {
                Some(d) if d.is_struct() || d.is_enum() => {
                    self.instantiate_at(d, nesting).unwrap_or(Value::Null)
                }
                _ => Value::Null,
            },
            _ => Value::Null,
        }
    }
}
