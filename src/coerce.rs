//! Type coercion: converting parsed values into the type a slot expects.

use std::str::FromStr;

use chrono::DateTime;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::Error;
use crate::registry::TypeRegistry;
use crate::types::{Ty, TypeDescriptor, TypeKind};
use crate::value::{EnumValue, Object, ObjectRef, Value};

/// Convert `value` into a value of type `target`.
///
/// Conversions that would lose information (fractional numbers into integer slots,
/// out-of-range integers) fail with [`Error::TypeCoercion`]. Arrays and dictionaries are
/// converted in place, so their identity survives; dictionaries coerced into a class
/// become a fresh instance.
///
/// ```
/// use refjson::{coerce_type, Ty, TypeRegistry, Value};
///
/// let registry = TypeRegistry::new();
/// assert_eq!(coerce_type(&registry, &Ty::Long, Value::Int(7)).unwrap(), Value::Long(7));
/// assert!(coerce_type(&registry, &Ty::Int, Value::Double(1.5)).is_err());
/// ```
pub fn coerce_type(registry: &TypeRegistry, target: &Ty, value: Value) -> Result<Value, Error> {
    if target.is_any() {
        return Ok(value);
    }
    if value.is_null() {
        return Ok(registry.default_value(target));
    }

    match target {
        Ty::Any => Ok(value),
        Ty::Bool => to_bool(value),
        Ty::Int => {
            let n = to_integer(value, target)?;
            i32::try_from(n)
                .map(Value::Int)
                .map_err(|_| Error::coercion(n.to_string(), target))
        }
        Ty::Long => to_integer(value, target).map(Value::Long),
        Ty::Double => to_double(value),
        Ty::Decimal => to_decimal(value),
        Ty::String => to_string(value),
        Ty::DateTime => match value {
            Value::DateTime(_) => Ok(value),
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(Value::DateTime)
                .map_err(|_| Error::coercion(format!("{s:?}"), target)),
            other => Err(Error::coercion(other.describe(), target)),
        },
        Ty::List(element) | Ty::Array(element) => {
            let Value::Array(array) = &value else {
                return Err(Error::coercion(value.describe(), target));
            };
            {
                let mut array = array.borrow_mut();
                let items = std::mem::take(&mut array.items);
                let items = items
                    .into_iter()
                    .map(|item| coerce_type(registry, element, item))
                    .collect::<Result<Vec<_>, _>>()?;
                array.items = items;
                array.element = (**element).clone();
                array.list = matches!(target, Ty::List(_));
            }
            Ok(value)
        }
        Ty::Map(key, element) => {
            if !key.is_string() {
                return Err(Error::unsupported_key_type(target.to_string()));
            }
            let Value::Object(object) = &value else {
                return Err(Error::coercion(value.describe(), target));
            };
            if !object.borrow().is_dictionary() {
                return Err(Error::coercion(value.describe(), target));
            }
            if !element.is_any() {
                let mut object = object.borrow_mut();
                for entry in object.members.values_mut() {
                    let item = std::mem::replace(entry, Value::Null);
                    *entry = coerce_type(registry, element, item)?;
                }
            }
            Ok(value)
        }
        Ty::Named(name) => {
            // Types only a converter knows about are taken as the converter built them.
            let Some(descriptor) = registry.get(name) else {
                return Ok(value);
            };
            to_named(registry, descriptor, value)
        }
    }
}

fn to_named(
    registry: &TypeRegistry,
    descriptor: &std::sync::Arc<TypeDescriptor>,
    value: Value,
) -> Result<Value, Error> {
    let target = Ty::Named(descriptor.name.clone());
    if let TypeKind::Enum(variants) = &descriptor.kind {
        let found = match &value {
            Value::Enum(e) if registry.is_subtype(&e.type_name, &descriptor.name) => {
                return Ok(value);
            }
            Value::String(s) => {
                let s = s.trim();
                variants
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(s))
                    .or_else(|| {
                        let n = i64::from_str(s).ok()?;
                        variants.iter().find(|(_, value)| *value == n)
                    })
            }
            Value::Int(_) | Value::Long(_) => {
                let n = value.as_i64();
                variants.iter().find(|(_, value)| Some(*value) == n)
            }
            _ => None,
        };
        return match found {
            Some((name, n)) => Ok(Value::Enum(EnumValue {
                type_name: descriptor.name.clone(),
                name: name.clone(),
                value: *n,
            })),
            None => Err(Error::coercion(value.describe(), &target)),
        };
    }

    match &value {
        Value::Object(object) => {
            let actual = object.borrow().type_name().map(str::to_owned);
            match actual {
                Some(actual) if registry.is_subtype(&actual, &descriptor.name) => Ok(value),
                Some(_) => Err(Error::coercion(value.describe(), &target)),
                None => {
                    let members = object.borrow().members.clone();
                    let mut instance = registry.instantiate(descriptor)?;
                    match &mut instance {
                        Value::Object(o) => {
                            let mut o = o.borrow_mut();
                            for (name, member) in members {
                                set_member_value(registry, &mut o, &name, member)?;
                            }
                        }
                        Value::Struct(s) => {
                            for (name, member) in members {
                                set_member_value(registry, s, &name, member)?;
                            }
                        }
                        _ => {}
                    }
                    Ok(instance)
                }
            }
        }
        Value::Struct(s) if s.type_name() == Some(descriptor.name()) => Ok(value),
        _ => Err(Error::coercion(value.describe(), &target)),
    }
}

/// Where a member value goes when assigned to an object.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Slot {
    /// Declared member of the given type.
    Member(Ty),
    /// Dynamic entry of a dictionary or map-like type.
    Entry(Ty),
    /// Declared but not writable: parsed and discarded.
    ReadOnly,
    /// No member and no dynamic entries: parsed and discarded.
    Unmapped,
}

impl Slot {
    /// Expected type for reading the value, `None` when it will be discarded.
    pub(crate) fn ty(&self) -> Option<&Ty> {
        match self {
            Slot::Member(ty) | Slot::Entry(ty) => Some(ty),
            Slot::ReadOnly | Slot::Unmapped => None,
        }
    }
}

/// Resolve the slot of member `name` in `object`.
pub(crate) fn slot_of(registry: &TypeRegistry, object: &Object, name: &str) -> Slot {
    let Some(descriptor) = &object.ty else {
        return Slot::Entry(Ty::Any);
    };
    match registry.member_map(descriptor).get(name) {
        Some(member) if member.writable => Slot::Member(member.ty.clone()),
        Some(_) => Slot::ReadOnly,
        None => match &descriptor.dictionary {
            Some(entry) => Slot::Entry(entry.clone()),
            None => Slot::Unmapped,
        },
    }
}

/// Assign `value` to member `name` of `target`, coercing it to the member type.
///
/// Read-only members are left untouched. Keys without a member go into the dynamic
/// entries of dictionaries and map-like types, and are dropped otherwise.
///
/// Returns `Ok(true)` when the value was stored.
pub fn set_member_value(
    registry: &TypeRegistry,
    target: &mut Object,
    name: &str,
    value: Value,
) -> Result<bool, Error> {
    match slot_of(registry, target, name) {
        Slot::Member(ty) | Slot::Entry(ty) => {
            let value = coerce_type(registry, &ty, value)?;
            target.insert(name, value);
            Ok(true)
        }
        Slot::ReadOnly | Slot::Unmapped => {
            tracing::trace!(member = name, ty = ?target.type_name(), "member not assigned");
            Ok(false)
        }
    }
}

/// [`set_member_value`] on a shared object.
///
/// The object is only borrowed mutably for the final store, so `value` may refer back to
/// `target` itself.
pub fn assign_member(
    registry: &TypeRegistry,
    target: &ObjectRef,
    name: &str,
    value: Value,
) -> Result<bool, Error> {
    let slot = slot_of(registry, &target.borrow(), name);
    match slot {
        Slot::Member(ty) | Slot::Entry(ty) => {
            let value = coerce_type(registry, &ty, value)?;
            target.borrow_mut().insert(name, value);
            Ok(true)
        }
        Slot::ReadOnly | Slot::Unmapped => Ok(false),
    }
}

fn to_bool(value: Value) -> Result<Value, Error> {
    match value {
        Value::Bool(_) => Ok(value),
        Value::Int(_) | Value::Long(_) => Ok(Value::Bool(value.as_i64() != Some(0))),
        Value::String(s) => match s.trim() {
            t if t.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            t if t.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(Error::coercion(format!("{s:?}"), Ty::Bool)),
        },
        other => Err(Error::coercion(other.describe(), Ty::Bool)),
    }
}

fn to_integer(value: Value, target: &Ty) -> Result<i64, Error> {
    let fail = |value: &Value| Error::coercion(value.describe(), target);
    match &value {
        Value::Int(i) => Ok(*i as i64),
        Value::Long(l) => Ok(*l),
        Value::Bool(b) => Ok(*b as i64),
        Value::Enum(e) => Ok(e.value),
        Value::Decimal(d) if d.fract().is_zero() => d.to_i64().ok_or_else(|| fail(&value)),
        Value::Double(d) if d.fract() == 0.0 && d.is_finite() => {
            d.to_i64().ok_or_else(|| fail(&value))
        }
        Value::String(s) => i64::from_str(s.trim()).map_err(|_| fail(&value)),
        _ => Err(fail(&value)),
    }
}

fn to_double(value: Value) -> Result<Value, Error> {
    let d = match &value {
        Value::Double(_) => return Ok(value),
        Value::Int(i) => *i as f64,
        Value::Long(l) => *l as f64,
        Value::Decimal(d) => d.to_f64().ok_or_else(|| Error::coercion(d.to_string(), Ty::Double))?,
        Value::String(s) => match s.trim() {
            "NaN" => f64::NAN,
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            t => f64::from_str(t).map_err(|_| Error::coercion(format!("{s:?}"), Ty::Double))?,
        },
        other => return Err(Error::coercion(other.describe(), Ty::Double)),
    };
    Ok(Value::Double(d))
}

fn to_decimal(value: Value) -> Result<Value, Error> {
    let fail = |value: &Value| Error::coercion(value.describe(), Ty::Decimal);
    let d = match &value {
        Value::Decimal(_) => return Ok(value),
        Value::Int(i) => Decimal::from(*i),
        Value::Long(l) => Decimal::from(*l),
        Value::Double(d) => Decimal::try_from(*d).map_err(|_| fail(&value))?,
        Value::String(s) => {
            let t = s.trim();
            Decimal::from_str_exact(t)
                .or_else(|_| Decimal::from_scientific(t))
                .map_err(|_| fail(&value))?
        }
        _ => return Err(fail(&value)),
    };
    Ok(Value::Decimal(d))
}

fn to_string(value: Value) -> Result<Value, Error> {
    let s = match &value {
        Value::String(_) => return Ok(value),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Long(l) => l.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::DateTime(t) => t.to_rfc3339(),
        Value::Enum(e) => e.name.clone(),
        other => return Err(Error::coercion(other.describe(), Ty::String)),
    };
    Ok(Value::String(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemberDescriptor;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(TypeDescriptor::enumeration("Mode", &[("Off", 0), ("On", 1)]))
            .with(
                TypeDescriptor::class("Settings")
                    .field("level", Ty::Int)
                    .member(MemberDescriptor::new("version", Ty::Int).read_only())
                    .field("mode", Ty::named("Mode")),
            )
            .with(TypeDescriptor::class("Bag").dictionary(Ty::Int))
    }

    #[test]
    fn numeric_narrowing() {
        let r = registry();
        assert_eq!(coerce_type(&r, &Ty::Int, Value::Long(5)).unwrap(), Value::Int(5));
        assert!(coerce_type(&r, &Ty::Int, Value::Long(1 << 40)).is_err());
        assert_eq!(coerce_type(&r, &Ty::Int, Value::Double(3.0)).unwrap(), Value::Int(3));
        assert!(matches!(
            coerce_type(&r, &Ty::Int, Value::Double(3.5)),
            Err(Error::TypeCoercion { .. })
        ));
        assert_eq!(
            coerce_type(&r, &Ty::Decimal, Value::Int(2)).unwrap(),
            Value::Decimal(Decimal::from(2))
        );
    }

    #[test]
    fn strings_to_enums() {
        let r = registry();
        match coerce_type(&r, &Ty::named("Mode"), Value::string("on")).unwrap() {
            Value::Enum(e) => assert_eq!((e.name.as_str(), e.value), ("On", 1)),
            other => panic!("unexpected {other:?}"),
        }
        assert!(coerce_type(&r, &Ty::named("Mode"), Value::string("Maybe")).is_err());
    }

    #[test]
    fn null_becomes_default() {
        let r = registry();
        assert_eq!(coerce_type(&r, &Ty::Int, Value::Null).unwrap(), Value::Int(0));
        assert!(coerce_type(&r, &Ty::String, Value::Null).unwrap().is_null());
    }

    #[test]
    fn dictionary_to_class() {
        let r = registry();
        let dict = Value::object(
            Object::dictionary()
                .with("level", Value::Long(3))
                .with("version", Value::Int(9))
                .with("mode", Value::string("On"))
                .with("unknown", Value::Bool(true)),
        );
        let settings = coerce_type(&r, &Ty::named("Settings"), dict).unwrap();
        let settings = settings.as_object().unwrap().borrow();
        assert_eq!(settings.type_name(), Some("Settings"));
        assert_eq!(settings.get("level"), Some(&Value::Int(3)));
        assert_eq!(settings.get("version"), Some(&Value::Int(0)));
        assert!(settings.get("unknown").is_none());
    }

    #[test]
    fn map_like_keeps_unknown_keys() {
        let r = registry();
        let bag = r.instantiate(r.get("Bag").unwrap()).unwrap();
        let bag = bag.as_object().unwrap();
        let stored = set_member_value(&r, &mut bag.borrow_mut(), "apples", Value::string("4")).unwrap();
        assert!(stored);
        assert_eq!(bag.borrow().get("apples"), Some(&Value::Int(4)));
    }

    #[test]
    fn arrays_keep_identity() {
        let r = registry();
        let array = Value::array(vec![Value::Int(1), Value::Int(2)]);
        let coerced = coerce_type(&r, &Ty::list(Ty::Long), array.clone()).unwrap();
        assert!(coerced.same_identity(&array));
        let a = coerced.as_array().unwrap().borrow();
        assert!(a.list);
        assert_eq!(a.items, vec![Value::Long(1), Value::Long(2)]);
    }
}
