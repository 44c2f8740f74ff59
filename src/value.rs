//! Dynamic object graph produced by the reader and consumed by the writer.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ahash::AHashSet;
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::types::{Ty, TypeDescriptor};

/// Shared handle to a class instance or dictionary.
pub type ObjectRef = Rc<RefCell<Object>>;

/// Shared handle to a list or array.
pub type ArrayRef = Rc<RefCell<Array>>;

/// Node of the object graph.
///
/// Objects and arrays are shared handles, so a graph may contain cycles. Structs are
/// plain values that are copied on assignment.
///
/// Whoever holds the root owns every node reachable from it. Handles are reference counted,
/// so a graph containing a cycle is not freed when the root is dropped: call
/// [`Value::break_cycles`] on the root first.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Decimal(Decimal),
    String(String),
    DateTime(DateTime<FixedOffset>),
    Enum(EnumValue),
    Array(ArrayRef),
    Object(ObjectRef),
    Struct(Box<Object>),
}

/// Variant of a registered enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumValue {
    pub type_name: Arc<str>,
    pub name: String,
    pub value: i64,
}

/// Class instance, struct, or dictionary.
///
/// Members keep insertion order; for typed objects this is the member map order.
#[derive(Clone, Default)]
pub struct Object {
    pub(crate) ty: Option<Arc<TypeDescriptor>>,
    pub(crate) members: IndexMap<String, Value>,
}

/// List or typed array.
#[derive(Clone, Debug)]
pub struct Array {
    /// Element type (inferred when the expected type did not fix it).
    pub element: Ty,
    /// `true` for a growable list, `false` for a fixed array.
    pub list: bool,
    pub items: Vec<Value>,
}

impl Object {
    /// An empty string-keyed dictionary.
    pub fn dictionary() -> Self {
        Self::default()
    }

    /// An object of the given type with no members set.
    pub fn typed(ty: Arc<TypeDescriptor>) -> Self {
        Self {
            ty: Some(ty),
            members: IndexMap::new(),
        }
    }

    pub fn descriptor(&self) -> Option<&Arc<TypeDescriptor>> {
        self.ty.as_ref()
    }

    pub fn type_name(&self) -> Option<&str> {
        self.ty.as_ref().map(|ty| ty.name())
    }

    pub fn is_dictionary(&self) -> bool {
        self.ty.is_none()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.members.get_mut(name)
    }

    /// Set a member, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.members.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.members.shift_remove(name)
    }

    pub fn members(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Builder-style [`Object::insert`].
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }
}

impl Array {
    pub fn new(element: Ty, list: bool, items: Vec<Value>) -> Self {
        Self {
            element,
            list,
            items,
        }
    }
}

impl Value {
    /// Empty every object and array reachable from this value, so that dropping the handles
    /// frees the whole graph. Type descriptors are kept; members and items are not.
    ///
    /// ```
    /// use refjson::{Object, Value};
    ///
    /// let node = Value::object(Object::dictionary());
    /// node.as_object().unwrap().borrow_mut().insert("me", node.clone());
    /// let weak = std::rc::Rc::downgrade(node.as_object().unwrap());
    ///
    /// node.break_cycles();
    /// drop(node);
    /// assert!(weak.upgrade().is_none());
    /// ```
    pub fn break_cycles(&self) {
        let mut seen = AHashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(value) = pending.pop() {
            match value {
                Value::Object(object) => {
                    if seen.insert(Rc::as_ptr(&object) as usize) {
                        let members = std::mem::take(&mut object.borrow_mut().members);
                        pending.extend(members.into_values());
                    }
                }
                Value::Array(array) => {
                    if seen.insert(Rc::as_ptr(&array) as usize) {
                        let items = std::mem::take(&mut array.borrow_mut().items);
                        pending.extend(items);
                    }
                }
                Value::Struct(object) => pending.extend(object.members.into_values()),
                _ => {}
            }
        }
    }

    /// Wrap an object into a shared handle.
    pub fn object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    /// Wrap items into a shared untyped array.
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(Array::new(Ty::Any, false, items))))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of `Int` and `Long` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i as i64),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Object> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Member of an object or struct value, `None` for anything else.
    pub fn member(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(o) => o.borrow().get(name).cloned(),
            Value::Struct(s) => s.get(name).cloned(),
            _ => None,
        }
    }

    /// `true` when both values are the same shared object or array.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Runtime type of the value, used for array element inference and type hints.
    pub fn runtime_ty(&self) -> Ty {
        match self {
            Value::Null => Ty::Any,
            Value::Bool(_) => Ty::Bool,
            Value::Int(_) => Ty::Int,
            Value::Long(_) => Ty::Long,
            Value::Double(_) => Ty::Double,
            Value::Decimal(_) => Ty::Decimal,
            Value::String(_) => Ty::String,
            Value::DateTime(_) => Ty::DateTime,
            Value::Enum(e) => Ty::Named(e.type_name.clone()),
            Value::Array(a) => {
                let a = a.borrow();
                if a.list {
                    Ty::list(a.element.clone())
                } else {
                    Ty::array(a.element.clone())
                }
            }
            Value::Object(o) => match &o.borrow().ty {
                Some(ty) => Ty::Named(ty.name.clone()),
                None => Ty::map(Ty::Any),
            },
            Value::Struct(s) => match &s.ty {
                Some(ty) => Ty::Named(ty.name.clone()),
                None => Ty::map(Ty::Any),
            },
        }
    }

    /// Short rendering for diagnostics (never the whole graph).
    pub(crate) fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => {
                let mut short: String = s.chars().take(40).collect();
                if short.len() < s.len() {
                    short.push_str("...");
                }
                format!("{short:?}")
            }
            Value::DateTime(t) => t.to_rfc3339(),
            Value::Enum(e) => format!("{}.{}", e.type_name, e.name),
            other => format!("a value of type {}", other.runtime_ty()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

type SeenPairs = AHashSet<(usize, usize)>;

/// Structural equality. Shared nodes already under comparison are assumed equal, so cyclic
/// graphs compare in finite time.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_eq(self, other, &mut SeenPairs::new())
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        objects_eq(self, other, &mut SeenPairs::new())
    }
}

fn values_eq(a: &Value, b: &Value, seen: &mut SeenPairs) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Long(x), Value::Long(y)) => x == y,
        (Value::Double(x), Value::Double(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Decimal(x), Value::Decimal(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::DateTime(x), Value::DateTime(y)) => x == y,
        (Value::Enum(x), Value::Enum(y)) => x == y,
        (Value::Struct(x), Value::Struct(y)) => objects_eq(x, y, seen),
        (Value::Object(x), Value::Object(y)) => {
            if Rc::ptr_eq(x, y) || !seen.insert((Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize))
            {
                return true;
            }
            objects_eq(&x.borrow(), &y.borrow(), seen)
        }
        (Value::Array(x), Value::Array(y)) => {
            if Rc::ptr_eq(x, y) || !seen.insert((Rc::as_ptr(x) as usize, Rc::as_ptr(y) as usize))
            {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.items.len() == y.items.len()
                && x.items
                    .iter()
                    .zip(&y.items)
                    .all(|(a, b)| values_eq(a, b, seen))
        }
        _ => false,
    }
}

fn objects_eq(a: &Object, b: &Object, seen: &mut SeenPairs) -> bool {
    a.type_name() == b.type_name()
        && a.members.len() == b.members.len()
        && a.members
            .iter()
            .all(|(k, v)| b.members.get(k).is_some_and(|w| values_eq(v, w, seen)))
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_value(self, f, &mut Vec::new())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_object(self, f, &mut Vec::new())
    }
}

fn debug_value(value: &Value, f: &mut fmt::Formatter<'_>, path: &mut Vec<usize>) -> fmt::Result {
    match value {
        Value::Null => f.write_str("Null"),
        Value::Bool(b) => write!(f, "Bool({b})"),
        Value::Int(i) => write!(f, "Int({i})"),
        Value::Long(l) => write!(f, "Long({l})"),
        Value::Double(d) => write!(f, "Double({d:?})"),
        Value::Decimal(d) => write!(f, "Decimal({d})"),
        Value::String(s) => write!(f, "String({s:?})"),
        Value::DateTime(t) => write!(f, "DateTime({})", t.to_rfc3339()),
        Value::Enum(e) => write!(f, "Enum({}.{})", e.type_name, e.name),
        Value::Struct(s) => {
            f.write_str("Struct")?;
            debug_object(s, f, path)
        }
        Value::Object(o) => {
            let ptr = Rc::as_ptr(o) as usize;
            if path.contains(&ptr) {
                return write!(f, "<cycle {ptr:#x}>");
            }
            path.push(ptr);
            let result = debug_object(&o.borrow(), f, path);
            path.pop();
            result
        }
        Value::Array(a) => {
            let ptr = Rc::as_ptr(a) as usize;
            if path.contains(&ptr) {
                return write!(f, "<cycle {ptr:#x}>");
            }
            path.push(ptr);
            let a = a.borrow();
            f.write_str("[")?;
            for (i, item) in a.items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                debug_value(item, f, path)?;
            }
            path.pop();
            f.write_str("]")
        }
    }
}

fn debug_object(object: &Object, f: &mut fmt::Formatter<'_>, path: &mut Vec<usize>) -> fmt::Result {
    if let Some(name) = object.type_name() {
        f.write_str(name)?;
    }
    f.write_str("{")?;
    for (i, (k, v)) in object.members.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{k:?}: ")?;
        debug_value(v, f, path)?;
    }
    f.write_str("}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_graphs_compare() {
        let a = Value::object(Object::dictionary().with("n", Value::Int(1)));
        let b = Value::object(Object::dictionary().with("n", Value::Int(1)));
        for v in [&a, &b] {
            let o = v.as_object().unwrap();
            o.borrow_mut().insert("self", v.clone());
        }
        assert_eq!(a, b);
        let text = format!("{a:?}");
        assert!(text.contains("<cycle"), "{text}");
        a.break_cycles();
        b.break_cycles();
    }

    #[test]
    fn break_cycles_empties_structs_and_arrays() {
        let node = Value::object(Object::dictionary());
        let spot = Value::Struct(Box::new(Object::dictionary().with("owner", node.clone())));
        let list = Value::array(vec![spot, node.clone()]);
        node.as_object().unwrap().borrow_mut().insert("list", list.clone());
        let weak = Rc::downgrade(node.as_object().unwrap());

        list.break_cycles();
        assert!(list.as_array().unwrap().borrow().items.is_empty());
        assert!(node.as_object().unwrap().borrow().is_empty());
        drop(node);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn member_order_does_not_matter() {
        let a = Object::dictionary().with("x", 1.into()).with("y", 2.into());
        let b = Object::dictionary().with("y", 2.into()).with("x", 1.into());
        assert_eq!(a, b);
    }

    #[test]
    fn identity() {
        let a = Value::object(Object::dictionary());
        assert!(a.same_identity(&a.clone()));
        assert!(!a.same_identity(&Value::object(Object::dictionary())));
    }
}
