//! Reference tags and delayed setters.
//!
//! Every `"@tag": N` registers an object under id `N`. A reference to an id that is not
//! known yet leaves a placeholder and records a [`DelayedTarget`]; the target is patched
//! exactly once, when the id gets registered.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::coerce::{self, Slot};
use crate::error::Error;
use crate::registry::TypeRegistry;
use crate::types::Ty;
use crate::value::{ArrayRef, Object, ObjectRef, Value};

/// Shared container that owns a patchable slot.
#[derive(Clone)]
pub enum Container {
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Container {
    fn ptr(&self) -> usize {
        match self {
            Container::Object(o) => Rc::as_ptr(o) as usize,
            Container::Array(a) => Rc::as_ptr(a) as usize,
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Container::Object(_) => write!(f, "Object({:#x})", self.ptr()),
            Container::Array(_) => write!(f, "Array({:#x})", self.ptr()),
        }
    }
}

/// One step from a container to a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Member(String),
    Index(usize),
}

/// Slot to patch once a reference resolves.
///
/// `path` starts at `root` and walks through inline struct values; structs have no identity,
/// so a reference inside one is patched through its nearest shared ancestor.
#[derive(Clone, Debug)]
pub struct DelayedTarget {
    pub root: Container,
    pub path: SmallVec<[Segment; 2]>,
}

impl DelayedTarget {
    pub fn member(object: &ObjectRef, name: &str) -> Self {
        Self {
            root: Container::Object(object.clone()),
            path: SmallVec::from_iter([Segment::Member(name.to_owned())]),
        }
    }

    pub fn index(array: &ArrayRef, index: usize) -> Self {
        Self {
            root: Container::Array(array.clone()),
            path: SmallVec::from_iter([Segment::Index(index)]),
        }
    }

    /// Target one step further down, inside the struct stored at this target.
    pub(crate) fn child(&self, segment: Segment) -> Self {
        let mut target = self.clone();
        target.path.push(segment);
        target
    }

    /// Store `value` in the target slot, coerced to the slot type.
    fn apply(&self, registry: &TypeRegistry, value: Value) -> Result<(), Error> {
        let Some((last, parents)) = self.path.split_last() else {
            return Ok(());
        };

        // The slot type is resolved first and the root borrowed mutably only for the final
        // store: `value` is often the root itself.
        let slot_ty = match &self.root {
            Container::Object(o) => {
                let o = o.borrow();
                walk(&o, parents).and_then(|parent| slot_type(registry, parent, last))
            }
            Container::Array(a) => {
                let a = a.borrow();
                match parents.split_first() {
                    None => Some(a.element.clone()),
                    Some((Segment::Index(i), rest)) => match a.items.get(*i) {
                        Some(Value::Struct(s)) => {
                            walk(s, rest).and_then(|parent| slot_type(registry, parent, last))
                        }
                        _ => None,
                    },
                    Some(_) => None,
                }
            }
        };
        let Some(slot_ty) = slot_ty else {
            return Ok(());
        };
        let value = coerce::coerce_type(registry, &slot_ty, value)?;

        match &self.root {
            Container::Object(o) => {
                let mut o = o.borrow_mut();
                if let Some(parent) = walk_mut(&mut o, parents) {
                    store(parent, last, value);
                }
            }
            Container::Array(a) => {
                let mut a = a.borrow_mut();
                match parents.split_first() {
                    None => {
                        if let Segment::Index(i) = last
                            && let Some(item) = a.items.get_mut(*i)
                        {
                            *item = value;
                        }
                    }
                    Some((Segment::Index(i), rest)) => {
                        if let Some(Value::Struct(s)) = a.items.get_mut(*i)
                            && let Some(parent) = walk_mut(s, rest)
                        {
                            store(parent, last, value);
                        }
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

fn walk<'o>(mut object: &'o Object, path: &[Segment]) -> Option<&'o Object> {
    for segment in path {
        let Segment::Member(name) = segment else {
            return None;
        };
        object = object.get(name)?.as_struct()?;
    }
    Some(object)
}

fn walk_mut<'o>(mut object: &'o mut Object, path: &[Segment]) -> Option<&'o mut Object> {
    for segment in path {
        let Segment::Member(name) = segment else {
            return None;
        };
        object = match object.get_mut(name)? {
            Value::Struct(s) => s,
            _ => return None,
        };
    }
    Some(object)
}

fn slot_type(registry: &TypeRegistry, parent: &Object, last: &Segment) -> Option<Ty> {
    match last {
        Segment::Member(name) => match coerce::slot_of(registry, parent, name) {
            Slot::Member(ty) | Slot::Entry(ty) => Some(ty),
            Slot::ReadOnly | Slot::Unmapped => None,
        },
        Segment::Index(_) => None,
    }
}

fn store(parent: &mut Object, last: &Segment, value: Value) {
    if let Segment::Member(name) = last {
        parent.insert(name.clone(), value);
    }
}

enum RefSlot {
    Unresolved(Vec<DelayedTarget>),
    /// `fired` keeps the setters that received `value`, so a replacement can reach them.
    Resolved { value: Value, fired: Vec<DelayedTarget> },
}

/// Reference table of one read.
///
/// States per id: unresolved (forward references seen, setters queued) and resolved
/// (value known). Resolving an id fires its queued setters in registration order.
pub struct ReferenceHandler<'r> {
    registry: &'r TypeRegistry,
    slots: AHashMap<usize, RefSlot>,
}

impl<'r> ReferenceHandler<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            slots: AHashMap::new(),
        }
    }

    /// Register `value` under `id` and fire the setters waiting for it.
    ///
    /// Registering an id again replaces the earlier value; setters that already fired
    /// keep what they received.
    pub fn set(&mut self, id: usize, value: Value) -> Result<(), Error> {
        let fired = match self.slots.remove(&id) {
            Some(RefSlot::Unresolved(targets)) => {
                tracing::debug!(id, pending = targets.len(), "resolving forward references");
                for target in &targets {
                    target.apply(self.registry, value.clone())?;
                }
                targets
            }
            Some(RefSlot::Resolved { .. }) => {
                tracing::debug!(id, "tag registered again, last wins");
                Vec::new()
            }
            None => {
                tracing::trace!(id, "tag registered");
                Vec::new()
            }
        };
        self.slots.insert(id, RefSlot::Resolved { value, fired });
        Ok(())
    }

    /// Value registered under `id`, if any.
    pub fn try_get(&self, id: usize) -> Option<Value> {
        match self.slots.get(&id) {
            Some(RefSlot::Resolved { value, .. }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Queue `target` until `id` resolves. If it already did, the target is patched now.
    pub fn add_delayed(&mut self, id: usize, target: DelayedTarget) -> Result<(), Error> {
        match self.slots.entry(id).or_insert_with(|| RefSlot::Unresolved(Vec::new())) {
            RefSlot::Unresolved(targets) => {
                tracing::debug!(id, ?target, "delaying reference");
                targets.push(target);
                Ok(())
            }
            RefSlot::Resolved { value, fired } => {
                target.apply(self.registry, value.clone())?;
                fired.push(target);
                Ok(())
            }
        }
    }

    /// Swap the value registered under `id` for `value`, patching every setter that already
    /// received the old one.
    ///
    /// Used when a type hint replaces a tagged placeholder object.
    pub(crate) fn replace(&mut self, id: usize, value: Value) -> Result<(), Error> {
        let registry = self.registry;
        match self.slots.get_mut(&id) {
            Some(RefSlot::Resolved { value: current, fired }) => {
                *current = value.clone();
                tracing::debug!(id, patched = fired.len(), "tagged object replaced");
                for target in fired.iter() {
                    target.apply(registry, value.clone())?;
                }
                Ok(())
            }
            _ => self.set(id, value),
        }
    }

    /// Patch member `member` of `object` once `id` resolves.
    pub fn add_delayed_setter(&mut self, id: usize, object: &ObjectRef, member: &str) -> Result<(), Error> {
        self.add_delayed(id, DelayedTarget::member(object, member))
    }

    /// Patch entry `key` of dictionary `dictionary` once `id` resolves.
    pub fn add_delayed_dictionary_setter(
        &mut self,
        id: usize,
        dictionary: &ObjectRef,
        key: &str,
    ) -> Result<(), Error> {
        self.add_delayed(id, DelayedTarget::member(dictionary, key))
    }

    /// Patch element `index` of `list` once `id` resolves.
    pub fn add_delayed_list_setter(&mut self, id: usize, list: &ArrayRef, index: usize) -> Result<(), Error> {
        self.add_delayed(id, DelayedTarget::index(list, index))
    }

    /// Point pending setters rooted at `from` to `to` instead.
    ///
    /// Used when a type hint replaces a placeholder object that already had setters queued.
    pub(crate) fn retarget(&mut self, from: &ObjectRef, to: &ObjectRef) {
        let from = Rc::as_ptr(from) as usize;
        for slot in self.slots.values_mut() {
            if let RefSlot::Unresolved(targets) = slot {
                for target in targets.iter_mut() {
                    if target.root.ptr() == from {
                        target.root = Container::Object(to.clone());
                    }
                }
            }
        }
    }

    /// Ids that were referenced but never registered, in ascending order.
    pub fn unresolved(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                RefSlot::Unresolved(targets) if !targets.is_empty() => Some(*id),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeDescriptor;
    use crate::value::Array;
    use std::cell::RefCell;

    fn registry() -> TypeRegistry {
        TypeRegistry::new()
            .with(TypeDescriptor::class("Node").field("next", Ty::named("Node")).field("pos", Ty::named("Pos")))
            .with(TypeDescriptor::structure("Pos").field("owner", Ty::named("Node")))
    }

    #[test]
    fn resolves_member_once() -> Result<(), Error> {
        let registry = registry();
        let node = registry.instantiate(registry.get("Node").unwrap())?;
        let node_ref = node.as_object().unwrap().clone();
        let mut handler = ReferenceHandler::new(&registry);

        handler.add_delayed_setter(2, &node_ref, "next")?;
        assert_eq!(handler.unresolved(), vec![2]);
        assert!(handler.try_get(2).is_none());

        handler.set(2, node.clone())?;
        assert!(node_ref.borrow().get("next").unwrap().same_identity(&node));
        assert!(handler.unresolved().is_empty());
        assert!(handler.try_get(2).unwrap().same_identity(&node));
        Ok(())
    }

    #[test]
    fn patches_through_struct() -> Result<(), Error> {
        let registry = registry();
        let node = registry.instantiate(registry.get("Node").unwrap())?;
        let node_ref = node.as_object().unwrap().clone();
        let mut handler = ReferenceHandler::new(&registry);

        let target = DelayedTarget {
            root: Container::Object(node_ref.clone()),
            path: SmallVec::from_iter([
                Segment::Member("pos".into()),
                Segment::Member("owner".into()),
            ]),
        };
        handler.add_delayed(7, target)?;
        handler.set(7, node.clone())?;

        let owner = node.member("pos").unwrap().member("owner").unwrap();
        assert!(owner.same_identity(&node));
        Ok(())
    }

    #[test]
    fn list_setter() -> Result<(), Error> {
        let registry = registry();
        let list = Rc::new(RefCell::new(Array::new(Ty::Any, true, vec![Value::Int(1), Value::Null])));
        let mut handler = ReferenceHandler::new(&registry);
        handler.add_delayed_list_setter(3, &list, 1)?;
        handler.set(3, Value::string("target"))?;
        assert_eq!(list.borrow().items[1], Value::string("target"));
        Ok(())
    }

    #[test]
    fn resolved_ids_apply_immediately() -> Result<(), Error> {
        let registry = registry();
        let dict = Rc::new(RefCell::new(Object::dictionary()));
        let mut handler = ReferenceHandler::new(&registry);
        handler.set(1, Value::Int(5))?;
        handler.add_delayed_dictionary_setter(1, &dict, "k")?;
        assert_eq!(dict.borrow().get("k"), Some(&Value::Int(5)));
        Ok(())
    }

    #[test]
    fn replace_patches_fired_setters() -> Result<(), Error> {
        let registry = registry();
        let list = Rc::new(RefCell::new(Array::new(Ty::Any, true, vec![Value::Null])));
        let mut handler = ReferenceHandler::new(&registry);
        handler.add_delayed_list_setter(4, &list, 0)?;
        handler.set(4, Value::string("placeholder"))?;
        handler.replace(4, Value::string("final"))?;
        assert_eq!(list.borrow().items[0], Value::string("final"));
        assert_eq!(handler.try_get(4), Some(Value::string("final")));
        Ok(())
    }
}
