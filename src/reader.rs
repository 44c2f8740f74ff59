//! Recursive-descent reader: relaxed JSON text to a [`Value`] graph.
//!
//! The reader is driven by the expected type of each slot. Objects are read into registered
//! types (or untyped dictionaries), arrays into typed lists or arrays whose element type is
//! inferred from the items, and `"@tag"`/`"@ref"` markup is resolved into shared identity
//! through a [`ReferenceHandler`].

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::coerce::{self, Slot};
use crate::converter::{ConverterContext, SelfSerializing};
use crate::error::{Construct, Error, Expected};
use crate::location::Location;
use crate::options::{Options, UnresolvedReferencePolicy};
use crate::parse_scalars::{number_value, scan_number};
use crate::references::{DelayedTarget, ReferenceHandler, Segment};
use crate::registry::TypeRegistry;
use crate::token::{Scanner, Token};
use crate::types::{Ty, TypeDescriptor};
use crate::value::{Array, Object, ObjectRef, Value};

/// Member that registers an object under a reference id.
pub const TAG_KEY: &str = "@tag";
/// Member that makes an object stand for a previously tagged one.
pub const REF_KEY: &str = "@ref";

/// Outcome of reading one value.
enum Read {
    Value(Value),
    /// Reference to an id that is not registered yet; the caller queues a setter.
    Forward(usize),
}

/// Object under construction.
struct Building {
    object: ObjectRef,
    is_struct: bool,
    /// Entry type when the object is an untyped dictionary read for a `Map` slot.
    map_entry: Option<Ty>,
    /// Name of the abstract expected type while no type hint has been seen.
    pending_abstract: Option<Arc<str>>,
    /// Keys read so far, carried over when a type hint swaps the instance.
    assigned: Vec<String>,
    tag: Option<usize>,
    forward: Option<usize>,
    replaced: Option<Value>,
    /// Unknown type hint in auto-type mode: the object reads as null.
    abandoned: bool,
}

impl Building {
    fn new(object: ObjectRef) -> Self {
        let is_struct = object.borrow().descriptor().is_some_and(|d| d.is_struct());
        Self {
            object,
            is_struct,
            map_entry: None,
            pending_abstract: None,
            assigned: Vec::new(),
            tag: None,
            forward: None,
            replaced: None,
            abandoned: false,
        }
    }

    fn slot(&self, registry: &TypeRegistry, key: &str) -> Slot {
        let object = self.object.borrow();
        if object.descriptor().is_some() {
            coerce::slot_of(registry, &object, key)
        } else {
            Slot::Entry(self.map_entry.clone().unwrap_or(Ty::Any))
        }
    }
}

/// Reader over one input text.
///
/// Most callers use [`crate::from_str`] and friends; a `Reader` is handed to
/// [`crate::Converter`] and [`crate::SelfSerializing`] implementations so they can read
/// nested values.
pub struct Reader<'a> {
    scanner: Scanner<'a>,
    registry: &'a TypeRegistry,
    options: Options,
    references: ReferenceHandler<'a>,
    depth: usize,
}

impl<'a> Reader<'a> {
    pub fn new(text: &'a str, registry: &'a TypeRegistry, options: Options) -> Self {
        Self {
            scanner: Scanner::new(text),
            registry,
            options,
            references: ReferenceHandler::new(registry),
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Nesting depth of the value currently being read.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Byte offset of the cursor.
    pub fn position(&self) -> usize {
        self.scanner.pos()
    }

    pub fn location(&self) -> Location {
        self.scanner.location()
    }

    pub fn references(&self) -> &ReferenceHandler<'a> {
        &self.references
    }

    /// Next token, without consuming it. Whitespace and comments before it are skipped.
    pub fn peek_token(&mut self) -> Result<Token, Error> {
        self.scanner.peek(false)
    }

    /// Read a whole document: one value, then nothing but whitespace and comments.
    pub fn deserialize(&mut self, expected: &Ty) -> Result<Value, Error> {
        let value = self.read(expected, false)?;
        self.finish()?;
        Ok(value)
    }

    /// Read one value starting at byte offset `start`. Text after the value is ignored.
    pub fn deserialize_at(&mut self, start: usize, expected: &Ty) -> Result<Value, Error> {
        self.scanner.set_pos(start);
        let value = self.read(expected, false)?;
        self.check_unresolved()?;
        Ok(value)
    }

    /// Read the next value as `expected`.
    ///
    /// Arguments:
    /// - `expected`: type of the slot; [`Ty::Any`] reads untyped.
    /// - `type_is_hint`: `expected` was inferred rather than declared, so the value is read
    ///   untyped and not coerced.
    ///
    /// A reference to a tag that is not registered yet fails with
    /// [`Error::DetachedReference`]: there is no slot here the reader could patch later.
    pub fn read(&mut self, expected: &Ty, type_is_hint: bool) -> Result<Value, Error> {
        self.read_value(expected, type_is_hint, false)
    }

    /// [`Reader::read`] without consulting custom converters for this value (nested values
    /// still use them).
    pub fn read_skip_converters(&mut self, expected: &Ty, type_is_hint: bool) -> Result<Value, Error> {
        self.read_value(expected, type_is_hint, true)
    }

    /// Read an object into `target`, a pre-existing instance.
    ///
    /// Members present in the input overwrite those of `target`; others keep their values.
    /// A type hint naming a different type, or an `"@ref"`, replaces `target`.
    pub fn populate_object(&mut self, target: &mut ObjectRef) -> Result<(), Error> {
        let token = self.scanner.peek(false)?;
        let start = self.scanner.pos();
        if token != Token::ObjectStart {
            return Err(Error::Expected {
                expected: Expected::Object,
                location: self.loc(start),
            });
        }
        let expected = target
            .borrow()
            .descriptor()
            .map_or_else(|| Ty::map(Ty::Any), |d| Ty::Named(d.name.clone()));

        self.depth += 1;
        let result = self.read_object(Some(&expected), start, None, Some(target.clone()));
        self.depth -= 1;

        match result? {
            Read::Value(Value::Object(object)) => *target = object,
            Read::Value(Value::Null) => {}
            Read::Value(other) => {
                return Err(Error::coercion(other.describe(), &expected).with_location(self.loc(start)));
            }
            Read::Forward(id) => {
                return Err(Error::DetachedReference {
                    id,
                    location: self.loc(start),
                });
            }
        }
        Ok(())
    }

    /// Require end of input and apply the unresolved-reference policy.
    pub fn finish(&mut self) -> Result<(), Error> {
        if self.scanner.peek(false)? != Token::End {
            return Err(Error::Expected {
                expected: Expected::EndOfInput,
                location: self.scanner.location(),
            });
        }
        self.check_unresolved()
    }

    fn check_unresolved(&self) -> Result<(), Error> {
        let ids = self.references.unresolved();
        if ids.is_empty() {
            return Ok(());
        }
        match self.options.unresolved_references {
            UnresolvedReferencePolicy::Error => Err(Error::UnresolvedReferences { ids }),
            UnresolvedReferencePolicy::Ignore => {
                tracing::warn!(?ids, "references left unresolved, their slots stay null");
                Ok(())
            }
        }
    }

    #[inline]
    fn loc(&self, offset: usize) -> Location {
        self.scanner.location_of(offset)
    }

    fn read_value(&mut self, expected: &Ty, type_is_hint: bool, skip_converters: bool) -> Result<Value, Error> {
        self.scanner.peek(false)?;
        let start = self.scanner.pos();
        match self.read_inner(expected, type_is_hint, skip_converters, None)? {
            Read::Value(value) => Ok(value),
            Read::Forward(id) => Err(Error::DetachedReference {
                id,
                location: self.loc(start),
            }),
        }
    }

    /// Read one value of any kind.
    ///
    /// Arguments:
    /// - `slot`: where the value will be stored, if that place can be patched later. Structs
    ///   pass it on to their members, since a struct itself cannot be the target of a setter.
    fn read_inner(
        &mut self,
        expected: &Ty,
        type_is_hint: bool,
        skip_converters: bool,
        slot: Option<&DelayedTarget>,
    ) -> Result<Read, Error> {
        let token = self.scanner.peek(false)?;
        let start = self.scanner.pos();

        self.depth += 1;
        let result = if self.depth > self.options.max_depth {
            Err(Error::DepthLimitExceeded {
                limit: self.options.max_depth,
                location: self.loc(start),
            })
        } else {
            self.dispatch(token, start, expected, type_is_hint, skip_converters, slot)
        };
        self.depth -= 1;
        result
    }

    fn dispatch(
        &mut self,
        token: Token,
        start: usize,
        expected: &Ty,
        type_is_hint: bool,
        skip_converters: bool,
        slot: Option<&DelayedTarget>,
    ) -> Result<Read, Error> {
        let registry = self.registry;

        if !skip_converters && let Some(converter) = self.options.converter_for(expected) {
            let ctx = ConverterContext {
                depth: self.depth,
                expected,
                type_is_hint,
                token,
            };
            tracing::trace!(ty = %expected, "value handed to converter");
            return converter
                .read(self, &ctx)
                .map(Read::Value)
                .map_err(|e| e.or_location(|| self.loc(start)));
        }

        let typed = if type_is_hint || expected.is_any() {
            None
        } else {
            Some(expected)
        };

        if let Some(descriptor) = typed.and_then(|ty| registry.descriptor(ty))
            && let Some(hook) = descriptor.hook().cloned()
        {
            return self.read_hooked(descriptor, hook, start).map(Read::Value);
        }

        let value = match token {
            Token::ObjectStart => return self.read_object(typed, start, slot, None),
            Token::ArrayStart => self.read_array(typed, start)?,
            Token::String => self.read_string(typed)?,
            Token::Number => self.read_number(typed)?,
            Token::True | Token::False => {
                self.skip_literal(token);
                self.coerce_at(typed, Value::Bool(token == Token::True), start)?
            }
            Token::Null | Token::Undefined => {
                self.skip_literal(token);
                Value::Null
            }
            Token::NaN | Token::PositiveInfinity | Token::NegativeInfinity => {
                self.skip_literal(token);
                let d = match token {
                    Token::NaN => f64::NAN,
                    Token::PositiveInfinity => f64::INFINITY,
                    _ => f64::NEG_INFINITY,
                };
                self.coerce_at(typed, Value::Double(d), start)?
            }
            Token::End => Value::Null,
            Token::ArrayEnd
            | Token::ObjectEnd
            | Token::ValueDelim
            | Token::NameDelim
            | Token::UnquotedName => {
                return Err(Error::Expected {
                    expected: Expected::Value,
                    location: self.loc(start),
                });
            }
        };
        Ok(Read::Value(value))
    }

    #[inline(never)]
    fn read_hooked(
        &mut self,
        descriptor: &Arc<TypeDescriptor>,
        hook: Arc<dyn SelfSerializing>,
        start: usize,
    ) -> Result<Value, Error> {
        let instance = self
            .registry
            .instantiate(descriptor)
            .map_err(|e| e.with_location(self.loc(start)))?;
        Ok(match instance {
            Value::Object(object) => {
                let mut inner = std::mem::take(&mut *object.borrow_mut());
                let outcome = hook.read_json(&mut inner, self);
                *object.borrow_mut() = inner;
                outcome.map_err(|e| e.or_location(|| self.loc(start)))?;
                Value::Object(object)
            }
            Value::Struct(mut inner) => {
                hook.read_json(&mut inner, self)
                    .map_err(|e| e.or_location(|| self.loc(start)))?;
                Value::Struct(inner)
            }
            other => other,
        })
    }

    fn skip_literal(&mut self, token: Token) {
        if let Some(len) = token.literal_len() {
            self.scanner.advance(len);
        }
    }

    fn coerce_at(&self, typed: Option<&Ty>, value: Value, start: usize) -> Result<Value, Error> {
        match typed {
            Some(ty) => {
                coerce::coerce_type(self.registry, ty, value).map_err(|e| e.or_location(|| self.loc(start)))
            }
            None => Ok(value),
        }
    }

    /// Pick the instance an object record fills. Out of line: the recursive frame of
    /// [`Reader::read_object`] must stay small.
    #[inline(never)]
    fn start_object(
        &self,
        typed: Option<&Ty>,
        start: usize,
        existing: Option<ObjectRef>,
    ) -> Result<Box<Building>, Error> {
        let registry = self.registry;
        let b = match (existing, typed) {
            (Some(object), _) => {
                // An existing instance is a shared handle even when its type is a struct.
                let mut b = Building::new(object);
                b.is_struct = false;
                b
            }
            (None, None) => Building::new(Rc::new(RefCell::new(Object::dictionary()))),
            (None, Some(ty)) => match ty {
                Ty::Map(..) => {
                    let entry = registry.entry_type(ty).map_err(|e| e.with_location(self.loc(start)))?;
                    let mut b = Building::new(Rc::new(RefCell::new(Object::dictionary())));
                    b.map_entry = entry.filter(|t| !t.is_any());
                    b
                }
                Ty::Named(name) => match registry.descriptor(ty) {
                    None => {
                        return Err(Error::UnknownType {
                            type_name: name.to_string(),
                            location: self.loc(start),
                        });
                    }
                    Some(d) if d.is_abstract() => {
                        let mut b = Building::new(Rc::new(RefCell::new(Object::dictionary())));
                        b.pending_abstract = Some(d.name.clone());
                        b
                    }
                    Some(d) => {
                        registry.entry_type(ty).map_err(|e| e.with_location(self.loc(start)))?;
                        match registry.instantiate(d).map_err(|e| e.with_location(self.loc(start)))? {
                            Value::Object(object) => Building::new(object),
                            Value::Struct(object) => Building::new(Rc::new(RefCell::new(*object))),
                            _ => {
                                return Err(Error::coercion("object", ty).with_location(self.loc(start)));
                            }
                        }
                    }
                },
                _ => {
                    return Err(Error::coercion("object", ty).with_location(self.loc(start)));
                }
            },
        };
        Ok(Box::new(b))
    }

    fn read_object(
        &mut self,
        typed: Option<&Ty>,
        start: usize,
        own_slot: Option<&DelayedTarget>,
        existing: Option<ObjectRef>,
    ) -> Result<Read, Error> {
        let mut b = self.start_object(typed, start, existing)?;

        // '{'
        self.scanner.advance(1);
        let unquoted = self.options.allow_unquoted_object_keys;

        loop {
            let token = self.scanner.peek(unquoted)?;
            let key = match token {
                Token::ObjectEnd => {
                    self.scanner.advance(1);
                    break;
                }
                Token::End => return Err(self.unterminated(Construct::Object)),
                Token::String => self.read_string_raw()?,
                Token::UnquotedName => self.scanner.read_unquoted_key().to_owned(),
                _ => {
                    return Err(Error::Expected {
                        expected: Expected::PropertyName,
                        location: self.scanner.location(),
                    });
                }
            };

            match self.scanner.peek(false)? {
                Token::NameDelim => self.scanner.advance(1),
                Token::End => return Err(self.unterminated(Construct::Object)),
                _ => {
                    return Err(Error::Expected {
                        expected: Expected::PropertyNameDelimiter,
                        location: self.scanner.location(),
                    });
                }
            }

            let value_token = self.scanner.peek(false)?;
            if value_token == Token::End {
                return Err(self.unterminated(Construct::Object));
            }
            if !value_token.starts_value() {
                return Err(Error::Expected {
                    expected: Expected::Value,
                    location: self.scanner.location(),
                });
            }
            let value_start = self.scanner.pos();

            if b.forward.is_some() || b.replaced.is_some() {
                // Everything after "@ref" belongs to the referenced object, not to this one.
                self.read_inner(&Ty::Any, true, false, None)?;
            } else if self.options.handle_references && key == TAG_KEY {
                let id = self.read_id(value_start)?;
                b.tag = Some(id);
                if !b.is_struct {
                    self.references
                        .set(id, Value::Object(b.object.clone()))
                        .map_err(|e| e.or_location(|| self.loc(value_start)))?;
                }
            } else if self.options.handle_references && key == REF_KEY {
                let id = self.read_id(value_start)?;
                match self.references.try_get(id) {
                    Some(value) => b.replaced = Some(value),
                    None => b.forward = Some(id),
                }
            } else if key == self.options.type_hint_name {
                let hint = match self.read_inner(&Ty::String, false, true, None)? {
                    Read::Value(Value::String(s)) => s,
                    Read::Value(other) => other.describe(),
                    Read::Forward(id) => format!("@{id}"),
                };
                self.apply_type_hint(&mut b, key, hint, value_start)?;
            } else {
                self.read_member(&mut b, key, value_start, own_slot)?;
            }

            match self.scanner.peek(false)? {
                Token::ValueDelim => self.scanner.advance(1),
                Token::ObjectEnd => {
                    self.scanner.advance(1);
                    break;
                }
                _ => return Err(self.unterminated(Construct::Object)),
            }
        }
        self.finish_object(b, start)
    }

    #[inline(never)]
    fn finish_object(&mut self, b: Box<Building>, start: usize) -> Result<Read, Error> {
        let b = *b;
        if let Some(id) = b.forward {
            return Ok(Read::Forward(id));
        }
        if let Some(value) = b.replaced {
            return Ok(Read::Value(value));
        }
        if b.abandoned {
            return Ok(Read::Value(Value::Null));
        }
        if let Some(name) = b.pending_abstract {
            return Err(Error::UninstantiableType {
                type_name: name.to_string(),
                location: self.loc(start),
            });
        }
        if b.is_struct {
            let object = Rc::try_unwrap(b.object).map_or_else(|o| o.borrow().clone(), RefCell::into_inner);
            let value = Value::Struct(Box::new(object));
            if let Some(id) = b.tag {
                self.references
                    .set(id, value.clone())
                    .map_err(|e| e.or_location(|| self.loc(start)))?;
            }
            return Ok(Read::Value(value));
        }
        Ok(Read::Value(Value::Object(b.object)))
    }

    #[inline(never)]
    fn read_member(
        &mut self,
        b: &mut Building,
        key: String,
        value_start: usize,
        own_slot: Option<&DelayedTarget>,
    ) -> Result<(), Error> {
        let registry = self.registry;
        let slot = b.slot(registry, &key);
        let read_ty = slot.ty().cloned().unwrap_or(Ty::Any);
        let target = if b.is_struct {
            own_slot.map(|s| s.child(Segment::Member(key.clone())))
        } else {
            Some(DelayedTarget::member(&b.object, &key))
        };

        let read = self.read_inner(&read_ty, false, false, target.as_ref())?;
        let by_reference = match &slot {
            Slot::Member(ty) => !ty.is_string(),
            Slot::Entry(ty) => !ty.is_string() && !ty.is_any(),
            Slot::ReadOnly | Slot::Unmapped => false,
        };

        match self.resolve_string_reference(read, by_reference, value_start)? {
            Read::Forward(id) => {
                if slot.ty().is_none() {
                    return Ok(());
                }
                let Some(target) = target else {
                    return Err(Error::DetachedReference {
                        id,
                        location: self.loc(value_start),
                    });
                };
                if matches!(slot, Slot::Entry(_)) {
                    b.object.borrow_mut().insert(key.clone(), Value::Null);
                }
                self.references
                    .add_delayed(id, target)
                    .map_err(|e| e.or_location(|| self.loc(value_start)))?;
                b.assigned.push(key);
            }
            Read::Value(value) => {
                if value.is_null() && self.options.auto_type && matches!(slot, Slot::Entry(_)) {
                    return Ok(());
                }
                if coerce::assign_member(registry, &b.object, &key, value)
                    .map_err(|e| e.or_location(|| self.loc(value_start)))?
                {
                    b.assigned.push(key);
                }
            }
        }
        Ok(())
    }

    /// Switch the object under construction to the type named by `hint`.
    #[inline(never)]
    fn apply_type_hint(&mut self, b: &mut Building, key: String, hint: String, value_start: usize) -> Result<(), Error> {
        let registry = self.registry;
        let Some(descriptor) = registry.resolve_type_hint(&hint, self.options.default_namespace.as_deref()) else {
            tracing::warn!(hint = %hint, "type hint names no registered type");
            if let Some(callback) = self.options.on_invalid_type_hint {
                callback(&hint);
            }
            if self.options.auto_type {
                b.abandoned = true;
            } else if self.options.strict_type_hints {
                return Err(Error::UnknownType {
                    type_name: hint,
                    location: self.loc(value_start),
                });
            } else if b.pending_abstract.is_none() && b.object.borrow().descriptor().is_none() {
                b.object.borrow_mut().insert(key, Value::String(hint));
            }
            return Ok(());
        };

        if descriptor.is_abstract() {
            return Err(Error::UninstantiableType {
                type_name: descriptor.name().to_owned(),
                location: self.loc(value_start),
            });
        }
        if b.object.borrow().type_name() == Some(descriptor.name()) {
            return Ok(());
        }

        let (object, is_struct) = match registry
            .instantiate(&descriptor)
            .map_err(|e| e.with_location(self.loc(value_start)))?
        {
            Value::Object(object) => (object, false),
            Value::Struct(object) => (Rc::new(RefCell::new(*object)), true),
            _ => {
                return Err(Error::coercion(format!("{hint:?}"), "object").with_location(self.loc(value_start)));
            }
        };

        let carried: Vec<(String, Value)> = {
            let old = b.object.borrow();
            b.assigned
                .iter()
                .filter_map(|k| old.get(k).map(|v| (k.clone(), v.clone())))
                .collect()
        };
        for (name, value) in carried {
            coerce::assign_member(registry, &object, &name, value)
                .map_err(|e| e.or_location(|| self.loc(value_start)))?;
        }

        tracing::trace!(ty = descriptor.name(), carried = b.assigned.len(), "type hint applied");
        self.references.retarget(&b.object, &object);
        b.object = object;
        b.is_struct = is_struct;
        b.pending_abstract = None;
        b.map_entry = None;
        if let Some(id) = b.tag
            && !is_struct
        {
            self.references
                .replace(id, Value::Object(b.object.clone()))
                .map_err(|e| e.or_location(|| self.loc(value_start)))?;
        }
        Ok(())
    }

    /// Value of an `"@tag"` or `"@ref"` member: a non-negative integer, or a string holding one.
    fn read_id(&mut self, value_start: usize) -> Result<usize, Error> {
        let value = match self.read_inner(&Ty::Any, true, true, None)? {
            Read::Value(value) => value,
            Read::Forward(id) => Value::string(format!("@{id}")),
        };
        let id = match &value {
            Value::Int(_) | Value::Long(_) => value.as_i64().and_then(|n| usize::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        };
        id.ok_or_else(|| Error::MalformedReference {
            text: value.describe(),
            location: self.loc(value_start),
        })
    }

    /// Turn an `"@N"` string read for a reference slot into the referenced value.
    fn resolve_string_reference(&self, read: Read, by_reference: bool, start: usize) -> Result<Read, Error> {
        match read {
            Read::Value(Value::String(text))
                if by_reference && self.options.handle_references && text.starts_with('@') =>
            {
                let digits = &text[1..];
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::MalformedReference {
                        text,
                        location: self.loc(start),
                    });
                }
                let id: usize = digits.parse().map_err(|_| Error::MalformedReference {
                    text: text.clone(),
                    location: self.loc(start),
                })?;
                Ok(match self.references.try_get(id) {
                    Some(value) => Read::Value(value),
                    None => Read::Forward(id),
                })
            }
            other => Ok(other),
        }
    }

    fn read_array(&mut self, typed: Option<&Ty>, start: usize) -> Result<Value, Error> {
        let (declared, list) = match typed {
            None => (None, false),
            Some(Ty::List(element)) => (Some((**element).clone()), true),
            Some(Ty::Array(element)) => (Some((**element).clone()), false),
            Some(other) => {
                return Err(Error::coercion("array", other).with_location(self.loc(start)));
            }
        };
        let array = Rc::new(RefCell::new(Array::new(Ty::Any, list, Vec::new())));

        // Without a declared element type, the element type is inferred from the items:
        // `None` stands for "any" once `inferred_set` is true.
        let mut inferred: Option<Ty> = None;
        let mut inferred_set = false;

        // '['
        self.scanner.advance(1);
        loop {
            let token = self.scanner.peek(false)?;
            match token {
                Token::ArrayEnd => {
                    self.scanner.advance(1);
                    break;
                }
                Token::End => return Err(self.unterminated(Construct::Array)),
                t if !t.starts_value() => {
                    return Err(Error::Expected {
                        expected: Expected::Value,
                        location: self.scanner.location(),
                    });
                }
                _ => {}
            }
            let value_start = self.scanner.pos();
            let index = array.borrow().items.len();
            let target = DelayedTarget::index(&array, index);

            let (read_ty, is_hint, by_reference) = match &declared {
                Some(ty) => (ty.clone(), false, !ty.is_string()),
                None => {
                    let object_like = inferred.as_ref().is_some_and(|t| self.is_object_like(t));
                    (inferred.clone().unwrap_or(Ty::Any), true, object_like)
                }
            };
            let read = self.read_inner(&read_ty, is_hint, false, Some(&target))?;

            match self.resolve_string_reference(read, by_reference, value_start)? {
                Read::Forward(id) => {
                    array.borrow_mut().items.push(Value::Null);
                    self.references
                        .add_delayed(id, target)
                        .map_err(|e| e.or_location(|| self.loc(value_start)))?;
                    if declared.is_none() {
                        self.infer(&mut inferred, &mut inferred_set, &Value::Null);
                    }
                }
                Read::Value(value) => {
                    let value = match &declared {
                        Some(ty) => self.coerce_at(Some(ty), value, value_start)?,
                        None => {
                            self.infer(&mut inferred, &mut inferred_set, &value);
                            value
                        }
                    };
                    if !(value.is_null() && self.options.auto_type) {
                        array.borrow_mut().items.push(value);
                    }
                }
            }

            match self.scanner.peek(false)? {
                Token::ValueDelim => self.scanner.advance(1),
                Token::ArrayEnd => {
                    self.scanner.advance(1);
                    break;
                }
                _ => return Err(self.unterminated(Construct::Array)),
            }
        }

        let element = match declared {
            Some(ty) => ty,
            None => inferred.unwrap_or(Ty::Any),
        };
        tracing::trace!(element = %element, list, "array read");
        array.borrow_mut().element = element;
        Ok(Value::Array(array))
    }

    /// Update the inferred element type with one more item.
    ///
    /// - a null item turns a value-type element into "any";
    /// - an item that does not fit widens the element to the item type when the item type
    ///   is a supertype, and to "any" otherwise;
    /// - the first item fixes the element type.
    fn infer(&self, inferred: &mut Option<Ty>, set: &mut bool, value: &Value) {
        let registry = self.registry;
        if value.is_null() {
            if inferred.as_ref().is_some_and(|t| registry.is_value_type(t)) {
                *inferred = None;
            }
            *set = true;
            return;
        }
        let actual = value.runtime_ty();
        match inferred {
            Some(current) if !registry.is_assignable(current, &actual) => {
                if registry.is_assignable(&actual, current) {
                    *inferred = Some(actual);
                } else {
                    *inferred = None;
                    *set = true;
                }
            }
            None if !*set => {
                *inferred = Some(actual);
                *set = true;
            }
            _ => {}
        }
    }

    fn is_object_like(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Map(..) => true,
            Ty::Named(_) => !self.registry.is_value_type(ty),
            _ => false,
        }
    }

    fn read_string(&mut self, typed: Option<&Ty>) -> Result<Value, Error> {
        let start = self.scanner.pos();
        let text = self.read_string_raw()?;
        match typed {
            None => Ok(Value::String(text)),
            Some(ty) if ty.is_string() => Ok(Value::String(text)),
            // Reference markup; the caller resolves it against the slot.
            Some(_) if self.options.handle_references && text.starts_with('@') => Ok(Value::String(text)),
            Some(ty) => self.coerce_at(Some(ty), Value::String(text), start),
        }
    }

    /// Read a quoted string at the cursor, single or double quoted.
    ///
    /// Escapes: `\b \f \n \r \t`, `\uXXXX` (surrogate pairs combined, lone surrogates become
    /// U+FFFD), `\0` is dropped, and any other escaped character stands for itself. A `\u`
    /// not followed by four hex digits reads as a literal `u`.
    fn read_string_raw(&mut self) -> Result<String, Error> {
        let start = self.scanner.pos();
        let text = self.scanner.text();
        let rest = self.scanner.rest();
        let unterminated = move || Error::Unterminated {
            construct: Construct::String,
            location: Location::at(text, start),
        };

        let mut chars = rest.char_indices();
        let Some((_, quote)) = chars.next() else {
            return Err(unterminated());
        };
        let mut out = String::new();
        let mut chunk = quote.len_utf8();

        loop {
            let Some((i, c)) = chars.next() else {
                return Err(unterminated());
            };
            if c == quote {
                out.push_str(&rest[chunk..i]);
                self.scanner.advance(i + 1);
                return Ok(out);
            }
            if c != '\\' {
                continue;
            }
            out.push_str(&rest[chunk..i]);
            let Some((j, escaped)) = chars.next() else {
                return Err(unterminated());
            };
            chunk = j + escaped.len_utf8();
            match escaped {
                '0' => {}
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'u' => match hex4(&rest[chunk..]) {
                    Some(unit) => {
                        chars.nth(3);
                        chunk += 4;
                        if (0xD800..0xDC00).contains(&unit) {
                            let tail = &rest[chunk..];
                            let low = tail
                                .strip_prefix("\\u")
                                .and_then(hex4)
                                .filter(|low| (0xDC00..0xE000).contains(low));
                            match low {
                                Some(low) => {
                                    chars.nth(5);
                                    chunk += 6;
                                    let code = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
                                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                                }
                                None => out.push('\u{FFFD}'),
                            }
                        } else {
                            out.push(char::from_u32(unit).unwrap_or('\u{FFFD}'));
                        }
                    }
                    None => out.push('u'),
                },
                other => out.push(other),
            }
        }
    }

    fn read_number(&mut self, typed: Option<&Ty>) -> Result<Value, Error> {
        let start = self.scanner.pos();
        let rest = self.scanner.rest();
        let lexeme = scan_number(rest).map_err(|offset| {
            let end = rest
                .find(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | ']' | '}'))
                .unwrap_or(rest.len());
            Error::IllegalNumber {
                lexeme: rest[..end.max(offset)].to_owned(),
                location: self.loc(start + offset),
            }
        })?;
        self.scanner.advance(lexeme.text.len());

        let prefer_decimal = matches!(typed, Some(Ty::Decimal));
        let value = number_value(&lexeme, prefer_decimal).ok_or_else(|| Error::IllegalNumber {
            lexeme: lexeme.text.to_owned(),
            location: self.loc(start),
        })?;
        self.coerce_at(typed, value, start)
    }

    #[cold]
    fn unterminated(&self, construct: Construct) -> Error {
        Error::Unterminated {
            construct,
            location: self.scanner.location(),
        }
    }
}

fn hex4(s: &str) -> Option<u32> {
    let digits = s.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
