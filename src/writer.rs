//! Writer: [`Value`] graphs back to text.
//!
//! Objects reachable more than once are tagged with `"@tag": N` where they are first written
//! and referenced with `{"@ref": N}` afterwards, so shared identity and cycles survive a
//! round trip through [`crate::from_str`].

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write};
use std::rc::Rc;

use nohash_hasher::BuildNoHashHasher;

use crate::reader::{REF_KEY, TAG_KEY};
use crate::registry::TypeRegistry;
use crate::ser::{self, Error};
use crate::types::Ty;
use crate::value::{Object, ObjectRef, Value};
use crate::writer_options::{TypeHints, WriterOptions};
use crate::zmij_format::write_float_string;

type IdentityMap = HashMap<usize, usize, BuildNoHashHasher<usize>>;
type IdentitySet = HashSet<usize, BuildNoHashHasher<usize>>;

/// Streaming writer.
///
/// Handed to [`crate::Converter::write`] and [`crate::SelfSerializing::write_json`]; the
/// `begin_*`/`end_*` helpers take care of separators and indentation.
pub struct Writer<'a> {
    out: &'a mut dyn Write,
    registry: &'a TypeRegistry,
    options: WriterOptions,
    /// Occurrences of each object, from the pre-pass.
    occurrences: IdentityMap,
    /// Tag ids assigned so far.
    tags: IdentityMap,
    next_tag: usize,
    depth: usize,
    /// One entry per open container: whether it is still empty.
    open: Vec<bool>,
}

impl<'a> Writer<'a> {
    pub fn new(out: &'a mut dyn Write, registry: &'a TypeRegistry, options: WriterOptions) -> Self {
        Self {
            out,
            registry,
            options,
            occurrences: IdentityMap::default(),
            tags: IdentityMap::default(),
            next_tag: 1,
            depth: 0,
            open: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Write `value` as a whole document, declared as `declared`.
    pub fn write_document(&mut self, value: &Value, declared: &Ty) -> ser::Result<()> {
        if self.options.handle_references {
            let mut arrays = IdentitySet::default();
            count_objects(value, &mut self.occurrences, &mut arrays);
        }
        self.write_value(value, declared)
    }

    /// Write one value, consulting converters first.
    pub fn write_value(&mut self, value: &Value, declared: &Ty) -> ser::Result<()> {
        let converter = self
            .options
            .converter_for(declared)
            .or_else(|| self.options.converter_for(&value.runtime_ty()));
        match converter {
            Some(converter) => converter.write(self, value, declared),
            None => self.write_value_skip_converters(value, declared),
        }
    }

    /// Write one value with the built-in rules only.
    pub fn write_value_skip_converters(&mut self, value: &Value, declared: &Ty) -> ser::Result<()> {
        match value {
            Value::Null => self.write_raw("null"),
            Value::Bool(b) => self.write_raw(if *b { "true" } else { "false" }),
            Value::Int(i) => Ok(write!(self.out, "{i}")?),
            Value::Long(l) => Ok(write!(self.out, "{l}")?),
            Value::Double(d) => write_float_string(&mut *self.out, *d),
            Value::Decimal(d) => Ok(write!(self.out, "{d}")?),
            Value::String(s) => self.write_string(s),
            Value::DateTime(t) => self.write_string(&t.to_rfc3339()),
            Value::Enum(e) => self.write_string(&e.name),
            Value::Array(array) => {
                let array = array.borrow();
                let element = declared.element().cloned().unwrap_or_else(|| array.element.clone());
                self.begin_array()?;
                for item in &array.items {
                    self.write_element(item, &element)?;
                }
                self.end_array()
            }
            Value::Object(object) => self.write_object(object, declared),
            Value::Struct(object) => self.write_members(object, declared, None),
        }
    }

    /// Write text as is.
    pub fn write_raw(&mut self, text: &str) -> ser::Result<()> {
        Ok(self.out.write_str(text)?)
    }

    /// Write a double-quoted, escaped string.
    pub fn write_string(&mut self, s: &str) -> ser::Result<()> {
        self.out.write_char('"')?;
        let mut chunk = 0;
        for (i, c) in s.char_indices() {
            let escaped = match c {
                '"' => "\\\"",
                '\\' => "\\\\",
                '\n' => "\\n",
                '\r' => "\\r",
                '\t' => "\\t",
                '\u{8}' => "\\b",
                '\u{c}' => "\\f",
                c if (c as u32) < 0x20 => {
                    self.out.write_str(&s[chunk..i])?;
                    write!(self.out, "\\u{:04x}", c as u32)?;
                    chunk = i + 1;
                    continue;
                }
                _ => continue,
            };
            self.out.write_str(&s[chunk..i])?;
            self.out.write_str(escaped)?;
            chunk = i + c.len_utf8();
        }
        self.out.write_str(&s[chunk..])?;
        self.out.write_char('"')?;
        Ok(())
    }

    pub fn begin_object(&mut self) -> ser::Result<()> {
        self.open('{')
    }

    /// Write `"name": value` inside an object opened with [`Writer::begin_object`].
    pub fn write_member(&mut self, name: &str, value: &Value, declared: &Ty) -> ser::Result<()> {
        self.separator()?;
        self.write_string(name)?;
        self.write_raw(if self.options.pretty { ": " } else { ":" })?;
        self.write_value(value, declared)
    }

    pub fn end_object(&mut self) -> ser::Result<()> {
        self.close('}')
    }

    pub fn begin_array(&mut self) -> ser::Result<()> {
        self.open('[')
    }

    /// Write one item inside an array opened with [`Writer::begin_array`].
    pub fn write_element(&mut self, value: &Value, declared: &Ty) -> ser::Result<()> {
        self.separator()?;
        self.write_value(value, declared)
    }

    pub fn end_array(&mut self) -> ser::Result<()> {
        self.close(']')
    }

    fn open(&mut self, bracket: char) -> ser::Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(Error::DepthLimitExceeded {
                limit: self.options.max_depth,
            });
        }
        self.open.push(true);
        Ok(self.out.write_char(bracket)?)
    }

    fn close(&mut self, bracket: char) -> ser::Result<()> {
        let empty = self.open.pop().unwrap_or(true);
        self.depth = self.depth.saturating_sub(1);
        if self.options.pretty && !empty {
            self.newline()?;
        }
        Ok(self.out.write_char(bracket)?)
    }

    fn separator(&mut self) -> ser::Result<()> {
        if let Some(empty) = self.open.last_mut() {
            if !*empty {
                self.out.write_char(',')?;
            }
            *empty = false;
        }
        if self.options.pretty {
            self.newline()?;
        }
        Ok(())
    }

    fn newline(&mut self) -> ser::Result<()> {
        self.out.write_char('\n')?;
        for _ in 0..self.depth * self.options.indent_step {
            self.out.write_char(' ')?;
        }
        Ok(())
    }

    fn write_object(&mut self, object: &ObjectRef, declared: &Ty) -> ser::Result<()> {
        let identity = Rc::as_ptr(object) as usize;
        let mut tag = None;
        // Hooks write their own text, so there is nowhere to put a tag: such objects are
        // written by value at every occurrence.
        let hooked = object.borrow().descriptor().is_some_and(|d| d.hook().is_some());
        if self.options.handle_references && !hooked {
            if let Some(&id) = self.tags.get(&identity) {
                tracing::trace!(id, "writing repeated object as reference");
                if self.options.string_references && matches!(declared, Ty::Named(_)) {
                    return self.write_string(&format!("@{id}"));
                }
                self.begin_object()?;
                self.write_member(REF_KEY, &Value::Long(id as i64), &Ty::Long)?;
                return self.end_object();
            }
            if self.options.tag_all || self.occurrences.get(&identity).is_some_and(|n| *n > 1) {
                let id = self.next_tag;
                self.next_tag += 1;
                self.tags.insert(identity, id);
                tag = Some(id);
            }
        }
        let object = object.borrow();
        self.write_members(&object, declared, tag)
    }

    fn write_members(&mut self, object: &Object, declared: &Ty, tag: Option<usize>) -> ser::Result<()> {
        let registry = self.registry;
        let descriptor = object.descriptor().cloned();

        if let Some(hook) = descriptor.as_ref().and_then(|d| d.hook().cloned()) {
            return hook.write_json(object, self);
        }

        self.begin_object()?;
        if let Some(d) = &descriptor {
            let hint = match self.options.type_hints {
                TypeHints::Always => true,
                TypeHints::Never => false,
                TypeHints::Auto => d.emits_type_hint() || declared.name() != Some(d.name()),
            };
            if hint {
                let key = self.options.type_hint_name.clone();
                self.write_member(&key, &Value::string(d.name()), &Ty::String)?;
            }
        }
        if let Some(id) = tag {
            self.write_member(TAG_KEY, &Value::Long(id as i64), &Ty::Long)?;
        }

        match &descriptor {
            Some(d) => {
                let members = registry.member_map(d);
                for (name, member) in members.iter() {
                    let value = object.get(name).cloned().unwrap_or(Value::Null);
                    self.write_member(name, &value, &member.ty)?;
                }
                if let Some(entry) = d.dictionary_value() {
                    for (name, value) in object.members() {
                        if !members.contains_key(name) {
                            self.write_member(name, value, entry)?;
                        }
                    }
                }
            }
            None => {
                let entry = match declared {
                    Ty::Map(_, value) => (**value).clone(),
                    _ => Ty::Any,
                };
                for (name, value) in object.members() {
                    self.write_member(name, value, &entry)?;
                }
            }
        }
        self.end_object()
    }
}

/// Count how often each object is reachable. Objects seen once are not descended into again,
/// so cycles terminate.
fn count_objects(value: &Value, occurrences: &mut IdentityMap, arrays: &mut IdentitySet) {
    match value {
        Value::Object(object) => {
            let count = occurrences.entry(Rc::as_ptr(object) as usize).or_insert(0);
            *count += 1;
            if *count == 1 {
                for (_, member) in object.borrow().members() {
                    count_objects(member, occurrences, arrays);
                }
            }
        }
        Value::Array(array) => {
            if arrays.insert(Rc::as_ptr(array) as usize) {
                for item in &array.borrow().items {
                    count_objects(item, occurrences, arrays);
                }
            }
        }
        Value::Struct(object) => {
            for (_, member) in object.members() {
                count_objects(member, occurrences, arrays);
            }
        }
        _ => {}
    }
}

/// Serialize `value` to a compact string, declared as [`Ty::Any`].
///
/// ```
/// use refjson::{Object, TypeRegistry, Value};
///
/// let registry = TypeRegistry::new();
/// let node = Value::object(Object::dictionary().with("name", Value::string("n")));
/// let pair = Value::array(vec![node.clone(), node]);
/// let text = refjson::to_string(&registry, &pair).unwrap();
/// assert_eq!(text, r#"[{"@tag":1,"name":"n"},{"@ref":1}]"#);
/// ```
pub fn to_string(registry: &TypeRegistry, value: &Value) -> ser::Result<String> {
    to_string_as(registry, value, &Ty::Any)
}

/// Serialize `value` as it would be stored in a slot of type `declared`.
pub fn to_string_as(registry: &TypeRegistry, value: &Value, declared: &Ty) -> ser::Result<String> {
    to_string_with_options(registry, value, declared, WriterOptions::default())
}

pub fn to_string_with_options(
    registry: &TypeRegistry,
    value: &Value,
    declared: &Ty,
    options: WriterOptions,
) -> ser::Result<String> {
    let mut out = String::new();
    to_fmt_writer(&mut out, registry, value, declared, options)?;
    Ok(out)
}

/// Serialize into any [`fmt::Write`] target.
pub fn to_fmt_writer<W: fmt::Write>(
    out: &mut W,
    registry: &TypeRegistry,
    value: &Value,
    declared: &Ty,
    options: WriterOptions,
) -> ser::Result<()> {
    Writer::new(out, registry, options).write_document(value, declared)
}

/// Serialize into a [`std::io::Write`] target.
pub fn to_writer<W: std::io::Write>(
    mut out: W,
    registry: &TypeRegistry,
    value: &Value,
    declared: &Ty,
    options: WriterOptions,
) -> ser::Result<()> {
    let text = to_string_with_options(registry, value, declared, options)?;
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(())
}
