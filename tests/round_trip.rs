use anyhow::Result;
use chrono::DateTime;
use indoc::indoc;
use refjson::{
    Object, Reader, SelfSerializing, Ty, TypeDescriptor, TypeHints, TypeRegistry, Value, Writer, from_str, from_str_as,
    ser, to_string, to_string_as, to_string_with_options, to_writer,
};
use rust_decimal::Decimal;

fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with(
            TypeDescriptor::class("Node")
                .field("name", Ty::String)
                .field("next", Ty::named("Node")),
        )
        .with(TypeDescriptor::abstract_class("Shape").field("label", Ty::String))
        .with(TypeDescriptor::class("Circle").base("Shape").field("radius", Ty::Double))
        .with(TypeDescriptor::class("Drawing").field("shapes", Ty::list(Ty::named("Shape"))))
        .with(TypeDescriptor::enumeration("Color", &[("Red", 1), ("Green", 2)]))
        .with(
            TypeDescriptor::class("Invoice")
                .field("color", Ty::named("Color"))
                .field("issued", Ty::DateTime)
                .field("total", Ty::Decimal),
        )
}

#[test]
fn cycle_survives_write_and_read() -> Result<()> {
    let registry = registry();
    let text = r#"{"@tag": 1, "name": "a", "next": {"name": "b", "next": {"@ref": 1}}}"#;
    let a = from_str_as(&registry, text, &Ty::named("Node"))?;

    let written = to_string_as(&registry, &a, &Ty::named("Node"))?;
    assert_eq!(written, r#"{"@tag":1,"name":"a","next":{"name":"b","next":{"@ref":1}}}"#);

    let back = from_str_as(&registry, &written, &Ty::named("Node"))?;
    let b = back.member("next").unwrap();
    assert!(b.member("next").unwrap().same_identity(&back));

    for node in [&a, &back] {
        node.as_object().unwrap().borrow_mut().remove("next");
    }
    Ok(())
}

#[test]
fn shared_dictionary_keeps_identity() -> Result<()> {
    let registry = TypeRegistry::new();
    let shared = Value::object(Object::dictionary().with("n", Value::Int(1)));
    let doc = Value::object(Object::dictionary().with("x", shared.clone()).with("y", shared));

    let text = to_string(&registry, &doc)?;
    assert_eq!(text, r#"{"x":{"@tag":1,"n":1},"y":{"@ref":1}}"#);

    let back = from_str(&registry, &text)?;
    assert!(back.member("x").unwrap().same_identity(&back.member("y").unwrap()));
    Ok(())
}

#[test]
fn standard_json_matches_serde_json() -> Result<()> {
    let registry = TypeRegistry::new();
    let text = r#"{"name":"box","sizes":[1,2,3],"ratio":0.5,"on":true,"none":null,"nested":{"k":"v\n"}}"#;
    let value = from_str(&registry, text)?;
    let written = to_string(&registry, &value)?;

    let expected: serde_json::Value = serde_json::from_str(text)?;
    let actual: serde_json::Value = serde_json::from_str(&written)?;
    assert_eq!(actual, expected);
    assert_eq!(written, text);
    Ok(())
}

#[test]
fn relaxed_input_is_normalized() -> Result<()> {
    let registry = TypeRegistry::new();
    let text = indoc! {r#"
        // settings
        {'a': +1, /* c */ "b": NaN, "c": [1, 2,], "d": undefined}
    "#};
    let value = from_str(&registry, text)?;
    assert_eq!(to_string(&registry, &value)?, r#"{"a":1,"b":NaN,"c":[1,2],"d":null}"#);
    Ok(())
}

#[test]
fn doubles_keep_a_fraction() -> Result<()> {
    let registry = TypeRegistry::new();
    let value = Value::array(vec![
        Value::Double(3.0),
        Value::Double(0.25),
        Value::Double(f64::INFINITY),
        Value::Double(f64::NEG_INFINITY),
    ]);
    let text = to_string(&registry, &value)?;
    assert_eq!(text, "[3.0,0.25,Infinity,-Infinity]");

    let back = from_str(&registry, &text)?;
    assert_eq!(back, value);
    Ok(())
}

#[test]
fn polymorphic_elements_carry_hints() -> Result<()> {
    let registry = registry();
    let text = r#"{"shapes": [{"Class/Type": "Circle", "label": "c", "radius": 2}]}"#;
    let drawing = from_str_as(&registry, text, &Ty::named("Drawing"))?;

    let written = to_string_as(&registry, &drawing, &Ty::named("Drawing"))?;
    assert_eq!(written, r#"{"shapes":[{"Class/Type":"Circle","label":"c","radius":2.0}]}"#);

    let back = from_str_as(&registry, &written, &Ty::named("Drawing"))?;
    assert_eq!(back, drawing);
    Ok(())
}

#[test]
fn type_hint_policies() -> Result<()> {
    let registry = registry();
    let node = from_str_as(&registry, r#"{"name": "solo"}"#, &Ty::named("Node"))?;

    assert_eq!(to_string_as(&registry, &node, &Ty::named("Node"))?, r#"{"name":"solo","next":null}"#);
    assert_eq!(
        to_string(&registry, &node)?,
        r#"{"Class/Type":"Node","name":"solo","next":null}"#
    );

    let always = refjson::writer_options! { type_hints: TypeHints::Always };
    assert_eq!(
        to_string_with_options(&registry, &node, &Ty::named("Node"), always)?,
        r#"{"Class/Type":"Node","name":"solo","next":null}"#
    );

    let never = refjson::writer_options! { type_hints: TypeHints::Never };
    let text = to_string_with_options(&registry, &node, &Ty::Any, never)?;
    assert_eq!(text, r#"{"name":"solo","next":null}"#);
    assert!(from_str(&registry, &text)?.as_object().unwrap().borrow().is_dictionary());
    Ok(())
}

#[test]
fn custom_hint_name_on_both_sides() -> Result<()> {
    let registry = registry();
    let node = from_str_as(&registry, r#"{"name": "x"}"#, &Ty::named("Node"))?;
    let opts = refjson::writer_options! { type_hint_name: "$type".to_owned() };
    let text = to_string_with_options(&registry, &node, &Ty::Any, opts)?;
    assert_eq!(text, r#"{"$type":"Node","name":"x","next":null}"#);

    let options = refjson::options! { type_hint_name: "$type".to_owned() };
    let back = refjson::from_str_with_options(&registry, &text, &Ty::Any, options)?;
    assert_eq!(back.as_object().unwrap().borrow().type_name(), Some("Node"));
    Ok(())
}

#[test]
fn tag_all_tags_every_object() -> Result<()> {
    let registry = TypeRegistry::new();
    let value = Value::array(vec![
        Value::object(Object::dictionary().with("a", Value::Int(1))),
        Value::object(Object::dictionary()),
    ]);
    let opts = refjson::writer_options! { tag_all: true };
    let text = to_string_with_options(&registry, &value, &Ty::Any, opts)?;
    assert_eq!(text, r#"[{"@tag":1,"a":1},{"@tag":2}]"#);
    Ok(())
}

#[test]
fn references_disabled_repeat_objects() -> Result<()> {
    let registry = TypeRegistry::new();
    let shared = Value::object(Object::dictionary().with("n", Value::Int(1)));
    let value = Value::array(vec![shared.clone(), shared]);
    let opts = refjson::writer_options! { handle_references: false };
    let text = to_string_with_options(&registry, &value, &Ty::Any, opts)?;
    assert_eq!(text, r#"[{"n":1},{"n":1}]"#);
    Ok(())
}

#[test]
fn enum_date_and_decimal_members() -> Result<()> {
    let registry = registry();
    let text = r#"{"color": "Green", "issued": "2024-03-01T10:00:00+02:00", "total": 19.99}"#;
    let invoice = from_str_as(&registry, text, &Ty::named("Invoice"))?;

    let issued = DateTime::parse_from_rfc3339("2024-03-01T10:00:00+02:00")?;
    assert_eq!(invoice.member("issued"), Some(Value::DateTime(issued)));
    assert_eq!(invoice.member("total"), Some(Value::Decimal(Decimal::new(1999, 2))));

    let written = to_string_as(&registry, &invoice, &Ty::named("Invoice"))?;
    assert_eq!(
        written,
        r#"{"color":"Green","issued":"2024-03-01T10:00:00+02:00","total":19.99}"#
    );
    assert_eq!(from_str_as(&registry, &written, &Ty::named("Invoice"))?, invoice);
    Ok(())
}

#[test]
fn pretty_output_reads_back() -> Result<()> {
    let registry = registry();
    let text = r#"{"@tag": 1, "name": "a", "next": {"@ref": 1}}"#;
    let node = from_str_as(&registry, text, &Ty::named("Node"))?;

    let opts = refjson::writer_options! { pretty: true };
    let pretty = to_string_with_options(&registry, &node, &Ty::named("Node"), opts)?;
    assert_eq!(
        pretty,
        indoc! {r#"
            {
              "@tag": 1,
              "name": "a",
              "next": {
                "@ref": 1
              }
            }"#}
    );

    let back = from_str_as(&registry, &pretty, &Ty::named("Node"))?;
    assert!(back.member("next").unwrap().same_identity(&back));

    for n in [&node, &back] {
        n.as_object().unwrap().borrow_mut().remove("next");
    }
    Ok(())
}

#[test]
fn to_writer_fills_a_byte_buffer() -> Result<()> {
    let registry = TypeRegistry::new();
    let value = Value::array(vec![Value::string("é"), Value::Long(1 << 40)]);
    let mut out = Vec::new();
    to_writer(&mut out, &registry, &value, &Ty::Any, Default::default())?;
    assert_eq!(String::from_utf8(out)?, r#"["é",1099511627776]"#);
    Ok(())
}

/// Counters written as a bare number.
struct CounterText;

impl SelfSerializing for CounterText {
    fn read_json(&self, target: &mut Object, reader: &mut Reader<'_>) -> Result<(), refjson::Error> {
        let n = reader.read(&Ty::Int, false)?;
        target.insert("n", n);
        Ok(())
    }

    fn write_json(&self, source: &Object, writer: &mut Writer<'_>) -> ser::Result<()> {
        writer.write_value(&source.get("n").cloned().unwrap_or(Value::Int(0)), &Ty::Int)
    }
}

#[test]
fn shared_self_serializing_object_is_written_by_value() -> Result<()> {
    let registry = TypeRegistry::new()
        .with(TypeDescriptor::class("Counter").field("n", Ty::Int).self_serializing(CounterText));
    let counter = registry.instantiate(registry.get("Counter").unwrap())?;
    counter.as_object().unwrap().borrow_mut().insert("n", Value::Int(4));
    let pair = Value::array(vec![counter.clone(), counter]);

    let written = to_string_as(&registry, &pair, &Ty::list(Ty::named("Counter")))?;
    assert_eq!(written, "[4,4]");

    let options = refjson::options! { unresolved_references: refjson::UnresolvedReferencePolicy::Error };
    let back = refjson::from_str_with_options(&registry, &written, &Ty::list(Ty::named("Counter")), options)?;
    let items = back.as_array().unwrap().borrow().items.clone();
    for item in &items {
        assert_eq!(item.member("n"), Some(Value::Int(4)));
    }
    Ok(())
}
