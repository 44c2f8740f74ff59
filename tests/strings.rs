use indoc::indoc;
use refjson::{Construct, Error, Ty, TypeRegistry, Value, from_str, from_str_as};

fn read(text: &str) -> Result<Value, Error> {
    from_str(&TypeRegistry::new(), text)
}

#[test]
fn single_and_double_quotes() -> anyhow::Result<()> {
    assert_eq!(read(r#""double""#)?, Value::string("double"));
    assert_eq!(read("'single'")?, Value::string("single"));
    assert_eq!(read(r#"'it\'s'"#)?, Value::string("it's"));
    assert_eq!(read(r#""a 'b' c""#)?, Value::string("a 'b' c"));
    Ok(())
}

#[test]
fn standard_escapes() -> anyhow::Result<()> {
    let v = read(r#""\b\f\n\r\t\"\\\/""#)?;
    assert_eq!(v.as_str(), Some("\u{8}\u{c}\n\r\t\"\\/"));
    Ok(())
}

#[test]
fn unicode_escapes() -> anyhow::Result<()> {
    assert_eq!(read(r#""\u00e9\u4E2D""#)?, Value::string("\u{e9}\u{4e2d}"));
    assert_eq!(read(r#""\uD83D\uDE80""#)?, Value::string("\u{1F680}"));
    Ok(())
}

#[test]
fn non_ascii_passes_through() -> anyhow::Result<()> {
    assert_eq!(read("\"Grüße, мир\"")?, Value::string("Grüße, мир"));
    Ok(())
}

#[test]
fn comments_around_values() -> anyhow::Result<()> {
    let text = indoc! {r#"
        // leading line comment
        /* block
           comment */ "value" // trailing
    "#};
    assert_eq!(read(text)?, Value::string("value"));
    Ok(())
}

#[test]
fn strings_convert_into_typed_slots() -> anyhow::Result<()> {
    let registry = TypeRegistry::new();
    assert_eq!(from_str_as(&registry, "'12'", &Ty::Int)?, Value::Int(12));
    assert_eq!(from_str_as(&registry, "'TRUE'", &Ty::Bool)?, Value::Bool(true));
    assert_eq!(from_str_as(&registry, "'2.5'", &Ty::Double)?, Value::Double(2.5));
    let v = from_str_as(&registry, "'2024-05-01T10:00:00+02:00'", &Ty::DateTime)?;
    match v {
        Value::DateTime(t) => assert_eq!(t.to_rfc3339(), "2024-05-01T10:00:00+02:00"),
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn numbers_convert_into_string_slots() -> anyhow::Result<()> {
    let registry = TypeRegistry::new();
    assert_eq!(from_str_as(&registry, "15", &Ty::String)?, Value::string("15"));
    assert_eq!(from_str_as(&registry, "true", &Ty::String)?, Value::string("true"));
    Ok(())
}

#[test]
fn unterminated_string() {
    let err = read("{\"a\": \"open").unwrap_err();
    match err.without_snippet() {
        Error::Unterminated { construct, location } => {
            assert_eq!(*construct, Construct::String);
            assert_eq!((location.line(), location.column()), (1, 7));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unterminated_escape_at_end() {
    let err = read("'abc\\").unwrap_err();
    assert!(matches!(
        err.without_snippet(),
        Error::Unterminated { construct: Construct::String, .. }
    ));
}
