use indoc::indoc;
use refjson::{Ty, TypeDescriptor, TypeRegistry, from_str, from_str_as, from_str_with_options};

/// The rendered error includes source text, not only the location and message.
#[test]
fn error_renders_snippet_text_when_available() {
    let registry = TypeRegistry::new();
    let err = from_str(&registry, "{\"a\": }").expect_err("missing value should error");
    let rendered = err.to_string();

    assert!(rendered.contains("<input>"), "expected path in snippet output, got:\n{rendered}");
    assert!(
        rendered.contains("line 1 column 7: expected value"),
        "expected title with location and message, got:\n{rendered}"
    );
    assert!(rendered.contains("{\"a\": }"), "expected source line, got:\n{rendered}");
    assert!(rendered.contains('^'), "expected caret marker, got:\n{rendered}");
    assert!(!rendered.contains('━'), "expected ASCII decorations, got:\n{rendered}");
}

#[test]
fn snippet_includes_context_lines() {
    let registry = TypeRegistry::new().with(TypeDescriptor::class("Doc").field("count", Ty::Int));
    let text = indoc! {r#"
        {
          // how many
          "count": "many",
          "after": 1
        }
    "#};
    let err = from_str_as(&registry, text, &Ty::named("Doc")).expect_err("coercion should fail");
    let rendered = err.to_string();

    assert!(rendered.contains("line 3 column 12"), "got:\n{rendered}");
    assert!(rendered.contains("// how many"), "expected line before, got:\n{rendered}");
    assert!(rendered.contains("\"count\": \"many\""), "expected error line, got:\n{rendered}");
    assert!(rendered.contains("\"after\": 1"), "expected line after, got:\n{rendered}");
}

#[test]
fn snippet_crops_very_long_lines_around_error_column() {
    let registry = TypeRegistry::new();
    let text = format!("[{}, @bad]", "1234567890, ".repeat(20).trim_end_matches([',', ' ']));
    let opts = refjson::options! { crop_radius: 10 };
    let err = from_str_with_options(&registry, &text, &Ty::Any, opts).expect_err("bare @ should error");
    let rendered = err.to_string();

    assert!(rendered.contains("@bad"), "expected offending text, got:\n{rendered}");
    assert!(
        !rendered.contains(&text),
        "expected the long line to be cropped, got:\n{rendered}"
    );
}

#[test]
fn snippet_can_be_disabled() {
    let registry = TypeRegistry::new();
    for opts in [
        refjson::options! { with_snippet: false },
        refjson::options! { crop_radius: 0 },
    ] {
        let err = from_str_with_options(&registry, "{\"a\": }", &Ty::Any, opts).unwrap_err();
        assert!(!matches!(err, refjson::Error::WithSnippet { .. }));
        assert_eq!(err.to_string(), "expected value at line 1, column 7");
    }
}

#[test]
fn errors_without_location_render_plain() {
    let registry = TypeRegistry::new();
    let opts = refjson::options! {
        unresolved_references: refjson::UnresolvedReferencePolicy::Error,
    };
    let err = from_str_with_options(&registry, "[{\"@ref\": 9}]", &Ty::Any, opts).unwrap_err();
    assert_eq!(err.to_string(), "unresolved references: @9");
}
