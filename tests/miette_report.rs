#![cfg(feature = "miette")]

use refjson::{Ty, TypeRegistry, from_str_with_options};

#[test]
fn report_carries_source_and_label() {
    let registry = TypeRegistry::new();
    let text = "{\n  \"a\": [1, 2,\n  @x]\n}";
    let err = refjson::from_str(&registry, text).unwrap_err();
    let report = refjson::miette::to_miette_report(&err, text, "doc.json");

    let labels: Vec<_> = report.labels().expect("labels").collect();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].offset(), text.find('@').unwrap());
    assert!(report.source_code().is_some());

    let rendered = format!("{report:?}");
    assert!(rendered.contains("doc.json"), "{rendered}");
    assert!(rendered.contains("@x]"), "{rendered}");
}

#[test]
fn report_of_unwrapped_error() {
    let registry = TypeRegistry::new();
    let opts = refjson::options! { with_snippet: false };
    let err = from_str_with_options(&registry, "[1, 2", &Ty::Any, opts).unwrap_err();
    let report = refjson::miette::to_miette_report(&err, "[1, 2", "doc.json");
    assert_eq!(report.to_string(), "unterminated array");
    let labels: Vec<_> = report.labels().expect("labels").collect();
    assert_eq!(labels[0].offset(), 5);
}
