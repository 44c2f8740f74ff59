//! `miette` integration.
//!
//! This module is feature-gated behind the `miette` feature.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};

use crate::Error;
use crate::Location;

/// Convert a reader [`Error`] into a `miette::Report`.
///
/// This function takes the document `source` and a display `file` name/path.
///
/// # Example
///
/// ```rust,no_run
/// let text = "{\"a\": }";
///
/// let registry = refjson::TypeRegistry::new();
/// let err = refjson::from_str(&registry, text).expect_err("missing value");
/// let report = refjson::miette::to_miette_report(&err, text, "scene.json");
///
/// // `Debug` formatting uses miette's graphical reporter.
/// eprintln!("{report:?}");
/// ```
///
/// Notes:
/// - [`Error`] does not retain the input text; this helper owns a copy of `source`.
/// - If the error has no known location, the report will not include labels.
pub fn to_miette_report(err: &Error, source: &str, file: &str) -> miette::Report {
    let src = Arc::new(NamedSource::new(file, source.to_owned()));
    let diag = build_diagnostic(err.without_snippet(), source, src);
    miette::Report::new(diag)
}

#[derive(Clone, Debug)]
struct ErrorDiagnostic {
    message: String,
    src: Arc<NamedSource<String>>,
    labels: Vec<LabeledSpan>,
}

impl fmt::Display for ErrorDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorDiagnostic {}

impl Diagnostic for ErrorDiagnostic {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Box::new(self.labels.clone().into_iter()))
        }
    }
}

fn build_diagnostic(err: &Error, text: &str, src: Arc<NamedSource<String>>) -> ErrorDiagnostic {
    let message = err.message();
    let mut labels = Vec::new();
    if let Some(loc) = err.location()
        && let Some(span) = to_source_span(text, &loc)
    {
        labels.push(LabeledSpan::new_with_span(Some(message.clone()), span));
    }
    ErrorDiagnostic { message, src, labels }
}

/// One-character span at the error offset, clamped to the input.
fn to_source_span(text: &str, location: &Location) -> Option<SourceSpan> {
    if *location == Location::UNKNOWN {
        return None;
    }
    let offset = location.offset();
    if offset > text.len() {
        return None;
    }
    let len = text[offset..].chars().next().map_or(0, char::len_utf8);
    Some(SourceSpan::new(offset.into(), len))
}
