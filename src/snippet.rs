//! rustc-like source snippets for reader errors.

use annotate_snippets::{AnnotationKind, Level, Renderer, Snippet, renderer::DecorStyle};

use crate::Location;

/// Render `msg` with a small window of `text` around `location`.
///
/// The window covers two lines before and after the error line. Lines longer than
/// `2 * crop_radius` characters are cropped horizontally around the error column so
/// minified single-line documents still render readable output.
///
/// Called by:
/// - [`crate::Error::with_snippet`] when `Options::with_snippet` is set.
#[cold]
#[inline(never)]
pub(crate) fn render(
    text: &str,
    path: &str,
    msg: &str,
    location: &Location,
    crop_radius: usize,
) -> String {
    if text.is_empty() || location == &Location::UNKNOWN {
        return msg.to_owned();
    }

    let starts = line_starts(text);
    let row = location.line as usize;
    let col = location.column as usize;
    if row == 0 || row > starts.len() {
        return msg.to_owned();
    }

    // Two lines before/after, clipped to input boundaries.
    let total_lines = starts.len();
    let window_start_row = row.saturating_sub(2).max(1);
    let window_end_row = row.saturating_add(2).min(total_lines);
    let window_start = starts[window_start_row - 1];
    let window_end = if window_end_row < total_lines {
        starts[window_end_row]
    } else {
        text.len()
    };

    let offset = location.offset.clamp(window_start, window_end);
    let mut out = String::new();
    let mut span_start = 0usize;
    let mut span_end = 0usize;
    let mut line_no = window_start_row;

    for line in text[window_start..window_end].split_inclusive('\n') {
        let line_begin = starts[line_no - 1];
        let content = line.trim_end_matches(['\n', '\r']);
        let (cropped, skipped_bytes) = crop_line(content, col, crop_radius);
        if line_no == row {
            let in_line = offset
                .saturating_sub(line_begin)
                .saturating_sub(skipped_bytes)
                .min(cropped.len());
            span_start = out.len() + in_line;
            span_end = match cropped[in_line..].chars().next() {
                Some(c) => span_start + c.len_utf8(),
                None => span_start,
            };
        }
        out.push_str(cropped);
        out.push('\n');
        line_no += 1;
    }

    let report = &[Level::ERROR
        .primary_title(format!("line {row} column {col}: {msg}"))
        .element(
            Snippet::source(&out)
                .line_start(window_start_row)
                .path(path)
                .fold(false)
                .annotation(AnnotationKind::Primary.span(span_start..span_end).label(msg)),
        )];

    // Plain ASCII decorations keep error strings stable and free of escape sequences.
    let renderer = Renderer::plain().decor_style(DecorStyle::Ascii);
    renderer.render(report).to_string()
}

/// Crop `line` to the character columns `[col - radius, col + radius]`.
///
/// Returns the cropped text and the number of bytes removed from its start.
fn crop_line(line: &str, col: usize, radius: usize) -> (&str, usize) {
    if radius == 0 || line.chars().count() <= radius.saturating_mul(2) {
        return (line, 0);
    }
    let left_col = col.saturating_sub(radius).max(1);
    let right_col = col.saturating_add(radius);
    let mut begin = line.len();
    let mut end = line.len();
    for (n, (i, _)) in line.char_indices().enumerate() {
        let column = n + 1;
        if column == left_col {
            begin = i;
        }
        if column == right_col + 1 {
            end = i;
            break;
        }
    }
    let begin = begin.min(end);
    (&line[begin..end], begin)
}

fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (i, b) in source.as_bytes().iter().enumerate() {
        if *b == b'\n' && i + 1 < source.len() {
            starts.push(i + 1);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_caret_under_error() {
        let text = "{\n  \"a\": }\n";
        let location = Location::at(text, 9);
        let rendered = render(text, "<input>", "expected value", &location, 60);
        assert!(rendered.contains("line 2 column 8: expected value"), "{rendered}");
        assert!(rendered.contains("\"a\": }"), "{rendered}");
        assert!(rendered.contains('^'), "{rendered}");
    }

    #[test]
    fn crops_long_lines() {
        let (cropped, skipped) = crop_line("0123456789abcdefghij", 15, 3);
        assert_eq!(cropped, "bcdefgh");
        assert_eq!(skipped, 11);
    }

    #[test]
    fn unknown_location_is_plain() {
        assert_eq!(render("x", "p", "boom", &Location::UNKNOWN, 10), "boom");
    }
}
