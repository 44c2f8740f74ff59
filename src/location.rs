//! Source location utilities.

use serde::{Deserialize, Serialize};

/// Row/column location within the source document (1-indexed, character-based).
///
/// The reader only tracks a byte cursor while scanning; line and column are computed
/// from the cursor when an error is created, so successful parses never pay for them.
///
/// # Example
///
/// ```
/// let registry = refjson::TypeRegistry::new();
/// let err = refjson::from_str(&registry, "{\n  \"a\": }").unwrap_err();
/// let loc = err.location().unwrap();
/// assert_eq!((loc.line(), loc.column()), (2, 8));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// 1-indexed row number in the input.
    pub(crate) line: u32,
    /// 1-indexed column number in the input, counted in characters.
    pub(crate) column: u32,
    /// Byte offset of the location in the input.
    pub(crate) offset: usize,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    pub const UNKNOWN: Self = Self {
        line: 0,
        column: 0,
        offset: 0,
    };

    /// Create a new location record.
    ///
    /// Arguments:
    /// - `line`: 1-indexed line.
    /// - `column`: 1-indexed column.
    /// - `offset`: byte offset into the source.
    pub(crate) const fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line: line as u32,
            column: column as u32,
            offset,
        }
    }

    /// Compute the location of byte `offset` inside `text`.
    ///
    /// Offsets past the end clamp to the end of input, offsets inside a multi-byte
    /// character point at that character.
    ///
    /// Called by:
    /// - the scanner and reader whenever they build a positional error.
    #[cold]
    #[inline(never)]
    pub(crate) fn at(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let mut line = 1usize;
        let mut line_start = 0usize;
        for (i, b) in text.as_bytes()[..offset].iter().enumerate() {
            if *b == b'\n' {
                line += 1;
                line_start = i + 1;
            }
        }
        let column = text[line_start..]
            .char_indices()
            .take_while(|(i, _)| line_start + i < offset)
            .count()
            + 1;
        Self::new(line, column, offset)
    }

    /// Line number (1-based).
    #[inline]
    pub fn line(&self) -> u64 {
        self.line as u64
    }

    /// Column number (1-based, in characters).
    #[inline]
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    /// Byte offset into the source text.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}
