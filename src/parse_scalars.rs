//! Number lexeme scanning and representation choice.
//!
//! Numbers are read in two steps: [`scan_number`] walks the whole lexeme once and records
//! its shape, then [`number_value`] picks the narrowest representation that holds it
//! without re-scanning.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::value::Value;

/// Integral lexemes with at least this many significant digits are read as [`Decimal`].
pub(crate) const DECIMAL_DIGITS: usize = 19;

/// Shape of a numeric lexeme.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct NumberLexeme<'a> {
    /// Full lexeme text, including sign and exponent.
    pub(crate) text: &'a str,
    /// A `.` fraction is present.
    pub(crate) fraction: bool,
    /// An `e`/`E` exponent is present.
    pub(crate) exponent: bool,
    /// Count of integer and fraction digits, excluding sign, point and exponent.
    pub(crate) digits: usize,
}

impl NumberLexeme<'_> {
    pub(crate) fn is_integral(&self) -> bool {
        !self.fraction && !self.exponent
    }
}

/// Scan a number at the start of `src`.
///
/// Grammar: `-? digit+ ('.' digit+)? ([eE] [+-]? digit+)?`.
///
/// Returns:
/// - the lexeme on success;
/// - `Err(offset)` with the byte offset (relative to `src`) of the first character
///   that breaks the grammar: a sign with no digits, or a point/exponent without digits.
///
/// Called by:
/// - the reader when the scanner reported a number token.
pub(crate) fn scan_number(src: &str) -> Result<NumberLexeme<'_>, usize> {
    let bytes = src.as_bytes();
    let mut i = 0usize;

    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let int_start = i;
    i = digits_from(i);
    if i == int_start {
        return Err(i);
    }
    let mut digits = i - int_start;

    let mut fraction = false;
    if bytes.get(i) == Some(&b'.') {
        fraction = true;
        let frac_start = i + 1;
        i = digits_from(frac_start);
        if i == frac_start {
            return Err(i);
        }
        digits += i - frac_start;
    }

    let mut exponent = false;
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        exponent = true;
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        i = digits_from(exp_start);
        if i == exp_start {
            return Err(i);
        }
    }

    Ok(NumberLexeme {
        text: &src[..i],
        fraction,
        exponent,
        digits,
    })
}

/// Choose the representation of a scanned number.
///
/// - integral, fewer than [`DECIMAL_DIGITS`] digits: `Int` when it fits 32 bits, else `Long`;
/// - integral, [`DECIMAL_DIGITS`] digits or more: `Decimal`, or `Double` when even a decimal
///   cannot hold it;
/// - fraction or exponent: `Double`, unless `prefer_decimal` asks for an exact `Decimal`.
///
/// Returns `None` only when the lexeme cannot be represented at all.
pub(crate) fn number_value(lexeme: &NumberLexeme<'_>, prefer_decimal: bool) -> Option<Value> {
    let text = lexeme.text;
    if lexeme.is_integral() && lexeme.digits < DECIMAL_DIGITS {
        let n = i64::from_str(text).ok()?;
        return Some(match i32::try_from(n) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::Long(n),
        });
    }

    if lexeme.is_integral() || prefer_decimal {
        let decimal = if lexeme.exponent {
            Decimal::from_scientific(text).ok()
        } else {
            Decimal::from_str_exact(text).ok()
        };
        if let Some(decimal) = decimal {
            return Some(Value::Decimal(decimal));
        }
        if prefer_decimal {
            return None;
        }
    }

    f64::from_str(text).ok().map(Value::Double)
}
