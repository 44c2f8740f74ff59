//! Format as float string, make changes to be sure the text reads back as a double
//! (zmij may render 4e-6 and not 4.0e-6, or 3 and not 3.0)

use std::fmt::Write;
use zmij::Float;
use num_traits::float::FloatCore;
use crate::ser;

/// Format as float string. Non-finite values use the `NaN`, `Infinity` and `-Infinity`
/// literals of the relaxed grammar.
pub(crate) fn write_float_string<F: Float + FloatCore, W: Write + ?Sized>(target: &mut W, f: F) -> ser::Result<()> {
    if f.is_nan() {
        target.write_str("NaN")?;
    } else if f.is_infinite() {
        if f.is_sign_positive() {
            target.write_str("Infinity")?;
        } else {
            target.write_str("-Infinity")?;
        }
    } else {
        let mut buf = zmij::Buffer::new();
        // Branches .is_nan and .is_infinite are already covered above
        let s = buf.format_finite(f);
        if !s.as_bytes().contains(&b'.') {
            if let Some(exp_pos) = s.find('e').or_else(|| s.find('E')) {
                // "4e-6" -> "4.0e-6"
                target.write_str(&s[..exp_pos])?;
                target.write_str(".0")?;
                target.write_str(&s[exp_pos..])?;
            } else {
                target.write_str(s)?;
                target.write_str(".0")?;
            }
        } else {
            target.write_str(s)?;
        }
    }
    Ok(())
}
