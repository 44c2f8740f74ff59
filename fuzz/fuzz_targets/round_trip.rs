#![no_main]

use libfuzzer_sys::fuzz_target;
use refjson::{Ty, TypeRegistry};

// Whatever the reader accepts, the writer must be able to write, and the written text
// must read back.
fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 {
        return;
    }
    let s = String::from_utf8_lossy(data);
    let registry = TypeRegistry::new();

    let Ok(value) = refjson::from_str(&registry, &s) else {
        return;
    };
    let text = refjson::to_string(&registry, &value).expect("accepted input must serialize");
    let back = refjson::from_str_as(&registry, &text, &Ty::Any).expect("written text must read back");
    let again = refjson::to_string(&registry, &back).expect("second write");
    assert_eq!(text, again);
    value.break_cycles();
    back.break_cycles();
});
