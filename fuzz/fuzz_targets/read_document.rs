#![no_main]

use libfuzzer_sys::fuzz_target;
use refjson::{Options, Ty, TypeDescriptor, TypeRegistry};

// Feeds arbitrary text to the reader, untyped and against a small registry with a
// self-referencing class, a struct and an abstract base.
fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 {
        return;
    }
    let s = String::from_utf8_lossy(data);

    let registry = TypeRegistry::new()
        .with(TypeDescriptor::abstract_class("Shape"))
        .with(
            TypeDescriptor::class("Node")
                .base("Shape")
                .field("name", Ty::String)
                .field("next", Ty::named("Node"))
                .field("children", Ty::list(Ty::named("Shape"))),
        )
        .with(TypeDescriptor::structure("Pair").field("a", Ty::Int).field("b", Ty::Double));

    let results = [
        refjson::from_str(&registry, &s),
        refjson::from_str_auto(&registry, &s, true),
        refjson::from_str_as(&registry, &s, &Ty::named("Node")),
        refjson::from_str_as(&registry, &s, &Ty::list(Ty::named("Pair"))),
    ];
    for value in results.iter().flatten() {
        value.break_cycles();
    }

    let options = Options {
        allow_unquoted_object_keys: true,
        max_depth: 64,
        ..Options::default()
    };
    if let Ok(value) = refjson::from_str_with_options(&registry, &s, &Ty::map(Ty::Any), options) {
        value.break_cycles();
    }
});
