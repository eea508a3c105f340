#![no_main]

use dibox::{BindingKey, KeyMap, Type, TypeQuery};
use libfuzzer_sys::fuzz_target;

struct Alpha;
struct Beta;
struct Gamma;

const NAMES: [&str; 4] = ["", "arg", "db", "primary"];

fn pick_type(byte: u8) -> Option<Type> {
    match byte % 4 {
        0 => None,
        1 => Some(Type::of::<Alpha>()),
        2 => Some(Type::of::<Beta>()),
        _ => Some(Type::of::<Gamma>()),
    }
}

fn pick_name(byte: u8) -> Option<&'static str> {
    match byte % 5 {
        0 => None,
        n => Some(NAMES[n as usize - 1]),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // Pairs of bytes register keys, the last two bytes form the request
    let (bindings, request) = data.split_at(data.len() - 2);
    let mut map = KeyMap::new();
    for chunk in bindings.chunks_exact(2) {
        let key = BindingKey::new(pick_type(chunk[0]), pick_name(chunk[1]));
        map.insert(key.clone(), key);
    }

    let query = TypeQuery::from(pick_type(request[0]));
    let name = pick_name(request[1]);

    if let Some((value, key)) = map.find_match(&query, name) {
        // The returned key is the one the value was stored under
        assert_eq!(value, &key);
        // and it is one of the fallbacks of the request
        let type_ok = key.ty.is_none() || key.ty.as_ref() == query.concrete();
        let name_ok = key.name.is_none() || key.name.as_deref() == name;
        assert!(type_ok && name_ok);
        if map.contains_key(&BindingKey::new(query.concrete().copied(), name)) {
            assert_eq!(key, BindingKey::new(query.concrete().copied(), name));
        }
    }
});
