//! Small helpers over `plist::Dictionary`.

use plist::{Dictionary, Value};

/// Sub-dictionary `key` of `parent`, created (or replaced, if it holds
/// something else) as needed.
pub fn section<'a>(parent: &'a mut Dictionary, key: &str) -> &'a mut Dictionary {
    if !matches!(parent.get(key), Some(Value::Dictionary(_))) {
        parent.insert(key.to_string(), Value::Dictionary(Dictionary::new()));
    }
    match parent.get_mut(key) {
        Some(Value::Dictionary(dict)) => dict,
        _ => unreachable!("section inserted above"),
    }
}

/// `section` applied along a path.
pub fn path<'a>(root: &'a mut Dictionary, keys: &[&str]) -> &'a mut Dictionary {
    keys.iter().fold(root, |dict, key| section(dict, key))
}

/// Integer value.
pub fn int(n: impl Into<i64>) -> Value {
    let n: i64 = n.into();
    Value::Integer(n.into())
}

/// String value.
pub fn string(s: impl Into<String>) -> Value {
    Value::String(s.into())
}

/// Builds a dictionary from `(key, value)` pairs, keeping their order.
pub fn dict<const N: usize>(pairs: [(&str, Value); N]) -> Value {
    Value::Dictionary(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

/// Sets every `(key, bool)` pair in `dict`.
pub fn set_flags(dict: &mut Dictionary, flags: &[(&str, bool)]) {
    for &(key, on) in flags {
        dict.insert(key.to_string(), Value::Boolean(on));
    }
}

/// Looks up `keys` as a path of dictionaries.
#[must_use]
pub fn get<'a>(root: &'a Dictionary, keys: &[&str]) -> Option<&'a Value> {
    let (last, parents) = keys.split_last()?;
    let mut dict = root;
    for key in parents {
        dict = dict.get(key)?.as_dictionary()?;
    }
    dict.get(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_creates_and_get_reads() {
        let mut root = Dictionary::new();
        path(&mut root, &["Misc", "Security"]).insert("Vault".into(), string("Optional"));
        assert_eq!(get(&root, &["Misc", "Security", "Vault"]).and_then(Value::as_string), Some("Optional"));
        assert!(get(&root, &["Misc", "Boot", "Timeout"]).is_none());
        assert!(get(&root, &[]).is_none());
    }

    #[test]
    fn dict_keeps_order() {
        let Value::Dictionary(d) = dict([("B", int(1)), ("A", int(2))]) else { unreachable!() };
        assert_eq!(d.keys().map(String::as_str).collect::<Vec<_>>(), ["B", "A"]);
    }
}
