//! Consul metadata keys may not contain `.`, which every label key does.
//!
//! Keys are escaped `.` -> `_` on the way in and `_` -> `.` on the way out. The two
//! are only inverses for keys without `_`: a label key that already contains `_`
//! comes back with a `.` in its place.

use std::collections::BTreeMap;

pub fn sanitize_key(key: &str) -> String {
    key.replace('.', "_")
}

pub fn unsanitize_key(key: &str) -> String {
    key.replace('_', ".")
}

pub fn sanitize<'a, I>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (sanitize_key(k), v.clone()))
        .collect()
}

pub fn unsanitize<'a, I>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (unsanitize_key(k), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_keys_without_underscores() {
        for key in [
            "com.github.njasm.clerk.register",
            "com.github.njasm.clerk.consul.check.grpc.tls",
            "plain",
            "",
        ] {
            assert_eq!(unsanitize_key(&sanitize_key(key)), key);
        }

        for escaped in ["com_github_njasm_clerk_name", "plain"] {
            assert_eq!(sanitize_key(&unsanitize_key(escaped)), escaped);
        }
    }

    #[test]
    fn underscore_keys_collide() {
        let original = "com.github.njasm.clerk.my_key";
        assert_eq!(
            unsanitize_key(&sanitize_key(original)),
            "com.github.njasm.clerk.my.key"
        );
    }

    #[test]
    fn maps_keep_values() {
        let mut meta = BTreeMap::new();
        meta.insert("a.b".to_string(), "x.y".to_string());

        let escaped = sanitize(&meta);
        assert_eq!(escaped.get("a_b").map(String::as_str), Some("x.y"));
        assert_eq!(unsanitize(&escaped), meta);
    }
}
