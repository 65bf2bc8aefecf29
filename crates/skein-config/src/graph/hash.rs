//! Curated configuration hash.
//!
//! The build cache key covers an explicit, named and versioned subset of
//! derivation nodes. Bump [`CuratedSubset::version`] whenever the field list
//! or the meaning of a field changes so stale cache buckets are abandoned.

use std::collections::BTreeMap;

use serde_json::Value;

use super::NodeName;

/// An explicit list of nodes folded into one hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuratedSubset {
    pub name: &'static str,
    pub version: u32,
    pub fields: &'static [NodeName],
}

/// Fields that identify an incremental build cache bucket.
pub const CACHE_KEY: CuratedSubset = CuratedSubset {
    name: "cache-key",
    version: 1,
    fields: &[
        "dependencies",
        "assets_directory",
        "context",
        "devtool",
        "entries",
        "extensions",
        "home",
        "mode",
        "module_paths",
        "node_env",
        "postcss_config",
        "static_assets",
        "template",
        "minify_options",
        "version",
        "render_target",
    ],
};

impl CuratedSubset {
    /// BLAKE3 hex digest of the subset header plus field values.
    pub fn digest(&self, values: &BTreeMap<String, Value>) -> String {
        let document = serde_json::json!({
            "subset": self.name,
            "version": self.version,
            "fields": values,
        });
        blake3::hash(canonical_json(&document).as_bytes())
            .to_hex()
            .to_string()
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({ "b": 1, "a": { "z": [1, { "y": 2, "x": 3 }], "c": null } });
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":null,"z":[1,{"x":3,"y":2}]},"b":1}"#
        );
    }

    #[test]
    fn version_bump_changes_digest() {
        let values = BTreeMap::from([("mode".to_string(), json!("start"))]);
        let v2 = CuratedSubset {
            version: CACHE_KEY.version + 1,
            ..CACHE_KEY
        };
        assert_ne!(CACHE_KEY.digest(&values), v2.digest(&values));
    }

    #[test]
    fn cache_key_fields_are_unique() {
        let mut fields = CACHE_KEY.fields.to_vec();
        fields.sort_unstable();
        fields.dedup();
        assert_eq!(fields.len(), CACHE_KEY.fields.len());
    }

    proptest! {
        #[test]
        fn digest_is_stable_and_sensitive(
            a in "[a-z]{0,10}",
            b in "[a-z]{0,10}",
        ) {
            let first = BTreeMap::from([("devtool".to_string(), json!(a.clone()))]);
            let again = BTreeMap::from([("devtool".to_string(), json!(a.clone()))]);
            prop_assert_eq!(CACHE_KEY.digest(&first), CACHE_KEY.digest(&again));

            let other = BTreeMap::from([("devtool".to_string(), json!(b.clone()))]);
            if a != b {
                prop_assert_ne!(CACHE_KEY.digest(&first), CACHE_KEY.digest(&other));
            }
        }
    }
}
