//! Deep merge of JSON configuration trees.
//!
//! Objects merge key by key, arrays concatenate (base first), other overlay
//! values replace the base value, and `null` in the overlay leaves the base
//! untouched.

use serde_json::Value;

pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => deep_merge(slot, value),
                    None if value.is_null() => {}
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(overlay)) => base.extend(overlay),
        (slot, value) => *slot = value,
    }
}
