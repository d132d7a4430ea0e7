//! Field-by-field merge of configuration tiers.

use serde_json::Value;

/// Overlay `overlay` onto `base`.
///
/// Objects merge key by key; any other value in `overlay` replaces the one in
/// `base`. A `null` in `overlay` leaves `base` untouched, so a tier can name a
/// section without resetting its fields.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let next = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                merged.insert(key, next);
            }
            Value::Object(merged)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Merge tiers lowest-precedence first.
pub fn deep_merge_all(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_sections_merge() {
        let defaults = json!({"service": {"base_url": "https://a", "request_timeout_seconds": 30}});
        let user = json!({"service": {"api_token": "pk_1"}});
        assert_eq!(
            deep_merge(defaults, user),
            json!({"service": {
                "base_url": "https://a",
                "request_timeout_seconds": 30,
                "api_token": "pk_1"
            }})
        );
    }

    #[test]
    fn test_scalars_and_arrays_replaced() {
        let base = json!({"level": "info", "teams": ["1", "2"]});
        let overlay = json!({"level": "debug", "teams": ["3"]});
        assert_eq!(
            deep_merge(base, overlay),
            json!({"level": "debug", "teams": ["3"]})
        );
    }

    #[test]
    fn test_null_keeps_lower_tier() {
        let base = json!({"store": {"db_path": "a.db"}});
        let overlay = json!({"store": null});
        assert_eq!(deep_merge(base.clone(), overlay), base);
    }

    #[test]
    fn test_merge_all_order() {
        let merged = deep_merge_all(vec![json!({"a": 1}), json!({"a": 2}), json!({"b": 3})]);
        assert_eq!(merged, json!({"a": 2, "b": 3}));
    }
}
