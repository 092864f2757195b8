//! Helpers for provider payloads whose shape varies between responses.

use serde::{Deserialize, Deserializer};

/// A field the provider sends as a bare object for one item and as an
/// array for several.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Flattens an optional one-or-many field into a list.
pub fn into_list<T>(value: Option<OneOrMany<T>>) -> Vec<T> {
    value.map(OneOrMany::into_vec).unwrap_or_default()
}

/// Accepts a JSON string or number and keeps its textual form. Anything else
/// (null, bool, object) becomes `None` instead of failing the whole payload.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

/// Reads a number out of a JSON value that may hold it as a string.
pub fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Holder {
        #[serde(default)]
        item: Option<OneOrMany<u32>>,
        #[serde(default, deserialize_with = "string_or_number")]
        amount: Option<String>,
    }

    #[test]
    fn test_single_object_becomes_list() {
        let holder: Holder = serde_json::from_value(json!({"item": 7})).unwrap();
        assert_eq!(into_list(holder.item), vec![7]);
    }

    #[test]
    fn test_list_stays_list() {
        let holder: Holder = serde_json::from_value(json!({"item": [1, 2, 3]})).unwrap();
        assert_eq!(into_list(holder.item), vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_field_is_empty_list() {
        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(into_list(holder.item).is_empty());
        assert!(holder.amount.is_none());
    }

    #[test]
    fn test_string_or_number() {
        let holder: Holder = serde_json::from_value(json!({"amount": 12.5})).unwrap();
        assert_eq!(holder.amount.as_deref(), Some("12.5"));

        let holder: Holder = serde_json::from_value(json!({"amount": "100.000"})).unwrap();
        assert_eq!(holder.amount.as_deref(), Some("100.000"));

        let holder: Holder = serde_json::from_value(json!({"amount": {"nested": true}})).unwrap();
        assert!(holder.amount.is_none());
    }

    #[test]
    fn test_value_as_f64() {
        assert_eq!(value_as_f64(&json!("3.5")), Some(3.5));
        assert_eq!(value_as_f64(&json!(2)), Some(2.0));
        assert_eq!(value_as_f64(&json!("n/a")), None);
        assert_eq!(value_as_f64(&json!(null)), None);
    }
}
