use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::types::ScanRecord;

/// A scan's `result` field after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Value(Value),
    /// The string was not valid JSON; kept verbatim for display.
    Undecodable(String),
}

/// Decode a `result` field that is either already structured or a JSON-encoded string.
pub fn decode_result(result: &Value) -> Decoded {
    match result {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(v) => Decoded::Value(v),
            Err(_) => Decoded::Undecodable(raw.clone()),
        },
        other => Decoded::Value(other.clone()),
    }
}

/// Parsed result payloads of the currently listed scans, keyed by scan id.
///
/// Rebuilt wholesale on every list refresh; pagination reads it so page changes never
/// hit the network.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entries: HashMap<i64, Value>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from a freshly fetched scan list.
    pub fn from_records(records: &[ScanRecord]) -> Self {
        let mut cache = Self::new();
        cache.rebuild(records);
        cache
    }

    /// Replace every entry with the payloads of `records`. Undecodable payloads cache as `{}`.
    pub fn rebuild(&mut self, records: &[ScanRecord]) {
        self.entries.clear();
        for rec in records {
            let payload = match decode_result(&rec.result) {
                Decoded::Value(v) => v,
                Decoded::Undecodable(_) => Value::Object(Map::new()),
            };
            self.entries.insert(rec.id, payload);
        }
    }

    pub fn get(&self, scan_id: i64) -> Option<&Value> {
        self.entries.get(&scan_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScanKind;
    use serde_json::json;

    fn record(id: i64, result: Value) -> ScanRecord {
        ScanRecord {
            id,
            target: "example.com".into(),
            scan_type: ScanKind::Subdomain,
            created_at: "2024-05-01T10:00:00".into(),
            result,
        }
    }

    #[test]
    fn decodes_string_and_inline_payloads() {
        assert_eq!(decode_result(&json!(r#"{"a":1}"#)), Decoded::Value(json!({"a": 1})));
        assert_eq!(decode_result(&json!({"a": 1})), Decoded::Value(json!({"a": 1})));
        assert_eq!(decode_result(&json!("not json")), Decoded::Undecodable("not json".into()));
    }

    #[test]
    fn rebuild_replaces_previous_entries() {
        let mut cache = ResultCache::from_records(&[record(1, json!({"subdomains": ["a"]}))]);
        cache.rebuild(&[record(2, json!("{broken"))]);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.get(2), Some(&json!({})));
        assert_eq!(cache.len(), 1);
    }
}
