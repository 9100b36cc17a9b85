//! Word count.

use serde_json::Value;

use common::{KeyValue, MapOutput};

/// Emits `(word, 1)` for every alphanumeric run in the document.
pub fn map(_document_id: &str, content: &str) -> MapOutput {
    Ok(content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| KeyValue::new(word, 1))
        .collect())
}

pub fn reduce(key: &str, values: &[Value]) -> anyhow::Result<Value> {
    crate::sum(key, values)
}
