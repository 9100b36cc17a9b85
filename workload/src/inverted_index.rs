//! Inverted index: for each word, the sorted list of documents containing it.

use anyhow::anyhow;
use serde_json::Value;

use common::{KeyValue, MapOutput};

pub fn map(document_id: &str, content: &str) -> MapOutput {
    let mut words: Vec<&str> = content
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    words.sort_unstable();
    words.dedup();

    Ok(words
        .into_iter()
        .map(|word| KeyValue::new(word, document_id))
        .collect())
}

pub fn reduce(key: &str, values: &[Value]) -> anyhow::Result<Value> {
    let mut documents = values
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("document id {v} for `{key}` is not a string"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    documents.sort();
    documents.dedup();
    Ok(Value::from(documents))
}
