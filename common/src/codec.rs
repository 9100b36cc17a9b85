//! Encoding of partitions in the shared store and of reducer output files.
//!
//! A partition blob is a JSON array of `{"key": .., "value": ..}` records in
//! bucket order. Reducer output is a pretty-printed JSON object mapping each
//! key to its aggregate.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::Value;

use crate::KeyValue;

pub fn encode_partition(records: &[KeyValue]) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(records).map(Bytes::from)
}

pub fn decode_partition(blob: &[u8]) -> Result<Vec<KeyValue>, serde_json::Error> {
    serde_json::from_slice(blob)
}

pub fn encode_output(output: &BTreeMap<String, Value>) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(output)
}

pub fn decode_output(data: &[u8]) -> Result<BTreeMap<String, Value>, serde_json::Error> {
    serde_json::from_slice(data)
}
