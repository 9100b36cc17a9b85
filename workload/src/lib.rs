//! Map and reduce functions that jobs can name.
//!
//! A job refers to its mapper and reducer by name; workers resolve the name
//! here when a task arrives. Add a new application by writing a module and
//! registering its functions below.

use anyhow::anyhow;
use serde_json::Value;

use common::{MapFn, ReduceFn};

pub mod inverted_index;
pub mod vertex_degree;
pub mod wc;

const MAPPERS: &[(&str, MapFn)] = &[
    ("wc", wc::map),
    ("vertex_degree", vertex_degree::map),
    ("inverted_index", inverted_index::map),
];

const REDUCERS: &[(&str, ReduceFn)] = &[
    ("wc", wc::reduce),
    ("sum", sum),
    ("vertex_degree", vertex_degree::reduce),
    ("inverted_index", inverted_index::reduce),
];

/// Look up a map function by name.
pub fn try_named_mapper(name: &str) -> Option<MapFn> {
    MAPPERS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

/// Look up a reduce function by name.
pub fn try_named_reducer(name: &str) -> Option<ReduceFn> {
    REDUCERS.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

pub fn mapper_names() -> impl Iterator<Item = &'static str> {
    MAPPERS.iter().map(|(n, _)| *n)
}

pub fn reducer_names() -> impl Iterator<Item = &'static str> {
    REDUCERS.iter().map(|(n, _)| *n)
}

/// Sums integer values.
pub fn sum(key: &str, values: &[Value]) -> anyhow::Result<Value> {
    let mut total = 0i64;
    for value in values {
        let n = value
            .as_i64()
            .ok_or_else(|| anyhow!("value {value} for key `{key}` is not an integer"))?;
        total = total
            .checked_add(n)
            .ok_or_else(|| anyhow!("sum for key `{key}` overflows"))?;
    }
    Ok(Value::from(total))
}
