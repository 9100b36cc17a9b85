//! A MapReduce-compatible application that computes the
//! degree of each vertex in a graph, given a list of edges.
//!

use anyhow::{anyhow, Result};
use serde_json::Value;

use common::{KeyValue, MapOutput};

fn parse_line(line: &str) -> Result<(u64, u64)> {
    let mut iter = line.split_whitespace().take(2);
    let a = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid input file format"))?
        .parse()?;
    let b = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid input file format"))?
        .parse()?;
    Ok((a, b))
}

/// One line per edge, `a b`. Blank lines are skipped.
pub fn map(_document_id: &str, content: &str) -> MapOutput {
    let edges = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect::<Result<Vec<_>>>()?;

    Ok(edges
        .into_iter()
        .flat_map(|(a, b)| [KeyValue::new(a.to_string(), 1), KeyValue::new(b.to_string(), 1)])
        .collect())
}

pub fn reduce(key: &str, values: &[Value]) -> Result<Value> {
    crate::sum(key, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_ends_get_a_degree() {
        let out = map("g", "1 2\n2 3\n").unwrap();
        let keys: Vec<_> = out.iter().map(|kv| kv.key()).collect();
        assert_eq!(keys, vec!["1", "2", "2", "3"]);
    }

    #[test]
    fn malformed_edge_fails() {
        assert!(map("g", "1\n").is_err());
        assert!(map("g", "x y\n").is_err());
    }
}
