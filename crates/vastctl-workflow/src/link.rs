use std::collections::HashMap;

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::WorkflowError;

/// A graph edge, stored by the UI as
/// `[link_id, from_node, from_slot, to_node, to_slot, type]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
  pub id: i64,
  pub from_node: i64,
  pub from_slot: i64,
  pub to_node: i64,
  pub to_slot: i64,
  pub link_type: Option<Value>,
}

impl Link {
  /// Build a link from its positional JSON form.
  pub fn from_values(values: &[Value]) -> Result<Self, WorkflowError> {
    if values.len() < 5 {
      return Err(WorkflowError::InvalidLink {
        message: format!("expected at least 5 entries, got {}", values.len()),
      });
    }

    let int_at = |idx: usize| {
      values[idx]
        .as_i64()
        .ok_or_else(|| WorkflowError::InvalidLink {
          message: format!("entry {} is not an integer: {}", idx, values[idx]),
        })
    };

    Ok(Self {
      id: int_at(0)?,
      from_node: int_at(1)?,
      from_slot: int_at(2)?,
      to_node: int_at(3)?,
      to_slot: int_at(4)?,
      link_type: values.get(5).cloned(),
    })
  }
}

impl Serialize for Link {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let len = if self.link_type.is_some() { 6 } else { 5 };
    let mut seq = serializer.serialize_seq(Some(len))?;
    seq.serialize_element(&self.id)?;
    seq.serialize_element(&self.from_node)?;
    seq.serialize_element(&self.from_slot)?;
    seq.serialize_element(&self.to_node)?;
    seq.serialize_element(&self.to_slot)?;
    if let Some(link_type) = &self.link_type {
      seq.serialize_element(link_type)?;
    }
    seq.end()
  }
}

impl<'de> Deserialize<'de> for Link {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    Link::from_values(&values).map_err(D::Error::custom)
  }
}

/// Lookup from link ID to its source `(node, slot)`.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
  sources: HashMap<i64, (i64, i64)>,
}

impl LinkIndex {
  /// Index a list of links. The first link wins when IDs repeat.
  pub fn new(links: &[Link]) -> Self {
    let mut sources = HashMap::new();
    for link in links {
      sources
        .entry(link.id)
        .or_insert((link.from_node, link.from_slot));
    }
    Self { sources }
  }

  /// Source node and output slot feeding the given link.
  pub fn source(&self, link_id: i64) -> Option<(i64, i64)> {
    self.sources.get(&link_id).copied()
  }

  pub fn len(&self) -> usize {
    self.sources.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sources.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_link_without_type() {
    let link: Link = serde_json::from_value(json!([1, 2, 0, 3, 1])).unwrap();
    assert_eq!(link.from_node, 2);
    assert_eq!(link.link_type, None);
    assert_eq!(serde_json::to_value(&link).unwrap(), json!([1, 2, 0, 3, 1]));
  }

  #[test]
  fn test_parse_link_too_short() {
    let result: Result<Link, _> = serde_json::from_value(json!([1, 2, 0]));
    assert!(result.is_err());
  }

  #[test]
  fn test_parse_link_non_integer() {
    let result = Link::from_values(&[json!(1), json!("x"), json!(0), json!(3), json!(1)]);
    assert!(matches!(result, Err(WorkflowError::InvalidLink { .. })));
  }

  #[test]
  fn test_index_first_link_wins() {
    let links = vec![
      Link::from_values(&[json!(7), json!(1), json!(0), json!(2), json!(0)]).unwrap(),
      Link::from_values(&[json!(7), json!(9), json!(3), json!(2), json!(0)]).unwrap(),
    ];
    let index = LinkIndex::new(&links);

    assert_eq!(index.len(), 1);
    assert_eq!(index.source(7), Some((1, 0)));
    assert_eq!(index.source(8), None);
  }
}
