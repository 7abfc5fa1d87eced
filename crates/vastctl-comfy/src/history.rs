use std::fmt;

use serde::de::{Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::Value;

/// The first entry of a JSON object, in document order.
///
/// The history endpoint is keyed by prompt id and its order carries
/// meaning, which a sorted `serde_json::Map` would lose.
#[derive(Debug, PartialEq)]
pub(crate) struct FirstEntry(pub Option<(String, Value)>);

impl<'de> Deserialize<'de> for FirstEntry {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    struct FirstEntryVisitor;

    impl<'de> Visitor<'de> for FirstEntryVisitor {
      type Value = FirstEntry;

      fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
      }

      fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FirstEntry, A::Error> {
        let first = map.next_entry::<String, Value>()?;
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(FirstEntry(first))
      }
    }

    deserializer.deserialize_map(FirstEntryVisitor)
  }
}
