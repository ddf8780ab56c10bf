//! Equality filters for [`SportsStore::find`](crate::store::SportsStore::find).

use serde_json::Value;

/// Conjunction of `column = value` conditions. A `null` value matches rows
/// where the column IS NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
  pub conditions: Vec<(String, Value)>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.conditions.push((column.into(), value.into()));
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn offset(mut self, offset: usize) -> Self {
    self.offset = Some(offset);
    self
  }
}
