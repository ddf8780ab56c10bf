//! Change sets for in-place updates.
//!
//! A [`Changes`] value carries whole-column assignments plus key-level edits
//! of JSON columns. Backends apply JSON edits to the *stored* document inside
//! the update's transaction, so editing `stats.wins` never clobbers
//! `stats.losses` written by someone else earlier.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, enums::PipelineStatus};

/// One edit of a JSON document. Paths address nested object keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JsonEdit {
  /// Insert or replace the value at `path`, creating missing objects along
  /// the way. An empty path replaces the whole document.
  Set { path: Vec<String>, value: Value },
  /// Remove the key at `path`; missing keys are ignored.
  Remove { path: Vec<String> },
  /// RFC 7396 merge patch: objects merge recursively, `null` removes.
  Merge { value: Value },
  /// Append to a list document.
  Push { value: Value },
}

/// A [`JsonEdit`] aimed at one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnEdit {
  pub column: String,
  #[serde(flatten)]
  pub edit:   JsonEdit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changes {
  /// Whole-column assignments, keyed by column name.
  #[serde(default)]
  pub set:  Map<String, Value>,
  /// JSON edits, applied in order after `set`.
  #[serde(default)]
  pub edit: Vec<ColumnEdit>,
}

impl Changes {
  pub fn new() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.set.is_empty() && self.edit.is_empty() }

  pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.set.insert(column.into(), value.into());
    self
  }

  /// Set a top-level key of a JSON object column.
  pub fn set_key(
    self,
    column: impl Into<String>,
    key: impl Into<String>,
    value: impl Into<Value>,
  ) -> Self {
    self.set_path(column, [key.into()], value)
  }

  pub fn set_path<I, S>(mut self, column: impl Into<String>, path: I, value: impl Into<Value>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.edit.push(ColumnEdit {
      column: column.into(),
      edit:   JsonEdit::Set {
        path:  path.into_iter().map(Into::into).collect(),
        value: value.into(),
      },
    });
    self
  }

  pub fn remove_key(mut self, column: impl Into<String>, key: impl Into<String>) -> Self {
    self.edit.push(ColumnEdit {
      column: column.into(),
      edit:   JsonEdit::Remove { path: vec![key.into()] },
    });
    self
  }

  pub fn merge(mut self, column: impl Into<String>, patch: Value) -> Self {
    self.edit.push(ColumnEdit { column: column.into(), edit: JsonEdit::Merge { value: patch } });
    self
  }

  pub fn push(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.edit.push(ColumnEdit {
      column: column.into(),
      edit:   JsonEdit::Push { value: value.into() },
    });
    self
  }

  /// Move a row to a new pipeline stage and stamp the transition time.
  pub fn pipeline(self, status: PipelineStatus, at: NaiveDateTime) -> Self {
    self
      .set("pipeline_status", status.as_ref())
      .set("pipeline_update_time", at.format(TIMESTAMP_FORMAT).to_string())
  }

  /// Every column this change set touches, in first-mention order.
  pub fn columns(&self) -> Vec<&str> {
    let mut out: Vec<&str> = self.set.keys().map(String::as_str).collect();
    for edit in &self.edit {
      if !out.contains(&edit.column.as_str()) {
        out.push(&edit.column);
      }
    }
    out
  }
}

/// The textual form of stored timestamps; identical to chrono's serde output
/// for `NaiveDateTime`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

impl JsonEdit {
  /// Apply this edit to `doc`, the current value of `column`. A NULL document
  /// is treated as an empty object (or empty list for `Push`).
  pub fn apply(&self, column: &str, doc: &mut Value) -> Result<()> {
    let invalid = |reason: String| Error::InvalidJsonPath { column: column.to_owned(), reason };

    match self {
      JsonEdit::Set { path, value } => {
        let Some((last, parents)) = path.split_last() else {
          *doc = value.clone();
          return Ok(());
        };
        let obj = descend_or_create(doc, parents).map_err(invalid)?;
        obj.insert(last.clone(), value.clone());
        Ok(())
      }
      JsonEdit::Remove { path } => {
        let Some((last, parents)) = path.split_last() else {
          *doc = Value::Null;
          return Ok(());
        };
        if let Some(obj) = descend(doc, parents).map_err(invalid)? {
          obj.remove(last);
        }
        Ok(())
      }
      JsonEdit::Merge { value } => {
        if !value.is_object() {
          return Err(invalid("merge patch must be an object".into()));
        }
        if doc.is_null() {
          *doc = Value::Object(Map::new());
        }
        if !doc.is_object() {
          return Err(invalid("cannot merge into a non-object document".into()));
        }
        merge_patch(doc, value);
        Ok(())
      }
      JsonEdit::Push { value } => {
        if doc.is_null() {
          *doc = Value::Array(Vec::new());
        }
        match doc {
          Value::Array(items) => {
            items.push(value.clone());
            Ok(())
          }
          _ => Err(invalid("cannot push onto a non-list document".into())),
        }
      }
    }
  }
}

/// Walk `path` through nested objects, turning missing or NULL
/// intermediates into empty objects.
fn descend_or_create<'a>(
  doc: &'a mut Value,
  path: &[String],
) -> std::result::Result<&'a mut Map<String, Value>, String> {
  if doc.is_null() {
    *doc = Value::Object(Map::new());
  }

  let mut current = doc;
  for (depth, key) in path.iter().enumerate() {
    let Value::Object(obj) = current else {
      return Err(not_an_object(&path[..depth]));
    };
    let slot = obj.entry(key.clone()).or_insert(Value::Null);
    if slot.is_null() {
      *slot = Value::Object(Map::new());
    }
    current = slot;
  }

  match current {
    Value::Object(obj) => Ok(obj),
    _ => Err(not_an_object(path)),
  }
}

/// Walk `path` through nested objects. A missing or NULL key ends the walk
/// with `None`.
fn descend<'a>(
  doc: &'a mut Value,
  path: &[String],
) -> std::result::Result<Option<&'a mut Map<String, Value>>, String> {
  let mut current = doc;
  for (depth, key) in path.iter().enumerate() {
    if current.is_null() {
      return Ok(None);
    }
    let Value::Object(obj) = current else {
      return Err(not_an_object(&path[..depth]));
    };
    let Some(next) = obj.get_mut(key) else {
      return Ok(None);
    };
    current = next;
  }

  match current {
    Value::Null => Ok(None),
    Value::Object(obj) => Ok(Some(obj)),
    _ => Err(not_an_object(path)),
  }
}

fn not_an_object(path: &[String]) -> String {
  if path.is_empty() {
    "document is not an object".into()
  } else {
    format!("{} is not an object", path.join("."))
  }
}

fn merge_patch(target: &mut Value, patch: &Value) {
  let Value::Object(patch) = patch else {
    *target = patch.clone();
    return;
  };
  if !target.is_object() {
    *target = Value::Object(Map::new());
  }
  if let Value::Object(obj) = target {
    for (key, value) in patch {
      if value.is_null() {
        obj.remove(key);
      } else {
        merge_patch(obj.entry(key.clone()).or_insert(Value::Null), value);
      }
    }
  }
}
