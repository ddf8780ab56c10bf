//! Enumerated column values.
//!
//! Stored lowercase; parsed case-insensitively so `"LIVE"`, `"Live"` and
//! `"live"` all resolve to the same variant.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, VariantNames};

use crate::Error;

/// Processing state of a scraped row in the downstream pipeline.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
  VariantNames,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PipelineStatus {
  New,
  Sent,
  Processed,
  Error,
}

/// Well-known match states. `MatchStatus.name` is free text; these are the
/// names the scrapers emit.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
  VariantNames,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatchStatusKind {
  Scheduled,
  Live,
  Finished,
  Cancelled,
  Postponed,
}

impl TryFrom<String> for PipelineStatus {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Error> {
    value.parse().map_err(|_| Error::UnknownEnumValue {
      kind: "PipelineStatus",
      value,
    })
  }
}

impl TryFrom<String> for MatchStatusKind {
  type Error = Error;

  fn try_from(value: String) -> Result<Self, Error> {
    value.parse().map_err(|_| Error::UnknownEnumValue {
      kind: "MatchStatusKind",
      value,
    })
  }
}
