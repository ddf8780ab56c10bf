//! Matches and everything hanging off a match: its status, substitutions and
//! AI-generated statements.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  entity::{impl_entity, new_id, utc_now},
  enums::{MatchStatusKind, PipelineStatus},
  schema::{MATCH, MATCH_AI_STATEMENT, MATCH_STATUS, SUBSTITUTION},
};

// ─── Status ──────────────────────────────────────────────────────────────────

/// A shared status row referenced by matches. Renaming it is visible through
/// every match that points at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatus {
  pub status_id:  Uuid,
  pub name:       String,
  /// Scoreboard-style detail, e.g. `{"map": "2", "score": "13:9"}`.
  pub status:     Option<Value>,
  pub image_url:  Option<String>,
  pub created_at: NaiveDateTime,
  pub updated_at: NaiveDateTime,
}

impl MatchStatus {
  pub fn new(name: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      status_id:  new_id(),
      name:       name.into(),
      status:     None,
      image_url:  None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn from_kind(kind: MatchStatusKind) -> Self { Self::new(kind.as_ref()) }

  /// The well-known kind this status names, matched case-insensitively.
  pub fn kind(&self) -> Option<MatchStatusKind> { self.name.parse().ok() }
}

impl_entity!(MatchStatus, MATCH_STATUS, status_id);

// ─── Match ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
  pub match_id:               Uuid,
  pub sport_id:               Option<Uuid>,
  pub competition_id:         Option<Uuid>,
  pub status_id:              Option<Uuid>,
  #[serde(rename = "match_name")]
  pub name:                   String,
  pub pretty_match_name:      Option<String>,
  /// Stream links keyed by platform.
  #[serde(rename = "match_streams")]
  pub streams:                Option<Value>,
  pub match_url:              Option<String>,
  pub tournament_url:         Option<String>,
  pub pipeline_status:        Option<PipelineStatus>,
  pub pipeline_update_time:   Option<NaiveDateTime>,
  /// Identifier assigned by the upstream data source.
  pub external_id:            String,
  pub planned_start_datetime: Option<NaiveDateTime>,
  pub end_datetime:           Option<NaiveDateTime>,
  pub created_at:             NaiveDateTime,
  pub updated_at:             NaiveDateTime,
}

impl Match {
  pub fn new(name: impl Into<String>, external_id: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      match_id:               new_id(),
      sport_id:               None,
      competition_id:         None,
      status_id:              None,
      name:                   name.into(),
      pretty_match_name:      None,
      streams:                None,
      match_url:              None,
      tournament_url:         None,
      pipeline_status:        None,
      pipeline_update_time:   None,
      external_id:            external_id.into(),
      planned_start_datetime: None,
      end_datetime:           None,
      created_at:             now,
      updated_at:             now,
    }
  }

  pub fn in_competition(mut self, sport_id: Uuid, competition_id: Uuid) -> Self {
    self.sport_id = Some(sport_id);
    self.competition_id = Some(competition_id);
    self
  }

  pub fn with_status(mut self, status_id: Uuid) -> Self {
    self.status_id = Some(status_id);
    self
  }
}

impl_entity!(Match, MATCH, match_id);

// ─── Substitution ────────────────────────────────────────────────────────────

/// A player swap within one team during one match. The player references
/// survive as NULL if the player row is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
  pub substitution_id: Uuid,
  pub match_id:        Uuid,
  pub team_id:         Uuid,
  pub prev_player_id:  Option<Uuid>,
  pub new_player_id:   Option<Uuid>,
  /// Minute (or round) of the swap.
  pub time:            Option<i64>,
  pub created_at:      NaiveDateTime,
  pub updated_at:      NaiveDateTime,
}

impl Substitution {
  pub fn new(match_id: Uuid, team_id: Uuid) -> Self {
    let now = utc_now();
    Self {
      substitution_id: new_id(),
      match_id,
      team_id,
      prev_player_id: None,
      new_player_id: None,
      time: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn players(mut self, prev: Uuid, new: Uuid) -> Self {
    self.prev_player_id = Some(prev);
    self.new_player_id = Some(new);
    self
  }
}

impl_entity!(Substitution, SUBSTITUTION, substitution_id);

// ─── AI statements ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAiStatement {
  pub statement_id: Uuid,
  pub statement:    String,
  pub created_at:   NaiveDateTime,
  pub updated_at:   NaiveDateTime,
}

impl MatchAiStatement {
  pub fn new(statement: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      statement_id: new_id(),
      statement:    statement.into(),
      created_at:   now,
      updated_at:   now,
    }
  }
}

impl_entity!(MatchAiStatement, MATCH_AI_STATEMENT, statement_id);
