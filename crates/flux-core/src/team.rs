//! Teams and the people attached to them.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  entity::{impl_entity, new_id, utc_now},
  schema::{COACH, TEAM, TEAM_MEMBER},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
  pub team_id:     Uuid,
  pub name:        String,
  pub pretty_name: Option<String>,
  pub team_url:    Option<String>,
  pub description: Option<String>,
  pub image_url:   Option<String>,
  /// Free-form statistics blob.
  pub stats:       Option<Value>,
  /// Titles and trophies blob.
  pub regalia:     Option<Value>,
  pub created_at:  NaiveDateTime,
  pub updated_at:  NaiveDateTime,
}

impl Team {
  pub fn new(name: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      team_id:     new_id(),
      name:        name.into(),
      pretty_name: None,
      team_url:    None,
      description: None,
      image_url:   None,
      stats:       None,
      regalia:     None,
      created_at:  now,
      updated_at:  now,
    }
  }
}

impl_entity!(Team, TEAM, team_id);

/// A player. Identity is `(nickname, name, image_url)`; all parts are
/// optional because scrapers often only know the nickname.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
  pub player_id:       Uuid,
  pub team_member_url: Option<String>,
  pub nickname:        Option<String>,
  pub name:            Option<String>,
  pub age:             Option<i64>,
  pub country:         Option<String>,
  pub stats:           Option<Value>,
  pub description:     Option<String>,
  pub image_url:       Option<String>,
  pub created_at:      NaiveDateTime,
  pub updated_at:      NaiveDateTime,
}

impl TeamMember {
  pub fn with_nickname(nickname: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      player_id:       new_id(),
      team_member_url: None,
      nickname:        Some(nickname.into()),
      name:            None,
      age:             None,
      country:         None,
      stats:           None,
      description:     None,
      image_url:       None,
      created_at:      now,
      updated_at:      now,
    }
  }
}

impl_entity!(TeamMember, TEAM_MEMBER, player_id);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coach {
  pub coach_id:    Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub image_url:   Option<String>,
  pub stats:       Option<Value>,
  pub regalia:     Option<Value>,
  pub created_at:  NaiveDateTime,
  pub updated_at:  NaiveDateTime,
}

impl Coach {
  pub fn new(name: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      coach_id:    new_id(),
      name:        name.into(),
      description: None,
      image_url:   None,
      stats:       None,
      regalia:     None,
      created_at:  now,
      updated_at:  now,
    }
  }
}

impl_entity!(Coach, COACH, coach_id);
