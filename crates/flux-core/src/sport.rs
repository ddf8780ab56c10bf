//! Sports, competitions and competition categories.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::{impl_entity, new_id, utc_now},
  schema::{COMPETITION, COMPETITION_CATEGORY, SPORT},
};

/// A sport discipline; owns its competitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sport {
  pub sport_id:    Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub image_url:   Option<String>,
  pub created_at:  NaiveDateTime,
  pub updated_at:  NaiveDateTime,
}

impl Sport {
  pub fn new(name: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      sport_id:    new_id(),
      name:        name.into(),
      description: None,
      image_url:   None,
      created_at:  now,
      updated_at:  now,
    }
  }
}

impl_entity!(Sport, SPORT, sport_id);

/// A tournament or league held within one sport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competition {
  pub competition_id: Uuid,
  pub sport_id:       Uuid,
  pub name:           String,
  pub prize_pool:     Option<String>,
  pub location:       Option<String>,
  pub start_date:     Option<NaiveDateTime>,
  pub description:    Option<String>,
  pub image_url:      Option<String>,
  pub created_at:     NaiveDateTime,
  pub updated_at:     NaiveDateTime,
}

impl Competition {
  pub fn new(sport_id: Uuid, name: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      competition_id: new_id(),
      sport_id,
      name: name.into(),
      prize_pool: None,
      location: None,
      start_date: None,
      description: None,
      image_url: None,
      created_at: now,
      updated_at: now,
    }
  }
}

impl_entity!(Competition, COMPETITION, competition_id);

/// A label grouping competitions (e.g. "Major", "Online").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionCategory {
  pub category_id: Uuid,
  pub name:        String,
  pub description: Option<String>,
  pub image_url:   Option<String>,
  pub created_at:  NaiveDateTime,
  pub updated_at:  NaiveDateTime,
}

impl CompetitionCategory {
  pub fn new(name: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      category_id: new_id(),
      name:        name.into(),
      description: None,
      image_url:   None,
      created_at:  now,
      updated_at:  now,
    }
  }
}

impl_entity!(CompetitionCategory, COMPETITION_CATEGORY, category_id);
