//! Scraped news, their formatted form, and the ledger of URLs already
//! consumed by the scrapers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  entity::{impl_entity, new_id, utc_now},
  enums::PipelineStatus,
  schema::{FORMATTED_NEWS, RAW_NEWS, USED_URL},
};

/// An article as scraped, paragraph by paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNews {
  pub raw_news_id:          Uuid,
  pub sport_id:             Uuid,
  pub header:               Option<String>,
  pub text:                 Vec<String>,
  pub url:                  String,
  pub news_creation_time:   Option<NaiveDateTime>,
  pub pipeline_status:      Option<PipelineStatus>,
  pub pipeline_update_time: Option<NaiveDateTime>,
  pub created_at:           NaiveDateTime,
  pub updated_at:           NaiveDateTime,
}

impl RawNews {
  pub fn new(sport_id: Uuid, url: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      raw_news_id: new_id(),
      sport_id,
      header: None,
      text: Vec::new(),
      url: url.into(),
      news_creation_time: None,
      pipeline_status: Some(PipelineStatus::New),
      pipeline_update_time: Some(now),
      created_at: now,
      updated_at: now,
    }
  }
}

impl_entity!(RawNews, RAW_NEWS, raw_news_id);

/// A cleaned-up article, linked to the matches it is relevant to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedNews {
  pub formatted_news_id:  Uuid,
  pub sport_id:           Uuid,
  pub header:             Option<String>,
  pub text:               Vec<String>,
  pub url:                String,
  pub keywords:           Vec<String>,
  pub news_creation_time: Option<NaiveDateTime>,
  pub created_at:         NaiveDateTime,
  pub updated_at:         NaiveDateTime,
}

impl FormattedNews {
  pub fn new(sport_id: Uuid, url: impl Into<String>) -> Self {
    let now = utc_now();
    Self {
      formatted_news_id: new_id(),
      sport_id,
      header: None,
      text: Vec::new(),
      url: url.into(),
      keywords: Vec::new(),
      news_creation_time: None,
      created_at: now,
      updated_at: now,
    }
  }
}

impl_entity!(FormattedNews, FORMATTED_NEWS, formatted_news_id);

/// A URL a scraper has already processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsedUrl {
  pub url_id:  Uuid,
  pub url:     String,
  pub used_at: NaiveDateTime,
}

impl UsedUrl {
  pub fn new(url: impl Into<String>) -> Self {
    Self { url_id: new_id(), url: url.into(), used_at: utc_now() }
  }
}

impl_entity!(UsedUrl, USED_URL, url_id);
