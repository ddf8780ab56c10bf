//! Many-to-many associations and the join rows that realise them.
//!
//! Each [`Association`] is backed by one join table whose two foreign keys
//! are, in declaration order, the *left* and *right* side.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  schema::{
    AI_STATEMENT_IN_MATCH, COACH_IN_TEAM, COMPETITION_IN_CATEGORY, FILTERED_MATCH_IN_NEWS,
    ForeignKey, PLAYER_IN_TEAM, TEAM_IN_COMPETITION, TEAM_IN_MATCH, Table,
  },
};

/// Addressed by join-table name, both in JSON and in [`std::str::FromStr`].
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
)]
pub enum Association {
  /// competition ⟷ competition_category
  #[serde(rename = "competition_in_category")]
  #[strum(serialize = "competition_in_category")]
  CompetitionCategory,
  /// team ⟷ competition, carries `place` and `stats`
  #[serde(rename = "team_in_competition")]
  #[strum(serialize = "team_in_competition")]
  TeamCompetition,
  /// team ⟷ match, carries `place` and `stats`
  #[serde(rename = "team_in_match")]
  #[strum(serialize = "team_in_match")]
  TeamMatch,
  /// team_member ⟷ team
  #[serde(rename = "player_in_team")]
  #[strum(serialize = "player_in_team")]
  PlayerTeam,
  /// coach ⟷ team
  #[serde(rename = "coach_in_team")]
  #[strum(serialize = "coach_in_team")]
  CoachTeam,
  /// match_ai_statement ⟷ match
  #[serde(rename = "ai_statement_in_match")]
  #[strum(serialize = "ai_statement_in_match")]
  StatementMatch,
  /// match ⟷ formatted_news, carries `respective_relevance`
  #[serde(rename = "filtered_match_in_news")]
  #[strum(serialize = "filtered_match_in_news")]
  NewsMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
  Left,
  Right,
}

impl Side {
  pub fn other(self) -> Self {
    match self {
      Side::Left => Side::Right,
      Side::Right => Side::Left,
    }
  }
}

impl Association {
  pub fn table(self) -> &'static Table {
    match self {
      Association::CompetitionCategory => &COMPETITION_IN_CATEGORY,
      Association::TeamCompetition => &TEAM_IN_COMPETITION,
      Association::TeamMatch => &TEAM_IN_MATCH,
      Association::PlayerTeam => &PLAYER_IN_TEAM,
      Association::CoachTeam => &COACH_IN_TEAM,
      Association::StatementMatch => &AI_STATEMENT_IN_MATCH,
      Association::NewsMatch => &FILTERED_MATCH_IN_NEWS,
    }
  }

  pub fn side(self, side: Side) -> &'static ForeignKey {
    let keys = self.table().foreign_keys;
    match side {
      Side::Left => &keys[0],
      Side::Right => &keys[1],
    }
  }

  /// Which side of this association the entity table `table` sits on.
  pub fn side_of(self, table: &'static Table) -> Result<Side> {
    if self.side(Side::Left).parent == table.name {
      Ok(Side::Left)
    } else if self.side(Side::Right).parent == table.name {
      Ok(Side::Right)
    } else {
      Err(Error::NotAnAssociationSide {
        table:       table.name,
        association: self.table().name,
      })
    }
  }

  /// Columns of the join row other than the two member keys.
  pub fn attribute_columns(self) -> impl Iterator<Item = &'static str> {
    let table = self.table();
    table
      .columns
      .iter()
      .map(|c| c.name)
      .filter(move |name| !table.is_key_column(name))
  }
}

/// One join row: the pair of member ids plus any attributes the join table
/// carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
  pub association: Association,
  pub left:        Uuid,
  pub right:       Uuid,
  #[serde(default)]
  pub attrs:       Map<String, Value>,
}

impl Link {
  pub fn new(association: Association, left: Uuid, right: Uuid) -> Self {
    Self { association, left, right, attrs: Map::new() }
  }

  pub fn with_attr(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.attrs.insert(column.into(), value.into());
    self
  }

  pub fn id(&self, side: Side) -> Uuid {
    match side {
      Side::Left => self.left,
      Side::Right => self.right,
    }
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;
  use crate::schema::{CATALOG, COMPETITION, COMPETITION_CATEGORY, SPORT, TEAM, TEAM_MEMBER};

  #[test]
  fn every_join_table_has_an_association() {
    let joins: Vec<_> = CATALOG.tables().iter().filter(|t| t.is_join()).map(|t| t.name).collect();
    let assocs: Vec<_> = Association::iter().map(|a| a.table().name).collect();
    assert_eq!(joins.len(), assocs.len());
    for name in joins {
      assert!(assocs.contains(&name), "{name} has no association");
    }
  }

  #[test]
  fn names_round_trip_through_from_str() {
    for assoc in Association::iter() {
      let parsed: Association = assoc.to_string().parse().unwrap();
      assert_eq!(parsed, assoc);
      assert_eq!(assoc.as_ref(), assoc.table().name);
    }
  }

  #[test]
  fn sides_follow_join_table_declaration() {
    let assoc = Association::CompetitionCategory;
    assert_eq!(assoc.side_of(&COMPETITION).unwrap(), Side::Left);
    assert_eq!(assoc.side_of(&COMPETITION_CATEGORY).unwrap(), Side::Right);
    assert_eq!(Association::PlayerTeam.side_of(&TEAM_MEMBER).unwrap(), Side::Left);
    assert_eq!(Association::PlayerTeam.side_of(&TEAM).unwrap(), Side::Right);

    let err = assoc.side_of(&SPORT).unwrap_err();
    assert!(matches!(err, Error::NotAnAssociationSide { table: "sport", .. }));
  }

  #[test]
  fn attribute_columns_exclude_member_keys() {
    let attrs: Vec<_> = Association::TeamMatch.attribute_columns().collect();
    assert_eq!(attrs, ["place", "stats"]);
    assert_eq!(Association::CoachTeam.attribute_columns().count(), 0);
  }

  #[test]
  fn link_serialises_association_by_table_name() {
    let link = Link::new(Association::NewsMatch, Uuid::nil(), Uuid::nil())
      .with_attr("respective_relevance", 7);
    let json = serde_json::to_value(&link).unwrap();
    assert_eq!(json["association"], "filtered_match_in_news");
    assert_eq!(json["attrs"]["respective_relevance"], 7);
  }
}
