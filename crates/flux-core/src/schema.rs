//! The schema catalog: every table, column, unique constraint and foreign key
//! of the store, declared as data.
//!
//! Backends derive their DDL from these declarations and execute deletes by
//! walking [`ForeignKey::on_delete`], so the cascade matrix lives in exactly
//! one place.

use strum::VariantNames;

use crate::enums::PipelineStatus;

// ─── Declarations ────────────────────────────────────────────────────────────

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
  /// Hyphenated lowercase UUID.
  Uuid,
  Text,
  Integer,
  /// Naive UTC timestamp, ISO 8601 without offset.
  Timestamp,
  /// Opaque JSON document (object or list).
  Json,
  /// Text restricted to the given lowercase names.
  Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
  pub name:     &'static str,
  pub kind:     ColumnKind,
  pub nullable: bool,
}

impl Column {
  const fn new(name: &'static str, kind: ColumnKind) -> Self {
    Self { name, kind, nullable: false }
  }

  pub const fn id(name: &'static str) -> Self { Self::new(name, ColumnKind::Uuid) }

  pub const fn text(name: &'static str) -> Self { Self::new(name, ColumnKind::Text) }

  pub const fn integer(name: &'static str) -> Self { Self::new(name, ColumnKind::Integer) }

  pub const fn timestamp(name: &'static str) -> Self {
    Self::new(name, ColumnKind::Timestamp)
  }

  pub const fn json(name: &'static str) -> Self { Self::new(name, ColumnKind::Json) }

  pub const fn enumeration(name: &'static str, values: &'static [&'static str]) -> Self {
    Self::new(name, ColumnKind::Enum(values))
  }

  pub const fn nullable(self) -> Self { Self { nullable: true, ..self } }
}

/// What happens to a referencing row when its parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
  /// The referencing row is deleted too (recursively).
  Cascade,
  /// The referencing column is set to NULL; the row survives.
  SetNull,
  /// The parent cannot be deleted while referencing rows exist.
  Restrict,
}

impl OnDelete {
  pub fn as_sql(self) -> &'static str {
    match self {
      OnDelete::Cascade => "CASCADE",
      OnDelete::SetNull => "SET NULL",
      OnDelete::Restrict => "RESTRICT",
    }
  }
}

/// A single-column reference to the primary key of `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
  pub column:    &'static str,
  pub parent:    &'static str,
  pub on_delete: OnDelete,
}

impl ForeignKey {
  pub const fn new(column: &'static str, parent: &'static str, on_delete: OnDelete) -> Self {
    Self { column, parent, on_delete }
  }
}

#[derive(Debug)]
pub struct Table {
  pub name:         &'static str,
  /// One column for entity tables; the two member columns for join tables.
  pub primary_key:  &'static [&'static str],
  pub columns:      &'static [Column],
  /// Each entry is one UNIQUE constraint over the listed columns.
  pub unique:       &'static [&'static [&'static str]],
  pub foreign_keys: &'static [ForeignKey],
}

impl Table {
  pub fn column(&self, name: &str) -> Option<&'static Column> {
    self.columns.iter().find(|c| c.name == name)
  }

  /// The first primary-key column; the whole key for entity tables.
  pub fn key(&self) -> &'static str { self.primary_key[0] }

  /// Join tables are keyed by the pair of their member foreign keys.
  pub fn is_join(&self) -> bool { self.primary_key.len() > 1 }

  pub fn has_timestamps(&self) -> bool {
    self.column(CREATED_AT).is_some() && self.column(UPDATED_AT).is_some()
  }

  pub fn foreign_key(&self, column: &str) -> Option<&'static ForeignKey> {
    self.foreign_keys.iter().find(|fk| fk.column == column)
  }

  pub fn is_key_column(&self, column: &str) -> bool { self.primary_key.contains(&column) }
}

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// An ordered set of tables. Parents are declared before the tables that
/// reference them.
#[derive(Debug)]
pub struct Catalog {
  tables: &'static [&'static Table],
}

impl Catalog {
  pub const fn new(tables: &'static [&'static Table]) -> Self { Self { tables } }

  pub fn tables(&self) -> &'static [&'static Table] { self.tables }

  pub fn table(&self, name: &str) -> Option<&'static Table> {
    self.tables.iter().copied().find(|t| t.name == name)
  }

  /// Every `(child table, foreign key)` pair whose key points at `parent`.
  pub fn referencing<'a>(
    &'a self,
    parent: &'a str,
  ) -> impl Iterator<Item = (&'static Table, &'static ForeignKey)> + 'a {
    self.tables.iter().copied().flat_map(move |table| {
      table
        .foreign_keys
        .iter()
        .filter(move |fk| fk.parent == parent)
        .map(move |fk| (table, fk))
    })
  }

  /// Structural checks: keys and constraints name real columns, parents exist
  /// and come earlier, set-null columns are nullable.
  pub fn validate(&self) -> Result<(), String> {
    for (idx, table) in self.tables.iter().enumerate() {
      let known = |col: &str| table.column(col).is_some();

      for key in table.primary_key {
        if !known(*key) {
          return Err(format!("{}: primary key column {key} is not declared", table.name));
        }
      }
      for set in table.unique {
        if let Some(col) = set.iter().find(|&&c| !known(c)) {
          return Err(format!("{}: unique column {col} is not declared", table.name));
        }
      }
      for fk in table.foreign_keys {
        let Some(column) = table.column(fk.column) else {
          return Err(format!("{}: foreign key column {} is not declared", table.name, fk.column));
        };
        let parent_idx = self.tables.iter().position(|t| t.name == fk.parent);
        match parent_idx {
          None => {
            return Err(format!("{}.{}: unknown parent {}", table.name, fk.column, fk.parent));
          }
          Some(p) if p >= idx && fk.parent != table.name => {
            return Err(format!(
              "{}.{}: parent {} is declared after its child",
              table.name, fk.column, fk.parent
            ));
          }
          Some(_) => {}
        }
        if fk.on_delete == OnDelete::SetNull && !column.nullable {
          return Err(format!("{}.{}: SET NULL on a NOT NULL column", table.name, fk.column));
        }
      }
    }
    Ok(())
  }
}

// ─── Sport & competitions ────────────────────────────────────────────────────

pub static SPORT: Table = Table {
  name:         "sport",
  primary_key:  &["sport_id"],
  columns:      &[
    Column::id("sport_id"),
    Column::text("name"),
    Column::text("description").nullable(),
    Column::text("image_url").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[&["name"]],
  foreign_keys: &[],
};

pub static COMPETITION: Table = Table {
  name:         "competition",
  primary_key:  &["competition_id"],
  columns:      &[
    Column::id("competition_id"),
    Column::id("sport_id"),
    Column::text("name"),
    Column::text("prize_pool").nullable(),
    Column::text("location").nullable(),
    Column::timestamp("start_date").nullable(),
    Column::text("description").nullable(),
    Column::text("image_url").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[&["name"]],
  foreign_keys: &[ForeignKey::new("sport_id", "sport", OnDelete::Cascade)],
};

pub static COMPETITION_CATEGORY: Table = Table {
  name:         "competition_category",
  primary_key:  &["category_id"],
  columns:      &[
    Column::id("category_id"),
    Column::text("name"),
    Column::text("description").nullable(),
    Column::text("image_url").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[],
};

pub static COMPETITION_IN_CATEGORY: Table = Table {
  name:         "competition_in_category",
  primary_key:  &["competition_id", "category_id"],
  columns:      &[Column::id("competition_id"), Column::id("category_id")],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("competition_id", "competition", OnDelete::Cascade),
    ForeignKey::new("category_id", "competition_category", OnDelete::Cascade),
  ],
};

// ─── Teams & people ──────────────────────────────────────────────────────────

pub static TEAM: Table = Table {
  name:         "team",
  primary_key:  &["team_id"],
  columns:      &[
    Column::id("team_id"),
    Column::text("name"),
    Column::text("pretty_name").nullable(),
    Column::text("team_url").nullable(),
    Column::text("description").nullable(),
    Column::text("image_url").nullable(),
    Column::json("stats").nullable(),
    Column::json("regalia").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[&["name"]],
  foreign_keys: &[],
};

pub static TEAM_IN_COMPETITION: Table = Table {
  name:         "team_in_competition",
  primary_key:  &["team_id", "competition_id"],
  columns:      &[
    Column::id("team_id"),
    Column::id("competition_id"),
    Column::integer("place").nullable(),
    Column::json("stats").nullable(),
  ],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("team_id", "team", OnDelete::Cascade),
    ForeignKey::new("competition_id", "competition", OnDelete::Cascade),
  ],
};

pub static TEAM_MEMBER: Table = Table {
  name:         "team_member",
  primary_key:  &["player_id"],
  columns:      &[
    Column::id("player_id"),
    Column::text("team_member_url").nullable(),
    Column::text("nickname").nullable(),
    Column::text("name").nullable(),
    Column::integer("age").nullable(),
    Column::text("country").nullable(),
    Column::json("stats").nullable(),
    Column::text("description").nullable(),
    Column::text("image_url").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[&["nickname", "name", "image_url"]],
  foreign_keys: &[],
};

pub static PLAYER_IN_TEAM: Table = Table {
  name:         "player_in_team",
  primary_key:  &["player_id", "team_id"],
  columns:      &[Column::id("player_id"), Column::id("team_id")],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("player_id", "team_member", OnDelete::Cascade),
    ForeignKey::new("team_id", "team", OnDelete::Cascade),
  ],
};

pub static COACH: Table = Table {
  name:         "coach",
  primary_key:  &["coach_id"],
  columns:      &[
    Column::id("coach_id"),
    Column::text("name"),
    Column::text("description").nullable(),
    Column::text("image_url").nullable(),
    Column::json("stats").nullable(),
    Column::json("regalia").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[],
};

pub static COACH_IN_TEAM: Table = Table {
  name:         "coach_in_team",
  primary_key:  &["coach_id", "team_id"],
  columns:      &[Column::id("coach_id"), Column::id("team_id")],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("coach_id", "coach", OnDelete::Cascade),
    ForeignKey::new("team_id", "team", OnDelete::Cascade),
  ],
};

// ─── Matches ─────────────────────────────────────────────────────────────────

pub static MATCH_STATUS: Table = Table {
  name:         "match_status",
  primary_key:  &["status_id"],
  columns:      &[
    Column::id("status_id"),
    Column::text("name"),
    Column::json("status").nullable(),
    Column::text("image_url").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[],
};

pub static MATCH: Table = Table {
  name:         "match",
  primary_key:  &["match_id"],
  columns:      &[
    Column::id("match_id"),
    Column::id("sport_id").nullable(),
    Column::id("competition_id").nullable(),
    Column::id("status_id").nullable(),
    Column::text("match_name"),
    Column::text("pretty_match_name").nullable(),
    Column::json("match_streams").nullable(),
    Column::text("match_url").nullable(),
    Column::text("tournament_url").nullable(),
    Column::enumeration("pipeline_status", PipelineStatus::VARIANTS).nullable(),
    Column::timestamp("pipeline_update_time").nullable(),
    Column::text("external_id"),
    Column::timestamp("planned_start_datetime").nullable(),
    Column::timestamp("end_datetime").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[&["external_id"], &["match_name", "planned_start_datetime"]],
  foreign_keys: &[
    ForeignKey::new("sport_id", "sport", OnDelete::SetNull),
    ForeignKey::new("competition_id", "competition", OnDelete::Cascade),
    ForeignKey::new("status_id", "match_status", OnDelete::SetNull),
  ],
};

pub static TEAM_IN_MATCH: Table = Table {
  name:         "team_in_match",
  primary_key:  &["team_id", "match_id"],
  columns:      &[
    Column::id("team_id"),
    Column::id("match_id"),
    Column::integer("place").nullable(),
    Column::json("stats").nullable(),
  ],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("team_id", "team", OnDelete::Cascade),
    ForeignKey::new("match_id", "match", OnDelete::Cascade),
  ],
};

pub static SUBSTITUTION: Table = Table {
  name:         "substitution",
  primary_key:  &["substitution_id"],
  columns:      &[
    Column::id("substitution_id"),
    Column::id("match_id"),
    Column::id("team_id"),
    Column::id("prev_player_id").nullable(),
    Column::id("new_player_id").nullable(),
    Column::integer("time").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("match_id", "match", OnDelete::Cascade),
    ForeignKey::new("team_id", "team", OnDelete::Cascade),
    ForeignKey::new("prev_player_id", "team_member", OnDelete::SetNull),
    ForeignKey::new("new_player_id", "team_member", OnDelete::SetNull),
  ],
};

pub static MATCH_AI_STATEMENT: Table = Table {
  name:         "match_ai_statement",
  primary_key:  &["statement_id"],
  columns:      &[
    Column::id("statement_id"),
    Column::text("statement"),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[],
};

pub static AI_STATEMENT_IN_MATCH: Table = Table {
  name:         "ai_statement_in_match",
  primary_key:  &["statement_id", "match_id"],
  columns:      &[Column::id("statement_id"), Column::id("match_id")],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("statement_id", "match_ai_statement", OnDelete::Cascade),
    ForeignKey::new("match_id", "match", OnDelete::Cascade),
  ],
};

// ─── News ────────────────────────────────────────────────────────────────────

pub static RAW_NEWS: Table = Table {
  name:         "raw_news",
  primary_key:  &["raw_news_id"],
  columns:      &[
    Column::id("raw_news_id"),
    Column::id("sport_id"),
    Column::text("header").nullable(),
    Column::json("text"),
    Column::text("url"),
    Column::timestamp("news_creation_time").nullable(),
    Column::enumeration("pipeline_status", PipelineStatus::VARIANTS).nullable(),
    Column::timestamp("pipeline_update_time").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[ForeignKey::new("sport_id", "sport", OnDelete::Cascade)],
};

pub static FORMATTED_NEWS: Table = Table {
  name:         "formatted_news",
  primary_key:  &["formatted_news_id"],
  columns:      &[
    Column::id("formatted_news_id"),
    Column::id("sport_id"),
    Column::text("header").nullable(),
    Column::json("text"),
    Column::text("url"),
    Column::json("keywords"),
    Column::timestamp("news_creation_time").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[ForeignKey::new("sport_id", "sport", OnDelete::Cascade)],
};

pub static FILTERED_MATCH_IN_NEWS: Table = Table {
  name:         "filtered_match_in_news",
  primary_key:  &["match_id", "news_id"],
  columns:      &[
    Column::id("match_id"),
    Column::id("news_id"),
    Column::integer("respective_relevance").nullable(),
    Column::timestamp(CREATED_AT),
    Column::timestamp(UPDATED_AT),
  ],
  unique:       &[],
  foreign_keys: &[
    ForeignKey::new("match_id", "match", OnDelete::Cascade),
    ForeignKey::new("news_id", "formatted_news", OnDelete::Cascade),
  ],
};

pub static USED_URL: Table = Table {
  name:         "used_url",
  primary_key:  &["url_id"],
  columns:      &[
    Column::id("url_id"),
    Column::text("url"),
    Column::timestamp("used_at"),
  ],
  unique:       &[&["url"]],
  foreign_keys: &[],
};

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// The full store schema, parents first.
pub static CATALOG: Catalog = Catalog::new(&[
  &SPORT,
  &COMPETITION,
  &COMPETITION_CATEGORY,
  &COMPETITION_IN_CATEGORY,
  &TEAM,
  &TEAM_IN_COMPETITION,
  &TEAM_MEMBER,
  &PLAYER_IN_TEAM,
  &COACH,
  &COACH_IN_TEAM,
  &MATCH_STATUS,
  &MATCH,
  &TEAM_IN_MATCH,
  &SUBSTITUTION,
  &MATCH_AI_STATEMENT,
  &AI_STATEMENT_IN_MATCH,
  &RAW_NEWS,
  &FORMATTED_NEWS,
  &FILTERED_MATCH_IN_NEWS,
  &USED_URL,
]);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn catalog_is_consistent() {
    CATALOG.validate().unwrap();
  }

  #[test]
  fn catalog_has_stable_table_names() {
    let names: Vec<_> = CATALOG.tables().iter().map(|t| t.name).collect();
    assert_eq!(names, [
      "sport",
      "competition",
      "competition_category",
      "competition_in_category",
      "team",
      "team_in_competition",
      "team_member",
      "player_in_team",
      "coach",
      "coach_in_team",
      "match_status",
      "match",
      "team_in_match",
      "substitution",
      "match_ai_statement",
      "ai_statement_in_match",
      "raw_news",
      "formatted_news",
      "filtered_match_in_news",
      "used_url",
    ]);
  }

  #[test]
  fn join_tables_cascade_on_both_members() {
    for table in CATALOG.tables().iter().filter(|t| t.is_join()) {
      assert_eq!(table.foreign_keys.len(), 2, "{}", table.name);
      for fk in table.foreign_keys {
        assert!(table.is_key_column(fk.column));
        assert_eq!(fk.on_delete, OnDelete::Cascade, "{}.{}", table.name, fk.column);
      }
    }
  }

  #[test]
  fn match_status_is_referenced_with_set_null() {
    let refs: Vec<_> = CATALOG.referencing("match_status").collect();
    assert_eq!(refs.len(), 1);
    let (table, fk) = refs[0];
    assert_eq!(table.name, "match");
    assert_eq!(fk.on_delete, OnDelete::SetNull);
  }

  #[test]
  fn validate_rejects_set_null_on_required_column() {
    static PARENT: Table = Table {
      name:         "parent",
      primary_key:  &["id"],
      columns:      &[Column::id("id")],
      unique:       &[],
      foreign_keys: &[],
    };
    static CHILD: Table = Table {
      name:         "child",
      primary_key:  &["id"],
      columns:      &[Column::id("id"), Column::id("parent_id")],
      unique:       &[],
      foreign_keys: &[ForeignKey::new("parent_id", "parent", OnDelete::SetNull)],
    };
    static BAD: Catalog = Catalog::new(&[&PARENT, &CHILD]);

    let err = BAD.validate().unwrap_err();
    assert!(err.contains("SET NULL"), "{err}");
  }

  #[test]
  fn validate_rejects_child_before_parent() {
    static PARENT: Table = Table {
      name:         "parent",
      primary_key:  &["id"],
      columns:      &[Column::id("id")],
      unique:       &[],
      foreign_keys: &[],
    };
    static CHILD: Table = Table {
      name:         "child",
      primary_key:  &["id"],
      columns:      &[Column::id("id"), Column::id("parent_id")],
      unique:       &[],
      foreign_keys: &[ForeignKey::new("parent_id", "parent", OnDelete::Cascade)],
    };
    static BAD: Catalog = Catalog::new(&[&CHILD, &PARENT]);

    assert!(BAD.validate().is_err());
  }
}
