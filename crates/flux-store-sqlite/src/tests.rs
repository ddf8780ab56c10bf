//! Integration tests for `SqliteStore` against in-memory and temp-file
//! databases.

use std::time::Duration;

use flux_core::{
  Error as CoreError,
  association::{Association, Link, Side},
  changes::Changes,
  enums::PipelineStatus,
  fixture::{Match, MatchAiStatement, MatchStatus, Substitution},
  news::{FormattedNews, RawNews},
  query::Filter,
  schema::{Catalog, Column, ForeignKey, OnDelete, Table},
  sport::{Competition, CompetitionCategory, Sport},
  store::SportsStore,
  team::{Coach, Team, TeamMember},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Error, PoolConfig, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn sport(s: &SqliteStore, name: &str) -> Sport { s.create(Sport::new(name)).await.unwrap() }

async fn competition(s: &SqliteStore, sport: &Sport, name: &str) -> Competition {
  s.create(Competition::new(sport.sport_id, name)).await.unwrap()
}

async fn fixture(s: &SqliteStore, sport: &Sport, comp: &Competition, ext: &str) -> Match {
  s.create(Match::new(format!("match {ext}"), ext).in_competition(sport.sport_id, comp.competition_id))
    .await
    .unwrap()
}

fn core(err: &Error) -> &CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected an integrity error, got {other:?}"),
  }
}

// ─── Create & read ───────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_round_trip() {
  let s = store().await;
  let mut team = Team::new("Team X");
  team.stats = Some(json!({"wins": 5, "losses": 2}));
  team.regalia = Some(json!(["Major 2023"]));
  let created = s.create(team.clone()).await.unwrap();
  assert_eq!(created.team_id, team.team_id);

  let fetched: Team = s.require(team.team_id).await.unwrap();
  assert_eq!(fetched.name, "Team X");
  assert_eq!(fetched.stats, team.stats);
  assert_eq!(fetched.regalia, team.regalia);
  assert_eq!(fetched.created_at, fetched.updated_at);
}

#[tokio::test]
async fn nil_id_is_generated() {
  let s = store().await;
  let mut sp = Sport::new("Soccer");
  sp.sport_id = Uuid::nil();
  let created = s.create(sp).await.unwrap();
  assert!(!created.sport_id.is_nil());
  assert_eq!(created.sport_id.get_version_num(), 7);
}

#[tokio::test]
async fn missing_rows() {
  let s = store().await;
  assert!(s.get::<Sport>(Uuid::now_v7()).await.unwrap().is_none());

  let err = s.require::<Team>(Uuid::now_v7()).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::NotFound { table: "team", .. }));

  let err = s.delete::<Team>(Uuid::now_v7()).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::NotFound { .. }));
}

#[tokio::test]
async fn find_filters_by_column() {
  let s = store().await;
  let soccer = sport(&s, "Soccer").await;
  let cs = sport(&s, "CS2").await;
  let pl = competition(&s, &soccer, "Premier League").await;
  competition(&s, &cs, "IEM Katowice").await;

  let mut m = Match::new("A vs B", "ext-1").in_competition(soccer.sport_id, pl.competition_id);
  m.pipeline_status = Some(PipelineStatus::Sent);
  s.create(m).await.unwrap();
  s.create(Match::new("C vs D", "ext-2")).await.unwrap();

  let comps: Vec<Competition> = s
    .find(Filter::new().eq("sport_id", soccer.sport_id.to_string()))
    .await
    .unwrap();
  assert_eq!(comps.len(), 1);
  assert_eq!(comps[0].name, "Premier League");

  // Enum filters are case-insensitive, NULL filters match IS NULL.
  let sent: Vec<Match> = s.find(Filter::new().eq("pipeline_status", "SENT")).await.unwrap();
  assert_eq!(sent.len(), 1);
  let orphans: Vec<Match> = s.find(Filter::new().eq("competition_id", Value::Null)).await.unwrap();
  assert_eq!(orphans.len(), 1);
  assert_eq!(orphans[0].external_id, "ext-2");

  let by_ext: Option<Match> = s.get_by("external_id", json!("ext-2")).await.unwrap();
  assert_eq!(by_ext.unwrap().name, "C vs D");

  let page: Vec<Sport> = s.find(Filter::new().limit(1).offset(1)).await.unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].name, "CS2");

  let err = s.find::<Sport>(Filter::new().eq("colour", "red")).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::UnknownColumn { .. }));
}

// ─── Integrity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_unique_values_are_rejected() {
  let s = store().await;
  sport(&s, "Soccer").await;
  let err = s.create(Sport::new("Soccer")).await.unwrap_err();
  assert!(matches!(
    core(&err),
    CoreError::UniqueConstraintViolation { table: "sport", .. }
  ));

  s.create(Match::new("A vs B", "ext-1")).await.unwrap();
  let err = s.create(Match::new("C vs D", "ext-1")).await.unwrap_err();
  let CoreError::UniqueConstraintViolation { table, columns, value } = core(&err) else {
    panic!("expected unique violation, got {err:?}");
  };
  assert_eq!(*table, "match");
  assert_eq!(columns, "external_id");
  assert_eq!(value, "ext-1");
}

#[tokio::test]
async fn composite_unique_ignores_nulls() {
  let s = store().await;
  s.create(TeamMember::with_nickname("s1mple")).await.unwrap();
  // (nickname, NULL, NULL) never collides with itself.
  s.create(TeamMember::with_nickname("s1mple")).await.unwrap();

  let mut a = TeamMember::with_nickname("zywoo");
  a.name = Some("Mathieu Herbaut".into());
  a.image_url = Some("https://img/zywoo.png".into());
  let mut b = a.clone();
  b.player_id = Uuid::now_v7();
  s.create(a).await.unwrap();
  let err = s.create(b).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::UniqueConstraintViolation { .. }));
}

#[tokio::test]
async fn dangling_references_are_rejected() {
  let s = store().await;
  let err = s.create(Competition::new(Uuid::now_v7(), "Ghost Cup")).await.unwrap_err();
  assert!(matches!(
    core(&err),
    CoreError::ForeignKeyViolation { table: "competition", column: "sport_id", .. }
  ));

  let m = s.create(Match::new("A vs B", "ext-1")).await.unwrap();
  let err = s
    .update::<Match>(m.match_id, Changes::new().set("status_id", Uuid::now_v7().to_string()))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::ForeignKeyViolation { column: "status_id", .. }));
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_refreshes_updated_at() {
  let s = store().await;
  let sp = sport(&s, "Soccer").await;
  let updated: Sport = s
    .update(sp.sport_id, Changes::new().set("description", "The beautiful game"))
    .await
    .unwrap();
  assert_eq!(updated.description.as_deref(), Some("The beautiful game"));
  assert_eq!(updated.created_at, sp.created_at);
  assert!(updated.updated_at >= sp.updated_at);
}

#[tokio::test]
async fn update_rejects_bad_columns() {
  let s = store().await;
  let sp = sport(&s, "Soccer").await;

  let err = s.update::<Sport>(sp.sport_id, Changes::new().set("colour", "red")).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::UnknownColumn { .. }));

  let err = s
    .update::<Sport>(sp.sport_id, Changes::new().set("sport_id", Uuid::now_v7().to_string()))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::ImmutableColumn { .. }));

  let err = s
    .update::<Sport>(sp.sport_id, Changes::new().set("created_at", "2020-01-01T00:00:00"))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::ImmutableColumn { .. }));

  let err = s
    .update::<Sport>(sp.sport_id, Changes::new().set_key("name", "x", 1))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::InvalidValue { .. }));

  let err = s
    .update::<Sport>(sp.sport_id, Changes::new().set("name", Value::Null))
    .await
    .unwrap_err();
  assert!(core(&err).is_invalid_input());
}

#[tokio::test]
async fn rename_to_taken_name_fails_but_self_rename_succeeds() {
  let s = store().await;
  let a = sport(&s, "Soccer").await;
  sport(&s, "CS2").await;

  let err = s.update::<Sport>(a.sport_id, Changes::new().set("name", "CS2")).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::UniqueConstraintViolation { .. }));

  let same: Sport = s.update(a.sport_id, Changes::new().set("name", "Soccer")).await.unwrap();
  assert_eq!(same.name, "Soccer");
}

#[tokio::test]
async fn json_key_update_keeps_siblings() {
  let s = store().await;
  let mut team = Team::new("Team X");
  team.stats = Some(json!({"wins": 5, "losses": 2}));
  let team = s.create(team).await.unwrap();

  let updated: Team = s
    .update(team.team_id, Changes::new().set_key("stats", "wins", 6))
    .await
    .unwrap();
  assert_eq!(updated.stats, Some(json!({"wins": 6, "losses": 2})));

  let reread: Team = s.require(team.team_id).await.unwrap();
  assert_eq!(reread.stats, Some(json!({"wins": 6, "losses": 2})));
}

#[tokio::test]
async fn json_edits_start_from_null_documents() {
  let s = store().await;
  let team = s.create(Team::new("Team X")).await.unwrap();
  let updated: Team = s
    .update(
      team.team_id,
      Changes::new()
        .set_path("stats", ["maps", "mirage"], 0.7)
        .merge("regalia", json!({"majors": 2})),
    )
    .await
    .unwrap();
  assert_eq!(updated.stats, Some(json!({"maps": {"mirage": 0.7}})));
  assert_eq!(updated.regalia, Some(json!({"majors": 2})));

  let sp = sport(&s, "Soccer").await;
  let news = s.create(FormattedNews::new(sp.sport_id, "https://n/1")).await.unwrap();
  let news: FormattedNews = s
    .update(news.formatted_news_id, Changes::new().push("keywords", "final"))
    .await
    .unwrap();
  assert_eq!(news.keywords, ["final"]);
}

#[tokio::test]
async fn json_edits_must_fit_the_entity() {
  let s = store().await;
  let sp = sport(&s, "Soccer").await;
  let news = s.create(RawNews::new(sp.sport_id, "https://n/raw")).await.unwrap();
  let news: RawNews = s
    .update(news.raw_news_id, Changes::new().push("text", "first paragraph"))
    .await
    .unwrap();

  // `text` holds strings only.
  let err = s
    .update::<RawNews>(news.raw_news_id, Changes::new().push("text", 5))
    .await
    .unwrap_err();
  let CoreError::InvalidValue { table, column, .. } = core(&err) else {
    panic!("unexpected error: {err}");
  };
  assert_eq!((*table, column.as_str()), ("raw_news", "text"));

  let err = s
    .update::<RawNews>(news.raw_news_id, Changes::new().set("text", json!({"a": 1})))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::InvalidValue { table: "raw_news", .. }));

  let stored = s.require::<RawNews>(news.raw_news_id).await.unwrap();
  assert_eq!(stored.text, ["first paragraph"]);
  assert_eq!(stored.updated_at, news.updated_at);
}

#[tokio::test]
async fn pipeline_transition_is_stored_lowercase() {
  let s = store().await;
  let m = s.create(Match::new("A vs B", "ext-1")).await.unwrap();
  let at = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
    .unwrap()
    .and_hms_opt(12, 30, 0)
    .unwrap();
  let updated: Match = s
    .update(m.match_id, Changes::new().pipeline(PipelineStatus::Processed, at))
    .await
    .unwrap();
  assert_eq!(updated.pipeline_status, Some(PipelineStatus::Processed));
  assert_eq!(updated.pipeline_update_time, Some(at));
}

// ─── Associations ────────────────────────────────────────────────────────────

#[tokio::test]
async fn attach_detach_and_duplicates() {
  let s = store().await;
  let team = s.create(Team::new("Team X")).await.unwrap();
  let player = s.create(TeamMember::with_nickname("s1mple")).await.unwrap();

  s.attach(Link::new(Association::PlayerTeam, player.player_id, team.team_id))
    .await
    .unwrap();
  let err = s
    .attach(Link::new(Association::PlayerTeam, player.player_id, team.team_id))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::DuplicateAssociation { .. }));

  let players: Vec<TeamMember> = s.associated(Association::PlayerTeam, team.team_id).await.unwrap();
  assert_eq!(players.len(), 1);
  let teams: Vec<Team> = s.associated(Association::PlayerTeam, player.player_id).await.unwrap();
  assert_eq!(teams[0].team_id, team.team_id);

  s.detach(Association::PlayerTeam, player.player_id, team.team_id).await.unwrap();
  let err = s
    .detach(Association::PlayerTeam, player.player_id, team.team_id)
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::NotFound { table: "player_in_team", .. }));
}

#[tokio::test]
async fn attach_requires_both_ends() {
  let s = store().await;
  let team = s.create(Team::new("Team X")).await.unwrap();
  let err = s
    .attach(Link::new(Association::CoachTeam, Uuid::now_v7(), team.team_id))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::ForeignKeyViolation { column: "coach_id", .. }));

  let err = s
    .attach(Link::new(Association::CoachTeam, Uuid::now_v7(), team.team_id).with_attr("rank", 1))
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::UnknownColumn { .. }));
}

#[tokio::test]
async fn join_attributes_can_be_updated() {
  let s = store().await;
  let team = s.create(Team::new("Team X")).await.unwrap();
  let m = s.create(Match::new("X vs Y", "ext-1")).await.unwrap();

  let link = s
    .attach(
      Link::new(Association::TeamMatch, team.team_id, m.match_id)
        .with_attr("place", 1)
        .with_attr("stats", json!({"kills": 80, "deaths": 60})),
    )
    .await
    .unwrap();
  assert_eq!(link.attrs["place"], 1);

  let link = s
    .update_link(
      Association::TeamMatch,
      team.team_id,
      m.match_id,
      Changes::new().set("place", 2).set_key("stats", "kills", 81),
    )
    .await
    .unwrap();
  assert_eq!(link.attrs["place"], 2);
  assert_eq!(link.attrs["stats"], json!({"kills": 81, "deaths": 60}));

  let err = s
    .update_link(
      Association::TeamMatch,
      team.team_id,
      m.match_id,
      Changes::new().set("team_id", Uuid::now_v7().to_string()),
    )
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::ImmutableColumn { .. }));

  let links = s.links(Association::TeamMatch, Side::Right, m.match_id).await.unwrap();
  assert_eq!(links.len(), 1);
  assert_eq!(links[0].left, team.team_id);
}

#[tokio::test]
async fn relevance_links_carry_timestamps() {
  let s = store().await;
  let sp = sport(&s, "CS2").await;
  let news = s.create(FormattedNews::new(sp.sport_id, "https://n/1")).await.unwrap();
  let m = s.create(Match::new("X vs Y", "ext-1")).await.unwrap();

  let link = s
    .attach(
      Link::new(Association::NewsMatch, m.match_id, news.formatted_news_id)
        .with_attr("respective_relevance", 7),
    )
    .await
    .unwrap();
  assert_eq!(link.attrs["respective_relevance"], 7);
  assert!(link.attrs["created_at"].is_string());

  let matches: Vec<Match> = s
    .associated(Association::NewsMatch, news.formatted_news_id)
    .await
    .unwrap();
  assert_eq!(matches[0].match_id, m.match_id);
}

// ─── Delete cascades ─────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_category_removes_only_its_join_rows() {
  let s = store().await;
  let sp = sport(&s, "CS2").await;
  let major = s.create(CompetitionCategory::new("Major")).await.unwrap();
  let online = s.create(CompetitionCategory::new("Online")).await.unwrap();

  let mut comps = Vec::new();
  for name in ["A", "B", "C"] {
    let c = competition(&s, &sp, name).await;
    for cat in [&major, &online] {
      s.attach(Link::new(Association::CompetitionCategory, c.competition_id, cat.category_id))
        .await
        .unwrap();
    }
    comps.push(c);
  }

  let report = s.delete::<CompetitionCategory>(major.category_id).await.unwrap();
  assert_eq!(report.deleted("competition_in_category"), 3);
  assert_eq!(report.deleted("competition_category"), 1);
  assert_eq!(report.total_deleted(), 4);

  for c in &comps {
    assert!(s.get::<Competition>(c.competition_id).await.unwrap().is_some());
    let cats: Vec<CompetitionCategory> = s
      .associated(Association::CompetitionCategory, c.competition_id)
      .await
      .unwrap();
    assert_eq!(cats.len(), 1);
    assert_eq!(cats[0].category_id, online.category_id);
  }
}

#[tokio::test]
async fn deleting_competition_deletes_matches_not_teams() {
  let s = store().await;
  let sp = sport(&s, "CS2").await;
  let comp = competition(&s, &sp, "IEM").await;
  let m1 = fixture(&s, &sp, &comp, "ext-1").await;
  fixture(&s, &sp, &comp, "ext-2").await;
  let team = s.create(Team::new("Team X")).await.unwrap();
  s.attach(Link::new(Association::TeamCompetition, team.team_id, comp.competition_id))
    .await
    .unwrap();
  s.attach(Link::new(Association::TeamMatch, team.team_id, m1.match_id))
    .await
    .unwrap();

  let report = s.delete::<Competition>(comp.competition_id).await.unwrap();
  assert_eq!(report.deleted("match"), 2);
  assert_eq!(report.deleted("team_in_competition"), 1);
  assert_eq!(report.deleted("team_in_match"), 1);

  assert!(s.list::<Match>().await.unwrap().is_empty());
  assert!(s.get::<Team>(team.team_id).await.unwrap().is_some());
  assert!(s.get::<Sport>(sp.sport_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_team_keeps_people_and_matches() {
  let s = store().await;
  let sp = sport(&s, "CS2").await;
  let comp = competition(&s, &sp, "IEM").await;
  let m = fixture(&s, &sp, &comp, "ext-1").await;
  let team = s.create(Team::new("Team X")).await.unwrap();
  let p1 = s.create(TeamMember::with_nickname("a")).await.unwrap();
  let p2 = s.create(TeamMember::with_nickname("b")).await.unwrap();
  let coach = s.create(Coach::new("Coach A")).await.unwrap();

  for p in [&p1, &p2] {
    s.attach(Link::new(Association::PlayerTeam, p.player_id, team.team_id))
      .await
      .unwrap();
  }
  s.attach(Link::new(Association::CoachTeam, coach.coach_id, team.team_id))
    .await
    .unwrap();
  s.attach(Link::new(Association::TeamMatch, team.team_id, m.match_id))
    .await
    .unwrap();
  s.attach(Link::new(Association::TeamCompetition, team.team_id, comp.competition_id))
    .await
    .unwrap();
  s.create(Substitution::new(m.match_id, team.team_id).players(p1.player_id, p2.player_id))
    .await
    .unwrap();

  let report = s.delete::<Team>(team.team_id).await.unwrap();
  assert_eq!(report.deleted("substitution"), 1);
  assert_eq!(report.deleted("player_in_team"), 2);
  assert_eq!(report.deleted("coach_in_team"), 1);
  assert_eq!(report.deleted("team_in_match"), 1);
  assert_eq!(report.deleted("team_in_competition"), 1);
  assert_eq!(report.deleted("team"), 1);

  assert_eq!(s.list::<TeamMember>().await.unwrap().len(), 2);
  assert!(s.get::<Coach>(coach.coach_id).await.unwrap().is_some());
  assert!(s.get::<Match>(m.match_id).await.unwrap().is_some());
  assert!(s.get::<Competition>(comp.competition_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_coach_removes_only_their_team_links() {
  let s = store().await;
  let team = s.create(Team::new("Team X")).await.unwrap();
  let a = s.create(Coach::new("Coach A")).await.unwrap();
  let b = s.create(Coach::new("Coach B")).await.unwrap();
  for coach in [&a, &b] {
    s.attach(Link::new(Association::CoachTeam, coach.coach_id, team.team_id))
      .await
      .unwrap();
  }

  let report = s.delete::<Coach>(a.coach_id).await.unwrap();
  assert_eq!(report.deleted("coach"), 1);
  assert_eq!(report.deleted("coach_in_team"), 1);
  assert_eq!(report.deleted("team"), 0);

  assert!(s.get::<Team>(team.team_id).await.unwrap().is_some());
  let left = s.links(Association::CoachTeam, Side::Right, team.team_id).await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].left, b.coach_id);
}

#[tokio::test]
async fn deleting_statement_keeps_its_match() {
  let s = store().await;
  let m = s.create(Match::new("A vs B", "ext-1")).await.unwrap();
  let statement = s.create(MatchAiStatement::new("A is favoured")).await.unwrap();
  s.attach(Link::new(Association::StatementMatch, statement.statement_id, m.match_id))
    .await
    .unwrap();

  let report = s.delete::<MatchAiStatement>(statement.statement_id).await.unwrap();
  assert_eq!(report.deleted("match_ai_statement"), 1);
  assert_eq!(report.deleted("ai_statement_in_match"), 1);
  assert_eq!(report.deleted("match"), 0);

  assert!(s.get::<Match>(m.match_id).await.unwrap().is_some());
  assert!(s.links(Association::StatementMatch, Side::Right, m.match_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_formatted_news_keeps_its_matches() {
  let s = store().await;
  let sp = sport(&s, "CS2").await;
  let news = s.create(FormattedNews::new(sp.sport_id, "https://n/1")).await.unwrap();
  let m = s.create(Match::new("X vs Y", "ext-1")).await.unwrap();
  s.attach(
    Link::new(Association::NewsMatch, m.match_id, news.formatted_news_id)
      .with_attr("respective_relevance", 3),
  )
  .await
  .unwrap();

  let report = s.delete::<FormattedNews>(news.formatted_news_id).await.unwrap();
  assert_eq!(report.deleted("formatted_news"), 1);
  assert_eq!(report.deleted("filtered_match_in_news"), 1);
  assert_eq!(report.deleted("match"), 0);

  assert!(s.get::<Match>(m.match_id).await.unwrap().is_some());
  assert!(s.get::<Sport>(sp.sport_id).await.unwrap().is_some());
  assert!(s.links(Association::NewsMatch, Side::Left, m.match_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_member_leaves_teams_and_nulls_substitutions() {
  let s = store().await;
  let a = s.create(Team::new("Team A")).await.unwrap();
  let b = s.create(Team::new("Team B")).await.unwrap();
  let member = s.create(TeamMember::with_nickname("s1mple")).await.unwrap();
  let other = s.create(TeamMember::with_nickname("electronic")).await.unwrap();
  for team in [&a, &b] {
    s.attach(Link::new(Association::PlayerTeam, member.player_id, team.team_id))
      .await
      .unwrap();
  }
  let m = s.create(Match::new("A vs B", "ext-1")).await.unwrap();
  let sub = s
    .create(Substitution::new(m.match_id, a.team_id).players(member.player_id, other.player_id))
    .await
    .unwrap();

  let report = s.delete::<TeamMember>(member.player_id).await.unwrap();
  assert_eq!(report.deleted("player_in_team"), 2);
  assert_eq!(report.nulled("substitution", "prev_player_id"), 1);
  assert_eq!(report.nulled("substitution", "new_player_id"), 0);

  assert_eq!(s.list::<Team>().await.unwrap().len(), 2);
  assert!(s.links(Association::PlayerTeam, Side::Right, a.team_id).await.unwrap().is_empty());
  let sub: Substitution = s.require(sub.substitution_id).await.unwrap();
  assert_eq!(sub.prev_player_id, None);
  assert_eq!(sub.new_player_id, Some(other.player_id));
}

#[tokio::test]
async fn match_status_is_shared_and_nullified_on_delete() {
  let s = store().await;
  let status = s.create(MatchStatus::new("Scheduled")).await.unwrap();
  let m1 = s
    .create(Match::new("A vs B", "ext-1").with_status(status.status_id))
    .await
    .unwrap();
  let m2 = s
    .create(Match::new("C vs D", "ext-2").with_status(status.status_id))
    .await
    .unwrap();

  s.update::<MatchStatus>(status.status_id, Changes::new().set("name", "Updated Status"))
    .await
    .unwrap();
  for m in [&m1, &m2] {
    let m: Match = s.require(m.match_id).await.unwrap();
    let st: MatchStatus = s.require(m.status_id.unwrap()).await.unwrap();
    assert_eq!(st.name, "Updated Status");
  }

  let report = s.delete::<MatchStatus>(status.status_id).await.unwrap();
  assert_eq!(report.nulled("match", "status_id"), 2);
  let m1: Match = s.require(m1.match_id).await.unwrap();
  assert_eq!(m1.status_id, None);
  assert!(m1.updated_at >= m1.created_at);
}

#[tokio::test]
async fn deleting_match_keeps_its_parents() {
  let s = store().await;
  let sp = sport(&s, "CS2").await;
  let comp = competition(&s, &sp, "IEM").await;
  let status = s.create(MatchStatus::new("Live")).await.unwrap();
  let team = s.create(Team::new("Team X")).await.unwrap();
  let m = s
    .create(
      Match::new("X vs Y", "ext-1")
        .in_competition(sp.sport_id, comp.competition_id)
        .with_status(status.status_id),
    )
    .await
    .unwrap();
  s.create(Substitution::new(m.match_id, team.team_id)).await.unwrap();
  let statement = s.create(MatchAiStatement::new("X is favoured")).await.unwrap();
  s.attach(Link::new(Association::StatementMatch, statement.statement_id, m.match_id))
    .await
    .unwrap();

  let report = s.delete::<Match>(m.match_id).await.unwrap();
  assert_eq!(report.deleted("substitution"), 1);
  assert_eq!(report.deleted("ai_statement_in_match"), 1);

  assert!(s.get::<MatchStatus>(status.status_id).await.unwrap().is_some());
  assert!(s.get::<Sport>(sp.sport_id).await.unwrap().is_some());
  assert!(s.get::<Competition>(comp.competition_id).await.unwrap().is_some());
  assert!(s.get::<MatchAiStatement>(statement.statement_id).await.unwrap().is_some());
}

#[tokio::test]
async fn deleting_sport_cascades_through_competitions() {
  let s = store().await;
  let sp = sport(&s, "CS2").await;
  let cat = s.create(CompetitionCategory::new("Major")).await.unwrap();
  let c1 = competition(&s, &sp, "IEM").await;
  let c2 = competition(&s, &sp, "BLAST").await;
  for c in [&c1, &c2] {
    s.attach(Link::new(Association::CompetitionCategory, c.competition_id, cat.category_id))
      .await
      .unwrap();
  }
  fixture(&s, &sp, &c1, "ext-1").await;
  fixture(&s, &sp, &c2, "ext-2").await;
  // A match that only references the sport survives with a NULL sport.
  let loose = s
    .create({
      let mut m = Match::new("loose", "ext-3");
      m.sport_id = Some(sp.sport_id);
      m
    })
    .await
    .unwrap();

  let report = s.delete::<Sport>(sp.sport_id).await.unwrap();
  assert_eq!(report.deleted("competition"), 2);
  assert_eq!(report.deleted("match"), 2);
  assert_eq!(report.deleted("competition_in_category"), 2);
  assert_eq!(report.nulled("match", "sport_id"), 1);

  assert!(s.get::<CompetitionCategory>(cat.category_id).await.unwrap().is_some());
  let loose: Match = s.require(loose.match_id).await.unwrap();
  assert_eq!(loose.sport_id, None);
}

// ─── Restrict ────────────────────────────────────────────────────────────────

static LEAGUE: Table = Table {
  name:         "league",
  primary_key:  &["league_id"],
  columns:      &[Column::id("league_id"), Column::text("name")],
  unique:       &[],
  foreign_keys: &[],
};

static CLUB: Table = Table {
  name:         "club",
  primary_key:  &["club_id"],
  columns:      &[Column::id("club_id"), Column::id("league_id")],
  unique:       &[],
  foreign_keys: &[ForeignKey::new("league_id", "league", OnDelete::Restrict)],
};

static RESTRICT_CATALOG: Catalog = Catalog::new(&[&LEAGUE, &CLUB]);

fn row(value: Value) -> serde_json::Map<String, Value> {
  value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn restrict_blocks_delete_while_referenced() {
  let s = SqliteStore::connect(PoolConfig::memory(), &RESTRICT_CATALOG).await.unwrap();
  s.migrate().await.unwrap();

  let league = Uuid::now_v7();
  let club = Uuid::now_v7();
  s.transaction(move |tx| {
    tx.insert_row(&LEAGUE, row(json!({"league_id": league.to_string(), "name": "Serie A"})))?;
    tx.insert_row(&CLUB, row(json!({"club_id": club.to_string(), "league_id": league.to_string()})))?;
    Ok(())
  })
  .await
  .unwrap();

  let err = s.transaction(move |tx| tx.delete_row(&LEAGUE, league)).await.unwrap_err();
  assert!(matches!(
    core(&err),
    CoreError::ForeignKeyViolation { table: "club", column: "league_id", .. }
  ));

  let report = s
    .transaction(move |tx| {
      tx.delete_row(&CLUB, club)?;
      tx.delete_row(&LEAGUE, league)
    })
    .await
    .unwrap();
  assert_eq!(report.deleted("league"), 1);
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_transaction_rolls_back_everything() {
  let s = store().await;
  let err = s
    .transaction(|tx| {
      tx.create(Sport::new("Soccer"))?;
      tx.create(Sport::new("CS2"))?;
      tx.create(Sport::new("Soccer"))
    })
    .await
    .unwrap_err();
  assert!(matches!(core(&err), CoreError::UniqueConstraintViolation { .. }));
  assert!(s.list::<Sport>().await.unwrap().is_empty());

  let names = s
    .transaction(|tx| {
      let sp = tx.create(Sport::new("Soccer"))?;
      tx.create(Competition::new(sp.sport_id, "Premier League"))?;
      Ok(tx.find::<Competition>(&Filter::new())?.len())
    })
    .await
    .unwrap();
  assert_eq!(names, 1);
}

// ─── Used URLs ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn used_url_ledger() {
  let s = store().await;
  let url = "https://hltv.org/news/1".to_owned();
  assert!(!s.is_url_used(url.clone()).await.unwrap());
  s.mark_url_used(url.clone()).await.unwrap();
  assert!(s.is_url_used(url.clone()).await.unwrap());

  let err = s.mark_url_used(url).await.unwrap_err();
  assert!(matches!(core(&err), CoreError::UniqueConstraintViolation { table: "used_url", .. }));
}

// ─── Files, pooling & migrations ─────────────────────────────────────────────

#[tokio::test]
async fn file_store_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("flux.db");

  let s = SqliteStore::open(&path).await.unwrap();
  sport(&s, "Soccer").await;
  drop(s);

  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.plan_migrations().await.unwrap().is_empty());
  let sports = s.list::<Sport>().await.unwrap();
  assert_eq!(sports.len(), 1);
  assert_eq!(sports[0].name, "Soccer");
}

#[tokio::test]
async fn newer_schema_version_is_refused() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("flux.db");
  rusqlite::Connection::open(&path)
    .unwrap()
    .execute_batch("PRAGMA user_version = 42;")
    .unwrap();

  let err = SqliteStore::open(&path).await.err().unwrap();
  assert!(matches!(
    err,
    Error::UnsupportedSchemaVersion { db_version: 42, latest_supported: 1 }
  ));
}

#[tokio::test]
async fn reset_empties_the_store() {
  let s = store().await;
  sport(&s, "Soccer").await;
  let plan = s.reset().await.unwrap();
  assert!(!plan.is_empty());
  assert!(s.list::<Sport>().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_writers_share_a_file_pool() {
  let dir = tempfile::tempdir().unwrap();
  let s = SqliteStore::open_with(PoolConfig::file(dir.path().join("flux.db")).max_connections(4))
    .await
    .unwrap();

  let handles: Vec<_> = (0..8)
    .map(|i| {
      let s = s.clone();
      tokio::spawn(async move { s.create(Sport::new(format!("sport {i}"))).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }
  assert_eq!(s.list::<Sport>().await.unwrap().len(), 8);
  assert_eq!(s.pool().available(), 4);
}

#[tokio::test]
async fn reads_do_not_wait_for_a_writer() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("flux.db");
  let s = SqliteStore::open_with(PoolConfig::file(&path).busy_timeout(Duration::from_millis(100)))
    .await
    .unwrap();
  sport(&s, "Soccer").await;

  let writer = rusqlite::Connection::open(&path).unwrap();
  writer.execute_batch("BEGIN IMMEDIATE;").unwrap();

  assert_eq!(s.list::<Sport>().await.unwrap().len(), 1);
  assert!(!s.is_url_used("https://n/1".into()).await.unwrap());

  let err = s.create(Sport::new("Hockey")).await.unwrap_err();
  assert!(matches!(err, Error::Sqlite(_)), "{err}");

  writer.execute_batch("COMMIT;").unwrap();
  s.create(Sport::new("Hockey")).await.unwrap();
}
