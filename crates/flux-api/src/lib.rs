//! JSON REST API for Flux.
//!
//! Exposes an axum [`Router`] backed by any [`flux_core::store::SportsStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", flux_api::api_router(store.clone()))
//! ```

pub mod entities;
pub mod error;
pub mod links;
pub mod urls;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch},
};
use flux_core::{
  fixture::{Match, MatchAiStatement, MatchStatus, Substitution},
  news::{FormattedNews, RawNews},
  sport::{Competition, CompetitionCategory, Sport},
  store::SportsStore,
  team::{Coach, Team, TeamMember},
};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: SportsStore + 'static,
{
  let router = Router::new();
  // Entities
  let router = entities::routes::<S, Sport>(router, "sports");
  let router = entities::routes::<S, Competition>(router, "competitions");
  let router = entities::routes::<S, CompetitionCategory>(router, "categories");
  let router = entities::routes::<S, Team>(router, "teams");
  let router = entities::routes::<S, TeamMember>(router, "members");
  let router = entities::routes::<S, Coach>(router, "coaches");
  let router = entities::routes::<S, MatchStatus>(router, "statuses");
  let router = entities::routes::<S, Match>(router, "matches");
  let router = entities::routes::<S, Substitution>(router, "substitutions");
  let router = entities::routes::<S, MatchAiStatement>(router, "statements");
  let router = entities::routes::<S, RawNews>(router, "raw-news");
  let router = entities::routes::<S, FormattedNews>(router, "formatted-news");

  router
    // Associations
    .route("/links/{association}", get(links::list::<S>).post(links::create::<S>))
    .route(
      "/links/{association}/{left}/{right}",
      patch(links::update::<S>).delete(links::remove::<S>),
    )
    // Used URLs
    .route("/used-urls", get(urls::check::<S>).post(urls::mark::<S>))
    .with_state(store)
}
