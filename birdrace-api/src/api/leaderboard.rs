//! Public leaderboard endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use birdrace_common::db::{PrivacyLevel, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{observations, stats, summary, users};
use crate::leaderboard::{
    self, LeaderboardEntry, MonthlyProgress, PublicSpeciesList, SpeciesSort, DEFAULT_LIMIT,
    MAX_LIMIT,
};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub year: Option<i32>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub year: i32,
    pub participants: i64,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub user_id: Uuid,
    pub user_name: String,
    pub monthly_progress: Vec<MonthlyProgress>,
}

#[derive(Debug, Deserialize)]
pub struct SpeciesQuery {
    pub year: Option<i32>,
    pub sort: Option<String>,
}

/// GET /leaderboard?year=&limit=
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<LeaderboardResponse>> {
    let year = query.year.unwrap_or(state.config.target_year);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let rows = summary::load_summary(&state.db, year).await?;
    let board = leaderboard::rank(rows, limit as usize);

    Ok(Json(LeaderboardResponse {
        year,
        participants: board.participants,
        leaderboard: board.entries,
    }))
}

/// Load a user visible to the public
///
/// Malformed ids, unknown users and private users all produce the same 404.
async fn load_public_user(state: &AppState, user_id: &str) -> ApiResult<User> {
    let not_found = || ApiError::NotFound("User not found".to_string());

    let id = Uuid::parse_str(user_id).map_err(|_| not_found())?;
    let user = users::get_user(&state.db, id).await?.ok_or_else(not_found)?;

    if user.privacy_level == PrivacyLevel::Private {
        return Err(not_found());
    }

    Ok(user)
}

/// GET /leaderboard/:user_id/progress?year=
pub async fn get_user_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<YearQuery>,
) -> ApiResult<Json<ProgressResponse>> {
    let user = load_public_user(&state, &user_id).await?;
    let year = query.year.unwrap_or(state.config.target_year);

    let monthly = stats::load_monthly_stats(&state.db, user.id, year).await?;

    Ok(Json(ProgressResponse {
        user_id: user.id,
        user_name: user.name,
        monthly_progress: leaderboard::monthly_progress(&monthly),
    }))
}

/// GET /leaderboard/:user_id/species?year=&sort=
///
/// `counts_only` participants show species and dates without locations.
pub async fn get_user_species(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<SpeciesQuery>,
) -> ApiResult<Json<PublicSpeciesList>> {
    let sort = match query.sort.as_deref() {
        None => SpeciesSort::default(),
        Some(value) => value.parse().map_err(ApiError::BadRequest)?,
    };

    let user = load_public_user(&state, &user_id).await?;
    let year = query.year.unwrap_or(state.config.target_year);

    let sightings = observations::load_countable_sightings(&state.db, user.id, year).await?;

    leaderboard::public_species_list(user.id, &user.name, user.privacy_level, &sightings, sort)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Build leaderboard routes
pub fn leaderboard_routes() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/leaderboard/:user_id/progress", get(get_user_progress))
        .route("/leaderboard/:user_id/species", get(get_user_species))
}
