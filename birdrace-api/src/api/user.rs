//! Authenticated user profile and observation endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use birdrace_common::db::{Observation, PrivacyLevel, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::db::{observations, stats, summary, users};
use crate::{ApiError, ApiResult, AppState};

const MAX_NAME_LEN: usize = 100;
const DEFAULT_OBSERVATION_LIMIT: i64 = 100;
const MAX_OBSERVATION_LIMIT: i64 = 1000;

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub species_count: i64,
    pub total_observations: i64,
    pub states_visited: i64,
    pub last_upload: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub stats: UserStats,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub privacy_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ObservationQuery {
    pub year: Option<i32>,
    pub state: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ObservationListResponse {
    pub observations: Vec<Observation>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct StateStats {
    pub state: String,
    pub species_count: i64,
    pub counties: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GeographicStatsResponse {
    pub states_visited: Vec<StateStats>,
}

async fn build_profile(state: &AppState, user: User) -> ApiResult<ProfileResponse> {
    let year = state.config.target_year;

    let summary_row = summary::load_user_summary(&state.db, year, user.id).await?;
    let total_observations = observations::count_observations(&state.db, user.id, year).await?;
    let states_visited = observations::count_states_visited(&state.db, user.id, year).await?;

    let (species_count, last_upload) = summary_row
        .map(|row| (row.species_count, row.last_upload_date))
        .unwrap_or((0, None));

    Ok(ProfileResponse {
        user,
        stats: UserStats {
            species_count,
            total_observations,
            states_visited,
            last_upload,
        },
    })
}

/// GET /user/me
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<ProfileResponse>> {
    Ok(Json(build_profile(&state, user).await?))
}

/// PATCH /user/me
///
/// Updates display name and/or privacy level, then refreshes the
/// leaderboard snapshot so the change shows immediately.
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<ProfileResponse>> {
    let name = match update.name.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::BadRequest("Name cannot be empty".to_string())),
        Some(name) if name.chars().count() > MAX_NAME_LEN => {
            return Err(ApiError::BadRequest(format!(
                "Name cannot exceed {} characters",
                MAX_NAME_LEN
            )))
        }
        other => other,
    };

    let privacy_level = update
        .privacy_level
        .as_deref()
        .map(str::parse::<PrivacyLevel>)
        .transpose()?;

    let updated = users::update_profile(&state.db, user.id, name, privacy_level)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    info!("Updated profile for user {}", updated.id);

    if let Err(e) = summary::refresh_species_summary(&state.db, state.config.target_year).await {
        error!("Failed to refresh species summary after profile update: {}", e);
    }

    Ok(Json(build_profile(&state, updated).await?))
}

/// GET /user/me/observations?year=&state=&limit=&offset=
pub async fn list_observations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ObservationQuery>,
) -> ApiResult<Json<ObservationListResponse>> {
    let year = query.year.unwrap_or(state.config.target_year);
    let limit = query.limit.unwrap_or(DEFAULT_OBSERVATION_LIMIT);
    let offset = query.offset.unwrap_or(0);

    if !(1..=MAX_OBSERVATION_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_OBSERVATION_LIMIT
        )));
    }
    if offset < 0 {
        return Err(ApiError::BadRequest("offset cannot be negative".to_string()));
    }

    let state_filter = query.state.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let (observations, total) =
        observations::list_observations(&state.db, user.id, year, state_filter, limit, offset)
            .await?;

    Ok(Json(ObservationListResponse {
        observations,
        total,
    }))
}

/// GET /user/me/geographic-stats
///
/// States visited in the competition year with their counties.
pub async fn geographic_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<GeographicStatsResponse>> {
    let regions = stats::load_geographic_stats(&state.db, user.id).await?;
    let state_counts =
        observations::species_count_by_state(&state.db, user.id, state.config.target_year).await?;

    let mut counties: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for region in regions {
        let entry = counties.entry(region.state_province).or_default();
        if !region.county.is_empty() {
            entry.push(region.county);
        }
    }

    let states_visited = state_counts
        .into_iter()
        .map(|(state_name, species_count)| StateStats {
            counties: counties.remove(&state_name).unwrap_or_default(),
            state: state_name,
            species_count,
        })
        .collect();

    Ok(Json(GeographicStatsResponse { states_visited }))
}

/// Build user routes
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/me", get(get_profile).patch(update_profile))
        .route("/user/me/observations", get(list_observations))
        .route("/user/me/geographic-stats", get(geographic_stats))
}
