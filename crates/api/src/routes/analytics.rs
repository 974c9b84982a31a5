use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use tracing::warn;

use meetloop_services::analytics::{
    ActivityAnalytics, LeaderboardRow, MeetingDetails, MeetingStats, TrendPoint,
};
use meetloop_services::insights::AiInsights;

use crate::{
    error::ApiError,
    extractors::auth::AuthUser,
    routes::meeting::{RangeQuery, parse_oid},
    state::AppState,
};

// ---- GET /api/analytics/stats --------------------------------------------

pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<MeetingStats>, ApiError> {
    let stats = state
        .analytics
        .meetings_stats(auth.user_id, query.into(), chrono::Utc::now())
        .await?;
    Ok(Json(stats))
}

// ---- GET /api/analytics/insights -----------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    #[serde(flatten)]
    pub insights: AiInsights,
    pub available: bool,
}

pub async fn insights(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<InsightsResponse>, ApiError> {
    if !state.insights.is_available() {
        return Ok(Json(InsightsResponse {
            insights: AiInsights::default(),
            available: false,
        }));
    }

    let stats = state
        .analytics
        .meetings_stats(auth.user_id, query.into(), chrono::Utc::now())
        .await?;
    let insights = match state.insights.generate(&stats).await {
        Ok(insights) => insights,
        Err(e) => {
            warn!(error = %e, "Insights generation failed");
            AiInsights::default()
        }
    };
    Ok(Json(InsightsResponse {
        insights,
        available: true,
    }))
}

// ---- GET /api/analytics/leaderboard --------------------------------------

pub async fn leaderboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<LeaderboardRow>>, ApiError> {
    let rows = state
        .analytics
        .engagement_leaderboard(auth.user_id, query.into())
        .await?;
    Ok(Json(rows))
}

// ---- GET /api/analytics/trend --------------------------------------------

pub async fn trend(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<TrendPoint>>, ApiError> {
    let points = state
        .analytics
        .engagement_trend(auth.user_id, query.into())
        .await?;
    Ok(Json(points))
}

// ---- GET /api/analytics/meeting/{meeting_id}/activity --------------------

pub async fn activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<ActivityAnalytics>, ApiError> {
    let meeting_id = parse_oid(&meeting_id)?;
    let analytics = state
        .analytics
        .activity_analytics(auth.user_id, meeting_id)
        .await?;
    Ok(Json(analytics))
}

// ---- GET /api/analytics/meeting/{meeting_id}/details ---------------------

pub async fn details(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingDetails>, ApiError> {
    let meeting_id = parse_oid(&meeting_id)?;
    let details = state
        .analytics
        .meeting_details(auth.user_id, meeting_id)
        .await?;
    Ok(Json(details))
}
