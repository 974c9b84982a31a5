use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meetloop_db::models::Meeting;
use meetloop_services::analytics::DateRange;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<RangeQuery> for DateRange {
    fn from(q: RangeQuery) -> Self {
        DateRange {
            start: q.start_date,
            end: q.end_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingItem {
    pub id: String,
    pub provider_meeting_id: String,
    pub topic: String,
    pub join_url: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub attendee_count: u64,
    pub recording_link: Option<String>,
    pub finalized: bool,
}

// ---- GET /api/meeting ----------------------------------------------------

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<MeetingItem>>, ApiError> {
    let range: DateRange = query.into();
    let meetings = state
        .meetings
        .list_for_creator(
            auth.user_id,
            range.start.map(bson::DateTime::from_chrono),
            range.end.map(bson::DateTime::from_chrono),
        )
        .await?;

    let ids: Vec<ObjectId> = meetings.iter().filter_map(|m| m.id).collect();
    let rows = state.attendance.list_for_meetings(&ids).await?;

    // Distinct participants per meeting, not raw session count.
    let mut attendees: HashMap<ObjectId, HashSet<&str>> = HashMap::new();
    for row in &rows {
        attendees
            .entry(row.meeting_id)
            .or_default()
            .insert(row.participant_email.as_str());
    }

    let items = meetings
        .iter()
        .filter_map(|m| {
            let id = m.id?;
            Some(to_item(
                m,
                id,
                attendees.get(&id).map(|s| s.len() as u64).unwrap_or(0),
            ))
        })
        .collect();
    Ok(Json(items))
}

// ---- GET /api/meeting/{meeting_id} ---------------------------------------

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingItem>, ApiError> {
    let meeting_id = parse_oid(&meeting_id)?;
    let meeting = state.meetings.base.find_by_id(meeting_id).await?;
    if meeting.creator_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "You are not authorized to view this meeting".to_string(),
        ));
    }

    let rows = state.attendance.list_for_meeting(meeting_id).await?;
    let distinct: HashSet<&str> = rows.iter().map(|r| r.participant_email.as_str()).collect();

    Ok(Json(to_item(&meeting, meeting_id, distinct.len() as u64)))
}

fn to_item(meeting: &Meeting, id: ObjectId, attendee_count: u64) -> MeetingItem {
    let start = meeting.start_date.to_chrono();
    let end = meeting.effective_end().map(|e| e.to_chrono());
    MeetingItem {
        id: id.to_hex(),
        provider_meeting_id: meeting.provider_meeting_id.clone(),
        topic: meeting.topic.clone(),
        join_url: meeting.join_url.clone(),
        start_date: start,
        end_date: end,
        duration_minutes: end.map(|e| (e - start).num_minutes()),
        attendee_count,
        recording_link: meeting.recording_link.clone(),
        finalized: meeting.notified_at.is_some(),
    }
}

pub fn parse_oid(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid id: {raw}")))
}
