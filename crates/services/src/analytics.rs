use std::collections::HashMap;
use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use meetloop_db::models::{AttendanceRecord, Meeting};

use crate::dao::{AttendanceDao, DaoError, DaoResult, EngagementDao, MeetingDao, UserDao};
use crate::metrics::{
    self, AttendancePoint, DurationBreakdown, EngagementDistribution, JoinTimeBucket, MeetingSpan,
    SessionActivity, TimelineItem,
};
use crate::reconcile::{ParticipantEvent, reconcile};

/// Optional start/end bounds on `start_date`, both inclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingStats {
    pub total_members: u64,
    pub total_meetings: u64,
    pub avg_engagement_rate: f64,
    pub duration_breakdown: DurationBreakdown,
    pub timeline: Vec<TimelineItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityAnalytics {
    pub attendance_rate: f64,
    pub average_viewed_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDuration {
    pub name: String,
    /// Clamped attendance in whole minutes.
    pub duration: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetails {
    pub attendance_rate: f64,
    /// Average attended duration in whole minutes.
    pub avg_duration: i64,
    /// Average attended duration over meeting duration, as a rounded percent.
    pub engagement_score: i64,
    pub attendance_over_time: Vec<AttendancePoint>,
    pub engagement_distribution: EngagementDistribution,
    pub participant_durations: Vec<ParticipantDuration>,
    pub join_time_distribution: Vec<JoinTimeBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub meeting_id: String,
    pub topic: String,
    pub date: DateTime<Utc>,
    pub attendance_rate: f64,
    pub average_viewed_percentage: f64,
    pub attendees: u64,
    pub invited: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub user_id: String,
    pub user_name: String,
    pub engagement_score: f64,
    pub meetings_attended: u32,
}

/// DAO-backed wrapper over the pure metric functions. Every read path is
/// filtered by the owning creator before any numbers are computed.
pub struct AnalyticsService {
    meetings: Arc<MeetingDao>,
    engagements: Arc<EngagementDao>,
    attendance: Arc<AttendanceDao>,
    users: Arc<UserDao>,
}

impl AnalyticsService {
    pub fn new(
        meetings: Arc<MeetingDao>,
        engagements: Arc<EngagementDao>,
        attendance: Arc<AttendanceDao>,
        users: Arc<UserDao>,
    ) -> Self {
        Self {
            meetings,
            engagements,
            attendance,
            users,
        }
    }

    pub async fn meetings_stats(
        &self,
        creator_id: ObjectId,
        range: DateRange,
        now: DateTime<Utc>,
    ) -> DaoResult<MeetingStats> {
        let total_members = self.users.count_members(creator_id).await?;
        let meetings = self.owned_meetings(creator_id, range).await?;
        let meeting_ids = meeting_ids(&meetings);

        let engagements = self.engagements.list_for_meetings(&meeting_ids).await?;
        let avg_engagement_rate = if engagements.is_empty() {
            0.0
        } else {
            let attended = engagements.iter().filter(|e| e.attended).count();
            metrics::round2(attended as f64 / engagements.len() as f64 * 100.0)
        };

        let duration_breakdown = metrics::duration_breakdown(meetings.iter().map(meeting_duration));

        let (range_start, range_end) = timeline_bounds(&range, now);
        let starts: Vec<DateTime<Utc>> = meetings.iter().map(|m| m.start_date.to_chrono()).collect();
        let timeline = metrics::timeline(&starts, range_start, range_end);

        Ok(MeetingStats {
            total_members,
            total_meetings: meetings.len() as u64,
            avg_engagement_rate,
            duration_breakdown,
            timeline,
        })
    }

    /// Attendance rate and average viewed percentage for one meeting. A
    /// meeting without a usable duration reports zeros rather than NaN.
    pub async fn activity_analytics(
        &self,
        creator_id: ObjectId,
        meeting_id: ObjectId,
    ) -> DaoResult<ActivityAnalytics> {
        let meeting = self.owned_meeting(creator_id, meeting_id).await?;
        let invited = self.engagements.count_for_meeting(meeting_id).await?;
        let rows = self.attendance.list_for_meeting(meeting_id).await?;

        let start = meeting.start_date.to_chrono();
        let Some(end) = meeting.effective_end().map(|e| e.to_chrono()) else {
            return Ok(ActivityAnalytics {
                attendance_rate: 0.0,
                average_viewed_percentage: 0.0,
            });
        };

        let reconciled = reconcile(start, end, &session_events(&rows));
        let attended: Vec<Duration> = reconciled.values().map(|a| a.total).collect();
        Ok(ActivityAnalytics {
            attendance_rate: metrics::attendance_rate(reconciled.len(), invited as usize),
            average_viewed_percentage: metrics::average_viewed_percentage(end - start, &attended),
        })
    }

    pub async fn meeting_details(
        &self,
        creator_id: ObjectId,
        meeting_id: ObjectId,
    ) -> DaoResult<MeetingDetails> {
        let meeting = self.owned_meeting(creator_id, meeting_id).await?;
        let invited = self.engagements.count_for_meeting(meeting_id).await?;
        let rows = self.attendance.list_for_meeting(meeting_id).await?;

        let start = meeting.start_date.to_chrono();
        let Some(end) = meeting.effective_end().map(|e| e.to_chrono()) else {
            return Ok(MeetingDetails::default());
        };
        if rows.is_empty() {
            return Ok(MeetingDetails::default());
        }

        let reconciled = reconcile(start, end, &session_events(&rows));
        let attended: Vec<Duration> = reconciled.values().map(|a| a.total).collect();
        let attendee_count = reconciled.len();

        let total_secs: f64 = attended.iter().map(|d| d.num_seconds() as f64).sum();
        let avg_secs = if attendee_count > 0 {
            total_secs / attendee_count as f64
        } else {
            0.0
        };
        let meeting_secs = (end - start).num_seconds() as f64;
        let engagement_score = if meeting_secs > 0.0 {
            (avg_secs / meeting_secs * 100.0).round() as i64
        } else {
            0
        };

        // Display names come from the raw session rows, first occurrence wins.
        let mut names: HashMap<&str, &str> = HashMap::new();
        for row in &rows {
            names
                .entry(row.participant_email.as_str())
                .or_insert(row.display_name.as_str());
        }
        let mut participant_durations: Vec<ParticipantDuration> = reconciled
            .iter()
            .map(|(key, att)| ParticipantDuration {
                name: names.get(key.as_str()).copied().unwrap_or(key.as_str()).to_string(),
                duration: (att.total.num_seconds() as f64 / 60.0).round() as i64,
            })
            .collect();
        participant_durations
            .sort_by(|a, b| b.duration.cmp(&a.duration).then_with(|| a.name.cmp(&b.name)));
        participant_durations.truncate(10);

        let first_joins: Vec<DateTime<Utc>> =
            reconciled.values().map(|a| a.first_join).collect();
        let sessions: Vec<(DateTime<Utc>, Option<DateTime<Utc>>)> = rows
            .iter()
            .map(|r| (r.joined_at.to_chrono(), r.left_at.map(|t| t.to_chrono())))
            .collect();

        Ok(MeetingDetails {
            attendance_rate: metrics::attendance_rate(attendee_count, invited as usize),
            avg_duration: (avg_secs / 60.0).round() as i64,
            engagement_score,
            attendance_over_time: metrics::attendance_over_time(start, end, &sessions),
            engagement_distribution: metrics::engagement_distribution(&attended),
            participant_durations,
            join_time_distribution: metrics::join_time_distribution(&first_joins, start),
        })
    }

    /// Per-meeting engagement points over a range, oldest first.
    pub async fn engagement_trend(
        &self,
        creator_id: ObjectId,
        range: DateRange,
    ) -> DaoResult<Vec<TrendPoint>> {
        let mut meetings = self.owned_meetings(creator_id, range).await?;
        meetings.sort_by_key(|m| m.start_date);
        let ids = meeting_ids(&meetings);

        let engagements = self.engagements.list_for_meetings(&ids).await?;
        let mut invited_by_meeting: HashMap<ObjectId, u64> = HashMap::new();
        for engagement in &engagements {
            *invited_by_meeting.entry(engagement.meeting_id).or_insert(0) += 1;
        }

        let rows = self.attendance.list_for_meetings(&ids).await?;
        let mut rows_by_meeting: HashMap<ObjectId, Vec<&AttendanceRecord>> = HashMap::new();
        for row in &rows {
            rows_by_meeting.entry(row.meeting_id).or_default().push(row);
        }

        let mut points = Vec::with_capacity(meetings.len());
        for meeting in &meetings {
            let Some(id) = meeting.id else { continue };
            let start = meeting.start_date.to_chrono();
            let Some(end) = meeting.effective_end().map(|e| e.to_chrono()) else {
                continue;
            };
            let meeting_rows: Vec<AttendanceRecord> = rows_by_meeting
                .get(&id)
                .map(|rs| rs.iter().map(|r| (*r).clone()).collect())
                .unwrap_or_default();
            let reconciled = reconcile(start, end, &session_events(&meeting_rows));
            let attended: Vec<Duration> = reconciled.values().map(|a| a.total).collect();
            let invited = invited_by_meeting.get(&id).copied().unwrap_or(0);

            points.push(TrendPoint {
                meeting_id: id.to_hex(),
                topic: meeting.topic.clone(),
                date: start,
                attendance_rate: metrics::attendance_rate(reconciled.len(), invited as usize),
                average_viewed_percentage: metrics::average_viewed_percentage(
                    end - start,
                    &attended,
                ),
                attendees: reconciled.len() as u64,
                invited,
            });
        }
        Ok(points)
    }

    /// Top engaged users across the creator's meetings in the range.
    pub async fn engagement_leaderboard(
        &self,
        creator_id: ObjectId,
        range: DateRange,
    ) -> DaoResult<Vec<LeaderboardRow>> {
        let meetings = self.owned_meetings(creator_id, range).await?;
        let ids = meeting_ids(&meetings);

        let spans: Vec<MeetingSpan> = meetings
            .iter()
            .filter_map(|m| {
                let id = m.id?;
                let end = m.effective_end()?;
                Some(MeetingSpan {
                    id: id.to_hex(),
                    start: m.start_date.to_chrono(),
                    end: end.to_chrono(),
                })
            })
            .collect();

        let rows = self.attendance.list_for_meetings(&ids).await?;
        // Leaderboard identity is the resolved user; guest sessions without a
        // user record do not rank.
        let activities: Vec<SessionActivity> = rows
            .iter()
            .filter_map(|r| {
                r.user_id.map(|user_id| SessionActivity {
                    user_key: user_id.to_hex(),
                    meeting_id: r.meeting_id.to_hex(),
                    join: r.joined_at.to_chrono(),
                    leave: r.left_at.map(|t| t.to_chrono()),
                })
            })
            .collect();

        let entries = metrics::leaderboard(&spans, &activities, 5);

        let user_ids: Vec<ObjectId> = entries
            .iter()
            .filter_map(|e| ObjectId::parse_str(&e.user_key).ok())
            .collect();
        let users = self.users.find_by_ids(&user_ids).await?;
        let names: HashMap<String, String> = users
            .into_iter()
            .filter_map(|u| u.id.map(|id| (id.to_hex(), u.name)))
            .collect();

        Ok(entries
            .into_iter()
            .map(|e| LeaderboardRow {
                user_name: names.get(&e.user_key).cloned().unwrap_or_else(|| e.user_key.clone()),
                user_id: e.user_key,
                engagement_score: e.engagement_score,
                meetings_attended: e.meetings_attended,
            })
            .collect())
    }

    async fn owned_meetings(
        &self,
        creator_id: ObjectId,
        range: DateRange,
    ) -> DaoResult<Vec<Meeting>> {
        self.meetings
            .list_for_creator(
                creator_id,
                range.start.map(bson::DateTime::from_chrono),
                range.end.map(bson::DateTime::from_chrono),
            )
            .await
    }

    async fn owned_meeting(&self, creator_id: ObjectId, meeting_id: ObjectId) -> DaoResult<Meeting> {
        let meeting = self.meetings.base.find_by_id(meeting_id).await?;
        if meeting.creator_id != creator_id {
            return Err(DaoError::Forbidden(
                "meeting belongs to another creator".into(),
            ));
        }
        Ok(meeting)
    }
}

fn meeting_ids(meetings: &[Meeting]) -> Vec<ObjectId> {
    meetings.iter().filter_map(|m| m.id).collect()
}

/// Wall-clock duration from scheduled start to actual-else-scheduled end.
/// `None` when the meeting has no end at all.
fn meeting_duration(meeting: &Meeting) -> Option<Duration> {
    let end = meeting.effective_end()?;
    Some(end.to_chrono() - meeting.start_date.to_chrono())
}

fn session_events(rows: &[AttendanceRecord]) -> Vec<ParticipantEvent> {
    rows.iter()
        .map(|r| ParticipantEvent {
            key: r.participant_email.clone(),
            join: r.joined_at.to_chrono(),
            leave: r.left_at.map(|t| t.to_chrono()),
        })
        .collect()
}

/// Timeline bounds for the stats response. Each bound falls back to the
/// default window independently, so a single-sided query still narrows
/// that side.
fn timeline_bounds(range: &DateRange, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let (default_start, default_end) = metrics::default_timeline_range(now);
    (
        range.start.map(|s| s.date_naive()).unwrap_or(default_start),
        range.end.map(|e| e.date_naive()).unwrap_or(default_end),
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    #[test]
    fn timeline_bounds_honor_each_side_independently() {
        let now = day(2025, 3, 20);
        let (default_start, default_end) = metrics::default_timeline_range(now);

        let only_start = DateRange {
            start: Some(day(2025, 3, 1)),
            end: None,
        };
        assert_eq!(
            timeline_bounds(&only_start, now),
            (day(2025, 3, 1).date_naive(), default_end)
        );

        let only_end = DateRange {
            start: None,
            end: Some(day(2025, 3, 10)),
        };
        assert_eq!(
            timeline_bounds(&only_end, now),
            (default_start, day(2025, 3, 10).date_naive())
        );
    }

    #[test]
    fn timeline_bounds_default_when_unbounded() {
        let now = day(2025, 3, 20);
        assert_eq!(
            timeline_bounds(&DateRange::default(), now),
            metrics::default_timeline_range(now)
        );
    }

    #[test]
    fn timeline_bounds_use_both_sides_when_given() {
        let now = day(2025, 3, 20);
        let range = DateRange {
            start: Some(day(2025, 2, 1)),
            end: Some(day(2025, 2, 28)),
        };
        assert_eq!(
            timeline_bounds(&range, now),
            (day(2025, 2, 1).date_naive(), day(2025, 2, 28).date_naive())
        );
    }
}
