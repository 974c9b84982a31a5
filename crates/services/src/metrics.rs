use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Round to two decimals, the precision every rate/percentage ships with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distinct attendees over total invited, as a percentage in [0, 100].
/// Zero invitees means a rate of 0, never a division by zero.
pub fn attendance_rate(attendee_count: usize, invited_count: usize) -> f64 {
    if invited_count == 0 {
        return 0.0;
    }
    round2((attendee_count as f64 / invited_count as f64 * 100.0).min(100.0))
}

/// Mean of `min(1, attended / meeting_duration)` across attendees, as a
/// percentage. A non-positive meeting duration yields 0 rather than NaN.
pub fn average_viewed_percentage(meeting_duration: Duration, attended: &[Duration]) -> f64 {
    if meeting_duration <= Duration::zero() || attended.is_empty() {
        return 0.0;
    }
    let total_ms = meeting_duration.num_milliseconds() as f64;
    let viewed_sum: f64 = attended
        .iter()
        .map(|d| (d.num_milliseconds() as f64 / total_ms).min(1.0))
        .sum();
    round2(viewed_sum / attended.len() as f64 * 100.0)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DurationBreakdown {
    #[serde(rename = "0-15")]
    pub b0_15: u32,
    #[serde(rename = "15-30")]
    pub b15_30: u32,
    #[serde(rename = "30-45")]
    pub b30_45: u32,
    #[serde(rename = "45-60")]
    pub b45_60: u32,
    #[serde(rename = "60+")]
    pub b60_plus: u32,
}

/// Bucket wall-clock meeting durations. `None` means the meeting has neither
/// an actual nor a scheduled end: it is excluded, not counted as 0-15.
pub fn duration_breakdown<I>(durations: I) -> DurationBreakdown
where
    I: IntoIterator<Item = Option<Duration>>,
{
    let mut breakdown = DurationBreakdown::default();
    for duration in durations.into_iter().flatten() {
        let minutes = duration.num_milliseconds() as f64 / 60_000.0;
        if minutes <= 15.0 {
            breakdown.b0_15 += 1;
        } else if minutes <= 30.0 {
            breakdown.b15_30 += 1;
        } else if minutes <= 45.0 {
            breakdown.b30_45 += 1;
        } else if minutes <= 60.0 {
            breakdown.b45_60 += 1;
        } else {
            breakdown.b60_plus += 1;
        }
    }
    breakdown
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineItem {
    pub date: NaiveDate,
    pub count: u32,
}

/// Default analytics window: 14 days back through 1 day ahead, inclusive.
pub fn default_timeline_range(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let today = now.date_naive();
    (today - Duration::days(14), today + Duration::days(1))
}

/// One bucket per calendar day in `[range_start, range_end]`, dense: days
/// with no meetings are emitted with a count of 0.
pub fn timeline(
    meeting_starts: &[DateTime<Utc>],
    range_start: NaiveDate,
    range_end: NaiveDate,
) -> Vec<TimelineItem> {
    let mut counts: HashMap<NaiveDate, u32> = HashMap::new();
    for start in meeting_starts {
        *counts.entry(start.date_naive()).or_insert(0) += 1;
    }

    let mut items = Vec::new();
    let mut date = range_start;
    while date <= range_end {
        items.push(TimelineItem {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
        });
        date += Duration::days(1);
    }
    items
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngagementDistribution {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

/// Partition attendees by attended duration relative to this meeting's
/// average attended duration: High >= 90%, Medium >= 60%, the rest Low.
/// Thresholds are meeting-relative, recomputed per meeting.
pub fn engagement_distribution(attended: &[Duration]) -> EngagementDistribution {
    let mut distribution = EngagementDistribution::default();
    if attended.is_empty() {
        return distribution;
    }

    let total_ms: i64 = attended.iter().map(|d| d.num_milliseconds()).sum();
    let avg_ms = total_ms as f64 / attended.len() as f64;

    for duration in attended {
        let ms = duration.num_milliseconds() as f64;
        if ms >= avg_ms * 0.9 {
            distribution.high += 1;
        } else if ms >= avg_ms * 0.6 {
            distribution.medium += 1;
        } else {
            distribution.low += 1;
        }
    }
    distribution
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinTimeBucket {
    /// Offset from meeting start in minutes, floor of a 5-minute bucket.
    pub offset_minutes: i64,
    pub count: u32,
}

/// Bucket first-join offsets from meeting start into 5-minute buckets,
/// sorted by offset ascending. Joins before the start count as offset 0.
pub fn join_time_distribution(
    first_joins: &[DateTime<Utc>],
    meeting_start: DateTime<Utc>,
) -> Vec<JoinTimeBucket> {
    let mut buckets: HashMap<i64, u32> = HashMap::new();
    for join in first_joins {
        let offset_ms = (*join - meeting_start).num_milliseconds().max(0);
        let bucket = offset_ms / (5 * 60_000) * 5;
        *buckets.entry(bucket).or_insert(0) += 1;
    }

    let mut out: Vec<JoinTimeBucket> = buckets
        .into_iter()
        .map(|(offset_minutes, count)| JoinTimeBucket {
            offset_minutes,
            count,
        })
        .collect();
    out.sort_by_key(|b| b.offset_minutes);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendancePoint {
    /// Offset from meeting start, e.g. "15m".
    pub time: String,
    pub count: u32,
}

/// Concurrent-attendee curve sampled every 5 minutes across the meeting,
/// computed over the raw (unclamped) join/leave pairs. A missing leave is
/// read as present until the end.
pub fn attendance_over_time(
    meeting_start: DateTime<Utc>,
    meeting_end: DateTime<Utc>,
    sessions: &[(DateTime<Utc>, Option<DateTime<Utc>>)],
) -> Vec<AttendancePoint> {
    let mut points = Vec::new();
    if meeting_end < meeting_start {
        return points;
    }

    let step = Duration::minutes(5);
    let mut t = meeting_start;
    while t <= meeting_end {
        let count = sessions
            .iter()
            .filter(|(join, leave)| *join <= t && leave.unwrap_or(meeting_end) >= t)
            .count() as u32;
        let offset = (t - meeting_start).num_minutes();
        points.push(AttendancePoint {
            time: format!("{offset}m"),
            count,
        });
        t += step;
    }
    points
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub user_key: String,
    pub engagement_score: f64,
    pub meetings_attended: u32,
}

#[derive(Debug, Clone)]
pub struct MeetingSpan {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionActivity {
    pub user_key: String,
    pub meeting_id: String,
    pub join: DateTime<Utc>,
    pub leave: Option<DateTime<Utc>>,
}

/// Cross-meeting engagement leaderboard:
/// `0.5 * (avg attended duration per meeting / avg attended-meeting duration)
///  + 0.5 * (meetings attended / total meetings)`, as a 2-decimal score x100.
/// Ranked descending; ties keep first-seen order (stable sort); top `limit`.
pub fn leaderboard(
    meetings: &[MeetingSpan],
    activities: &[SessionActivity],
    limit: usize,
) -> Vec<LeaderboardEntry> {
    if meetings.is_empty() {
        return Vec::new();
    }
    let total_meetings = meetings.len() as f64;

    let spans: HashMap<&str, &MeetingSpan> =
        meetings.iter().map(|m| (m.id.as_str(), m)).collect();

    struct UserMetrics {
        total_attended: Duration,
        attended_meetings: Vec<String>,
        total_meeting_duration: Duration,
    }

    // Insertion order matters for the tie-break, so keep keys in first-seen
    // order next to the metrics map.
    let mut order: Vec<String> = Vec::new();
    let mut metrics: HashMap<String, UserMetrics> = HashMap::new();

    for activity in activities {
        let Some(span) = spans.get(activity.meeting_id.as_str()) else {
            continue;
        };

        let join = activity.join.max(span.start);
        let leave = activity.leave.unwrap_or(span.end).min(span.end);
        if leave <= join {
            continue;
        }

        let entry = metrics
            .entry(activity.user_key.clone())
            .or_insert_with(|| {
                order.push(activity.user_key.clone());
                UserMetrics {
                    total_attended: Duration::zero(),
                    attended_meetings: Vec::new(),
                    total_meeting_duration: Duration::zero(),
                }
            });

        entry.total_attended += leave - join;
        if !entry.attended_meetings.contains(&activity.meeting_id) {
            entry.attended_meetings.push(activity.meeting_id.clone());
            entry.total_meeting_duration += span.end - span.start;
        }
    }

    let mut entries: Vec<LeaderboardEntry> = order
        .into_iter()
        .filter_map(|user_key| {
            let m = metrics.get(&user_key)?;
            let attended_count = m.attended_meetings.len() as f64;
            let avg_attended = m.total_attended.num_milliseconds() as f64 / attended_count;
            let avg_meeting = m.total_meeting_duration.num_milliseconds() as f64 / attended_count;

            let duration_score = if avg_meeting > 0.0 {
                avg_attended / avg_meeting
            } else {
                0.0
            };
            let attendance_score = attended_count / total_meetings;
            let score = duration_score * 0.5 + attendance_score * 0.5;

            Some(LeaderboardEntry {
                user_key,
                engagement_score: round2(score * 100.0),
                meetings_attended: m.attended_meetings.len() as u32,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.engagement_score.total_cmp(&a.engagement_score));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 8, h, m, 0).unwrap()
    }

    #[test]
    fn attendance_rate_bounds() {
        assert_eq!(attendance_rate(0, 0), 0.0);
        assert_eq!(attendance_rate(5, 0), 0.0);
        assert_eq!(attendance_rate(1, 2), 50.0);
        assert_eq!(attendance_rate(2, 2), 100.0);
        // External walk-ins can outnumber invitees; the rate stays capped.
        assert_eq!(attendance_rate(3, 2), 100.0);
        assert_eq!(attendance_rate(1, 3), 33.33);
    }

    #[test]
    fn viewed_percentage_scenario() {
        // 60-minute meeting, one attendee for 45 minutes -> 75.00.
        let pct = average_viewed_percentage(Duration::minutes(60), &[Duration::minutes(45)]);
        assert_eq!(pct, 75.0);
    }

    #[test]
    fn viewed_percentage_caps_at_100_per_attendee() {
        // Multi-device sums can exceed the meeting length; each attendee
        // still contributes at most 1.
        let pct = average_viewed_percentage(
            Duration::minutes(60),
            &[Duration::minutes(90), Duration::minutes(30)],
        );
        assert_eq!(pct, 75.0);
    }

    #[test]
    fn viewed_percentage_guards_zero_duration() {
        assert_eq!(
            average_viewed_percentage(Duration::zero(), &[Duration::minutes(10)]),
            0.0
        );
        assert_eq!(
            average_viewed_percentage(Duration::minutes(-5), &[Duration::minutes(10)]),
            0.0
        );
        assert_eq!(average_viewed_percentage(Duration::minutes(60), &[]), 0.0);
    }

    #[test]
    fn duration_buckets_with_exclusions() {
        let breakdown = duration_breakdown(vec![
            Some(Duration::minutes(10)),
            Some(Duration::minutes(15)), // boundary goes to 0-15
            Some(Duration::minutes(29)),
            Some(Duration::minutes(44)),
            Some(Duration::minutes(60)),
            Some(Duration::minutes(61)),
            None, // no end date at all: excluded
        ]);
        assert_eq!(
            breakdown,
            DurationBreakdown {
                b0_15: 2,
                b15_30: 1,
                b30_45: 1,
                b45_60: 1,
                b60_plus: 1,
            }
        );
    }

    #[test]
    fn timeline_is_dense_over_the_range() {
        let starts = vec![at(10, 0), at(14, 0)];
        let range_start = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        let range_end = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();

        let items = timeline(&starts, range_start, range_end);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].count, 0);
        assert_eq!(items[2].count, 2); // both meetings on the 8th
        assert_eq!(items[4].count, 0);
    }

    #[test]
    fn timeline_length_matches_range_even_when_empty() {
        let (start, end) = default_timeline_range(at(12, 0));
        let items = timeline(&[], start, end);
        // 14 days back + today + 1 day ahead = 16 buckets.
        assert_eq!(items.len(), 16);
        assert!(items.iter().all(|i| i.count == 0));
    }

    #[test]
    fn engagement_distribution_is_meeting_relative() {
        // Average is 40 minutes: high >= 36, medium >= 24.
        let dist = engagement_distribution(&[
            Duration::minutes(60),
            Duration::minutes(40),
            Duration::minutes(30),
            Duration::minutes(10),
        ]);
        assert_eq!(
            dist,
            EngagementDistribution {
                high: 2,
                medium: 1,
                low: 1,
            }
        );
    }

    #[test]
    fn engagement_distribution_empty() {
        assert_eq!(engagement_distribution(&[]), EngagementDistribution::default());
    }

    #[test]
    fn join_time_buckets_sorted_ascending() {
        let joins = vec![at(10, 2), at(10, 3), at(10, 12), at(9, 55)];
        let buckets = join_time_distribution(&joins, at(10, 0));
        assert_eq!(
            buckets,
            vec![
                JoinTimeBucket {
                    offset_minutes: 0,
                    count: 3 // two on-time joins plus the early one clamped to 0
                },
                JoinTimeBucket {
                    offset_minutes: 10,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn attendance_over_time_counts_concurrent_sessions() {
        let points = attendance_over_time(
            at(10, 0),
            at(10, 15),
            &[
                (at(10, 0), Some(at(10, 10))),
                (at(10, 5), None), // stays until the end
            ],
        );
        assert_eq!(points.len(), 4); // 0m, 5m, 10m, 15m
        assert_eq!(points[0], AttendancePoint { time: "0m".into(), count: 1 });
        assert_eq!(points[1].count, 2);
        assert_eq!(points[2].count, 2);
        assert_eq!(points[3].count, 1);
    }

    #[test]
    fn leaderboard_scores_and_ranks() {
        let meetings = vec![
            MeetingSpan {
                id: "m1".into(),
                start: at(10, 0),
                end: at(11, 0),
            },
            MeetingSpan {
                id: "m2".into(),
                start: at(14, 0),
                end: at(15, 0),
            },
        ];
        let activities = vec![
            // Ada: full hour in both meetings.
            SessionActivity {
                user_key: "ada".into(),
                meeting_id: "m1".into(),
                join: at(10, 0),
                leave: Some(at(11, 0)),
            },
            SessionActivity {
                user_key: "ada".into(),
                meeting_id: "m2".into(),
                join: at(14, 0),
                leave: Some(at(15, 0)),
            },
            // Bob: half of one meeting.
            SessionActivity {
                user_key: "bob".into(),
                meeting_id: "m1".into(),
                join: at(10, 0),
                leave: Some(at(10, 30)),
            },
        ];

        let entries = leaderboard(&meetings, &activities, 5);
        assert_eq!(entries.len(), 2);

        // Ada: duration score 1.0, attendance 2/2 -> 100.00
        assert_eq!(entries[0].user_key, "ada");
        assert_eq!(entries[0].engagement_score, 100.0);
        assert_eq!(entries[0].meetings_attended, 2);

        // Bob: duration 0.5, attendance 0.5 -> 50.00
        assert_eq!(entries[1].user_key, "bob");
        assert_eq!(entries[1].engagement_score, 50.0);
    }

    #[test]
    fn leaderboard_truncates_and_keeps_insertion_order_on_ties() {
        let meetings = vec![MeetingSpan {
            id: "m1".into(),
            start: at(10, 0),
            end: at(11, 0),
        }];
        let mk = |user: &str| SessionActivity {
            user_key: user.into(),
            meeting_id: "m1".into(),
            join: at(10, 0),
            leave: Some(at(11, 0)),
        };
        let activities = vec![mk("a"), mk("b"), mk("c")];

        let entries = leaderboard(&meetings, &activities, 2);
        assert_eq!(entries.len(), 2);
        // All scores tie; first-seen order wins.
        assert_eq!(entries[0].user_key, "a");
        assert_eq!(entries[1].user_key, "b");
    }

    #[test]
    fn leaderboard_empty_inputs() {
        assert!(leaderboard(&[], &[], 5).is_empty());
        let meetings = vec![MeetingSpan {
            id: "m1".into(),
            start: at(10, 0),
            end: at(11, 0),
        }];
        assert!(leaderboard(&meetings, &[], 5).is_empty());
    }
}
