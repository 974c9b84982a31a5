use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// One raw join/leave signal for a participant identity. `leave` is `None`
/// when the participant never produced a leave event (meeting end is assumed).
#[derive(Debug, Clone)]
pub struct ParticipantEvent {
    /// Participant identity (email for external identities, user id otherwise).
    pub key: String,
    pub join: DateTime<Utc>,
    pub leave: Option<DateTime<Utc>>,
}

/// A clamped, surviving attendance interval, `[join, leave)` with
/// `leave > join` guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub join: DateTime<Utc>,
    pub leave: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserAttendance {
    /// Sum of all surviving intervals. Concurrent intervals (multi-device
    /// joins) are summed, not merged into a minimal cover; that is the
    /// defined semantics, not an oversight.
    pub total: Duration,
    pub intervals: Vec<Interval>,
    /// Earliest raw join time, before clamping.
    pub first_join: DateTime<Utc>,
}

/// Merge raw join/leave events into per-identity attendance, clamped to the
/// meeting bounds. Events entirely outside the bounds, and zero- or
/// negative-duration intervals after clamping, contribute nothing.
///
/// A zero-length (or inverted) meeting yields an empty map; callers never
/// divide by the meeting duration without checking it first.
pub fn reconcile(
    meeting_start: DateTime<Utc>,
    meeting_end: DateTime<Utc>,
    events: &[ParticipantEvent],
) -> HashMap<String, UserAttendance> {
    let mut out: HashMap<String, UserAttendance> = HashMap::new();

    if meeting_end <= meeting_start {
        return out;
    }

    for event in events {
        let join = event.join.max(meeting_start);
        let leave = event.leave.unwrap_or(meeting_end).min(meeting_end);

        if leave <= join {
            continue;
        }

        let entry = out
            .entry(event.key.clone())
            .or_insert_with(|| UserAttendance {
                total: Duration::zero(),
                intervals: Vec::new(),
                first_join: event.join,
            });
        entry.total += leave - join;
        entry.intervals.push(Interval { join, leave });
        if event.join < entry.first_join {
            entry.first_join = event.join;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 8, h, m, 0).unwrap()
    }

    fn event(key: &str, join: DateTime<Utc>, leave: Option<DateTime<Utc>>) -> ParticipantEvent {
        ParticipantEvent {
            key: key.to_string(),
            join,
            leave,
        }
    }

    #[test]
    fn clamps_to_meeting_bounds() {
        // Joined before start, left after end: full meeting counted.
        let result = reconcile(
            at(10, 0),
            at(11, 0),
            &[event("a", at(9, 50), Some(at(11, 30)))],
        );
        assert_eq!(result["a"].total, Duration::minutes(60));
        assert_eq!(
            result["a"].intervals,
            vec![Interval {
                join: at(10, 0),
                leave: at(11, 0)
            }]
        );
    }

    #[test]
    fn missing_leave_assumes_meeting_end() {
        let result = reconcile(at(10, 0), at(11, 0), &[event("a", at(10, 15), None)]);
        assert_eq!(result["a"].total, Duration::minutes(45));
    }

    #[test]
    fn scenario_partial_attendance() {
        // 10:00-11:00 meeting, join 10:05, leave 10:50 -> 45 minutes.
        let result = reconcile(
            at(10, 0),
            at(11, 0),
            &[event("a", at(10, 5), Some(at(10, 50)))],
        );
        assert_eq!(result["a"].total, Duration::minutes(45));
    }

    #[test]
    fn zero_duration_interval_is_discarded_not_zero_clamped() {
        // Join and leave at the same instant: no interval, no entry.
        let result = reconcile(
            at(10, 0),
            at(11, 0),
            &[event("a", at(10, 30), Some(at(10, 30)))],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn interval_entirely_outside_bounds_is_discarded() {
        let result = reconcile(
            at(10, 0),
            at(11, 0),
            &[
                event("early", at(9, 0), Some(at(9, 30))),
                event("late", at(11, 10), Some(at(11, 40))),
            ],
        );
        assert!(result.is_empty());
    }

    #[test]
    fn concurrent_intervals_for_one_user_are_summed() {
        // Multi-device join: two overlapping sessions both count in full.
        let result = reconcile(
            at(10, 0),
            at(11, 0),
            &[
                event("a", at(10, 0), Some(at(10, 40))),
                event("a", at(10, 10), Some(at(10, 40))),
            ],
        );
        assert_eq!(result["a"].total, Duration::minutes(70));
        assert_eq!(result["a"].intervals.len(), 2);
    }

    #[test]
    fn first_join_is_earliest_raw_join() {
        let result = reconcile(
            at(10, 0),
            at(11, 0),
            &[
                event("a", at(10, 20), Some(at(10, 30))),
                event("a", at(9, 55), Some(at(10, 10))),
            ],
        );
        assert_eq!(result["a"].first_join, at(9, 55));
    }

    #[test]
    fn zero_length_meeting_yields_empty_map() {
        let result = reconcile(
            at(10, 0),
            at(10, 0),
            &[event("a", at(10, 0), Some(at(10, 30)))],
        );
        assert!(result.is_empty());

        let inverted = reconcile(
            at(11, 0),
            at(10, 0),
            &[event("a", at(10, 0), Some(at(10, 30)))],
        );
        assert!(inverted.is_empty());
    }

    #[test]
    fn no_events_yields_empty_map() {
        assert!(reconcile(at(10, 0), at(11, 0), &[]).is_empty());
    }
}
