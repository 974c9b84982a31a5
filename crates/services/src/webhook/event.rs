use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw webhook body as the provider ships it: an open-ended event name plus
/// a loosely-shaped payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub event_ts: Option<i64>,
}

/// Meeting fields shared by all lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingObject {
    pub id: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub join_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub leave_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingObject {
    pub id: String,
    pub share_url: String,
    #[serde(default)]
    pub password: Option<String>,
}

/// Closed event type at the ingestion boundary. Anything the provider sends
/// that we do not recognize, or that fails payload validation, lands in
/// `Unknown` and is acknowledged without processing.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    MeetingStarted {
        object: MeetingObject,
    },
    MeetingEnded {
        object: MeetingObject,
    },
    ParticipantJoined {
        object: MeetingObject,
        participant: ParticipantObject,
    },
    ParticipantLeft {
        object: MeetingObject,
        participant: ParticipantObject,
    },
    RecordingCompleted {
        object: RecordingObject,
    },
    UrlValidation {
        plain_token: String,
    },
    Unknown(String),
}

impl LifecycleEvent {
    /// Classify an envelope. Never fails: malformed payloads degrade to
    /// `Unknown` so a provider catalog change cannot break ingestion.
    pub fn classify(envelope: &WebhookEnvelope) -> Self {
        match envelope.event.as_str() {
            "endpoint.url_validation" => {
                match envelope.payload.get("plainToken").and_then(Value::as_str) {
                    Some(token) => LifecycleEvent::UrlValidation {
                        plain_token: token.to_string(),
                    },
                    None => LifecycleEvent::Unknown(envelope.event.clone()),
                }
            }
            "meeting.started" => match parse_object::<MeetingObject>(&envelope.payload) {
                Some(object) => LifecycleEvent::MeetingStarted { object },
                None => LifecycleEvent::Unknown(envelope.event.clone()),
            },
            "meeting.ended" => match parse_object::<MeetingObject>(&envelope.payload) {
                Some(object) => LifecycleEvent::MeetingEnded { object },
                None => LifecycleEvent::Unknown(envelope.event.clone()),
            },
            "meeting.participant_joined" => match parse_participant(&envelope.payload) {
                Some((object, participant)) => LifecycleEvent::ParticipantJoined {
                    object,
                    participant,
                },
                None => LifecycleEvent::Unknown(envelope.event.clone()),
            },
            "meeting.participant_left" => match parse_participant(&envelope.payload) {
                Some((object, participant)) => LifecycleEvent::ParticipantLeft {
                    object,
                    participant,
                },
                None => LifecycleEvent::Unknown(envelope.event.clone()),
            },
            "recording.completed" => match parse_object::<RecordingObject>(&envelope.payload) {
                Some(object) => LifecycleEvent::RecordingCompleted { object },
                None => LifecycleEvent::Unknown(envelope.event.clone()),
            },
            other => LifecycleEvent::Unknown(other.to_string()),
        }
    }
}

fn parse_object<T: for<'de> Deserialize<'de>>(payload: &Value) -> Option<T> {
    serde_json::from_value(payload.get("object")?.clone()).ok()
}

fn parse_participant(payload: &Value) -> Option<(MeetingObject, ParticipantObject)> {
    let object_value = payload.get("object")?;
    let object: MeetingObject = serde_json::from_value(object_value.clone()).ok()?;
    let participant: ParticipantObject =
        serde_json::from_value(object_value.get("participant")?.clone()).ok()?;
    Some((object, participant))
}
