use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Meeting id assigned by the video-conferencing provider.
    pub provider_meeting_id: String,
    pub topic: String,
    pub creator_id: ObjectId,
    pub join_url: String,
    pub start_date: DateTime,
    pub scheduled_end_date: Option<DateTime>,
    pub actual_start_date: Option<DateTime>,
    pub actual_end_date: Option<DateTime>,
    pub recording_link: Option<String>,
    pub recording_passcode: Option<String>,
    /// Set once pre-meeting invite reminders went out.
    pub invite_sent_at: Option<DateTime>,
    /// Finalize marker: set by the single winner of the `ended` claim.
    pub notified_at: Option<DateTime>,
    #[serde(default)]
    pub suppress_outreach: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Meeting {
    pub const COLLECTION: &'static str = "meetings";

    /// Actual end when observed, otherwise the scheduled end.
    pub fn effective_end(&self) -> Option<DateTime> {
        self.actual_end_date.or(self.scheduled_end_date)
    }

    /// Actual start when observed, otherwise the scheduled start.
    pub fn effective_start(&self) -> DateTime {
        self.actual_start_date.unwrap_or(self.start_date)
    }
}
