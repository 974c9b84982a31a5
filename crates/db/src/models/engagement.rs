use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One row per invited user per meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engagement {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub meeting_id: ObjectId,
    pub user_id: ObjectId,
    pub user_email: String,
    #[serde(default)]
    pub interested: Interested,
    #[serde(default)]
    pub attended: bool,
    pub satisfaction_rating: Option<u8>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Interested {
    Yes,
    No,
    Maybe,
    #[default]
    NoResponse,
}

impl Engagement {
    pub const COLLECTION: &'static str = "meeting_engagements";
}
