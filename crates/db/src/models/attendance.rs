use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Raw join/leave pair observed via provider webhooks. Append-only;
/// `left_at` stays null until a matching leave event arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub meeting_id: ObjectId,
    /// Resolved internal user, when the participant email matched one.
    pub user_id: Option<ObjectId>,
    pub participant_email: String,
    pub display_name: String,
    pub joined_at: DateTime,
    pub left_at: Option<DateTime>,
    pub created_at: DateTime,
}

impl AttendanceRecord {
    pub const COLLECTION: &'static str = "meeting_attendance";
}
