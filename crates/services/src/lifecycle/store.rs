use std::sync::Arc;

use async_trait::async_trait;
use bson::{DateTime, oid::ObjectId};

use meetloop_db::models::{AttendanceRecord, Engagement, Meeting, User};

use crate::dao::{AttendanceDao, DaoResult, EngagementDao, MeetingDao, UserDao};

/// Persistence seam for the meeting lifecycle.
///
/// Mirrors the narrow slice of the DAO layer that lifecycle handling needs,
/// so the service can be exercised against an in-memory double.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn find_meeting(&self, provider_meeting_id: &str) -> DaoResult<Option<Meeting>>;
    async fn mark_started(&self, meeting_id: ObjectId, at: DateTime) -> DaoResult<bool>;
    async fn claim_finalize(&self, meeting_id: ObjectId) -> DaoResult<bool>;
    async fn mark_ended(&self, meeting_id: ObjectId, at: DateTime) -> DaoResult<bool>;
    async fn set_recording(
        &self,
        meeting_id: ObjectId,
        link: &str,
        passcode: Option<&str>,
    ) -> DaoResult<bool>;

    async fn open_session(&self, record: &AttendanceRecord) -> DaoResult<ObjectId>;
    async fn close_open_session(
        &self,
        meeting_id: ObjectId,
        participant_email: &str,
        left_at: DateTime,
    ) -> DaoResult<bool>;
    async fn list_sessions(&self, meeting_id: ObjectId) -> DaoResult<Vec<AttendanceRecord>>;

    async fn list_engagements(&self, meeting_id: ObjectId) -> DaoResult<Vec<Engagement>>;
    async fn mark_attended(&self, meeting_id: ObjectId, user_id: ObjectId) -> DaoResult<bool>;

    async fn find_user_by_email(&self, email: &str) -> DaoResult<Option<User>>;
    async fn find_users_by_ids(&self, ids: &[ObjectId]) -> DaoResult<Vec<User>>;
}

/// Production store backed by the MongoDB DAOs.
pub struct MongoLifecycleStore {
    meetings: Arc<MeetingDao>,
    engagements: Arc<EngagementDao>,
    attendance: Arc<AttendanceDao>,
    users: Arc<UserDao>,
}

impl MongoLifecycleStore {
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
}

#[async_trait]
impl LifecycleStore for MongoLifecycleStore {
    async fn find_meeting(&self, provider_meeting_id: &str) -> DaoResult<Option<Meeting>> {
        self.meetings.find_by_provider_id(provider_meeting_id).await
    }

    async fn mark_started(&self, meeting_id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.meetings.mark_started(meeting_id, at).await
    }

    async fn claim_finalize(&self, meeting_id: ObjectId) -> DaoResult<bool> {
        self.meetings.claim_finalize(meeting_id).await
    }

    async fn mark_ended(&self, meeting_id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.meetings.mark_ended(meeting_id, at).await
    }

    async fn set_recording(
        &self,
        meeting_id: ObjectId,
        link: &str,
        passcode: Option<&str>,
    ) -> DaoResult<bool> {
        self.meetings.set_recording(meeting_id, link, passcode).await
    }

    async fn open_session(&self, record: &AttendanceRecord) -> DaoResult<ObjectId> {
        self.attendance.open_session(record).await
    }

    async fn close_open_session(
        &self,
        meeting_id: ObjectId,
        participant_email: &str,
        left_at: DateTime,
    ) -> DaoResult<bool> {
        self.attendance
            .close_open_session(meeting_id, participant_email, left_at)
            .await
    }

    async fn list_sessions(&self, meeting_id: ObjectId) -> DaoResult<Vec<AttendanceRecord>> {
        self.attendance.list_for_meeting(meeting_id).await
    }

    async fn list_engagements(&self, meeting_id: ObjectId) -> DaoResult<Vec<Engagement>> {
        self.engagements.list_for_meeting(meeting_id).await
    }

    async fn mark_attended(&self, meeting_id: ObjectId, user_id: ObjectId) -> DaoResult<bool> {
        self.engagements.mark_attended(meeting_id, user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> DaoResult<Option<User>> {
        self.users.find_by_email(email).await
    }

    async fn find_users_by_ids(&self, ids: &[ObjectId]) -> DaoResult<Vec<User>> {
        self.users.find_by_ids(ids).await
    }
}
