use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;

use meetloop_db::models::Meeting;

use super::base::{BaseDao, DaoResult};

pub struct MeetingDao {
    pub base: BaseDao<Meeting>,
}

impl MeetingDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Meeting::COLLECTION),
        }
    }

    pub async fn find_by_provider_id(&self, provider_meeting_id: &str) -> DaoResult<Option<Meeting>> {
        self.base
            .find_one(doc! { "provider_meeting_id": provider_meeting_id })
            .await
    }

    /// Meetings owned by a creator, optionally bounded by start date,
    /// newest first.
    pub async fn list_for_creator(
        &self,
        creator_id: ObjectId,
        from: Option<DateTime>,
        to: Option<DateTime>,
    ) -> DaoResult<Vec<Meeting>> {
        let mut filter = doc! { "creator_id": creator_id };
        let mut range = doc! {};
        if let Some(from) = from {
            range.insert("$gte", from);
        }
        if let Some(to) = to {
            range.insert("$lte", to);
        }
        if !range.is_empty() {
            filter.insert("start_date", range);
        }
        self.base
            .find_many(filter, Some(doc! { "start_date": -1 }))
            .await
    }

    /// Records the first observed start. A replayed `started` event leaves
    /// the original timestamp in place.
    pub async fn mark_started(&self, meeting_id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "_id": meeting_id, "actual_start_date": null },
                doc! { "$set": { "actual_start_date": at } },
            )
            .await
    }

    /// Claims the finalize marker. Only one concurrent caller sees `true`;
    /// replayed `ended` events lose the claim and must skip finalization.
    pub async fn claim_finalize(&self, meeting_id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "_id": meeting_id, "notified_at": null },
                doc! { "$set": { "notified_at": DateTime::now() } },
            )
            .await
    }

    pub async fn mark_ended(&self, meeting_id: ObjectId, at: DateTime) -> DaoResult<bool> {
        self.base
            .update_by_id(meeting_id, doc! { "$set": { "actual_end_date": at } })
            .await
    }

    pub async fn set_recording(
        &self,
        meeting_id: ObjectId,
        link: &str,
        passcode: Option<&str>,
    ) -> DaoResult<bool> {
        self.base
            .update_by_id(
                meeting_id,
                doc! { "$set": {
                    "recording_link": link,
                    "recording_passcode": passcode,
                } },
            )
            .await
    }

    pub async fn mark_invites_sent(&self, meeting_id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_by_id(
                meeting_id,
                doc! { "$set": { "invite_sent_at": DateTime::now() } },
            )
            .await
    }

    /// Meetings starting inside [from, to] whose invite reminders have not
    /// gone out yet.
    pub async fn list_pending_reminders(
        &self,
        from: DateTime,
        to: DateTime,
    ) -> DaoResult<Vec<Meeting>> {
        self.base
            .find_many(
                doc! {
                    "start_date": { "$gte": from, "$lte": to },
                    "invite_sent_at": null,
                },
                Some(doc! { "start_date": 1 }),
            )
            .await
    }
}
