use bson::{DateTime, doc, oid::ObjectId};
use mongodb::Database;

use meetloop_db::models::AttendanceRecord;

use super::base::{BaseDao, DaoResult};

pub struct AttendanceDao {
    pub base: BaseDao<AttendanceRecord>,
}

impl AttendanceDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, AttendanceRecord::COLLECTION),
        }
    }

    pub async fn open_session(&self, record: &AttendanceRecord) -> DaoResult<ObjectId> {
        self.base.insert_one(record).await
    }

    /// Closes the most recent open session for a participant. Returns `false`
    /// when no open session exists (a leave without a matching join).
    pub async fn close_open_session(
        &self,
        meeting_id: ObjectId,
        participant_email: &str,
        left_at: DateTime,
    ) -> DaoResult<bool> {
        let updated = self
            .base
            .collection()
            .find_one_and_update(
                doc! {
                    "meeting_id": meeting_id,
                    "participant_email": participant_email,
                    "left_at": null,
                },
                doc! { "$set": { "left_at": left_at } },
            )
            .sort(doc! { "joined_at": -1 })
            .await?;
        Ok(updated.is_some())
    }

    pub async fn list_for_meeting(&self, meeting_id: ObjectId) -> DaoResult<Vec<AttendanceRecord>> {
        self.base
            .find_many(
                doc! { "meeting_id": meeting_id },
                Some(doc! { "joined_at": 1 }),
            )
            .await
    }

    pub async fn list_for_meetings(
        &self,
        meeting_ids: &[ObjectId],
    ) -> DaoResult<Vec<AttendanceRecord>> {
        self.base
            .find_many(doc! { "meeting_id": { "$in": meeting_ids } }, None)
            .await
    }
}
