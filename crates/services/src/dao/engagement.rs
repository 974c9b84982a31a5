use bson::{doc, oid::ObjectId};
use mongodb::Database;

use meetloop_db::models::Engagement;

use super::base::{BaseDao, DaoResult};

pub struct EngagementDao {
    pub base: BaseDao<Engagement>,
}

impl EngagementDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Engagement::COLLECTION),
        }
    }

    pub async fn list_for_meeting(&self, meeting_id: ObjectId) -> DaoResult<Vec<Engagement>> {
        self.base
            .find_many(
                doc! { "meeting_id": meeting_id },
                Some(doc! { "created_at": 1 }),
            )
            .await
    }

    pub async fn list_for_meetings(&self, meeting_ids: &[ObjectId]) -> DaoResult<Vec<Engagement>> {
        self.base
            .find_many(doc! { "meeting_id": { "$in": meeting_ids } }, None)
            .await
    }

    pub async fn count_for_meeting(&self, meeting_id: ObjectId) -> DaoResult<u64> {
        self.base.count(doc! { "meeting_id": meeting_id }).await
    }

    /// Flips `attended` for one (meeting, user) pair.
    pub async fn mark_attended(&self, meeting_id: ObjectId, user_id: ObjectId) -> DaoResult<bool> {
        self.base
            .update_one(
                doc! { "meeting_id": meeting_id, "user_id": user_id },
                doc! { "$set": { "attended": true } },
            )
            .await
    }
}
