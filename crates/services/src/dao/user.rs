use bson::{doc, oid::ObjectId};
use mongodb::Database;

use meetloop_db::models::User;

use super::base::{BaseDao, DaoResult};

pub struct UserDao {
    pub base: BaseDao<User>,
}

impl UserDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, User::COLLECTION),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> DaoResult<Option<User>> {
        self.base.find_one(doc! { "email": email }).await
    }

    pub async fn find_by_ids(&self, ids: &[ObjectId]) -> DaoResult<Vec<User>> {
        self.base
            .find_many(doc! { "_id": { "$in": ids } }, None)
            .await
    }

    pub async fn count_members(&self, creator_id: ObjectId) -> DaoResult<u64> {
        self.base
            .count(doc! { "creator_id": creator_id, "role": "member" })
            .await
    }
}
