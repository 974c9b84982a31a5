use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Meetings
    create_indexes(
        db,
        "meetings",
        vec![
            index_unique(bson::doc! { "provider_meeting_id": 1 }),
            index(bson::doc! { "creator_id": 1, "start_date": -1 }),
            index(bson::doc! { "start_date": 1, "invite_sent_at": 1 }),
        ],
    )
    .await?;

    // Engagements
    create_indexes(
        db,
        "meeting_engagements",
        vec![
            index_unique(bson::doc! { "meeting_id": 1, "user_id": 1 }),
            index(bson::doc! { "user_id": 1 }),
        ],
    )
    .await?;

    // Attendance
    create_indexes(
        db,
        "meeting_attendance",
        vec![
            index(bson::doc! { "meeting_id": 1, "user_id": 1 }),
            index(bson::doc! { "meeting_id": 1, "joined_at": 1 }),
            // Open-session lookup when a participant leaves
            index(bson::doc! { "meeting_id": 1, "participant_email": 1, "left_at": 1 }),
        ],
    )
    .await?;

    // Users
    create_indexes(
        db,
        "users",
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "creator_id": 1, "role": 1 }),
        ],
    )
    .await?;

    info!("Indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    Ok(())
}
