pub mod locks;
pub mod service;
pub mod store;

pub use locks::MeetingLocks;
pub use service::LifecycleService;
pub use store::{LifecycleStore, MongoLifecycleStore};
