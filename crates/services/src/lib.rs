pub mod analytics;
pub mod dao;
pub mod dispatch;
pub mod insights;
pub mod lifecycle;
pub mod messaging;
pub mod metrics;
pub mod reconcile;
pub mod scheduler;
pub mod webhook;

pub use analytics::AnalyticsService;
pub use dao::*;
pub use dispatch::Dispatcher;
pub use insights::InsightsService;
pub use lifecycle::LifecycleService;
pub use messaging::{Messenger, WhatsAppMessenger};
pub use scheduler::ReminderScheduler;
