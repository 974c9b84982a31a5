pub mod auth;
pub mod event;

pub use auth::{WebhookError, challenge_response, verify_signature};
pub use event::{LifecycleEvent, WebhookEnvelope};
