pub mod analytics;
pub mod meeting;
pub mod webhook;
