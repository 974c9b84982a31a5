use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub provider: ProviderSettings,
    pub messaging: MessagingSettings,
    pub insights: InsightsSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
}

/// Video-conferencing provider webhook settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderSettings {
    pub webhook_secret: String,
    /// Max tolerated |now - webhook timestamp| in seconds.
    pub clock_skew_tolerance_secs: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessagingSettings {
    pub api_base_url: String,
    pub api_token: String,
    pub phone_number_id: String,
    /// Business number used for recording CTA deep links.
    pub cta_number: String,
    pub send_timeout_secs: u64,
    pub survey_template: String,
    pub missed_template: String,
    pub invite_template: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InsightsSettings {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    /// Minutes before start at which invite reminders go out.
    pub reminder_lead_minutes: i64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("MEETLOOP"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "meetloop")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.issuer", "meetloop")?
            .set_default("provider.webhook_secret", "")?
            .set_default("provider.clock_skew_tolerance_secs", 300)?
            .set_default("messaging.api_base_url", "https://graph.facebook.com/v21.0")?
            .set_default("messaging.api_token", "")?
            .set_default("messaging.phone_number_id", "")?
            .set_default("messaging.cta_number", "")?
            .set_default("messaging.send_timeout_secs", 10)?
            .set_default("messaging.survey_template", "meeting_experience_rating")?
            .set_default("messaging.missed_template", "meeting_missed_recording")?
            .set_default("messaging.invite_template", "meeting_invite_reminder")?
            .set_default("insights.api_base_url", "https://openrouter.ai/api/v1")?
            .set_default("insights.model", "mistralai/devstral-2512:free")?
            .set_default("insights.max_tokens", 1024)?
            .set_default("insights.request_timeout_secs", 30)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.reminder_lead_minutes", 60)?
            .build()?;

        config.try_deserialize()
    }
}
