use async_trait::async_trait;
use meetloop_config::MessagingSettings;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Post-meeting "rate your experience" prompt for attendees.
    Survey,
    /// "Missed you" message with the recording link for non-attendees.
    Missed,
    /// Pre-meeting invite reminder.
    Invite,
}

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Recipient phone number in international format.
    pub recipient: String,
    pub template: TemplateKind,
    /// Key the downstream provider uses to collapse duplicate sends into a
    /// single delivered effect.
    pub dedup_key: String,
    pub parameters: Vec<String>,
}

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Messaging API error: {0}")]
    Api(String),
    #[error("Messaging request timed out")]
    Timeout,
    #[error("Messaging credentials not configured")]
    NotConfigured,
}

/// Outbound messaging collaborator. Implementations must treat duplicate
/// dedup keys as no-ops; callers rely on that for at-least-once webhook
/// delivery safety.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_template(&self, message: &OutboundMessage) -> Result<String, MessagingError>;
}

// ---- WhatsApp Graph API implementation -----------------------------------

pub struct WhatsAppMessenger {
    settings: MessagingSettings,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl WhatsAppMessenger {
    pub fn new(settings: &MessagingSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.send_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            settings: settings.clone(),
            client,
        }
    }

    fn template_name(&self, kind: TemplateKind) -> &str {
        match kind {
            TemplateKind::Survey => &self.settings.survey_template,
            TemplateKind::Missed => &self.settings.missed_template,
            TemplateKind::Invite => &self.settings.invite_template,
        }
    }

    fn build_payload(&self, message: &OutboundMessage) -> Value {
        let components = if message.parameters.is_empty() {
            Value::Null
        } else {
            json!([{
                "type": "body",
                "parameters": message
                    .parameters
                    .iter()
                    .map(|p| json!({ "type": "text", "text": p }))
                    .collect::<Vec<_>>(),
            }])
        };

        json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": message.recipient,
            "type": "template",
            "template": {
                "name": self.template_name(message.template),
                "language": { "code": "en" },
                "components": components,
            },
            // Echoed back on delivery receipts; the provider collapses
            // duplicate sends carrying the same value.
            "biz_opaque_callback_data": message.dedup_key,
        })
    }
}

#[async_trait]
impl Messenger for WhatsAppMessenger {
    async fn send_template(&self, message: &OutboundMessage) -> Result<String, MessagingError> {
        if self.settings.api_token.is_empty() || self.settings.phone_number_id.is_empty() {
            return Err(MessagingError::NotConfigured);
        }

        let url = format!(
            "{}/{}/messages",
            self.settings.api_base_url, self.settings.phone_number_id
        );
        let payload = self.build_payload(message);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MessagingError::Timeout
                } else {
                    MessagingError::Api(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, dedup_key = %message.dedup_key, "Template send rejected");
            return Err(MessagingError::Api(format!("{status}: {body}")));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| MessagingError::Api(e.to_string()))?;

        let message_id = parsed
            .messages
            .first()
            .map(|m| m.id.clone())
            .unwrap_or_default();
        info!(%message_id, dedup_key = %message.dedup_key, "Template message sent");
        Ok(message_id)
    }
}

/// Deep link a recipient can tap to request the recording over WhatsApp.
pub fn recording_cta_link(cta_number: &str, provider_meeting_id: &str) -> String {
    let text =
        urlencoding::encode(&format!("Hi, send me the recording for meeting {provider_meeting_id}"))
            .into_owned();
    format!(
        "https://api.whatsapp.com/send/?phone={cta_number}&text={text}&type=phone_number&app_absent=0"
    )
}
