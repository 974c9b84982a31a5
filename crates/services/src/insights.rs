use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use meetloop_config::InsightsSettings;

use crate::analytics::MeetingStats;

const INSIGHTS_PROMPT: &str = concat!(
    "You are an analytics assistant for a meeting platform. Based on the ",
    "provided meeting statistics, generate insights and recommendations.\n\n",
    "Given the following data:\n",
    "- Total Members: {{totalMembers}}\n",
    "- Total Meetings: {{totalMeetings}}\n",
    "- Average Engagement Rate: {{avgEngagementRate}}%\n",
    "- Meeting Duration Breakdown (minutes: count): {{durationBreakdown}}\n",
    "- Meeting Timeline (date: number of meetings): {{timeline}}\n\n",
    "IMPORTANT: Return ONLY valid JSON. Do not wrap the response in markdown ",
    "code blocks or add any other text.\n\n",
    "Generate a JSON response with exactly this structure:\n",
    "{\n",
    "  \"communityInsights\": [\"...\", \"...\"],\n",
    "  \"recommendations\": [\"...\", \"...\"]\n",
    "}\n\n",
    "Keep each point to one short sentence and use specific numbers from the ",
    "data."
);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsights {
    pub community_insights: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// LLM-backed community insights over aggregate meeting stats.
#[derive(Debug, Clone)]
pub struct InsightsService {
    client: Client,
    api_key: Option<String>,
    api_base_url: String,
    model: String,
    max_tokens: u32,
}

impl InsightsService {
    pub fn new(settings: &InsightsSettings) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(settings.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key: settings.api_key.clone(),
            api_base_url: settings.api_base_url.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate insights from stats. Transport failures surface as errors;
    /// a malformed model reply degrades to empty insight lists.
    pub async fn generate(&self, stats: &MeetingStats) -> Result<AiInsights, String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| "Insights API key not configured".to_string())?;

        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(stats),
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base_url))
            .bearer_auth(api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Insights API request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Insights API error {}: {}", status, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse insights response: {}", e))?;

        let text = chat
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("");
        Ok(parse_insights(text))
    }
}

fn build_prompt(stats: &MeetingStats) -> String {
    let breakdown =
        serde_json::to_string(&stats.duration_breakdown).unwrap_or_else(|_| "{}".to_string());
    let timeline: String = stats
        .timeline
        .iter()
        .map(|item| format!("{}: {}", item.date, item.count))
        .collect::<Vec<_>>()
        .join(", ");

    INSIGHTS_PROMPT
        .replace("{{totalMembers}}", &stats.total_members.to_string())
        .replace("{{totalMeetings}}", &stats.total_meetings.to_string())
        .replace(
            "{{avgEngagementRate}}",
            &stats.avg_engagement_rate.to_string(),
        )
        .replace("{{durationBreakdown}}", &breakdown)
        .replace("{{timeline}}", &timeline)
}

/// Parse the model reply, tolerating markdown fences around the JSON. Any
/// shape failure yields empty lists instead of an error.
fn parse_insights(text: &str) -> AiInsights {
    let trimmed = strip_fences(text);
    let json: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Insights reply was not valid JSON");
            return AiInsights::default();
        }
    };

    AiInsights {
        community_insights: string_list(&json, "communityInsights"),
        recommendations: string_list(&json, "recommendations"),
    }
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn string_list(json: &serde_json::Value, key: &str) -> Vec<String> {
    json.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
