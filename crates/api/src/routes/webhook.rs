use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{error, warn};

use meetloop_services::webhook::{
    LifecycleEvent, WebhookEnvelope, challenge_response, verify_signature,
};

use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-zm-signature";
const TIMESTAMP_HEADER: &str = "x-zm-request-timestamp";

/// Provider webhook ingress.
///
/// The URL-validation handshake is answered before signature checks, as the
/// provider requires. Everything else must carry a valid signed timestamp;
/// once authenticated, processing failures are logged but still acknowledged
/// so the provider does not retry endlessly.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Unparseable webhook body ignored");
            return ack(json!({ "status": "ignored" }));
        }
    };

    let event = LifecycleEvent::classify(&envelope);

    if let LifecycleEvent::UrlValidation { plain_token } = &event {
        let encrypted = challenge_response(
            state.settings.provider.webhook_secret.as_bytes(),
            plain_token,
        );
        return ack(json!({
            "plainToken": plain_token,
            "encryptedToken": encrypted,
        }));
    }

    let signature = header_str(&headers, SIGNATURE_HEADER);
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        warn!("Webhook delivery missing signature headers");
        return reject();
    };
    if let Err(e) = verify_signature(
        state.settings.provider.webhook_secret.as_bytes(),
        &body,
        signature,
        timestamp,
        chrono::Utc::now().timestamp(),
        state.settings.provider.clock_skew_tolerance_secs,
    ) {
        warn!(error = %e, event = %envelope.event, "Rejected webhook delivery");
        return reject();
    }

    if let Err(e) = state.lifecycle.handle_event(event).await {
        // Acknowledge anyway: the provider retries on non-2xx, and a replay
        // would hit the same failure.
        error!(error = %e, event = %envelope.event, "Webhook processing failed");
    }
    ack(json!({ "status": "ok" }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn ack(body: Value) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

fn reject() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "status": "invalid_signature" })),
    )
        .into_response()
}
