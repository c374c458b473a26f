//! Payment gateway webhook.
//!
//! A redelivered event can double-book: the completed-status guard runs on
//! the fetched order, and a concurrent duplicate delivery can pass it before
//! either delivery marks the order completed. There is no dedup store, and
//! the scheduling API offers no idempotency key.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::bookings::{consultation_questions, invitee_name};
use crate::handlers::AppState;
use crate::services::calendly::CreateInviteeRequest;
use crate::services::commerce::{meta_keys, OrderStatus};
use crate::services::notchpay::order_id_from_reference;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-notch-signature";

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum WebhookAck {
    Processed { success: bool },
    Ignored { message: String },
}

impl WebhookAck {
    fn processed() -> Self {
        Self::Processed { success: true }
    }

    fn ignored(message: &str) -> Self {
        Self::Ignored {
            message: message.to_string(),
        }
    }
}

fn ignored(message: &str) -> (StatusCode, Json<WebhookAck>) {
    (StatusCode::OK, Json(WebhookAck::ignored(message)))
}

/// Gateway-initiated payment notification.
///
/// Irrelevant events are acknowledged with 200 so the gateway stops
/// redelivering them; only a completed payment whose reference names an
/// order mutates anything.
#[utoipa::path(
    post,
    path = "/webhooks/notch",
    request_body = Vec<u8>,
    responses(
        (status = 200, description = "Event processed or ignored", body = WebhookAck),
        (status = 400, description = "Signature verification failed", body = crate::errors::ErrorResponse),
        (status = 500, description = "Order fulfillment failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Webhooks"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), ServiceError> {
    // Verification runs only when a webhook secret is configured.
    if let Some(secret) = state.config.payment.webhook_secret.as_deref() {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, provided) {
            warn!("webhook signature verification failed");
            return Err(ServiceError::validation("Invalid webhook signature"));
        }
    }

    let envelope: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "webhook body is not JSON, acknowledging without action");
            return Ok(ignored("ignored"));
        }
    };

    let event = envelope
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let empty = Value::Null;
    let data = envelope.get("data").unwrap_or(&empty);
    let status = data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if event != "payment.complete" || status != "complete" {
        debug!(event, status, "webhook event ignored");
        return Ok(ignored("ignored"));
    }

    let reference = data
        .get("merchant_reference")
        .or_else(|| data.get("reference"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let Some(order_id) = order_id_from_reference(reference) else {
        debug!(reference, "webhook reference does not name an order, ignoring");
        return Ok(ignored("ignored"));
    };

    let order = state.services.commerce.get_order(order_id).await?;
    if order.has_status(OrderStatus::Completed) {
        info!(order_id, "order already processed");
        return Ok(ignored("order already processed"));
    }

    if !order.has_status(OrderStatus::Processing) {
        // Best-effort: fulfillment continues even if this update is lost.
        if let Err(error) = state
            .services
            .commerce
            .update_order_status(order.id, OrderStatus::Processing)
            .await
        {
            warn!(order_id = order.id, %error, "could not move order to processing");
        }
    }

    let Some(start_time) = order.meta_value(meta_keys::CALENDLY_START_TIME) else {
        info!(order_id = order.id, "order has no slot metadata, nothing to book");
        return Ok((StatusCode::OK, Json(WebhookAck::processed())));
    };

    let consultation_type = order
        .meta_value(meta_keys::CONSULTATION_TYPE)
        .unwrap_or_default();
    let client_message = order.meta_value(meta_keys::CLIENT_MESSAGE);
    let timezone = order
        .meta_value(meta_keys::INVITEE_TIMEZONE)
        .map(str::to_string)
        .filter(|tz| !tz.trim().is_empty());

    let user_uri = state.services.calendly.get_user_uri().await?;
    let invitee = CreateInviteeRequest {
        event_type: state.config.scheduling.paid_event_type.clone(),
        user: user_uri,
        email: order.billing.email.clone(),
        name: invitee_name(
            &order.billing.first_name,
            &order.billing.last_name,
            &order.billing.email,
        ),
        first_name: Some(order.billing.first_name.clone()).filter(|v| !v.trim().is_empty()),
        last_name: Some(order.billing.last_name.clone()).filter(|v| !v.trim().is_empty()),
        timezone,
        start_time: start_time.to_string(),
        questions_and_answers: consultation_questions(consultation_type, client_message),
    };
    state.services.calendly.create_invitee(&invitee).await?;

    state
        .services
        .commerce
        .update_order_status(order.id, OrderStatus::Completed)
        .await?;
    info!(order_id = order.id, "paid consultation fulfilled");

    Ok((StatusCode::OK, Json(WebhookAck::processed())))
}

fn verify_signature(secret: &str, body: &[u8], provided: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, provided)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let body = br#"{"event":"payment.complete"}"#;
        let signature = sign("topsecret", body);
        assert!(verify_signature("topsecret", body, &signature));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = sign("topsecret", br#"{"event":"payment.complete"}"#);
        assert!(!verify_signature(
            "topsecret",
            br#"{"event":"payment.failed"}"#,
            &signature
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = br#"{}"#;
        let signature = sign("topsecret", body);
        assert!(!verify_signature("othersecret", body, &signature));
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }

    #[test]
    fn ack_shapes_match_the_wire_contract() {
        let processed = serde_json::to_value(WebhookAck::processed()).unwrap();
        assert_eq!(processed, serde_json::json!({ "success": true }));

        let ignored = serde_json::to_value(WebhookAck::ignored("ignored")).unwrap();
        assert_eq!(ignored, serde_json::json!({ "message": "ignored" }));
    }
}
