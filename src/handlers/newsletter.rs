use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::handlers::common::is_valid_email;
use crate::handlers::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscribeAccepted {
    pub success: bool,
}

/// Fixed error codes the frontend switches on for its own messaging;
/// upstream detail stays in the server log.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscribeError {
    pub error: &'static str,
}

/// Subscribe an email address to the newsletter.
///
/// The upstream list API addresses members by a hash of the address, so
/// resubmitting the same address is harmless.
#[utoipa::path(
    post,
    path = "/newsletter/subscribe",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Subscribed", body = SubscribeAccepted),
        (status = 400, description = "Not a usable email address", body = SubscribeError),
        (status = 500, description = "The mailing-list provider rejected the request", body = SubscribeError)
    ),
    tag = "Newsletter"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Response {
    let Some(email) = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| is_valid_email(email))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(SubscribeError {
                error: "invalid_email",
            }),
        )
            .into_response();
    };

    match state.services.mailing.upsert_subscriber(email).await {
        Ok(()) => {
            info!("newsletter subscription accepted");
            (StatusCode::OK, Json(SubscribeAccepted { success: true })).into_response()
        }
        Err(error) => {
            warn!(%error, "newsletter subscription failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SubscribeError {
                    error: "mailchimp_error",
                }),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_a_bare_email_object() {
        let request: SubscribeRequest =
            serde_json::from_str(r#"{"email":"client@example.com"}"#).unwrap();
        assert_eq!(request.email.as_deref(), Some("client@example.com"));

        let request: SubscribeRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(request.email.is_none());
    }

    #[test]
    fn error_codes_match_the_wire_contract() {
        assert_eq!(
            serde_json::to_value(SubscribeError {
                error: "invalid_email"
            })
            .unwrap(),
            serde_json::json!({ "error": "invalid_email" })
        );
        assert_eq!(
            serde_json::to_value(SubscribeAccepted { success: true }).unwrap(),
            serde_json::json!({ "success": true })
        );
    }
}
