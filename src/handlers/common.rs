use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::forms::{FeedbackOutcome, InvalidField};

/// Validation messages shown by the French-first frontend.
pub const MSG_REQUIRED: &str = "Ce champ est requis";
pub const MSG_INVALID_EMAIL: &str = "Adresse e-mail invalide";
pub const MSG_SUBMIT_FAILED: &str = "Une erreur est survenue. Veuillez réessayer plus tard.";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Form submission accepted
#[derive(Debug, Serialize, ToSchema)]
pub struct FormAccepted {
    pub success: bool,
}

/// Form submission rejected, field by field
#[derive(Debug, Serialize, ToSchema)]
pub struct FormRejected {
    pub success: bool,
    pub errors: BTreeMap<String, String>,
}

/// Form submission could not be delivered
#[derive(Debug, Serialize, ToSchema)]
pub struct FormFailed {
    pub success: bool,
    pub message: String,
}

pub fn form_accepted() -> Response {
    (StatusCode::OK, Json(FormAccepted { success: true })).into_response()
}

pub fn form_rejected(errors: BTreeMap<String, String>) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(FormRejected {
            success: false,
            errors,
        }),
    )
        .into_response()
}

pub fn form_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FormFailed {
            success: false,
            message: MSG_SUBMIT_FAILED.to_string(),
        }),
    )
        .into_response()
}

/// Maps a downstream plugin field tag back to its client-facing name.
/// Tags absent from the table pass through unchanged.
pub fn client_field_name(table: &[(&str, &str)], downstream: &str) -> String {
    table
        .iter()
        .find(|(_, tag)| *tag == downstream)
        .map(|(client, _)| (*client).to_string())
        .unwrap_or_else(|| downstream.to_string())
}

/// Renders a relay outcome with the form response family; plugin-side
/// validation failures are translated back to client field names.
pub fn form_outcome_response<F>(outcome: FeedbackOutcome, translate: F) -> Response
where
    F: Fn(&str) -> String,
{
    match outcome {
        FeedbackOutcome::MailSent => form_accepted(),
        FeedbackOutcome::ValidationFailed(invalid_fields) => {
            form_rejected(translate_invalid_fields(&invalid_fields, translate))
        }
        FeedbackOutcome::Failed(_) => form_failed(),
    }
}

pub fn translate_invalid_fields<F>(
    fields: &[InvalidField],
    translate: F,
) -> BTreeMap<String, String>
where
    F: Fn(&str) -> String,
{
    fields
        .iter()
        .map(|field| (translate(&field.field), field.message.clone()))
        .collect()
}
