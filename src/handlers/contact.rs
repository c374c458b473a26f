use std::collections::BTreeMap;

use axum::{extract::Multipart, extract::State, response::Response};
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::handlers::common::{
    client_field_name, form_failed, form_outcome_response, form_rejected, is_valid_email,
    MSG_INVALID_EMAIL, MSG_REQUIRED,
};
use crate::handlers::AppState;
use crate::services::forms::FormFile;

/// Client field name → CMS plugin form tag. The reverse direction translates
/// the plugin's `invalid_fields` back to names the frontend knows.
const FIELD_TAGS: &[(&str, &str)] = &[
    ("fullName", "full-name"),
    ("email", "your-email"),
    ("phone", "your-phone"),
    ("subject", "your-subject"),
    ("message", "your-message"),
    ("file", "your-file"),
];

const REQUIRED_FIELDS: &[&str] = &["fullName", "email", "subject", "message"];

const MAX_FILE_BYTES: usize = 2 * 1024 * 1024;

const MSG_FILE_TOO_LARGE: &str = "Le fichier ne doit pas dépasser 2 Mo";
const MSG_FILE_NOT_PDF: &str = "Seuls les fichiers PDF sont acceptés";

/// Submit the contact form.
///
/// Accepts multipart form data (text fields plus an optional `file` part),
/// validates it, and relays it to the CMS contact-form plugin under its own
/// field tags. Plugin-side rejections come back with the field names
/// translated to the client's.
#[utoipa::path(
    post,
    path = "/contact",
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Message sent", body = crate::handlers::common::FormAccepted),
        (status = 422, description = "One or more fields were rejected", body = crate::handlers::common::FormRejected),
        (status = 500, description = "The message could not be delivered", body = crate::handlers::common::FormFailed)
    ),
    tag = "Forms"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut file: Option<FormFile> = None;

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::validation(format!("Invalid form payload: {}", e)))?
    {
        let Some(name) = part.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let file_name = part.file_name().unwrap_or_default().to_string();
            let bytes = part
                .bytes()
                .await
                .map_err(|e| ServiceError::validation(format!("Invalid form payload: {}", e)))?;
            if !file_name.is_empty() || !bytes.is_empty() {
                file = Some(FormFile {
                    field_name: "your-file".to_string(),
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            let value = part
                .text()
                .await
                .map_err(|e| ServiceError::validation(format!("Invalid form payload: {}", e)))?;
            fields.insert(name, value);
        }
    }

    let errors = validate_contact(&fields, file.as_ref());
    if !errors.is_empty() {
        debug!(rejected = errors.len(), "contact form rejected locally");
        return Ok(form_rejected(errors));
    }

    let mut relayed: Vec<(String, String)> = Vec::new();
    for (client_name, tag) in FIELD_TAGS {
        if *client_name == "file" {
            continue;
        }
        if let Some(value) = fields.get(*client_name) {
            let value = value.trim();
            if !value.is_empty() {
                relayed.push((tag.to_string(), value.to_string()));
            }
        }
    }

    let outcome = state
        .services
        .forms
        .submit_feedback(state.config.forms.contact_form_id, relayed, file)
        .await;

    match outcome {
        Ok(outcome) => Ok(form_outcome_response(outcome, |tag| {
            client_field_name(FIELD_TAGS, tag)
        })),
        Err(error) => {
            warn!(%error, "contact form relay failed");
            Ok(form_failed())
        }
    }
}

fn validate_contact(
    fields: &BTreeMap<String, String>,
    file: Option<&FormFile>,
) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();

    for name in REQUIRED_FIELDS {
        let present = fields
            .get(*name)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false);
        if !present {
            errors.insert((*name).to_string(), MSG_REQUIRED.to_string());
        }
    }

    if let Some(email) = fields.get("email").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !is_valid_email(email) {
            errors.insert("email".to_string(), MSG_INVALID_EMAIL.to_string());
        }
    }

    if let Some(file) = file {
        if file.bytes.len() > MAX_FILE_BYTES {
            errors.insert("file".to_string(), MSG_FILE_TOO_LARGE.to_string());
        } else if !file.file_name.to_ascii_lowercase().ends_with(".pdf") {
            errors.insert("file".to_string(), MSG_FILE_NOT_PDF.to_string());
        }
    }

    errors
}
