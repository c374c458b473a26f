use crate::{config::FormsConfig, errors::ServiceError};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

/// A single rejected field reported by the CMS plugin, named by its form tag
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidField {
    pub field: String,
    pub message: String,
}

/// The three outcomes the CMS feedback endpoint can report
#[derive(Debug)]
pub enum FeedbackOutcome {
    MailSent,
    ValidationFailed(Vec<InvalidField>),
    /// Any other status string; carries it for the server-side log
    Failed(String),
}

/// File attachment forwarded with a submission
#[derive(Debug, Clone)]
pub struct FormFile {
    /// Form tag the plugin expects the file under, e.g. "your-file"
    pub field_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct FeedbackResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    invalid_fields: Vec<InvalidField>,
}

fn outcome_from(feedback: FeedbackResponse) -> FeedbackOutcome {
    match feedback.status.as_str() {
        "mail_sent" => FeedbackOutcome::MailSent,
        "validation_failed" => FeedbackOutcome::ValidationFailed(feedback.invalid_fields),
        other => {
            warn!(status = %other, message = %feedback.message, "form submission not sent");
            FeedbackOutcome::Failed(other.to_string())
        }
    }
}

/// Client for the CMS contact-form plugin's feedback endpoint
#[derive(Clone)]
pub struct FormRelayService {
    client: reqwest::Client,
    config: FormsConfig,
}

impl FormRelayService {
    pub fn new(client: reqwest::Client, config: FormsConfig) -> Self {
        Self { client, config }
    }

    /// Submits field values (and an optional file) as multipart form data.
    ///
    /// The plugin answers 200 even when it rejects the submission; the
    /// `status` field in the body is the real verdict.
    #[instrument(skip(self, fields, file), fields(field_count = fields.len()))]
    pub async fn submit_feedback(
        &self,
        form_id: u64,
        fields: Vec<(String, String)>,
        file: Option<FormFile>,
    ) -> Result<FeedbackOutcome, ServiceError> {
        let url = format!("{}/contact-forms/{}/feedback", self.config.api_url, form_id);

        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }
        if let Some(file) = file {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str("application/pdf")
                .map_err(|e| ServiceError::internal(format!("invalid attachment part: {}", e)))?;
            form = form.part(file.field_name, part);
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, form_id, "form submission request failed");
                ServiceError::integration("forms", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, form_id, "form submission rejected");
            return Err(ServiceError::integration(
                "forms",
                format!("form submission returned {}", status),
            ));
        }

        let feedback: FeedbackResponse = response.json().await.map_err(|e| {
            error!(error = %e, form_id, "feedback response did not match contract");
            ServiceError::integration("forms", format!("invalid feedback response: {}", e))
        })?;

        info!(form_id, status = %feedback.status, "form submission relayed");
        Ok(outcome_from(feedback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn mail_sent_maps_to_success() {
        let feedback: FeedbackResponse =
            serde_json::from_str(r#"{"status":"mail_sent","message":"Merci"}"#).unwrap();
        assert_matches!(outcome_from(feedback), FeedbackOutcome::MailSent);
    }

    #[test]
    fn validation_failure_carries_invalid_fields() {
        let raw = r#"{
            "status": "validation_failed",
            "message": "Un ou plusieurs champs contiennent des erreurs.",
            "invalid_fields": [
                {"field": "your-email", "message": "Adresse e-mail invalide"},
                {"field": "full-name", "message": "Ce champ est requis"}
            ]
        }"#;
        let feedback: FeedbackResponse = serde_json::from_str(raw).unwrap();
        assert_matches!(
            outcome_from(feedback),
            FeedbackOutcome::ValidationFailed(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "your-email");
            }
        );
    }

    #[test]
    fn unknown_status_maps_to_failed() {
        let feedback: FeedbackResponse =
            serde_json::from_str(r#"{"status":"mail_failed","message":"smtp down"}"#).unwrap();
        assert_matches!(
            outcome_from(feedback),
            FeedbackOutcome::Failed(status) => assert_eq!(status, "mail_failed")
        );
    }

    #[test]
    fn missing_invalid_fields_defaults_to_empty() {
        let feedback: FeedbackResponse =
            serde_json::from_str(r#"{"status":"validation_failed"}"#).unwrap();
        assert_matches!(
            outcome_from(feedback),
            FeedbackOutcome::ValidationFailed(fields) => assert!(fields.is_empty())
        );
    }
}
