use crate::{config::SchedulingConfig, errors::ServiceError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use validator::Validate;

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    resource: UserResource,
}

#[derive(Debug, Deserialize)]
struct UserResource {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityResponse {
    #[serde(default)]
    collection: Vec<serde_json::Value>,
}

/// One custom question/answer pair shown on the booking
#[derive(Debug, Clone, Serialize)]
pub struct QuestionAnswer {
    pub question: String,
    pub answer: String,
}

/// Input for booking a calendar slot.
///
/// Calling this twice with the same logical booking creates two calendar
/// events; the scheduling API offers no idempotency key.
#[derive(Debug, Clone, Validate)]
pub struct CreateInviteeRequest {
    /// Event-type URI chosen by the caller (free or paid, from configuration)
    pub event_type: String,
    /// Scheduling-account URI from [`CalendlyService::get_user_uri`]
    pub user: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Falls back to the configured default timezone when unset
    pub timezone: Option<String>,
    #[validate(length(min = 1))]
    pub start_time: String,
    pub questions_and_answers: Vec<QuestionAnswer>,
}

#[derive(Debug, Serialize)]
struct InviteeBody {
    event_type: String,
    user: String,
    email: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<String>,
    timezone: String,
    start_time: String,
    questions_and_answers: Vec<QuestionAnswer>,
}

/// Client for the scheduling service's availability and booking API
#[derive(Clone)]
pub struct CalendlyService {
    client: reqwest::Client,
    config: SchedulingConfig,
}

impl CalendlyService {
    pub fn new(client: reqwest::Client, config: SchedulingConfig) -> Self {
        Self { client, config }
    }

    /// Resolves the authenticated scheduling-account URI; the other calls
    /// require it as an input.
    #[instrument(skip(self))]
    pub async fn get_user_uri(&self) -> Result<String, ServiceError> {
        let url = format!("{}/users/me", self.config.api_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "scheduling user lookup request failed");
                ServiceError::integration("scheduling", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "scheduling user lookup rejected");
            return Err(ServiceError::integration(
                "scheduling",
                format!("user lookup returned {}", status),
            ));
        }

        let user: CurrentUserResponse = response.json().await.map_err(|e| {
            error!(error = %e, "scheduling user response did not match contract");
            ServiceError::integration("scheduling", format!("invalid user response: {}", e))
        })?;

        Ok(user.resource.uri)
    }

    /// Lists available time slots for an event type in `[start_time, end_time)`.
    ///
    /// The scheduling API rejects windows longer than seven days; callers
    /// needing more must chunk the range themselves, this method does not.
    /// Slot payloads are passed through verbatim.
    #[instrument(skip(self, user_uri, event_type))]
    pub async fn get_event_availability(
        &self,
        user_uri: &str,
        event_type: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Vec<serde_json::Value>, ServiceError> {
        let url = format!("{}/event_type_available_times", self.config.api_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .query(&[
                ("user", user_uri),
                ("event_type", event_type),
                ("start_time", &start_time.to_rfc3339()),
                ("end_time", &end_time.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "availability request failed");
                ServiceError::integration("scheduling", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "availability request rejected");
            return Err(ServiceError::integration(
                "scheduling",
                format!("availability returned {}", status),
            ));
        }

        let availability: AvailabilityResponse = response.json().await.map_err(|e| {
            error!(error = %e, "availability response did not match contract");
            ServiceError::integration(
                "scheduling",
                format!("invalid availability response: {}", e),
            )
        })?;

        Ok(availability.collection)
    }

    /// Books one calendar event for the given slot.
    #[instrument(skip(self, request), fields(event_type = %request.event_type))]
    pub async fn create_invitee(
        &self,
        request: &CreateInviteeRequest,
    ) -> Result<serde_json::Value, ServiceError> {
        request.validate()?;
        let body = self.invitee_body(request);

        let url = format!("{}/invitees", self.config.api_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "invitee creation request failed");
                ServiceError::integration("scheduling", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "invitee creation rejected");
            return Err(ServiceError::integration(
                "scheduling",
                format!("invitee creation returned {}", status),
            ));
        }

        let invitee = response.json().await.map_err(|e| {
            error!(error = %e, "invitee response was not JSON");
            ServiceError::integration("scheduling", format!("invalid invitee response: {}", e))
        })?;

        info!(start_time = %body.start_time, "invitee created");
        Ok(invitee)
    }

    fn invitee_body(&self, request: &CreateInviteeRequest) -> InviteeBody {
        InviteeBody {
            event_type: request.event_type.clone(),
            user: request.user.clone(),
            email: request.email.clone(),
            name: request.name.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            timezone: request
                .timezone
                .clone()
                .filter(|tz| !tz.trim().is_empty())
                .unwrap_or_else(|| self.config.default_timezone.clone()),
            start_time: request.start_time.clone(),
            questions_and_answers: request.questions_and_answers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CalendlyService {
        CalendlyService::new(
            reqwest::Client::new(),
            SchedulingConfig {
                api_url: "https://api.calendly.com".into(),
                api_token: "token".into(),
                free_event_type: "https://api.calendly.com/event_types/FREE".into(),
                paid_event_type: "https://api.calendly.com/event_types/PAID".into(),
                default_timezone: "Africa/Douala".into(),
            },
        )
    }

    fn sample_request() -> CreateInviteeRequest {
        CreateInviteeRequest {
            event_type: "https://api.calendly.com/event_types/FREE".into(),
            user: "https://api.calendly.com/users/ME".into(),
            email: "client@example.com".into(),
            name: "Amina Njoya".into(),
            first_name: Some("Amina".into()),
            last_name: Some("Njoya".into()),
            timezone: None,
            start_time: "2026-09-01T09:00:00Z".into(),
            questions_and_answers: vec![QuestionAnswer {
                question: "Type de consultation".into(),
                answer: "creation-entreprise".into(),
            }],
        }
    }

    #[test]
    fn missing_timezone_falls_back_to_configured_default() {
        let body = service().invitee_body(&sample_request());
        assert_eq!(body.timezone, "Africa/Douala");
    }

    #[test]
    fn blank_timezone_falls_back_to_configured_default() {
        let mut request = sample_request();
        request.timezone = Some("   ".into());
        let body = service().invitee_body(&request);
        assert_eq!(body.timezone, "Africa/Douala");
    }

    #[test]
    fn explicit_timezone_is_kept() {
        let mut request = sample_request();
        request.timezone = Some("Europe/Paris".into());
        let body = service().invitee_body(&request);
        assert_eq!(body.timezone, "Europe/Paris");
    }

    #[test]
    fn invitee_body_serialization_shape() {
        let mut request = sample_request();
        request.first_name = None;
        request.last_name = None;
        let json = serde_json::to_value(service().invitee_body(&request)).unwrap();

        assert_eq!(json["timezone"], "Africa/Douala");
        assert_eq!(
            json["questions_and_answers"][0]["question"],
            "Type de consultation"
        );
        assert!(json.get("first_name").is_none());
        assert!(json.get("last_name").is_none());
    }

    #[test]
    fn invitee_request_requires_valid_email_and_start_time() {
        let mut request = sample_request();
        request.email = "nope".into();
        assert!(request.validate().is_err());

        let mut request = sample_request();
        request.start_time = "".into();
        assert!(request.validate().is_err());
    }
}
