use std::collections::BTreeMap;

use axum::{extract::State, response::Response, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::common::{
    client_field_name, form_failed, form_outcome_response, form_rejected, is_valid_email,
    MSG_INVALID_EMAIL, MSG_REQUIRED,
};
use crate::handlers::AppState;

/// Client field name → CMS plugin form tag for the quote form.
const FIELD_TAGS: &[(&str, &str)] = &[
    ("companyType", "company-type"),
    ("companyName", "company-name"),
    ("businessActivity", "business-activity"),
    ("shareCapital", "share-capital"),
    ("headquartersCity", "headquarters-city"),
    ("hasPhysicalOffice", "physical-office"),
    ("urgentProcessing", "urgent-processing"),
    ("additionalServices", "additional-services"),
    ("fullName", "full-name"),
    ("email", "your-email"),
    ("phone", "your-phone"),
    ("message", "your-message"),
];

/// Client-side service keys → the option values configured on the plugin's
/// checkbox. Several keys collapse onto the plugin's catch-all option, so the
/// flattened list is deduplicated.
const SERVICE_OPTIONS: &[(&str, &str)] = &[
    ("domiciliation", "Domiciliation"),
    ("accounting", "Accounting"),
    ("taxRegistration", "Tax registration"),
    ("bankAccount", "Bank account opening"),
    ("trademark", "Other"),
    ("contracts", "Other"),
];

/// The quote form shows at most this many non-associate manager blocks;
/// extra entries are dropped.
const MAX_MANAGERS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NonAssociateManager {
    pub full_name: String,
    #[serde(default)]
    pub nationality: Option<String>,
}

/// Quote request for company-creation services
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DevisRequest {
    /// Legal form, e.g. "SARL"
    pub company_type: Option<String>,
    pub company_name: Option<String>,
    pub business_activity: Option<String>,
    pub share_capital: Option<String>,
    pub headquarters_city: Option<String>,
    pub has_physical_office: bool,
    pub urgent_processing: bool,
    /// Managers who are not associates; at most three are forwarded
    pub non_associate_managers: Vec<NonAssociateManager>,
    /// Keys from [`SERVICE_OPTIONS`]; unknown keys are forwarded verbatim
    pub additional_services: Vec<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
}

/// Submit the quote (devis) form.
///
/// Reshapes the structured request into the CMS plugin's flat field scheme:
/// booleans become the literal strings `Yes`/`No`, the service checkboxes
/// become deduplicated `additional-services[]` entries, and the manager
/// blocks become indexed fields.
#[utoipa::path(
    post,
    path = "/devis",
    request_body = DevisRequest,
    responses(
        (status = 200, description = "Quote request sent", body = crate::handlers::common::FormAccepted),
        (status = 422, description = "One or more fields were rejected", body = crate::handlers::common::FormRejected),
        (status = 500, description = "The quote request could not be delivered", body = crate::handlers::common::FormFailed)
    ),
    tag = "Forms"
)]
pub async fn submit_devis(
    State(state): State<AppState>,
    Json(request): Json<DevisRequest>,
) -> Result<Response, ServiceError> {
    let errors = validate_devis(&request);
    if !errors.is_empty() {
        debug!(rejected = errors.len(), "devis form rejected locally");
        return Ok(form_rejected(errors));
    }

    let outcome = state
        .services
        .forms
        .submit_feedback(state.config.forms.devis_form_id, relay_fields(&request), None)
        .await;

    match outcome {
        Ok(outcome) => Ok(form_outcome_response(outcome, |tag| {
            client_field_name(FIELD_TAGS, tag)
        })),
        Err(error) => {
            warn!(%error, "devis form relay failed");
            Ok(form_failed())
        }
    }
}

fn validate_devis(request: &DevisRequest) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let mut require = |value: &Option<String>, name: &str| {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            errors.insert(name.to_string(), MSG_REQUIRED.to_string());
        }
    };

    require(&request.company_type, "companyType");
    require(&request.company_name, "companyName");
    require(&request.full_name, "fullName");
    require(&request.email, "email");

    if let Some(email) = request.email.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        if !is_valid_email(email) {
            errors.insert("email".to_string(), MSG_INVALID_EMAIL.to_string());
        }
    }

    errors
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Flattens the selected service keys into the plugin's checkbox values,
/// dropping duplicates while keeping the first occurrence's position.
fn flatten_services(selected: &[String]) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for key in selected {
        let value = SERVICE_OPTIONS
            .iter()
            .find(|(client, _)| client == key)
            .map(|(_, option)| (*option).to_string())
            .unwrap_or_else(|| key.clone());
        if !values.contains(&value) {
            values.push(value);
        }
    }
    values
}

fn relay_fields(request: &DevisRequest) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let push_text = |fields: &mut Vec<(String, String)>, tag: &str, value: &Option<String>| {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            fields.push((tag.to_string(), value.to_string()));
        }
    };

    push_text(&mut fields, "company-type", &request.company_type);
    push_text(&mut fields, "company-name", &request.company_name);
    push_text(&mut fields, "business-activity", &request.business_activity);
    push_text(&mut fields, "share-capital", &request.share_capital);
    push_text(&mut fields, "headquarters-city", &request.headquarters_city);

    fields.push((
        "physical-office".to_string(),
        yes_no(request.has_physical_office).to_string(),
    ));
    fields.push((
        "urgent-processing".to_string(),
        yes_no(request.urgent_processing).to_string(),
    ));

    if request.non_associate_managers.len() > MAX_MANAGERS {
        debug!(
            submitted = request.non_associate_managers.len(),
            kept = MAX_MANAGERS,
            "dropping extra non-associate managers"
        );
    }
    for (index, manager) in request
        .non_associate_managers
        .iter()
        .take(MAX_MANAGERS)
        .enumerate()
    {
        let slot = index + 1;
        fields.push((format!("manager-{}-name", slot), manager.full_name.clone()));
        if let Some(nationality) = manager
            .nationality
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            fields.push((format!("manager-{}-nationality", slot), nationality.to_string()));
        }
    }

    for value in flatten_services(&request.additional_services) {
        fields.push(("additional-services[]".to_string(), value));
    }

    push_text(&mut fields, "full-name", &request.full_name);
    push_text(&mut fields, "your-email", &request.email);
    push_text(&mut fields, "your-phone", &request.phone);
    push_text(&mut fields, "your-message", &request.message);

    fields
}
