use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::calendly::{CreateInviteeRequest, QuestionAnswer};
use crate::services::commerce::{meta_keys, BillingInfo, MetaDataEntry, NewOrder, OrderStatus};
use crate::services::notchpay::{payment_reference, InitializePaymentRequest};

/// Consultation request as submitted by the booking form
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    /// Consultation type label, e.g. "Conseil fiscal"
    pub consultation_type: Option<String>,
    /// Display date shown to the client
    pub selected_date: Option<String>,
    /// Display time shown to the client
    pub selected_time: Option<String>,
    /// Authoritative slot start (RFC 3339); wins over the display pair
    pub slot_start_time: Option<String>,
    pub timezone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    /// Free consultations are booked immediately; paid ones go through checkout
    #[serde(default)]
    pub is_free: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum BookingResponse {
    /// Free consultation, booked synchronously
    Free { success: bool, order_id: i64 },
    /// Paid consultation; the client must be redirected to the checkout page
    Paid { payment_url: String, order_id: i64 },
}

/// Book a consultation.
///
/// Creates a commerce order carrying the booking details as metadata, then
/// either books the calendar slot directly (free consultations) or initializes
/// a payment and returns the checkout URL (paid consultations, fulfilled later
/// by the payment webhook).
#[utoipa::path(
    post,
    path = "/bookings/create",
    request_body = BookingRequest,
    responses(
        (status = 200, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Missing required fields", body = crate::errors::ErrorResponse),
        (status = 500, description = "A downstream service failed", body = crate::errors::ErrorResponse)
    ),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<Json<BookingResponse>, ServiceError> {
    let missing = missing_fields(&request);
    if !missing.is_empty() {
        return Err(ServiceError::validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let email = request.email.clone().unwrap_or_default();
    let consultation_type = request.consultation_type.clone().unwrap_or_default();
    let start_time = resolve_start_time(&request);

    let product_id = if request.is_free {
        state.config.consultation.free_product_id
    } else {
        state.config.consultation.paid_product_id
    };

    let order = state
        .services
        .commerce
        .create_order(&NewOrder {
            billing: BillingInfo {
                first_name: request.first_name.clone().unwrap_or_default(),
                last_name: request.last_name.clone().unwrap_or_default(),
                email: email.clone(),
                phone: request.phone.clone().unwrap_or_default(),
            },
            product_id,
            meta_data: build_order_meta(&request, &start_time),
        })
        .await?;
    info!(
        order_id = order.id,
        is_free = request.is_free,
        "consultation order created"
    );

    if request.is_free {
        let booking = async {
            let user_uri = state.services.calendly.get_user_uri().await?;
            let invitee = CreateInviteeRequest {
                event_type: state.config.scheduling.free_event_type.clone(),
                user: user_uri,
                email: email.clone(),
                name: invitee_name(
                    request.first_name.as_deref().unwrap_or_default(),
                    request.last_name.as_deref().unwrap_or_default(),
                    &email,
                ),
                first_name: request.first_name.clone().filter(|v| !v.trim().is_empty()),
                last_name: request.last_name.clone().filter(|v| !v.trim().is_empty()),
                timezone: request.timezone.clone().filter(|v| !v.trim().is_empty()),
                start_time: start_time.clone(),
                questions_and_answers: consultation_questions(
                    &consultation_type,
                    request.message.as_deref(),
                ),
            };
            state.services.calendly.create_invitee(&invitee).await
        }
        .await;

        return match booking {
            Ok(_) => {
                state
                    .services
                    .commerce
                    .update_order_status(order.id, OrderStatus::Completed)
                    .await?;
                Ok(Json(BookingResponse::Free {
                    success: true,
                    order_id: order.id,
                }))
            }
            Err(error) => {
                // Compensation is best-effort; its own failure is logged, not returned.
                if let Err(update_error) = state
                    .services
                    .commerce
                    .update_order_status(order.id, OrderStatus::Failed)
                    .await
                {
                    warn!(
                        order_id = order.id,
                        error = %update_error,
                        "could not mark order failed after booking failure"
                    );
                }
                Err(error)
            }
        };
    }

    let payment = state
        .services
        .notchpay
        .initialize_payment(&InitializePaymentRequest {
            email,
            amount: state.config.consultation.paid_price,
            currency: state.config.payment.currency.clone(),
            reference: payment_reference(order.id),
            description: format!("Consultation: {}", consultation_type),
            callback_url: callback_url(&state.config.frontend_url, order.id),
        })
        .await?;

    Ok(Json(BookingResponse::Paid {
        payment_url: payment.authorization_url,
        order_id: order.id,
    }))
}

fn missing_fields(request: &BookingRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    let mut require = |value: &Option<String>, name: &'static str| {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            missing.push(name);
        }
    };
    require(&request.consultation_type, "consultationType");
    require(&request.selected_date, "selectedDate");
    require(&request.selected_time, "selectedTime");
    require(&request.email, "email");
    missing
}

/// The explicit slot time is authoritative; the display date+time pair may be
/// ambiguous across timezones and serves only as a fallback.
fn resolve_start_time(request: &BookingRequest) -> String {
    request
        .slot_start_time
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{} {}",
                request.selected_date.as_deref().unwrap_or_default().trim(),
                request.selected_time.as_deref().unwrap_or_default().trim()
            )
        })
}

/// Booking details attached to the order; the webhook reads these back to
/// fulfill paid consultations, so keys and order are fixed.
fn build_order_meta(request: &BookingRequest, start_time: &str) -> Vec<MetaDataEntry> {
    vec![
        MetaDataEntry::new(
            meta_keys::CONSULTATION_TYPE,
            request.consultation_type.clone().unwrap_or_default(),
        ),
        MetaDataEntry::new(
            meta_keys::SELECTED_DATE,
            request.selected_date.clone().unwrap_or_default(),
        ),
        MetaDataEntry::new(
            meta_keys::SELECTED_TIME,
            request.selected_time.clone().unwrap_or_default(),
        ),
        MetaDataEntry::new(
            meta_keys::CLIENT_MESSAGE,
            request.message.clone().unwrap_or_default(),
        ),
        MetaDataEntry::new(meta_keys::CALENDLY_START_TIME, start_time),
        MetaDataEntry::new(
            meta_keys::INVITEE_TIMEZONE,
            request.timezone.clone().unwrap_or_default(),
        ),
    ]
}

fn callback_url(frontend_url: &str, order_id: i64) -> String {
    format!(
        "{}/paiement/confirmation?order={}",
        frontend_url.trim_end_matches('/'),
        order_id
    )
}

/// Custom questions shown on the calendar booking, in the site's language.
pub(crate) fn consultation_questions(
    consultation_type: &str,
    message: Option<&str>,
) -> Vec<QuestionAnswer> {
    let mut questions = vec![QuestionAnswer {
        question: "Type de consultation".to_string(),
        answer: consultation_type.to_string(),
    }];
    if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
        questions.push(QuestionAnswer {
            question: "Message".to_string(),
            answer: message.to_string(),
        });
    }
    questions
}

pub(crate) fn invitee_name(first_name: &str, last_name: &str, email: &str) -> String {
    let name = format!("{} {}", first_name.trim(), last_name.trim());
    let name = name.trim();
    if name.is_empty() {
        email.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> BookingRequest {
        BookingRequest {
            consultation_type: Some("Conseil fiscal".into()),
            selected_date: Some("2025-04-02".into()),
            selected_time: Some("10:00".into()),
            slot_start_time: Some("2025-04-02T09:00:00Z".into()),
            timezone: Some("Africa/Douala".into()),
            first_name: Some("Jean".into()),
            last_name: Some("Mbarga".into()),
            email: Some("jean@example.com".into()),
            phone: Some("+237600000000".into()),
            message: Some("Première consultation".into()),
            is_free: true,
        }
    }

    #[test]
    fn complete_request_has_no_missing_fields() {
        assert!(missing_fields(&sample_request()).is_empty());
    }

    #[test]
    fn missing_fields_are_reported_by_client_name() {
        let mut request = sample_request();
        request.consultation_type = None;
        request.selected_time = Some("   ".into());
        request.email = None;

        assert_eq!(
            missing_fields(&request),
            vec!["consultationType", "selectedTime", "email"]
        );
    }

    #[test]
    fn explicit_slot_time_wins_over_display_pair() {
        let request = sample_request();
        assert_eq!(resolve_start_time(&request), "2025-04-02T09:00:00Z");
    }

    #[test]
    fn display_pair_is_the_fallback_start_time() {
        let mut request = sample_request();
        request.slot_start_time = None;
        assert_eq!(resolve_start_time(&request), "2025-04-02 10:00");

        request.slot_start_time = Some("  ".into());
        assert_eq!(resolve_start_time(&request), "2025-04-02 10:00");
    }

    #[test]
    fn order_meta_keeps_the_agreed_keys_in_order() {
        let request = sample_request();
        let meta = build_order_meta(&request, "2025-04-02T09:00:00Z");

        let keys: Vec<&str> = meta.iter().map(|entry| entry.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "consultation_type",
                "selected_date",
                "selected_time",
                "client_message",
                "calendly_start_time",
                "invitee_timezone",
            ]
        );
        assert_eq!(
            meta[4].value.as_str(),
            Some("2025-04-02T09:00:00Z"),
            "start time entry carries the resolved value"
        );
    }

    #[test]
    fn callback_url_points_at_the_confirmation_page() {
        assert_eq!(
            callback_url("https://www.fiducia-consulting.cm", 87),
            "https://www.fiducia-consulting.cm/paiement/confirmation?order=87"
        );
        assert_eq!(
            callback_url("https://www.fiducia-consulting.cm/", 87),
            "https://www.fiducia-consulting.cm/paiement/confirmation?order=87"
        );
    }

    #[test]
    fn questions_include_the_message_only_when_present() {
        let questions = consultation_questions("Conseil fiscal", Some("Bonjour"));
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question, "Type de consultation");
        assert_eq!(questions[0].answer, "Conseil fiscal");
        assert_eq!(questions[1].question, "Message");

        let questions = consultation_questions("Conseil fiscal", Some("   "));
        assert_eq!(questions.len(), 1);

        let questions = consultation_questions("Conseil fiscal", None);
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn invitee_name_falls_back_to_the_email() {
        assert_eq!(invitee_name("Jean", "Mbarga", "j@x.cm"), "Jean Mbarga");
        assert_eq!(invitee_name("Jean", "", "j@x.cm"), "Jean");
        assert_eq!(invitee_name("", "", "j@x.cm"), "j@x.cm");
    }
}
