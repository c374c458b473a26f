//! OpenAPI documentation for the public HTTP surface.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::handlers::availability::AvailabilityResponse;
use crate::handlers::bookings::{BookingRequest, BookingResponse};
use crate::handlers::common::{FormAccepted, FormFailed, FormRejected};
use crate::handlers::devis::{DevisRequest, NonAssociateManager};
use crate::handlers::newsletter::{SubscribeAccepted, SubscribeError, SubscribeRequest};
use crate::handlers::payment_webhooks::WebhookAck;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fiducia Consulting API",
        description = r#"
Backend for the Fiducia Consulting website.

The service owns no durable state: it validates and reshapes inbound
requests, then coordinates the commerce backend (orders), the payment
gateway (checkout and webhooks), the scheduling service (availability and
bookings), the CMS contact-form plugin and the mailing-list provider.

All endpoints are public website endpoints; there is no authenticated
surface. The payment webhook optionally verifies an HMAC-SHA256 signature
when a webhook secret is configured.
        "#,
        contact(
            name = "Fiducia Consulting",
            email = "dev@fiducia-consulting.cm",
            url = "https://www.fiducia-consulting.cm"
        ),
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        crate::handlers::health::health_check,
        crate::handlers::availability::get_availability,
        crate::handlers::bookings::create_booking,
        crate::handlers::payment_webhooks::payment_webhook,
        crate::handlers::contact::submit_contact,
        crate::handlers::devis::submit_devis,
        crate::handlers::newsletter::subscribe,
    ),
    components(schemas(
        ErrorResponse,
        AvailabilityResponse,
        BookingRequest,
        BookingResponse,
        WebhookAck,
        FormAccepted,
        FormRejected,
        FormFailed,
        DevisRequest,
        NonAssociateManager,
        SubscribeRequest,
        SubscribeAccepted,
        SubscribeError,
    )),
    tags(
        (name = "Health", description = "Liveness probe"),
        (name = "Availability", description = "Consultation slot lookup"),
        (name = "Bookings", description = "Consultation booking"),
        (name = "Webhooks", description = "Payment gateway callbacks"),
        (name = "Forms", description = "Contact and quote form relays"),
        (name = "Newsletter", description = "Mailing-list subscription")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/swagger-ui`, serving the spec from
/// `/api-docs/openapi.json`.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_public_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for route in [
            "/health",
            "/availability",
            "/bookings/create",
            "/webhooks/notch",
            "/contact",
            "/devis",
            "/newsletter/subscribe",
        ] {
            assert!(paths.contains(&route), "missing route {}", route);
        }
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("Fiducia Consulting API"));
    }
}
