use crate::{config::PaymentConfig, errors::ServiceError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use validator::Validate;

/// Builds the merchant reference linking a payment to an order.
///
/// The order id must survive a round trip through the gateway: the webhook
/// recovers it by splitting the echoed reference on `-`.
pub fn payment_reference(order_id: i64) -> String {
    format!("WC-{}-{}", order_id, Utc::now().timestamp_millis())
}

/// Recovers the order id from a merchant reference, if it has the
/// `WC-{orderId}-...` shape.
pub fn order_id_from_reference(reference: &str) -> Option<i64> {
    let mut parts = reference.split('-');
    if parts.next() != Some("WC") {
        return None;
    }
    parts.next()?.parse().ok()
}

/// Input for initializing a payment
#[derive(Debug, Clone, Serialize, Validate)]
pub struct InitializePaymentRequest {
    #[validate(email)]
    pub email: String,
    /// Flat amount in major currency units; the gateway applies no conversion
    #[validate(range(min = 1))]
    pub amount: u64,
    pub currency: String,
    #[validate(length(min = 1))]
    pub reference: String,
    pub description: String,
    /// Page the payer is redirected to after checkout
    #[serde(rename = "callback")]
    #[validate(url)]
    pub callback_url: String,
}

/// Gateway response to a payment initialization
#[derive(Debug, Clone, Deserialize)]
pub struct InitializedPayment {
    /// Hosted checkout page the caller must redirect the payer to
    pub authorization_url: String,
}

/// Client for the payment gateway's initialization/verification API
#[derive(Clone)]
pub struct NotchPayService {
    client: reqwest::Client,
    config: PaymentConfig,
}

impl NotchPayService {
    pub fn new(client: reqwest::Client, config: PaymentConfig) -> Self {
        Self { client, config }
    }

    /// Creates a payment and returns the hosted checkout URL.
    /// Authenticates with the public key.
    #[instrument(skip(self, request), fields(reference = %request.reference))]
    pub async fn initialize_payment(
        &self,
        request: &InitializePaymentRequest,
    ) -> Result<InitializedPayment, ServiceError> {
        request.validate()?;

        let url = format!("{}/payments/initialize", self.config.api_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.config.public_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "payment initialization request failed");
                ServiceError::integration("payment", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "payment initialization rejected");
            return Err(ServiceError::integration(
                "payment",
                format!("payment initialization returned {}", status),
            ));
        }

        let payment: InitializedPayment = response.json().await.map_err(|e| {
            error!(error = %e, "payment initialization response did not match contract");
            ServiceError::integration("payment", format!("invalid payment response: {}", e))
        })?;

        info!(
            authorization_url = %payment.authorization_url,
            "payment initialized"
        );
        Ok(payment)
    }

    /// Fetches the gateway's view of a payment by merchant reference.
    /// Authenticates with the private key. The payload is returned as-is;
    /// this service does not interpret gateway transaction fields.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        reference: &str,
    ) -> Result<serde_json::Value, ServiceError> {
        let url = format!("{}/payments/{}", self.config.api_url, reference);
        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.config.private_key)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, reference, "payment verification request failed");
                ServiceError::integration("payment", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, reference, "payment verification rejected");
            return Err(ServiceError::integration(
                "payment",
                format!("payment verification returned {}", status),
            ));
        }

        response.json().await.map_err(|e| {
            error!(error = %e, reference, "payment verification response was not JSON");
            ServiceError::integration("payment", format!("invalid verification response: {}", e))
        })
    }
}
