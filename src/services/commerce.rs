use crate::{config::CommerceConfig, errors::ServiceError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

/// Metadata keys attached to consultation orders.
///
/// The bag is the only channel carrying booking details between order
/// creation and webhook fulfillment, so the two sides must agree on these
/// names exactly.
pub mod meta_keys {
    pub const CONSULTATION_TYPE: &str = "consultation_type";
    pub const SELECTED_DATE: &str = "selected_date";
    pub const SELECTED_TIME: &str = "selected_time";
    pub const CLIENT_MESSAGE: &str = "client_message";
    pub const CALENDLY_START_TIME: &str = "calendly_start_time";
    pub const INVITEE_TIMEZONE: &str = "invitee_timezone";
}

/// Order lifecycle states the commerce backend understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// Billing snapshot stored on the order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BillingInfo {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// One key/value pair in the order's metadata bag.
///
/// The bag is an ordered array on the wire, not a map; entry order is
/// preserved end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaDataEntry {
    pub key: String,
    pub value: serde_json::Value,
}

impl MetaDataEntry {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            value: serde_json::Value::String(value.into()),
        }
    }
}

/// Input for creating a consultation order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub billing: BillingInfo,
    pub product_id: i64,
    pub meta_data: Vec<MetaDataEntry>,
}

#[derive(Debug, Serialize)]
struct LineItem {
    product_id: i64,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    payment_method: &'static str,
    payment_method_title: &'static str,
    set_paid: bool,
    billing: &'a BillingInfo,
    line_items: Vec<LineItem>,
    meta_data: &'a [MetaDataEntry],
}

/// Order as returned by the commerce backend.
///
/// A response without an `id` is a contract violation and fails
/// deserialization, which callers see as an integration error.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: i64,
    pub status: String,
    pub billing: BillingInfo,
    #[serde(default)]
    pub meta_data: Vec<MetaDataEntry>,
}

impl Order {
    pub fn has_status(&self, status: OrderStatus) -> bool {
        self.status.eq_ignore_ascii_case(&status.to_string())
    }

    /// Looks up a string metadata value by key; first match wins.
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta_data
            .iter()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.value.as_str())
    }
}

#[derive(Debug, Serialize)]
struct UpdateStatusBody {
    status: OrderStatus,
}

/// Client for the commerce backend's order REST API
#[derive(Clone)]
pub struct CommerceService {
    client: reqwest::Client,
    config: CommerceConfig,
}

impl CommerceService {
    pub fn new(client: reqwest::Client, config: CommerceConfig) -> Self {
        Self { client, config }
    }

    /// Creates a pending order carrying the booking metadata bag.
    #[instrument(skip(self, order), fields(product_id = order.product_id))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, ServiceError> {
        let url = format!("{}/orders", self.config.api_url);
        let body = CreateOrderBody {
            payment_method: "notchpay",
            payment_method_title: "Notch Pay",
            set_paid: false,
            billing: &order.billing,
            line_items: vec![LineItem {
                product_id: order.product_id,
                quantity: 1,
            }],
            meta_data: &order.meta_data,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "order creation request failed");
                ServiceError::integration("commerce", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "order creation rejected");
            return Err(ServiceError::integration(
                "commerce",
                format!("order creation returned {}", status),
            ));
        }

        let created: Order = response.json().await.map_err(|e| {
            error!(error = %e, "order creation response did not match contract");
            ServiceError::integration("commerce", format!("invalid order response: {}", e))
        })?;

        info!(order_id = created.id, "order created");
        Ok(created)
    }

    /// Fetches an order by id, including its metadata bag.
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i64) -> Result<Order, ServiceError> {
        let url = format!("{}/orders/{}", self.config.api_url, order_id);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "order fetch request failed");
                ServiceError::integration("commerce", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, order_id, "order fetch rejected");
            return Err(ServiceError::integration(
                "commerce",
                format!("order {} fetch returned {}", order_id, status),
            ));
        }

        response.json().await.map_err(|e| {
            error!(error = %e, order_id, "order response did not match contract");
            ServiceError::integration("commerce", format!("invalid order response: {}", e))
        })
    }

    /// Overwrites the order's status field, leaving everything else untouched.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<(), ServiceError> {
        let url = format!("{}/orders/{}", self.config.api_url, order_id);

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .json(&UpdateStatusBody { status })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, order_id, "order status update request failed");
                ServiceError::integration("commerce", e.to_string())
            })?;

        let http_status = response.status();
        if !http_status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%http_status, %detail, order_id, "order status update rejected");
            return Err(ServiceError::integration(
                "commerce",
                format!("order {} status update returned {}", order_id, http_status),
            ));
        }

        info!(order_id, %status, "order status updated");
        Ok(())
    }
}
