pub mod availability;
pub mod bookings;
pub mod common;
pub mod contact;
pub mod devis;
pub mod health;
pub mod newsletter;
pub mod payment_webhooks;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::services::{
    calendly::CalendlyService, commerce::CommerceService, forms::FormRelayService,
    mailing::MailingService, notchpay::NotchPayService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Upstream clients shared by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub commerce: Arc<CommerceService>,
    pub notchpay: Arc<NotchPayService>,
    pub calendly: Arc<CalendlyService>,
    pub forms: Arc<FormRelayService>,
    pub mailing: Arc<MailingService>,
}

impl AppServices {
    /// Build the service container. All clients share one connection pool
    /// and the configured outbound timeout.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| {
                ServiceError::configuration(format!("could not build HTTP client: {}", e))
            })?;

        Ok(Self {
            commerce: Arc::new(CommerceService::new(
                client.clone(),
                config.commerce.clone(),
            )),
            notchpay: Arc::new(NotchPayService::new(client.clone(), config.payment.clone())),
            calendly: Arc::new(CalendlyService::new(
                client.clone(),
                config.scheduling.clone(),
            )),
            forms: Arc::new(FormRelayService::new(client.clone(), config.forms.clone())),
            mailing: Arc::new(MailingService::new(client, config.mailing.clone())),
        })
    }
}
