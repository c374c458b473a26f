//! Fiducia API Library
//!
//! Backend for the Fiducia Consulting website. The service owns no durable
//! state of its own: it validates and reshapes inbound requests, then
//! coordinates the commerce backend, payment gateway, scheduling service,
//! CMS form plugin and mailing-list provider that do.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod openapi;
pub mod services;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

/// Multipart uploads carry a 2MB attachment plus text fields; the transport
/// limit leaves headroom so the attachment rule can answer with a field
/// error instead of a connection abort.
const MAX_FORM_BODY_BYTES: usize = 4 * 1024 * 1024;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: config::AppConfig) -> Result<Self, errors::ServiceError> {
        let services = handlers::AppServices::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            services,
            started_at: Instant::now(),
        })
    }
}

/// All public routes. Layers (tracing, CORS, compression, request ids) are
/// applied by the binary; tests drive this router directly.
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/", get(service_banner))
        .route("/health", get(handlers::health::health_check))
        .route("/availability", get(handlers::availability::get_availability))
        .route("/bookings/create", post(handlers::bookings::create_booking))
        .route(
            "/webhooks/notch",
            post(handlers::payment_webhooks::payment_webhook),
        )
        .route(
            "/contact",
            post(handlers::contact::submit_contact)
                .layer(DefaultBodyLimit::max(MAX_FORM_BODY_BYTES)),
        )
        .route("/devis", post(handlers::devis::submit_devis))
        .route("/newsletter/subscribe", post(handlers::newsletter::subscribe))
}

async fn service_banner() -> &'static str {
    concat!("fiducia-api ", env!("CARGO_PKG_VERSION"))
}
