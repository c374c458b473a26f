use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "XAF";
const DEFAULT_SCHEDULING_API_URL: &str = "https://api.calendly.com";
const DEFAULT_TIMEZONE: &str = "Africa/Douala";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Commerce backend credentials (order storage)
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CommerceConfig {
    /// Base URL of the commerce REST API, e.g. "https://shop.example.com/wp-json/wc/v3"
    #[validate(url)]
    pub api_url: String,

    /// REST API consumer key
    #[validate(length(min = 1))]
    pub consumer_key: String,

    /// REST API consumer secret
    #[validate(length(min = 1))]
    pub consumer_secret: String,
}

/// Payment gateway credentials
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PaymentConfig {
    /// Base URL of the gateway API
    #[validate(url)]
    pub api_url: String,

    /// Public key, sent when initializing payments
    #[validate(length(min = 1))]
    pub public_key: String,

    /// Private key, sent when verifying payments
    #[validate(length(min = 1))]
    pub private_key: String,

    /// Currency code for all payments
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Shared secret for verifying inbound webhook signatures.
    /// When unset, webhook signatures are not verified.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Scheduling service credentials and event-type selection
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SchedulingConfig {
    /// Base URL of the scheduling API
    #[serde(default = "default_scheduling_api_url")]
    #[validate(url)]
    pub api_url: String,

    /// Personal access token
    #[validate(length(min = 1))]
    pub api_token: String,

    /// Event-type URI booked for free consultations
    #[validate(url)]
    pub free_event_type: String,

    /// Event-type URI booked for paid consultations
    #[validate(url)]
    pub paid_event_type: String,

    /// Timezone applied to invitees that do not supply one
    #[serde(default = "default_timezone")]
    #[validate(length(min = 1))]
    pub default_timezone: String,
}

/// Consultation products sold through the commerce backend
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ConsultationConfig {
    /// Product id attached to free consultation orders
    pub free_product_id: i64,

    /// Product id attached to paid consultation orders
    pub paid_product_id: i64,

    /// Flat price charged for a paid consultation, in major currency units
    #[validate(range(min = 1))]
    pub paid_price: u64,
}

/// CMS contact-form plugin endpoints
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FormsConfig {
    /// Base URL of the plugin REST API, e.g.
    /// "https://cms.example.com/wp-json/contact-form-7/v1"
    #[validate(url)]
    pub api_url: String,

    /// Numeric id of the contact form
    pub contact_form_id: u64,

    /// Numeric id of the quote (devis) form
    pub devis_form_id: u64,
}

/// Mailing-list provider credentials
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MailingConfig {
    /// API key
    #[validate(length(min = 1))]
    pub api_key: String,

    /// Audience/list id subscribers are upserted into
    #[validate(length(min = 1))]
    pub list_id: String,

    /// Datacenter prefix, e.g. "us14"
    #[validate(custom = "validate_server_prefix")]
    pub server_prefix: String,

    /// Full base URL override; when unset, derived from `server_prefix`
    #[serde(default)]
    #[validate(url)]
    pub api_url: Option<String>,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Base URL of the public website; payment redirects land on a page
    /// under this URL
    #[validate(url)]
    pub frontend_url: String,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// Timeout (seconds) applied to every outbound HTTP call
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[validate]
    pub commerce: CommerceConfig,

    #[validate]
    pub payment: PaymentConfig,

    #[validate]
    pub scheduling: SchedulingConfig,

    #[validate]
    pub consultation: ConsultationConfig,

    #[validate]
    pub forms: FormsConfig,

    #[validate]
    pub mailing: MailingConfig,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Timeout applied to outbound HTTP clients
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }

    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if self.scheduling.free_event_type == self.scheduling.paid_event_type {
            let mut err = ValidationError::new("event_types_identical");
            err.message = Some(
                "SCHEDULING__FREE_EVENT_TYPE and SCHEDULING__PAID_EVENT_TYPE must point at different event types".into(),
            );
            errors.add("scheduling", err);
        }

        if self.consultation.free_product_id == self.consultation.paid_product_id {
            let mut err = ValidationError::new("product_ids_identical");
            err.message = Some(
                "CONSULTATION__FREE_PRODUCT_ID and CONSULTATION__PAID_PRODUCT_ID must differ"
                    .into(),
            );
            errors.add("consultation", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_scheduling_api_url() -> String {
    DEFAULT_SCHEDULING_API_URL.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Datacenter prefixes are short alphanumeric tokens like "us14"
fn validate_server_prefix(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.len() >= 2 && trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("server_prefix");
        err.message = Some("Must be an alphanumeric datacenter prefix such as \"us14\"".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("fiducia_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Docker config (config/docker.toml) if DOCKER env var is set
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let mut builder = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    if env::var("DOCKER").is_ok() {
        info!("Docker environment detected");
        builder =
            builder.add_source(File::with_name(&format!("{}/docker", CONFIG_DIR)).required(false));
    }

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Check the gateway key up front to give operators a clear message for the
    // most common misconfiguration
    if config.get_string("payment.public_key").is_err() {
        error!("Payment gateway public key is not configured. Set the APP__PAYMENT__PUBLIC_KEY environment variable.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "payment.public_key is required but not configured. Set APP__PAYMENT__PUBLIC_KEY."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration consistency validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
