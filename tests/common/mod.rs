#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use fiducia_api::{
    config::{
        AppConfig, CommerceConfig, ConsultationConfig, FormsConfig, MailingConfig, PaymentConfig,
        SchedulingConfig,
    },
    AppState,
};

pub const FREE_EVENT_TYPE: &str = "https://api.calendly.com/event_types/FREE";
pub const PAID_EVENT_TYPE: &str = "https://api.calendly.com/event_types/PAID";
pub const CONTACT_FORM_ID: u64 = 7;
pub const DEVIS_FORM_ID: u64 = 9;
pub const LIST_ID: &str = "list123";

/// The full application router wired to one mock server per upstream.
///
/// Requests are driven in-process with `oneshot`; the mock servers are the
/// only network endpoints involved.
pub struct TestApp {
    pub commerce: MockServer,
    pub payment: MockServer,
    pub scheduling: MockServer,
    pub forms: MockServer,
    pub mailing: MockServer,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawns the app with a hook for adjusting the configuration before the
    /// state is built (e.g. setting a webhook secret).
    pub async fn spawn_with(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let commerce = MockServer::start().await;
        let payment = MockServer::start().await;
        let scheduling = MockServer::start().await;
        let forms = MockServer::start().await;
        let mailing = MockServer::start().await;

        let mut config = AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            environment: "development".into(),
            log_level: "info".into(),
            log_json: false,
            frontend_url: "https://www.fiducia-consulting.cm".into(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            http_timeout_secs: 5,
            commerce: CommerceConfig {
                api_url: commerce.uri(),
                consumer_key: "ck_test".into(),
                consumer_secret: "cs_test".into(),
            },
            payment: PaymentConfig {
                api_url: payment.uri(),
                public_key: "pk_test".into(),
                private_key: "sk_test".into(),
                currency: "XAF".into(),
                webhook_secret: None,
            },
            scheduling: SchedulingConfig {
                api_url: scheduling.uri(),
                api_token: "sched_token".into(),
                free_event_type: FREE_EVENT_TYPE.into(),
                paid_event_type: PAID_EVENT_TYPE.into(),
                default_timezone: "Africa/Douala".into(),
            },
            consultation: ConsultationConfig {
                free_product_id: 101,
                paid_product_id: 102,
                paid_price: 25_000,
            },
            forms: FormsConfig {
                api_url: forms.uri(),
                contact_form_id: CONTACT_FORM_ID,
                devis_form_id: DEVIS_FORM_ID,
            },
            mailing: MailingConfig {
                api_key: "key-us14".into(),
                list_id: LIST_ID.into(),
                server_prefix: "us14".into(),
                api_url: Some(mailing.uri()),
            },
        };
        tweak(&mut config);

        let state = AppState::new(config).expect("failed to build test app state");

        Self {
            commerce,
            payment,
            scheduling,
            forms,
            mailing,
            state,
        }
    }

    pub fn router(&self) -> Router {
        fiducia_api::app_router().with_state(self.state.clone())
    }

    /// Sends a request and returns the status plus the parsed JSON body
    /// (`Value::Null` when the body is empty or not JSON).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router error during test request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&body).expect("failed to serialize request body"),
            ))
            .expect("failed to build request");
        self.send(request).await
    }

    /// Raw POST for webhook payloads, with optional extra headers.
    pub async fn post_raw(
        &self,
        uri: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body)).expect("failed to build request");
        self.send(request).await
    }

    /// Multipart POST for the contact form.
    pub async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> (StatusCode, Value) {
        let boundary = "fiducia-test-boundary";
        let body = multipart_body(boundary, fields, file);
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .expect("failed to build request");
        self.send(request).await
    }
}

/// Builds a multipart/form-data body with text fields and an optional
/// `file` part (file name + bytes, sent as application/pdf).
pub fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

/// Commerce backend order payload as the mocks return it.
pub fn order_json(id: i64, status: &str, meta: &[(&str, &str)]) -> Value {
    let meta_data: Vec<Value> = meta
        .iter()
        .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
        .collect();
    serde_json::json!({
        "id": id,
        "status": status,
        "billing": {
            "first_name": "Amina",
            "last_name": "Njoya",
            "email": "amina@example.com",
            "phone": "+237600000000"
        },
        "meta_data": meta_data
    })
}

/// Scheduling user lookup payload.
pub fn calendly_user_json() -> Value {
    serde_json::json!({
        "resource": {
            "uri": "https://api.calendly.com/users/TESTUSER"
        }
    })
}
