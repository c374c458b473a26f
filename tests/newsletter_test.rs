mod common;

use common::{TestApp, LIST_ID};
use fiducia_api::services::mailing::subscriber_hash;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn subscription_upserts_by_lowercased_md5_key() {
    let app = TestApp::spawn().await;

    let member_path = format!(
        "/lists/{}/members/{}",
        LIST_ID,
        subscriber_hash("test@example.com")
    );
    Mock::given(method("PUT"))
        .and(path(member_path))
        .and(body_partial_json(json!({
            "email_address": "Test@Example.com",
            "status": "subscribed"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "subscribed" })))
        .expect(1)
        .mount(&app.mailing)
        .await;

    // Mixed case lands on the same member resource as the lowercase address
    let (status, body) = app
        .post_json("/newsletter/subscribe", json!({ "email": "Test@Example.com" }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn repeat_subscriptions_hit_the_same_member_resource() {
    let app = TestApp::spawn().await;

    Mock::given(method("PUT"))
        .and(path(format!(
            "/lists/{}/members/{}",
            LIST_ID,
            subscriber_hash("client@example.com")
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "subscribed" })))
        .expect(2)
        .mount(&app.mailing)
        .await;

    for email in ["client@example.com", "CLIENT@example.COM"] {
        let (status, _) = app
            .post_json("/newsletter/subscribe", json!({ "email": email }))
            .await;
        assert_eq!(status, 200);
    }
}

#[tokio::test]
async fn invalid_email_is_rejected_without_an_upstream_call() {
    let app = TestApp::spawn().await;

    for body in [
        json!({ "email": "no-at-sign.com" }),
        json!({ "email": "" }),
        json!({}),
    ] {
        let (status, response) = app.post_json("/newsletter/subscribe", body).await;
        assert_eq!(status, 400);
        assert_eq!(response, json!({ "error": "invalid_email" }));
    }

    assert!(app
        .mailing
        .received_requests()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn provider_failure_maps_to_an_opaque_error_code() {
    let app = TestApp::spawn().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "title": "Invalid Resource",
            "detail": "The resource submitted could not be validated."
        })))
        .expect(1)
        .mount(&app.mailing)
        .await;

    let (status, body) = app
        .post_json("/newsletter/subscribe", json!({ "email": "client@example.com" }))
        .await;

    assert_eq!(status, 500);
    // The provider's error body stays in the server log
    assert_eq!(body, json!({ "error": "mailchimp_error" }));
}
