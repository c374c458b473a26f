mod common;

use common::TestApp;

#[tokio::test]
async fn health_reports_uptime_and_version() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "up");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn root_serves_the_service_banner() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/").await;
    assert_eq!(status, 200);
    // Plain text banner, not JSON
    assert!(body.is_null());
}

#[tokio::test]
async fn unknown_routes_return_404() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get("/api/v1/orders").await;
    assert_eq!(status, 404);
}
