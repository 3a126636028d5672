//! Login state machine and gateway integration tests

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{account_status, set_account_status, TestApp};

/// Create an account and return (account id, auth key)
async fn create_account(app: &TestApp, token: &str) -> (String, String) {
    let body: serde_json::Value = app
        .post_json_auth("/api/wechat-accounts", json!({}), token)
        .await
        .json();
    (
        body["account"]["id"].as_str().unwrap().to_string(),
        body["account"]["auth_key"].as_str().unwrap().to_string(),
    )
}

/// Walk an account through the whole QR flow until it is online with a
/// bound device key
async fn create_bound_account(app: &TestApp, token: &str) -> (String, String) {
    let (id, auth_key) = create_account(app, token).await;
    app.post_json_auth("/api/wechat/qr-login", json!({"auth_key": auth_key}), token)
        .await
        .assert_ok();
    app.post_json_auth(
        &format!("/api/wechat/simulate-scan/{}", auth_key),
        json!({}),
        token,
    )
    .await
    .assert_ok();
    app.post_json_auth(
        &format!("/api/wechat/simulate-confirm/{}", auth_key),
        json!({"success": true}),
        token,
    )
    .await
    .assert_ok();
    (id, auth_key)
}

#[tokio::test]
async fn test_qr_flow_reaches_online() {
    let app = TestApp::new().await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (_, auth_key) = create_account(&app, &token).await;

    // QR issuance moves the account to scanning; without a gateway the
    // URL is a local placeholder
    let response = app
        .post_json_auth("/api/wechat/qr-login", json!({"auth_key": auth_key}), &token)
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "scanning");
    assert!(body["qr_code_url"]
        .as_str()
        .is_some_and(|u| u.starts_with("https://example.com/qr/")));

    // Scan
    let response = app
        .post_json_auth(
            &format!("/api/wechat/simulate-scan/{}", auth_key),
            json!({}),
            &token,
        )
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "scanned_confirming");

    // Confirm
    let response = app
        .post_json_auth(
            &format!("/api/wechat/simulate-confirm/{}", auth_key),
            json!({"success": true}),
            &token,
        )
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "online");
    assert!(body["device_auth_key"]
        .as_str()
        .is_some_and(|k| k.starts_with("sim_dak_")));

    // Stored status agrees, and no gateway envelope is attached
    let status: serde_json::Value = app
        .post_json_auth(
            "/api/wechat/login-status",
            json!({"auth_key": auth_key}),
            &token,
        )
        .await
        .json();
    assert_eq!(status["status"], "online");
    assert!(status["last_login"].as_str().is_some());
    assert!(status.get("gateway").is_none());
}

#[tokio::test]
async fn test_confirm_failure_clears_device_key() {
    let app = TestApp::new().await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (id, auth_key) = create_account(&app, &token).await;

    app.post_json_auth("/api/wechat/qr-login", json!({"auth_key": auth_key}), &token)
        .await
        .assert_ok();
    app.post_json_auth(
        &format!("/api/wechat/simulate-scan/{}", auth_key),
        json!({}),
        &token,
    )
    .await
    .assert_ok();

    let response = app
        .post_json_auth(
            &format!("/api/wechat/simulate-confirm/{}", auth_key),
            json!({"success": false}),
            &token,
        )
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "failed");
    assert!(body.get("device_auth_key").is_none());

    let detail: serde_json::Value = app
        .get_auth(&format!("/api/wechat-accounts/{}", id), &token)
        .await
        .json();
    assert!(detail["device_auth_key"].is_null());
}

#[tokio::test]
async fn test_transitions_are_guarded() {
    let app = TestApp::new().await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (id, auth_key) = create_account(&app, &token).await;

    // Freshly created accounts are waiting: scan and confirm are both
    // out of order
    app.post_json_auth(
        &format!("/api/wechat/simulate-scan/{}", auth_key),
        json!({}),
        &token,
    )
    .await
    .assert_conflict();
    let response = app
        .post_json_auth(
            &format!("/api/wechat/simulate-confirm/{}", auth_key),
            json!({"success": true}),
            &token,
        )
        .await;
    response.assert_conflict();
    let body: serde_json::Value = response.json();
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("waiting")));

    // An online account cannot re-enter the QR flow
    set_account_status(&app.state.db, &id, "online").await;
    let response = app
        .post_json_auth("/api/wechat/qr-login", json!({"auth_key": auth_key}), &token)
        .await;
    response.assert_conflict();
    let body: serde_json::Value = response.json();
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("online")));

    // After going offline the QR flow opens up again
    set_account_status(&app.state.db, &id, "offline").await;
    app.post_json_auth("/api/wechat/qr-login", json!({"auth_key": auth_key}), &token)
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_login_flows_enforce_ownership() {
    let app = TestApp::new().await;
    let alice_token = app.register_and_login("alice", "s3cret-pass").await;
    let bob_token = app.register_and_login("bob", "s3cret-pass").await;
    let (_, auth_key) = create_account(&app, &alice_token).await;

    app.post_json_auth(
        "/api/wechat/qr-login",
        json!({"auth_key": auth_key}),
        &bob_token,
    )
    .await
    .assert_forbidden();
    app.post_json_auth(
        "/api/wechat/login-status",
        json!({"auth_key": auth_key}),
        &bob_token,
    )
    .await
    .assert_forbidden();
}

#[tokio::test]
async fn test_wakeup_unknown_key_returns_404() {
    let app = TestApp::new().await;
    let token = app.register_and_login("alice", "s3cret-pass").await;

    app.post_json_auth(
        "/api/wechat/wakeup-login",
        json!({"auth_key": "no-such-key"}),
        &token,
    )
    .await
    .assert_not_found();
}

#[tokio::test]
async fn test_wakeup_unbound_account_returns_400() {
    let app = TestApp::new().await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (_, auth_key) = create_account(&app, &token).await;

    let response = app
        .post_json_auth(
            "/api/wechat/wakeup-login",
            json!({"auth_key": auth_key}),
            &token,
        )
        .await;
    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["message"],
        "Account not bound: This account has no bound device, scan to log in first"
    );
}

#[tokio::test]
async fn test_wakeup_without_gateway_returns_502() {
    let app = TestApp::new().await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (_, auth_key) = create_bound_account(&app, &token).await;

    app.post_json_auth(
        "/api/wechat/wakeup-login",
        json!({"auth_key": auth_key}),
        &token,
    )
    .await
    .assert_status(axum::http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_wakeup_success_brings_account_online() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/WakeUpLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Code": 200,
            "Data": {"NickName": "bot"},
            "Message": "操作成功",
        })))
        .mount(&server)
        .await;

    let app = TestApp::with_gateway(&server.uri()).await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (id, auth_key) = create_bound_account(&app, &token).await;

    // Wakeup re-logs an account that has dropped offline
    set_account_status(&app.state.db, &id, "offline").await;

    let response = app
        .post_json_auth(
            "/api/wechat/wakeup-login",
            json!({"auth_key": auth_key}),
            &token,
        )
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Wakeup login successful");
    assert_eq!(body["data"]["NickName"], "bot");

    assert_eq!(account_status(&app.state.db, &id).await, "online");
}

#[tokio::test]
async fn test_wakeup_gateway_rejection_leaves_account_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/WakeUpLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Code": 500,
            "Message": "设备不在线",
        })))
        .mount(&server)
        .await;

    let app = TestApp::with_gateway(&server.uri()).await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (id, auth_key) = create_bound_account(&app, &token).await;
    set_account_status(&app.state.db, &id, "offline").await;

    let response = app
        .post_json_auth(
            "/api/wechat/wakeup-login",
            json!({"auth_key": auth_key}),
            &token,
        )
        .await;
    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "设备不在线");

    assert_eq!(account_status(&app.state.db, &id).await, "offline");
}

#[tokio::test]
async fn test_wakeup_transport_error_returns_502() {
    // Nothing listens on this port, the connection is refused
    let app = TestApp::with_gateway("http://127.0.0.1:9").await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (_, auth_key) = create_bound_account(&app, &token).await;

    app.post_json_auth(
        "/api/wechat/wakeup-login",
        json!({"auth_key": auth_key}),
        &token,
    )
    .await
    .assert_status(axum::http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_qr_login_uses_gateway_issued_url() {
    let server = MockServer::start().await;

    let app = TestApp::with_gateway(&server.uri()).await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (_, auth_key) = create_account(&app, &token).await;

    Mock::given(method("POST"))
        .and(path("/login/GetLoginQrCodeNew"))
        .and(body_json(json!({"key": auth_key})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Code": 200,
            "Data": {"QrUrl": "https://gw.example.com/qr/live.png"},
        })))
        .mount(&server)
        .await;

    let response = app
        .post_json_auth("/api/wechat/qr-login", json!({"auth_key": auth_key}), &token)
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["qr_code_url"], "https://gw.example.com/qr/live.png");
}

#[tokio::test]
async fn test_login_status_passes_gateway_envelope_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/CheckLoginStatus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Code": 200,
            "Data": {"loginStatus": 1},
            "Message": "在线",
        })))
        .mount(&server)
        .await;

    let app = TestApp::with_gateway(&server.uri()).await;
    let token = app.register_and_login("alice", "s3cret-pass").await;
    let (_, auth_key) = create_account(&app, &token).await;

    let response = app
        .post_json_auth(
            "/api/wechat/login-status",
            json!({"auth_key": auth_key}),
            &token,
        )
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["gateway"]["Code"], 200);
    assert_eq!(body["gateway"]["Message"], "在线");
    assert_eq!(body["gateway"]["Data"]["loginStatus"], 1);
}
