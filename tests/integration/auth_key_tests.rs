//! Authorization key administration tests

use serde_json::json;

use crate::common::TestApp;

#[tokio::test]
async fn test_generate_auth_keys_defaults() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    let response = app
        .post_json_auth("/api/admin/gen-auth-key", json!({}), &admin_token)
        .await;

    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["days"], 30);
    assert_eq!(body["keys"].as_array().map(|k| k.len()), Some(1));
}

#[tokio::test]
async fn test_generate_multiple_distinct_keys() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    let response = app
        .post_json_auth(
            "/api/admin/gen-auth-key",
            json!({"count": 5, "days": 7}),
            &admin_token,
        )
        .await;

    response.assert_ok();
    let body: serde_json::Value = response.json();
    let keys: Vec<String> = serde_json::from_value(body["keys"].clone()).unwrap();
    assert_eq!(keys.len(), 5);

    let mut unique = keys.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5, "Generated keys must be distinct");
}

#[tokio::test]
async fn test_generate_rejects_out_of_range_count() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    let response = app
        .post_json_auth(
            "/api/admin/gen-auth-key",
            json!({"count": 0}),
            &admin_token,
        )
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .post_json_auth(
            "/api/admin/gen-auth-key",
            json!({"count": 101}),
            &admin_token,
        )
        .await;
    response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_auth_key_endpoints_are_admin_only() {
    let app = TestApp::new().await;
    let user_token = app.register_and_login("alice", "s3cret-pass").await;

    app.post_json_auth("/api/admin/gen-auth-key", json!({}), &user_token)
        .await
        .assert_forbidden();
    app.get_auth("/api/admin/auth-keys", &user_token)
        .await
        .assert_forbidden();
    app.delete_auth("/api/admin/auth-key/some-key", &user_token)
        .await
        .assert_forbidden();
    app.post_json_auth(
        "/api/admin/delay-auth-key",
        json!({"key": "some-key", "days": 30}),
        &user_token,
    )
    .await
    .assert_forbidden();
}

#[tokio::test]
async fn test_list_auth_keys_includes_owner() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    app.post_json_auth(
        "/api/admin/gen-auth-key",
        json!({"count": 2}),
        &admin_token,
    )
    .await
    .assert_ok();

    let response = app.get_auth("/api/admin/auth-keys", &admin_token).await;
    response.assert_ok();

    let keys: Vec<serde_json::Value> = response.json();
    assert_eq!(keys.len(), 2);
    for key in &keys {
        assert_eq!(key["owner_name"], "admin");
        assert!(key["key_value"].as_str().is_some_and(|k| !k.is_empty()));
        assert!(key.get("expires_at").is_some());
    }
}

#[tokio::test]
async fn test_delete_auth_key() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    let body: serde_json::Value = app
        .post_json_auth("/api/admin/gen-auth-key", json!({}), &admin_token)
        .await
        .json();
    let key = body["keys"][0].as_str().unwrap().to_string();

    app.delete_auth(&format!("/api/admin/auth-key/{}", key), &admin_token)
        .await
        .assert_ok();

    // A second delete finds nothing
    app.delete_auth(&format!("/api/admin/auth-key/{}", key), &admin_token)
        .await
        .assert_not_found();
}

#[tokio::test]
async fn test_delete_bound_auth_key_is_rejected() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    let body: serde_json::Value = app
        .post_json_auth(
            "/api/wechat-accounts",
            json!({"nickname": "Bound account"}),
            &admin_token,
        )
        .await
        .json();
    let key = body["account"]["auth_key"].as_str().unwrap().to_string();

    let response = app
        .delete_auth(&format!("/api/admin/auth-key/{}", key), &admin_token)
        .await;
    response.assert_conflict();
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Conflict: Auth key is bound to a WeChat account");
}

#[tokio::test]
async fn test_delay_auth_key_extends_expiry() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    let body: serde_json::Value = app
        .post_json_auth(
            "/api/admin/gen-auth-key",
            json!({"days": 1}),
            &admin_token,
        )
        .await
        .json();
    let key = body["keys"][0].as_str().unwrap().to_string();

    let before: Vec<serde_json::Value> =
        app.get_auth("/api/admin/auth-keys", &admin_token).await.json();
    let old_expiry = before[0]["expires_at"].as_str().unwrap().to_string();

    app.post_json_auth(
        "/api/admin/delay-auth-key",
        json!({"key": key, "days": 90}),
        &admin_token,
    )
    .await
    .assert_ok();

    let after: Vec<serde_json::Value> =
        app.get_auth("/api/admin/auth-keys", &admin_token).await.json();
    let new_expiry = after[0]["expires_at"].as_str().unwrap().to_string();
    assert!(
        new_expiry > old_expiry,
        "Expiry should move forward, was {} now {}",
        old_expiry,
        new_expiry
    );
}

#[tokio::test]
async fn test_delay_unknown_key_returns_404() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    app.post_json_auth(
        "/api/admin/delay-auth-key",
        json!({"key": "does-not-exist", "days": 30}),
        &admin_token,
    )
    .await
    .assert_not_found();
}
