//! Admin user management tests
//!
//! Covers listing, role changes, the delete cascade and the last-admin
//! guard.

use serde_json::json;

use crate::common::{count_rows_for_user, user_id_by_username, TestApp};

#[tokio::test]
async fn test_list_users_is_admin_only() {
    let app = TestApp::new().await;
    let user_token = app.register_and_login("alice", "s3cret-pass").await;

    app.get_auth("/api/admin/users", &user_token)
        .await
        .assert_forbidden();

    let admin_token = app.admin_token().await;
    let response = app.get_auth("/api/admin/users", &admin_token).await;
    response.assert_ok();

    let users: Vec<serde_json::Value> = response.json();
    assert_eq!(users.len(), 2);
    assert!(users.iter().any(|u| u["username"] == "admin"));
    assert!(users.iter().any(|u| u["username"] == "alice"));
}

#[tokio::test]
async fn test_admin_can_change_role() {
    let app = TestApp::new().await;
    app.register_and_login("alice", "s3cret-pass").await;
    let admin_token = app.admin_token().await;

    let alice_id = user_id_by_username(&app.state.db, "alice").await;
    let response = app
        .put_json_auth(
            &format!("/api/admin/users/{}", alice_id),
            json!({"role": "agent"}),
            &admin_token,
        )
        .await;

    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["role"], "agent");
}

#[tokio::test]
async fn test_update_rejects_duplicate_username() {
    let app = TestApp::new().await;
    app.register_and_login("alice", "s3cret-pass").await;
    app.register_and_login("bob", "s3cret-pass").await;
    let admin_token = app.admin_token().await;

    let bob_id = user_id_by_username(&app.state.db, "bob").await;
    app.put_json_auth(
        &format!("/api/admin/users/{}", bob_id),
        json!({"username": "alice"}),
        &admin_token,
    )
    .await
    .assert_conflict();
}

#[tokio::test]
async fn test_update_unknown_user_returns_404() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    app.put_json_auth(
        &format!("/api/admin/users/{}", uuid::Uuid::new_v4()),
        json!({"role": "agent"}),
        &admin_token,
    )
    .await
    .assert_not_found();
}

#[tokio::test]
async fn test_delete_user_is_admin_only() {
    let app = TestApp::new().await;
    let user_token = app.register_and_login("alice", "s3cret-pass").await;
    app.register_and_login("bob", "s3cret-pass").await;

    let bob_id = user_id_by_username(&app.state.db, "bob").await;
    app.delete_auth(&format!("/api/admin/users/{}", bob_id), &user_token)
        .await
        .assert_forbidden();
}

#[tokio::test]
async fn test_delete_user_cascades_to_owned_rows() {
    let app = TestApp::new().await;
    let bob_token = app.register_and_login("bob", "s3cret-pass").await;
    let bob_id = user_id_by_username(&app.state.db, "bob").await;

    // Bob creates an account, which mints an auth key for him
    app.post_json_auth("/api/wechat-accounts", json!({}), &bob_token)
        .await
        .assert_ok();
    crate::common::seed_device(&app.state.db, bob_id, "bobs-phone").await;

    assert!(count_rows_for_user(&app.state.db, "wechat_accounts", bob_id).await > 0);
    assert!(count_rows_for_user(&app.state.db, "auth_keys", bob_id).await > 0);
    assert!(count_rows_for_user(&app.state.db, "devices", bob_id).await > 0);

    let admin_token = app.admin_token().await;
    let response = app
        .delete_auth(&format!("/api/admin/users/{}", bob_id), &admin_token)
        .await;
    response.assert_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "User deleted successfully");

    // Everything Bob owned is gone with him
    assert_eq!(
        count_rows_for_user(&app.state.db, "wechat_accounts", bob_id).await,
        0
    );
    assert_eq!(
        count_rows_for_user(&app.state.db, "auth_keys", bob_id).await,
        0
    );
    assert_eq!(
        count_rows_for_user(&app.state.db, "devices", bob_id).await,
        0
    );

    // Bob can no longer log in
    app.post_json(
        "/api/auth/login",
        json!({"username": "bob", "password": "s3cret-pass"}),
    )
    .await
    .assert_unauthorized();
}

#[tokio::test]
async fn test_cannot_delete_last_admin() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;
    let admin_id = user_id_by_username(&app.state.db, "admin").await;

    let response = app
        .delete_auth(&format!("/api/admin/users/{}", admin_id), &admin_token)
        .await;

    response.assert_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["message"], "Bad request: Cannot delete the last admin");
}

#[tokio::test]
async fn test_can_delete_admin_when_another_remains() {
    let app = TestApp::new().await;
    app.register_and_login("second", "s3cret-pass").await;
    let admin_token = app.admin_token().await;

    // Promote the new user, then the original admin is no longer the last one
    let second_id = user_id_by_username(&app.state.db, "second").await;
    app.put_json_auth(
        &format!("/api/admin/users/{}", second_id),
        json!({"role": "admin"}),
        &admin_token,
    )
    .await
    .assert_ok();

    app.delete_auth(&format!("/api/admin/users/{}", second_id), &admin_token)
        .await
        .assert_ok();
}

#[tokio::test]
async fn test_delete_unknown_user_returns_404() {
    let app = TestApp::new().await;
    let admin_token = app.admin_token().await;

    app.delete_auth(
        &format!("/api/admin/users/{}", uuid::Uuid::new_v4()),
        &admin_token,
    )
    .await
    .assert_not_found();
}
