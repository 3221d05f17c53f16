//! 账户管理 API 集成测试

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use catalog_service::models::user::Role;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    authed_request, body_json, create_test_app, json_request, token_for, ADMIN_PASSWORD,
    ALICE_PASSWORD,
};

fn login(username: &str, password: &str) -> Request<Body> {
    json_request(
        "POST",
        "/login",
        json!({ "username": username, "password": password }),
    )
}

#[tokio::test]
async fn test_user_changes_own_password() {
    let (app, state) = create_test_app();
    let token = token_for(&state, "alice", Role::User);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            "/users/alice",
            &token,
            Some(json!({ "password": "fresh-alice-pass", "current_password": ALICE_PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["username"], "alice");
    assert!(json.get("password_hash").is_none());

    let response = app
        .clone()
        .oneshot(login("alice", "fresh-alice-pass"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(login("alice", ALICE_PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_own_password_change_needs_current_password() {
    let (app, state) = create_test_app();
    let token = token_for(&state, "alice", Role::User);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            "/users/alice",
            &token,
            Some(json!({ "password": "fresh-alice-pass" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            "/users/alice",
            &token,
            Some(json!({ "password": "fresh-alice-pass", "current_password": "not-my-password" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(authed_request(
            "PUT",
            "/users/alice",
            &token,
            Some(json!({ "password": "short", "current_password": ALICE_PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_cannot_touch_other_accounts() {
    let (app, state) = create_test_app();
    let token = token_for(&state, "alice", Role::User);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            "/users/admin",
            &token,
            Some(json!({ "password": "taken-over-pass", "current_password": ADMIN_PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", "/users/admin", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // 管理员账户不受影响
    let response = app.oneshot(login("admin", ADMIN_PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_resets_and_deletes_other_user() {
    let (app, state) = create_test_app();
    let token = token_for(&state, "admin", Role::Admin);

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            "/users/alice",
            &token,
            Some(json!({ "password": "reset-by-admin" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(login("alice", "reset-by-admin"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", "/users/alice", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", "/users/alice", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(authed_request(
            "PUT",
            "/users/ghost",
            &token,
            Some(json!({ "password": "whatever-pass" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_deletes_own_account() {
    let (app, state) = create_test_app();
    let token = token_for(&state, "alice", Role::User);

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", "/users/alice", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(login("alice", ALICE_PASSWORD)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_anonymous_account_changes_unauthorized() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/users/alice",
            json!({ "password": "anonymous-pass" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/users/alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
