use super::*;
use axum::{
    body::{self, Body},
    http::Request,
    response::Response,
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

async fn test_app(admin: AdminPolicy) -> (Router, Storage) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let state = AppState {
        api: ApiContext::new(storage.clone(), admin),
        identity: IdentityConfig {
            secret: "test-secret".into(),
            ttl_seconds: 600,
        },
    };
    (build_router(Arc::new(state)), storage)
}

async fn json_body<T: DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

async fn login(app: &Router, username: &str) -> IdentityLoginResponse {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/identity/login",
            None,
            serde_json::json!({ "username": username }),
        ))
        .await
        .expect("login response");
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;
    let response = app
        .oneshot(get_request("/healthz", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn text_fields_serve_defaults_and_unknown_fields_are_not_found() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;

    let response = app
        .clone()
        .oneshot(get_request("/content/text/game_title", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let value: TextValue = json_body(response).await;
    assert_eq!(value.value, "Poke A Nose");

    let response = app
        .oneshot(get_request("/content/text/subtitle", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn login_claim_and_edit_flow() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;
    let alice = login(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(get_request("/admin/status", None))
        .await
        .expect("status");
    let status: AdminStatus = json_body(response).await;
    assert!(!status.admin_exists);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/initialize",
            Some(&alice.token),
            serde_json::json!({ "admin_token": "", "user_provided_token": "" }),
        ))
        .await
        .expect("initialize");
    assert_eq!(response.status(), StatusCode::OK);
    let result: AdminResult = json_body(response).await;
    assert_eq!(result, AdminResult::Success);

    let response = app
        .clone()
        .oneshot(get_request("/admin/caller", Some(&alice.token)))
        .await
        .expect("caller");
    let caller: CallerAdmin = json_body(response).await;
    assert!(caller.is_admin);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/content/text/about_text",
            Some(&alice.token),
            serde_json::json!({ "value": "Hello" }),
        ))
        .await
        .expect("update");
    let result: UpdateContentResult = json_body(response).await;
    assert_eq!(result, UpdateContentResult::Success);

    let response = app
        .oneshot(get_request("/content/text/about_text", None))
        .await
        .expect("read");
    let value: TextValue = json_body(response).await;
    assert_eq!(value.value, "Hello");
}

#[tokio::test]
async fn anonymous_writes_report_not_admin() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;
    let response = app
        .oneshot(json_request(
            "PUT",
            "/content/features",
            None,
            serde_json::json!({ "items": ["one"] }),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    let result: UpdateContentResult = json_body(response).await;
    assert_eq!(result, UpdateContentResult::NotAdmin);
}

#[tokio::test]
async fn invalid_bearer_token_is_unauthorized() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;
    let response = app
        .clone()
        .oneshot(get_request("/admin/caller", Some("not-a-jwt")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::get("/admin/caller")
        .header("authorization", "Basic abc")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reset_by_non_admin_without_recovery_token_is_forbidden() {
    let (app, storage) = test_app(AdminPolicy {
        setup_token: None,
        recovery_token: Some("recover".into()),
    })
    .await;
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    storage.claim_admin(&alice.principal).await.expect("claim");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/admin/reset",
            Some(&bob.token),
            serde_json::json!({}),
        ))
        .await
        .expect("reset");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(json_request(
            "POST",
            "/admin/reset",
            Some(&bob.token),
            serde_json::json!({ "recovery_token": "recover" }),
        ))
        .await
        .expect("reset");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(storage.admin_principal().await.expect("admin"), None);
}

#[tokio::test]
async fn password_routes_gate_and_verify() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;
    let alice = login(&app, "alice").await;
    app.clone()
        .oneshot(json_request(
            "POST",
            "/admin/initialize",
            Some(&alice.token),
            serde_json::json!({}),
        ))
        .await
        .expect("initialize");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/password/enable",
            Some(&alice.token),
            serde_json::json!({ "password": "p1" }),
        ))
        .await
        .expect("enable");
    let result: AdminResult = json_body(response).await;
    assert_eq!(result, AdminResult::Success);

    for (candidate, expected) in [("__check_enabled__", false), ("p1", true), ("wrong", false)] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/password/verify",
                None,
                serde_json::json!({ "password": candidate }),
            ))
            .await
            .expect("verify");
        let verdict: PasswordVerdict = json_body(response).await;
        assert_eq!(verdict.valid, expected, "candidate {candidate}");
    }
}

#[tokio::test]
async fn profile_round_trip_for_signed_in_caller() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;
    let alice = login(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(get_request("/profile", Some(&alice.token)))
        .await
        .expect("profile");
    let profile: Option<UserProfile> = json_body(response).await;
    assert_eq!(profile, None);

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/profile",
            Some(&alice.token),
            serde_json::json!({ "name": "Alice" }),
        ))
        .await
        .expect("save");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(get_request("/profile", Some(&alice.token)))
        .await
        .expect("profile");
    let profile: Option<UserProfile> = json_body(response).await;
    assert_eq!(profile, Some(UserProfile { name: "Alice".into() }));

    let response = app
        .oneshot(get_request("/profile", None))
        .await
        .expect("anonymous");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blank_username_cannot_log_in() {
    let (app, _storage) = test_app(AdminPolicy::default()).await;
    let response = app
        .oneshot(json_request(
            "POST",
            "/identity/login",
            None,
            serde_json::json!({ "username": "  " }),
        ))
        .await
        .expect("login");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
