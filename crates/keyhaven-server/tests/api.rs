//! HTTP API tests against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use tower::ServiceExt;
use uuid::Uuid;

use keyhaven_core::SecretService;
use keyhaven_server::principal::PRINCIPAL_HEADER;
use keyhaven_server::routes;
use keyhaven_server::state::AppState;
use keyhaven_store::models::{MembershipRow, OrgRole, OrgRow};
use keyhaven_store::{MemoryStore, SecretStore};

struct TestApp {
    app: Router,
    org_id: Uuid,
    owner: Uuid,
}

async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let org_id = Uuid::new_v4();
    let owner = Uuid::new_v4();

    store
        .insert_org(OrgRow {
            id: org_id,
            name: "acme".to_owned(),
            master_key_material: b"api-test-master-material".to_vec(),
            created_at: Utc::now(),
        })
        .await;
    store
        .upsert_membership(MembershipRow {
            org_id,
            principal_id: owner,
            role: OrgRole::Owner,
            created_at: Utc::now(),
        })
        .await;

    let state = Arc::new(AppState {
        service: SecretService::new(store as Arc<dyn SecretStore>),
    });

    TestApp {
        app: routes::router(state),
        org_id,
        owner,
    }
}

fn json_request(
    method: &str,
    uri: &str,
    principal: Uuid,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(PRINCIPAL_HEADER, principal.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str, principal: Uuid) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(PRINCIPAL_HEADER, principal.to_string())
        .body(Body::empty())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn create_read_update_over_http() {
    let t = test_app().await;

    let create = json_request(
        "POST",
        "/v1/secrets",
        t.owner,
        &serde_json::json!({
            "org_id": t.org_id,
            "project_id": Uuid::new_v4(),
            "name": "DB_URL",
            "value": "postgres://a",
            "environment": "production",
        }),
    );
    let response = t.app.clone().oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["version"], 1);
    assert!(created.get("value").is_none());
    assert!(created.get("encrypted_value").is_none());
    let id = created["id"].as_str().unwrap().to_owned();

    let response = t
        .app
        .clone()
        .oneshot(get_request(&format!("/v1/secrets/{id}"), t.owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let read = json_body(response).await;
    assert_eq!(read["value"], "postgres://a");

    let update = json_request(
        "PUT",
        &format!("/v1/secrets/{id}"),
        t.owner,
        &serde_json::json!({ "value": "postgres://b" }),
    );
    let response = t.app.clone().oneshot(update).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["version"], 2);

    let response = t
        .app
        .clone()
        .oneshot(get_request(&format!("/v1/secrets/{id}/versions"), t.owner))
        .await
        .unwrap();
    let versions = json_body(response).await;
    assert_eq!(versions["versions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_principal_header_is_unauthorized() {
    let t = test_app().await;
    let request = Request::builder()
        .method("GET")
        .uri(format!("/v1/secrets/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn outsider_is_forbidden() {
    let t = test_app().await;

    let create = json_request(
        "POST",
        "/v1/secrets",
        t.owner,
        &serde_json::json!({
            "org_id": t.org_id,
            "project_id": Uuid::new_v4(),
            "name": "KEY",
            "value": "v",
            "environment": "staging",
        }),
    );
    let response = t.app.clone().oneshot(create).await.unwrap();
    let id = json_body(response).await["id"].as_str().unwrap().to_owned();

    let response = t
        .app
        .clone()
        .oneshot(get_request(&format!("/v1/secrets/{id}"), Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_secret_is_not_found() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(get_request(&format!("/v1/secrets/{}", Uuid::new_v4()), t.owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restore_of_missing_version_is_404() {
    let t = test_app().await;

    let create = json_request(
        "POST",
        "/v1/secrets",
        t.owner,
        &serde_json::json!({
            "org_id": t.org_id,
            "project_id": Uuid::new_v4(),
            "name": "KEY",
            "value": "v1",
            "environment": "development",
        }),
    );
    let response = t.app.clone().oneshot(create).await.unwrap();
    let id = json_body(response).await["id"].as_str().unwrap().to_owned();

    // No archived versions yet, so restoring any version is a 404.
    let restore = json_request(
        "POST",
        &format!("/v1/secrets/{id}/restore"),
        t.owner,
        &serde_json::json!({ "version": 1 }),
    );
    let response = t.app.clone().oneshot(restore).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_and_audit_round_trip() {
    let t = test_app().await;

    let create = json_request(
        "POST",
        "/v1/secrets",
        t.owner,
        &serde_json::json!({
            "org_id": t.org_id,
            "project_id": Uuid::new_v4(),
            "name": "API_KEY",
            "value": "sk-123",
            "environment": "production",
        }),
    );
    let response = t.app.clone().oneshot(create).await.unwrap();
    let id = json_body(response).await["id"].as_str().unwrap().to_owned();

    let export = json_request(
        "POST",
        &format!("/v1/orgs/{}/export", t.org_id),
        t.owner,
        &serde_json::json!({ "secret_ids": [id], "format": "dotenv" }),
    );
    let response = t.app.clone().oneshot(export).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let exported = json_body(response).await;
    assert_eq!(exported["exported"], 1);
    assert_eq!(exported["rendered"], "API_KEY=sk-123\n");

    let response = t
        .app
        .clone()
        .oneshot(get_request(&format!("/v1/orgs/{}/audit", t.org_id), t.owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let audit = json_body(response).await;
    let actions: Vec<&str> = audit["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["exported", "created"]);
}

#[tokio::test]
async fn bad_export_format_is_rejected() {
    let t = test_app().await;
    let export = json_request(
        "POST",
        &format!("/v1/orgs/{}/export", t.org_id),
        t.owner,
        &serde_json::json!({ "secret_ids": [], "format": "xml" }),
    );
    let response = t.app.clone().oneshot(export).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
