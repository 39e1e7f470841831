//! Integration tests for cached reads and invalidating mutations.

use std::sync::Arc;
use std::time::Duration;

use otaconsole_client::{ApiClient, ClientConfig, ClientError, Hooks, RecordKind, Session};
use otaconsole_core::{CreateReleaseRequest, DeleteReleaseRequest, Platform};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUILTIN_BUNDLE: &str = "65a1f0c2e4b0a1b2c3d4e5f6";
const NEW_RELEASE: &str = "65a1f0c2e4b0a1b2c3d4e5aa";

fn release_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "platform": "ios",
        "app_id": "com.example.app",
        "version_name": "2.0.0",
        "version_code": "200",
        "builtin_bundle_id": BUILTIN_BUNDLE,
        "created_at": "2024-01-12T10:00:00Z"
    })
}

fn hooks_for(server: &MockServer) -> Hooks {
    let session = Arc::new(Session::in_memory());
    session.login_with_api_key("abc123").unwrap();
    let api = ApiClient::new(ClientConfig::new(server.uri()), session).unwrap();
    Hooks::new(Arc::new(api))
}

fn create_request() -> CreateReleaseRequest {
    CreateReleaseRequest {
        platform: Platform::Ios,
        app_id: "com.example.app".to_string(),
        version_name: "2.0.0".to_string(),
        version_code: "200".to_string(),
        builtin_bundle_id: BUILTIN_BUNDLE.to_string(),
    }
}

/// Serves an empty release list once, then a list with one release.
async fn mount_growing_release_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [release_json(NEW_RELEASE)] })),
        )
        .with_priority(2)
        .mount(server)
        .await;
}

async fn mount_create(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/releases.create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "release created",
            "release": release_json(NEW_RELEASE)
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_api_key_login_then_subscribed_list_settles_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .and(header("x-api-key", "abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let hooks = hooks_for(&server);
    let headers = hooks.api().session().auth_headers();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers.get("x-api-key").unwrap(), "abc123");

    let mut releases = hooks.use_releases();
    let state = releases.settled().await;
    assert!(!state.is_loading);
    assert!(state.error.is_none());
    assert_eq!(state.data.map(|list| list.len()), Some(0));
}

#[tokio::test]
async fn test_concurrent_reads_share_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let hooks = hooks_for(&server);
    let (a, b, c) = tokio::join!(hooks.releases(), hooks.releases(), hooks.releases());

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
}

#[tokio::test]
async fn test_read_after_create_reflects_new_record() {
    let server = MockServer::start().await;
    mount_growing_release_list(&server).await;
    mount_create(&server).await;

    let hooks = hooks_for(&server);
    assert!(hooks.releases().await.unwrap().is_empty());

    hooks.create_release(&create_request()).await.unwrap();

    let releases = hooks.releases().await.unwrap();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases.data[0].id, NEW_RELEASE);
}

#[tokio::test]
async fn test_subscriber_observes_revalidation_after_create() {
    let server = MockServer::start().await;
    mount_growing_release_list(&server).await;
    mount_create(&server).await;

    let hooks = hooks_for(&server);
    let mut releases = hooks.use_releases();
    let before = releases.settled().await;
    assert_eq!(before.data.map(|list| list.len()), Some(0));

    hooks.create_release(&create_request()).await.unwrap();

    let after = releases.settled().await;
    assert_eq!(after.data.map(|list| list.len()), Some(1));
}

#[tokio::test]
async fn test_record_lookup_after_collection_loads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [release_json(NEW_RELEASE)] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let hooks = hooks_for(&server);

    let release = hooks.release(NEW_RELEASE).await.unwrap();
    assert_eq!(release.version_code, "200");

    let err = hooks.release("65a1f0c2e4b0a1b2c3d4e5ff").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::NotFound {
            kind: RecordKind::Release,
            ..
        }
    ));
    assert_eq!(err.to_string(), "Release 65a1f0c2e4b0a1b2c3d4e5ff not found");
}

#[tokio::test]
async fn test_record_subscription_settles_with_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/bundles.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let hooks = hooks_for(&server);
    let mut bundle = hooks.use_bundle(BUILTIN_BUNDLE);

    let state = bundle.settled().await;
    assert!(state.data.is_none());
    assert!(state.error.is_some_and(|e| e.is_not_found()));
}

#[tokio::test]
async fn test_failed_mutation_keeps_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/releases.delete"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "delete failed" })))
        .expect(1)
        .mount(&server)
        .await;

    let hooks = hooks_for(&server);
    hooks.releases().await.unwrap();

    let err = hooks
        .delete_release(&DeleteReleaseRequest {
            release_id: NEW_RELEASE.to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "API Error 500: delete failed");

    hooks.releases().await.unwrap();
}

#[tokio::test]
async fn test_read_after_create_retries_failed_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "try later" })))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [release_json(NEW_RELEASE)] })),
        )
        .with_priority(3)
        .mount(&server)
        .await;
    mount_create(&server).await;

    let hooks = hooks_for(&server);
    assert!(hooks.releases().await.unwrap().is_empty());
    hooks.create_release(&create_request()).await.unwrap();

    let err = hooks.releases().await.unwrap_err();
    assert_eq!(err.status(), Some(503));

    let releases = hooks.releases().await.unwrap();
    assert_eq!(releases.len(), 1);
}

#[tokio::test]
async fn test_read_during_create_does_not_return_earlier_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [] }))
                .set_delay(Duration::from_millis(300)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [release_json(NEW_RELEASE)] })),
        )
        .with_priority(2)
        .mount(&server)
        .await;
    mount_create(&server).await;

    let hooks = hooks_for(&server);
    let (earlier, later) = tokio::join!(hooks.releases(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        hooks.create_release(&create_request()).await.unwrap();
        hooks.releases().await
    });

    assert!(earlier.unwrap().is_empty());
    let later = later.unwrap();
    assert_eq!(later.len(), 1);
    assert_eq!(later.data[0].id, NEW_RELEASE);
}

#[tokio::test]
async fn test_unauthorized_mutation_drops_cached_reads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/releases.list"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [release_json(NEW_RELEASE)] })),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/releases.delete"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "unauthorized" })))
        .expect(1)
        .mount(&server)
        .await;

    let hooks = hooks_for(&server);
    hooks.release(NEW_RELEASE).await.unwrap();

    let err = hooks
        .delete_release(&DeleteReleaseRequest {
            release_id: NEW_RELEASE.to_string(),
        })
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!hooks.api().session().is_logged_in());

    hooks.releases().await.unwrap();
}

#[tokio::test]
async fn test_logout_drops_cached_reads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/bundles.list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(2)
        .mount(&server)
        .await;

    let hooks = hooks_for(&server);
    hooks.bundles().await.unwrap();
    hooks.api().session().logout().unwrap();

    hooks.bundles().await.unwrap();
}
