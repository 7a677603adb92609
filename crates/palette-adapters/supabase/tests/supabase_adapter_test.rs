//! Supabase adapter against a wiremock PostgREST

use palette_core::{
    BackendConfig, ConnectionErrorKind, ConnectionId, EntityKind, Error, Patch, ProbeOutcome,
    StorageAdapter, StorageErrorKind,
};
use palette_supabase_adapter::SupabaseAdapter;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(url: &str) -> BackendConfig {
    BackendConfig::new().with("url", url).with("anonKey", "anon-key")
}

async fn mount_probe(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/palettes"))
        .and(query_param("select", "count"))
        .and(query_param("limit", "1"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn connected(server: &MockServer) -> SupabaseAdapter {
    mount_probe(
        server,
        ResponseTemplate::new(200).set_body_json(json!([{ "count": 0 }])),
    )
    .await;
    let adapter = SupabaseAdapter::new(&ConnectionId::new());
    adapter.connect(&config(&server.uri())).await.unwrap();
    adapter
}

#[tokio::test]
async fn test_connect_accessible() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;
    assert!(adapter.is_connected().await);
}

#[tokio::test]
async fn test_connect_missing_table_still_connects() {
    let server = MockServer::start().await;
    mount_probe(
        &server,
        ResponseTemplate::new(404).set_body_json(json!({
            "code": "42P01",
            "details": null,
            "hint": null,
            "message": "relation \"palettes\" does not exist"
        })),
    )
    .await;

    let adapter = SupabaseAdapter::new(&ConnectionId::new());
    let probe = adapter.connect(&config(&server.uri())).await.unwrap();
    assert_eq!(probe, ProbeOutcome::CollectionMissing);
    assert!(adapter.is_connected().await);
}

#[tokio::test]
async fn test_connect_rejected_key() {
    let server = MockServer::start().await;
    mount_probe(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({
            "message": "Invalid API key",
            "hint": "Double check your Supabase `anon` or `service_role` API key."
        })),
    )
    .await;

    let adapter = SupabaseAdapter::new(&ConnectionId::new());
    let err = adapter.connect(&config(&server.uri())).await.unwrap_err();
    assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::InvalidCredentials));
    assert!(!adapter.is_connected().await);
}

#[tokio::test]
async fn test_connect_server_error_fails() {
    let server = MockServer::start().await;
    mount_probe(
        &server,
        ResponseTemplate::new(500).set_body_json(json!({
            "code": "XX000",
            "message": "internal error"
        })),
    )
    .await;

    let adapter = SupabaseAdapter::new(&ConnectionId::new());
    let err = adapter.connect(&config(&server.uri())).await.unwrap_err();
    assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Other));
}

#[tokio::test]
async fn test_connect_unreachable() {
    let adapter = SupabaseAdapter::new(&ConnectionId::new());
    let err = adapter
        .connect(&config("http://127.0.0.1:1"))
        .await
        .unwrap_err();
    assert_eq!(err.connection_kind(), Some(ConnectionErrorKind::Unreachable));
    assert!(!adapter.is_connected().await);
}

#[tokio::test]
async fn test_operations_require_connection() {
    let adapter = SupabaseAdapter::new(&ConnectionId::new());
    assert!(matches!(
        adapter.get_by_id(EntityKind::Palettes, "1").await,
        Err(Error::NotConnected)
    ));
}

#[tokio::test]
async fn test_create_returns_row_id() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/palettes"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "name": "Sunset" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": "0f8c5d3e-1111-2222-3333-444455556666",
            "name": "Sunset",
            "created_at": "2024-05-01T12:00:00+00:00",
            "updated_at": "2024-05-01T12:00:00+00:00"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let attrs = json!({ "name": "Sunset", "category": "Warm" });
    let id = adapter
        .create(EntityKind::Palettes, attrs.as_object().unwrap().clone())
        .await
        .unwrap();
    assert_eq!(id, "0f8c5d3e-1111-2222-3333-444455556666");

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
    assert!(body["created_at"].is_string());
    assert!(body["updated_at"].is_string());
}

#[tokio::test]
async fn test_get_by_id() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/collections"))
        .and(query_param("id", "eq.c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "c1",
            "name": "Favourites",
            "created_at": "2024-05-01T12:00:00+00:00"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/collections"))
        .and(query_param("id", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let record = adapter
        .get_by_id(EntityKind::Collections, "c1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.attribute("name"), Some(&json!("Favourites")));
    assert!(record.created_at.is_some());

    assert!(adapter
        .get_by_id(EntityKind::Collections, "missing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_get_all_orders_newest_first() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/palettes"))
        .and(query_param("select", "*"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "b", "name": "Newer" },
            { "id": "a", "name": "Older" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let records = adapter.get_all(EntityKind::Palettes).await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[tokio::test]
async fn test_get_all_row_level_security_denial() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/collections"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "permission denied for table collections"
        })))
        .mount(&server)
        .await;

    let err = adapter.get_all(EntityKind::Collections).await.unwrap_err();
    assert_eq!(err.storage_kind(), Some(StorageErrorKind::PermissionDenied));
}

#[tokio::test]
async fn test_update_drops_absent_fields() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/palettes"))
        .and(query_param("id", "eq.p1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": "p1", "name": "Renamed" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let patch = Patch::new()
        .set("name", "Renamed")
        .set("description", Value::Null)
        .absent("tags");
    adapter
        .update(EntityKind::Palettes, "p1", &patch)
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
    assert_eq!(body["name"], json!("Renamed"));
    assert_eq!(body["description"], Value::Null);
    assert!(body.get("tags").is_none());
    assert!(body["updated_at"].is_string());
}

#[tokio::test]
async fn test_update_missing_row_is_not_found() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/palettes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = adapter
        .update(EntityKind::Palettes, "ghost", &Patch::new().set("name", "x"))
        .await
        .unwrap_err();
    assert_eq!(err.storage_kind(), Some(StorageErrorKind::NotFound));
}

#[tokio::test]
async fn test_delete() {
    let server = MockServer::start().await;
    let adapter = connected(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/palettes"))
        .and(query_param("id", "eq.p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    adapter.delete(EntityKind::Palettes, "p1").await.unwrap();

    adapter.disconnect().await.unwrap();
    assert!(matches!(
        adapter.delete(EntityKind::Palettes, "p1").await,
        Err(Error::NotConnected)
    ));
}
