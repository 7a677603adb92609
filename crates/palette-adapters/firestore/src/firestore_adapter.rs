//! Cloud Firestore adapter over the Firestore REST API (v1).
//!
//! Endpoints used, relative to
//! `{endpoint}/projects/{projectId}/databases/(default)/documents`:
//!
//! - `GET /{collection}?pageSize=..&pageToken=..` - list (also the connect probe)
//! - `POST /{collection}` - create with a server-assigned id
//! - `GET|DELETE /{collection}/{id}` - single document
//! - `POST :commit` - field-masked update with a server-side `updatedAt`
//!
//! Requests are authorised with the web `apiKey` as the `key` query parameter.
//! Timestamps always come from the server: document `createTime`/`updateTime`,
//! or the `REQUEST_TIME` transform on update.

use crate::values::{decode_fields, encode_fields, encode_value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use palette_core::{
    BackendConfig, BackendType, ConnectionError, ConnectionId, EntityKind, EntityRecord, Error,
    Patch, ProbeOutcome, Result, SessionHandle, StorageAdapter, StorageError, StorageErrorKind,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Public Firestore REST endpoint
pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

const PAGE_SIZE: u32 = 300;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_COLLECTION: EntityKind = EntityKind::Palettes;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl ApiError {
    fn parse(status: StatusCode, body: &str) -> Self {
        serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| ApiError {
                code: status.as_u16(),
                message: body.trim().to_string(),
                status: String::new(),
            })
    }

    fn kind(&self) -> StorageErrorKind {
        match self.status.as_str() {
            "NOT_FOUND" => StorageErrorKind::NotFound,
            "PERMISSION_DENIED" | "UNAUTHENTICATED" => StorageErrorKind::PermissionDenied,
            "UNAVAILABLE" | "DEADLINE_EXCEEDED" => StorageErrorKind::Unreachable,
            "INVALID_ARGUMENT" | "FAILED_PRECONDITION" => StorageErrorKind::Invalid,
            "" => match self.code {
                404 => StorageErrorKind::NotFound,
                401 | 403 => StorageErrorKind::PermissionDenied,
                400 => StorageErrorKind::Invalid,
                502..=504 => StorageErrorKind::Unreachable,
                _ => StorageErrorKind::Other,
            },
            _ => StorageErrorKind::Other,
        }
    }

    fn describe(&self) -> String {
        if self.status.is_empty() {
            format!("HTTP {}: {}", self.code, self.message)
        } else {
            format!("{}: {}", self.status, self.message)
        }
    }

    fn into_storage_error(self) -> StorageError {
        StorageError::new(self.kind(), self.describe())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    update_time: Option<DateTime<Utc>>,
}

impl Document {
    fn into_record(self) -> EntityRecord {
        let id = self.name.rsplit('/').next().unwrap_or_default().to_string();
        let mut attributes = decode_fields(&self.fields);
        let created_at = take_timestamp(&mut attributes, "createdAt").or(self.create_time);
        let updated_at = take_timestamp(&mut attributes, "updatedAt").or(self.update_time);

        let mut record = EntityRecord::new(id, attributes);
        record.created_at = created_at;
        record.updated_at = updated_at;
        record
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

fn take_timestamp(attributes: &mut Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    match attributes.remove(key)? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

/// A document id must name exactly one document inside its collection
fn check_document_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains('/') {
        return Err(StorageError::invalid(format!("invalid document id '{}'", id)).into());
    }
    Ok(())
}

/// Quote a field name for `updateMask.fieldPaths` unless it is a simple identifier
fn field_path(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[derive(Clone)]
struct Session {
    client: Client,
    /// `projects/{projectId}/databases/(default)`
    database: String,
    documents_url: Url,
    api_key: String,
    name: String,
}

impl Session {
    fn url_with(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::other(format!("cannot extend URL {}", self.documents_url)))?
            .extend(segments);
        Ok(url)
    }

    fn collection_url(&self, kind: EntityKind) -> Result<Url> {
        self.url_with(&[kind.collection()])
    }

    fn document_url(&self, kind: EntityKind, id: &str) -> Result<Url> {
        check_document_id(id)?;
        self.url_with(&[kind.collection(), id])
    }

    fn commit_url(&self) -> String {
        format!("{}:commit", self.documents_url)
    }

    fn document_name(&self, kind: EntityKind, id: &str) -> Result<String> {
        check_document_id(id)?;
        Ok(format!("{}/documents/{}/{}", self.database, kind.collection(), id))
    }

    /// Send with the api key attached; non-2xx responses become [`ApiError`]
    async fn send(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<reqwest::Response, SendError> {
        let response = request
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(SendError::Transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SendError::Api(ApiError::parse(status, &body)))
    }
}

enum SendError {
    Transport(reqwest::Error),
    Api(ApiError),
}

impl From<SendError> for Error {
    fn from(e: SendError) -> Self {
        match e {
            SendError::Transport(e) => StorageError::unreachable(e.to_string()).into(),
            SendError::Api(e) => e.into_storage_error().into(),
        }
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| StorageError::other(format!("unexpected Firestore response: {}", e)).into())
}

/// Firestore-backed [`StorageAdapter`]
pub struct FirestoreAdapter {
    connection_id: ConnectionId,
    session: RwLock<Option<Session>>,
}

impl FirestoreAdapter {
    pub fn new(connection_id: &ConnectionId) -> Self {
        Self {
            connection_id: *connection_id,
            session: RwLock::new(None),
        }
    }

    async fn session(&self) -> Result<Session> {
        self.session.read().await.clone().ok_or(Error::NotConnected)
    }

    async fn probe(&self, session: &Session) -> Result<ProbeOutcome> {
        let request = session
            .client
            .get(session.collection_url(PROBE_COLLECTION)?)
            .query(&[("pageSize", "1")]);

        match session.send(request).await {
            Ok(_) => Ok(ProbeOutcome::Accessible),
            Err(SendError::Transport(e)) => Err(ConnectionError::unreachable(format!(
                "Firebase connection failed: {}",
                e
            ))
            .into()),
            Err(SendError::Api(e)) => match (e.status.as_str(), e.kind()) {
                ("UNAUTHENTICATED", _) | (_, StorageErrorKind::Invalid) => {
                    Err(ConnectionError::invalid_credentials(format!(
                        "Invalid Firebase API key or project: {}",
                        e.message
                    ))
                    .into())
                }
                (_, StorageErrorKind::PermissionDenied) => Ok(ProbeOutcome::PermissionDenied),
                (_, StorageErrorKind::NotFound) => Ok(ProbeOutcome::CollectionMissing),
                (_, StorageErrorKind::Unreachable) => Err(ConnectionError::unreachable(
                    format!("Firebase connection failed: {}", e.describe()),
                )
                .into()),
                _ => Err(ConnectionError::other(format!(
                    "Firebase connection failed: {}",
                    e.describe()
                ))
                .into()),
            },
        }
    }
}

#[async_trait]
impl StorageAdapter for FirestoreAdapter {
    fn backend_type(&self) -> BackendType {
        BackendType::Firebase
    }

    async fn connect(&self, config: &BackendConfig) -> Result<ProbeOutcome> {
        let project_id = config
            .require("projectId")
            .map_err(|e| ConnectionError::invalid_config(e.to_string()))?;
        let api_key = config
            .require("apiKey")
            .map_err(|e| ConnectionError::invalid_config(e.to_string()))?;
        let endpoint = config
            .text("endpoint")
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let handle = SessionHandle::new(&self.connection_id);
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(handle.name())
            .build()
            .map_err(|e| ConnectionError::other(format!("failed to build HTTP client: {}", e)))?;

        let database = format!("projects/{}/databases/(default)", project_id);
        let documents_url = Url::parse(&format!(
            "{}/{}/documents",
            endpoint.trim_end_matches('/'),
            database
        ))
        .map_err(|e| ConnectionError::invalid_config(format!("invalid Firestore endpoint: {}", e)))?;

        let session = Session {
            client,
            database,
            documents_url,
            api_key,
            name: handle.name().to_string(),
        };

        info!("Connecting to Firestore project '{}' as {}", project_id, session.name);
        let outcome = self.probe(&session).await?;
        match outcome {
            ProbeOutcome::Accessible => info!("Firestore palettes collection accessible"),
            ProbeOutcome::PermissionDenied => warn!(
                "Firestore reachable but reading palettes is denied; check security rules"
            ),
            ProbeOutcome::CollectionMissing => {
                warn!("Firestore palettes collection not found; it is created on first write")
            }
        }

        *self.session.write().await = Some(session);
        Ok(outcome)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(session) = self.session.write().await.take() {
            info!("Closed Firestore session {}", session.name);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn create(&self, kind: EntityKind, mut attributes: Map<String, Value>) -> Result<String> {
        let session = self.session().await?;
        attributes.remove("createdAt");
        attributes.remove("updatedAt");
        let fields = encode_fields(&attributes);

        let request = session
            .client
            .post(session.collection_url(kind)?)
            .json(&json!({ "fields": fields }));
        let document: Document = read_json(session.send(request).await?).await?;
        let record = document.into_record();

        debug!("{} created with id {}", kind.label(), record.id);
        Ok(record.id)
    }

    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>> {
        let session = self.session().await?;
        let request = session.client.get(session.document_url(kind, id)?);

        match session.send(request).await {
            Ok(response) => {
                let document: Document = read_json(response).await?;
                Ok(Some(document.into_record()))
            }
            Err(SendError::Api(e)) if e.kind() == StorageErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        let session = self.session().await?;
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = session
                .client
                .get(session.collection_url(kind)?)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListResponse = read_json(session.send(request).await?).await?;
            records.extend(page.documents.into_iter().map(Document::into_record));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Loaded {} {} from Firestore", records.len(), kind);
        Ok(records)
    }

    async fn update(&self, kind: EntityKind, id: &str, patch: &Patch) -> Result<()> {
        let session = self.session().await?;
        let mut written = patch.write_set();
        written.remove("createdAt");
        written.remove("updatedAt");

        let fields: Map<String, Value> = written
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect();
        let mask: Vec<String> = fields.keys().map(|k| field_path(k)).collect();

        let write = json!({
            "update": { "name": session.document_name(kind, id)?, "fields": fields },
            "updateMask": { "fieldPaths": mask },
            "updateTransforms": [
                { "fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME" }
            ],
            "currentDocument": { "exists": true }
        });
        let request = session
            .client
            .post(session.commit_url())
            .json(&json!({ "writes": [write] }));

        match session.send(request).await {
            Ok(_) => {
                debug!("{} {} updated", kind.label(), id);
                Ok(())
            }
            Err(SendError::Api(e)) if e.kind() == StorageErrorKind::NotFound => {
                Err(StorageError::not_found(format!("{} {} not found", kind.label(), id)).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let session = self.session().await?;
        let request = session.client.delete(session.document_url(kind, id)?);
        session.send(request).await?;
        debug!("{} {} deleted", kind.label(), id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("isPublic"), "isPublic");
        assert_eq!(field_path("_meta2"), "_meta2");
        assert_eq!(field_path("2nd"), "`2nd`");
        assert_eq!(field_path("with space"), "`with space`");
        assert_eq!(field_path("a`b"), "`a\\`b`");
    }

    #[test]
    fn test_document_id_rules() {
        for id in ["abc123", "abc?x=1", "with space", "a.b", "#tag"] {
            assert!(check_document_id(id).is_ok(), "{}", id);
        }
        for id in ["", ".", "..", "a/b", "../palettes/x"] {
            let err = check_document_id(id).unwrap_err();
            assert_eq!(err.storage_kind(), Some(StorageErrorKind::Invalid), "{}", id);
        }
    }

    #[test]
    fn test_error_classification() {
        let cases = [
            ("NOT_FOUND", 404, StorageErrorKind::NotFound),
            ("PERMISSION_DENIED", 403, StorageErrorKind::PermissionDenied),
            ("UNAUTHENTICATED", 401, StorageErrorKind::PermissionDenied),
            ("UNAVAILABLE", 503, StorageErrorKind::Unreachable),
            ("INVALID_ARGUMENT", 400, StorageErrorKind::Invalid),
            ("RESOURCE_EXHAUSTED", 429, StorageErrorKind::Other),
        ];
        for (status, code, expected) in cases {
            let err = ApiError {
                code,
                message: "boom".to_string(),
                status: status.to_string(),
            };
            assert_eq!(err.kind(), expected, "{}", status);
        }
    }

    #[test]
    fn test_unparseable_error_body_falls_back_to_http_status() {
        let err = ApiError::parse(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.kind(), StorageErrorKind::Unreachable);
        assert!(err.describe().starts_with("HTTP 502"));
    }

    #[test]
    fn test_document_into_record_prefers_field_timestamps() {
        let document: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/palettes/abc123",
            "fields": {
                "name": { "stringValue": "Sunset" },
                "createdAt": { "timestampValue": "2024-01-01T00:00:00Z" }
            },
            "createTime": "2024-02-02T00:00:00Z",
            "updateTime": "2024-03-03T00:00:00Z"
        }))
        .unwrap();

        let record = document.into_record();
        assert_eq!(record.id, "abc123");
        assert_eq!(record.attribute("name"), Some(&json!("Sunset")));
        assert!(record.attribute("createdAt").is_none());
        assert_eq!(
            record.created_at.unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
        assert_eq!(
            record.updated_at.unwrap().to_rfc3339(),
            "2024-03-03T00:00:00+00:00"
        );
    }
}
