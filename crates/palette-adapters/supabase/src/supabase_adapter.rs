//! Supabase adapter speaking PostgREST at `{url}/rest/v1`.
//!
//! Tables are named after the entity kind; rows carry an `id` primary key plus
//! `created_at` / `updated_at` columns.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use palette_core::{
    BackendConfig, BackendType, ConnectionError, ConnectionId, EntityKind, EntityRecord, Error,
    Patch, ProbeOutcome, Result, SessionHandle, StorageAdapter, StorageError, StorageErrorKind,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const REST_PATH: &str = "/rest/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TABLE: EntityKind = EntityKind::Palettes;
const RETURN_REPRESENTATION: &str = "return=representation";

/// PostgREST / gateway error body
#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(skip)]
    http_status: u16,
}

impl ApiError {
    fn parse(status: StatusCode, body: &str) -> Self {
        let mut err = serde_json::from_str::<ApiError>(body).unwrap_or_else(|_| ApiError {
            code: None,
            message: body.trim().to_string(),
            http_status: 0,
        });
        err.http_status = status.as_u16();
        err
    }

    /// Table is not provisioned (legacy and schema-cache variants)
    fn is_missing_relation(&self) -> bool {
        matches!(self.code.as_deref(), Some("42P01") | Some("PGRST205"))
            || (self.message.contains("relation") && self.message.contains("does not exist"))
    }

    fn kind(&self) -> StorageErrorKind {
        if self.is_missing_relation() {
            return StorageErrorKind::NotFound;
        }
        match self.code.as_deref() {
            Some("PGRST116") => StorageErrorKind::NotFound,
            Some("42501") => StorageErrorKind::PermissionDenied,
            Some(code) if code.starts_with("22") || code.starts_with("23") => {
                StorageErrorKind::Invalid
            }
            _ => match self.http_status {
                404 => StorageErrorKind::NotFound,
                401 | 403 => StorageErrorKind::PermissionDenied,
                400 | 409 | 422 => StorageErrorKind::Invalid,
                502..=504 => StorageErrorKind::Unreachable,
                _ => StorageErrorKind::Other,
            },
        }
    }

    fn describe(&self) -> String {
        match &self.code {
            Some(code) => format!("{} ({}): {}", code, self.http_status, self.message),
            None => format!("HTTP {}: {}", self.http_status, self.message),
        }
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
            SendError::Api(e) => StorageError::new(e.kind(), e.describe()).into(),
        }
    }
}

fn now_text() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn take_timestamp(row: &mut Map<String, Value>, column: &str) -> Option<DateTime<Utc>> {
    match row.remove(column)? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

fn row_id(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Split a returned row into the opaque record shape
fn into_record(row: Value) -> Result<EntityRecord> {
    let Value::Object(mut row) = row else {
        return Err(StorageError::other("expected a JSON object row").into());
    };
    let id = row_id(row.remove("id"))
        .ok_or_else(|| StorageError::other("row is missing its id column"))?;
    let created_at = take_timestamp(&mut row, "created_at");
    let updated_at = take_timestamp(&mut row, "updated_at");

    let mut record = EntityRecord::new(id, row);
    record.created_at = created_at;
    record.updated_at = updated_at;
    Ok(record)
}

#[derive(Clone)]
struct Session {
    client: Client,
    rest_url: String,
    name: String,
}

impl Session {
    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.rest_url, kind.collection())
    }

    async fn send(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<reqwest::Response, SendError> {
        let response = request.send().await.map_err(SendError::Transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SendError::Api(ApiError::parse(status, &body)))
    }

    async fn rows(&self, request: RequestBuilder) -> Result<Vec<Value>> {
        self.send(request)
            .await?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StorageError::other(format!("unexpected PostgREST response: {}", e)).into())
    }
}

fn auth_headers(anon_key: &str) -> std::result::Result<HeaderMap, ConnectionError> {
    let invalid = |_| ConnectionError::invalid_config("anonKey contains invalid characters");

    let mut headers = HeaderMap::new();
    headers.insert("apikey", HeaderValue::from_str(anon_key).map_err(invalid)?);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", anon_key)).map_err(invalid)?,
    );
    Ok(headers)
}

/// Supabase-backed [`StorageAdapter`]
pub struct SupabaseAdapter {
    connection_id: ConnectionId,
    session: RwLock<Option<Session>>,
}

impl SupabaseAdapter {
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
            .get(session.table_url(PROBE_TABLE))
            .query(&[("select", "count"), ("limit", "1")]);

        let e = match session.send(request).await {
            Ok(_) => return Ok(ProbeOutcome::Accessible),
            Err(SendError::Transport(e)) => {
                return Err(ConnectionError::unreachable(format!(
                    "Supabase connection failed: {}",
                    e
                ))
                .into())
            }
            Err(SendError::Api(e)) => e,
        };

        if e.is_missing_relation() {
            return Ok(ProbeOutcome::CollectionMissing);
        }
        if e.http_status == 401 {
            return Err(ConnectionError::invalid_credentials(format!(
                "Supabase rejected the anon key: {}",
                e.message
            ))
            .into());
        }
        match e.kind() {
            StorageErrorKind::PermissionDenied => Ok(ProbeOutcome::PermissionDenied),
            StorageErrorKind::Unreachable => Err(ConnectionError::unreachable(format!(
                "Supabase connection failed: {}",
                e.describe()
            ))
            .into()),
            _ => Err(ConnectionError::other(format!(
                "Supabase connection failed: {}",
                e.describe()
            ))
            .into()),
        }
    }
}

#[async_trait]
impl StorageAdapter for SupabaseAdapter {
    fn backend_type(&self) -> BackendType {
        BackendType::Supabase
    }

    async fn connect(&self, config: &BackendConfig) -> Result<ProbeOutcome> {
        let url = config
            .require("url")
            .map_err(|e| ConnectionError::invalid_config(e.to_string()))?;
        let anon_key = config
            .require("anonKey")
            .map_err(|e| ConnectionError::invalid_config(e.to_string()))?;

        let handle = SessionHandle::new(&self.connection_id);
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(handle.name())
            .default_headers(auth_headers(&anon_key)?)
            .build()
            .map_err(|e| ConnectionError::other(format!("failed to build HTTP client: {}", e)))?;

        let session = Session {
            client,
            rest_url: format!("{}{}", url.trim_end_matches('/'), REST_PATH),
            name: handle.name().to_string(),
        };

        info!("Connecting to Supabase at {} as {}", url, session.name);
        let outcome = self.probe(&session).await?;
        match outcome {
            ProbeOutcome::Accessible => info!("Supabase palettes table accessible"),
            ProbeOutcome::PermissionDenied => {
                warn!("Supabase reachable but reading palettes is denied; check row level security")
            }
            ProbeOutcome::CollectionMissing => {
                warn!("Supabase palettes table does not exist yet")
            }
        }

        *self.session.write().await = Some(session);
        Ok(outcome)
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(session) = self.session.write().await.take() {
            info!("Closed Supabase session {}", session.name);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn create(&self, kind: EntityKind, mut attributes: Map<String, Value>) -> Result<String> {
        let session = self.session().await?;
        let now = now_text();
        attributes.insert("created_at".to_string(), now.clone());
        attributes.insert("updated_at".to_string(), now);

        let request = session
            .client
            .post(session.table_url(kind))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&Value::Object(attributes));

        let row = session
            .rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::other("insert returned no row"))?;
        let record = into_record(row)?;

        debug!("{} created with id {}", kind.label(), record.id);
        Ok(record.id)
    }

    async fn get_by_id(&self, kind: EntityKind, id: &str) -> Result<Option<EntityRecord>> {
        let session = self.session().await?;
        let request = session
            .client
            .get(session.table_url(kind))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))]);

        match session.rows(request).await?.into_iter().next() {
            Some(row) => Ok(Some(into_record(row)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self, kind: EntityKind) -> Result<Vec<EntityRecord>> {
        let session = self.session().await?;
        let request = session
            .client
            .get(session.table_url(kind))
            .query(&[("select", "*"), ("order", "created_at.desc")]);

        let records = session
            .rows(request)
            .await?
            .into_iter()
            .map(into_record)
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} {} from Supabase", records.len(), kind);
        Ok(records)
    }

    async fn update(&self, kind: EntityKind, id: &str, patch: &Patch) -> Result<()> {
        let session = self.session().await?;
        let mut written = patch.write_set();
        written.remove("created_at");
        written.insert("updated_at".to_string(), now_text());

        let request = session
            .client
            .patch(session.table_url(kind))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&Value::Object(written));

        if session.rows(request).await?.is_empty() {
            return Err(StorageError::not_found(format!("{} {} not found", kind.label(), id)).into());
        }
        debug!("{} {} updated", kind.label(), id);
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let session = self.session().await?;
        let request = session
            .client
            .delete(session.table_url(kind))
            .query(&[("id", format!("eq.{}", id))]);

        session.send(request).await?;
        debug!("{} {} deleted", kind.label(), id);
        Ok(())
    }
}
