//! Offline configuration checks run before any adapter is built.

use crate::{BackendConfig, BackendType};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

// `<project-number>:<sender-id>:web:<hex>`
static APP_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:\d+:web:[a-f0-9]+$").unwrap());

static HTTP_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[A-Za-z0-9.\-]+(:\d{1,5})?(/\S*)?$").unwrap());

/// Outcome of [`validate_config`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

type FormatCheck = fn(&str) -> Option<&'static str>;

struct FieldSpec {
    name: &'static str,
    required: bool,
    check: Option<FormatCheck>,
}

const fn required(name: &'static str, check: Option<FormatCheck>) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
        check,
    }
}

const fn optional(name: &'static str, check: Option<FormatCheck>) -> FieldSpec {
    FieldSpec {
        name,
        required: false,
        check,
    }
}

fn check_auth_domain(v: &str) -> Option<&'static str> {
    (!v.ends_with(".firebaseapp.com")).then_some("authDomain should end with .firebaseapp.com")
}

fn check_storage_bucket(v: &str) -> Option<&'static str> {
    // legacy and current bucket naming
    const SUFFIXES: [&str; 2] = [".appspot.com", ".firebasestorage.app"];
    (!SUFFIXES.iter().any(|s| v.ends_with(s)))
        .then_some("storageBucket should end with .appspot.com or .firebasestorage.app")
}

fn check_app_id(v: &str) -> Option<&'static str> {
    (!APP_ID_REGEX.is_match(v)).then_some("appId format appears invalid")
}

fn check_firebase_api_key(v: &str) -> Option<&'static str> {
    (!v.starts_with("AIza")).then_some("apiKey format appears invalid")
}

fn check_endpoint(v: &str) -> Option<&'static str> {
    (!HTTP_URL_REGEX.is_match(v)).then_some("endpoint must be an http(s) URL")
}

fn check_supabase_url(v: &str) -> Option<&'static str> {
    (!HTTP_URL_REGEX.is_match(v)).then_some("url must be an http(s) URL")
}

fn check_mongo_uri(v: &str) -> Option<&'static str> {
    (!(v.starts_with("mongodb://") || v.starts_with("mongodb+srv://")))
        .then_some("connectionString should start with mongodb:// or mongodb+srv://")
}

fn check_port(v: &str) -> Option<&'static str> {
    match v.parse::<u16>() {
        Ok(p) if p > 0 => None,
        _ => Some("port must be a number between 1 and 65535"),
    }
}

const FIREBASE_FIELDS: &[FieldSpec] = &[
    required("apiKey", Some(check_firebase_api_key)),
    required("authDomain", Some(check_auth_domain)),
    required("projectId", None),
    required("storageBucket", Some(check_storage_bucket)),
    required("messagingSenderId", None),
    required("appId", Some(check_app_id)),
    optional("measurementId", None),
    optional("endpoint", Some(check_endpoint)),
];

const SUPABASE_FIELDS: &[FieldSpec] = &[
    required("url", Some(check_supabase_url)),
    required("anonKey", None),
];

const MONGODB_FIELDS: &[FieldSpec] = &[
    required("connectionString", Some(check_mongo_uri)),
    optional("database", None),
];

const SQL_SERVER_FIELDS: &[FieldSpec] = &[
    required("host", None),
    required("port", Some(check_port)),
    required("database", None),
    required("username", None),
    optional("password", None),
];

const SQLITE_FIELDS: &[FieldSpec] = &[required("path", None)];

const AIRTABLE_FIELDS: &[FieldSpec] = &[required("apiKey", None), required("baseId", None)];

const NOTION_FIELDS: &[FieldSpec] = &[required("apiKey", None), required("databaseId", None)];

fn fields_for(backend_type: BackendType) -> &'static [FieldSpec] {
    match backend_type {
        BackendType::Firebase => FIREBASE_FIELDS,
        BackendType::Supabase => SUPABASE_FIELDS,
        BackendType::MongoDb => MONGODB_FIELDS,
        BackendType::PostgreSql | BackendType::MySql => SQL_SERVER_FIELDS,
        BackendType::Sqlite => SQLITE_FIELDS,
        BackendType::Airtable => AIRTABLE_FIELDS,
        BackendType::Notion => NOTION_FIELDS,
    }
}

enum FieldValue {
    Missing,
    Text(String),
    WrongType,
}

/// Blank strings and nulls count as missing
fn field_value(config: &BackendConfig, name: &str) -> FieldValue {
    if let Some(text) = config.text(name) {
        return FieldValue::Text(text);
    }
    match config.get(name) {
        None | Some(Value::Null) | Some(Value::String(_)) => FieldValue::Missing,
        Some(_) => FieldValue::WrongType,
    }
}

/// Required field names for a backend type, in declaration order
pub fn required_fields(backend_type: BackendType) -> Vec<&'static str> {
    fields_for(backend_type)
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name)
        .collect()
}

/// Validate a configuration for a backend type.
///
/// Missing required fields are reported first, then format problems, each group
/// in the order the backend declares its fields. Never touches the network.
pub fn validate_config(backend_type: BackendType, config: &BackendConfig) -> ValidationReport {
    let fields = fields_for(backend_type);

    let mut errors: Vec<String> = fields
        .iter()
        .filter(|f| f.required && matches!(field_value(config, f.name), FieldValue::Missing))
        .map(|f| format!("{} is required", f.name))
        .collect();

    for field in fields {
        match field_value(config, field.name) {
            FieldValue::WrongType => {
                errors.push(format!("{} must be a string or number", field.name));
            }
            FieldValue::Text(value) => {
                if let Some(message) = field.check.and_then(|check| check(value.trim())) {
                    errors.push(message.to_string());
                }
            }
            FieldValue::Missing => {}
        }
    }

    ValidationReport::from_errors(errors)
}
