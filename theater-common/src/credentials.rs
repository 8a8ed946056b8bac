//! Session credential store: cookie records and the formats they load from.
//!
//! Three on-disk shapes are accepted:
//!
//! - a browser storage-state document, `{"cookies": [...], "origins": [...]}`
//! - a bare JSON list of cookie records
//! - a Netscape `cookies.txt` export (seven tab-separated columns)
//!
//! A missing store is not an error: the run proceeds unauthenticated.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Result, TheaterError};

/// Expiry value used for cookies that live for the browser session only.
pub const SESSION_EXPIRY: i64 = -1;

/// One cookie to be injected into the browser before navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    /// Unix seconds; [`SESSION_EXPIRY`] for session cookies.
    #[serde(default = "session_expiry", deserialize_with = "unix_seconds")]
    pub expires: i64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub http_only: bool,
}

fn default_path() -> String {
    "/".into()
}

fn session_expiry() -> i64 {
    SESSION_EXPIRY
}

// Browser exports write fractional seconds.
fn unix_seconds<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Ok(secs.trunc() as i64)
}

impl CookieRecord {
    pub fn is_session(&self) -> bool {
        self.expires <= 0
    }

    /// True when a persistent cookie expired before `now_unix`.
    pub fn is_expired(&self, now_unix: i64) -> bool {
        !self.is_session() && self.expires < now_unix
    }

    /// Domain without the leading dot used for subdomain matching.
    pub fn host(&self) -> &str {
        self.domain.trim_start_matches('.')
    }

    /// True when the cookie's domain is `host` or a parent of it on a label
    /// boundary. A cookie without a domain applies nowhere.
    pub fn applies_to(&self, host: &str) -> bool {
        let domain = self.host();
        if domain.is_empty() {
            return false;
        }
        host.eq_ignore_ascii_case(domain)
            || host
                .len()
                .checked_sub(domain.len() + 1)
                .and_then(|dot| host.get(dot..))
                .and_then(|tail| tail.strip_prefix('.'))
                .is_some_and(|suffix| suffix.eq_ignore_ascii_case(domain))
    }
}

/// Browser storage-state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    pub cookies: Vec<CookieRecord>,
    #[serde(default)]
    pub origins: Vec<Value>,
}

/// Load a cookie store from disk, detecting its format.
///
/// Returns an empty list when the file does not exist.
pub async fn load_cookie_store(path: &Path) -> Result<Vec<CookieRecord>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                target: "theater.credentials",
                path = %path.display(),
                "cookie store not found; proceeding without authentication"
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let cookies = parse_cookie_store(&raw).map_err(|reason| TheaterError::CookieStore {
        path: path.to_path_buf(),
        reason,
    })?;
    info!(
        target: "theater.credentials",
        path = %path.display(),
        count = cookies.len(),
        "loaded cookie store"
    );
    Ok(cookies)
}

/// Parse any supported format from an in-memory string.
pub fn parse_cookie_store(raw: &str) -> std::result::Result<Vec<CookieRecord>, String> {
    match raw.trim_start().chars().next() {
        Some('{') | Some('[') => parse_json_store(raw),
        _ => Ok(parse_netscape(raw)),
    }
}

fn parse_json_store(raw: &str) -> std::result::Result<Vec<CookieRecord>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let list = match value {
        Value::Object(mut obj) => obj.remove("cookies").ok_or_else(|| {
            "unknown cookie format: expecting a list or an object with a 'cookies' key".to_string()
        })?,
        list @ Value::Array(_) => list,
        _ => return Err("unknown cookie format".into()),
    };
    serde_json::from_value(list).map_err(|e| e.to_string())
}

/// Parse a Netscape `cookies.txt` export.
///
/// Comment lines are skipped except for the `#HttpOnly_` prefix, which
/// marks an HTTP-only cookie. Malformed lines are ignored.
pub fn parse_netscape(raw: &str) -> Vec<CookieRecord> {
    const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

    let mut cookies = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim_end_matches(['\r', '\n']);
        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 7 {
            debug!(target: "theater.credentials", lineno, "skipping short cookies.txt line");
            continue;
        }
        let expires = match parts[4] {
            "0" => SESSION_EXPIRY,
            other => match other.parse::<i64>() {
                Ok(ts) => ts,
                Err(_) => {
                    debug!(target: "theater.credentials", lineno, "skipping line with bad expiry");
                    continue;
                }
            },
        };
        cookies.push(CookieRecord {
            domain: parts[0].to_string(),
            path: parts[2].to_string(),
            secure: parts[3] == "TRUE",
            expires,
            name: parts[5].to_string(),
            value: parts[6].to_string(),
            http_only,
        });
    }
    cookies
}

/// Render cookies as a storage-state JSON document.
pub fn to_storage_state_json(cookies: Vec<CookieRecord>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&StorageState {
        cookies,
        origins: Vec::new(),
    })
}
