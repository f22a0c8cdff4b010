//! Garmin Connect API client for authenticated requests
//!
//! Implements [`ActivitySource`] against the Connect REST API using an
//! OAuth2 bearer token obtained out of band.

use std::io::{Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::client::tokens::OAuth2Token;
use crate::client::ActivitySource;
use crate::error::{GarminError, Result};
use crate::models::ActivitySummary;
use crate::parser::FileFormat;

/// User agent for Connect API requests
const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Garmin Connect API client
pub struct GarminClient {
    client: Client,
    base_url: String,
    token: OAuth2Token,
}

impl GarminClient {
    /// Create a new API client for the given domain
    pub fn new(domain: &str, token: OAuth2Token, timeout: Duration) -> Result<Self> {
        Self::new_with_base_url(&format!("https://connectapi.{}", domain), token, timeout)
    }

    /// Create a new API client with a custom base URL (for testing)
    #[doc(hidden)]
    pub fn new_with_base_url(base_url: &str, token: OAuth2Token, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GarminError::Connectivity(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build the full URL for a given path
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build headers with authorization
    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let auth = HeaderValue::from_str(&self.token.authorization_header())
            .map_err(|_| GarminError::auth("Access token contains invalid header characters"))?;
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }

    /// Make an authenticated GET request and return the response
    async fn get(&self, path: &str) -> Result<Response> {
        let url = self.build_url(path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers()?)
            .send()
            .await
            .map_err(transport_error)?;

        handle_response_status(response).await
    }

    /// Make an authenticated GET request and return raw bytes
    async fn get_bytes(&self, path: &str) -> Result<Bytes> {
        let response = self.get(path).await?;
        response.bytes().await.map_err(transport_error)
    }
}

#[async_trait]
impl ActivitySource for GarminClient {
    async fn list_activities(&self, offset: u32, limit: u32) -> Result<Vec<ActivitySummary>> {
        let path = format!(
            "/activitylist-service/activities/search/activities?start={}&limit={}",
            offset, limit
        );
        let body = self.get_bytes(&path).await?;
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| GarminError::protocol(format!("Activity list is not JSON: {}", e)))?;
        decode_activity_page(value)
    }

    async fn download_activity(&self, remote_id: i64, format: FileFormat) -> Result<Bytes> {
        let path = match format {
            FileFormat::Fit => format!("/download-service/files/activity/{}", remote_id),
            FileFormat::Tcx | FileFormat::Gpx => format!(
                "/download-service/export/{}/activity/{}",
                format.as_str(),
                remote_id
            ),
        };

        let bytes = self.get_bytes(&path).await.map_err(|e| match e {
            GarminError::NotFound(_) => GarminError::NotFound(format!("activity {} ({})", remote_id, format)),
            other => other,
        })?;

        if bytes.starts_with(ZIP_MAGIC) {
            debug!(remote_id, size = bytes.len(), "Unwrapping zipped activity file");
            return unzip_first_entry(&bytes);
        }
        Ok(bytes)
    }
}

/// Decode an activity list body.
///
/// Accepts `{"activityList": [...]}`, a bare array, or a map carrying the
/// list under `results` or `activities`.
pub fn decode_activity_page(value: Value) -> Result<Vec<ActivitySummary>> {
    let list = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => ["activityList", "results", "activities"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(v @ Value::Array(_)) => Some(v),
                _ => None,
            })
            .ok_or_else(|| {
                GarminError::protocol(format!(
                    "Activity list has none of the expected keys (found: {})",
                    map.keys().cloned().collect::<Vec<_>>().join(", ")
                ))
            })?,
        other => {
            return Err(GarminError::protocol(format!(
                "Activity list must be an array or object, got {}",
                json_kind(&other)
            )))
        }
    };

    serde_json::from_value(list)
        .map_err(|e| GarminError::protocol(format!("Malformed activity summary: {}", e)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extract the first entry of a zip archive
fn unzip_first_entry(bytes: &[u8]) -> Result<Bytes> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| GarminError::decode(format!("Invalid zip archive: {}", e)))?;
    let mut entry = archive
        .by_index(0)
        .map_err(|e| GarminError::decode(format!("Empty zip archive: {}", e)))?;

    let mut out = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut out)
        .map_err(|e| GarminError::decode(format!("Corrupt zip entry {}: {}", entry.name(), e)))?;
    Ok(Bytes::from(out))
}

/// Timeouts and connection failures are connectivity errors
fn transport_error(err: reqwest::Error) -> GarminError {
    if err.is_timeout() || err.is_connect() {
        GarminError::Connectivity(err.to_string())
    } else {
        GarminError::Http(err)
    }
}

/// Handle response status codes and convert to errors
async fn handle_response_status(response: Response) -> Result<Response> {
    let status = response.status();

    match status {
        StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => {
            Ok(response)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GarminError::NotAuthenticated),
        StatusCode::TOO_MANY_REQUESTS => Err(GarminError::RateLimited),
        StatusCode::NOT_FOUND => Err(GarminError::NotFound(response.url().path().to_string())),
        s if s.is_server_error() => {
            let body = response.text().await.unwrap_or_default();
            Err(GarminError::Connectivity(format!("API error {}: {}", status, body)))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(GarminError::protocol(format!("API error {}: {}", status, body)))
        }
    }
}
