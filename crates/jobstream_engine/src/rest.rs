use std::time::Duration;

use bytes::Bytes;
use jobstream_core::{JobId, JobMetrics, JobStatus, ProgressSnapshot};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::RuntimeConfig;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientSettings {
    pub(crate) fn build_http(&self) -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// REST snapshot of a job as returned by `GET /api/v1/jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub flavor_name: Option<String>,
    #[serde(default)]
    pub progress: Option<ProgressSnapshot>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub cumulative_metrics: Option<JobMetrics>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub current_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobVersion {
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub is_current: bool,
    /// Omitted by the list endpoint.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Docx,
    Pdf,
    Markdown,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Markdown => "markdown",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Docx => "docx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Markdown => "md",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    /// Server-suggested filename from `Content-Disposition`, if any.
    pub filename: Option<String>,
}

#[derive(Serialize)]
struct SaveResultBody<'a> {
    result: &'a serde_json::Value,
}

/// Typed client for the gateway's job endpoints.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    api_base: Url,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(config: &RuntimeConfig, settings: &ClientSettings) -> Result<Self, ApiError> {
        let api_base = Url::parse(&config.api_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", config.api_url)))?;
        if api_base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(config.api_url.clone()));
        }
        Ok(Self {
            api_base,
            http: settings.build_http()?,
        })
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<JobRecord, ApiError> {
        let url = self.endpoint(&["jobs", job_id.as_str()])?;
        send_json(self.http.get(url)).await
    }

    pub async fn cancel_job(&self, job_id: &JobId) -> Result<(), ApiError> {
        let url = self.endpoint(&["jobs", job_id.as_str(), "cancel"])?;
        send(self.http.post(url)).await.map(drop)
    }

    pub async fn delete_job(&self, job_id: &JobId) -> Result<(), ApiError> {
        let url = self.endpoint(&["jobs", job_id.as_str()])?;
        send(self.http.request(Method::DELETE, url)).await.map(drop)
    }

    pub async fn list_versions(&self, job_id: &JobId) -> Result<Vec<JobVersion>, ApiError> {
        let url = self.endpoint(&["jobs", job_id.as_str(), "versions"])?;
        send_json(self.http.get(url)).await
    }

    pub async fn get_version(&self, job_id: &JobId, version: u32) -> Result<JobVersion, ApiError> {
        let version = version.to_string();
        let url = self.endpoint(&["jobs", job_id.as_str(), "versions", &version])?;
        send_json(self.http.get(url)).await
    }

    pub async fn restore_version(
        &self,
        job_id: &JobId,
        version: u32,
    ) -> Result<JobVersion, ApiError> {
        let version = version.to_string();
        let url = self.endpoint(&["jobs", job_id.as_str(), "versions", &version, "restore"])?;
        send_json(self.http.post(url)).await
    }

    /// Stores an edited result; the backend answers with the new version.
    pub async fn save_result(
        &self,
        job_id: &JobId,
        result: &serde_json::Value,
    ) -> Result<JobVersion, ApiError> {
        let url = self.endpoint(&["jobs", job_id.as_str(), "result"])?;
        let body = serde_json::to_vec(&SaveResultBody { result })
            .map_err(|err| ApiError::Decode(err.to_string()))?;
        let request = self
            .http
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        send_json(request).await
    }

    pub async fn export_job(
        &self,
        job_id: &JobId,
        format: ExportFormat,
    ) -> Result<ExportedDocument, ApiError> {
        let mut url = self.endpoint(&["jobs", job_id.as_str(), "export"])?;
        url.query_pairs_mut().append_pair("format", format.as_str());
        let response = send(self.http.get(url)).await?;
        let content_type = header_string(&response, CONTENT_TYPE);
        let filename = header_string(&response, CONTENT_DISPOSITION)
            .as_deref()
            .and_then(disposition_filename);
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(ExportedDocument {
            bytes,
            content_type,
            filename,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        api_endpoint(&self.api_base, segments)
    }
}

/// `{base}/api/v1/{segments...}` with each segment percent-encoded.
pub(crate) fn api_endpoint(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(["api", "v1"])
        .extend(segments);
    Ok(url)
}

pub(crate) async fn send(request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(ApiError::HttpStatus {
        status: status.as_u16(),
        message: error_detail(&body).unwrap_or_else(|| status.to_string()),
    })
}

pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = send(request).await?;
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
}

/// Backend errors carry `{"detail": "..."}`; anything else falls back to the status line.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

fn header_string(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn disposition_filename(disposition: &str) -> Option<String> {
    disposition.split(';').map(str::trim).find_map(|part| {
        let value = part.strip_prefix("filename=")?;
        let value = value.trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout;
    }
    ApiError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_job_segments() {
        let base = Url::parse("http://gateway.test/prefix/").unwrap();
        let url = api_endpoint(&base, &["jobs", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://gateway.test/prefix/api/v1/jobs/a%20b%2Fc");
    }

    #[test]
    fn disposition_filename_is_extracted() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="report.docx""#).as_deref(),
            Some("report.docx")
        );
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn detail_is_preferred_over_status_line() {
        assert_eq!(
            error_detail(br#"{"detail":"Job not found"}"#).as_deref(),
            Some("Job not found")
        );
        assert_eq!(error_detail(b"<html>"), None);
    }
}
