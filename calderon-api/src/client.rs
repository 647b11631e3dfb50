//! Async REST client for the prediction API.
//!
//! One method per backend endpoint. Failures are surfaced as [`ApiError`]
//! and never retried: a failed fetch aborts the refresh and the caller keeps
//! whatever it displayed before.

use crate::endpoints::{paths, ApiConfig};
use crate::error::{ApiError, PayloadError};
use crate::models::{
    ChatRequest, ChatResponse, CompareRequest, CompareResponse, DataResponse, ForecastRequest,
    ForecastResponse, InterpretationRequest, InterpretationResponse, PdfEmailRequest,
    PredictRequest, PredictResponse, ReportEnvelope, ReportKind, WaterDataQuery,
};
use crate::payload::{ColumnarSeries, DatasetEnvelope, FileList, MultiannualTable, YearlyRecords};
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Thin wrapper over a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let issues = config.validate();
        if !issues.is_empty() {
            return Err(ApiError::InvalidBaseUrl {
                url: config.base_url.clone(),
                message: issues.join("; "),
            });
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()?;
        Ok(ApiClient { config, http })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    // ───────────────────── Files & datasets ─────────────────────

    pub async fn list_files(&self, directory: &str) -> Result<FileList, ApiError> {
        let url = self.config.endpoint_url(paths::FILES, &[directory])?;
        self.get_json(url).await
    }

    /// Long-form daily series of one file.
    pub async fn precipitation_csv(
        &self,
        directory: &str,
        filename: &str,
    ) -> Result<DatasetEnvelope<YearlyRecords>, ApiError> {
        let url = self
            .config
            .endpoint_url(paths::PRECIPITATION_CSV, &[directory, filename])?;
        self.dataset(url, YearlyRecords::from_value).await
    }

    /// Monthly-by-year table of one spreadsheet.
    pub async fn precipitation_xlsx(
        &self,
        directory: &str,
        filename: &str,
    ) -> Result<DatasetEnvelope<MultiannualTable>, ApiError> {
        let url = self
            .config
            .endpoint_url(paths::PRECIPITATION_XLSX, &[directory, filename])?;
        self.dataset(url, MultiannualTable::from_value).await
    }

    /// Multi-station columnar series from the comparison directory.
    pub async fn station_comparison(
        &self,
        filename: &str,
    ) -> Result<DatasetEnvelope<ColumnarSeries>, ApiError> {
        let url = self
            .config
            .endpoint_url(paths::PRECIPITATION_DATA3, &[filename])?;
        self.dataset(url, ColumnarSeries::from_value).await
    }

    /// Save a raw data file to `dest`, returning the number of bytes written.
    pub async fn download_file(
        &self,
        directory: &str,
        filename: &str,
        dest: &Path,
    ) -> Result<u64, ApiError> {
        let url = self
            .config
            .endpoint_url(paths::FILES_DOWNLOAD, &[directory, filename])?;
        self.download(url, dest).await
    }

    // ───────────────────── Consumption ─────────────────────

    pub async fn water_data(&self, query: &WaterDataQuery) -> Result<DataResponse, ApiError> {
        let url = self
            .config
            .endpoint_url_with_query(paths::WATER_DATA, &[], &query.query_pairs())?;
        self.get_json(url).await
    }

    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictResponse, ApiError> {
        request.validate()?;
        let url = self.config.endpoint_url(paths::WATER_PREDICT, &[])?;
        self.post_json(url, Some(request)).await
    }

    pub async fn compare(&self, request: &CompareRequest) -> Result<CompareResponse, ApiError> {
        request.validate()?;
        let url = self.config.endpoint_url(paths::WATER_COMPARE, &[])?;
        self.post_json(url, Some(request)).await
    }

    pub async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse, ApiError> {
        request.validate()?;
        let url = self.config.endpoint_url(paths::WATER_FORECAST, &[])?;
        self.post_json(url, Some(request)).await
    }

    // ───────────────────── Reports ─────────────────────

    pub async fn generate_report(
        &self,
        kind: ReportKind,
        request: &ForecastRequest,
    ) -> Result<ReportEnvelope, ApiError> {
        request.validate()?;
        let url = self.config.endpoint_url(kind.generate_path(), &[])?;
        self.post_json(url, Some(request)).await
    }

    pub async fn generate_pdf_and_email(
        &self,
        request: &PdfEmailRequest,
    ) -> Result<ReportEnvelope, ApiError> {
        request.forecast_request.validate()?;
        request.email_request.validate()?;
        let url = self
            .config
            .endpoint_url(paths::REPORTS_GENERATE_PDF_EMAIL, &[])?;
        self.post_json(url, Some(request)).await
    }

    /// Report history, optionally restricted to one report type.
    pub async fn report_history(
        &self,
        kind: Option<ReportKind>,
    ) -> Result<ReportEnvelope, ApiError> {
        let path = kind.map_or(paths::REPORTS_HISTORY, ReportKind::history_path);
        let url = self.config.endpoint_url(path, &[])?;
        self.get_json(url).await
    }

    pub async fn test_email_config(&self) -> Result<ReportEnvelope, ApiError> {
        let url = self.config.endpoint_url(paths::REPORTS_TEST_EMAIL, &[])?;
        self.post_json::<Value, _>(url, None).await
    }

    pub async fn download_report(
        &self,
        kind: ReportKind,
        filename: &str,
        dest: &Path,
    ) -> Result<u64, ApiError> {
        let url = self.config.endpoint_url(kind.download_path(), &[filename])?;
        self.download(url, dest).await
    }

    // ───────────────────── Assistants ─────────────────────

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        if request.pregunta.trim().is_empty() {
            return Err(ApiError::InvalidRequest("question is empty".to_string()));
        }
        let url = self.config.endpoint_url(paths::CHAT, &[])?;
        self.post_json(url, Some(request)).await
    }

    pub async fn interpret(
        &self,
        request: &InterpretationRequest,
    ) -> Result<InterpretationResponse, ApiError> {
        let url = self.config.endpoint_url(paths::INTERPRETATION, &[])?;
        self.post_json(url, Some(request)).await
    }

    // ───────────────────── Plumbing ─────────────────────

    async fn dataset<T, F>(&self, url: Url, decoder: F) -> Result<DatasetEnvelope<T>, ApiError>
    where
        F: FnOnce(&Value) -> Result<T, PayloadError>,
    {
        let envelope: DatasetEnvelope<Value> = self.get_json(url).await?;
        let decoded = envelope.decode(decoder)?;
        info!("Loaded dataset {}", decoded.filename);
        Ok(decoded)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        debug!("GET {url}");
        let response = self.send(self.http.get(url)).await?;
        self.read_json(response).await
    }

    async fn post_json<B, T>(&self, url: Url, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {url}");
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(request).await?;
        self.read_json(response).await
    }

    async fn download(&self, url: Url, dest: &Path) -> Result<u64, ApiError> {
        debug!("GET {url} -> {}", dest.display());
        let response = self.send(self.http.get(url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        tokio::fs::write(dest, &bytes).await?;
        info!("Wrote {} bytes to {}", bytes.len(), dest.display());
        Ok(bytes.len() as u64)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await.unwrap_or_default();
        let message = error_message(status.as_u16(), status.canonical_reason(), &body);
        warn!("Request failed with {status}: {message}");
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.config.timeout_ms)
        } else {
            ApiError::Transport(err)
        }
    }
}

/// Message for a non-2xx response: the backend's `detail` when the body
/// carries one, otherwise `HTTP {status}: {reason}`.
fn error_message(status: u16, reason: Option<&str>, body: &[u8]) -> String {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").cloned());
    match detail {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(other) if !other.is_null() && !other.is_string() => other.to_string(),
        _ => format!("HTTP {status}: {}", reason.unwrap_or("")),
    }
}
