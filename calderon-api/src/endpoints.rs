//! Endpoint table and client configuration.

use crate::error::ApiError;
use url::Url;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Environment variable consulted for the base URL.
pub const BASE_URL_ENV: &str = "CALDERON_API_BASE_URL";

/// Endpoint paths relative to the base URL. Dynamic segments (directory,
/// filename) are appended separately so they get percent-encoded.
pub mod paths {
    pub const FILES: &str = "/files";
    pub const FILES_DOWNLOAD: &str = "/files/download";

    pub const PRECIPITATION_CSV: &str = "/precipitation/csv";
    pub const PRECIPITATION_XLSX: &str = "/precipitation/xlsx";
    pub const PRECIPITATION_DATA3: &str = "/precipitation/data3";

    pub const WATER_DATA: &str = "/water/data";
    pub const WATER_PREDICT: &str = "/water/predict";
    pub const WATER_COMPARE: &str = "/water/compare";
    pub const WATER_FORECAST: &str = "/water/forecast";

    pub const REPORTS_GENERATE_CSV: &str = "/reports/generate/csv";
    pub const REPORTS_GENERATE_PDF: &str = "/reports/generate/pdf";
    pub const REPORTS_GENERATE_PDF_EMAIL: &str = "/reports/generate/pdf-and-email";
    pub const REPORTS_HISTORY: &str = "/reports/history";
    pub const REPORTS_HISTORY_CSV: &str = "/reports/history/csv";
    pub const REPORTS_HISTORY_PDF: &str = "/reports/history/pdf";
    pub const REPORTS_TEST_EMAIL: &str = "/reports/test-email-config";
    pub const REPORTS_DOWNLOAD_CSV: &str = "/reports/download/csv";
    pub const REPORTS_DOWNLOAD_PDF: &str = "/reports/download/pdf";

    pub const CHAT: &str = "/chat/chatbot";

    pub const INTERPRETATION: &str = "/ia/interpretar";
}

/// Where the backend lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> Self {
        ApiConfig {
            base_url: base_url.into(),
            timeout_ms,
        }
    }

    /// Human-readable configuration problems; empty when usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.base_url.trim().is_empty() {
            issues.push("API base URL is not configured".to_string());
        } else if !self.base_url.starts_with("http") {
            issues.push(
                "API base URL must be a valid URL (start with http:// or https://)".to_string(),
            );
        } else if let Err(e) = Url::parse(&self.base_url) {
            issues.push(format!("API base URL does not parse: {e}"));
        }
        if self.timeout_ms == 0 {
            issues.push("timeout must be greater than zero".to_string());
        }
        issues
    }

    /// Build the full URL for `path` followed by percent-encoded `segments`.
    pub fn endpoint_url(&self, path: &str, segments: &[&str]) -> Result<Url, ApiError> {
        self.endpoint_url_with_query(path, segments, &[])
    }

    pub fn endpoint_url_with_query(
        &self,
        path: &str,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Url, ApiError> {
        let invalid = |message: String| ApiError::InvalidBaseUrl {
            url: self.base_url.clone(),
            message,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        {
            let mut path_segments = url
                .path_segments_mut()
                .map_err(|_| invalid("cannot be a base".to_string()))?;
            path_segments.pop_if_empty();
            path_segments.extend(path.split('/').filter(|s| !s.is_empty()));
            path_segments.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}
