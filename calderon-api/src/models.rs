//! Request and response models for the consumption, forecast, report,
//! chatbot and interpretation endpoints.
//!
//! Field names follow the backend's JSON exactly (`anio`, `mes`, ...).
//! Optional request fields are omitted from the body when unset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::endpoints::paths;
use crate::error::ApiError;

fn check_month(month: u32) -> Result<(), ApiError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "month must be between 1 and 12, got {month}"
        )))
    }
}

// ───────────────────── Consumption ─────────────────────

/// Filter for `/water/data`: `year_from`, `year_to`, repeated `months`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WaterDataQuery {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub months: Vec<u32>,
}

impl WaterDataQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(year_from) = self.year_from {
            pairs.push(("year_from", year_from.to_string()));
        }
        if let Some(year_to) = self.year_to {
            pairs.push(("year_to", year_to.to_string()));
        }
        for month in &self.months {
            pairs.push(("months", month.to_string()));
        }
        pairs
    }
}

/// Raw consumption rows; the columns depend on the backend dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataResponse {
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictItem {
    pub anio: i32,
    pub mes: u32,
    pub precipitacion_mm: f64,
    pub poblacion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub items: Vec<PredictItem>,
}

impl PredictRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.items.is_empty() {
            return Err(ApiError::InvalidRequest(
                "at least one item is required".to_string(),
            ));
        }
        self.items.iter().try_for_each(|item| check_month(item.mes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompareRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_to: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub months: Option<Vec<u32>>,
}

impl CompareRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        self.months
            .iter()
            .flatten()
            .try_for_each(|month| check_month(*month))
    }
}

/// Real vs predicted consumption for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRow {
    pub anio: i32,
    pub mes: u32,
    pub real: f64,
    pub pred: f64,
    pub abs_error: f64,
    #[serde(default)]
    pub ape: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareResponse {
    pub rows: Vec<CompareRow>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Monthly consumption forecast parameters. Also the body of the report
/// generation endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub months_ahead: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poblacion_estimada: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitacion_promedio: Option<f64>,
}

impl ForecastRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.months_ahead < 1 {
            return Err(ApiError::InvalidRequest(
                "months_ahead must be at least 1".to_string(),
            ));
        }
        match self.start_month {
            Some(month) => check_month(month),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub anio: i32,
    pub mes: u32,
    pub consumo_predicho: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub rows: Vec<ForecastRow>,
}

// ───────────────────── Reports ─────────────────────

pub const DEFAULT_EMAIL_SUBJECT: &str = "Reporte de Predicción de Consumo de Agua";
pub const DEFAULT_EMAIL_BODY: &str =
    "Adjunto encontrará el reporte de predicción de consumo de agua generado por nuestro modelo.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email_to: String,
    pub subject: String,
    pub body: String,
}

impl EmailRequest {
    pub fn new(email_to: impl Into<String>) -> Self {
        EmailRequest {
            email_to: email_to.into(),
            subject: DEFAULT_EMAIL_SUBJECT.to_string(),
            body: DEFAULT_EMAIL_BODY.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let valid = self
            .email_to
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
        if valid {
            Ok(())
        } else {
            Err(ApiError::InvalidRequest(format!(
                "invalid email address {:?}",
                self.email_to
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfEmailRequest {
    pub forecast_request: ForecastRequest,
    pub email_request: EmailRequest,
}

/// `{ message, data }` returned by every report endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

/// Report file type, used for history filtering and downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Csv,
    Pdf,
}

impl ReportKind {
    pub fn generate_path(self) -> &'static str {
        match self {
            ReportKind::Csv => paths::REPORTS_GENERATE_CSV,
            ReportKind::Pdf => paths::REPORTS_GENERATE_PDF,
        }
    }

    pub fn history_path(self) -> &'static str {
        match self {
            ReportKind::Csv => paths::REPORTS_HISTORY_CSV,
            ReportKind::Pdf => paths::REPORTS_HISTORY_PDF,
        }
    }

    pub fn download_path(self) -> &'static str {
        match self {
            ReportKind::Csv => paths::REPORTS_DOWNLOAD_CSV,
            ReportKind::Pdf => paths::REPORTS_DOWNLOAD_PDF,
        }
    }
}

// ───────────────────── Chatbot ─────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatModel {
    #[default]
    Openai,
    Zephyr,
    Gemini,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub pregunta: String,
    pub modelo: ChatModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub modelo: ChatModel,
    pub respuesta: String,
    pub timestamp: DateTime<Utc>,
}

// ───────────────────── Interpretation ─────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpretationModel {
    #[default]
    Gemini,
}

/// Chart data sent for a natural-language reading, e.g.
/// `datos: [{ "fecha": "2025-01", "valor": 12.5 }, ...]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationRequest {
    pub modelo: InterpretationModel,
    pub titulo: String,
    pub tipo_dato: String,
    pub datos: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationResponse {
    pub modelo: InterpretationModel,
    pub tipo_dato: String,
    #[serde(default)]
    pub analisis_estadistico: Value,
    #[serde(default)]
    pub interpretacion: Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl InterpretationResponse {
    /// The narrative text, found either directly or under `texto`.
    pub fn text(&self) -> Option<&str> {
        match &self.interpretacion {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("texto").and_then(Value::as_str),
            _ => None,
        }
    }
}
