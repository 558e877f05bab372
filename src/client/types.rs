//! Backend response shapes
//!
//! The backend is not strict about field names, so responses are parsed as
//! loose JSON and mapped field by field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consts::UNKNOWN;

/// Everything needed to submit one leaf image
#[derive(Debug, Clone)]
pub(crate) struct AnalysisRequest {
    pub(crate) bytes: Vec<u8>,
    pub(crate) file_name: String,
    pub(crate) mime_type: String,
    pub(crate) plant_age_days: Option<u32>,
    pub(crate) sample_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DeficiencyPrediction {
    pub(crate) deficiency: String,
    /// Always in 0..=1
    pub(crate) confidence: f64,
    pub(crate) recommendations: Vec<String>,
    #[serde(skip)]
    pub(crate) raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PestDetection {
    pub(crate) pest: String,
    pub(crate) confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) treatment: Option<String>,
    /// Untouched backend JSON
    #[serde(rename = "response")]
    pub(crate) raw: Value,
}

/// One fertilizer application as stored by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "id_as_string")]
    pub(crate) id: Option<String>,
    pub(crate) crop: String,
    pub(crate) fertilizer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) quantity_kg: Option<f64>,
    pub(crate) applied_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) notes: Option<String>,
}

/// Backends hand out either numeric or string ids
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct WeatherGuidance {
    pub(crate) location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) rainfall_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) yield_outlook: Option<String>,
    pub(crate) advice: Vec<String>,
    /// Untouched backend JSON
    #[serde(rename = "response")]
    pub(crate) raw: Value,
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
}

fn first_f64(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| value.get(*k).and_then(|v| v.as_f64()))
}

/// Percentages above 1 are scaled down so confidence is always a fraction
fn normalize_confidence(raw: f64) -> f64 {
    let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
    scaled.clamp(0.0, 1.0)
}

/// Accepts a string array (objects with `text`/`description` allowed) or a
/// single string.
fn string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        match value.get(*key) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        other => first_str(other, &["text", "description"]),
                    })
                    .collect();
            }
            Some(Value::String(s)) if !s.is_empty() => return vec![s.clone()],
            _ => {}
        }
    }
    Vec::new()
}

/// Some backends wrap the payload in `{"data": ...}` or `{"result": ...}`
fn unwrap_envelope(value: &Value) -> &Value {
    ["data", "result"]
        .iter()
        .find_map(|k| value.get(*k).filter(|v| v.is_object()))
        .unwrap_or(value)
}

pub(crate) fn parse_deficiency(value: Value) -> Result<DeficiencyPrediction, String> {
    let body = unwrap_envelope(&value);
    let deficiency = first_str(body, &["prediction", "deficiency", "predicted_class", "class", "label"])
        .ok_or_else(|| "missing prediction label".to_string())?;
    let confidence = first_f64(body, &["confidence", "probability", "score"])
        .map(normalize_confidence)
        .unwrap_or(0.0);
    let recommendations = string_list(body, &["recommendations", "recommendation", "treatment"]);
    Ok(DeficiencyPrediction {
        deficiency,
        confidence,
        recommendations,
        raw: value,
    })
}

pub(crate) fn parse_pest(value: Value) -> Result<PestDetection, String> {
    let body = unwrap_envelope(&value);
    let pest = first_str(body, &["pest", "disease", "prediction", "class", "label"])
        .ok_or_else(|| "missing pest label".to_string())?;
    let confidence = first_f64(body, &["confidence", "probability", "score"])
        .map(normalize_confidence)
        .unwrap_or(0.0);
    Ok(PestDetection {
        pest,
        confidence,
        severity: first_str(body, &["severity"]),
        treatment: first_str(body, &["treatment", "remedy", "recommendation"]),
        raw: value,
    })
}

pub(crate) fn parse_history(value: Value) -> Result<Vec<HistoryEntry>, String> {
    let items = if value.is_array() {
        value
    } else {
        ["history", "data", "items"]
            .iter()
            .find_map(|k| value.get(*k).filter(|v| v.is_array()).cloned())
            .ok_or_else(|| "expected a history array".to_string())?
    };
    serde_json::from_value(items).map_err(|e| e.to_string())
}

pub(crate) fn parse_weather(value: Value) -> WeatherGuidance {
    let body = unwrap_envelope(&value);
    WeatherGuidance {
        location: first_str(body, &["location", "city", "name"]).unwrap_or_else(|| UNKNOWN.to_string()),
        temperature_c: first_f64(body, &["temperature_c", "temperature", "temp"]),
        humidity: first_f64(body, &["humidity"]),
        rainfall_mm: first_f64(body, &["rainfall_mm", "rainfall", "precipitation"]),
        yield_outlook: first_str(body, &["yield_outlook", "yield_prediction", "yield"]),
        advice: string_list(body, &["advice", "recommendations"]),
        raw: value,
    }
}
