//! Session record types
//!
//! These are serialized as-is into the key-value blob, so field names are
//! part of the on-disk format.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a session covers the leaf image alone or leaf plus soil data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AnalysisType {
    #[default]
    LeafOnly,
    Comprehensive,
}

impl AnalysisType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AnalysisType::LeafOnly => "leaf_only",
            AnalysisType::Comprehensive => "comprehensive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SessionStatus {
    #[default]
    InProgress,
    Completed,
    Failed,
}

impl SessionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    /// Status only moves forward out of `InProgress`.
    pub(crate) fn can_advance_to(self, next: SessionStatus) -> bool {
        self == SessionStatus::InProgress && next != SessionStatus::InProgress
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts about the captured leaf image plus the user-supplied sample context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LeafMetadata {
    pub(crate) file_name: String,
    pub(crate) file_size: u64,
    pub(crate) format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) plant_age_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) sample_type: Option<String>,
    pub(crate) captured_at: String,
}

/// Soil test readings entered alongside a leaf sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct SoilMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) soil_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) ph: Option<f64>,
    /// kg/ha
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) nitrogen: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) phosphorus: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) potassium: Option<f64>,
    /// Percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) organic_matter: Option<f64>,
    /// Percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) moisture: Option<f64>,
    pub(crate) collected_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AnalysisResults {
    pub(crate) deficiency: String,
    pub(crate) confidence: f64,
    #[serde(default)]
    pub(crate) recommendations: Vec<String>,
    /// Backend response exactly as received
    #[serde(default)]
    pub(crate) raw: serde_json::Value,
    pub(crate) completed_at: String,
}

/// One user-initiated leaf/soil analysis attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct AnalysisSession {
    pub(crate) id: String,
    pub(crate) created_at: String,
    #[serde(default)]
    pub(crate) analysis_type: AnalysisType,
    #[serde(default)]
    pub(crate) status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) leaf_metadata: Option<LeafMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) soil_metadata: Option<SoilMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) results: Option<AnalysisResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) failure_reason: Option<String>,
    pub(crate) updated_at: String,
}

impl AnalysisSession {
    pub(crate) fn new(id: String, now: String) -> Self {
        Self {
            id,
            created_at: now.clone(),
            analysis_type: AnalysisType::LeafOnly,
            status: SessionStatus::InProgress,
            leaf_metadata: None,
            soil_metadata: None,
            results: None,
            failure_reason: None,
            updated_at: now,
        }
    }
}

/// Session counts by status
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct SessionCounts {
    pub(crate) total: usize,
    pub(crate) in_progress: usize,
    pub(crate) completed: usize,
    pub(crate) failed: usize,
    pub(crate) comprehensive: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_advances_from_in_progress() {
        use SessionStatus::*;
        assert!(InProgress.can_advance_to(Completed));
        assert!(InProgress.can_advance_to(Failed));
        assert!(!InProgress.can_advance_to(InProgress));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(InProgress));
    }

    #[test]
    fn session_serializes_snake_case_tags() {
        let session = AnalysisSession::new("session_1".into(), "2026-01-01T00:00:00Z".into());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["analysis_type"], "leaf_only");
        assert!(json.get("leaf_metadata").is_none());
        assert!(json.get("results").is_none());
    }

    #[test]
    fn session_tolerates_missing_optional_fields() {
        let json = r#"{"id":"s","created_at":"2026-01-01T00:00:00Z","updated_at":"2026-01-01T00:00:00Z"}"#;
        let session: AnalysisSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.analysis_type, AnalysisType::LeafOnly);
        assert!(session.soil_metadata.is_none());
    }
}
