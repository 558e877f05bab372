/// Standard date format used throughout the codebase: "2025-01-15"
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Key under which all analysis sessions are stored as one JSON array
pub(crate) const SESSIONS_KEY: &str = "analysis_sessions";

/// File name of the SQLite store inside the data directory
pub(crate) const STORE_FILE: &str = "cropcare.db";

pub(crate) const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_PEST_TIMEOUT_SECS: u64 = 15;
pub(crate) const DEFAULT_MAX_SESSIONS: usize = 50;

/// Fallback value when a label is missing from a backend response
pub(crate) const UNKNOWN: &str = "unknown";
