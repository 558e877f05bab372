mod kv;
mod session;
mod types;

pub(crate) use kv::{MemoryKv, SqliteKv};
pub(crate) use session::{SessionStore, timestamp};
pub(crate) use types::{
    AnalysisResults, AnalysisSession, LeafMetadata, SessionCounts, SessionStatus, SoilMetadata,
};
