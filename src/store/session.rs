//! Analysis session store
//!
//! All sessions live in one JSON array under a single key. Every operation
//! reads the whole array, edits it and writes it back; a failed edit never
//! reaches the write.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};
use ulid::Ulid;

use crate::consts::SESSIONS_KEY;
use crate::error::StoreError;

use super::kv::KeyValueStore;
use super::types::{
    AnalysisResults, AnalysisSession, AnalysisType, LeafMetadata, SessionCounts, SessionStatus,
    SoilMetadata,
};

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn created_at_of(session: &AnalysisSession) -> DateTime<Utc> {
    session
        .created_at
        .parse::<DateTime<Utc>>()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Indices of `sessions` ordered newest first. Equal timestamps keep the
/// later-appended record first.
fn newest_first(sessions: &[AnalysisSession]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..sessions.len()).collect();
    order.sort_by(|&a, &b| {
        created_at_of(&sessions[b])
            .cmp(&created_at_of(&sessions[a]))
            .then_with(|| b.cmp(&a))
    });
    order
}

pub(crate) struct SessionStore {
    kv: Box<dyn KeyValueStore>,
    max_sessions: usize,
}

impl SessionStore {
    pub(crate) fn new(kv: Box<dyn KeyValueStore>, max_sessions: usize) -> Self {
        Self {
            kv,
            max_sessions: max_sessions.max(1),
        }
    }

    fn load(&self) -> Result<Vec<AnalysisSession>, StoreError> {
        let Some(raw) = self.kv.get(SESSIONS_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            key: SESSIONS_KEY.to_string(),
            source,
        })
    }

    fn save(&self, sessions: &[AnalysisSession]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(sessions).map_err(StoreError::Serialize)?;
        self.kv.set(SESSIONS_KEY, &raw)
    }

    /// Read-modify-write. Nothing is written when `edit` fails.
    fn mutate<T, F>(&self, edit: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<AnalysisSession>) -> Result<T, StoreError>,
    {
        let mut sessions = self.load()?;
        let out = edit(&mut sessions)?;
        self.save(&sessions)?;
        Ok(out)
    }

    fn mutate_session<F>(&self, id: &str, edit: F) -> Result<AnalysisSession, StoreError>
    where
        F: FnOnce(&mut AnalysisSession) -> Result<(), StoreError>,
    {
        self.mutate(|sessions| {
            let session = sessions
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| StoreError::SessionNotFound { id: id.to_string() })?;
            edit(session)?;
            session.updated_at = timestamp(Utc::now());
            Ok(session.clone())
        })
    }

    pub(crate) fn create_session(&self) -> Result<String, StoreError> {
        self.create_session_at(Utc::now())
    }

    pub(crate) fn create_session_at(&self, at: DateTime<Utc>) -> Result<String, StoreError> {
        let id = format!("session_{}", Ulid::new().to_string().to_lowercase());
        let max = self.max_sessions;
        let evicted = self.mutate(|sessions| {
            sessions.push(AnalysisSession::new(id.clone(), timestamp(at)));
            Ok(retain_newest(sessions, max))
        })?;
        info!(session = %id, "created analysis session");
        if evicted > 0 {
            debug!(evicted, max, "pruned old sessions");
        }
        Ok(id)
    }

    pub(crate) fn get_session(&self, id: &str) -> Result<Option<AnalysisSession>, StoreError> {
        Ok(self.load()?.into_iter().find(|s| s.id == id))
    }

    pub(crate) fn attach_leaf_metadata(
        &self,
        id: &str,
        metadata: LeafMetadata,
    ) -> Result<AnalysisSession, StoreError> {
        self.mutate_session(id, |session| {
            session.leaf_metadata = Some(metadata);
            Ok(())
        })
    }

    /// Soil readings turn a leaf-only session into a comprehensive one.
    pub(crate) fn attach_soil_metadata(
        &self,
        id: &str,
        metadata: SoilMetadata,
    ) -> Result<AnalysisSession, StoreError> {
        self.mutate_session(id, |session| {
            session.soil_metadata = Some(metadata);
            session.analysis_type = AnalysisType::Comprehensive;
            Ok(())
        })
    }

    pub(crate) fn complete_session(
        &self,
        id: &str,
        results: AnalysisResults,
    ) -> Result<AnalysisSession, StoreError> {
        let session = self.mutate_session(id, |session| {
            advance(session, SessionStatus::Completed)?;
            session.results = Some(results);
            Ok(())
        })?;
        info!(session = %id, "session completed");
        Ok(session)
    }

    pub(crate) fn fail_session(
        &self,
        id: &str,
        reason: Option<String>,
    ) -> Result<AnalysisSession, StoreError> {
        let session = self.mutate_session(id, |session| {
            advance(session, SessionStatus::Failed)?;
            session.failure_reason = reason;
            Ok(())
        })?;
        info!(session = %id, "session failed");
        Ok(session)
    }

    /// All sessions, newest first
    pub(crate) fn list_sessions(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<AnalysisSession>, StoreError> {
        self.list_where(limit, |_| true)
    }

    pub(crate) fn list_completed(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<AnalysisSession>, StoreError> {
        self.list_where(limit, |s| s.status == SessionStatus::Completed)
    }

    fn list_where<P>(&self, limit: Option<usize>, keep: P) -> Result<Vec<AnalysisSession>, StoreError>
    where
        P: Fn(&AnalysisSession) -> bool,
    {
        let sessions = self.load()?;
        let listed = newest_first(&sessions)
            .into_iter()
            .map(|i| &sessions[i])
            .filter(|s| keep(s))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(listed)
    }

    /// Keep only the `keep` most recent sessions. Returns how many were evicted.
    pub(crate) fn prune(&self, keep: usize) -> Result<usize, StoreError> {
        let evicted = self.mutate(|sessions| Ok(retain_newest(sessions, keep)))?;
        if evicted > 0 {
            info!(evicted, keep, "pruned sessions");
        }
        Ok(evicted)
    }

    pub(crate) fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|sessions| {
            let before = sessions.len();
            sessions.retain(|s| s.id != id);
            if sessions.len() == before {
                return Err(StoreError::SessionNotFound { id: id.to_string() });
            }
            Ok(())
        })
    }

    pub(crate) fn clear(&self) -> Result<(), StoreError> {
        self.kv.remove(SESSIONS_KEY)
    }

    pub(crate) fn counts(&self) -> Result<SessionCounts, StoreError> {
        let sessions = self.load()?;
        let mut counts = SessionCounts {
            total: sessions.len(),
            ..SessionCounts::default()
        };
        for session in &sessions {
            match session.status {
                SessionStatus::InProgress => counts.in_progress += 1,
                SessionStatus::Completed => counts.completed += 1,
                SessionStatus::Failed => counts.failed += 1,
            }
            if session.analysis_type == AnalysisType::Comprehensive {
                counts.comprehensive += 1;
            }
        }
        Ok(counts)
    }
}

fn advance(session: &mut AnalysisSession, next: SessionStatus) -> Result<(), StoreError> {
    if !session.status.can_advance_to(next) {
        return Err(StoreError::InvalidTransition {
            id: session.id.clone(),
            from: session.status,
            to: next,
        });
    }
    session.status = next;
    Ok(())
}

/// Drop everything but the `keep` newest sessions, preserving stored order.
fn retain_newest(sessions: &mut Vec<AnalysisSession>, keep: usize) -> usize {
    if sessions.len() <= keep {
        return 0;
    }
    let mut survivors = vec![false; sessions.len()];
    for i in newest_first(sessions).into_iter().take(keep) {
        survivors[i] = true;
    }
    let before = sessions.len();
    let mut flags = survivors.into_iter();
    sessions.retain(|_| flags.next().unwrap_or(false));
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::MemoryKv;
    use chrono::TimeZone;

    fn store(max: usize) -> SessionStore {
        SessionStore::new(Box::new(MemoryKv::default()), max)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, minute, 0).unwrap()
    }

    fn leaf() -> LeafMetadata {
        LeafMetadata {
            file_name: "leaf.jpg".to_string(),
            file_size: 1024,
            format: "jpeg".to_string(),
            width: Some(640),
            height: Some(480),
            plant_age_days: Some(30),
            sample_type: Some("leaf".to_string()),
            captured_at: timestamp(at(0)),
        }
    }

    fn results() -> AnalysisResults {
        AnalysisResults {
            deficiency: "Nitrogen".to_string(),
            confidence: 0.91,
            recommendations: vec!["Apply urea".to_string()],
            raw: serde_json::json!({"prediction": "Nitrogen"}),
            completed_at: timestamp(at(5)),
        }
    }

    #[test]
    fn new_session_is_in_progress_without_metadata() {
        let store = store(10);
        let id = store.create_session().unwrap();
        let session = store.get_session(&id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.analysis_type, AnalysisType::LeafOnly);
        assert!(session.leaf_metadata.is_none());
        assert!(session.soil_metadata.is_none());
        assert!(session.results.is_none());
    }

    #[test]
    fn ids_are_unique() {
        let store = store(10);
        let a = store.create_session().unwrap();
        let b = store.create_session().unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("session_"));
    }

    #[test]
    fn attach_to_unknown_id_fails_without_writing() {
        let store = store(10);
        store.create_session().unwrap();
        let before = store.kv.get(SESSIONS_KEY).unwrap();

        let err = store.attach_leaf_metadata("session_missing", leaf()).unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound { .. }));
        let err = store
            .attach_soil_metadata("session_missing", SoilMetadata::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound { .. }));
        let err = store.complete_session("session_missing", results()).unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound { .. }));

        assert_eq!(store.kv.get(SESSIONS_KEY).unwrap(), before);
    }

    #[test]
    fn attach_to_empty_store_does_not_create_blob() {
        let store = store(10);
        assert!(store.attach_leaf_metadata("nope", leaf()).is_err());
        assert_eq!(store.kv.get(SESSIONS_KEY).unwrap(), None);
    }

    #[test]
    fn soil_metadata_makes_session_comprehensive() {
        let store = store(10);
        let id = store.create_session().unwrap();
        store.attach_leaf_metadata(&id, leaf()).unwrap();
        let soil = SoilMetadata {
            ph: Some(6.4),
            nitrogen: Some(210.0),
            collected_at: timestamp(at(2)),
            ..SoilMetadata::default()
        };
        let session = store.attach_soil_metadata(&id, soil.clone()).unwrap();
        assert_eq!(session.analysis_type, AnalysisType::Comprehensive);

        let stored = store.get_session(&id).unwrap().unwrap();
        assert_eq!(stored.analysis_type, AnalysisType::Comprehensive);
        assert_eq!(stored.soil_metadata, Some(soil));
        assert_eq!(stored.leaf_metadata, Some(leaf()));
    }

    #[test]
    fn exceeding_cap_evicts_oldest_first() {
        let store = store(3);
        let ids: Vec<String> = [4, 1, 3, 0, 2]
            .into_iter()
            .map(|minute| store.create_session_at(at(minute)).unwrap())
            .collect();

        let remaining = store.list_sessions(None).unwrap();
        assert_eq!(remaining.len(), 3);
        let remaining_ids: Vec<&str> = remaining.iter().map(|s| s.id.as_str()).collect();
        // Minutes 4, 3, 2 survive, newest first
        assert_eq!(remaining_ids, vec![ids[0].as_str(), ids[2].as_str(), ids[4].as_str()]);
    }

    #[test]
    fn prune_keeps_most_recent() {
        let store = store(100);
        for minute in 0..6 {
            store.create_session_at(at(minute)).unwrap();
        }
        assert_eq!(store.prune(2).unwrap(), 4);
        let remaining = store.list_sessions(None).unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].created_at, timestamp(at(5)));
        assert_eq!(remaining[1].created_at, timestamp(at(4)));
        assert_eq!(store.prune(5).unwrap(), 0);
    }

    #[test]
    fn completed_query_excludes_other_statuses() {
        let store = store(10);
        let done = store.create_session_at(at(1)).unwrap();
        let failed = store.create_session_at(at(2)).unwrap();
        let _pending = store.create_session_at(at(3)).unwrap();
        let done_later = store.create_session_at(at(4)).unwrap();

        store.complete_session(&done, results()).unwrap();
        store.fail_session(&failed, Some("timeout".into())).unwrap();
        store.complete_session(&done_later, results()).unwrap();

        let completed = store.list_completed(None).unwrap();
        assert_eq!(completed.len(), 2);
        assert!(completed.iter().all(|s| s.status == SessionStatus::Completed));
        assert_eq!(completed[0].id, done_later);

        let capped = store.list_completed(Some(1)).unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, done_later);
    }

    #[test]
    fn status_never_reverts() {
        let store = store(10);
        let id = store.create_session().unwrap();
        store.complete_session(&id, results()).unwrap();
        let before = store.kv.get(SESSIONS_KEY).unwrap();

        let err = store.fail_session(&id, None).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: SessionStatus::Completed,
                to: SessionStatus::Failed,
                ..
            }
        ));
        assert!(store.complete_session(&id, results()).is_err());
        assert_eq!(store.kv.get(SESSIONS_KEY).unwrap(), before);
    }

    #[test]
    fn corrupt_blob_is_reported() {
        let store = store(10);
        store.kv.set(SESSIONS_KEY, "{not json").unwrap();
        let err = store.list_sessions(None).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(store.create_session().is_err());
        assert_eq!(store.kv.get(SESSIONS_KEY).unwrap().as_deref(), Some("{not json"));
    }

    #[test]
    fn delete_and_clear() {
        let store = store(10);
        let a = store.create_session().unwrap();
        let b = store.create_session().unwrap();
        store.delete_session(&a).unwrap();
        assert!(store.get_session(&a).unwrap().is_none());
        assert!(store.delete_session(&a).is_err());
        assert!(store.get_session(&b).unwrap().is_some());
        store.clear().unwrap();
        assert!(store.list_sessions(None).unwrap().is_empty());
    }

    #[test]
    fn counts_by_status() {
        let store = store(10);
        let a = store.create_session().unwrap();
        let b = store.create_session().unwrap();
        store.create_session().unwrap();
        store.complete_session(&a, results()).unwrap();
        store.fail_session(&b, None).unwrap();
        store
            .attach_soil_metadata(&a, SoilMetadata::default())
            .unwrap();
        let counts = store.counts().unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.in_progress, 1);
        assert_eq!(counts.comprehensive, 1);
    }
}
