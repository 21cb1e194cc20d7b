//! Boundaries to the outside world: who the user is and where sessions go.
//!
//! Both traits are object safe so the engine can hold them as `Arc<dyn ..>`.
//! The engine calls `SessionStore::save` at most once per completed session,
//! plus once per explicit retry.

use crate::config::{StoreConfig, StoreKind};
use crate::error::PersistError;
use crate::session::SessionRecord;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub type SaveFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PersistError>> + Send + 'a>>;

/// Supplies the signed-in user, if any.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Persists completed sessions. No ordering or idempotence is assumed.
pub trait SessionStore: Send + Sync {
    fn save<'a>(&'a self, record: &'a SessionRecord) -> SaveFuture<'a>;
}

/// A fixed identity, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Keeps records in memory. Can be switched into a failing mode.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<SessionRecord>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every save is rejected.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `save` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn records(&self) -> Vec<SessionRecord> {
        self.records.read().await.clone()
    }
}

impl SessionStore for MemoryStore {
    fn save<'a>(&'a self, record: &'a SessionRecord) -> SaveFuture<'a> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(PersistError::Store("memory store is offline".into()));
            }
            self.records.write().await.push(record.clone());
            debug!(id = %record.id, "session stored in memory");
            Ok(())
        })
    }
}

/// Appends each record as one JSON line.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonLinesStore {
    fn save<'a>(&'a self, record: &'a SessionRecord) -> SaveFuture<'a> {
        Box::pin(async move {
            let mut line = serde_json::to_string(record)?;
            line.push('\n');
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            debug!(id = %record.id, path = %self.path.display(), "session appended");
            Ok(())
        })
    }
}

/// Builds the store named by the configuration.
pub fn open_store(config: &StoreConfig) -> Arc<dyn SessionStore> {
    match config.kind {
        StoreKind::Memory => {
            warn!("sessions are kept in memory only and will be lost on exit");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Jsonl => Arc::new(JsonLinesStore::new(config.path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(prod_level: u8) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            user_id: "u".into(),
            session_minutes: 30,
            focus_minutes: 25,
            prod_level,
            mood_x: 0.5,
            mood_y: 0.5,
            break_activity: None,
            break_satisfaction: 0,
            created_at: Utc::now(),
            tasks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn memory_store_counts_failed_attempts() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.save(&record(3)).await.is_err());
        store.set_failing(false);
        store.save(&record(4)).await.unwrap();
        assert_eq!(store.attempts(), 2);
        let saved = store.records().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].prod_level, 4);
    }

    #[tokio::test]
    async fn jsonl_store_appends_one_line_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("sessions.jsonl"));
        store.save(&record(1)).await.unwrap();
        store.save(&record(2)).await.unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        let levels: Vec<u8> = text
            .lines()
            .map(|line| serde_json::from_str::<SessionRecord>(line).unwrap().prod_level)
            .collect();
        assert_eq!(levels, vec![1, 2]);
    }

    #[tokio::test]
    async fn jsonl_store_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("missing").join("sessions.jsonl"));
        assert!(matches!(
            store.save(&record(1)).await,
            Err(PersistError::Io(_))
        ));
    }

    #[test]
    fn identity_can_be_absent() {
        assert_eq!(StaticIdentity::anonymous().current_user_id(), None);
        assert_eq!(StaticIdentity::new("ada").current_user_id().as_deref(), Some("ada"));
    }
}
