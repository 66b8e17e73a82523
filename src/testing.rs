//! Testing helpers and storage doubles.

use crate::storage::{ImdbPreference, KickRecord, MockStorageProvider, StorageError, StorageProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Stateful in-memory storage for tests that read back their own writes.
#[derive(Default)]
pub struct InMemoryStorage {
    preferences: Mutex<HashMap<i64, ImdbPreference>>,
    kicks: Mutex<Vec<KickRecord>>,
}

impl InMemoryStorage {
    /// Snapshot of a stored preference document
    pub async fn preference(&self, user_id: i64) -> Option<ImdbPreference> {
        self.preferences.lock().await.get(&user_id).cloned()
    }

    /// Number of kicks still scheduled
    pub async fn pending_kicks(&self) -> usize {
        self.kicks.lock().await.len()
    }
}

#[async_trait]
impl StorageProvider for InMemoryStorage {
    async fn get_imdb_preference(
        &self,
        user_id: i64,
    ) -> Result<Option<ImdbPreference>, StorageError> {
        Ok(self.preference(user_id).await)
    }

    async fn save_imdb_preference(&self, preference: &ImdbPreference) -> Result<(), StorageError> {
        self.preferences
            .lock()
            .await
            .insert(preference.user_id, preference.clone());
        Ok(())
    }

    async fn delete_imdb_preference(&self, user_id: i64) -> Result<(), StorageError> {
        self.preferences.lock().await.remove(&user_id);
        Ok(())
    }

    async fn add_kick(&self, record: &KickRecord) -> Result<(), StorageError> {
        self.kicks.lock().await.push(record.clone());
        Ok(())
    }

    async fn take_due_kicks(&self, now: DateTime<Utc>) -> Result<Vec<KickRecord>, StorageError> {
        let mut kicks = self.kicks.lock().await;
        let (due, pending): (Vec<_>, Vec<_>) = kicks.drain(..).partition(|k| k.kick_time <= now);
        *kicks = pending;
        Ok(due)
    }

    async fn check_connection(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Create a mock storage provider where every user is unknown and writes succeed.
#[must_use]
pub fn mock_storage_noop() -> MockStorageProvider {
    let mut mock = MockStorageProvider::new();
    mock.expect_get_imdb_preference().returning(|_| Ok(None));
    mock.expect_save_imdb_preference().returning(|_| Ok(()));
    mock.expect_delete_imdb_preference().returning(|_| Ok(()));
    mock.expect_add_kick().returning(|_| Ok(()));
    mock.expect_take_due_kicks().returning(|_| Ok(Vec::new()));
    mock.expect_check_connection().returning(|| Ok(()));
    mock
}
