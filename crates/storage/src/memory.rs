//! In-memory reference backend.
//!
//! Used by the flow engine's tests and as the baseline subject of the
//! conformance suite. Not intended for production deployments: rows live
//! only as long as the process.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use proband_core::Condition;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{ParticipantRecord, ProgressRecord};
use crate::traits::ParticipantStore;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    participants: BTreeMap<i64, ParticipantRecord>,
    /// Keyed by (participant, path); BTreeMap keeps listing order stable.
    progress: BTreeMap<(i64, String), ProgressRecord>,
}

/// A `ParticipantStore` backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Backend(format!("mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl ParticipantStore for MemoryStore {
    async fn create_participant(
        &self,
        ip_address: &str,
        user_agent: &str,
        now: OffsetDateTime,
    ) -> Result<ParticipantRecord, StorageError> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let record = ParticipantRecord::new(inner.next_id, ip_address, user_agent, now);
        inner.participants.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_participant(&self, id: i64) -> Result<ParticipantRecord, StorageError> {
        let inner = self.lock()?;
        inner
            .participants
            .get(&id)
            .cloned()
            .ok_or(StorageError::ParticipantNotFound { id })
    }

    async fn save_participant(&self, record: &ParticipantRecord) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        if !inner.participants.contains_key(&record.id) {
            return Err(StorageError::ParticipantNotFound { id: record.id });
        }
        inner.participants.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
        excluding_id: i64,
    ) -> Result<Vec<ParticipantRecord>, StorageError> {
        let inner = self.lock()?;
        Ok(inner
            .participants
            .values()
            .filter(|p| {
                p.id != excluding_id
                    && p.external_id == external_id
                    && !p.condition.is_some_and(Condition::is_released)
            })
            .cloned()
            .collect())
    }

    async fn count_in_condition(
        &self,
        condition: Condition,
        exclude_idle_since: Option<OffsetDateTime>,
    ) -> Result<u64, StorageError> {
        let inner = self.lock()?;
        let count = inner
            .participants
            .values()
            .filter(|p| p.condition == Some(condition))
            .filter(|p| !p.exclude_from_count)
            .filter(|p| match exclude_idle_since {
                Some(cutoff) => p.finished || p.last_active_at >= cutoff,
                None => true,
            })
            .count();
        Ok(count as u64)
    }

    async fn upsert_progress(
        &self,
        participant_id: i64,
        path: &str,
        is_submission: bool,
        now: OffsetDateTime,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        let key = (participant_id, path.to_string());
        let record = inner.progress.entry(key).or_insert_with(|| ProgressRecord {
            participant_id,
            path: path.to_string(),
            started_at: now,
            submitted_at: None,
        });
        if is_submission {
            record.submitted_at = Some(now);
        }
        Ok(())
    }

    async fn progress_for(
        &self,
        participant_id: i64,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let inner = self.lock()?;
        Ok(inner
            .progress
            .values()
            .filter(|p| p.participant_id == participant_id)
            .cloned()
            .collect())
    }
}
