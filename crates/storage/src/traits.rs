use async_trait::async_trait;
use proband_core::Condition;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{ParticipantRecord, ProgressRecord};

/// The storage trait for Proband backends.
///
/// A `ParticipantStore` implementation provides durable storage for
/// participant rows and per-page progress markers. The flow engine is the
/// only writer of flow-state columns; the admin surface reads them and may
/// flip `exclude_from_count`.
///
/// ## Consistency contract
///
/// Each guarded request performs one read-compare-write cycle against a
/// single participant. Implementations must make `save_participant` and
/// `upsert_progress` individually atomic; across requests for the same
/// participant the contract is last-write-wins (participants are assumed
/// single-session). The count-then-write sequence during condition
/// assignment is intentionally unguarded: a race between two concurrent
/// enrollments yields bounded arm imbalance, not corruption.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` so a single store can
/// be shared across request handlers.
#[async_trait]
pub trait ParticipantStore: Send + Sync + 'static {
    // ── Participant rows ──────────────────────────────────────────────────────

    /// Insert a fresh participant row and return it. The new row has no
    /// condition and no current path.
    async fn create_participant(
        &self,
        ip_address: &str,
        user_agent: &str,
        now: OffsetDateTime,
    ) -> Result<ParticipantRecord, StorageError>;

    /// Read a participant row.
    ///
    /// Returns `Err(StorageError::ParticipantNotFound)` if no row exists.
    async fn get_participant(&self, id: i64) -> Result<ParticipantRecord, StorageError>;

    /// Overwrite a participant row with the given record.
    ///
    /// Returns `Err(StorageError::ParticipantNotFound)` if the row was
    /// never created.
    async fn save_participant(&self, record: &ParticipantRecord) -> Result<(), StorageError>;

    /// All prior attempts bound to `external_id`, excluding the row
    /// `excluding_id` and excluding released attempts (their condition
    /// has already been negated and must not be adopted again). Ordered
    /// by id ascending, so the first entry is the original attempt.
    async fn find_by_external_id(
        &self,
        external_id: &str,
        excluding_id: i64,
    ) -> Result<Vec<ParticipantRecord>, StorageError>;

    // ── Arm balance ───────────────────────────────────────────────────────────

    /// Number of participants currently assigned to exactly `condition`.
    ///
    /// The match is exact, so released (negative) conditions never count
    /// toward the arm they were released from. Participants flagged
    /// `exclude_from_count` are always omitted. When `exclude_idle_since`
    /// is given, unfinished participants whose last activity predates the
    /// cutoff (abandoned attempts) are omitted as well.
    async fn count_in_condition(
        &self,
        condition: Condition,
        exclude_idle_since: Option<OffsetDateTime>,
    ) -> Result<u64, StorageError>;

    // ── Progress markers ──────────────────────────────────────────────────────

    /// Create or update the progress marker for `(participant_id, path)`.
    ///
    /// First sight of the path creates the marker with `started_at = now`;
    /// a submission stamps `submitted_at = now` on it. Re-visits of an
    /// existing marker without submission leave it untouched.
    async fn upsert_progress(
        &self,
        participant_id: i64,
        path: &str,
        is_submission: bool,
        now: OffsetDateTime,
    ) -> Result<(), StorageError>;

    /// All progress markers for a participant, in path-visit storage order.
    async fn progress_for(&self, participant_id: i64)
        -> Result<Vec<ProgressRecord>, StorageError>;
}
