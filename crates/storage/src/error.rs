/// All errors that can be returned by a ParticipantStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No participant with the given id exists.
    #[error("participant not found: {id}")]
    ParticipantNotFound { id: i64 },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
