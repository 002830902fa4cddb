//! proband-storage: the storage boundary of the Proband flow engine.
//!
//! Defines the `ParticipantStore` trait the flow engine drives, the
//! persisted record types, an in-memory reference backend, and a
//! backend-agnostic conformance suite.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{display_time, ParticipantRecord, ProgressRecord};
pub use traits::ParticipantStore;
