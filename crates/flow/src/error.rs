use proband_core::Condition;
use proband_storage::StorageError;
use thiserror::Error;

/// A navigation error from the resolver.
///
/// Recoverable by policy: the guard answers every navigation miss by
/// resetting the participant to the start of their sequence, so these
/// never surface to a participant as anything but a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// The path is not in the sequence resolved for this condition --
    /// typically a configuration change mid-study, or a stored condition
    /// referencing an arm that no longer exists.
    #[error("path '{path}' is not in the sequence for condition {condition}")]
    UnknownPath { path: String, condition: Condition },

    /// The resolved sequence has no pages. Startup validation rejects
    /// configurations that can produce this; kept as an error rather than
    /// a panic for defense in depth.
    #[error("the resolved sequence for condition {condition} is empty")]
    EmptySequence { condition: Condition },
}

/// An error from a guard or advance operation.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// An error from condition assignment.
#[derive(Debug, Error)]
pub enum AssignmentError {
    /// Arms are configured but every one is disabled; there is no valid
    /// destination and defaulting silently would corrupt the design.
    #[error("cannot assign a condition: all {arms} configured arm(s) are disabled")]
    NoEnabledArms { arms: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}
