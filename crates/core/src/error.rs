use thiserror::Error;

/// A fatal study-configuration error.
///
/// Every variant is startup-blocking: the application must refuse to route
/// participants rather than run with a configuration that would silently
/// truncate the experiment or corrupt data association.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration JSON does not have the expected shape.
    #[error("{context}: {message}")]
    Malformed { context: String, message: String },

    /// The page list has no entries at all.
    #[error("page list is empty")]
    EmptyPageList,

    /// A conditional_routing block declares no branches.
    #[error("page list entry {index}: conditional_routing block has no branches")]
    EmptyRouting { index: usize },

    /// A branch declares no pages.
    #[error("page list entry {index}: branch for condition {condition} has an empty page list")]
    EmptyBranch { index: usize, condition: u16 },

    /// A branch routes on condition 0, which is reserved for
    /// "no condition assigned" and can never be selected.
    #[error("page list entry {index}: branch uses reserved condition 0")]
    ReservedCondition { index: usize },

    /// Two branches in the same block route on the same condition; only
    /// the first would ever be selected.
    #[error("page list entry {index}: two branches share condition {condition}")]
    DuplicateBranchCondition { index: usize, condition: u16 },

    /// A branch routes on a condition beyond the configured arm count and
    /// is unreachable for every real participant.
    #[error(
        "page list entry {index}: branch routes condition {condition} but only {arms} arm(s) are configured"
    )]
    ConditionOutOfRange {
        index: usize,
        condition: u16,
        arms: usize,
    },

    /// Arms are configured but every one of them is disabled, leaving no
    /// valid assignment destination.
    #[error("all {arms} configured arm(s) are disabled")]
    NoEnabledArms { arms: usize },

    /// The same tagged questionnaire identifier appears more than once in
    /// a single arm's resolved sequence -- two distinct steps would write
    /// to the same storage rows.
    #[error("questionnaire '{path}' appears more than once in the sequence for condition {condition}")]
    DuplicateQuestionnaire { path: String, condition: u16 },
}
