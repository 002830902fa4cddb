//! Positional queries over condition-resolved page sequences.

use std::sync::Arc;

use proband_core::{Condition, PageSpec, StudyConfig};

use crate::error::FlowError;

/// The terminal path. Configured page lists are expected to end with it;
/// the advance operation treats it specially so the end page is
/// idempotently re-enterable.
pub const END_PATH: &str = "end";

/// Resolves the declarative page list into navigable sequences and
/// answers positional queries.
///
/// Holds the study configuration behind an `Arc`: the configuration is
/// read-only after startup and shared across every request, so cloning a
/// resolver is cheap.
#[derive(Debug, Clone)]
pub struct FlowResolver {
    config: Arc<StudyConfig>,
}

impl FlowResolver {
    pub fn new(config: Arc<StudyConfig>) -> FlowResolver {
        FlowResolver { config }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// The linear page sequence for `condition`.
    pub fn sequence(&self, condition: Condition) -> Vec<&PageSpec> {
        self.config.pages.flatten(condition)
    }

    /// Position of `path` within the sequence for `condition`, or `None`
    /// if the path does not occur. `None` is a distinct "not found"
    /// signal -- callers must never conflate it with index 0.
    pub fn index_of(&self, path: &str, condition: Condition) -> Option<usize> {
        let path = normalize(path);
        self.sequence(condition).iter().position(|p| p.path == path)
    }

    /// The first path of the sequence for `condition` -- where new and
    /// reset participants are sent.
    pub fn first_path(&self, condition: Condition) -> Result<String, FlowError> {
        self.sequence(condition)
            .first()
            .map(|p| p.path.clone())
            .ok_or(FlowError::EmptySequence { condition })
    }

    /// The path following `path` in the sequence for `condition`.
    ///
    /// Clamps at the last index: there is no page after the end, so the
    /// final path advances to itself.
    pub fn next_path(&self, path: &str, condition: Condition) -> Result<String, FlowError> {
        let sequence = self.sequence(condition);
        let index = self.position(&sequence, path, condition)?;
        let clamped = (index + 1).min(sequence.len() - 1);
        Ok(sequence[clamped].path.clone())
    }

    /// The path preceding `path` in the sequence for `condition`,
    /// clamping at index 0.
    pub fn previous_path(&self, path: &str, condition: Condition) -> Result<String, FlowError> {
        let sequence = self.sequence(condition);
        let index = self.position(&sequence, path, condition)?;
        Ok(sequence[index.saturating_sub(1)].path.clone())
    }

    fn position(
        &self,
        sequence: &[&PageSpec],
        path: &str,
        condition: Condition,
    ) -> Result<usize, FlowError> {
        let normalized = normalize(path);
        sequence
            .iter()
            .position(|p| p.path == normalized)
            .ok_or_else(|| FlowError::UnknownPath {
                path: normalized.to_string(),
                condition,
            })
    }
}

/// Incoming paths may carry a leading slash (request paths do, stored
/// paths do not); comparisons always run on the slash-less form.
pub(crate) fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proband_core::{ConditionBranch, PageEntry, PageList};

    fn spec(path: &str) -> PageSpec {
        PageSpec {
            name: path.to_string(),
            path: path.to_string(),
        }
    }

    fn resolver() -> FlowResolver {
        let pages = PageList::new(vec![
            PageEntry::Page(spec("consent")),
            PageEntry::Branch(vec![
                ConditionBranch {
                    condition: 1,
                    pages: vec![spec("task/easy")],
                },
                ConditionBranch {
                    condition: 2,
                    pages: vec![spec("task/hard"), spec("task/debrief")],
                },
            ]),
            PageEntry::Page(spec("end")),
        ]);
        let arms = vec![
            proband_core::ArmConfig {
                label: "Easy".to_string(),
                enabled: true,
            },
            proband_core::ArmConfig {
                label: "Hard".to_string(),
                enabled: true,
            },
        ];
        FlowResolver::new(Arc::new(StudyConfig::new(pages, arms)))
    }

    #[test]
    fn index_of_strips_leading_slash() {
        let r = resolver();
        assert_eq!(r.index_of("/task/easy", Condition::arm(1)), Some(1));
        assert_eq!(r.index_of("task/easy", Condition::arm(1)), Some(1));
    }

    #[test]
    fn index_of_miss_is_none_not_zero() {
        let r = resolver();
        assert_eq!(r.index_of("task/easy", Condition::arm(2)), None);
        assert_eq!(r.index_of("consent", Condition::arm(2)), Some(0));
    }

    #[test]
    fn next_path_walks_the_condition_sequence() {
        let r = resolver();
        assert_eq!(r.next_path("consent", Condition::arm(1)).unwrap(), "task/easy");
        assert_eq!(r.next_path("consent", Condition::arm(2)).unwrap(), "task/hard");
        assert_eq!(
            r.next_path("task/hard", Condition::arm(2)).unwrap(),
            "task/debrief"
        );
    }

    #[test]
    fn next_path_clamps_at_the_last_index() {
        let r = resolver();
        assert_eq!(r.next_path("end", Condition::arm(1)).unwrap(), "end");
    }

    #[test]
    fn previous_path_clamps_at_index_zero() {
        let r = resolver();
        assert_eq!(r.previous_path("consent", Condition::arm(1)).unwrap(), "consent");
        assert_eq!(r.previous_path("end", Condition::arm(1)).unwrap(), "task/easy");
    }

    #[test]
    fn unknown_path_is_an_error_not_a_panic() {
        let r = resolver();
        assert_eq!(
            r.next_path("task/hard", Condition::arm(1)),
            Err(FlowError::UnknownPath {
                path: "task/hard".to_string(),
                condition: Condition::arm(1),
            })
        );
    }
}
