//! Greedy load-balanced condition assignment.

use std::sync::Arc;

use proband_core::{ArmConfig, Condition, StudyConfig};
use proband_storage::ParticipantStore;
use time::OffsetDateTime;
use tracing::info;

use crate::error::AssignmentError;

/// Picks an arm for a newly consenting participant by greedy minimum
/// count with stable ordinal tie-breaking.
///
/// Counts are read without a lock: two concurrent enrollments may both
/// observe the same minimum and land in the same arm. That bounded
/// imbalance is accepted for this workload (independent human
/// participants at low relative concurrency).
#[derive(Debug, Clone)]
pub struct ConditionAssigner {
    config: Arc<StudyConfig>,
}

impl ConditionAssigner {
    pub fn new(config: Arc<StudyConfig>) -> ConditionAssigner {
        ConditionAssigner { config }
    }

    /// Assign an arm to a new participant.
    ///
    /// - no arms configured: `Ok(None)` -- the study does not use
    ///   conditions
    /// - otherwise: the least-populated enabled arm, counting only live
    ///   assignments (released conditions and `exclude_from_count` rows
    ///   never count; abandoned attempts are excluded unless the study
    ///   opts into counting them)
    /// - every arm disabled: `Err(NoEnabledArms)` -- startup validation
    ///   rejects this, so hitting it here means arms were toggled at
    ///   runtime
    pub async fn assign<S: ParticipantStore>(
        &self,
        store: &S,
        now: OffsetDateTime,
    ) -> Result<Option<Condition>, AssignmentError> {
        let arms = &self.config.arms;
        if arms.is_empty() {
            return Ok(None);
        }

        let idle_cutoff =
            (!self.config.count_abandoned).then(|| now - self.config.abandoned_after);

        let mut counts = Vec::with_capacity(arms.len());
        for ordinal in 1..=arms.len() as u16 {
            let count = store
                .count_in_condition(Condition::arm(ordinal), idle_cutoff)
                .await?;
            counts.push((ordinal, count));
        }

        let chosen = pick_arm(&counts, arms).ok_or(AssignmentError::NoEnabledArms {
            arms: arms.len(),
        })?;
        info!(?counts, arm = chosen, "assigned condition");
        Ok(Some(Condition::arm(chosen)))
    }
}

/// The pure selection step: stable-sort `(ordinal, count)` pairs by count
/// ascending and take the first enabled arm. The stable sort preserves
/// ordinal order among ties, so the lowest tied ordinal wins.
pub fn pick_arm(counts: &[(u16, u64)], arms: &[ArmConfig]) -> Option<u16> {
    let mut by_count = counts.to_vec();
    by_count.sort_by_key(|&(_, count)| count);
    by_count
        .iter()
        .map(|&(ordinal, _)| ordinal)
        .find(|&ordinal| {
            arms.get(usize::from(ordinal) - 1)
                .is_some_and(|arm| arm.enabled)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proband_core::{PageEntry, PageList, PageSpec};
    use proband_storage::{MemoryStore, ParticipantStore};
    use time::macros::datetime;

    fn arms(flags: &[bool]) -> Vec<ArmConfig> {
        flags
            .iter()
            .enumerate()
            .map(|(i, &enabled)| ArmConfig {
                label: format!("Arm {}", i + 1),
                enabled,
            })
            .collect()
    }

    #[test]
    fn minimum_count_wins() {
        let counts = [(1, 5), (2, 2), (3, 2), (4, 8)];
        assert_eq!(pick_arm(&counts, &arms(&[true; 4])), Some(2));
    }

    #[test]
    fn ties_break_by_ordinal() {
        let counts = [(1, 0), (2, 0)];
        assert_eq!(pick_arm(&counts, &arms(&[true, true])), Some(1));
    }

    #[test]
    fn disabled_arms_are_skipped_even_at_minimum() {
        let counts = [(1, 0), (2, 3)];
        assert_eq!(pick_arm(&counts, &arms(&[false, true])), Some(2));
    }

    #[test]
    fn no_enabled_arm_yields_none() {
        let counts = [(1, 0), (2, 0)];
        assert_eq!(pick_arm(&counts, &arms(&[false, false])), None);
    }

    #[tokio::test]
    async fn assign_without_arms_is_unconditioned() {
        let pages = PageList::new(vec![PageEntry::Page(PageSpec {
            name: "Consent".to_string(),
            path: "consent".to_string(),
        })]);
        let assigner = ConditionAssigner::new(Arc::new(StudyConfig::new(pages, vec![])));
        let store = MemoryStore::new();

        let assigned = assigner
            .assign(&store, datetime!(2025-06-01 12:00 UTC))
            .await
            .unwrap();
        assert_eq!(assigned, None);
    }

    #[tokio::test]
    async fn assign_balances_against_live_counts() {
        let pages = PageList::new(vec![PageEntry::Page(PageSpec {
            name: "Consent".to_string(),
            path: "consent".to_string(),
        })]);
        let config = Arc::new(StudyConfig::new(pages, arms(&[true, true])));
        let assigner = ConditionAssigner::new(config);
        let store = MemoryStore::new();
        let now = datetime!(2025-06-01 12:00 UTC);

        // Two live participants in arm 1, none in arm 2.
        for _ in 0..2 {
            let mut p = store.create_participant("127.0.0.1", "agent", now).await.unwrap();
            p.condition = Some(Condition::arm(1));
            store.save_participant(&p).await.unwrap();
        }

        let assigned = assigner.assign(&store, now).await.unwrap();
        assert_eq!(assigned, Some(Condition::arm(2)));
    }

    #[tokio::test]
    async fn released_attempts_do_not_skew_assignment() {
        let pages = PageList::new(vec![PageEntry::Page(PageSpec {
            name: "Consent".to_string(),
            path: "consent".to_string(),
        })]);
        let config = Arc::new(StudyConfig::new(pages, arms(&[true, true])));
        let assigner = ConditionAssigner::new(config);
        let store = MemoryStore::new();
        let now = datetime!(2025-06-01 12:00 UTC);

        // Arm 2 once held two participants, both since released.
        for _ in 0..2 {
            let mut p = store.create_participant("127.0.0.1", "agent", now).await.unwrap();
            p.condition = Some(Condition::arm(2));
            p.release_condition();
            store.save_participant(&p).await.unwrap();
        }
        let mut live = store.create_participant("127.0.0.1", "agent", now).await.unwrap();
        live.condition = Some(Condition::arm(1));
        store.save_participant(&live).await.unwrap();

        // Arm 2 is genuinely empty, so it must win despite its history.
        let assigned = assigner.assign(&store, now).await.unwrap();
        assert_eq!(assigned, Some(Condition::arm(2)));
    }
}
