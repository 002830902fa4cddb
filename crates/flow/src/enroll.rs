//! Enrollment and re-entry orchestration: the consent-time entry points
//! that create participants, grant conditions, and reconcile returning
//! attempts.

use proband_core::Condition;
use proband_storage::{ParticipantRecord, ParticipantStore, StorageError};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::assigner::ConditionAssigner;
use crate::error::AssignmentError;

/// Request-derived identity captured at enrollment.
#[derive(Debug, Clone, Copy)]
pub struct EnrollmentIdentity<'a> {
    pub ip_address: &'a str,
    pub user_agent: &'a str,
}

/// Create a participant at consent time.
///
/// With `assign_condition` the assigner grants an arm (or `None` when the
/// study has no arms); without it the participant is explicitly
/// unconditioned -- the caller may grant an arm later via
/// [`assign_later`].
pub async fn enroll<S: ParticipantStore>(
    store: &S,
    assigner: &ConditionAssigner,
    identity: EnrollmentIdentity<'_>,
    assign_condition: bool,
    now: OffsetDateTime,
) -> Result<ParticipantRecord, AssignmentError> {
    let mut participant = store
        .create_participant(identity.ip_address, identity.user_agent, now)
        .await?;

    participant.condition = if assign_condition {
        assigner.assign(store, now).await?
    } else {
        Some(Condition::NONE)
    };
    store.save_participant(&participant).await?;
    Ok(participant)
}

/// Grant a condition after enrollment -- used when assignment should wait
/// until participants have demonstrated genuine engagement (e.g. past the
/// initial questionnaires), so no-shows never consume an arm slot.
///
/// A live assignment is never overwritten: granted conditions are
/// monotonic until explicitly released.
pub async fn assign_later<S: ParticipantStore>(
    store: &S,
    assigner: &ConditionAssigner,
    participant: &mut ParticipantRecord,
    now: OffsetDateTime,
) -> Result<(), AssignmentError> {
    if participant.condition.is_some_and(Condition::is_assigned) {
        return Ok(());
    }
    participant.condition = assigner.assign(store, now).await?;
    store.save_participant(participant).await?;
    Ok(())
}

/// Bind a recruitment-platform identifier to the participant and
/// reconcile prior attempts under the same identifier.
///
/// A returning participant keeps the condition granted on their first
/// attempt (the dataset stays in one arm), and every stale attempt's
/// condition is released so abandoned rows stop counting toward arm
/// balance. Also stamps the completion code shown on the end page.
pub async fn rebind_external_id<S: ParticipantStore>(
    store: &S,
    participant: &mut ParticipantRecord,
    external_id: &str,
    _now: OffsetDateTime,
) -> Result<(), StorageError> {
    participant.external_id = external_id.trim().to_string();
    participant.completion_code = Some(Uuid::new_v4().simple().to_string());

    let prior = store
        .find_by_external_id(&participant.external_id, participant.id)
        .await?;

    if !prior.is_empty() {
        info!(
            participant = participant.id,
            adopted_from = prior[0].id,
            stale_attempts = prior.len(),
            "returning participant; adopting original condition"
        );
        participant.condition = prior[0].condition;
        for mut stale in prior {
            stale.release_condition();
            store.save_participant(&stale).await?;
        }
    }

    store.save_participant(participant).await?;
    Ok(())
}

/// Mark the participant finished -- the end-of-study handler body.
pub async fn complete<S: ParticipantStore>(
    store: &S,
    participant: &mut ParticipantRecord,
    now: OffsetDateTime,
) -> Result<(), StorageError> {
    participant.finish(now);
    store.save_participant(participant).await
}
