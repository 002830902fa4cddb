//! The page guard: the access-control state machine applied on every
//! guarded page request.
//!
//! A participant has exactly one recorded path at any time. Requests for
//! that path are allowed through; requests for any other path are
//! answered with a redirect back to the recorded path. All forward motion
//! happens through the explicit advance operations here -- never by a
//! participant requesting a later path directly.

use proband_storage::{ParticipantRecord, ParticipantStore};
use time::OffsetDateTime;
use tracing::warn;

use crate::error::{FlowError, GuardError};
use crate::resolver::{normalize, FlowResolver, END_PATH};

/// What a guard or advance operation tells the serving layer to do:
/// exactly one of "run the handler" or "redirect" -- never both, never
/// neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Let the request through to its handler.
    Allow,
    /// Deny the handler; send the client to this path instead.
    Redirect(String),
}

/// Whether a guarded request carries a form submission (write intent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestIntent {
    View,
    Submission,
}

/// The access-control state machine. Cheap to clone; holds only the
/// shared resolver.
#[derive(Debug, Clone)]
pub struct PageGuard {
    resolver: FlowResolver,
}

impl PageGuard {
    pub fn new(resolver: FlowResolver) -> PageGuard {
        PageGuard { resolver }
    }

    pub fn resolver(&self) -> &FlowResolver {
        &self.resolver
    }

    /// Evaluate a guarded page request.
    ///
    /// - first contact (no recorded path): record the sequence's first
    ///   page; allow the request if that is what was asked for, redirect
    ///   to it otherwise
    /// - on track (requested == recorded): allow; stamp activity and the
    ///   progress marker (`submitted_at` on a submission)
    /// - off track: redirect to the recorded path, unconditionally and
    ///   without writing any state
    ///
    /// A recorded path that no longer resolves under the participant's
    /// own condition (configuration changed mid-study, or the stored
    /// condition exceeds the current arm count) resets the participant to
    /// the start of the newly-resolved sequence instead of erroring.
    pub async fn check<S: ParticipantStore>(
        &self,
        store: &S,
        participant: &mut ParticipantRecord,
        requested_path: &str,
        intent: RequestIntent,
        now: OffsetDateTime,
    ) -> Result<GuardOutcome, GuardError> {
        let requested = normalize(requested_path).to_string();
        let condition = participant.effective_condition();

        if let Some(recorded) = participant.current_path.clone() {
            if self.resolver.index_of(&recorded, condition).is_none() {
                warn!(
                    participant = participant.id,
                    recorded = %recorded,
                    condition = %condition,
                    "recorded path no longer resolves; resetting to sequence start"
                );
                let first = self.resolver.first_path(condition)?;
                return self.record_and_redirect(store, participant, first).await;
            }

            return if recorded == requested {
                participant.touch(now);
                store.save_participant(participant).await?;
                store
                    .upsert_progress(
                        participant.id,
                        &recorded,
                        intent == RequestIntent::Submission,
                        now,
                    )
                    .await?;
                Ok(GuardOutcome::Allow)
            } else {
                Ok(GuardOutcome::Redirect(recorded))
            };
        }

        // First contact: pin the participant to the start of their
        // sequence before anything else runs.
        let first = self.resolver.first_path(condition)?;
        participant.current_path = Some(first.clone());
        store.save_participant(participant).await?;
        if requested == first {
            Ok(GuardOutcome::Allow)
        } else {
            Ok(GuardOutcome::Redirect(first))
        }
    }

    /// Advance to the next page.
    ///
    /// The position advanced from is taken from the HTTP referrer when
    /// one is available (the advance endpoint is reached by redirect, so
    /// the referrer names the page being left), falling back to the
    /// recorded path. When that position is the terminal `end` path the
    /// participant is sent straight back to it -- the end page is
    /// idempotently re-enterable and next-path clamping is never
    /// consulted there.
    pub async fn advance<S: ParticipantStore>(
        &self,
        store: &S,
        participant: &mut ParticipantRecord,
        referrer: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<GuardOutcome, GuardError> {
        let position = referrer
            .map(|r| normalize(r).to_string())
            .or_else(|| participant.current_path.clone());

        let Some(position) = position else {
            warn!(participant = participant.id, "advance with no position; resetting");
            return self.reset_to_start(store, participant).await;
        };

        if position == END_PATH {
            return Ok(GuardOutcome::Redirect(END_PATH.to_string()));
        }

        self.advance_from(store, participant, &position, now).await
    }

    /// Advance from a named path, ignoring the referrer.
    pub async fn advance_from<S: ParticipantStore>(
        &self,
        store: &S,
        participant: &mut ParticipantRecord,
        page: &str,
        _now: OffsetDateTime,
    ) -> Result<GuardOutcome, GuardError> {
        let condition = participant.effective_condition();
        match self.resolver.next_path(page, condition) {
            Ok(next) => self.record_and_redirect(store, participant, next).await,
            Err(FlowError::UnknownPath { path, .. }) => {
                warn!(
                    participant = participant.id,
                    path = %path,
                    "advancing from a path outside the sequence; resetting"
                );
                self.reset_to_start(store, participant).await
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Step back to the previous page (a debugging aid; clamps at the
    /// first page).
    pub async fn retreat<S: ParticipantStore>(
        &self,
        store: &S,
        participant: &mut ParticipantRecord,
        _now: OffsetDateTime,
    ) -> Result<GuardOutcome, GuardError> {
        let condition = participant.effective_condition();
        let Some(recorded) = participant.current_path.clone() else {
            return self.reset_to_start(store, participant).await;
        };
        match self.resolver.previous_path(&recorded, condition) {
            Ok(previous) => self.record_and_redirect(store, participant, previous).await,
            Err(FlowError::UnknownPath { path, .. }) => {
                warn!(
                    participant = participant.id,
                    path = %path,
                    "retreating from a path outside the sequence; resetting"
                );
                self.reset_to_start(store, participant).await
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Jump the participant to an arbitrary path of their sequence.
    ///
    /// The target is validated against the participant's own sequence so
    /// the recorded path always resolves; a dangling target resets to the
    /// start like any other navigation miss.
    pub async fn jump_to<S: ParticipantStore>(
        &self,
        store: &S,
        participant: &mut ParticipantRecord,
        page: &str,
        _now: OffsetDateTime,
    ) -> Result<GuardOutcome, GuardError> {
        let condition = participant.effective_condition();
        let target = normalize(page).to_string();
        if self.resolver.index_of(&target, condition).is_none() {
            warn!(
                participant = participant.id,
                target = %target,
                "jump target outside the sequence; resetting"
            );
            return self.reset_to_start(store, participant).await;
        }
        self.record_and_redirect(store, participant, target).await
    }

    async fn reset_to_start<S: ParticipantStore>(
        &self,
        store: &S,
        participant: &mut ParticipantRecord,
    ) -> Result<GuardOutcome, GuardError> {
        let first = self.resolver.first_path(participant.effective_condition())?;
        self.record_and_redirect(store, participant, first).await
    }

    /// The single funnel every path change goes through: record the new
    /// path, persist, redirect.
    async fn record_and_redirect<S: ParticipantStore>(
        &self,
        store: &S,
        participant: &mut ParticipantRecord,
        path: String,
    ) -> Result<GuardOutcome, GuardError> {
        participant.current_path = Some(path.clone());
        store.save_participant(participant).await?;
        Ok(GuardOutcome::Redirect(path))
    }
}
