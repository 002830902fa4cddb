use proband_core::Condition;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// A participant's persisted row: identity, arm assignment, and flow state.
///
/// The flow-state columns (`condition`, `current_path`, `finished`,
/// `last_active_at`) are mutated only through the guard and advance
/// operations of `proband-flow`; everything else is stamped at enrollment
/// or terminal completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub id: i64,
    /// Recruitment-platform identifier (e.g. a worker id), empty until the
    /// participant provides one.
    pub external_id: String,
    pub ip_address: String,
    pub user_agent: String,
    /// `None` until assignment runs. `Some(NONE)` is an explicit
    /// "unconditioned" outcome; negative raw values mark a released
    /// (superseded) assignment.
    pub condition: Option<Condition>,
    /// The most recently granted path, without a leading slash. `None`
    /// until the participant's first guarded page view.
    pub current_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_active_at: OffsetDateTime,
    pub finished: bool,
    /// Completion code shown on the end page, set when an external id is
    /// bound.
    pub completion_code: Option<String>,
    /// Admin-set flag removing this participant from arm-balance counts.
    pub exclude_from_count: bool,
}

impl ParticipantRecord {
    /// A fresh record as created at enrollment time.
    pub fn new(id: i64, ip_address: &str, user_agent: &str, now: OffsetDateTime) -> Self {
        ParticipantRecord {
            id,
            external_id: String::new(),
            ip_address: ip_address.to_string(),
            user_agent: user_agent.to_string(),
            condition: None,
            current_path: None,
            started_at: now,
            ended_at: None,
            last_active_at: now,
            finished: false,
            completion_code: None,
            exclude_from_count: false,
        }
    }

    /// Record request activity.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_active_at = now;
    }

    /// Mark the participant as having reached the end of the study.
    pub fn finish(&mut self, now: OffsetDateTime) {
        self.finished = true;
        self.ended_at = Some(now);
    }

    /// Release a granted condition so this attempt stops counting toward
    /// arm balance. Only a live (positive) assignment is negated;
    /// unconditioned and unassigned participants are left untouched.
    pub fn release_condition(&mut self) {
        if let Some(condition) = self.condition {
            self.condition = Some(condition.released());
        }
    }

    /// The condition used to resolve this participant's page sequence.
    /// Unassigned participants navigate the unconditioned sequence.
    pub fn effective_condition(&self) -> Condition {
        self.condition.unwrap_or(Condition::NONE)
    }

    /// Derived on read: unfinished and idle for longer than `idle_after`.
    pub fn is_abandoned(&self, now: OffsetDateTime, idle_after: Duration) -> bool {
        !self.finished && now - self.last_active_at > idle_after
    }

    /// Derived on read: unfinished but recently active.
    pub fn is_in_progress(&self, now: OffsetDateTime, idle_after: Duration) -> bool {
        !self.finished && now - self.last_active_at <= idle_after
    }

    /// Total time from enrollment to completion, if completed.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|ended| ended - self.started_at)
    }

    /// Human-readable status for the progress view: elapsed time once
    /// finished, otherwise "In Progress" or "Abandoned".
    pub fn display_duration(&self, now: OffsetDateTime, idle_after: Duration) -> String {
        match self.duration() {
            Some(elapsed) => display_time(elapsed),
            None if self.is_abandoned(now, idle_after) => "Abandoned".to_string(),
            None => "In Progress".to_string(),
        }
    }
}

/// One participant x page-path progress marker, created lazily the first
/// time the participant reaches the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub participant_id: i64,
    pub path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Stamped when the path is left via a form submission.
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
}

impl ProgressRecord {
    /// Time spent on this page, if it was submitted.
    pub fn duration(&self) -> Option<Duration> {
        self.submitted_at.map(|submitted| submitted - self.started_at)
    }

    /// Per-page duration for the progress view; "..." while unsubmitted.
    pub fn display_duration(&self) -> String {
        match self.duration() {
            Some(elapsed) => display_time(elapsed),
            None => "...".to_string(),
        }
    }
}

/// Render an elapsed duration as whole seconds, or `m:ss` past a minute.
pub fn display_time(elapsed: Duration) -> String {
    let seconds = elapsed.whole_seconds().max(0);
    if seconds > 60 {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        seconds.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const IDLE: Duration = Duration::minutes(15);

    fn record() -> ParticipantRecord {
        ParticipantRecord::new(1, "127.0.0.1", "test-agent", datetime!(2025-06-01 12:00 UTC))
    }

    #[test]
    fn abandonment_is_derived_from_last_activity() {
        let p = record();
        let soon = datetime!(2025-06-01 12:10 UTC);
        let late = datetime!(2025-06-01 13:00 UTC);

        assert!(p.is_in_progress(soon, IDLE));
        assert!(!p.is_abandoned(soon, IDLE));
        assert!(p.is_abandoned(late, IDLE));
    }

    #[test]
    fn finished_participant_is_never_abandoned() {
        let mut p = record();
        p.finish(datetime!(2025-06-01 12:30 UTC));
        assert!(!p.is_abandoned(datetime!(2025-06-02 12:00 UTC), IDLE));
    }

    #[test]
    fn release_is_idempotent_and_skips_unconditioned() {
        let mut p = record();
        p.condition = Some(Condition::arm(2));
        p.release_condition();
        p.release_condition();
        assert_eq!(p.condition, Some(Condition::from_raw(-2)));

        let mut nc = record();
        nc.condition = Some(Condition::NONE);
        nc.release_condition();
        assert_eq!(nc.condition, Some(Condition::NONE));
    }

    #[test]
    fn display_time_formats() {
        assert_eq!(display_time(Duration::seconds(42)), "42");
        assert_eq!(display_time(Duration::seconds(61)), "1:01");
        assert_eq!(display_time(Duration::seconds(605)), "10:05");
    }

    #[test]
    fn progress_duration_requires_submission() {
        let mut progress = ProgressRecord {
            participant_id: 1,
            path: "consent".to_string(),
            started_at: datetime!(2025-06-01 12:00 UTC),
            submitted_at: None,
        };
        assert_eq!(progress.display_duration(), "...");

        progress.submitted_at = Some(datetime!(2025-06-01 12:01:30 UTC));
        assert_eq!(progress.display_duration(), "1:30");
    }

    #[test]
    fn records_round_trip_through_rfc3339_json() {
        let mut p = record();
        p.condition = Some(Condition::arm(1));
        let json = serde_json::to_string(&p).unwrap();
        let back: ParticipantRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
