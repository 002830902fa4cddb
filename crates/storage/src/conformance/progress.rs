use std::future::Future;

use super::{minutes_after, TestResult, T0};
use crate::ParticipantStore;

pub(super) async fn run_progress_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "progress",
        "first_visit_creates_marker",
        first_visit_creates_marker(factory).await,
    ));
    results.push(TestResult::from_result(
        "progress",
        "revisit_does_not_reset_started_at",
        revisit_does_not_reset_started_at(factory).await,
    ));
    results.push(TestResult::from_result(
        "progress",
        "submission_stamps_submitted_at",
        submission_stamps_submitted_at(factory).await,
    ));
    results.push(TestResult::from_result(
        "progress",
        "markers_are_per_participant",
        markers_are_per_participant(factory).await,
    ));

    results
}

async fn first_visit_creates_marker<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let p = store
        .create_participant("127.0.0.1", "agent", T0)
        .await
        .map_err(|e| e.to_string())?;

    store
        .upsert_progress(p.id, "consent", false, minutes_after(1))
        .await
        .map_err(|e| e.to_string())?;

    let markers = store.progress_for(p.id).await.map_err(|e| e.to_string())?;
    if markers.len() != 1 {
        return Err(format!("expected 1 marker, got {}", markers.len()));
    }
    let marker = &markers[0];
    if marker.path != "consent" || marker.started_at != minutes_after(1) {
        return Err(format!("unexpected marker: {:?}", marker));
    }
    if marker.submitted_at.is_some() {
        return Err("plain visit stamped submitted_at".to_string());
    }
    Ok(())
}

async fn revisit_does_not_reset_started_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let p = store
        .create_participant("127.0.0.1", "agent", T0)
        .await
        .map_err(|e| e.to_string())?;

    store
        .upsert_progress(p.id, "consent", false, minutes_after(1))
        .await
        .map_err(|e| e.to_string())?;
    store
        .upsert_progress(p.id, "consent", false, minutes_after(5))
        .await
        .map_err(|e| e.to_string())?;

    let markers = store.progress_for(p.id).await.map_err(|e| e.to_string())?;
    if markers.len() != 1 {
        return Err(format!("revisit duplicated the marker: {}", markers.len()));
    }
    if markers[0].started_at != minutes_after(1) {
        return Err("revisit reset started_at".to_string());
    }
    Ok(())
}

async fn submission_stamps_submitted_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let p = store
        .create_participant("127.0.0.1", "agent", T0)
        .await
        .map_err(|e| e.to_string())?;

    store
        .upsert_progress(p.id, "questionnaire/demo", false, minutes_after(1))
        .await
        .map_err(|e| e.to_string())?;
    store
        .upsert_progress(p.id, "questionnaire/demo", true, minutes_after(4))
        .await
        .map_err(|e| e.to_string())?;

    let markers = store.progress_for(p.id).await.map_err(|e| e.to_string())?;
    let marker = markers
        .iter()
        .find(|m| m.path == "questionnaire/demo")
        .ok_or("marker missing after submission")?;
    if marker.started_at != minutes_after(1) {
        return Err("submission reset started_at".to_string());
    }
    if marker.submitted_at != Some(minutes_after(4)) {
        return Err(format!("submitted_at not stamped: {:?}", marker.submitted_at));
    }
    Ok(())
}

async fn markers_are_per_participant<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let a = store
        .create_participant("127.0.0.1", "agent", T0)
        .await
        .map_err(|e| e.to_string())?;
    let b = store
        .create_participant("127.0.0.2", "agent", T0)
        .await
        .map_err(|e| e.to_string())?;

    store
        .upsert_progress(a.id, "consent", false, minutes_after(1))
        .await
        .map_err(|e| e.to_string())?;

    let for_b = store.progress_for(b.id).await.map_err(|e| e.to_string())?;
    if !for_b.is_empty() {
        return Err("participant B sees participant A's markers".to_string());
    }
    Ok(())
}
