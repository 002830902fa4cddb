use std::future::Future;

use super::{minutes_after, TestResult, T0};
use crate::{ParticipantStore, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "create_returns_fresh_unassigned_row",
        create_returns_fresh_unassigned_row(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "created_row_readable_by_id",
        created_row_readable_by_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "ids_are_distinct_across_creates",
        ids_are_distinct_across_creates(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "get_unknown_id_returns_not_found",
        get_unknown_id_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "save_round_trips_flow_state",
        save_round_trips_flow_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "save_unknown_row_returns_not_found",
        save_unknown_row_returns_not_found(factory).await,
    ));

    results
}

async fn create_returns_fresh_unassigned_row<S, F, Fut>(factory: &F) -> Result<(), String>
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

    if p.condition.is_some() {
        return Err(format!("new row has a condition: {:?}", p.condition));
    }
    if p.current_path.is_some() {
        return Err(format!("new row has a current path: {:?}", p.current_path));
    }
    if p.finished {
        return Err("new row is marked finished".to_string());
    }
    if p.last_active_at != T0 || p.started_at != T0 {
        return Err("new row timestamps do not match the creation instant".to_string());
    }
    Ok(())
}

async fn created_row_readable_by_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let created = store
        .create_participant("127.0.0.1", "agent", T0)
        .await
        .map_err(|e| e.to_string())?;
    let read = store
        .get_participant(created.id)
        .await
        .map_err(|e| e.to_string())?;
    if read != created {
        return Err("read-back row differs from the created row".to_string());
    }
    Ok(())
}

async fn ids_are_distinct_across_creates<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .create_participant("127.0.0.2", "agent", minutes_after(1))
        .await
        .map_err(|e| e.to_string())?;
    if a.id == b.id {
        return Err(format!("two creates produced the same id {}", a.id));
    }
    Ok(())
}

async fn get_unknown_id_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get_participant(9999).await {
        Err(StorageError::ParticipantNotFound { id: 9999 }) => Ok(()),
        Err(other) => Err(format!("expected ParticipantNotFound, got {}", other)),
        Ok(_) => Err("expected ParticipantNotFound, got a row".to_string()),
    }
}

async fn save_round_trips_flow_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let mut p = store
        .create_participant("127.0.0.1", "agent", T0)
        .await
        .map_err(|e| e.to_string())?;

    p.condition = Some(proband_core::Condition::arm(2));
    p.current_path = Some("questionnaire/demographics".to_string());
    p.touch(minutes_after(3));
    store.save_participant(&p).await.map_err(|e| e.to_string())?;

    let read = store
        .get_participant(p.id)
        .await
        .map_err(|e| e.to_string())?;
    if read != p {
        return Err("saved flow state did not round-trip".to_string());
    }
    Ok(())
}

async fn save_unknown_row_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let ghost = crate::ParticipantRecord::new(424242, "127.0.0.1", "agent", T0);
    match store.save_participant(&ghost).await {
        Err(StorageError::ParticipantNotFound { id }) if id == 424242 => Ok(()),
        Err(other) => Err(format!("expected ParticipantNotFound, got {}", other)),
        Ok(()) => Err("saving a never-created row succeeded".to_string()),
    }
}
