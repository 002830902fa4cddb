use std::future::Future;

use proband_core::Condition;

use super::{minutes_after, TestResult, T0};
use crate::{ParticipantRecord, ParticipantStore, StorageError};

pub(super) async fn run_count_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "counts",
        "count_matches_exact_condition_only",
        count_matches_exact_condition_only(factory).await,
    ));
    results.push(TestResult::from_result(
        "counts",
        "released_conditions_never_count",
        released_conditions_never_count(factory).await,
    ));
    results.push(TestResult::from_result(
        "counts",
        "exclude_from_count_is_honored",
        exclude_from_count_is_honored(factory).await,
    ));
    results.push(TestResult::from_result(
        "counts",
        "idle_cutoff_drops_abandoned_unfinished_rows",
        idle_cutoff_drops_abandoned_unfinished_rows(factory).await,
    ));
    results.push(TestResult::from_result(
        "counts",
        "external_id_lookup_skips_self_and_released",
        external_id_lookup_skips_self_and_released(factory).await,
    ));

    results
}

async fn seed<S: ParticipantStore>(
    store: &S,
    condition: Condition,
) -> Result<ParticipantRecord, StorageError> {
    let mut p = store.create_participant("127.0.0.1", "agent", T0).await?;
    p.condition = Some(condition);
    store.save_participant(&p).await?;
    Ok(p)
}

async fn count_matches_exact_condition_only<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;
    seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;
    seed(&store, Condition::arm(2)).await.map_err(|e| e.to_string())?;
    seed(&store, Condition::NONE).await.map_err(|e| e.to_string())?;

    let one = store
        .count_in_condition(Condition::arm(1), None)
        .await
        .map_err(|e| e.to_string())?;
    let two = store
        .count_in_condition(Condition::arm(2), None)
        .await
        .map_err(|e| e.to_string())?;
    let three = store
        .count_in_condition(Condition::arm(3), None)
        .await
        .map_err(|e| e.to_string())?;

    if (one, two, three) != (2, 1, 0) {
        return Err(format!("expected (2, 1, 0), got ({}, {}, {})", one, two, three));
    }
    Ok(())
}

async fn released_conditions_never_count<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let mut p = seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;
    p.release_condition();
    store.save_participant(&p).await.map_err(|e| e.to_string())?;

    let count = store
        .count_in_condition(Condition::arm(1), None)
        .await
        .map_err(|e| e.to_string())?;
    if count != 0 {
        return Err(format!("released row still counted: {}", count));
    }
    Ok(())
}

async fn exclude_from_count_is_honored<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let mut p = seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;
    p.exclude_from_count = true;
    store.save_participant(&p).await.map_err(|e| e.to_string())?;

    let count = store
        .count_in_condition(Condition::arm(1), None)
        .await
        .map_err(|e| e.to_string())?;
    if count != 0 {
        return Err(format!("excluded row still counted: {}", count));
    }
    Ok(())
}

async fn idle_cutoff_drops_abandoned_unfinished_rows<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;

    // Stale and unfinished: dropped by the cutoff.
    seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;

    // Stale but finished: kept.
    let mut finished = seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;
    finished.finish(minutes_after(5));
    finished.last_active_at = T0;
    store
        .save_participant(&finished)
        .await
        .map_err(|e| e.to_string())?;

    // Recently active: kept.
    let mut active = seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;
    active.touch(minutes_after(60));
    store.save_participant(&active).await.map_err(|e| e.to_string())?;

    let cutoff = minutes_after(30);
    let count = store
        .count_in_condition(Condition::arm(1), Some(cutoff))
        .await
        .map_err(|e| e.to_string())?;
    if count != 2 {
        return Err(format!("expected 2 counted rows under cutoff, got {}", count));
    }

    let without_cutoff = store
        .count_in_condition(Condition::arm(1), None)
        .await
        .map_err(|e| e.to_string())?;
    if without_cutoff != 3 {
        return Err(format!("expected 3 rows without cutoff, got {}", without_cutoff));
    }
    Ok(())
}

async fn external_id_lookup_skips_self_and_released<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ParticipantStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;

    let mut earlier = seed(&store, Condition::arm(2)).await.map_err(|e| e.to_string())?;
    earlier.external_id = "WORKER-1".to_string();
    store.save_participant(&earlier).await.map_err(|e| e.to_string())?;

    let mut released = seed(&store, Condition::arm(1)).await.map_err(|e| e.to_string())?;
    released.external_id = "WORKER-1".to_string();
    released.release_condition();
    store.save_participant(&released).await.map_err(|e| e.to_string())?;

    let mut current = store
        .create_participant("127.0.0.1", "agent", minutes_after(10))
        .await
        .map_err(|e| e.to_string())?;
    current.external_id = "WORKER-1".to_string();
    store.save_participant(&current).await.map_err(|e| e.to_string())?;

    let found = store
        .find_by_external_id("WORKER-1", current.id)
        .await
        .map_err(|e| e.to_string())?;

    if found.len() != 1 {
        return Err(format!("expected exactly the earlier attempt, got {}", found.len()));
    }
    if found[0].id != earlier.id {
        return Err(format!("expected row {}, got {}", earlier.id, found[0].id));
    }
    Ok(())
}
