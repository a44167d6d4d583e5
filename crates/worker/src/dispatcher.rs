//! Queue dispatch: claim loops per lane plus the stale-claim sweeper.
//!
//! The GPU lane runs one task at a time so a single generation holds the
//! GPU; the CPU lane runs with configurable parallelism. All loops stop
//! on the shared cancellation token.

use std::time::Duration;

use sqlx::PgPool;
use storyloom_db::models::TaskQueue;
use storyloom_db::repositories::TaskRepo;
use storyloom_pipeline::{run_task, PipelineContext, TaskOutcome};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;

/// Spawn every dispatch loop. The handles finish once `cancel` fires and
/// in-flight tasks wind down.
pub fn spawn_all(
    ctx: &PipelineContext,
    pool: &PgPool,
    config: &WorkerConfig,
    worker_id: &str,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    handles.push(tokio::spawn(claim_loop(
        ctx.clone(),
        pool.clone(),
        TaskQueue::Gpu,
        format!("{worker_id}/gpu"),
        config.clone(),
        cancel.clone(),
    )));
    for slot in 0..config.cpu_concurrency {
        handles.push(tokio::spawn(claim_loop(
            ctx.clone(),
            pool.clone(),
            TaskQueue::Cpu,
            format!("{worker_id}/cpu-{slot}"),
            config.clone(),
            cancel.clone(),
        )));
    }
    handles.push(tokio::spawn(stale_sweeper(
        pool.clone(),
        config.stale_claim_secs,
        cancel.clone(),
    )));
    handles
}

async fn claim_loop(
    ctx: PipelineContext,
    pool: PgPool,
    queue: TaskQueue,
    lane_id: String,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    info!(lane = %lane_id, "lane started");
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match TaskRepo::claim_next(&pool, queue, &lane_id).await {
            Ok(Some(task)) => {
                let outcome = run_task(&ctx, &task).await;
                settle(&pool, task.id, outcome, config.retry_delay_secs).await;
            }
            Ok(None) => {
                idle(&cancel, Duration::from_millis(config.idle_poll_ms)).await;
            }
            Err(e) => {
                error!(lane = %lane_id, error = %e, "claim failed");
                idle(&cancel, Duration::from_millis(config.idle_poll_ms)).await;
            }
        }
    }
    info!(lane = %lane_id, "lane stopped");
}

async fn settle(pool: &PgPool, task_id: i64, outcome: TaskOutcome, retry_delay_secs: i64) {
    let result = match outcome {
        TaskOutcome::Done => TaskRepo::complete(pool, task_id).await,
        TaskOutcome::Retry(message) => {
            TaskRepo::fail(pool, task_id, &message, retry_delay_secs)
                .await
                .map(|will_retry| {
                    if !will_retry {
                        warn!(task_id, "retry budget exhausted, task parked as failed");
                    }
                })
        }
        TaskOutcome::Failed(message) => TaskRepo::park(pool, task_id, &message).await,
    };
    if let Err(e) = result {
        // The claim stays in place; the stale sweep will requeue it.
        error!(task_id, error = %e, "could not settle task");
    }
}

async fn stale_sweeper(pool: PgPool, stale_after_secs: i64, cancel: CancellationToken) {
    // Sweep often enough that an orphaned GPU task is not lost for long.
    let interval = Duration::from_secs((stale_after_secs as u64 / 4).max(15));
    loop {
        idle(&cancel, interval).await;
        if cancel.is_cancelled() {
            break;
        }
        for queue in [TaskQueue::Gpu, TaskQueue::Cpu] {
            if let Err(e) = TaskRepo::requeue_stale(&pool, queue, stale_after_secs).await {
                error!(queue = queue.as_str(), error = %e, "stale sweep failed");
            }
        }
    }
}

async fn idle(cancel: &CancellationToken, duration: Duration) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(duration) => {}
    }
}
