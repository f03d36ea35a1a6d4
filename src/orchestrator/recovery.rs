//! Best-effort failure handling for a pipeline run.
//!
//! Each step returns `Result<()>`; [`recover`] logs and ignores their
//! errors so that one failing step never prevents the next.

use tracing::{error, info, warn};

use super::connection::{ensure_connection, with_reconnect_retry};
use crate::error::{DaemonError, ErrorCode, Result};
use crate::store::{Store, StoreOpener};
use crate::tasks::TaskRegistry;

/// Reply written to the placeholder message of a failed run.
pub fn failure_reply(err: &DaemonError) -> String {
    format!("generation failed: {}", err.message)
}

/// Rewrites the placeholder message so the conversation shows the failure.
pub async fn annotate_message(store: &dyn Store, message_id: &str, err: &DaemonError) -> Result<()> {
    if let Err(e) = ensure_connection(store).await {
        warn!(error = %e, "storage still unreachable before annotating message");
    }
    let reply = failure_reply(err);
    let updated =
        with_reconnect_retry(store, || store.update_message_reply(message_id, &reply)).await?;
    if !updated {
        info!(message_id, "placeholder message no longer exists");
    }
    Ok(())
}

/// Fails the task through the pipeline's own store.
///
/// A task that is already terminal is left as it is.
pub async fn fail_task(tasks: &TaskRegistry, task_id: &str, reason: &str) -> Result<()> {
    let store = &**tasks.store();
    if let Err(e) = ensure_connection(store).await {
        warn!(error = %e, "storage still unreachable before failing task");
    }
    already_terminal_is_ok(task_id, with_reconnect_retry(store, || tasks.fail(task_id, reason)).await)
}

/// Fails the task through a freshly opened store handle.
pub async fn fail_task_fresh(opener: &dyn StoreOpener, task_id: &str, reason: &str) -> Result<()> {
    let store = opener.open().await?;
    already_terminal_is_ok(task_id, TaskRegistry::new(store).fail(task_id, reason).await)
}

fn already_terminal_is_ok<T>(task_id: &str, outcome: Result<T>) -> Result<()> {
    match outcome {
        Ok(_) => Ok(()),
        Err(e) if e.code == ErrorCode::Conflict => {
            info!(task_id, error = %e, "task already terminal; keeping its status");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Runs every recovery step for a failed pipeline run.
pub async fn recover(
    tasks: &TaskRegistry,
    opener: &dyn StoreOpener,
    task_id: &str,
    message_id: &str,
    err: &DaemonError,
) {
    if let Err(e) = annotate_message(&**tasks.store(), message_id, err).await {
        warn!(task_id, message_id, error = %e, "could not annotate placeholder message");
    }

    fail_task_anywhere(tasks, opener, task_id, &err.message).await;
}

/// Fails the task on the primary store, or through a new handle when the
/// primary one cannot do it.
pub async fn fail_task_anywhere(
    tasks: &TaskRegistry,
    opener: &dyn StoreOpener,
    task_id: &str,
    reason: &str,
) {
    if let Err(e) = fail_task(tasks, task_id, reason).await {
        warn!(task_id, error = %e, "could not fail task on primary store; opening a new handle");
        if let Err(e) = fail_task_fresh(opener, task_id, reason).await {
            error!(task_id, error = %e, "task left in processing; staleness guard will fail it");
        }
    }
}
