//! Storage connection resilience for long-running pipelines.
//!
//! A generation can take many minutes, long enough for the storage link to
//! be dropped underneath it. Writes that follow a long step go through
//! [`ensure_connection`] and [`with_reconnect_retry`].

use std::future::Future;

use tracing::{debug, warn};

use crate::error::Result;
use crate::store::Store;

/// Pings the store and replaces its connection if the ping fails.
pub async fn ensure_connection(store: &dyn Store) -> Result<()> {
    match store.ping().await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(error = %e, "storage ping failed; reconnecting");
            store.reconnect().await
        }
    }
}

/// Runs `op`, retrying it once after a forced reconnect when it fails with a
/// connection-class error. Any other error, or a second failure, is returned.
pub async fn with_reconnect_retry<T, F, Fut>(store: &dyn Store, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(e) if e.is_connection() => {
            warn!(error = %e, "storage connection lost; retrying once after reconnect");
            store.reconnect().await?;
            let retried = op().await;
            if retried.is_ok() {
                debug!("retry after reconnect succeeded");
            }
            retried
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DaemonError, ErrorCode};
    use crate::store::sqlite::tests::temp_store;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn ensure_connection_reopens_closed_pool() {
        let (_dir, store) = temp_store().await;
        store.close().await;
        assert!(store.ping().await.is_err());

        ensure_connection(&store).await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn connection_error_is_retried_once() {
        let (_dir, store) = temp_store().await;
        let calls = &AtomicUsize::new(0);
        let value = with_reconnect_retry(&store, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DaemonError::connection("gone away"))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_connection_error_propagates() {
        let (_dir, store) = temp_store().await;
        let calls = &AtomicUsize::new(0);
        let err = with_reconnect_retry(&store, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DaemonError::connection("gone away"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Connection);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let (_dir, store) = temp_store().await;
        let calls = &AtomicUsize::new(0);
        let err = with_reconnect_retry(&store, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(DaemonError::fatal_reference("message m1"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::FatalReference);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
