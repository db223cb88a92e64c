//! Cancellable, awaitable handles for in-flight operations.
//!
//! A [`Status`] wraps exactly one asynchronous operation: it begins executing
//! immediately on the runtime, captures the outcome (success, failure, or
//! cancellation) exactly once, and runs any registered done-callbacks exactly
//! once. An unawaited failed `Status` never crashes the process; the failure
//! sits captured until someone inspects or awaits it.
//!
//! A [`WatchableStatus`] additionally carries a sequence of progress updates.
//! Watchers attached after some updates have fired are immediately replayed
//! only the single latest update, never history.
//!
//! Cancellation is cooperative: the operation receives a
//! [`CancellationToken`] at spawn time and is expected to observe it at its
//! suspension points, finishing any best-effort cleanup before returning
//! [`AcqError::Cancelled`].

use std::future::{Future, IntoFuture};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{AcqError, AcqResult};
use crate::sync::lock;

type DoneCallback<T> = Box<dyn FnOnce(&AcqResult<T>) + Send>;

struct StatusInner<T> {
    outcome: Option<AcqResult<T>>,
    callbacks: Vec<DoneCallback<T>>,
}

/// Handle to one in-flight asynchronous operation.
///
/// Terminal once: done with a value, done with a captured error, or
/// cancelled. Once terminal the state is immutable.
///
/// # Example
///
/// ```rust,ignore
/// let status = Status::spawn(|token| async move {
///     motor.set(10.0).await
/// });
/// status.add_callback(|outcome| println!("move finished: {outcome:?}"));
/// status.wait().await?;
/// ```
pub struct Status<T = ()> {
    inner: Arc<Mutex<StatusInner<T>>>,
    done_rx: watch::Receiver<bool>,
    token: CancellationToken,
}

impl<T> Clone for Status<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            done_rx: self.done_rx.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Status<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = lock(&self.inner);
        let state = match &guard.outcome {
            None => "pending",
            Some(Ok(_)) => "done",
            Some(Err(AcqError::Cancelled)) => "cancelled",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Status").field("state", &state).finish()
    }
}

impl<T: Clone + Send + 'static> Status<T> {
    /// Spawn `op` on the runtime and return a handle to it.
    ///
    /// The operation receives a [`CancellationToken`] and should observe it
    /// at every suspension point; [`Status::cancel`] triggers the token.
    pub fn spawn<F, Fut>(op: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = AcqResult<T>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let inner = Arc::new(Mutex::new(StatusInner {
            outcome: None,
            callbacks: Vec::new(),
        }));
        let (done_tx, done_rx) = watch::channel(false);

        let fut = op(token.clone());
        let task_inner = inner.clone();
        tokio::spawn(async move {
            let result = fut.await;
            Self::finish(&task_inner, result);
            let _ = done_tx.send(true);
        });

        Self {
            inner,
            done_rx,
            token,
        }
    }

    fn finish(inner: &Arc<Mutex<StatusInner<T>>>, result: AcqResult<T>) {
        let (outcome, callbacks) = {
            let mut guard = lock(inner);
            if guard.outcome.is_some() {
                return;
            }
            guard.outcome = Some(result.clone());
            (result, std::mem::take(&mut guard.callbacks))
        };
        // Callbacks run outside the lock so they may inspect the status.
        for callback in callbacks {
            callback(&outcome);
        }
    }

    /// True once the operation has finished, successfully or not.
    pub fn done(&self) -> bool {
        lock(&self.inner).outcome.is_some()
    }

    /// True once the operation has finished successfully.
    pub fn success(&self) -> bool {
        matches!(&lock(&self.inner).outcome, Some(Ok(_)))
    }

    /// The captured failure, if any. Non-blocking.
    pub fn exception(&self) -> Option<AcqError> {
        match &lock(&self.inner).outcome {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Register a callback to run when the operation finishes.
    ///
    /// Runs immediately if the operation is already terminal. Each callback
    /// is invoked exactly once.
    pub fn add_callback(&self, callback: impl FnOnce(&AcqResult<T>) + Send + 'static) {
        let mut guard = lock(&self.inner);
        if let Some(outcome) = guard.outcome.clone() {
            drop(guard);
            callback(&outcome);
        } else {
            guard.callbacks.push(Box::new(callback));
        }
    }

    /// Request cooperative cancellation of the underlying operation.
    ///
    /// The cancellation surfaces as a captured [`AcqError::Cancelled`] once
    /// the operation unwinds; in-progress cleanup steps run to completion
    /// first.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The token handed to the underlying operation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Await the operation and return the captured outcome.
    pub async fn wait(&self) -> AcqResult<T> {
        let mut rx = self.done_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                // Task dropped without completing (runtime shutdown).
                break;
            }
        }
        match &lock(&self.inner).outcome {
            Some(outcome) => outcome.clone(),
            None => Err(AcqError::Cancelled),
        }
    }
}

impl<T: Clone + Send + 'static> IntoFuture for Status<T> {
    type Output = AcqResult<T>;
    type IntoFuture = BoxFuture<'static, AcqResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

// =============================================================================
// WatchableStatus
// =============================================================================

/// One progress update from a long-running operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatcherUpdate {
    /// Name of the quantity making progress.
    pub name: String,
    /// Current value.
    pub current: f64,
    /// Value when the operation started.
    pub initial: f64,
    /// Value at which the operation completes.
    pub target: f64,
    /// Unit of the quantity, if meaningful.
    pub unit: Option<String>,
    /// Display precision hint.
    pub precision: Option<u32>,
    /// Time since the operation started. Stamped by the status if the
    /// producer left it unset.
    pub time_elapsed: Option<Duration>,
}

struct WatcherHub {
    latest: Option<WatcherUpdate>,
    watchers: Vec<Box<dyn Fn(&WatcherUpdate) + Send>>,
}

/// A [`Status`] that additionally streams progress updates to watchers.
///
/// Updates missing an elapsed time are stamped with wall-clock time since
/// construction. A watcher attached after updates have already fired is
/// immediately replayed the single latest update.
pub struct WatchableStatus {
    status: Status<()>,
    hub: Arc<Mutex<WatcherHub>>,
}

impl std::fmt::Debug for WatchableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchableStatus")
            .field("status", &self.status)
            .field("latest_update", &lock(&self.hub).latest)
            .finish()
    }
}

impl WatchableStatus {
    /// Spawn `op` and drain `updates` into the attached watchers.
    pub fn spawn_watchable<F, Fut>(op: F, mut updates: mpsc::UnboundedReceiver<WatcherUpdate>) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = AcqResult<()>> + Send + 'static,
    {
        let hub = Arc::new(Mutex::new(WatcherHub {
            latest: None,
            watchers: Vec::new(),
        }));
        let started = Instant::now();

        let drain_hub = hub.clone();
        tokio::spawn(async move {
            while let Some(mut update) = updates.recv().await {
                if update.time_elapsed.is_none() {
                    update.time_elapsed = Some(started.elapsed());
                }
                let mut guard = lock(&drain_hub);
                // Latest is recorded before fan-out so a watcher attached
                // concurrently never misses the newest update.
                guard.latest = Some(update.clone());
                for watcher in &guard.watchers {
                    watcher(&update);
                }
            }
        });

        Self {
            status: Status::spawn(op),
            hub,
        }
    }

    /// Attach a progress watcher.
    ///
    /// If any update has already fired, the watcher immediately receives the
    /// latest one, then every subsequent update in order.
    pub fn add_watcher(&self, watcher: impl Fn(&WatcherUpdate) + Send + 'static) {
        let mut guard = lock(&self.hub);
        if let Some(latest) = guard.latest.clone() {
            watcher(&latest);
        }
        guard.watchers.push(Box::new(watcher));
    }

    /// The most recent progress update, if any has fired.
    pub fn latest_update(&self) -> Option<WatcherUpdate> {
        lock(&self.hub).latest.clone()
    }

    /// True once the operation has finished, successfully or not.
    pub fn done(&self) -> bool {
        self.status.done()
    }

    /// True once the operation has finished successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// The captured failure, if any. Non-blocking.
    pub fn exception(&self) -> Option<AcqError> {
        self.status.exception()
    }

    /// Register a done-callback; see [`Status::add_callback`].
    pub fn add_callback(&self, callback: impl FnOnce(&AcqResult<()>) + Send + 'static) {
        self.status.add_callback(callback);
    }

    /// Request cooperative cancellation; see [`Status::cancel`].
    pub fn cancel(&self) {
        self.status.cancel();
    }

    /// Await the operation and return the captured outcome.
    pub async fn wait(&self) -> AcqResult<()> {
        self.status.wait().await
    }
}

impl IntoFuture for WatchableStatus {
    type Output = AcqResult<()>;
    type IntoFuture = BoxFuture<'static, AcqResult<()>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.status.wait().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn status_captures_success() {
        let status = Status::spawn(|_token| async move { Ok(42u64) });
        assert_eq!(status.wait().await.unwrap(), 42);
        assert!(status.done());
        assert!(status.success());
        assert!(status.exception().is_none());
    }

    #[tokio::test]
    async fn status_captures_failure_without_raising() {
        let status: Status<()> = Status::spawn(|_token| async move {
            Err(AcqError::Protocol("boom".into()))
        });
        // The failure sits captured until inspected.
        assert!(status.wait().await.is_err());
        assert!(status.done());
        assert!(!status.success());
        assert!(matches!(status.exception(), Some(AcqError::Protocol(_))));
    }

    #[tokio::test]
    async fn callbacks_run_exactly_once_before_and_after_completion() {
        let calls = Arc::new(AtomicUsize::new(0));

        let status = Status::spawn(|_token| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(7u32)
        });

        let early = calls.clone();
        status.add_callback(move |outcome| {
            assert!(outcome.is_ok());
            early.fetch_add(1, Ordering::SeqCst);
        });

        status.wait().await.unwrap();

        let late = calls.clone();
        status.add_callback(move |_outcome| {
            late.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancel_surfaces_as_captured_error() {
        let status: Status<()> = Status::spawn(|token| async move {
            token.cancelled().await;
            Err(AcqError::Cancelled)
        });
        status.cancel();
        assert!(matches!(status.wait().await, Err(AcqError::Cancelled)));
        assert!(matches!(status.exception(), Some(AcqError::Cancelled)));
    }

    fn update(current: f64) -> WatcherUpdate {
        WatcherUpdate {
            name: "collections".into(),
            current,
            initial: 0.0,
            target: 5.0,
            unit: None,
            precision: None,
            time_elapsed: None,
        }
    }

    #[tokio::test]
    async fn late_watcher_replays_only_latest_update() {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = WatchableStatus::spawn_watchable(
            |_token| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            },
            rx,
        );

        tx.send(update(1.0)).unwrap();
        tx.send(update(2.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        status.add_watcher(move |u| lock(&sink).push(u.current));

        tx.send(update(3.0)).unwrap();
        tx.send(update(4.0)).unwrap();
        tx.send(update(5.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Replay of #2, then #3..#5 live; never #1.
        assert_eq!(*lock(&seen), vec![2.0, 3.0, 4.0, 5.0]);
        status.wait().await.unwrap();
    }

    #[tokio::test]
    async fn updates_are_stamped_with_elapsed_time() {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = WatchableStatus::spawn_watchable(
            |_token| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            },
            rx,
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(update(1.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let latest = status.latest_update().unwrap();
        let elapsed = latest.time_elapsed.unwrap();
        assert!(elapsed >= Duration::from_millis(20));
        status.wait().await.unwrap();
    }
}
