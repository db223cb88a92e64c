//! Typed signals: the leaf devices of a control tree.
//!
//! A signal owns exactly one [`SignalBackend`] and layers naming, per-call
//! timeout enforcement, caching, and mock substitution on top. Four
//! capability shapes exist:
//!
//! - [`SignalR`]: read and subscribe
//! - [`SignalW`]: write
//! - [`SignalRW`]: read, write, and locate (setpoint + readback)
//! - [`SignalX`]: single parameterless execute
//!
//! Every externally-specified timeout is enforced here, at the outermost
//! awaiting point, by racing the backend call against a timer; a hung
//! backend is observably timed out and tagged with the signal's address.

pub mod backend;
mod cache;
pub mod derived;
pub mod mock;
pub mod soft;

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::device::{ConnectOptions, Device, DeviceChild, DeviceConnector, DEFAULT_TIMEOUT};
use crate::documents::DataKey;
use crate::error::{AcqError, AcqResult};
use crate::status::Status;
use crate::sync::lock;

pub use backend::{BackendCallback, Reading, Severity, SignalBackend, SignalValue};
pub use derived::DerivedSignalBackend;
pub use mock::MockSignalBackend;
pub use soft::SoftSignalBackend;

use cache::{CacheListener, SignalCache};
use futures::future::FutureExt;

/// Race `fut` against a timer, converting expiry into a typed timeout
/// failure tagged with the signal's address.
pub(crate) async fn with_timeout<T>(
    fut: impl Future<Output = AcqResult<T>>,
    timeout: Duration,
    source_id: &str,
) -> AcqResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AcqError::Timeout {
            source_id: source_id.to_string(),
            timeout,
        }),
    }
}

// =============================================================================
// Shared signal internals
// =============================================================================

struct SignalShared<T: SignalValue> {
    name: Mutex<String>,
    timeout: Duration,
    /// The backend supplied at construction (unconnected real, soft, or
    /// derived). Exclusively owned by this signal.
    real: Arc<dyn SignalBackend<T>>,
    /// Test double lazily created on the first mock connect, mirroring the
    /// declared datatype. Owned here, never in a process-wide table.
    mock: Mutex<Option<Arc<MockSignalBackend<T>>>>,
    /// Whichever backend currently serves reads and writes.
    active: Mutex<Arc<dyn SignalBackend<T>>>,
    cache: Mutex<Option<Arc<SignalCache<T>>>>,
    connector: DeviceConnector,
}

fn cache_callback<T: SignalValue>(cache: &Arc<SignalCache<T>>) -> BackendCallback<T> {
    let cache = cache.clone();
    Box::new(move |reading| cache.notify(reading))
}

impl<T: SignalValue> SignalShared<T> {
    fn new(name: &str, backend: Arc<dyn SignalBackend<T>>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: Mutex::new(name.to_string()),
            timeout,
            real: backend.clone(),
            mock: Mutex::new(None),
            active: Mutex::new(backend),
            cache: Mutex::new(None),
            connector: DeviceConnector::new(),
        })
    }

    fn name(&self) -> String {
        lock(&self.name).clone()
    }

    fn set_name(&self, name: &str) {
        *lock(&self.name) = name.to_string();
    }

    fn active(&self) -> Arc<dyn SignalBackend<T>> {
        lock(&self.active).clone()
    }

    fn source(&self) -> String {
        self.active().source(&self.name())
    }

    async fn connect(self: Arc<Self>, options: ConnectOptions) -> AcqResult<()> {
        let this = self.clone();
        self.connector
            .connect_with(options, move || {
                async move { this.do_connect(options).await }.boxed()
            })
            .await
    }

    async fn do_connect(self: Arc<Self>, options: ConnectOptions) -> AcqResult<()> {
        if options.mock {
            let mock = lock(&self.mock)
                .get_or_insert_with(|| Arc::new(MockSignalBackend::new()))
                .clone();
            debug!(signal = %self.name(), "substituting mock backend");
            self.swap_backend(mock)
        } else {
            let backend = self.real.clone();
            let source = backend.source(&self.name());
            with_timeout(backend.connect(options.timeout), options.timeout, &source).await?;
            self.swap_backend(backend)
        }
    }

    fn swap_backend(&self, new: Arc<dyn SignalBackend<T>>) -> AcqResult<()> {
        let old = {
            let mut active = lock(&self.active);
            std::mem::replace(&mut *active, new.clone())
        };
        if Arc::ptr_eq(&old, &new) {
            return Ok(());
        }
        // Re-home a live cache onto the new backend so existing listeners
        // keep receiving updates across the swap.
        if let Some(cache) = lock(&self.cache).clone() {
            let _ = old.set_callback(None);
            new.set_callback(Some(cache_callback(&cache)))?;
        }
        Ok(())
    }

    fn ensure_cache(&self) -> AcqResult<Arc<SignalCache<T>>> {
        let mut guard = lock(&self.cache);
        if let Some(cache) = guard.clone() {
            return Ok(cache);
        }
        let cache = SignalCache::new(&self.name());
        // Registering the callback delivers the current reading, so the
        // cache is typically valid before the first listener attaches.
        self.active().set_callback(Some(cache_callback(&cache)))?;
        *guard = Some(cache.clone());
        Ok(cache)
    }

    fn teardown_cache(&self) {
        if lock(&self.cache).take().is_some() {
            let _ = self.active().set_callback(None);
        }
    }

    fn subscribe(self: Arc<Self>) -> AcqResult<SignalSubscription<T>> {
        let cache = self.ensure_cache()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let id = cache.subscribe(CacheListener::Reading(Box::new(move |_name, reading| {
            let _ = tx.send(reading.clone());
        })));
        Ok(SignalSubscription {
            rx,
            id,
            shared: self,
        })
    }

    fn unsubscribe(&self, id: u64) {
        let cache = lock(&self.cache).clone();
        if let Some(cache) = cache {
            if !cache.unsubscribe(id) {
                self.teardown_cache();
            }
        }
    }

    fn set_staged(&self, staged: bool) -> AcqResult<()> {
        if staged {
            self.ensure_cache()?.set_staged(true);
            Ok(())
        } else {
            let cache = lock(&self.cache).clone();
            if let Some(cache) = cache {
                if !cache.set_staged(false) {
                    self.teardown_cache();
                }
            }
            Ok(())
        }
    }

    async fn get_reading(&self) -> AcqResult<Reading<T>> {
        let source = self.source();
        let cache = lock(&self.cache).clone();
        match cache {
            // Latest cached reading; waits only for the very first value.
            Some(cache) => {
                with_timeout(
                    async { Ok(cache.get_reading().await) },
                    self.timeout,
                    &source,
                )
                .await
            }
            // One-shot live read.
            None => with_timeout(self.active().get_reading(), self.timeout, &source).await,
        }
    }

    async fn get_value(&self) -> AcqResult<T> {
        Ok(self.get_reading().await?.value)
    }

    async fn put(&self, value: T, wait: bool) -> AcqResult<()> {
        let source = self.source();
        with_timeout(self.active().put(value, wait), self.timeout, &source).await
    }

    async fn get_setpoint(&self) -> AcqResult<T> {
        let source = self.source();
        with_timeout(self.active().get_setpoint(), self.timeout, &source).await
    }

    async fn get_datakey(&self) -> AcqResult<DataKey> {
        let source = self.source();
        with_timeout(self.active().get_datakey(&source), self.timeout, &source).await
    }

    fn mock_backend(&self) -> Option<Arc<MockSignalBackend<T>>> {
        lock(&self.mock).clone()
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// A live subscription to a signal's readings.
///
/// Backed by an unbounded channel fed in cache fan-out order; the initial
/// cached reading (if any) is already queued when the subscription is
/// returned. Dropping the subscription unsubscribes, tearing the cache down
/// if it was the last listener and the signal is not staged.
pub struct SignalSubscription<T: SignalValue> {
    rx: mpsc::UnboundedReceiver<Reading<T>>,
    id: u64,
    shared: Arc<SignalShared<T>>,
}

impl<T: SignalValue> SignalSubscription<T> {
    /// Next reading, or `None` if the signal was torn down.
    pub async fn recv(&mut self) -> Option<Reading<T>> {
        self.rx.recv().await
    }
}

impl<T: SignalValue> Drop for SignalSubscription<T> {
    fn drop(&mut self) {
        self.shared.unsubscribe(self.id);
    }
}

// =============================================================================
// Capability shapes
// =============================================================================

/// Setpoint and readback of a read-write signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location<T> {
    /// Last requested value.
    pub setpoint: T,
    /// Current actual value.
    pub readback: T,
}

/// A read-only signal.
pub struct SignalR<T: SignalValue> {
    shared: Arc<SignalShared<T>>,
}

/// A write-only signal.
pub struct SignalW<T: SignalValue> {
    shared: Arc<SignalShared<T>>,
}

/// A read-write signal.
pub struct SignalRW<T: SignalValue> {
    shared: Arc<SignalShared<T>>,
}

/// An execute-only signal: a single parameterless trigger.
pub struct SignalX {
    shared: Arc<SignalShared<bool>>,
}

macro_rules! impl_signal_common {
    ($shape:ident) => {
        impl<T: SignalValue> Clone for $shape<T> {
            fn clone(&self) -> Self {
                Self {
                    shared: self.shared.clone(),
                }
            }
        }

        impl<T: SignalValue> $shape<T> {
            /// Wrap `backend` with the default per-call timeout.
            pub fn from_backend(name: &str, backend: Arc<dyn SignalBackend<T>>) -> Self {
                Self::from_backend_with_timeout(name, backend, DEFAULT_TIMEOUT)
            }

            /// Wrap `backend` with an explicit per-call timeout.
            pub fn from_backend_with_timeout(
                name: &str,
                backend: Arc<dyn SignalBackend<T>>,
                timeout: Duration,
            ) -> Self {
                Self {
                    shared: SignalShared::new(name, backend, timeout),
                }
            }

            /// Address of the control point behind this signal.
            pub fn source(&self) -> String {
                self.shared.source()
            }

            /// The test double serving this signal, if a mock connect has
            /// happened.
            pub fn mock_backend(&self) -> Option<Arc<MockSignalBackend<T>>> {
                self.shared.mock_backend()
            }
        }

        #[async_trait]
        impl<T: SignalValue> Device for $shape<T> {
            fn name(&self) -> String {
                self.shared.name()
            }

            fn set_name(&self, name: &str) {
                self.shared.set_name(name);
            }

            fn children(&self) -> Vec<DeviceChild> {
                Vec::new()
            }

            async fn connect(&self, options: ConnectOptions) -> AcqResult<()> {
                self.shared.clone().connect(options).await
            }
        }
    };
}

impl_signal_common!(SignalR);
impl_signal_common!(SignalW);
impl_signal_common!(SignalRW);

macro_rules! impl_signal_read {
    ($shape:ident) => {
        impl<T: SignalValue> $shape<T> {
            /// Current value: the latest cached reading when a cache is
            /// active, else a one-shot live read.
            pub async fn get_value(&self) -> AcqResult<T> {
                self.shared.get_value().await
            }

            /// Current reading with timestamp and severity.
            pub async fn read(&self) -> AcqResult<Reading<T>> {
                self.shared.get_reading().await
            }

            /// Datakey describing this signal.
            pub async fn describe(&self) -> AcqResult<DataKey> {
                self.shared.get_datakey().await
            }

            /// Subscribe to every subsequent reading (plus the current one).
            pub fn subscribe(&self) -> AcqResult<SignalSubscription<T>> {
                self.shared.clone().subscribe()
            }

            /// Keep the cache alive across listener removal (`true`) or
            /// release that hold (`false`).
            pub fn set_staged(&self, staged: bool) -> AcqResult<()> {
                self.shared.set_staged(staged)
            }
        }
    };
}

impl_signal_read!(SignalR);
impl_signal_read!(SignalRW);

macro_rules! impl_signal_write {
    ($shape:ident) => {
        impl<T: SignalValue> $shape<T> {
            /// Write `value`, returning once the backend has accepted it.
            pub async fn set(&self, value: T) -> AcqResult<()> {
                self.shared.put(value, true).await
            }

            /// Write `value` without waiting for acceptance.
            pub async fn set_no_wait(&self, value: T) -> AcqResult<()> {
                self.shared.put(value, false).await
            }

            /// Write `value` as a cancellable, awaitable [`Status`].
            pub fn set_status(&self, value: T) -> Status<()> {
                let shared = self.shared.clone();
                Status::spawn(move |_token| async move { shared.put(value, true).await })
            }
        }
    };
}

impl_signal_write!(SignalW);
impl_signal_write!(SignalRW);

impl<T: SignalValue> SignalRW<T> {
    /// Setpoint and readback together.
    pub async fn locate(&self) -> AcqResult<Location<T>> {
        Ok(Location {
            setpoint: self.shared.get_setpoint().await?,
            readback: self.shared.get_value().await?,
        })
    }
}

impl Clone for SignalX {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl SignalX {
    /// Wrap `backend` with the default per-call timeout.
    pub fn from_backend(name: &str, backend: Arc<dyn SignalBackend<bool>>) -> Self {
        Self {
            shared: SignalShared::new(name, backend, DEFAULT_TIMEOUT),
        }
    }

    /// Address of the control point behind this signal.
    pub fn source(&self) -> String {
        self.shared.source()
    }

    /// Execute once, returning when the backend has accepted the trigger.
    pub async fn trigger(&self) -> AcqResult<()> {
        self.shared.put(true, true).await
    }

    /// Execute as a cancellable, awaitable [`Status`].
    pub fn trigger_status(&self) -> Status<()> {
        let shared = self.shared.clone();
        Status::spawn(move |_token| async move { shared.put(true, true).await })
    }
}

#[async_trait]
impl Device for SignalX {
    fn name(&self) -> String {
        self.shared.name()
    }

    fn set_name(&self, name: &str) {
        self.shared.set_name(name);
    }

    fn children(&self) -> Vec<DeviceChild> {
        Vec::new()
    }

    async fn connect(&self, options: ConnectOptions) -> AcqResult<()> {
        self.shared.clone().connect(options).await
    }
}

// =============================================================================
// Type-erased access
// =============================================================================

/// Object-safe, JSON-typed access to a signal, used by tree enumeration and
/// the external settings-persistence layer.
#[async_trait]
pub trait ErasedSignal: Send + Sync {
    /// Address of the control point.
    fn source(&self) -> String;

    /// Whether the signal accepts writes.
    fn is_writable(&self) -> bool;

    /// Current value as JSON.
    async fn get_json(&self) -> AcqResult<serde_json::Value>;

    /// Write a JSON value.
    async fn put_json(&self, value: serde_json::Value) -> AcqResult<()>;

    /// Setpoint and readback as JSON, for read-write signals.
    async fn locate_json(&self) -> AcqResult<serde_json::Value>;
}

fn to_json<T: Serialize>(value: &T) -> AcqResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|err| AcqError::InvalidState(format!("could not serialize value: {err}")))
}

fn from_json<T: SignalValue>(value: serde_json::Value) -> AcqResult<T> {
    serde_json::from_value(value)
        .map_err(|err| AcqError::InvalidState(format!("could not deserialize value: {err}")))
}

#[async_trait]
impl<T: SignalValue> ErasedSignal for SignalR<T> {
    fn source(&self) -> String {
        self.shared.source()
    }

    fn is_writable(&self) -> bool {
        false
    }

    async fn get_json(&self) -> AcqResult<serde_json::Value> {
        to_json(&self.get_value().await?)
    }

    async fn put_json(&self, _value: serde_json::Value) -> AcqResult<()> {
        Err(AcqError::InvalidState(format!(
            "{} is read-only",
            self.name()
        )))
    }

    async fn locate_json(&self) -> AcqResult<serde_json::Value> {
        Err(AcqError::InvalidState(format!(
            "{} has no setpoint",
            self.name()
        )))
    }
}

#[async_trait]
impl<T: SignalValue> ErasedSignal for SignalW<T> {
    fn source(&self) -> String {
        self.shared.source()
    }

    fn is_writable(&self) -> bool {
        true
    }

    async fn get_json(&self) -> AcqResult<serde_json::Value> {
        // A write-only control point can still report what was last asked
        // of it.
        to_json(&self.shared.get_setpoint().await?)
    }

    async fn put_json(&self, value: serde_json::Value) -> AcqResult<()> {
        self.set(from_json(value)?).await
    }

    async fn locate_json(&self) -> AcqResult<serde_json::Value> {
        Err(AcqError::InvalidState(format!(
            "{} has no readback",
            self.name()
        )))
    }
}

#[async_trait]
impl<T: SignalValue> ErasedSignal for SignalRW<T> {
    fn source(&self) -> String {
        self.shared.source()
    }

    fn is_writable(&self) -> bool {
        true
    }

    async fn get_json(&self) -> AcqResult<serde_json::Value> {
        to_json(&self.get_value().await?)
    }

    async fn put_json(&self, value: serde_json::Value) -> AcqResult<()> {
        self.set(from_json(value)?).await
    }

    async fn locate_json(&self) -> AcqResult<serde_json::Value> {
        to_json(&self.locate().await?)
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// A software-only read-write signal holding `initial`.
pub fn soft_signal_rw<T: SignalValue>(name: &str, initial: T) -> SignalRW<T> {
    SignalRW::from_backend(name, Arc::new(SoftSignalBackend::with_initial(initial)))
}

/// A software-only write-only signal.
pub fn soft_signal_w<T: SignalValue>(name: &str) -> SignalW<T> {
    SignalW::from_backend(name, Arc::new(SoftSignalBackend::new()))
}

/// A software-only read-only signal plus the setter that drives it.
pub fn soft_signal_r<T: SignalValue>(name: &str, initial: T) -> (SignalR<T>, SoftSignalSetter<T>) {
    let backend = Arc::new(SoftSignalBackend::with_initial(initial));
    let signal = SignalR::from_backend(name, backend.clone());
    (signal, SoftSignalSetter { backend })
}

/// A software-only execute signal.
pub fn soft_signal_x(name: &str) -> SignalX {
    SignalX::from_backend(name, Arc::new(SoftSignalBackend::<bool>::new()))
}

/// A read-only signal computed from other signals on every read.
pub fn derived_signal_r<T, F, Fut>(name: &str, compute: F) -> SignalR<T>
where
    T: SignalValue,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AcqResult<T>> + Send + 'static,
{
    SignalR::from_backend(name, Arc::new(DerivedSignalBackend::new(compute)))
}

/// Drives the value behind a read-only soft signal.
pub struct SoftSignalSetter<T: SignalValue> {
    backend: Arc<SoftSignalBackend<T>>,
}

impl<T: SignalValue> Clone for SoftSignalSetter<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<T: SignalValue> SoftSignalSetter<T> {
    /// Publish a new value to the signal and its subscribers.
    pub async fn set(&self, value: T) -> AcqResult<()> {
        self.backend.put(value, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rw_signal_round_trips_and_locates() {
        let signal = soft_signal_rw("gap", 1.0f64);
        signal.set(2.5).await.unwrap();
        assert_eq!(signal.get_value().await.unwrap(), 2.5);

        let location = signal.locate().await.unwrap();
        assert_eq!(location.setpoint, 2.5);
        assert_eq!(location.readback, 2.5);
    }

    #[tokio::test]
    async fn subscription_sees_initial_then_updates_in_order() {
        let signal = soft_signal_rw("gap", 0.0f64);
        let mut sub = signal.subscribe().unwrap();

        // Initial cached value is already queued.
        assert_eq!(sub.recv().await.unwrap().value, 0.0);

        signal.set(1.0).await.unwrap();
        signal.set(2.0).await.unwrap();
        assert_eq!(sub.recv().await.unwrap().value, 1.0);
        assert_eq!(sub.recv().await.unwrap().value, 2.0);
    }

    #[tokio::test]
    async fn dropping_last_subscription_clears_backend_callback() {
        let backend = Arc::new(SoftSignalBackend::with_initial(0.0f64));
        let signal = SignalR::from_backend("power", backend.clone());

        {
            let _sub = signal.subscribe().unwrap();
            // The cache holds the single callback slot, so a second
            // registration is rejected while subscribed.
            assert!(backend.set_callback(Some(Box::new(|_reading| {}))).is_err());
        }
        // Last listener gone, cache torn down, slot free again.
        backend.set_callback(Some(Box::new(|_reading| {}))).unwrap();
    }

    #[tokio::test]
    async fn staged_signal_keeps_cache_across_listener_removal() {
        let backend = Arc::new(SoftSignalBackend::with_initial(0.0f64));
        let signal = SignalR::from_backend("power", backend.clone());

        signal.set_staged(true).unwrap();
        {
            let _sub = signal.subscribe().unwrap();
        }
        // Still staged: the callback slot stays taken.
        assert!(backend.set_callback(Some(Box::new(|_reading| {}))).is_err());

        signal.set_staged(false).unwrap();
        backend.set_callback(Some(Box::new(|_reading| {}))).unwrap();
    }

    #[tokio::test]
    async fn mock_connect_swaps_backend_and_records_puts() {
        let signal = soft_signal_rw("velocity", 0.0f64);
        signal.connect(ConnectOptions::mock()).await.unwrap();
        assert!(signal.source().starts_with("mock+soft://"));

        signal.set(3.0).await.unwrap();
        let mock = signal.mock_backend().unwrap();
        assert_eq!(mock.put_history(), vec![3.0]);
    }

    #[tokio::test]
    async fn timeout_is_tagged_with_the_signal_address() {
        struct HangingBackend;

        #[async_trait]
        impl SignalBackend<f64> for HangingBackend {
            fn source(&self, name: &str) -> String {
                format!("hang://{name}")
            }
            async fn connect(&self, _timeout: Duration) -> AcqResult<()> {
                Ok(())
            }
            async fn put(&self, _value: f64, _wait: bool) -> AcqResult<()> {
                futures::future::pending().await
            }
            async fn get_value(&self) -> AcqResult<f64> {
                futures::future::pending().await
            }
            async fn get_reading(&self) -> AcqResult<Reading<f64>> {
                futures::future::pending().await
            }
            async fn get_setpoint(&self) -> AcqResult<f64> {
                futures::future::pending().await
            }
            async fn get_datakey(&self, _source: &str) -> AcqResult<DataKey> {
                futures::future::pending().await
            }
            fn set_callback(&self, _callback: Option<BackendCallback<f64>>) -> AcqResult<()> {
                Ok(())
            }
        }

        let signal = SignalR::from_backend_with_timeout(
            "stuck",
            Arc::new(HangingBackend),
            Duration::from_millis(20),
        );
        let err = signal.get_value().await.unwrap_err();
        let AcqError::Timeout { source_id, .. } = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert_eq!(source_id, "hang://stuck");
    }

    #[tokio::test]
    async fn derived_signal_reads_through_its_sources() {
        let x = soft_signal_rw("x", 2.0f64);
        let y = soft_signal_rw("y", 3.0f64);
        let (xs, ys) = (x.clone(), y.clone());
        let sum = derived_signal_r("sum", move || {
            let (x, y) = (xs.clone(), ys.clone());
            async move { Ok(x.get_value().await? + y.get_value().await?) }
        });

        assert_eq!(sum.get_value().await.unwrap(), 5.0);
        x.set(10.0).await.unwrap();
        assert_eq!(sum.get_value().await.unwrap(), 13.0);
    }

    #[tokio::test]
    async fn erased_access_walks_json_round_trip() {
        let signal = soft_signal_rw("gap", 1.0f64);
        let erased: &dyn ErasedSignal = &signal;

        assert!(erased.is_writable());
        erased.put_json(serde_json::json!(4.5)).await.unwrap();
        assert_eq!(erased.get_json().await.unwrap(), serde_json::json!(4.5));

        let location = erased.locate_json().await.unwrap();
        assert_eq!(location["setpoint"], serde_json::json!(4.5));
    }
}
