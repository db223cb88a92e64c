//! Read-only backend computing its value from other signals.
//!
//! A derived signal recomputes on every read by awaiting a caller-supplied
//! closure, typically one that captures clones of the source signals. Derived
//! signals have no spontaneous updates, so they reject callback registration;
//! subscribe to the sources instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::documents::DataKey;
use crate::error::{AcqError, AcqResult};
use crate::signal::backend::{BackendCallback, Reading, SignalBackend, SignalValue};

type ComputeFn<T> = Arc<dyn Fn() -> BoxFuture<'static, AcqResult<T>> + Send + Sync>;

/// Backend whose value is computed from other signals on demand.
///
/// # Example
///
/// ```rust,ignore
/// let x = soft_signal_rw("x", 1.0);
/// let y = soft_signal_rw("y", 2.0);
/// let (xr, yr) = (x.clone(), y.clone());
/// let sum = derived_signal_r("sum", move || {
///     let (x, y) = (xr.clone(), yr.clone());
///     async move { Ok(x.get_value().await? + y.get_value().await?) }
/// });
/// ```
pub struct DerivedSignalBackend<T: SignalValue> {
    compute: ComputeFn<T>,
}

impl<T: SignalValue> DerivedSignalBackend<T> {
    /// Wrap an async computation over captured source signals.
    pub fn new<F, Fut>(compute: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AcqResult<T>> + Send + 'static,
    {
        Self {
            compute: Arc::new(move || Box::pin(compute())),
        }
    }
}

#[async_trait]
impl<T: SignalValue> SignalBackend<T> for DerivedSignalBackend<T> {
    fn source(&self, name: &str) -> String {
        format!("derived://{name}")
    }

    async fn connect(&self, _timeout: Duration) -> AcqResult<()> {
        Ok(())
    }

    async fn put(&self, _value: T, _wait: bool) -> AcqResult<()> {
        Err(AcqError::InvalidState("derived signals are read-only".into()))
    }

    async fn get_value(&self) -> AcqResult<T> {
        (self.compute)().await
    }

    async fn get_reading(&self) -> AcqResult<Reading<T>> {
        Ok(Reading::now((self.compute)().await?))
    }

    async fn get_setpoint(&self) -> AcqResult<T> {
        Err(AcqError::InvalidState("derived signals are read-only".into()))
    }

    async fn get_datakey(&self, source: &str) -> AcqResult<DataKey> {
        Ok((self.compute)().await?.datakey(source))
    }

    fn set_callback(&self, callback: Option<BackendCallback<T>>) -> AcqResult<()> {
        match callback {
            Some(_) => Err(AcqError::UnsupportedCapability(
                "derived signals do not emit updates; subscribe to their sources".into(),
            )),
            None => Ok(()),
        }
    }
}
