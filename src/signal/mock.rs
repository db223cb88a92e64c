//! Test-double signal backend.
//!
//! Substituted for the real backend when a device tree is connected with the
//! mock flag set. Mirrors the declared datatype of the signal it replaces,
//! records every put for later assertion, and supports programmed put
//! failures. The mock is owned by the signal itself; there is no process-wide
//! table of doubles.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::documents::DataKey;
use crate::error::{AcqError, AcqResult};
use crate::signal::backend::{BackendCallback, Reading, SignalBackend, SignalValue};
use crate::signal::soft::SoftSignalBackend;
use crate::sync::lock;

/// Test double standing in for a protocol backend.
///
/// # Example
///
/// ```rust,ignore
/// device.connect(ConnectOptions::mock()).await?;
/// motor.velocity.set(2.0).await?;
/// assert_eq!(mock.put_history(), vec![2.0]);
/// ```
pub struct MockSignalBackend<T: SignalValue> {
    soft: SoftSignalBackend<T>,
    puts: Mutex<Vec<T>>,
    next_put_failure: Mutex<Option<String>>,
}

impl<T: SignalValue> MockSignalBackend<T> {
    /// A double holding the type's default value.
    pub fn new() -> Self {
        Self::with_initial(T::default())
    }

    /// A double holding `initial`.
    pub fn with_initial(initial: T) -> Self {
        Self {
            soft: SoftSignalBackend::with_initial(initial),
            puts: Mutex::new(Vec::new()),
            next_put_failure: Mutex::new(None),
        }
    }

    /// Every value put so far, in order.
    pub fn put_history(&self) -> Vec<T> {
        lock(&self.puts).clone()
    }

    /// Make the next put fail with a protocol error carrying `message`.
    pub fn fail_next_put(&self, message: impl Into<String>) {
        *lock(&self.next_put_failure) = Some(message.into());
    }
}

impl<T: SignalValue> Default for MockSignalBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: SignalValue> SignalBackend<T> for MockSignalBackend<T> {
    fn source(&self, name: &str) -> String {
        format!("mock+soft://{name}")
    }

    async fn connect(&self, _timeout: Duration) -> AcqResult<()> {
        Ok(())
    }

    async fn put(&self, value: T, wait: bool) -> AcqResult<()> {
        if let Some(message) = lock(&self.next_put_failure).take() {
            return Err(AcqError::Protocol(message));
        }
        lock(&self.puts).push(value.clone());
        self.soft.put(value, wait).await
    }

    async fn get_value(&self) -> AcqResult<T> {
        self.soft.get_value().await
    }

    async fn get_reading(&self) -> AcqResult<Reading<T>> {
        self.soft.get_reading().await
    }

    async fn get_setpoint(&self) -> AcqResult<T> {
        self.soft.get_setpoint().await
    }

    async fn get_datakey(&self, source: &str) -> AcqResult<DataKey> {
        self.soft.get_datakey(source).await
    }

    fn set_callback(&self, callback: Option<BackendCallback<T>>) -> AcqResult<()> {
        self.soft.set_callback(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_history_records_in_order() {
        let mock = MockSignalBackend::with_initial(0.0f64);
        mock.put(1.0, true).await.unwrap();
        mock.put(2.0, true).await.unwrap();
        assert_eq!(mock.put_history(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn programmed_failure_hits_exactly_one_put() {
        let mock = MockSignalBackend::with_initial(0u32);
        mock.fail_next_put("device rejected write");

        let err = mock.put(1, true).await.unwrap_err();
        assert!(matches!(err, AcqError::Protocol(_)));
        // The failed put is not recorded and the next one succeeds.
        assert!(mock.put_history().is_empty());
        mock.put(2, true).await.unwrap();
        assert_eq!(mock.put_history(), vec![2]);
    }
}
