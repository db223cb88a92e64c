//! Software-only signal backend.
//!
//! Holds its value in memory, connects instantly, and fans updates out to the
//! registered callback. Used for configuration values that have no hardware
//! behind them and as the building block for the mock backend.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::documents::DataKey;
use crate::error::{AcqError, AcqResult};
use crate::signal::backend::{BackendCallback, Reading, Severity, SignalBackend, SignalValue};
use crate::sync::lock;

struct SoftState<T> {
    reading: Reading<T>,
    setpoint: T,
}

/// In-memory implementation of [`SignalBackend`].
pub struct SoftSignalBackend<T: SignalValue> {
    state: Mutex<SoftState<T>>,
    callback: Mutex<Option<BackendCallback<T>>>,
}

impl<T: SignalValue> SoftSignalBackend<T> {
    /// A backend holding the type's default value.
    pub fn new() -> Self {
        Self::with_initial(T::default())
    }

    /// A backend holding `initial`.
    pub fn with_initial(initial: T) -> Self {
        Self {
            state: Mutex::new(SoftState {
                reading: Reading::now(initial.clone()),
                setpoint: initial,
            }),
            callback: Mutex::new(None),
        }
    }

    fn fire(&self, reading: Reading<T>) {
        let guard = lock(&self.callback);
        if let Some(callback) = guard.as_ref() {
            callback(reading);
        }
    }
}

impl<T: SignalValue> Default for SoftSignalBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: SignalValue> SignalBackend<T> for SoftSignalBackend<T> {
    fn source(&self, name: &str) -> String {
        format!("soft://{name}")
    }

    async fn connect(&self, _timeout: Duration) -> AcqResult<()> {
        Ok(())
    }

    async fn put(&self, value: T, _wait: bool) -> AcqResult<()> {
        let reading = {
            let mut state = lock(&self.state);
            state.setpoint = value.clone();
            state.reading = Reading {
                value,
                timestamp: chrono::Utc::now(),
                severity: Severity::Ok,
            };
            state.reading.clone()
        };
        self.fire(reading);
        Ok(())
    }

    async fn get_value(&self) -> AcqResult<T> {
        Ok(lock(&self.state).reading.value.clone())
    }

    async fn get_reading(&self) -> AcqResult<Reading<T>> {
        Ok(lock(&self.state).reading.clone())
    }

    async fn get_setpoint(&self) -> AcqResult<T> {
        Ok(lock(&self.state).setpoint.clone())
    }

    async fn get_datakey(&self, source: &str) -> AcqResult<DataKey> {
        Ok(lock(&self.state).reading.value.datakey(source))
    }

    fn set_callback(&self, callback: Option<BackendCallback<T>>) -> AcqResult<()> {
        let mut guard = lock(&self.callback);
        match callback {
            Some(callback) => {
                if guard.is_some() {
                    // Raise before mutating: the single-callback invariant.
                    return Err(AcqError::InvalidState(
                        "a backend callback is already registered".into(),
                    ));
                }
                let current = lock(&self.state).reading.clone();
                callback(current);
                *guard = Some(callback);
                Ok(())
            }
            None => {
                *guard = None;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn put_updates_value_setpoint_and_timestamp() {
        let backend = SoftSignalBackend::with_initial(1.0f64);
        let before = backend.get_reading().await.unwrap();

        backend.put(2.5, true).await.unwrap();

        let after = backend.get_reading().await.unwrap();
        assert_eq!(after.value, 2.5);
        assert_eq!(backend.get_setpoint().await.unwrap(), 2.5);
        assert!(after.timestamp >= before.timestamp);
    }

    #[tokio::test]
    async fn second_callback_registration_is_rejected() {
        let backend = SoftSignalBackend::with_initial(0u64);
        backend.set_callback(Some(Box::new(|_reading| {}))).unwrap();

        let second = backend.set_callback(Some(Box::new(|_reading| {})));
        assert!(matches!(second, Err(AcqError::InvalidState(_))));

        // Clearing makes room for a new registration.
        backend.set_callback(None).unwrap();
        backend.set_callback(Some(Box::new(|_reading| {}))).unwrap();
    }

    #[tokio::test]
    async fn registering_a_callback_delivers_the_current_reading() {
        let backend = SoftSignalBackend::with_initial(7i64);
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = seen.clone();
        backend
            .set_callback(Some(Box::new(move |reading| {
                assert_eq!(reading.value, 7);
                sink.fetch_add(1, Ordering::SeqCst);
            })))
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
