//! The minimal contract behind one control point.
//!
//! A [`SignalBackend`] is the polymorphic seam between a
//! [`Signal`](crate::signal::SignalRW) and whatever actually holds the value:
//! a network-attached control system, a software-only value, a test double,
//! or a computation over other signals. The protocol implementations
//! themselves live outside this crate; only the contract is defined here,
//! together with the software-side implementations.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::documents::{DataKey, Dtype};
use crate::error::AcqResult;

/// Alarm severity attached to a reading by the control system.
///
/// Software backends always report [`Severity::Ok`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No alarm.
    Ok,
    /// Minor alarm.
    Minor,
    /// Major alarm.
    Major,
    /// The value itself is suspect.
    Invalid,
}

/// One timestamped, severity-tagged value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading<T> {
    /// The value.
    pub value: T,
    /// When the backend observed the value.
    pub timestamp: DateTime<Utc>,
    /// Alarm severity at observation time.
    pub severity: Severity,
}

impl<T> Reading<T> {
    /// A reading stamped now with no alarm.
    pub fn now(value: T) -> Self {
        Self {
            value,
            timestamp: Utc::now(),
            severity: Severity::Ok,
        }
    }
}

/// Datatypes a signal can carry.
///
/// A signal's datatype is fixed at construction and never changes across
/// reconnects; the associated metadata feeds [`DataKey`] construction.
pub trait SignalValue:
    Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + Default + 'static
{
    /// Abstract datatype.
    fn dtype() -> Dtype;
    /// Numpy-style dtype string.
    fn dtype_numpy() -> &'static str;
    /// Per-value shape; empty for scalars.
    fn shape(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Build the datakey describing a signal carrying this value.
    fn datakey(&self, source: &str) -> DataKey {
        DataKey {
            source: source.to_string(),
            shape: self.shape(),
            dtype: Self::dtype(),
            dtype_numpy: Self::dtype_numpy().to_string(),
            external: None,
        }
    }
}

macro_rules! scalar_signal_value {
    ($type:ty, $dtype:expr, $numpy:expr) => {
        impl SignalValue for $type {
            fn dtype() -> Dtype {
                $dtype
            }
            fn dtype_numpy() -> &'static str {
                $numpy
            }
        }
    };
}

scalar_signal_value!(bool, Dtype::Boolean, "|b1");
scalar_signal_value!(i32, Dtype::Integer, "<i4");
scalar_signal_value!(i64, Dtype::Integer, "<i8");
scalar_signal_value!(u32, Dtype::Integer, "<u4");
scalar_signal_value!(u64, Dtype::Integer, "<u8");
scalar_signal_value!(f32, Dtype::Number, "<f4");
scalar_signal_value!(f64, Dtype::Number, "<f8");
scalar_signal_value!(String, Dtype::String, "|S40");

impl SignalValue for Vec<f64> {
    fn dtype() -> Dtype {
        Dtype::Array
    }
    fn dtype_numpy() -> &'static str {
        "<f8"
    }
    fn shape(&self) -> Vec<usize> {
        vec![self.len()]
    }
}

impl SignalValue for Vec<i64> {
    fn dtype() -> Dtype {
        Dtype::Array
    }
    fn dtype_numpy() -> &'static str {
        "<i8"
    }
    fn shape(&self) -> Vec<usize> {
        vec![self.len()]
    }
}

/// Callback registered by a [`SignalCache`](crate::signal::cache) to receive
/// every value the backend emits.
pub type BackendCallback<T> = Box<dyn Fn(Reading<T>) + Send + Sync>;

/// Contract for reading, writing, describing, and subscribing to one control
/// point.
///
/// # Contract
/// - `source` maps the logical signal name to an address of the form
///   `scheme://identifier`.
/// - `connect` resolves the address and fetches enough metadata to validate
///   the declared datatype.
/// - At most one callback may be registered at a time; registering a second
///   without clearing the first is an error, enforced by raising before any
///   state is mutated. Registering a callback immediately delivers the
///   current reading if one exists, so a subscriber never starts blind.
#[async_trait]
pub trait SignalBackend<T: SignalValue>: Send + Sync {
    /// Address of the control point, `scheme://identifier`.
    fn source(&self, name: &str) -> String;

    /// Resolve the address and establish the connection.
    async fn connect(&self, timeout: Duration) -> AcqResult<()>;

    /// Write `value`; with `wait` the call returns only once the control
    /// system has accepted the write.
    async fn put(&self, value: T, wait: bool) -> AcqResult<()>;

    /// Current value.
    async fn get_value(&self) -> AcqResult<T>;

    /// Current value with timestamp and severity.
    async fn get_reading(&self) -> AcqResult<Reading<T>>;

    /// Last written setpoint.
    async fn get_setpoint(&self) -> AcqResult<T>;

    /// Datakey describing this control point.
    async fn get_datakey(&self, source: &str) -> AcqResult<DataKey>;

    /// Register (`Some`) or clear (`None`) the single update callback.
    fn set_callback(&self, callback: Option<BackendCallback<T>>) -> AcqResult<()>;
}
