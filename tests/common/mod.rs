//! Shared fixtures for the integration tests.
#![allow(dead_code)] // Each test binary uses a subset of these fixtures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use acq_core::detector::{ProvisioningSupport, StandardDetector, TriggerInfo};
use acq_core::documents::DataKey;
use acq_core::error::{AcqError, AcqResult};
use acq_core::signal::{BackendCallback, Reading, SignalBackend, SignalValue};
use acq_core::sim::{sim_detector_logic, SimDataLogic, SimDetectorConfig};

/// Backend that counts connects and can be programmed to fail them.
pub struct CountingBackend<T: SignalValue> {
    value: T,
    connects: AtomicUsize,
    fail_connect: bool,
}

impl<T: SignalValue> CountingBackend<T> {
    pub fn new(value: T) -> Arc<Self> {
        Arc::new(Self {
            value,
            connects: AtomicUsize::new(0),
            fail_connect: false,
        })
    }

    pub fn failing(value: T) -> Arc<Self> {
        Arc::new(Self {
            value,
            connects: AtomicUsize::new(0),
            fail_connect: true,
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: SignalValue> SignalBackend<T> for CountingBackend<T> {
    fn source(&self, name: &str) -> String {
        format!("test://{name}")
    }

    async fn connect(&self, _timeout: Duration) -> AcqResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            Err(AcqError::Protocol("channel unreachable".into()))
        } else {
            Ok(())
        }
    }

    async fn put(&self, _value: T, _wait: bool) -> AcqResult<()> {
        Ok(())
    }

    async fn get_value(&self) -> AcqResult<T> {
        Ok(self.value.clone())
    }

    async fn get_reading(&self) -> AcqResult<Reading<T>> {
        Ok(Reading::now(self.value.clone()))
    }

    async fn get_setpoint(&self) -> AcqResult<T> {
        Ok(self.value.clone())
    }

    async fn get_datakey(&self, source: &str) -> AcqResult<DataKey> {
        Ok(self.value.datakey(source))
    }

    fn set_callback(&self, _callback: Option<BackendCallback<T>>) -> AcqResult<()> {
        Ok(())
    }
}

/// A simulated detector whose data logic handle stays accessible.
pub fn sim_detector_with_parts(
    name: &str,
    provisioning: ProvisioningSupport,
) -> (StandardDetector, Arc<SimDataLogic>) {
    let config = SimDetectorConfig {
        provisioning,
        ..SimDetectorConfig::default()
    };
    let (trigger_logic, arm_logic, data_logic) = sim_detector_logic(name, config);
    let detector = StandardDetector::new(name, trigger_logic, arm_logic, data_logic.clone());
    (detector, data_logic)
}

/// Internal-trigger configuration with `events` events and instant pacing.
pub fn internal_info(events: u32) -> TriggerInfo {
    TriggerInfo::builder()
        .number_of_events(events)
        .build()
        .expect("valid trigger info")
}
