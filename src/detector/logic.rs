//! Strategy interfaces supplied per hardware family.
//!
//! A [`StandardDetector`](crate::detector::StandardDetector) is composed from
//! three independent strategies it never knows the concrete type of:
//!
//! - [`DetectorTriggerLogic`] configures the hardware for a trigger kind;
//! - [`DetectorArmLogic`] arms, disarms, and waits for hardware idle;
//! - [`DetectorDataLogic`] starts and stops the data provider.
//!
//! Each strategy declares what it supports through an explicit capability
//! query; the orchestrator dispatches only into declared capabilities. The
//! default method bodies reject the undeclared operations so a strategy only
//! writes the ones it supports.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::detector::provider::StreamProvider;
use crate::detector::trigger::{Provisioning, ProvisioningSupport, TriggerInfo, TriggerSupport};
use crate::error::{AcqError, AcqResult};

/// Configures detector hardware for a trigger kind.
#[async_trait]
pub trait DetectorTriggerLogic: Send + Sync {
    /// The trigger kinds this strategy implements.
    fn trigger_support(&self) -> TriggerSupport;

    /// Whether collections may aggregate more than one raw exposure.
    fn supports_multi_exposure(&self) -> bool {
        false
    }

    /// Configure for internal timing.
    async fn prepare_internal(&self, _info: &TriggerInfo) -> AcqResult<()> {
        Err(AcqError::UnsupportedCapability(
            "internal triggering is not implemented by this strategy".into(),
        ))
    }

    /// Configure for external edge triggering.
    async fn prepare_edge(&self, _info: &TriggerInfo) -> AcqResult<()> {
        Err(AcqError::UnsupportedCapability(
            "edge triggering is not implemented by this strategy".into(),
        ))
    }

    /// Configure for external level triggering.
    async fn prepare_level(&self, _info: &TriggerInfo) -> AcqResult<()> {
        Err(AcqError::UnsupportedCapability(
            "level triggering is not implemented by this strategy".into(),
        ))
    }
}

/// Arms and disarms detector hardware.
#[async_trait]
pub trait DetectorArmLogic: Send + Sync {
    /// Arm the hardware for acquisition.
    async fn arm(&self) -> AcqResult<()>;

    /// Disarm the hardware. Must be safe to call when already disarmed.
    async fn disarm(&self) -> AcqResult<()>;

    /// Resolve once the hardware has finished its programmed acquisition
    /// and returned to idle. Honors `token` at its suspension points.
    async fn wait_for_idle(&self, token: CancellationToken) -> AcqResult<()>;

    /// Budget for one exposure to land; bounds idle waits.
    fn exposure_deadline(&self, info: &TriggerInfo) -> std::time::Duration {
        info.exposure_timeout()
    }
}

/// Starts and stops the data provider for an acquisition.
#[async_trait]
pub trait DetectorDataLogic: Send + Sync {
    /// The provisioning modes this strategy implements.
    fn provisioning(&self) -> ProvisioningSupport;

    /// Start writing and return the provider tracking it.
    async fn start(&self, mode: Provisioning, info: &TriggerInfo)
        -> AcqResult<Arc<dyn StreamProvider>>;

    /// Stop the active provider. Must be safe to call when nothing is
    /// active.
    async fn stop(&self) -> AcqResult<()>;
}
