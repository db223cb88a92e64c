//! Simulated detector strategies.
//!
//! A software detector for development and testing without hardware: the
//! three strategy interfaces are implemented over a shared simulated state,
//! and collections "land" from a paced background task the way frames land
//! from a real detector. All pacing uses `tokio::time::sleep`, never a
//! blocking sleep.
//!
//! # Example
//!
//! ```rust,ignore
//! let det = sim_detector("det");
//! det.prepare(TriggerInfo::builder().number_of_events(5).build()?).await?;
//! det.kickoff(5).await?;
//! det.complete().await?.wait().await?;
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::detector::{
    DetectorArmLogic, DetectorDataLogic, DetectorTriggerLogic, Provisioning, ProvisioningSupport,
    ReadableProvider, StandardDetector, StreamProvider, TriggerInfo, TriggerSupport,
};
use crate::documents::{DataKey, DatumDoc, Dtype, ResourceDoc, StreamDoc};
use crate::error::{AcqError, AcqResult};
use crate::signal::{soft_signal_r, soft_signal_rw, Reading, SignalR, SoftSignalSetter};
use crate::sync::lock;

/// One simulated dataset written per collection.
#[derive(Debug, Clone)]
pub struct SimDatasetSpec {
    /// Dataset name, used as the data key.
    pub name: String,
    /// Per-collection shape; empty for scalars.
    pub shape: Vec<usize>,
}

/// Configuration for the simulated strategies.
#[derive(Debug, Clone)]
pub struct SimDetectorConfig {
    /// Datasets the simulated writer produces.
    pub datasets: Vec<SimDatasetSpec>,
    /// Provisioning modes the data logic declares.
    pub provisioning: ProvisioningSupport,
}

impl Default for SimDetectorConfig {
    fn default() -> Self {
        Self {
            datasets: vec![SimDatasetSpec {
                name: "image".to_string(),
                shape: vec![64, 64],
            }],
            provisioning: ProvisioningSupport {
                unbounded: true,
                bounded: false,
                single: false,
            },
        }
    }
}

struct SimShared {
    armed: watch::Sender<bool>,
    prepared: Mutex<Option<TriggerInfo>>,
    provider: Mutex<Option<Arc<SimStreamProvider>>>,
    pacer: Mutex<Option<tokio::task::JoinHandle<()>>>,
    name: String,
    datasets: Vec<SimDatasetSpec>,
}

impl SimShared {
    fn new(name: &str, datasets: Vec<SimDatasetSpec>) -> Arc<Self> {
        let (armed, _) = watch::channel(false);
        Arc::new(Self {
            armed,
            prepared: Mutex::new(None),
            provider: Mutex::new(None),
            pacer: Mutex::new(None),
            name: name.to_string(),
            datasets,
        })
    }

    fn stop_pacer(&self) {
        if let Some(pacer) = lock(&self.pacer).take() {
            pacer.abort();
        }
    }
}

// =============================================================================
// Trigger logic
// =============================================================================

/// Simulated trigger configuration: internal and edge triggering,
/// single-exposure collections only.
pub struct SimTriggerLogic {
    shared: Arc<SimShared>,
}

#[async_trait]
impl DetectorTriggerLogic for SimTriggerLogic {
    fn trigger_support(&self) -> TriggerSupport {
        TriggerSupport {
            internal: true,
            external_edge: true,
            external_level: false,
        }
    }

    async fn prepare_internal(&self, info: &TriggerInfo) -> AcqResult<()> {
        *lock(&self.shared.prepared) = Some(info.clone());
        Ok(())
    }

    async fn prepare_edge(&self, info: &TriggerInfo) -> AcqResult<()> {
        *lock(&self.shared.prepared) = Some(info.clone());
        Ok(())
    }
}

// =============================================================================
// Arm logic
// =============================================================================

/// Simulated arming: a paced background task advances the watermark, and the
/// hardware reports idle once the prepared bound has landed.
pub struct SimArmLogic {
    shared: Arc<SimShared>,
}

#[async_trait]
impl DetectorArmLogic for SimArmLogic {
    async fn arm(&self) -> AcqResult<()> {
        let info = lock(&self.shared.prepared)
            .clone()
            .ok_or_else(|| AcqError::InvalidState("arm called before prepare".into()))?;
        let provider = lock(&self.shared.provider)
            .clone()
            .ok_or_else(|| AcqError::InvalidState("arm called before data start".into()))?;

        // Re-arming replaces any running pacer.
        self.shared.stop_pacer();
        self.shared.armed.send_replace(true);

        let base = provider.collections_written().get_value().await?;
        let declared = info.number_of_collections();
        let interval =
            Duration::from_secs_f64((info.livetime_s() + info.deadtime_s()).max(0.001));
        debug!(detector = %self.shared.name, base, declared, "armed");

        let armed = self.shared.armed.clone();
        let pacer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Ok(current) = provider.advance(1).await else {
                    break;
                };
                if declared != 0 && current >= base + declared {
                    armed.send_replace(false);
                    break;
                }
            }
        });
        *lock(&self.shared.pacer) = Some(pacer);
        Ok(())
    }

    async fn disarm(&self) -> AcqResult<()> {
        self.shared.stop_pacer();
        self.shared.armed.send_replace(false);
        Ok(())
    }

    async fn wait_for_idle(&self, token: CancellationToken) -> AcqResult<()> {
        let mut rx = self.shared.armed.subscribe();
        loop {
            if !*rx.borrow() {
                return Ok(());
            }
            tokio::select! {
                _ = token.cancelled() => return Err(AcqError::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

// =============================================================================
// Data logic
// =============================================================================

/// Simulated data writing: an in-memory provider whose watermark the pacer
/// advances.
pub struct SimDataLogic {
    shared: Arc<SimShared>,
    support: ProvisioningSupport,
}

impl SimDataLogic {
    /// The provider created by the last `start`, while one is active.
    pub fn active_provider(&self) -> Option<Arc<SimStreamProvider>> {
        lock(&self.shared.provider).clone()
    }
}

#[async_trait]
impl DetectorDataLogic for SimDataLogic {
    fn provisioning(&self) -> ProvisioningSupport {
        self.support
    }

    async fn start(
        &self,
        mode: Provisioning,
        _info: &TriggerInfo,
    ) -> AcqResult<Arc<dyn StreamProvider>> {
        debug!(detector = %self.shared.name, ?mode, "starting data provider");
        let provider = Arc::new(SimStreamProvider::new(
            &self.shared.name,
            self.shared.datasets.clone(),
        ));
        *lock(&self.shared.provider) = Some(provider.clone());
        Ok(provider)
    }

    async fn stop(&self) -> AcqResult<()> {
        self.shared.stop_pacer();
        if let Some(provider) = lock(&self.shared.provider).take() {
            provider.stop();
        }
        Ok(())
    }
}

// =============================================================================
// Stream provider
// =============================================================================

struct DocState {
    resource_emitted: bool,
    last_emitted: u64,
}

/// In-memory [`StreamProvider`] with a watermark signal the simulated
/// hardware advances.
pub struct SimStreamProvider {
    watermark: SignalR<u64>,
    setter: SoftSignalSetter<u64>,
    datasets: Vec<SimDatasetSpec>,
    doc_state: Mutex<DocState>,
    stopped: AtomicBool,
    name: String,
    uri: String,
}

impl SimStreamProvider {
    /// A provider for `datasets` with the watermark at zero.
    pub fn new(detector_name: &str, datasets: Vec<SimDatasetSpec>) -> Self {
        let (watermark, setter) =
            soft_signal_r(&format!("{detector_name}-collections-written"), 0u64);
        Self {
            watermark,
            setter,
            datasets,
            doc_state: Mutex::new(DocState {
                resource_emitted: false,
                last_emitted: 0,
            }),
            stopped: AtomicBool::new(false),
            name: detector_name.to_string(),
            uri: format!("file://sim/{detector_name}.h5"),
        }
    }

    /// Advance the watermark by `n` collections, returning the new value.
    /// A stopped provider ignores advances.
    pub async fn advance(&self, n: u64) -> AcqResult<u64> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(AcqError::InvalidState("provider is stopped".into()));
        }
        let current = self.watermark.get_value().await?;
        let next = current + n;
        self.setter.set(next).await?;
        Ok(next)
    }

    /// Stop accepting advances.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn dataset_datakey(&self, spec: &SimDatasetSpec, collections_per_event: u32) -> DataKey {
        let mut shape = Vec::new();
        if collections_per_event > 1 {
            shape.push(collections_per_event as usize);
        }
        shape.extend_from_slice(&spec.shape);
        let dtype = if shape.is_empty() {
            Dtype::Number
        } else {
            Dtype::Array
        };
        DataKey {
            source: format!("sim://{}/{}", self.name, spec.name),
            shape,
            dtype,
            dtype_numpy: "<f8".to_string(),
            external: Some("STREAM:".to_string()),
        }
    }
}

#[async_trait]
impl StreamProvider for SimStreamProvider {
    fn collections_written(&self) -> SignalR<u64> {
        self.watermark.clone()
    }

    async fn make_datakeys(
        &self,
        collections_per_event: u32,
    ) -> AcqResult<BTreeMap<String, DataKey>> {
        Ok(self
            .datasets
            .iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    self.dataset_datakey(spec, collections_per_event),
                )
            })
            .collect())
    }

    async fn make_stream_docs(
        &self,
        collections_written: u64,
        _collections_per_event: u32,
    ) -> AcqResult<Vec<StreamDoc>> {
        let mut state = lock(&self.doc_state);
        let mut docs = Vec::new();

        if collections_written > 0 && !state.resource_emitted {
            for spec in &self.datasets {
                docs.push(StreamDoc::Resource(ResourceDoc {
                    mimetype: "application/x-hdf5".to_string(),
                    uri: self.uri.clone(),
                    data_key: spec.name.clone(),
                    parameters: serde_json::json!({ "dataset": format!("/entry/{}", spec.name) }),
                }));
            }
            state.resource_emitted = true;
        }

        if collections_written > state.last_emitted {
            for spec in &self.datasets {
                docs.push(StreamDoc::Datum(DatumDoc {
                    data_key: spec.name.clone(),
                    start: state.last_emitted,
                    stop: collections_written,
                }));
            }
            state.last_emitted = collections_written;
        }

        Ok(docs)
    }
}

// =============================================================================
// Readable provider
// =============================================================================

/// In-memory [`ReadableProvider`] producing jittered scalar readings, for
/// single-collection detectors.
pub struct SimReadableProvider {
    source: String,
    baselines: BTreeMap<String, f64>,
}

impl SimReadableProvider {
    /// A provider reading the named channels around their baselines.
    pub fn new(detector_name: &str, baselines: BTreeMap<String, f64>) -> Self {
        Self {
            source: format!("sim://{detector_name}"),
            baselines,
        }
    }
}

#[async_trait]
impl ReadableProvider for SimReadableProvider {
    async fn make_datakeys(&self) -> AcqResult<BTreeMap<String, DataKey>> {
        Ok(self
            .baselines
            .keys()
            .map(|name| {
                (
                    name.clone(),
                    DataKey {
                        source: format!("{}/{name}", self.source),
                        shape: Vec::new(),
                        dtype: Dtype::Number,
                        dtype_numpy: "<f8".to_string(),
                        external: None,
                    },
                )
            })
            .collect())
    }

    async fn make_readings(&self) -> AcqResult<BTreeMap<String, Reading<serde_json::Value>>> {
        let mut rng = rand::thread_rng();
        Ok(self
            .baselines
            .iter()
            .map(|(name, baseline)| {
                let value = baseline + rng.gen_range(-0.01..0.01);
                (name.clone(), Reading::now(serde_json::json!(value)))
            })
            .collect())
    }
}

// =============================================================================
// Wiring
// =============================================================================

/// Build the three simulated strategies over one shared state.
pub fn sim_detector_logic(
    name: &str,
    config: SimDetectorConfig,
) -> (Arc<SimTriggerLogic>, Arc<SimArmLogic>, Arc<SimDataLogic>) {
    let shared = SimShared::new(name, config.datasets);
    (
        Arc::new(SimTriggerLogic {
            shared: shared.clone(),
        }),
        Arc::new(SimArmLogic {
            shared: shared.clone(),
        }),
        Arc::new(SimDataLogic {
            shared,
            support: config.provisioning,
        }),
    )
}

/// A fully-wired simulated [`StandardDetector`] with an exposure-time
/// configuration signal attached.
pub fn sim_detector(name: &str) -> StandardDetector {
    sim_detector_with_config(name, SimDetectorConfig::default())
}

/// As [`sim_detector`], with explicit configuration.
pub fn sim_detector_with_config(name: &str, config: SimDetectorConfig) -> StandardDetector {
    let (trigger_logic, arm_logic, data_logic) = sim_detector_logic(name, config);
    let detector = StandardDetector::new(name, trigger_logic, arm_logic, data_logic);
    let acquire_time = soft_signal_rw("acquire_time", 0.0f64);
    detector.device_core().attach_signal("acquire_time", &acquire_time);
    detector
}
