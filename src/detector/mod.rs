//! The detector acquisition state machine.
//!
//! A [`StandardDetector`] composes three strategy interfaces (trigger, arm,
//! data) with the signal/status primitives into a uniform
//! prepare → trigger/kickoff → complete protocol, while a separate
//! data-writing subsystem streams results behind a
//! [`StreamProvider`](crate::detector::provider::StreamProvider).
//!
//! # State machine
//!
//! ```text
//! Idle ──prepare──> Prepared ──arm──> Armed ──trigger/kickoff──> Acquiring
//!   ▲                  (external triggers arm during prepare)        │
//!   │                                                                ▼
//!   └───────────────────────unstage──────────────────────────── Complete
//! ```
//!
//! Failures during `prepare`/`trigger`/`kickoff`/`complete` leave the
//! detector in a well-defined "not advanced" state: no context is written
//! until every required sub-step has succeeded, so a retry from the same
//! state is safe.

pub mod logic;
pub mod provider;
pub mod trigger;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::device::{ConnectOptions, Device, DeviceChild, DeviceCore};
use crate::documents::{DataKey, StreamDoc};
use crate::error::{AcqError, AcqResult};
use crate::signal::{with_timeout, Reading};
use crate::status::{WatchableStatus, WatcherUpdate};

pub use logic::{DetectorArmLogic, DetectorDataLogic, DetectorTriggerLogic};
pub use provider::{ReadableProvider, StreamProvider};
pub use trigger::{
    DetectorTrigger, Provisioning, ProvisioningSupport, TriggerInfo, TriggerInfoBuilder,
    TriggerSupport,
};

/// Lifecycle state of a [`StandardDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Post-construct or post-`unstage`.
    Idle,
    /// Configured for an acquisition; hardware not yet armed.
    Prepared,
    /// Hardware armed, data provider active.
    Armed,
    /// Trigger or kickoff issued.
    Acquiring,
    /// All requested collections observed.
    Complete,
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Idle => write!(f, "Idle"),
            DetectorState::Prepared => write!(f, "Prepared"),
            DetectorState::Armed => write!(f, "Armed"),
            DetectorState::Acquiring => write!(f, "Acquiring"),
            DetectorState::Complete => write!(f, "Complete"),
        }
    }
}

/// What a `prepare` established: the configuration in force, the active
/// provider, whether it may be reused, and the watermark at creation.
struct PrepareContext {
    info: TriggerInfo,
    provider: Arc<dyn StreamProvider>,
    reusable: bool,
    collections_written_at_prepare: u64,
}

/// What a `kickoff` requested, consumed by the matching `complete`.
struct KickoffContext {
    collections_requested: u64,
    start_watermark: u64,
    wait_for_idle: bool,
}

struct DetectorInner {
    state: DetectorState,
    armed: bool,
    prepare_ctx: Option<PrepareContext>,
    kickoff_ctx: Option<KickoffContext>,
}

/// Acquisition orchestrator composing the three per-hardware strategies.
///
/// # Example
///
/// ```rust,ignore
/// let det = StandardDetector::new("det", trigger_logic, arm_logic, data_logic);
/// det.stage().await?;
/// det.prepare(TriggerInfo::builder().number_of_events(5).build()?).await?;
/// det.kickoff(5).await?;
/// det.complete().await?.wait().await?;
/// det.unstage().await?;
/// ```
pub struct StandardDetector {
    core: DeviceCore,
    trigger_logic: Arc<dyn DetectorTriggerLogic>,
    arm_logic: Arc<dyn DetectorArmLogic>,
    data_logic: Arc<dyn DetectorDataLogic>,
    inner: Arc<tokio::sync::Mutex<DetectorInner>>,
}

fn not_prepared(operation: &str) -> AcqError {
    AcqError::InvalidState(format!("{operation} called before prepare"))
}

impl StandardDetector {
    /// Compose a detector from its three strategies.
    pub fn new(
        name: &str,
        trigger_logic: Arc<dyn DetectorTriggerLogic>,
        arm_logic: Arc<dyn DetectorArmLogic>,
        data_logic: Arc<dyn DetectorDataLogic>,
    ) -> Self {
        Self {
            core: DeviceCore::new(name),
            trigger_logic,
            arm_logic,
            data_logic,
            inner: Arc::new(tokio::sync::Mutex::new(DetectorInner {
                state: DetectorState::Idle,
                armed: false,
                prepare_ctx: None,
                kickoff_ctx: None,
            })),
        }
    }

    /// The child registry, for attaching configuration signals.
    pub fn device_core(&self) -> &DeviceCore {
        &self.core
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> DetectorState {
        self.inner.lock().await.state
    }

    /// Unconditionally disarm hardware, stop any data provider, and clear
    /// the prepare/kickoff contexts.
    pub async fn stage(&self) -> AcqResult<()> {
        info!(detector = %self.core.name(), "staging");
        self.reset().await
    }

    /// Return to [`DetectorState::Idle`], disarming and stopping as
    /// [`StandardDetector::stage`] does.
    pub async fn unstage(&self) -> AcqResult<()> {
        info!(detector = %self.core.name(), "unstaging");
        self.reset().await
    }

    async fn reset(&self) -> AcqResult<()> {
        let mut inner = self.inner.lock().await;
        self.arm_logic.disarm().await?;
        inner.armed = false;
        if inner.prepare_ctx.is_some() {
            self.data_logic.stop().await?;
        }
        inner.prepare_ctx = None;
        inner.kickoff_ctx = None;
        inner.state = DetectorState::Idle;
        Ok(())
    }

    /// Configure an acquisition.
    ///
    /// Rejects configurations the supplied strategies do not declare support
    /// for, dispatches to exactly one of the trigger-kind preparations,
    /// establishes the data provider, and for external triggers arms
    /// immediately (the first edge or level may arrive any time after
    /// prepare returns). Internal triggers arm lazily in
    /// [`StandardDetector::trigger`] / [`StandardDetector::kickoff`].
    pub async fn prepare(&self, info: TriggerInfo) -> AcqResult<()> {
        let mut inner = self.inner.lock().await;
        self.prepare_locked(&mut inner, info).await
    }

    async fn prepare_locked(
        &self,
        inner: &mut DetectorInner,
        info: TriggerInfo,
    ) -> AcqResult<()> {
        if info.exposures_per_collection() != 1 && !self.trigger_logic.supports_multi_exposure() {
            return Err(AcqError::UnsupportedCapability(format!(
                "{} exposures per collection requested, but the trigger logic only supports 1",
                info.exposures_per_collection()
            )));
        }
        if !self.trigger_logic.trigger_support().supports(info.trigger()) {
            return Err(AcqError::UnsupportedCapability(format!(
                "trigger kind {:?} is not in the strategy's declared support set",
                info.trigger()
            )));
        }

        match info.trigger() {
            DetectorTrigger::Internal => self.trigger_logic.prepare_internal(&info).await?,
            DetectorTrigger::ExternalEdge => self.trigger_logic.prepare_edge(&info).await?,
            DetectorTrigger::ExternalLevel => self.trigger_logic.prepare_level(&info).await?,
        }

        self.update_prepare_context(inner, &info).await?;

        if info.trigger() == DetectorTrigger::Internal {
            inner.state = DetectorState::Prepared;
        } else {
            self.arm_logic.arm().await?;
            inner.armed = true;
            inner.state = DetectorState::Armed;
        }
        debug!(detector = %self.core.name(), state = %inner.state, "prepared");
        Ok(())
    }

    /// Decide the data provider for `info`, reusing the existing one only
    /// when it is reusable and `collections_per_event` is unchanged.
    async fn update_prepare_context(
        &self,
        inner: &mut DetectorInner,
        info: &TriggerInfo,
    ) -> AcqResult<()> {
        let support = self.data_logic.provisioning();
        let mode = support.preferred().ok_or_else(|| {
            AcqError::UnsupportedCapability(
                "the data logic declares no provisioning mode".into(),
            )
        })?;
        if mode == Provisioning::Single && info.number_of_collections() > 1 {
            return Err(AcqError::UnsupportedCapability(format!(
                "{} collections requested, but the data logic can only provision one",
                info.number_of_collections()
            )));
        }

        // Reuse compares collections_per_event only: the provider indexes
        // collections, so exposure grouping within one is invisible to it.
        let reuse = inner.prepare_ctx.as_ref().is_some_and(|ctx| {
            ctx.reusable && ctx.info.collections_per_event() == info.collections_per_event()
        });

        let provider = if reuse {
            debug!(detector = %self.core.name(), "reusing data provider");
            match inner.prepare_ctx.as_ref() {
                Some(ctx) => ctx.provider.clone(),
                None => return Err(not_prepared("update_prepare_context")),
            }
        } else {
            if inner.prepare_ctx.take().is_some() {
                self.data_logic.stop().await?;
            }
            self.data_logic.start(mode, info).await?
        };

        let written = provider.collections_written().get_value().await?;
        inner.prepare_ctx = Some(PrepareContext {
            info: info.clone(),
            provider,
            reusable: mode != Provisioning::Bounded,
            collections_written_at_prepare: written,
        });
        inner.kickoff_ctx = None;
        Ok(())
    }

    /// Acquire one event with internal timing.
    ///
    /// Implicitly prepares with the default [`TriggerInfo`] when no context
    /// exists; otherwise refreshes the provider context, which may have gone
    /// stale since `prepare`. Arms, then concurrently awaits hardware idle
    /// and the watermark advancing by one collection-equivalent, streaming
    /// progress keyed on `collections_written / collections_per_event`.
    pub async fn trigger(&self) -> AcqResult<WatchableStatus> {
        let mut inner = self.inner.lock().await;

        if inner.prepare_ctx.is_none() {
            self.prepare_locked(&mut inner, TriggerInfo::default()).await?;
        } else {
            let info = match inner.prepare_ctx.as_ref() {
                Some(ctx) => ctx.info.clone(),
                None => return Err(not_prepared("trigger")),
            };
            self.update_prepare_context(&mut inner, &info).await?;
        }

        let (info, provider, start) = match inner.prepare_ctx.as_ref() {
            Some(ctx) => (
                ctx.info.clone(),
                ctx.provider.clone(),
                ctx.collections_written_at_prepare,
            ),
            None => return Err(not_prepared("trigger")),
        };
        if info.number_of_events() != 1 || info.trigger() != DetectorTrigger::Internal {
            return Err(AcqError::InvalidState(format!(
                "trigger() requires a context prepared for one internally-timed event, \
                 got {} events with {:?} triggering",
                info.number_of_events(),
                info.trigger()
            )));
        }

        self.arm_logic.arm().await?;
        inner.armed = true;
        inner.state = DetectorState::Acquiring;
        drop(inner);

        let target = start + u64::from(info.collections_per_event());
        Ok(self.spawn_acquisition(provider, info, start, target, true))
    }

    /// Request `events_to_kickoff` further events from the prepared bound.
    ///
    /// Fails fast, before arming anything, if the requested watermark would
    /// exceed what `prepare` declared. Only the kickoff that exhausts the
    /// declared bound waits on hardware idle in its `complete`; intermediate
    /// kickoffs wait only on the watermark, allowing back-to-back kickoffs
    /// without re-arming.
    pub async fn kickoff(&self, events_to_kickoff: u32) -> AcqResult<()> {
        let mut inner = self.inner.lock().await;
        let (info, provider, prepare_start) = match inner.prepare_ctx.as_ref() {
            Some(ctx) => (
                ctx.info.clone(),
                ctx.provider.clone(),
                ctx.collections_written_at_prepare,
            ),
            None => return Err(not_prepared("kickoff")),
        };

        let requested =
            u64::from(events_to_kickoff) * u64::from(info.collections_per_event());
        let written = provider.collections_written().get_value().await?;
        let declared = info.number_of_collections();

        if declared != 0 && written + requested > prepare_start + declared {
            return Err(AcqError::InvalidState(format!(
                "kickoff of {requested} collections from watermark {written} would overrun \
                 the prepared bound of {declared}"
            )));
        }
        // Only the kickoff that exhausts the declared bound waits on idle.
        let wait_for_idle = declared != 0 && written + requested == prepare_start + declared;

        if info.trigger() == DetectorTrigger::Internal && !inner.armed {
            self.arm_logic.arm().await?;
            inner.armed = true;
        }

        inner.kickoff_ctx = Some(KickoffContext {
            collections_requested: requested,
            start_watermark: written,
            wait_for_idle,
        });
        inner.state = DetectorState::Acquiring;
        debug!(
            detector = %self.core.name(),
            requested, start = written, wait_for_idle, "kicked off"
        );
        Ok(())
    }

    /// Stream progress over the delta recorded by the matching
    /// [`StandardDetector::kickoff`], terminating once the watermark reaches
    /// the requested value and, for the exhausting kickoff, the hardware
    /// idle wait resolves.
    pub async fn complete(&self) -> AcqResult<WatchableStatus> {
        let mut inner = self.inner.lock().await;
        let kickoff = inner
            .kickoff_ctx
            .take()
            .ok_or_else(|| AcqError::InvalidState("complete() called before kickoff()".into()))?;
        let (info, provider) = match inner.prepare_ctx.as_ref() {
            Some(ctx) => (ctx.info.clone(), ctx.provider.clone()),
            None => return Err(not_prepared("complete")),
        };
        drop(inner);

        Ok(self.spawn_acquisition(
            provider,
            info,
            kickoff.start_watermark,
            kickoff.start_watermark + kickoff.collections_requested,
            kickoff.wait_for_idle,
        ))
    }

    /// Datakeys of the active provider.
    pub async fn describe(&self) -> AcqResult<BTreeMap<String, DataKey>> {
        let inner = self.inner.lock().await;
        let ctx = inner.prepare_ctx.as_ref().ok_or_else(|| not_prepared("describe"))?;
        ctx.provider
            .make_datakeys(ctx.info.collections_per_event())
            .await
    }

    /// Emit the stream documents covering everything written so far that
    /// has not been emitted yet.
    pub async fn collect_stream_docs(&self) -> AcqResult<Vec<StreamDoc>> {
        let inner = self.inner.lock().await;
        let ctx = inner
            .prepare_ctx
            .as_ref()
            .ok_or_else(|| not_prepared("collect_stream_docs"))?;
        let written = ctx.provider.collections_written().get_value().await?;
        ctx.provider
            .make_stream_docs(written, ctx.info.collections_per_event())
            .await
    }

    /// Event-document readings. Streamed detectors publish their data via
    /// resource/datum documents, so this is empty once prepared; calling it
    /// before `prepare` is an error.
    pub async fn read(&self) -> AcqResult<BTreeMap<String, Reading<serde_json::Value>>> {
        let inner = self.inner.lock().await;
        if inner.prepare_ctx.is_none() {
            return Err(not_prepared("read"));
        }
        Ok(BTreeMap::new())
    }

    fn spawn_acquisition(
        &self,
        provider: Arc<dyn StreamProvider>,
        info: TriggerInfo,
        start_watermark: u64,
        target_watermark: u64,
        wait_for_idle: bool,
    ) -> WatchableStatus {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let arm_logic = self.arm_logic.clone();
        let inner = self.inner.clone();
        let name = self.core.name();

        WatchableStatus::spawn_watchable(
            move |token| async move {
                let result = run_acquisition(
                    name,
                    arm_logic.clone(),
                    provider,
                    update_tx,
                    info,
                    start_watermark,
                    target_watermark,
                    wait_for_idle,
                    token,
                )
                .await;

                match &result {
                    Ok(()) => {
                        let mut guard = inner.lock().await;
                        guard.state = DetectorState::Complete;
                        if wait_for_idle {
                            guard.armed = false;
                        }
                    }
                    Err(AcqError::Cancelled) => {
                        // Best-effort cleanup runs to completion before the
                        // cancellation is surfaced.
                        let _ = arm_logic.disarm().await;
                        let mut guard = inner.lock().await;
                        guard.armed = false;
                    }
                    Err(_) => {}
                }
                result
            },
            update_rx,
        )
    }
}

/// Race the watermark wait and (when required) the hardware-idle wait,
/// returning once every condition for the requested watermark is satisfied.
#[allow(clippy::too_many_arguments)]
async fn run_acquisition(
    name: String,
    arm_logic: Arc<dyn DetectorArmLogic>,
    provider: Arc<dyn StreamProvider>,
    updates: mpsc::UnboundedSender<WatcherUpdate>,
    info: TriggerInfo,
    start: u64,
    target: u64,
    wait_for_idle: bool,
    token: CancellationToken,
) -> AcqResult<()> {
    let collections_per_event = u64::from(info.collections_per_event());
    let signal = provider.collections_written();
    let mut subscription = signal.subscribe()?;
    let target_events = (target.saturating_sub(start)) as f64 / collections_per_event as f64;

    let watermark_token = token.clone();
    let watermark_wait = async {
        let mut last_reported = start;
        while last_reported < target {
            tokio::select! {
                _ = watermark_token.cancelled() => return Err(AcqError::Cancelled),
                next = subscription.recv() => {
                    let Some(reading) = next else {
                        return Err(AcqError::InvalidState(
                            "collections-written subscription closed".into(),
                        ));
                    };
                    let current = reading.value;
                    if current > last_reported {
                        last_reported = current;
                        let _ = updates.send(WatcherUpdate {
                            name: name.clone(),
                            current: (current.saturating_sub(start)) as f64
                                / collections_per_event as f64,
                            initial: 0.0,
                            target: target_events,
                            unit: Some("events".into()),
                            precision: None,
                            time_elapsed: None,
                        });
                    }
                }
            }
        }
        Ok(())
    };

    let idle_token = token.clone();
    let idle_deadline = arm_logic
        .exposure_deadline(&info)
        .mul_f64(info.number_of_exposures().max(1) as f64);
    let idle_arm = arm_logic.clone();
    let idle_name = format!("{name} idle wait");
    let idle_wait = async {
        if wait_for_idle {
            with_timeout(idle_arm.wait_for_idle(idle_token), idle_deadline, &idle_name).await
        } else {
            Ok(())
        }
    };

    let (watermark_result, idle_result) = tokio::join!(watermark_wait, idle_wait);
    watermark_result?;
    idle_result
}

#[async_trait]
impl Device for StandardDetector {
    fn name(&self) -> String {
        self.core.name()
    }

    fn set_name(&self, name: &str) {
        self.core.set_name(name);
    }

    fn children(&self) -> Vec<DeviceChild> {
        self.core.children()
    }

    async fn connect(&self, options: ConnectOptions) -> AcqResult<()> {
        self.core.connect_children(options).await
    }
}
