//! Composable device trees and the connect lifecycle.
//!
//! A [`Device`] is a named node owning zero or more named children (devices
//! or signals) registered explicitly at construction. Connecting a device
//! recursively connects every child with the same options, attempting all of
//! them and aggregating failures into one [`ConnectError`](crate::error::ConnectError)
//! tree rather than failing fast.
//!
//! Connect attempts are de-duplicated per device: a repeat `connect` with the
//! same mock flag awaits the existing in-flight or completed attempt instead
//! of starting new work, unless `force_reconnect` is set. Switching the mock
//! flag always forces a fresh connect, because the backend implementation
//! differs.
//!
//! # Naming
//!
//! A child's fully-qualified name is `parent_name + "-" + attr` (just `attr`
//! under an unnamed root). Renaming a device cascades to all descendants.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::error::{AcqError, AcqResult, ConnectError};
use crate::signal::ErasedSignal;
use crate::sync::lock;

/// Default per-call timeout for connects and signal operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for one connect attempt over a device tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Substitute test-double backends for every leaf signal.
    pub mock: bool,
    /// Budget for each leaf connect.
    pub timeout: Duration,
    /// Start fresh work even if a previous attempt with the same mock flag
    /// is pending or succeeded.
    pub force_reconnect: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            mock: false,
            timeout: DEFAULT_TIMEOUT,
            force_reconnect: false,
        }
    }
}

impl ConnectOptions {
    /// Connect with test-double backends.
    pub fn mock() -> Self {
        Self {
            mock: true,
            ..Self::default()
        }
    }

    /// Override the per-leaf timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Force fresh connect work.
    pub fn force(mut self) -> Self {
        self.force_reconnect = true;
        self
    }
}

/// A named node in a device tree.
#[async_trait]
pub trait Device: Send + Sync {
    /// Fully-qualified name of this device.
    fn name(&self) -> String;

    /// Rename this device, cascading to all descendants.
    fn set_name(&self, name: &str);

    /// The registered children, in registration order.
    fn children(&self) -> Vec<DeviceChild>;

    /// Connect this device and everything below it.
    async fn connect(&self, options: ConnectOptions) -> AcqResult<()>;
}

/// One registered child of a device.
#[derive(Clone)]
pub struct DeviceChild {
    /// The attribute name the child was registered under.
    pub attr: String,
    /// The child as a device (always present).
    pub device: Arc<dyn Device>,
    /// The child as a type-erased signal, when it is one.
    pub signal: Option<Arc<dyn ErasedSignal>>,
}

// =============================================================================
// Connect de-duplication
// =============================================================================

struct ConnectAttempt {
    mock: bool,
    fut: Shared<BoxFuture<'static, AcqResult<()>>>,
}

/// De-duplicates connect attempts for one device or signal.
///
/// Holds the in-flight/completed attempt as a shared future so concurrent and
/// repeated callers await the same work.
#[derive(Default)]
pub struct DeviceConnector {
    attempt: Mutex<Option<ConnectAttempt>>,
}

impl DeviceConnector {
    /// A connector with no prior attempt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the existing attempt if it is reusable, else build a fresh one
    /// with `make` and await that.
    ///
    /// An attempt is reusable when the mock flag matches, `force_reconnect`
    /// is not set, and the attempt is pending or succeeded. A failed attempt
    /// is always retried.
    pub async fn connect_with<F>(&self, options: ConnectOptions, make: F) -> AcqResult<()>
    where
        F: FnOnce() -> BoxFuture<'static, AcqResult<()>>,
    {
        let fut = {
            let mut attempt = lock(&self.attempt);
            let reusable = attempt
                .as_ref()
                .filter(|a| {
                    a.mock == options.mock
                        && !options.force_reconnect
                        && !matches!(a.fut.peek(), Some(Err(_)))
                })
                .map(|a| a.fut.clone());
            match reusable {
                Some(fut) => {
                    debug!(mock = options.mock, "reusing existing connect attempt");
                    fut
                }
                None => {
                    let fut = make().shared();
                    *attempt = Some(ConnectAttempt {
                        mock: options.mock,
                        fut: fut.clone(),
                    });
                    fut
                }
            }
        };
        fut.await
    }
}

// =============================================================================
// DeviceCore
// =============================================================================

/// Naming, child registry, and connect lifecycle shared by composite devices.
///
/// Composite devices embed a `DeviceCore`, register their children in their
/// constructor, and delegate the [`Device`] methods to it.
///
/// # Example
///
/// ```rust,ignore
/// struct Slit {
///     core: DeviceCore,
///     gap: SignalRW<f64>,
/// }
///
/// impl Slit {
///     fn new(name: &str) -> Self {
///         let core = DeviceCore::new(name);
///         let gap = soft_signal_rw("gap", 0.0);
///         core.attach_signal("gap", &gap);
///         Self { core, gap }
///     }
/// }
/// ```
pub struct DeviceCore {
    name: Mutex<String>,
    children: Mutex<Vec<DeviceChild>>,
    connector: DeviceConnector,
}

impl DeviceCore {
    /// A core with the given name and no children.
    pub fn new(name: &str) -> Self {
        Self {
            name: Mutex::new(name.to_string()),
            children: Mutex::new(Vec::new()),
            connector: DeviceConnector::new(),
        }
    }

    /// This device's name.
    pub fn name(&self) -> String {
        lock(&self.name).clone()
    }

    fn child_name(parent: &str, attr: &str) -> String {
        if parent.is_empty() {
            attr.to_string()
        } else {
            format!("{parent}-{attr}")
        }
    }

    /// Rename this device and recompute every descendant's name.
    pub fn set_name(&self, name: &str) {
        *lock(&self.name) = name.to_string();
        for child in lock(&self.children).iter() {
            child.device.set_name(&Self::child_name(name, &child.attr));
        }
    }

    /// Register a child device under `attr`, naming it now.
    pub fn attach_device(&self, attr: &str, device: Arc<dyn Device>) {
        device.set_name(&Self::child_name(&self.name(), attr));
        lock(&self.children).push(DeviceChild {
            attr: attr.to_string(),
            device,
            signal: None,
        });
    }

    /// Register a child signal under `attr`, naming it now.
    ///
    /// The signal is registered in both its device and type-erased forms so
    /// enumeration (e.g. for settings persistence) does not need downcasts.
    pub fn attach_signal<S>(&self, attr: &str, signal: &S)
    where
        S: Device + ErasedSignal + Clone + 'static,
    {
        let arc = Arc::new(signal.clone());
        arc.set_name(&Self::child_name(&self.name(), attr));
        lock(&self.children).push(DeviceChild {
            attr: attr.to_string(),
            device: arc.clone(),
            signal: Some(arc),
        });
    }

    /// The registered children, in registration order.
    pub fn children(&self) -> Vec<DeviceChild> {
        lock(&self.children).clone()
    }

    /// Connect every child, de-duplicating repeat attempts.
    ///
    /// All children are attempted even when some fail; the failures are
    /// aggregated into one [`AcqError::NotConnected`] naming each failing
    /// child. Successfully connected siblings are not rolled back.
    pub async fn connect_children(&self, options: ConnectOptions) -> AcqResult<()> {
        let name = self.name();
        let children: Vec<(String, Arc<dyn Device>)> = lock(&self.children)
            .iter()
            .map(|child| (child.attr.clone(), child.device.clone()))
            .collect();

        self.connector
            .connect_with(options, move || {
                async move {
                    debug!(device = %name, mock = options.mock, "connecting children");
                    let results = futures::future::join_all(
                        children.iter().map(|(_, child)| child.connect(options)),
                    )
                    .await;

                    let mut failures = BTreeMap::new();
                    for ((attr, _), result) in children.iter().zip(results) {
                        if let Err(err) = result {
                            failures.insert(attr.clone(), ConnectError::from(err));
                        }
                    }
                    if failures.is_empty() {
                        Ok(())
                    } else {
                        Err(AcqError::NotConnected(ConnectError::Tree(failures)))
                    }
                }
                .boxed()
            })
            .await
    }
}

// =============================================================================
// DeviceVec
// =============================================================================

/// An ordered collection device whose children are named by index.
pub struct DeviceVec {
    core: DeviceCore,
}

impl DeviceVec {
    /// Collect `devices` under `name`, children named `0`, `1`, ...
    pub fn new(name: &str, devices: Vec<Arc<dyn Device>>) -> Self {
        let core = DeviceCore::new(name);
        for (index, device) in devices.into_iter().enumerate() {
            core.attach_device(&index.to_string(), device);
        }
        Self { core }
    }
}

#[async_trait]
impl Device for DeviceVec {
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

// =============================================================================
// Enumeration
// =============================================================================

/// Depth-first enumeration of the writable signals under `device`, as
/// dotted attribute paths in registration order.
///
/// This is the hook an external settings-persistence layer uses to save and
/// restore `{signal-path: value}` phase lists via the signals' locate/set
/// primitives.
pub fn walk_rw_signals(device: &dyn Device) -> Vec<(String, Arc<dyn ErasedSignal>)> {
    let mut out = Vec::new();
    walk_into(device, "", &mut out);
    out
}

fn walk_into(device: &dyn Device, prefix: &str, out: &mut Vec<(String, Arc<dyn ErasedSignal>)>) {
    for child in device.children() {
        let path = if prefix.is_empty() {
            child.attr.clone()
        } else {
            format!("{prefix}.{}", child.attr)
        };
        if let Some(signal) = &child.signal {
            if signal.is_writable() {
                out.push((path.clone(), signal.clone()));
            }
        }
        walk_into(child.device.as_ref(), &path, out);
    }
}
