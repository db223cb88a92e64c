//! # Acquisition Core Library
//!
//! This crate is a hardware-device abstraction and acquisition-orchestration
//! layer for experiment-control software. It lets a caller address thousands
//! of independent, remotely-hosted control points ("signals") through a
//! uniform typed interface, regardless of whether a signal is backed by a
//! live control system, a software-only value, a test double, or a value
//! derived from other signals.
//!
//! ## Crate Structure
//!
//! The library is organized into several modules, each with a distinct
//! responsibility:
//!
//! - **`signal`**: Typed signals in four capability shapes (`SignalR`,
//!   `SignalW`, `SignalRW`, `SignalX`), the `SignalBackend` contract behind
//!   them, per-signal caching and subscription multiplexing, and the
//!   software/mock/derived backend implementations.
//! - **`device`**: Composable named device trees, explicit child
//!   registration, the de-duplicated and failure-aggregating connect
//!   lifecycle, and enumeration of writable signals for settings
//!   persistence.
//! - **`status`**: Cancellable, awaitable handles over in-flight operations
//!   (`Status`), with a progress-streaming variant (`WatchableStatus`).
//! - **`detector`**: The `StandardDetector` acquisition state machine, its
//!   three per-hardware strategy interfaces, the acquisition configuration
//!   (`TriggerInfo`), and the data-provider contracts.
//! - **`documents`**: Datakey/resource/datum document types produced at the
//!   data boundary, never interpreted here.
//! - **`sim`**: Simulated detector strategies for development and testing
//!   without hardware.
//! - **`error`**: The `AcqError` taxonomy and the recursive `ConnectError`
//!   tree raised by aggregated connects.
//!
//! Wire-protocol backends, file serialization, settings persistence, and
//! device-family trigger/arm/data implementations are external
//! collaborators; this crate defines the interfaces they plug into and the
//! orchestration that consumes them.

pub mod detector;
pub mod device;
pub mod documents;
pub mod error;
pub mod signal;
pub mod sim;
pub mod status;

pub(crate) mod sync;

pub use device::{walk_rw_signals, ConnectOptions, Device, DeviceChild, DeviceCore, DeviceVec};
pub use error::{AcqError, AcqResult, ConnectError};
pub use signal::{
    soft_signal_r, soft_signal_rw, soft_signal_w, soft_signal_x, derived_signal_r, Reading,
    Severity, SignalR, SignalRW, SignalW, SignalX,
};
pub use status::{Status, WatchableStatus, WatcherUpdate};
