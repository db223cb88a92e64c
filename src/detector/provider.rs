//! Data-provider contracts.
//!
//! Providers are produced by a [`DetectorDataLogic`](crate::detector::DetectorDataLogic)
//! and expose two capability shapes: [`ReadableProvider`] with one-shot
//! semantics for single-collection detectors, and [`StreamProvider`] for
//! detectors whose data is written externally while a watermark signal
//! counts the collections that have landed.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::documents::{DataKey, StreamDoc};
use crate::error::AcqResult;
use crate::signal::{Reading, SignalR};

/// One-shot data access for single-collection detectors.
#[async_trait]
pub trait ReadableProvider: Send + Sync {
    /// Describe every field of a collection.
    async fn make_datakeys(&self) -> AcqResult<BTreeMap<String, DataKey>>;

    /// Read every field of the current collection.
    async fn make_readings(&self) -> AcqResult<BTreeMap<String, Reading<serde_json::Value>>>;
}

/// Streaming data access for externally-written collections.
///
/// # Document contract
///
/// `make_stream_docs` produces a finite batch per call and is restartable
/// across calls: on the transition from zero to nonzero written collections
/// it yields one resource document per underlying dataset, then exactly one
/// datum document per dataset covering the half-open index range
/// `[last_emitted, indices_written)`, advancing `last_emitted`. Calling it
/// again before new collections land yields an empty batch and never
/// re-emits the resource documents.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// The monotonically increasing count of collections written.
    fn collections_written(&self) -> SignalR<u64>;

    /// Describe every dataset, shaped for `collections_per_event`.
    async fn make_datakeys(
        &self,
        collections_per_event: u32,
    ) -> AcqResult<BTreeMap<String, DataKey>>;

    /// Emit the documents covering everything written up to
    /// `collections_written` that has not been emitted yet.
    async fn make_stream_docs(
        &self,
        collections_written: u64,
        collections_per_event: u32,
    ) -> AcqResult<Vec<StreamDoc>>;
}
