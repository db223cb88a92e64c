//! Acquisition configuration and strategy capability sets.
//!
//! [`TriggerInfo`] is the immutable configuration for one acquisition,
//! constructed through a validating builder. [`TriggerSupport`] and
//! [`ProvisioningSupport`] are the explicit, inspectable capability contracts
//! the detector strategies declare, replacing any notion of "supports
//! whatever methods happen to be overridden".

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::DEFAULT_TIMEOUT;
use crate::error::{AcqError, AcqResult};

/// How the detector is told to take each collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorTrigger {
    /// The detector times itself.
    Internal,
    /// Each collection starts on an external signal edge.
    ExternalEdge,
    /// Each collection lasts as long as an external signal level is held.
    ExternalLevel,
}

/// The set of trigger kinds a [`DetectorTriggerLogic`](crate::detector::DetectorTriggerLogic)
/// actually implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerSupport {
    /// Supports [`DetectorTrigger::Internal`].
    pub internal: bool,
    /// Supports [`DetectorTrigger::ExternalEdge`].
    pub external_edge: bool,
    /// Supports [`DetectorTrigger::ExternalLevel`].
    pub external_level: bool,
}

impl TriggerSupport {
    /// Internal timing only.
    pub const INTERNAL_ONLY: Self = Self {
        internal: true,
        external_edge: false,
        external_level: false,
    };

    /// Every trigger kind.
    pub const ALL: Self = Self {
        internal: true,
        external_edge: true,
        external_level: true,
    };

    /// Whether `trigger` is in the set.
    pub fn supports(&self, trigger: DetectorTrigger) -> bool {
        match trigger {
            DetectorTrigger::Internal => self.internal,
            DetectorTrigger::ExternalEdge => self.external_edge,
            DetectorTrigger::ExternalLevel => self.external_level,
        }
    }
}

/// How a data-logic strategy can provision collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provisioning {
    /// Providers can serve indefinitely and are reusable across prepares.
    Unbounded,
    /// Providers serve a known bound and must be recreated each prepare.
    Bounded,
    /// Providers serve exactly one collection; reusable, but only for
    /// single-collection acquisitions.
    Single,
}

/// The provisioning modes a [`DetectorDataLogic`](crate::detector::DetectorDataLogic)
/// declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProvisioningSupport {
    /// Can provision indefinitely.
    pub unbounded: bool,
    /// Can provision a known bound.
    pub bounded: bool,
    /// Can provision exactly one collection.
    pub single: bool,
}

impl ProvisioningSupport {
    /// The best supported mode, preferring unbounded, then bounded, then
    /// single.
    pub fn preferred(&self) -> Option<Provisioning> {
        if self.unbounded {
            Some(Provisioning::Unbounded)
        } else if self.bounded {
            Some(Provisioning::Bounded)
        } else if self.single {
            Some(Provisioning::Single)
        } else {
            None
        }
    }
}

/// Immutable configuration for one acquisition.
///
/// Derived quantities:
/// `number_of_collections = number_of_events * collections_per_event` and
/// `number_of_exposures = number_of_collections * exposures_per_collection`.
/// `number_of_events == 0` means unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerInfo {
    trigger: DetectorTrigger,
    livetime_s: f64,
    deadtime_s: f64,
    exposures_per_collection: u32,
    collections_per_event: u32,
    number_of_events: u32,
}

impl Default for TriggerInfo {
    fn default() -> Self {
        Self {
            trigger: DetectorTrigger::Internal,
            livetime_s: 0.0,
            deadtime_s: 0.0,
            exposures_per_collection: 1,
            collections_per_event: 1,
            number_of_events: 1,
        }
    }
}

impl TriggerInfo {
    /// Start building a configuration from the defaults (internal trigger,
    /// one event, one collection, one exposure).
    pub fn builder() -> TriggerInfoBuilder {
        TriggerInfoBuilder {
            info: Self::default(),
        }
    }

    /// The trigger kind.
    pub fn trigger(&self) -> DetectorTrigger {
        self.trigger
    }

    /// Per-exposure live time, seconds.
    pub fn livetime_s(&self) -> f64 {
        self.livetime_s
    }

    /// Per-exposure dead time, seconds.
    pub fn deadtime_s(&self) -> f64 {
        self.deadtime_s
    }

    /// Raw exposures aggregated into each collection.
    pub fn exposures_per_collection(&self) -> u32 {
        self.exposures_per_collection
    }

    /// Collections aggregated into each event.
    pub fn collections_per_event(&self) -> u32 {
        self.collections_per_event
    }

    /// Total events requested; `0` means unbounded.
    pub fn number_of_events(&self) -> u32 {
        self.number_of_events
    }

    /// Total collections; `0` means unbounded.
    pub fn number_of_collections(&self) -> u64 {
        u64::from(self.number_of_events) * u64::from(self.collections_per_event)
    }

    /// Total raw exposures; `0` means unbounded.
    pub fn number_of_exposures(&self) -> u64 {
        self.number_of_collections() * u64::from(self.exposures_per_collection)
    }

    /// Budget for one exposure to land, derived from the configured times
    /// plus the default margin.
    pub fn exposure_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.livetime_s + self.deadtime_s) + DEFAULT_TIMEOUT
    }
}

/// Validating builder for [`TriggerInfo`].
#[derive(Debug, Clone)]
pub struct TriggerInfoBuilder {
    info: TriggerInfo,
}

impl TriggerInfoBuilder {
    /// Set the trigger kind.
    pub fn trigger(mut self, trigger: DetectorTrigger) -> Self {
        self.info.trigger = trigger;
        self
    }

    /// Set the per-exposure live time in seconds.
    pub fn livetime_s(mut self, livetime_s: f64) -> Self {
        self.info.livetime_s = livetime_s;
        self
    }

    /// Set the per-exposure dead time in seconds.
    pub fn deadtime_s(mut self, deadtime_s: f64) -> Self {
        self.info.deadtime_s = deadtime_s;
        self
    }

    /// Set the exposures aggregated into each collection.
    pub fn exposures_per_collection(mut self, exposures: u32) -> Self {
        self.info.exposures_per_collection = exposures;
        self
    }

    /// Set the collections aggregated into each event.
    pub fn collections_per_event(mut self, collections: u32) -> Self {
        self.info.collections_per_event = collections;
        self
    }

    /// Set the total event count; `0` means unbounded.
    pub fn number_of_events(mut self, events: u32) -> Self {
        self.info.number_of_events = events;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> AcqResult<TriggerInfo> {
        let info = self.info;
        if info.livetime_s < 0.0 || !info.livetime_s.is_finite() {
            return Err(AcqError::InvalidState(format!(
                "livetime must be a non-negative number of seconds, got {}",
                info.livetime_s
            )));
        }
        if info.deadtime_s < 0.0 || !info.deadtime_s.is_finite() {
            return Err(AcqError::InvalidState(format!(
                "deadtime must be a non-negative number of seconds, got {}",
                info.deadtime_s
            )));
        }
        if info.exposures_per_collection == 0 {
            return Err(AcqError::InvalidState(
                "exposures_per_collection must be at least 1".into(),
            ));
        }
        if info.collections_per_event == 0 {
            return Err(AcqError::InvalidState(
                "collections_per_event must be at least 1".into(),
            ));
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_counts_multiply_through() {
        let info = TriggerInfo::builder()
            .number_of_events(3)
            .collections_per_event(2)
            .exposures_per_collection(4)
            .build()
            .unwrap();

        assert_eq!(info.number_of_collections(), 6);
        assert_eq!(info.number_of_exposures(), 24);
    }

    #[test]
    fn negative_livetime_is_rejected() {
        let result = TriggerInfo::builder().livetime_s(-0.1).build();
        assert!(matches!(result, Err(AcqError::InvalidState(_))));
    }

    #[test]
    fn zero_counts_are_rejected() {
        assert!(TriggerInfo::builder()
            .exposures_per_collection(0)
            .build()
            .is_err());
        assert!(TriggerInfo::builder()
            .collections_per_event(0)
            .build()
            .is_err());
        // Zero events is valid: it means unbounded.
        let info = TriggerInfo::builder().number_of_events(0).build().unwrap();
        assert_eq!(info.number_of_collections(), 0);
    }

    #[test]
    fn provisioning_preference_order() {
        let all = ProvisioningSupport {
            unbounded: true,
            bounded: true,
            single: true,
        };
        assert_eq!(all.preferred(), Some(Provisioning::Unbounded));

        let bounded_or_single = ProvisioningSupport {
            unbounded: false,
            bounded: true,
            single: true,
        };
        assert_eq!(bounded_or_single.preferred(), Some(Provisioning::Bounded));

        assert_eq!(ProvisioningSupport::default().preferred(), None);
    }

    #[test]
    fn trigger_support_is_an_explicit_set() {
        let support = TriggerSupport {
            internal: true,
            external_edge: true,
            external_level: false,
        };
        assert!(support.supports(DetectorTrigger::Internal));
        assert!(support.supports(DetectorTrigger::ExternalEdge));
        assert!(!support.supports(DetectorTrigger::ExternalLevel));
    }
}
