//! Custom error types for the library.
//!
//! This module defines the primary error type, `AcqError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to
//! handle the different kinds of failures hardware orchestration can produce,
//! from connection problems to state-machine misuse.
//!
//! ## Error Hierarchy
//!
//! `AcqError` is an enum that consolidates the failure categories:
//!
//! - **`NotConnected`**: a device or signal tree failed to connect. Carries a
//!   [`ConnectError`] tree mapping child names to causes, recursively, so a
//!   failure deep in a sub-device is reported with its full path.
//! - **`Timeout`**: an operation did not complete within its configured budget.
//!   Tagged with the signal address so a hung control point can be identified.
//! - **`InvalidState`**: an operation was invoked before its prerequisite state
//!   existed (e.g. `complete` before `kickoff`, or registering a second backend
//!   callback while one is set).
//! - **`UnsupportedCapability`**: a requested trigger kind, multi-exposure mode,
//!   or multi-collection request is not supported by the supplied strategy.
//! - **`Protocol`**: surfaced unchanged from a backend implementation.
//! - **`Cancelled`**: the operation observed its cancellation token.
//!
//! The enum is `Clone` so a terminal [`Status`](crate::status::Status) can hand
//! the captured error to any number of observers.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type AcqResult<T> = std::result::Result<T, AcqError>;

/// Failure categories for device connection, signal access, and acquisition.
#[derive(Error, Debug, Clone)]
pub enum AcqError {
    /// A device/signal tree failed to connect; see the inner tree for causes.
    #[error("connect failed:\n{0}")]
    NotConnected(ConnectError),

    /// An operation exceeded its configured budget.
    #[error("operation on {source_id} timed out after {timeout:?}")]
    Timeout {
        /// Address of the signal the operation targeted.
        source_id: String,
        /// The budget that was exceeded.
        timeout: Duration,
    },

    /// An operation was invoked before its prerequisite state existed.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The supplied strategy does not implement the requested behavior.
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// An error surfaced unchanged from a protocol backend.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation was cancelled via its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
}

/// Recursive name-to-cause mapping produced by an aggregated connect.
///
/// Every child of a device is attempted even when siblings fail; the failures
/// are collected into one tree before raising, so a caller sees the complete
/// picture of what could not connect.
#[derive(Debug, Clone)]
pub enum ConnectError {
    /// A leaf failure (one signal or childless device).
    Leaf(Box<AcqError>),
    /// Failures of one or more named children.
    Tree(BTreeMap<String, ConnectError>),
}

impl ConnectError {
    /// Wrap a single error as a leaf node.
    pub fn leaf(err: AcqError) -> Self {
        ConnectError::Leaf(Box::new(err))
    }

    /// Dotted paths of every failing leaf, with its cause.
    ///
    /// A failure of child `motor`'s child `readback` reports as
    /// `"motor.readback"`.
    pub fn failures(&self) -> Vec<(String, &AcqError)> {
        let mut out = Vec::new();
        self.collect_failures("", &mut out);
        out
    }

    fn collect_failures<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a AcqError)>) {
        match self {
            ConnectError::Leaf(err) => out.push((prefix.to_string(), err.as_ref())),
            ConnectError::Tree(children) => {
                for (name, child) in children {
                    let path = if prefix.is_empty() {
                        name.clone()
                    } else {
                        format!("{prefix}.{name}")
                    };
                    child.collect_failures(&path, out);
                }
            }
        }
    }
}

impl From<AcqError> for ConnectError {
    fn from(err: AcqError) -> Self {
        match err {
            // A child that itself aggregated failures nests as a subtree so
            // the full path to each leaf survives.
            AcqError::NotConnected(tree) => tree,
            other => ConnectError::leaf(other),
        }
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, cause) in self.failures() {
            if path.is_empty() {
                writeln!(f, "  {cause}")?;
            } else {
                writeln!(f, "  {path}: {cause}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(entries: Vec<(&str, ConnectError)>) -> ConnectError {
        ConnectError::Tree(
            entries
                .into_iter()
                .map(|(name, err)| (name.to_string(), err))
                .collect(),
        )
    }

    #[test]
    fn failures_report_full_paths() {
        let inner = tree_of(vec![(
            "readback",
            ConnectError::leaf(AcqError::Protocol("no such channel".into())),
        )]);
        let outer = tree_of(vec![
            ("motor", inner),
            (
                "shutter",
                ConnectError::leaf(AcqError::Timeout {
                    source_id: "ca://SHUTTER:OPEN".into(),
                    timeout: Duration::from_secs(10),
                }),
            ),
        ]);

        let failures = outer.failures();
        let paths: Vec<&str> = failures.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["motor.readback", "shutter"]);
    }

    #[test]
    fn display_names_every_failing_child() {
        let err = AcqError::NotConnected(tree_of(vec![
            (
                "det",
                ConnectError::leaf(AcqError::Protocol("refused".into())),
            ),
            (
                "stage",
                ConnectError::leaf(AcqError::Protocol("refused".into())),
            ),
        ]));
        let rendered = err.to_string();
        assert!(rendered.contains("det"));
        assert!(rendered.contains("stage"));
    }

    #[test]
    fn nested_not_connected_flattens_into_parent_tree() {
        let child_err = AcqError::NotConnected(tree_of(vec![(
            "gain",
            ConnectError::leaf(AcqError::Protocol("bad PV".into())),
        )]));
        let as_connect: ConnectError = child_err.into();
        let failures = as_connect.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "gain");
    }
}
