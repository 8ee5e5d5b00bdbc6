//! Observation sink, where per-record progress and outcomes are reported.
//!
//! The forwarder receives its sink at construction. Production uses
//! [`TracingSink`]; tests use [`MemorySink`] to assert on the exact lines.

use std::fmt;
use std::sync::Mutex;

use tracing::{error, info};

/// One line-oriented event about a message being forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Forwarding { key: String },
    Forwarded { key: String, forwarded_id: String },
    Failed { key: String, reason: String },
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forwarding { key } => write!(f, "forwarding message {key}"),
            Self::Forwarded { key, forwarded_id } => {
                write!(f, "successfully forwarded message {key} as {forwarded_id}")
            }
            Self::Failed { key, reason } => write!(f, "failed to forward message {key}: {reason}"),
        }
    }
}

/// Append-only destination for observations. Must tolerate concurrent writers.
pub trait ObservationSink: Send + Sync {
    fn record(&self, observation: Observation);
}

/// Emits each observation as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservationSink for TracingSink {
    fn record(&self, observation: Observation) {
        match &observation {
            Observation::Forwarding { key } => info!(key = %key, "{observation}"),
            Observation::Forwarded { key, forwarded_id } => {
                info!(key = %key, forwarded_id = %forwarded_id, "{observation}")
            }
            Observation::Failed { key, .. } => error!(key = %key, "{observation}"),
        }
    }
}

/// Keeps every observation in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    observations: Mutex<Vec<Observation>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.lock().clone()
    }

    /// Rendered lines, one per observation.
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(ToString::to_string).collect()
    }

    /// True if any rendered line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|o| o.to_string().contains(needle))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Observation>> {
        // A panicking writer can't leave a half-pushed Vec behind.
        self.observations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObservationSink for MemorySink {
    fn record(&self, observation: Observation) {
        self.lock().push(observation);
    }
}
