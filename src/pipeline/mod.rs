//! Inbound-event pipeline: event types, the validation gate, and the
//! orchestrator that drives each record through fetch, rewrite and send.

pub mod forwarder;
pub mod types;
pub mod validation;

pub use forwarder::{Forwarder, ForwarderDeps};
pub use types::{Disposition, MessageRecord, Outcome, SesEvent};
pub use validation::{Validation, ValidationGate};
