//! Relays inbound mail from the archive to a fixed forwarding address.

pub mod config;
pub mod error;
pub mod mail;
pub mod observe;
pub mod pipeline;
pub mod server;
pub mod transport;
