//! Capability interfaces for the external collaborators.
//!
//! The pipeline only ever sees these traits. Production adapters live in the
//! submodules; tests supply recording doubles.

pub mod smtp;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TransportError;

pub use smtp::SmtpMailer;
pub use store::{FsMessageStore, HttpMessageStore};

/// Fetches archived raw messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Return the full raw message stored at `bucket`/`key`.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, TransportError>;
}

/// Submits raw messages through the outbound mail API.
#[async_trait]
pub trait MailTransmitter: Send + Sync {
    /// Send `raw_message` as-is and return the id the mail API assigned it.
    async fn send(
        &self,
        destinations: &[String],
        configuration_set: &str,
        raw_message: &[u8],
    ) -> Result<String, TransportError>;
}

/// Issues non-delivery notifications back toward the original sender.
#[async_trait]
pub trait BounceIssuer: Send + Sync {
    /// Issue the bounce and return the id of the notification message.
    async fn bounce(&self, request: &BounceRequest) -> Result<String, TransportError>;
}

/// Reason code attached to each bounced recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceType {
    ContentRejected,
}

impl BounceType {
    /// Enhanced status code reported in the delivery-status notification.
    pub fn status_code(self) -> &'static str {
        match self {
            Self::ContentRejected => "5.7.1",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ContentRejected => "content rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BouncedRecipient {
    pub recipient: String,
    pub bounce_type: BounceType,
}

/// Everything needed to bounce one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BounceRequest {
    /// `mailer-daemon@<domain>`.
    pub bounce_sender: String,
    pub original_message_id: String,
    /// `dns; <domain>`.
    pub reporting_mta: String,
    /// Whole seconds only.
    pub arrival_date: DateTime<Utc>,
    pub explanation: String,
    pub recipients: Vec<BouncedRecipient>,
    /// Envelope sender of the original message, when the event carried one.
    pub return_path: Option<String>,
}
