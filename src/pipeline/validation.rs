//! Validation gate: decides whether an inbound message may be forwarded.
//!
//! Runs before anything is fetched from the archive:
//! - DMARC fail under a `reject` policy → bounce, don't forward
//! - any SPF/DKIM/spam/virus fail → drop silently, no bounce
//! - otherwise → pass

use std::sync::Arc;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use tracing::{debug, info};

use crate::error::ForwardError;
use crate::pipeline::types::{DmarcPolicy, MessageRecord, Receipt};
use crate::transport::{BounceIssuer, BounceRequest, BounceType, BouncedRecipient};

/// Explanation attached to every DMARC bounce.
pub const DMARC_EXPLANATION: &str =
    "Unauthenticated email is not accepted due to the sending domain's DMARC policy.";

/// Terminal state of the gate for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Passed,
    Bounced { bounce_id: String },
    Rejected,
}

impl Validation {
    /// Convert a terminal rejection into the per-record failure it reports.
    pub fn into_result(self) -> Result<(), ForwardError> {
        match self {
            Self::Passed => Ok(()),
            Self::Bounced { bounce_id } => Err(ForwardError::Bounced { bounce_id }),
            Self::Rejected => Err(ForwardError::MarkedAsSpam),
        }
    }
}

/// True when the sending domain asked receivers to reject DMARC failures.
pub fn dmarc_requires_bounce(receipt: &Receipt) -> bool {
    receipt.dmarc_verdict.0.is_fail() && receipt.dmarc_policy == DmarcPolicy::Reject
}

/// True when any of the SPF, DKIM, spam or virus checks failed.
pub fn is_spam(receipt: &Receipt) -> bool {
    [
        receipt.spf_verdict,
        receipt.dkim_verdict,
        receipt.spam_verdict,
        receipt.virus_verdict,
    ]
    .iter()
    .any(|v| v.0.is_fail())
}

/// Build the bounce for a record, one content-rejected entry per recipient.
pub fn bounce_request(
    record: &MessageRecord,
    email_domain_name: &str,
    now: DateTime<Utc>,
) -> BounceRequest {
    let arrival_date = now
        .duration_trunc(TimeDelta::seconds(1))
        .unwrap_or(now);

    BounceRequest {
        bounce_sender: format!("mailer-daemon@{email_domain_name}"),
        original_message_id: record.message_id().to_string(),
        reporting_mta: format!("dns; {email_domain_name}"),
        arrival_date,
        explanation: DMARC_EXPLANATION.to_string(),
        recipients: record
            .recipients()
            .iter()
            .map(|r| BouncedRecipient {
                recipient: r.clone(),
                bounce_type: BounceType::ContentRejected,
            })
            .collect(),
        return_path: Some(record.mail.source.clone()).filter(|s| !s.is_empty()),
    }
}

/// Classifies inbound records and issues DMARC bounces.
pub struct ValidationGate {
    bounce_issuer: Arc<dyn BounceIssuer>,
    email_domain_name: String,
}

impl ValidationGate {
    pub fn new(bounce_issuer: Arc<dyn BounceIssuer>, email_domain_name: impl Into<String>) -> Self {
        Self {
            bounce_issuer,
            email_domain_name: email_domain_name.into(),
        }
    }

    /// Run the gate. Only a failed bounce is an error here; bounced and
    /// rejected records are ordinary outcomes.
    pub async fn check(&self, record: &MessageRecord) -> Result<Validation, ForwardError> {
        if let Some(bounce_id) = self.bounce_if_dmarc_fails(record).await? {
            return Ok(Validation::Bounced { bounce_id });
        }
        if is_spam(&record.receipt) {
            debug!(message_id = %record.message_id(), "Rejecting message with failed verdict");
            return Ok(Validation::Rejected);
        }
        Ok(Validation::Passed)
    }

    /// Run the gate and fold bounced/rejected into the record's failure.
    pub async fn validate(&self, record: &MessageRecord) -> Result<(), ForwardError> {
        self.check(record).await?.into_result()
    }

    /// Issue a bounce if DMARC failed under a `reject` policy.
    ///
    /// Returns the bounce message id, or `None` when no bounce was needed.
    pub async fn bounce_if_dmarc_fails(
        &self,
        record: &MessageRecord,
    ) -> Result<Option<String>, ForwardError> {
        if !dmarc_requires_bounce(&record.receipt) {
            return Ok(None);
        }

        let request = bounce_request(record, &self.email_domain_name, Utc::now());
        let bounce_id = self
            .bounce_issuer
            .bounce(&request)
            .await
            .map_err(ForwardError::BounceFailed)?;

        info!(
            message_id = %record.message_id(),
            bounce_id = %bounce_id,
            recipients = request.recipients.len(),
            "DMARC bounce issued"
        );
        Ok(Some(bounce_id))
    }
}
