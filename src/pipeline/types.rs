//! Shared types for the forwarding pipeline.
//!
//! The inbound shapes mirror the receipt-rule event the mail-receiving
//! service delivers; only the fields the pipeline reads are modelled.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ForwardError;

// ── Verdicts ────────────────────────────────────────────────────────

/// Outcome of one authentication or content check. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Gray,
    ProcessingFailed,
    #[default]
    Unspecified,
}

impl Verdict {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "PASS" => Self::Pass,
            "FAIL" => Self::Fail,
            "GRAY" => Self::Gray,
            "PROCESSING_FAILED" => Self::ProcessingFailed,
            _ => Self::Unspecified,
        }
    }

    pub fn is_fail(self) -> bool {
        self == Self::Fail
    }
}

/// `{"status": "PASS"}` on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictField(pub Verdict);

impl<'de> Deserialize<'de> for VerdictField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            status: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self(Verdict::parse(&raw.status)))
    }
}

/// Policy the sending domain publishes for DMARC failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DmarcPolicy {
    None,
    Quarantine,
    Reject,
    #[default]
    Unspecified,
}

impl DmarcPolicy {
    pub fn parse(policy: &str) -> Self {
        match policy.trim().to_ascii_uppercase().as_str() {
            "NONE" => Self::None,
            "QUARANTINE" => Self::Quarantine,
            "REJECT" => Self::Reject,
            _ => Self::Unspecified,
        }
    }
}

impl<'de> Deserialize<'de> for DmarcPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Self::parse(&s)).unwrap_or_default())
    }
}

// ── Inbound batch ───────────────────────────────────────────────────

/// One invocation's worth of inbound message notifications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SesEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<SesRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesRecord {
    #[serde(default)]
    pub event_source: String,
    #[serde(default)]
    pub event_version: String,
    pub ses: MessageRecord,
}

/// Everything the pipeline knows about one inbound message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageRecord {
    #[serde(default)]
    pub mail: MailInfo,
    #[serde(default)]
    pub receipt: Receipt,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailInfo {
    /// Opaque id assigned by the receiving service; also the archive object name.
    #[serde(default)]
    pub message_id: String,
    /// Envelope sender (MAIL FROM).
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub destination: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub spf_verdict: VerdictField,
    #[serde(default)]
    pub dkim_verdict: VerdictField,
    #[serde(default)]
    pub spam_verdict: VerdictField,
    #[serde(default)]
    pub virus_verdict: VerdictField,
    #[serde(default)]
    pub dmarc_verdict: VerdictField,
    #[serde(default)]
    pub dmarc_policy: DmarcPolicy,
}

impl MessageRecord {
    /// Convenience constructor for a record with all verdicts unspecified.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            mail: MailInfo {
                message_id: message_id.into(),
                ..Default::default()
            },
            receipt: Receipt::default(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.mail.message_id
    }

    pub fn recipients(&self) -> &[String] {
        &self.receipt.recipients
    }
}

// ── Disposition ─────────────────────────────────────────────────────

/// Signal returned to the upstream dispatcher after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispositionValue {
    Continue,
    StopRule,
    StopRuleSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disposition {
    pub disposition: DispositionValue,
}

impl Disposition {
    /// Stop evaluating any further rules for this inbound message.
    pub fn stop_rule_set() -> Self {
        Self {
            disposition: DispositionValue::StopRuleSet,
        }
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Per-record result. Drives observation only; never persisted.
#[derive(Debug)]
pub struct Outcome {
    /// Archive key of the message this outcome is for.
    pub key: String,
    pub result: Result<String, ForwardError>,
}

impl Outcome {
    pub fn is_forwarded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn forwarded_id(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(id) => write!(f, "successfully forwarded message {} as {id}", self.key),
            Err(e) => write!(f, "failed to forward message {}: {e}", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "Records": [{
            "eventSource": "aws:ses",
            "eventVersion": "1.0",
            "ses": {
                "mail": {
                    "timestamp": "2024-01-15T10:00:00.000Z",
                    "source": "sender@example.com",
                    "messageId": "deadbeef",
                    "destination": ["inbox@foo.com"]
                },
                "receipt": {
                    "recipients": ["inbox@foo.com"],
                    "spamVerdict": {"status": "PASS"},
                    "virusVerdict": {"status": "pass"},
                    "spfVerdict": {"status": "GRAY"},
                    "dkimVerdict": {"status": "PROCESSING_FAILED"},
                    "dmarcVerdict": {"status": "fail"},
                    "dmarcPolicy": "reject"
                }
            }
        }]
    }"#;

    #[test]
    fn verdict_parses_case_insensitively() {
        assert_eq!(Verdict::parse("fail"), Verdict::Fail);
        assert_eq!(Verdict::parse("FAIL"), Verdict::Fail);
        assert_eq!(Verdict::parse("Pass"), Verdict::Pass);
        assert_eq!(Verdict::parse("gray"), Verdict::Gray);
        assert_eq!(Verdict::parse("processing_failed"), Verdict::ProcessingFailed);
        assert_eq!(Verdict::parse(""), Verdict::Unspecified);
        assert_eq!(Verdict::parse("bogus"), Verdict::Unspecified);
    }

    #[test]
    fn dmarc_policy_parses_case_insensitively() {
        assert_eq!(DmarcPolicy::parse("reject"), DmarcPolicy::Reject);
        assert_eq!(DmarcPolicy::parse("QUARANTINE"), DmarcPolicy::Quarantine);
        assert_eq!(DmarcPolicy::parse("None"), DmarcPolicy::None);
        assert_eq!(DmarcPolicy::parse(""), DmarcPolicy::Unspecified);
    }

    #[test]
    fn deserializes_receipt_event() {
        let event: SesEvent = serde_json::from_str(EVENT).unwrap();
        assert_eq!(event.records.len(), 1);

        let record = &event.records[0].ses;
        assert_eq!(record.message_id(), "deadbeef");
        assert_eq!(record.mail.source, "sender@example.com");
        assert_eq!(record.recipients(), ["inbox@foo.com"]);
        assert_eq!(record.receipt.spam_verdict.0, Verdict::Pass);
        assert_eq!(record.receipt.virus_verdict.0, Verdict::Pass);
        assert_eq!(record.receipt.spf_verdict.0, Verdict::Gray);
        assert_eq!(record.receipt.dkim_verdict.0, Verdict::ProcessingFailed);
        assert_eq!(record.receipt.dmarc_verdict.0, Verdict::Fail);
        assert_eq!(record.receipt.dmarc_policy, DmarcPolicy::Reject);
    }

    #[test]
    fn missing_fields_default_to_unspecified() {
        let event: SesEvent =
            serde_json::from_str(r#"{"Records": [{"ses": {"mail": {"messageId": "x"}}}]}"#)
                .unwrap();
        let receipt = &event.records[0].ses.receipt;
        assert!(receipt.recipients.is_empty());
        assert_eq!(receipt.dmarc_verdict.0, Verdict::Unspecified);
        assert_eq!(receipt.dmarc_policy, DmarcPolicy::Unspecified);

        let empty: SesEvent = serde_json::from_str("{}").unwrap();
        assert!(empty.records.is_empty());
    }

    #[test]
    fn disposition_serialization() {
        let json = serde_json::to_value(Disposition::stop_rule_set()).unwrap();
        assert_eq!(json, serde_json::json!({"disposition": "STOP_RULE_SET"}));
    }

    #[test]
    fn disposition_values_use_dispatcher_spelling() {
        for (value, wire) in [
            (DispositionValue::Continue, "CONTINUE"),
            (DispositionValue::StopRule, "STOP_RULE"),
            (DispositionValue::StopRuleSet, "STOP_RULE_SET"),
        ] {
            let disposition = Disposition { disposition: value };
            let json = serde_json::to_value(disposition).unwrap();
            assert_eq!(json, serde_json::json!({ "disposition": wire }));
            assert_eq!(serde_json::from_value::<Disposition>(json).unwrap(), disposition);
        }
    }

    #[test]
    fn outcome_display_lines() {
        let ok = Outcome {
            key: "incoming/deadbeef".into(),
            result: Ok("fwd-id".into()),
        };
        assert_eq!(
            ok.to_string(),
            "successfully forwarded message incoming/deadbeef as fwd-id"
        );
        assert_eq!(ok.forwarded_id(), Some("fwd-id"));

        let failed = Outcome {
            key: "incoming/deadbeef".into(),
            result: Err(ForwardError::MarkedAsSpam),
        };
        assert_eq!(
            failed.to_string(),
            "failed to forward message incoming/deadbeef: marked as spam, ignoring"
        );
        assert!(!failed.is_forwarded());
    }
}
