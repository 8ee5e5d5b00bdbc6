//! Forward orchestrator. Runs each inbound record through the pipeline.
//!
//! Every record is handled independently; a failure in one is reported to
//! the observation sink and never stops the rest of the batch. The batch
//! itself only fails when it has no records at all.

use std::sync::Arc;

use tracing::debug;

use crate::config::ForwarderConfig;
use crate::error::{ForwardError, HandlerError};
use crate::mail::rewrite::{RewriteContext, rewrite_message};
use crate::observe::{Observation, ObservationSink};
use crate::pipeline::types::{Disposition, MessageRecord, Outcome, SesEvent};
use crate::pipeline::validation::ValidationGate;
use crate::transport::{BounceIssuer, MailTransmitter, MessageStore};

/// External collaborators the forwarder is wired to.
pub struct ForwarderDeps {
    pub store: Arc<dyn MessageStore>,
    pub transmitter: Arc<dyn MailTransmitter>,
    pub bounce_issuer: Arc<dyn BounceIssuer>,
    pub sink: Arc<dyn ObservationSink>,
}

/// Validates, fetches, rewrites and resends inbound messages.
pub struct Forwarder {
    config: ForwarderConfig,
    store: Arc<dyn MessageStore>,
    transmitter: Arc<dyn MailTransmitter>,
    gate: ValidationGate,
    sink: Arc<dyn ObservationSink>,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig, deps: ForwarderDeps) -> Self {
        let gate = ValidationGate::new(deps.bounce_issuer, config.email_domain_name.clone());
        Self {
            config,
            store: deps.store,
            transmitter: deps.transmitter,
            gate,
            sink: deps.sink,
        }
    }

    /// Entry point for one inbound event.
    ///
    /// Always asks the dispatcher to stop evaluating further rules, whatever
    /// happened to the individual records.
    pub async fn handle_event(&self, event: &SesEvent) -> Result<Disposition, HandlerError> {
        let records: Vec<&MessageRecord> = event.records.iter().map(|r| &r.ses).collect();
        self.process_batch(&records).await?;
        Ok(Disposition::stop_rule_set())
    }

    /// Process every record in order and return one outcome per record.
    pub async fn process_batch(
        &self,
        records: &[&MessageRecord],
    ) -> Result<Vec<Outcome>, HandlerError> {
        if records.is_empty() {
            return Err(HandlerError::EmptyBatch);
        }

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            outcomes.push(self.process_message(record).await);
        }

        debug!(
            forwarded = outcomes.iter().filter(|o| o.is_forwarded()).count(),
            total = outcomes.len(),
            "Batch complete"
        );
        Ok(outcomes)
    }

    /// Run one record through validate → fetch → rewrite → send.
    pub async fn process_message(&self, record: &MessageRecord) -> Outcome {
        let key = self.config.message_key(record.message_id());
        self.sink.record(Observation::Forwarding { key: key.clone() });

        let result = self.forward(record, &key).await;
        self.sink.record(match &result {
            Ok(forwarded_id) => Observation::Forwarded {
                key: key.clone(),
                forwarded_id: forwarded_id.clone(),
            },
            Err(e) => Observation::Failed {
                key: key.clone(),
                reason: e.to_string(),
            },
        });

        Outcome { key, result }
    }

    async fn forward(&self, record: &MessageRecord, key: &str) -> Result<String, ForwardError> {
        self.gate.validate(record).await?;
        let original = self.get_original_message(key).await?;
        let updated = self.update_message(&original, key)?;
        self.forward_message(&updated).await
    }

    /// Fetch the archived original.
    pub async fn get_original_message(&self, key: &str) -> Result<Vec<u8>, ForwardError> {
        self.store
            .fetch(&self.config.bucket_name, key)
            .await
            .map_err(ForwardError::Storage)
    }

    /// Rewrite the original's headers for relaying.
    pub fn update_message(&self, original: &[u8], key: &str) -> Result<Vec<u8>, ForwardError> {
        let ctx = RewriteContext {
            sender_address: self.config.sender_address.clone(),
            bucket_name: self.config.bucket_name.clone(),
            message_key: key.to_string(),
        };
        rewrite_message(original, &ctx)
    }

    /// Send the rewritten message to the forwarding address.
    pub async fn forward_message(&self, message: &[u8]) -> Result<String, ForwardError> {
        self.transmitter
            .send(
                std::slice::from_ref(&self.config.forwarding_address),
                &self.config.configuration_set,
                message,
            )
            .await
            .map_err(ForwardError::Send)
    }
}
