//! Outbound mail over SMTP via lettre.
//!
//! Forwarded messages go out exactly as rewritten, with the configuration-set
//! header the mail API's SMTP interface reads. Bounces are composed as a
//! delivery-status notification addressed to the original envelope sender.

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use uuid::Uuid;

use super::{BounceIssuer, BounceRequest, MailTransmitter};
use crate::error::TransportError;

/// Header the mail API's SMTP endpoint uses to select a configuration set.
const CONFIGURATION_SET_HEADER: &str = "X-SES-CONFIGURATION-SET";

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Envelope MAIL FROM for forwarded messages.
    pub envelope_sender: String,
}

/// Mail transmitter and bounce issuer backed by one SMTP relay.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    envelope_sender: Address,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, TransportError> {
        let mut builder = SmtpTransport::starttls_relay(&settings.host)
            .map_err(|e| TransportError::Smtp(format!("SMTP relay error: {e}")))?
            .port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        let envelope_sender = settings
            .envelope_sender
            .parse()
            .map_err(|e| TransportError::Smtp(format!("Invalid sender address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            envelope_sender,
        })
    }

    async fn send_blocking<F, T>(&self, op: F) -> Result<T, TransportError>
    where
        F: FnOnce(&SmtpTransport) -> Result<T, lettre::transport::smtp::Error> + Send + 'static,
        T: Send + 'static,
    {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || op(&transport))
            .await
            .map_err(|e| TransportError::Smtp(format!("SMTP task panicked: {e}")))?
            .map_err(|e| TransportError::Smtp(e.to_string()))
    }
}

#[async_trait]
impl MailTransmitter for SmtpMailer {
    async fn send(
        &self,
        destinations: &[String],
        configuration_set: &str,
        raw_message: &[u8],
    ) -> Result<String, TransportError> {
        let to = destinations
            .iter()
            .map(|d| {
                d.parse::<Address>()
                    .map_err(|e| TransportError::Smtp(format!("Invalid destination {d}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let envelope = Envelope::new(Some(self.envelope_sender.clone()), to)
            .map_err(|e| TransportError::Smtp(e.to_string()))?;
        let data = with_configuration_set(configuration_set, raw_message);

        let response = self
            .send_blocking(move |t| t.send_raw(&envelope, &data))
            .await?;

        let first_line = response.message().next().map(str::to_string);
        debug!(response = ?first_line, "SMTP relay accepted message");
        queued_id(first_line.as_deref())
            .ok_or_else(|| TransportError::Smtp("relay reply carried no message id".into()))
    }
}

#[async_trait]
impl BounceIssuer for SmtpMailer {
    async fn bounce(&self, request: &BounceRequest) -> Result<String, TransportError> {
        let (message, bounce_id) = build_bounce_message(request)?;
        self.send_blocking(move |t| t.send(&message)).await?;
        info!(bounce_id = %bounce_id, "Bounce notification sent");
        Ok(bounce_id)
    }
}

/// Prepend the configuration-set header to a raw message.
pub fn with_configuration_set(configuration_set: &str, raw_message: &[u8]) -> Vec<u8> {
    let header = format!("{CONFIGURATION_SET_HEADER}: {configuration_set}\r\n");
    let mut data = Vec::with_capacity(header.len() + raw_message.len());
    data.extend_from_slice(header.as_bytes());
    data.extend_from_slice(raw_message);
    data
}

/// Pull the queued-message id out of a relay's `250` reply text.
///
/// `Ok 0100018d...-000000` and `2.0.0 Ok: queued as 4F2B1C` both end in the id.
pub fn queued_id(reply: Option<&str>) -> Option<String> {
    reply?
        .split_whitespace()
        .last()
        .filter(|token| !token.eq_ignore_ascii_case("ok"))
        .map(str::to_string)
}

/// Body of the `message/delivery-status` part.
pub fn delivery_status(request: &BounceRequest) -> String {
    let mut lines = vec![
        format!("Reporting-MTA: {}", request.reporting_mta),
        format!("Original-Envelope-Id: {}", request.original_message_id),
        format!("Arrival-Date: {}", request.arrival_date.to_rfc2822()),
    ];
    for recipient in &request.recipients {
        lines.push(String::new());
        lines.push(format!("Final-Recipient: rfc822; {}", recipient.recipient));
        lines.push("Action: failed".to_string());
        lines.push(format!("Status: {}", recipient.bounce_type.status_code()));
        lines.push(format!(
            "Diagnostic-Code: smtp; 550 {} {}",
            recipient.bounce_type.status_code(),
            recipient.bounce_type.description()
        ));
    }
    lines.push(String::new());
    lines.join("\r\n")
}

fn build_bounce_message(request: &BounceRequest) -> Result<(Message, String), TransportError> {
    let return_path = request
        .return_path
        .as_deref()
        .ok_or_else(|| TransportError::Other("no return path to bounce to".into()))?;

    let from: Mailbox = request
        .bounce_sender
        .parse()
        .map_err(|e| TransportError::Smtp(format!("Invalid bounce sender: {e}")))?;
    let to: Mailbox = return_path
        .parse()
        .map_err(|e| TransportError::Smtp(format!("Invalid return path {return_path}: {e}")))?;

    let domain = request
        .bounce_sender
        .rsplit_once('@')
        .map_or("localhost", |(_, d)| d);
    let bounce_id = format!("{}@{domain}", Uuid::new_v4());

    let status_type = ContentType::parse("message/delivery-status")
        .map_err(|e| TransportError::Other(e.to_string()))?;

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject("Delivery Status Notification (Failure)")
        .message_id(Some(format!("<{bounce_id}>")))
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(request.explanation.clone()))
                .singlepart(
                    SinglePart::builder()
                        .header(status_type)
                        .body(delivery_status(request)),
                ),
        )
        .map_err(|e| TransportError::Smtp(format!("Failed to build bounce: {e}")))?;

    Ok((message, bounce_id))
}
