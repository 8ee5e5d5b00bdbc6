use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::io::AsyncReadExt;

use ses_forwarder::config::{ForwarderConfig, StoreLocation, TransportConfig};
use ses_forwarder::observe::TracingSink;
use ses_forwarder::pipeline::{Forwarder, ForwarderDeps, SesEvent};
use ses_forwarder::server;
use ses_forwarder::transport::smtp::SmtpSettings;
use ses_forwarder::transport::{FsMessageStore, HttpMessageStore, MessageStore, SmtpMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage. Fails only if one
    // is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let event_source = parse_args(std::env::args().skip(1))?;

    let config = ForwarderConfig::from_env()?;
    let transport = TransportConfig::from_env()?;

    // ── Adapters ────────────────────────────────────────────────────────
    let store: Arc<dyn MessageStore> = match &transport.store {
        StoreLocation::Directory(root) => {
            tracing::info!(root = %root.display(), "Reading archived messages from disk");
            Arc::new(FsMessageStore::new(root.clone()))
        }
        StoreLocation::Http(base) => {
            tracing::info!(base = %base, "Reading archived messages over HTTP");
            Arc::new(HttpMessageStore::new(base.clone()))
        }
    };

    let Some(smtp_host) = transport.smtp_host.clone() else {
        bail!("undefined environment variables: SMTP_HOST");
    };
    let mailer = Arc::new(
        SmtpMailer::new(&SmtpSettings {
            host: smtp_host,
            port: transport.smtp_port,
            username: transport.smtp_username.clone(),
            password: transport.smtp_password.clone(),
            envelope_sender: config.sender_address.clone(),
        })
        .context("Failed to configure SMTP transport")?,
    );

    let forwarder = Arc::new(Forwarder::new(
        config,
        ForwarderDeps {
            store,
            transmitter: mailer.clone(),
            bounce_issuer: mailer,
            sink: Arc::new(TracingSink),
        },
    ));

    // ── One-shot ────────────────────────────────────────────────────────
    if let Some(source) = event_source {
        let raw = read_event(&source).await?;
        let event: SesEvent =
            serde_json::from_slice(&raw).with_context(|| format!("Invalid event in {source}"))?;
        let disposition = forwarder.handle_event(&event).await?;
        println!("{}", serde_json::to_string(&disposition)?);
        return Ok(());
    }

    // ── Server ──────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(transport.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", transport.listen_addr))?;
    tracing::info!(addr = %transport.listen_addr, "Forwarder listening");
    axum::serve(listener, server::routes(forwarder)).await?;

    Ok(())
}

/// Returns the `--event` source, if one was given.
fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<String>> {
    let mut event = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--event" => match args.next() {
                Some(source) => event = Some(source),
                None => bail!("--event requires a file path or '-'"),
            },
            "-h" | "--help" => {
                eprintln!("Usage: ses-forwarder [--event <file|->]");
                std::process::exit(0);
            }
            other => bail!("unrecognized argument: {other}"),
        }
    }
    Ok(event)
}

async fn read_event(source: &str) -> anyhow::Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("Failed to read event from stdin")?;
        return Ok(buf);
    }
    tokio::fs::read(source)
        .await
        .with_context(|| format!("Failed to read event from {source}"))
}
