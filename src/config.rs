//! Configuration types.
//!
//! Every setting is read through a lookup function rather than directly from
//! `std::env`, so tests can supply a map instead of mutating the process
//! environment.

use std::net::SocketAddr;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Settings the forwarding pipeline cannot run without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// Bucket holding the archived inbound messages.
    pub bucket_name: String,
    /// Key prefix under which the receiving service archives messages.
    pub incoming_prefix: String,
    /// Domain used for the bounce sender and reporting MTA.
    pub email_domain_name: String,
    /// Address substituted into the rewritten From header.
    pub sender_address: String,
    /// The single destination every accepted message is forwarded to.
    pub forwarding_address: String,
    /// Configuration set attached to every outbound send.
    pub configuration_set: String,
}

impl ForwarderConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build config from an arbitrary lookup, reporting every missing name at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = Environment {
            lookup,
            undefined: Vec::new(),
        };

        let config = Self {
            bucket_name: env.required("BUCKET_NAME"),
            incoming_prefix: env.required("INCOMING_PREFIX"),
            email_domain_name: env.required("EMAIL_DOMAIN_NAME"),
            sender_address: env.required("SENDER_ADDRESS"),
            forwarding_address: env.required("FORWARDING_ADDRESS"),
            configuration_set: env.required("CONFIGURATION_SET"),
        };

        if env.undefined.is_empty() {
            Ok(config)
        } else {
            Err(ConfigError::UndefinedEnvVars(env.undefined))
        }
    }

    /// Archive key for a message id. Always derived, never stored.
    pub fn message_key(&self, message_id: &str) -> String {
        format!("{}/{}", self.incoming_prefix, message_id)
    }
}

struct Environment<F> {
    lookup: F,
    undefined: Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> Environment<F> {
    fn required(&mut self, name: &str) -> String {
        match self.optional(name) {
            Some(value) => value,
            None => {
                self.undefined.push(name.to_string());
                String::new()
            }
        }
    }

    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }
}

/// Where archived messages are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// `<root>/<bucket>/<key>` on the local filesystem.
    Directory(std::path::PathBuf),
    /// Path-style object URLs: `<base>/<bucket>/<key>`.
    Http(String),
}

/// Settings for the production transport adapters.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub store: StoreLocation,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub listen_addr: SocketAddr,
}

impl TransportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Environment {
            lookup,
            undefined: Vec::new(),
        };

        let store_url = env
            .optional("MESSAGE_STORE_URL")
            .unwrap_or_else(|| "https://s3.amazonaws.com".to_string());
        let store = if let Some(path) = store_url.strip_prefix("file://") {
            StoreLocation::Directory(path.into())
        } else if store_url.starts_with("http://") || store_url.starts_with("https://") {
            StoreLocation::Http(store_url.trim_end_matches('/').to_string())
        } else {
            return Err(ConfigError::InvalidValue {
                key: "MESSAGE_STORE_URL".into(),
                message: format!("unsupported scheme in {store_url}"),
            });
        };

        let smtp_port = match env.optional("SMTP_PORT") {
            Some(port) => port.parse().map_err(|e| ConfigError::InvalidValue {
                key: "SMTP_PORT".into(),
                message: format!("{e}"),
            })?,
            None => 587,
        };

        let listen_addr = env
            .optional("FORWARDER_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let listen_addr = listen_addr
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "FORWARDER_LISTEN_ADDR".into(),
                message: format!("{e}"),
            })?;

        Ok(Self {
            store,
            smtp_host: env.optional("SMTP_HOST"),
            smtp_port,
            smtp_username: env.optional("SMTP_USERNAME"),
            smtp_password: env.optional("SMTP_PASSWORD").map(SecretString::from),
            listen_addr,
        })
    }
}
