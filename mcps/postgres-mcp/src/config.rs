//! Connection configuration and credential resolution
//!
//! Credentials arrive in exactly one of two ways, fixed at startup:
//! either once from the environment/CLI (fixed-credential mode) or attached
//! to every tool call (per-call mode). `CredentialSource::resolve` is the
//! single step that turns either source into the `ConnectionConfig` the
//! connection provider consumes, so the executors never care which mode the
//! server runs in.

use std::str::FromStr;

use sqlx::postgres::PgConnectOptions;

use crate::error::{AdapterError, AdapterResult};
use crate::params::ConnectionArgs;

/// Complete credentials for one PostgreSQL connection
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ConnectionConfig {
    /// Build a config, rejecting empty or missing fields
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> AdapterResult<Self> {
        let config = Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
        };
        let missing = config.missing_fields();
        if missing.is_empty() {
            Ok(config)
        } else {
            Err(AdapterError::Config(missing.join(", ")))
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.url.is_empty() {
            missing.push("url");
        }
        if self.username.is_empty() {
            missing.push("username");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        missing
    }

    /// Driver connect options for this config
    pub fn pg_options(&self) -> AdapterResult<PgConnectOptions> {
        let options = PgConnectOptions::from_str(&self.url).map_err(AdapterError::Connection)?;
        Ok(options
            .username(&self.username)
            .password(&self.password))
    }
}

/// Where each request's credentials come from
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// One immutable config supplied at process start
    Fixed(ConnectionConfig),
    /// Credentials carried in every tool call's arguments
    PerCall,
}

impl CredentialSource {
    /// Resolve the effective config for one request
    ///
    /// In fixed mode the per-call arguments are ignored; in per-call mode all
    /// three credential fields must be present and non-empty.
    pub fn resolve(&self, args: &ConnectionArgs) -> AdapterResult<ConnectionConfig> {
        match self {
            CredentialSource::Fixed(config) => Ok(config.clone()),
            CredentialSource::PerCall => {
                let mut missing = Vec::new();
                let url = non_empty(&args.url).unwrap_or_else(|| {
                    missing.push("url");
                    String::new()
                });
                let username = non_empty(&args.username).unwrap_or_else(|| {
                    missing.push("username");
                    String::new()
                });
                let password = non_empty(&args.password).unwrap_or_else(|| {
                    missing.push("password");
                    String::new()
                });
                if missing.is_empty() {
                    Ok(ConnectionConfig {
                        url,
                        username,
                        password,
                    })
                } else {
                    Err(AdapterError::Credentials(missing.join(", ")))
                }
            }
        }
    }

    /// The startup config, if this server runs in fixed-credential mode
    pub fn fixed(&self) -> Option<&ConnectionConfig> {
        match self {
            CredentialSource::Fixed(config) => Some(config),
            CredentialSource::PerCall => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
