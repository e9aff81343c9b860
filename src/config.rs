//! POP3 connection configuration

use crate::error::{Error, Result};
use std::env;

/// Default port for POP3 over implicit TLS.
pub const DEFAULT_PORT: u16 = 995;

/// POP3 connection configuration
#[derive(Debug, Clone)]
pub struct PopConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Prompted for interactively when `None`.
    pub password: Option<String>,
    /// Skip certificate verification (local bridges, self-signed test
    /// servers).
    pub accept_invalid_certs: bool,
}

impl PopConfig {
    /// Load POP3 configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `POP_HOST`
    /// - `POP_USER`
    ///
    /// Optional:
    /// - `POP_PORT` (default: `995`)
    /// - `POP_PASS` (prompted for when unset)
    /// - `POP_ACCEPT_INVALID_CERTS` (`1` or `true`; default: off)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("POP_HOST").map_err(|_| Error::Config("POP_HOST not set".into()))?,
            port: env::var("POP_PORT")
                .map_or_else(|_| Ok(DEFAULT_PORT), |port| port.parse())
                .map_err(|e| Error::Config(format!("Invalid POP_PORT: {e}")))?,
            username: env::var("POP_USER")
                .map_err(|_| Error::Config("POP_USER not set".into()))?,
            password: env::var("POP_PASS").ok().filter(|p| !p.is_empty()),
            accept_invalid_certs: env::var("POP_ACCEPT_INVALID_CERTS")
                .is_ok_and(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes")),
        })
    }

    /// The configured password, or one read from the terminal without
    /// echo.
    pub(crate) fn resolve_password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        rpassword::prompt_password(format!("Password for {}: ", self.username))
            .map_err(|e| Error::Config(format!("Cannot read password: {e}")))
    }
}
