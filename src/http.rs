//! Small HTTP helpers over a shared `ureq` agent.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::fmt;

const USER_AGENT: &str = concat!("drydock/", env!("CARGO_PKG_VERSION"));

/// Basic auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Value for the `Authorization` header.
    pub fn header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

/// HTTP client used by discoverers and service handlers.
#[derive(Debug, Clone)]
pub struct Client {
    agent: ureq::Agent,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    /// GET a JSON document.
    pub fn get_json(&self, url: &str) -> Result<Value> {
        let mut response = self
            .agent
            .get(url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("GET {url} failed"))?;

        log::info!("[http] GET {url} {}", response.status());

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("GET {url}: response is not JSON"))
    }

    /// POST with an empty body; returns the status code.
    ///
    /// Error statuses are returned, not raised, so callers decide what
    /// counts as success.
    pub fn post_empty(&self, url: &str, credentials: Option<&Credentials>) -> Result<u16> {
        let mut request = self
            .agent
            .post(url)
            .config()
            .http_status_as_error(false)
            .build()
            .header("User-Agent", USER_AGENT);
        if let Some(credentials) = credentials {
            request = request.header("Authorization", credentials.header());
        }

        let response = request
            .send_empty()
            .with_context(|| format!("POST {url} failed"))?;
        let status = response.status().as_u16();
        log::info!("[http] POST {url} {status}");

        Ok(status)
    }
}
