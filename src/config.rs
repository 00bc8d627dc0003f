//! Configuration types for the chat proxy.
//!
//! Config comes from an optional TOML file (path in `CHAT_PROXY_CONFIG`)
//! with environment overrides layered on top, and is validated before the
//! server opens its port. Upstream credentials are deliberately absent: they
//! are read from `API_KEY_*` variables on every request (see [`crate::keys`]).
//!
//! # Example
//! ```toml
//! [server]
//! port           = 8787
//! allowed_origin = "https://example.dev"
//!
//! [upstream]
//! model      = "meta-llama/Llama-3.1-8B-Instruct"
//! timeout_ms = 20000
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::prompt::PORTFOLIO_CONTEXT;

/// Top-level proxy configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl Config {
    /// Load from `path` (or defaults when `None`), apply overrides from the
    /// process environment, then validate.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// [`Config::load`] with variables read through `lookup`.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str(&content).context("parsing config TOML")?
            }
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment overrides. `lookup` returns the value of a variable
    /// if it is set.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("CHAT_PROXY_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("CHAT_PROXY_PORT is not a valid port: {port:?}"))?;
        }
        if let Some(origin) = lookup("CHAT_ALLOWED_ORIGIN") {
            self.server.allowed_origin = origin;
        }
        if let Some(model) = lookup("HF_MODEL") {
            self.upstream.model = model;
        }
        if let Some(prompt) = lookup("CHAT_SYSTEM_PROMPT") {
            self.upstream.system_prompt = prompt;
        }
        if let Some(url) = lookup("CHAT_UPSTREAM_URL") {
            self.upstream.url = url;
        }
        if let Some(timeout) = lookup("CHAT_UPSTREAM_TIMEOUT_MS") {
            self.upstream.timeout_ms = timeout.trim().parse().with_context(|| {
                format!("CHAT_UPSTREAM_TIMEOUT_MS is not a number: {timeout:?}")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.upstream.model.trim().is_empty(),
            "upstream model must not be empty"
        );
        anyhow::ensure!(
            self.upstream.url.starts_with("http://") || self.upstream.url.starts_with("https://"),
            "upstream url `{}` must be an http(s) URL",
            self.upstream.url
        );
        anyhow::ensure!(self.upstream.timeout_ms > 0, "upstream timeout_ms must be non-zero");
        anyhow::ensure!(
            axum::http::HeaderValue::from_str(&self.server.allowed_origin).is_ok(),
            "allowed origin `{}` is not a valid header value",
            self.server.allowed_origin
        );
        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on (default: 8787).
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Value of `Access-Control-Allow-Origin` on chat responses (default: `*`).
    #[serde(default = "defaults::allowed_origin")]
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            allowed_origin: defaults::allowed_origin(),
        }
    }
}

/// The chat-completions endpoint every request is forwarded to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Full URL of the chat-completions endpoint.
    #[serde(default = "defaults::url")]
    pub url: String,

    /// Model identifier sent with every request.
    #[serde(default = "defaults::model")]
    pub model: String,

    /// Per-attempt timeout in milliseconds (default: 30 000). A timed-out
    /// attempt counts as a network failure and moves on to the next key.
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// First system message; defaults to the built-in portfolio description.
    #[serde(default = "defaults::system_prompt")]
    pub system_prompt: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: defaults::url(),
            model: defaults::model(),
            timeout_ms: defaults::timeout_ms(),
            system_prompt: defaults::system_prompt(),
        }
    }
}

mod defaults {
    pub fn port() -> u16 { 8787 }
    pub fn allowed_origin() -> String { "*".into() }
    pub fn url() -> String { "https://router.huggingface.co/v1/chat/completions".into() }
    pub fn model() -> String { "meta-llama/Llama-3.1-8B-Instruct".into() }
    pub fn timeout_ms() -> u64 { 30_000 }
    pub fn system_prompt() -> String { super::PORTFOLIO_CONTEXT.into() }
}
