//! CLI configuration

use anyhow::{bail, Context};
use polymath_client::ClientConfig;
use polymath_sdk::CounterPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub interactions: InteractionsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://<project>.supabase.co`
    #[serde(default = "default_url")]
    pub url: String,

    /// Public anon key
    #[serde(default)]
    pub anon_key: String,

    /// Signed-in user's JWT (optional)
    #[serde(default)]
    pub access_token: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            anon_key: String::new(),
            access_token: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionsConfig {
    /// `"derived"` (default) or `"rpc"`
    #[serde(default)]
    pub counter_policy: CounterPolicy,
}

// Defaults
fn default_url() -> String { "http://localhost:54321".to_string() }
fn default_timeout() -> u64 { 30 }

impl Config {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Apply flag/env overrides on top of the file
    pub fn apply_overrides(&mut self, url: Option<String>, anon_key: Option<String>, access_token: Option<String>) {
        if let Some(url) = url {
            self.backend.url = url;
        }
        if let Some(anon_key) = anon_key {
            self.backend.anon_key = anon_key;
        }
        if access_token.is_some() {
            self.backend.access_token = access_token;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.backend.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("backend.url must be an http(s) URL, got {:?}", self.backend.url);
        }
        if self.backend.anon_key.trim().is_empty() {
            bail!("backend.anon_key is required (set it in the config file or POLYMATH_ANON_KEY)");
        }
        if self.backend.timeout_secs == 0 {
            bail!("backend.timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.backend.url.clone(),
            anon_key: self.backend.anon_key.clone(),
            access_token: self.backend.access_token.clone(),
            timeout_secs: self.backend.timeout_secs,
        }
    }
}
