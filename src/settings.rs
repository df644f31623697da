use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub policy: Policy,
    pub state: State,
    pub reauthentication: Reauthentication,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// If set, links on the 403 page are absolute, e.g. https://idp.example.com
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// JSON policy file. Default: policy.json
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Lifetime of redirect state in seconds
    #[serde(default = "default_state_ttl")]
    pub ttl_secs: u64,
    /// Upper bound on stored entries; the oldest are dropped beyond it
    #[serde(default = "default_state_max_entries")]
    pub max_entries: usize,
}

fn default_state_ttl() -> u64 {
    3600
}

fn default_state_max_entries() -> usize {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reauthentication {
    /// Login page that starts a fresh authentication
    pub login_url: String,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: None,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            path: PathBuf::from("policy.json"),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self {
            ttl_secs: default_state_ttl(),
            max_entries: default_state_max_entries(),
        }
    }
}

impl Default for Reauthentication {
    fn default() -> Self {
        Self {
            login_url: "/login".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default(
                "policy.path",
                Policy::default().path.to_string_lossy().to_string(),
            )
            .into_diagnostic()?
            .set_default("state.ttl_secs", State::default().ttl_secs)
            .into_diagnostic()?
            .set_default("state.max_entries", State::default().max_entries as u64)
            .into_diagnostic()?
            .set_default("reauthentication.login_url", Reauthentication::default().login_url)
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: ATTRGATE__SERVER__PORT=9090, etc.
        builder = builder.add_source(
            config::Environment::with_prefix("ATTRGATE")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        if s.policy.path.is_relative() {
            s.policy.path = std::env::current_dir()
                .into_diagnostic()?
                .join(&s.policy.path);
        }

        Ok(s)
    }

    pub fn base_url(&self) -> String {
        if let Some(base) = &self.server.public_base_url {
            base.trim_end_matches('/').to_string()
        } else {
            String::new()
        }
    }
}
