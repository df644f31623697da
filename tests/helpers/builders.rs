use std::sync::Arc;

use attrgate::authorize::loader::compile_policy;
use attrgate::reauth::LoginRedirect;
use attrgate::settings::Settings;
use attrgate::state::MemoryStateStore;
use attrgate::web::{app, AppState};
use axum::Router;
use serde_json::Value;

/// Builder for a fully wired router around a test policy
pub struct AppBuilder {
    policy: Value,
    settings: Settings,
}

impl AppBuilder {
    pub fn new(policy: Value) -> Self {
        Self {
            policy,
            settings: Settings::default(),
        }
    }

    pub fn with_public_base_url(mut self, url: &str) -> Self {
        self.settings.server.public_base_url = Some(url.to_string());
        self
    }

    pub fn with_login_url(mut self, url: &str) -> Self {
        self.settings.reauthentication.login_url = url.to_string();
        self
    }

    /// Returns the router and the state store behind it.
    pub fn build(self) -> (Router, Arc<MemoryStateStore>) {
        let policy = compile_policy(&self.policy).expect("Failed to compile test policy");
        let states = Arc::new(MemoryStateStore::new(
            self.settings.state.ttl_secs,
            self.settings.state.max_entries,
        ));
        let reauth = Arc::new(LoginRedirect::new(
            self.settings.reauthentication.login_url.clone(),
        ));
        let state = AppState {
            settings: Arc::new(self.settings),
            policy: Arc::new(policy),
            states: states.clone(),
            reauth,
        };
        (app(state), states)
    }
}
