pub mod denial;
pub mod engine;
pub mod errors;
pub mod loader;
pub mod pattern;
pub mod types;
pub mod web;

pub use engine::evaluate;
pub use errors::AuthorizeError;
pub use loader::{compile_policy, load_policy};
pub use types::{AuthorizationDecision, DenialContext, Rule, SessionMeta};

/// Compiled authorization policy, built once from configuration.
/// Immutable after construction and shared across requests without locking.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// A matching rule denies instead of grants.
    pub deny: bool,
    /// Patterns are delimited regular expressions rather than literals.
    pub regex: bool,
    /// Localized rejection messages: (language tag, message), in configured order
    pub reject_msg: Vec<(String, String)>,
    pub emit_error_url: bool,
    pub allow_reauthentication: bool,
    /// Attribute whose first value is shown on the 403 page
    pub show_user_attribute: Option<String>,
    pub rules: Vec<Rule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            deny: false,
            regex: true,
            reject_msg: Vec::new(),
            emit_error_url: true,
            allow_reauthentication: false,
            show_user_attribute: None,
            rules: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Rule attribute names in configured order, first occurrence only.
    pub fn rule_attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if !names.contains(&rule.attribute.as_str()) {
                names.push(&rule.attribute);
            }
        }
        names
    }

    /// Pick a rejection message for `lang`.
    pub fn rejection_message(&self, lang: Option<&str>) -> Option<&str> {
        select_message(&self.reject_msg, lang)
    }
}

/// Choose among (language tag, message) pairs: the exact tag, then its
/// primary subtag, then English, then the first configured message.
pub fn select_message<'a>(messages: &'a [(String, String)], lang: Option<&str>) -> Option<&'a str> {
    let find = |tag: &str| {
        messages
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(tag))
            .map(|(_, m)| m.as_str())
    };
    lang.and_then(|l| find(l).or_else(|| l.split(['-', '_']).next().and_then(find)))
        .or_else(|| find("en"))
        .or_else(|| messages.first().map(|(_, m)| m.as_str()))
}
