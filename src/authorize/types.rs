use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::authorize::pattern::Matcher;

/// Asserted identity attributes: name -> values.
pub type Attributes = HashMap<String, Vec<String>>;

/// One configured rule, compiled at load time.
#[derive(Debug, Clone)]
pub struct Rule {
    pub attribute: String,
    /// Non-empty, in configured order.
    pub patterns: Vec<Matcher>,
    /// When set, the rule only applies to these relying parties.
    pub allowed_relying_parties: Option<BTreeSet<String>>,
}

impl Rule {
    /// Whether the rule may fire for the given relying party. A scoped rule
    /// never applies when the caller does not name one.
    pub fn applies_to(&self, relying_party: Option<&str>) -> bool {
        match &self.allowed_relying_parties {
            Some(allowed) if !allowed.is_empty() => {
                relying_party.is_some_and(|rp| allowed.contains(rp))
            }
            _ => true,
        }
    }
}

/// Result of one evaluation. Not persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub authorized: bool,
    /// Attribute whose rule fired; at most one entry.
    pub matched_attribute_names: Vec<String>,
    /// Attributes held responsible for a denial, in rule order. Empty when
    /// authorized.
    pub context: Vec<String>,
    pub shown_attribute_value: Option<String>,
}

/// Data handed to presentation after a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialContext {
    pub context_string: String,
    pub error_url: Option<String>,
}

/// Session data supplied by the caller alongside a denial.
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub error_url_template: Option<String>,
    pub relying_party: Option<String>,
    pub authn_instant: Option<String>,
    pub track_id: String,
}

// ---------- API request/response types ----------

/// Attribute values as sent by clients: a single string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AttributeValues {
    One(String),
    Many(Vec<String>),
}

impl From<AttributeValues> for Vec<String> {
    fn from(values: AttributeValues) -> Self {
        match values {
            AttributeValues::One(v) => vec![v],
            AttributeValues::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub attributes: HashMap<String, AttributeValues>,
    /// Entity ID of the relying party asking for access
    #[serde(default)]
    pub relying_party: Option<String>,
    /// Relying-party error URL template with ERRORURL_* tokens
    #[serde(default)]
    pub error_url: Option<String>,
    #[serde(default)]
    pub authn_instant: Option<String>,
    #[serde(default)]
    pub track_id: Option<String>,
    /// Authentication source, used for the logout link
    #[serde(default)]
    pub source: Option<String>,
    /// Where to send the subject after re-authentication
    #[serde(default)]
    pub return_url: Option<String>,
}

impl AuthorizeRequest {
    pub fn normalized_attributes(&self) -> Attributes {
        self.attributes
            .iter()
            .map(|(name, values)| (name.clone(), values.clone().into()))
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub authorized: bool,
}

/// Everything the 403 page needs, carried across the redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenialState {
    pub decision: AuthorizationDecision,
    pub denial: DenialContext,
    #[serde(default)]
    pub reject_msg: Vec<(String, String)>,
    pub allow_reauthentication: bool,
    pub relying_party: Option<String>,
    pub source: Option<String>,
    pub return_url: Option<String>,
}

/// Carried from the 403 page to the re-authentication endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReauthState {
    pub relying_party: Option<String>,
    pub return_url: Option<String>,
}
