use std::collections::BTreeSet;
use std::path::Path;

use serde::de::{self, IgnoredAny, MapAccess};
use serde_json::{Map, Value};

use crate::authorize::errors::AuthorizeError;
use crate::authorize::pattern::Matcher;
use crate::authorize::types::Rule;
use crate::authorize::PolicyConfig;

/// Read a JSON policy file and compile it.
pub fn load_policy(path: &Path) -> Result<PolicyConfig, AuthorizeError> {
    let contents =
        std::fs::read_to_string(path).map_err(|source| AuthorizeError::PolicyLoad {
            path: path.display().to_string(),
            source,
        })?;
    let value: Value = serde_json::from_str(&contents)?;
    if value.is_object() {
        reject_duplicate_keys(&contents)?;
    }
    let policy = compile_policy(&value)?;

    tracing::info!(
        path = %path.display(),
        rules = policy.rules.len(),
        deny = policy.deny,
        regex = policy.regex,
        error_url = policy.emit_error_url,
        reauthentication = policy.allow_reauthentication,
        "Loaded authorization policy"
    );

    Ok(policy)
}

/// A JSON object keeps only the last of several equal keys, so a repeated
/// attribute would silently drop rules.
fn reject_duplicate_keys(contents: &str) -> Result<(), AuthorizeError> {
    let keys = top_level_keys(contents)?;
    for (i, key) in keys.iter().enumerate() {
        if keys[..i].contains(key) {
            return Err(AuthorizeError::DuplicateKey(key.clone()));
        }
    }
    Ok(())
}

/// Keys of the top-level object in document order, repeats included.
fn top_level_keys(contents: &str) -> Result<Vec<String>, serde_json::Error> {
    struct KeysVisitor;

    impl<'de> de::Visitor<'de> for KeysVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a JSON object")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut keys = Vec::new();
            while let Some((key, IgnoredAny)) = map.next_entry::<String, IgnoredAny>()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    let mut deserializer = serde_json::Deserializer::from_str(contents);
    de::Deserializer::deserialize_map(&mut deserializer, KeysVisitor)
}

/// One entry of the configuration object, classified by key and shape.
enum Entry<'a> {
    Deny(bool),
    Regex(bool),
    RejectMsg(&'a Map<String, Value>),
    ErrorUrl(bool),
    AllowReauthentication(bool),
    ShowUserAttribute(&'a str),
    Rule(&'a str, &'a Value),
}

impl<'a> Entry<'a> {
    /// Reserved keys are options only when the value has the option's type;
    /// otherwise the key names an attribute like any other.
    fn classify(key: &'a str, value: &'a Value) -> Self {
        match (key, value) {
            ("deny", Value::Bool(b)) => Entry::Deny(*b),
            ("regex", Value::Bool(b)) => Entry::Regex(*b),
            ("reject_msg", Value::Object(m)) => Entry::RejectMsg(m),
            ("errorURL", Value::Bool(b)) => Entry::ErrorUrl(*b),
            ("allow_reauthentication", Value::Bool(b)) => Entry::AllowReauthentication(*b),
            ("show_user_attribute", Value::String(s)) => Entry::ShowUserAttribute(s),
            (attribute, value) => Entry::Rule(attribute, value),
        }
    }
}

/// Compile the dynamic configuration object into a typed policy.
///
/// Patterns are compiled only after all options are read, since `regex`
/// may appear after the rules it governs.
pub fn compile_policy(value: &Value) -> Result<PolicyConfig, AuthorizeError> {
    let map = value
        .as_object()
        .ok_or_else(|| AuthorizeError::NotAnObject(json_type(value).to_string()))?;

    let mut policy = PolicyConfig::default();
    let mut raw_rules: Vec<(&str, &Value)> = Vec::new();

    for (key, value) in map {
        match Entry::classify(key, value) {
            Entry::Deny(b) => policy.deny = b,
            Entry::Regex(b) => policy.regex = b,
            Entry::RejectMsg(messages) => policy.reject_msg = parse_reject_msg(messages)?,
            Entry::ErrorUrl(b) => policy.emit_error_url = b,
            Entry::AllowReauthentication(b) => policy.allow_reauthentication = b,
            Entry::ShowUserAttribute(s) => policy.show_user_attribute = Some(s.to_string()),
            Entry::Rule(attribute, value) => raw_rules.push((attribute, value)),
        }
    }

    for (attribute, value) in raw_rules {
        policy.rules.extend(parse_rules(attribute, value, policy.regex)?);
    }

    Ok(policy)
}

fn parse_reject_msg(messages: &Map<String, Value>) -> Result<Vec<(String, String)>, AuthorizeError> {
    messages
        .iter()
        .map(|(lang, msg)| match msg {
            Value::String(s) => Ok((lang.clone(), s.clone())),
            _ => Err(AuthorizeError::InvalidRejectMessage(lang.clone())),
        })
        .collect()
}

/// An array of rule objects yields one rule per object, so the same
/// attribute can be checked under several relying-party scopes.
fn parse_rules(attribute: &str, value: &Value, regex: bool) -> Result<Vec<Rule>, AuthorizeError> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object) => items
            .iter()
            .map(|item| parse_rule(attribute, item, regex))
            .collect(),
        _ => Ok(vec![parse_rule(attribute, value, regex)?]),
    }
}

fn parse_rule(attribute: &str, value: &Value, regex: bool) -> Result<Rule, AuthorizeError> {
    let (raw_patterns, relying_parties) = match value {
        Value::String(_) | Value::Array(_) => (string_list(attribute, value)?, None),
        Value::Object(fields) => parse_rule_object(attribute, fields)?,
        _ => {
            return Err(AuthorizeError::InvalidAttributeValueType {
                attribute: attribute.to_string(),
            })
        }
    };

    if attribute.is_empty() || raw_patterns.is_empty() {
        return Err(AuthorizeError::EmptyRule(attribute.to_string()));
    }

    let patterns = raw_patterns
        .iter()
        .map(|p| {
            if regex {
                Matcher::regex(p).map_err(|reason| AuthorizeError::InvalidPattern {
                    attribute: attribute.to_string(),
                    pattern: p.clone(),
                    reason,
                })
            } else {
                Ok(Matcher::exact(p))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Rule {
        attribute: attribute.to_string(),
        patterns,
        allowed_relying_parties: relying_parties,
    })
}

/// `{ "patterns": ..., "spEntityIDs": [...] }`
fn parse_rule_object(
    attribute: &str,
    fields: &Map<String, Value>,
) -> Result<(Vec<String>, Option<BTreeSet<String>>), AuthorizeError> {
    let mut patterns = Vec::new();
    let mut relying_parties = None;

    for (key, value) in fields {
        match key.as_str() {
            "patterns" => patterns = string_list(attribute, value)?,
            "spEntityIDs" => {
                let Value::Array(items) = value else {
                    return Err(AuthorizeError::InvalidRelyingParties {
                        attribute: attribute.to_string(),
                    });
                };
                let ids = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            AuthorizeError::InvalidRelyingParties {
                                attribute: attribute.to_string(),
                            }
                        })
                    })
                    .collect::<Result<BTreeSet<_>, _>>()?;
                relying_parties = Some(ids);
            }
            _ => {
                return Err(AuthorizeError::InvalidAttributeValueType {
                    attribute: attribute.to_string(),
                })
            }
        }
    }

    Ok((patterns, relying_parties))
}

fn string_list(attribute: &str, value: &Value) -> Result<Vec<String>, AuthorizeError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(AuthorizeError::InvalidPatternValueType {
                    attribute: attribute.to_string(),
                    value: other.to_string(),
                }),
            })
            .collect(),
        _ => Err(AuthorizeError::InvalidAttributeValueType {
            attribute: attribute.to_string(),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
