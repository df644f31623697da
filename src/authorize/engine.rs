use crate::authorize::types::{Attributes, AuthorizationDecision};
use crate::authorize::PolicyConfig;

/// Decide whether the subject described by `attributes` may access
/// `relying_party`.
///
/// The outcome starts at `policy.deny` and flips on the first matching
/// rule; evaluation stops there, so at most one attribute is ever recorded
/// as matched.
pub fn evaluate(
    policy: &PolicyConfig,
    attributes: &Attributes,
    relying_party: Option<&str>,
) -> AuthorizationDecision {
    let mut authorized = policy.deny;
    let mut matched: Vec<String> = Vec::new();

    'rules: for rule in &policy.rules {
        if !rule.applies_to(relying_party) {
            continue;
        }
        let Some(values) = attributes.get(&rule.attribute) else {
            continue;
        };
        for pattern in &rule.patterns {
            for value in values {
                if pattern.is_match(value) {
                    authorized = !policy.deny;
                    matched.push(rule.attribute.clone());
                    tracing::debug!(
                        attribute = %rule.attribute,
                        pattern = pattern.source(),
                        "Authorization rule matched"
                    );
                    break 'rules;
                }
            }
        }
    }

    let mut decision = AuthorizationDecision {
        authorized,
        matched_attribute_names: matched,
        context: Vec::new(),
        shown_attribute_value: None,
    };

    if !authorized {
        decision.shown_attribute_value = policy
            .show_user_attribute
            .as_ref()
            .and_then(|name| attributes.get(name))
            .and_then(|values| values.first())
            .cloned();
        decision.context = denial_context(policy, &decision.matched_attribute_names);
    }

    decision
}

/// Attributes to blame for a denial. With `deny` set it is the rule that
/// fired; otherwise every configured attribute the subject failed to match.
fn denial_context(policy: &PolicyConfig, matched: &[String]) -> Vec<String> {
    if policy.deny {
        return matched.to_vec();
    }
    policy
        .rule_attribute_names()
        .into_iter()
        .filter(|name| !matched.iter().any(|m| m == name))
        .map(str::to_string)
        .collect()
}
