use chrono::{DateTime, Utc};

use crate::authorize::types::{AuthorizationDecision, DenialContext, SessionMeta};
use crate::authorize::PolicyConfig;

/// Error code reported to relying parties through `ERRORURL_CODE`.
pub const ERROR_CODE: &str = "AUTHORIZATION_FAILURE";

/// Build the presentation data for a negative decision.
pub fn build(
    policy: &PolicyConfig,
    decision: &AuthorizationDecision,
    session: &SessionMeta,
) -> DenialContext {
    build_at(policy, decision, session, Utc::now())
}

/// As [`build`], with `now` used for `ERRORURL_TS` when the session has no
/// authentication instant.
pub fn build_at(
    policy: &PolicyConfig,
    decision: &AuthorizationDecision,
    session: &SessionMeta,
    now: DateTime<Utc>,
) -> DenialContext {
    let context_string = decision.context.join(" ");

    let error_url = match (&session.error_url_template, policy.emit_error_url) {
        (Some(template), true) => Some(substitute(template, &context_string, session, now)),
        _ => None,
    };

    DenialContext {
        context_string,
        error_url,
    }
}

/// Plain substring replacement of the ERRORURL_* tokens. Replacement text is
/// never rescanned.
fn substitute(template: &str, context: &str, session: &SessionMeta, now: DateTime<Utc>) -> String {
    let timestamp = session
        .authn_instant
        .clone()
        .unwrap_or_else(|| now.timestamp().to_string());

    let mut replacements: Vec<(&str, String)> = vec![
        ("ERRORURL_CODE", ERROR_CODE.to_string()),
        ("ERRORURL_TS", timestamp),
        ("ERRORURL_TID", urlencoding::encode(&session.track_id).into_owned()),
        ("ERRORURL_CTX", urlencoding::encode(context).into_owned()),
    ];
    if let Some(rp) = &session.relying_party {
        replacements.push(("ERRORURL_RP", urlencoding::encode(rp).into_owned()));
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while !rest.is_empty() {
        for (token, replacement) in &replacements {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'scan;
            }
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}
