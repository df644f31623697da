use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::authorize::types::{
    AuthorizeRequest, AuthorizeResponse, DenialState, ReauthState, SessionMeta,
};
use crate::authorize::{denial, engine, select_message};
use crate::errors::GateError;
use crate::reauth::url_append_query;
use crate::state::{random_id, DENIAL_NAMESPACE, REAUTH_NAMESPACE};
use crate::web::AppState;

pub const FORBIDDEN_PATH: &str = "/authorize/error/forbidden";
pub const REAUTHENTICATE_PATH: &str = "/authorize/error/reauthenticate";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/authorize", post(handle_authorize))
        .route(FORBIDDEN_PATH, get(forbidden))
        .route(REAUTHENTICATE_PATH, get(reauthenticate))
        .route("/healthz", get(health))
}

#[derive(Debug, Deserialize)]
struct StateQuery {
    #[serde(rename = "StateId")]
    state_id: Option<String>,
    lang: Option<String>,
}

impl StateQuery {
    fn require_state_id(&self) -> Result<&str, GateError> {
        self.state_id
            .as_deref()
            .ok_or_else(|| GateError::BadRequest("Missing required StateId query parameter.".into()))
    }
}

/// Evaluate the policy; on denial persist the decision and send the browser
/// to the 403 page.
async fn handle_authorize(
    State(state): State<AppState>,
    Json(req): Json<AuthorizeRequest>,
) -> Result<Response, GateError> {
    let attributes = req.normalized_attributes();
    let decision = engine::evaluate(&state.policy, &attributes, req.relying_party.as_deref());

    if decision.authorized {
        tracing::debug!(relying_party = ?req.relying_party, "Subject authorized");
        return Ok(Json(AuthorizeResponse { authorized: true }).into_response());
    }

    let session = SessionMeta {
        error_url_template: req.error_url.clone(),
        relying_party: req.relying_party.clone(),
        authn_instant: req.authn_instant.clone(),
        track_id: req.track_id.clone().unwrap_or_else(random_id),
    };
    let denial = denial::build(&state.policy, &decision, &session);

    tracing::info!(
        relying_party = ?req.relying_party,
        context = %denial.context_string,
        track_id = %session.track_id,
        "Subject not authorized"
    );

    let data = DenialState {
        decision,
        denial,
        reject_msg: state.policy.reject_msg.clone(),
        allow_reauthentication: state.policy.allow_reauthentication,
        relying_party: req.relying_party,
        source: req.source,
        return_url: req.return_url,
    };
    let token = state
        .states
        .save(DENIAL_NAMESPACE, serde_json::to_value(&data)?);

    let url = url_append_query(
        format!("{}{}", state.settings.base_url(), FORBIDDEN_PATH),
        &[("StateId", token)],
    );
    Ok(Redirect::to(&url).into_response())
}

/// GET /authorize/error/forbidden - render the 403 page
async fn forbidden(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<StateQuery>,
) -> Result<Response, GateError> {
    let state_id = q.require_state_id()?;
    let data = state
        .states
        .load(DENIAL_NAMESPACE, state_id)
        .ok_or(GateError::StateLost)?;
    let denied: DenialState = serde_json::from_value(data)?;

    let base = state.settings.base_url();
    let lang = q.lang.clone().or_else(|| accept_language(&headers));
    let message = select_message(&denied.reject_msg, lang.as_deref());

    let logout_url = denied
        .source
        .as_ref()
        .map(|source| url_append_query(format!("{base}/logout"), &[("as", source.clone())]));

    let reauth_url = if denied.allow_reauthentication {
        let reauth = ReauthState {
            relying_party: denied.relying_party.clone(),
            return_url: denied.return_url.clone(),
        };
        let token = state
            .states
            .save(REAUTH_NAMESPACE, serde_json::to_value(&reauth)?);
        Some(url_append_query(
            format!("{base}{REAUTHENTICATE_PATH}"),
            &[("StateId", token)],
        ))
    } else {
        None
    };

    let error_url = denied.denial.error_url.as_deref().filter(|url| {
        let linkable = is_web_url(url);
        if !linkable {
            tracing::warn!(error_url = %url, "Error URL is not http(s); not linking it");
        }
        linkable
    });

    let page = ForbiddenPage {
        message,
        user_attribute: denied.decision.shown_attribute_value.as_deref(),
        error_url,
        logout_url: logout_url.as_deref(),
        reauth_url: reauth_url.as_deref(),
    };
    Ok((StatusCode::FORBIDDEN, Html(page.render())).into_response())
}

/// GET /authorize/error/reauthenticate - hand off to the login flow
async fn reauthenticate(
    State(state): State<AppState>,
    Query(q): Query<StateQuery>,
) -> Result<Redirect, GateError> {
    if !state.policy.allow_reauthentication {
        return Err(GateError::Forbidden("re-authentication is disabled".into()));
    }

    let state_id = q.require_state_id()?;
    let data = state
        .states
        .load(REAUTH_NAMESPACE, state_id)
        .ok_or(GateError::StateLost)?;
    let reauth: ReauthState = serde_json::from_value(data)?;

    let target = state
        .reauth
        .reauthenticate(reauth.relying_party.as_deref(), reauth.return_url.as_deref());
    tracing::info!(relying_party = ?reauth.relying_party, "Starting re-authentication");
    Ok(Redirect::to(&target))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// First language tag of an Accept-Language header, ignoring quality values.
fn accept_language(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::ACCEPT_LANGUAGE)?.to_str().ok()?;
    let first = value.split(',').next()?.split(';').next()?.trim();
    if first.is_empty() || first == "*" {
        None
    } else {
        Some(first.to_string())
    }
}

/// Only absolute http(s) URLs are put into a link.
fn is_web_url(url: &str) -> bool {
    let scheme = url.trim_start().split_once("://").map(|(scheme, _)| scheme);
    matches!(scheme, Some(s) if s.eq_ignore_ascii_case("https") || s.eq_ignore_ascii_case("http"))
}

struct ForbiddenPage<'a> {
    message: Option<&'a str>,
    user_attribute: Option<&'a str>,
    error_url: Option<&'a str>,
    logout_url: Option<&'a str>,
    reauth_url: Option<&'a str>,
}

impl ForbiddenPage<'_> {
    fn render(&self) -> String {
        let message = self
            .message
            .unwrap_or("You do not have access to this service.");
        let mut extra = String::new();
        if let Some(attr) = self.user_attribute {
            extra.push_str(&format!(
                r#"<p class="user-attribute">Signed in as <strong>{}</strong></p>"#,
                html_escape(attr)
            ));
        }
        if let Some(url) = self.error_url {
            extra.push_str(&format!(
                r#"<p><a class="error-url" href="{}">Report this problem to the service</a></p>"#,
                html_escape(url)
            ));
        }
        if let Some(url) = self.reauth_url {
            extra.push_str(&format!(
                r#"<p><a class="reauthenticate" href="{}">Sign in with another account</a></p>"#,
                html_escape(url)
            ));
        }
        if let Some(url) = self.logout_url {
            extra.push_str(&format!(
                r#"<p><a class="logout" href="{}">Log out</a></p>"#,
                html_escape(url)
            ));
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <title>Forbidden</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 480px; margin: 50px auto; padding: 20px; }}
    </style>
</head>
<body>
    <h1>Forbidden</h1>
    <p class="reject-msg">{message}</p>
    {extra}
</body>
</html>"#,
            message = html_escape(message),
            extra = extra,
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
