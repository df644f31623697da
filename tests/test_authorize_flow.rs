// End-to-end tests for the authorization endpoints
//
// These drive the router in-process and cover:
// 1. Authorized and denied evaluations
// 2. The 403 page and its single-use state
// 3. Error URL substitution and rejection message selection
// 4. Re-authentication hand-off

mod helpers;

use attrgate::state::{StateStore, REAUTH_NAMESPACE};
use axum::http::{header, Request, StatusCode};
use helpers::{body_string, get, location, post_json, send, state_id, AppBuilder};
use serde_json::json;

fn allow_policy() -> serde_json::Value {
    json!({
        "uid": ["/^.*@example.com$/", "/^(user1|user2|user3)@example.edu$/"],
        "show_user_attribute": "mail",
        "reject_msg": { "en": "Access denied", "nl": "Geen toegang" },
    })
}

#[tokio::test]
async fn test_authorized_subject_gets_json() {
    let (app, states) = AppBuilder::new(allow_policy()).build();

    let response = send(
        &app,
        post_json("/v1/authorize", json!({ "attributes": { "uid": "anything@example.com" } })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({ "authorized": true }));
    assert!(states.is_empty());
}

#[tokio::test]
async fn test_denied_subject_is_redirected_to_forbidden_page() {
    let (app, states) = AppBuilder::new(allow_policy()).build();

    let response = send(
        &app,
        post_json(
            "/v1/authorize",
            json!({
                "attributes": { "uid": "wronguser@example.edu", "mail": ["user@example.edu"] },
                "relying_party": "https://sp1.example.com",
                "error_url": "https://sp1.example.com/error?code=ERRORURL_CODE&ctx=ERRORURL_CTX&rp=ERRORURL_RP&tid=ERRORURL_TID",
                "track_id": "track-1",
                "source": "default-sp",
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let loc = location(&response);
    assert!(loc.starts_with("/authorize/error/forbidden?StateId="));
    assert_eq!(states.len(), 1);

    let page = send(&app, get(&loc)).await;
    assert_eq!(page.status(), StatusCode::FORBIDDEN);
    let html = body_string(page).await;
    assert!(html.contains("Access denied"));
    assert!(html.contains("user@example.edu"));
    assert!(html.contains(
        "https://sp1.example.com/error?code=AUTHORIZATION_FAILURE&amp;ctx=uid&amp;rp=https%3A%2F%2Fsp1.example.com&amp;tid=track-1"
    ));
    assert!(html.contains(r#"href="/logout?as=default-sp""#));
    assert!(!html.contains("class=\"reauthenticate\""));
}

#[tokio::test]
async fn test_forbidden_state_is_single_use() {
    let (app, _) = AppBuilder::new(allow_policy()).build();

    let response = send(
        &app,
        post_json("/v1/authorize", json!({ "attributes": { "uid": "nobody" } })),
    )
    .await;
    let loc = location(&response);

    assert_eq!(send(&app, get(&loc)).await.status(), StatusCode::FORBIDDEN);

    let again = send(&app, get(&loc)).await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(again).await.contains("State information lost"));
}

#[tokio::test]
async fn test_forbidden_requires_state_id() {
    let (app, _) = AppBuilder::new(allow_policy()).build();

    let response = send(&app, get("/authorize/error/forbidden")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response)
        .await
        .contains("Missing required StateId query parameter."));

    let response = send(&app, get("/authorize/error/forbidden?StateId=unknown")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejection_message_follows_accept_language() {
    let (app, _) = AppBuilder::new(allow_policy()).build();

    let response = send(
        &app,
        post_json("/v1/authorize", json!({ "attributes": { "uid": "nobody" } })),
    )
    .await;
    let loc = location(&response);

    let request = Request::builder()
        .uri(&loc)
        .header(header::ACCEPT_LANGUAGE, "nl-NL,nl;q=0.9")
        .body(axum::body::Body::empty())
        .unwrap();
    let html = body_string(send(&app, request).await).await;
    assert!(html.contains("Geen toegang"));
}

#[tokio::test]
async fn test_lang_query_overrides_header() {
    let (app, _) = AppBuilder::new(allow_policy()).build();

    let response = send(
        &app,
        post_json("/v1/authorize", json!({ "attributes": { "uid": "nobody" } })),
    )
    .await;
    let loc = format!("{}&lang=nl", location(&response));

    let html = body_string(send(&app, get(&loc)).await).await;
    assert!(html.contains("Geen toegang"));
}

#[tokio::test]
async fn test_error_url_disabled() {
    let (app, _) = AppBuilder::new(json!({ "errorURL": false, "uid": "/^ok$/" })).build();

    let response = send(
        &app,
        post_json(
            "/v1/authorize",
            json!({ "attributes": { "uid": "no" }, "error_url": "https://sp/err?c=ERRORURL_CODE" }),
        ),
    )
    .await;
    let html = body_string(send(&app, get(&location(&response))).await).await;
    assert!(!html.contains("class=\"error-url\""));
    assert!(!html.contains("AUTHORIZATION_FAILURE"));
}

#[tokio::test]
async fn test_non_web_error_url_is_not_linked() {
    let (app, _) = AppBuilder::new(allow_policy()).build();

    let response = send(
        &app,
        post_json(
            "/v1/authorize",
            json!({ "attributes": { "uid": "no" }, "error_url": "javascript:alert(1)//ERRORURL_CODE" }),
        ),
    )
    .await;
    let page = send(&app, get(&location(&response))).await;
    assert_eq!(page.status(), StatusCode::FORBIDDEN);
    let html = body_string(page).await;
    assert!(!html.contains("class=\"error-url\""));
    assert!(!html.contains("javascript:"));
}

#[tokio::test]
async fn test_relying_party_scoped_rule_over_http() {
    let policy = json!({
        "uid": { "patterns": ["/@example.com$/"], "spEntityIDs": ["https://sp1.example.com"] },
    });
    let (app, _) = AppBuilder::new(policy).build();

    let allowed = send(
        &app,
        post_json(
            "/v1/authorize",
            json!({ "attributes": { "uid": "a@example.com" }, "relying_party": "https://sp1.example.com" }),
        ),
    )
    .await;
    assert_eq!(allowed.status(), StatusCode::OK);

    let no_rp = send(
        &app,
        post_json("/v1/authorize", json!({ "attributes": { "uid": "a@example.com" } })),
    )
    .await;
    assert_eq!(no_rp.status(), StatusCode::SEE_OTHER);

    let other_rp = send(
        &app,
        post_json(
            "/v1/authorize",
            json!({ "attributes": { "uid": "a@example.com" }, "relying_party": "https://sp2.example.com" }),
        ),
    )
    .await;
    assert_eq!(other_rp.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_reauthentication_flow() {
    let policy = json!({ "allow_reauthentication": true, "uid": "/^admin$/" });
    let (app, _) = AppBuilder::new(policy)
        .with_login_url("https://idp.example.com/login")
        .build();

    let response = send(
        &app,
        post_json(
            "/v1/authorize",
            json!({
                "attributes": { "uid": "guest" },
                "relying_party": "https://sp1.example.com",
                "return_url": "https://sp1.example.com/app",
            }),
        ),
    )
    .await;
    let html = body_string(send(&app, get(&location(&response))).await).await;

    let marker = r#"class="reauthenticate" href=""#;
    let start = html.find(marker).expect("No re-authentication link") + marker.len();
    let href = &html[start..start + html[start..].find('"').unwrap()];
    assert!(href.starts_with("/authorize/error/reauthenticate?StateId="));
    assert!(!state_id(href).is_empty());

    let redirect = send(&app, get(href)).await;
    assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&redirect),
        "https://idp.example.com/login?rp=https%3A%2F%2Fsp1.example.com&return_to=https%3A%2F%2Fsp1.example.com%2Fapp"
    );

    // the re-authentication state is consumed as well
    assert_eq!(send(&app, get(href)).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_public_base_url_makes_links_absolute() {
    let (app, _) = AppBuilder::new(allow_policy())
        .with_public_base_url("https://idp.example.com/")
        .build();

    let response = send(
        &app,
        post_json("/v1/authorize", json!({ "attributes": {} })),
    )
    .await;
    assert!(location(&response).starts_with("https://idp.example.com/authorize/error/forbidden?StateId="));
}

#[tokio::test]
async fn test_security_headers_and_health() {
    let (app, _) = AppBuilder::new(allow_policy()).build();

    let response = send(&app, get("/healthz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_reauthentication_disabled_keeps_state() {
    let (app, states) = AppBuilder::new(json!({ "uid": "/^admin$/" })).build();
    let token = states.save(
        REAUTH_NAMESPACE,
        json!({ "relying_party": "https://sp1.example.com", "return_url": null }),
    );

    let response = send(
        &app,
        get(&format!("/authorize/error/reauthenticate?StateId={token}")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(states.len(), 1);
}
