use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone()
        .oneshot(request)
        .await
        .expect("Router failed to respond")
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("No Location header")
        .to_str()
        .expect("Location is not ASCII")
        .to_string()
}

/// Value of the StateId query parameter in a URL.
pub fn state_id(url: &str) -> String {
    let (_, query) = url.split_once('?').expect("URL has no query");
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("StateId="))
        .expect("URL has no StateId")
        .to_string()
}
