pub mod builders;
pub mod http;

pub use builders::AppBuilder;
pub use http::{body_string, get, location, post_json, send, state_id};
