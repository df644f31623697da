/// Starts a fresh authentication for a subject who was denied access.
pub trait Reauthenticator: Send + Sync {
    /// Returns the URL the browser should be sent to.
    fn reauthenticate(&self, relying_party: Option<&str>, return_url: Option<&str>) -> String;
}

/// Sends the subject back to the login page, forwarding the relying party
/// and return URL verbatim.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub login_url: String,
}

impl LoginRedirect {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
        }
    }
}

impl Reauthenticator for LoginRedirect {
    fn reauthenticate(&self, relying_party: Option<&str>, return_url: Option<&str>) -> String {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(rp) = relying_party {
            params.push(("rp", rp.to_string()));
        }
        if let Some(url) = return_url {
            params.push(("return_to", url.to_string()));
        }
        url_append_query(self.login_url.clone(), &params)
    }
}

pub(crate) fn url_append_query(mut base: String, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return base;
    }
    let qs = serde_urlencoded::to_string(params).unwrap_or_default();
    if base.contains('?') {
        base.push('&');
    } else {
        base.push('?');
    }
    base.push_str(&qs);
    base
}
