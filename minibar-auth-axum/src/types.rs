use http::HeaderMap;
use http::header::HOST;
use minibar_auth::RpContext;
use serde::Deserialize;

/// Body of `POST /options` for both variants.
#[derive(Deserialize, Debug)]
pub(crate) struct OptionsRequest {
    /// "register" or "login"
    #[serde(rename = "type")]
    pub(crate) type_: String,
    /// Only meaningful for user registration
    pub(crate) username: Option<String>,
}

/// Resolve the relying-party context from the request's Host header.
pub(crate) fn rp_from_headers(headers: &HeaderMap) -> RpContext {
    RpContext::resolve(headers.get(HOST).and_then(|v| v.to_str().ok()))
}
