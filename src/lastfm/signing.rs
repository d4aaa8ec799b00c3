//! Request parameter sets and their signatures.

use std::collections::BTreeMap;

/// Parameters that take no part in the signature.
const UNSIGNED_PARAMS: [&str; 2] = ["format", "callback"];

/// Computes `api_sig`: every parameter except `format`/`callback`, sorted by key, written as
/// `key + value` with no separators, followed by the shared secret, then MD5 as lowercase hex.
pub fn sign<'a, I>(params: I, secret: &str) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut sorted: Vec<(&str, &str)> = params
        .into_iter()
        .filter(|(key, _)| !UNSIGNED_PARAMS.contains(key))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut payload = String::new();
    for (key, value) in sorted {
        payload.push_str(key);
        payload.push_str(value);
    }
    payload.push_str(secret);
    format!("{:x}", md5::compute(payload.as_bytes()))
}

/// Ordered parameter set for one API call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams(BTreeMap<String, String>);

impl RequestParams {
    /// Starts a parameter set for `method`, asking for JSON responses.
    pub fn new(method: &str, api_key: &str) -> Self {
        Self::default()
            .with("method", method)
            .with("api_key", api_key)
            .with("format", "json")
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Adds the parameter only when a value is present.
    pub fn with_opt(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn signature(&self, secret: &str) -> String {
        sign(self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())), secret)
    }

    /// Adds `api_sig` computed over the current parameters.
    pub fn into_signed(self, secret: &str) -> Self {
        let signature = self.signature(secret);
        self.with("api_sig", signature)
    }

    /// `key=value&...` with percent-encoded values, for GET requests.
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `application/x-www-form-urlencoded` body, for POST requests.
    pub fn to_form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}
