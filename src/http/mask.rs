//! Masking of sensitive values before they reach a trace
//!
//! A header, query parameter or body field is sensitive when its name
//! contains one of the denylisted fragments (case-insensitive).

use reqwest::header::HeaderMap;
use serde_json::Value;
use url::Url;

use super::har::{HarHeader, HarQueryParam};
use crate::constants::MASKED_VALUE;

/// Name fragments that mark a value as sensitive
const SENSITIVE_FRAGMENTS: &[&str] = &[
    "authorization",
    "api-key",
    "api_key",
    "apikey",
    "x-api-key",
    "cookie",
    "token",
    "secret",
    "password",
    "passwd",
    "signature",
    "session",
    "credential",
    "private-key",
    "private_key",
];

#[derive(Debug, Clone, Default)]
pub struct Masker {
    /// Extra lowercase fragments on top of the builtin list
    extra: Vec<String>,
}

impl Masker {
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extra: extra
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        SENSITIVE_FRAGMENTS.iter().any(|f| name.contains(f))
            || self.extra.iter().any(|f| name.contains(f.as_str()))
    }

    pub fn mask_value(&self, name: &str, value: &str) -> String {
        if self.is_sensitive(name) {
            MASKED_VALUE.to_string()
        } else {
            value.to_string()
        }
    }

    pub fn headers(&self, headers: &HeaderMap) -> Vec<HarHeader> {
        headers
            .iter()
            .map(|(name, value)| HarHeader {
                name: name.as_str().to_string(),
                value: self.mask_value(
                    name.as_str(),
                    &String::from_utf8_lossy(value.as_bytes()),
                ),
            })
            .collect()
    }

    /// Masked URL string plus its masked query parameters
    ///
    /// The userinfo password is replaced too.
    pub fn url(&self, url: &Url) -> (String, Vec<HarQueryParam>) {
        let mut masked = url.clone();
        if masked.password().is_some() && masked.set_password(Some(MASKED_VALUE)).is_err() {
            tracing::debug!("URL password could not be masked, dropping userinfo");
            let _ = masked.set_username("");
            let _ = masked.set_password(None);
        }

        let params: Vec<HarQueryParam> = url
            .query_pairs()
            .map(|(name, value)| HarQueryParam {
                value: self.mask_value(&name, &value),
                name: name.into_owned(),
            })
            .collect();

        if url.query_pairs().any(|(name, _)| self.is_sensitive(&name)) {
            masked
                .query_pairs_mut()
                .clear()
                .extend_pairs(params.iter().map(|p| (p.name.as_str(), p.value.as_str())));
        }

        (masked.to_string(), params)
    }

    /// `reqwest::Error` text with its embedded URL masked
    pub fn error_message(&self, error: &reqwest::Error) -> String {
        let text = error.to_string();
        match error.url() {
            Some(url) => text.replace(url.as_str(), &self.url(url).0),
            None => text,
        }
    }

    /// Mask sensitive keys at any depth of a JSON value
    pub fn json(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, entry) in map.iter_mut() {
                    if self.is_sensitive(key) && !entry.is_null() {
                        *entry = Value::String(MASKED_VALUE.to_string());
                    } else {
                        self.json(entry);
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.json(item)),
            _ => {}
        }
    }

    /// Mask a request body according to its content type
    ///
    /// JSON and form bodies have sensitive fields replaced; anything else is
    /// returned unchanged.
    pub fn body(&self, content_type: &str, body: &str) -> String {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("json") {
            if let Ok(mut value) = serde_json::from_str::<Value>(body) {
                self.json(&mut value);
                return serde_json::to_string(&value).unwrap_or_else(|_| body.to_string());
            }
        } else if content_type.contains("x-www-form-urlencoded") {
            let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| {
                    let masked = self.mask_value(&k, &v);
                    (k.into_owned(), masked)
                })
                .collect();
            return url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
        }
        body.to_string()
    }
}
