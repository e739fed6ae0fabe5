//! Replaying rewritten form submissions against their original target.
//!
//! Rewritten forms always POST to the submit endpoint with the original action
//! and method carried in hidden fields. The HTTP layer turns the submitted
//! fields back into the request the origin expects.

use url::{Url, form_urlencoded};

use crate::error::{ProxyError, Result};
use crate::rewrite::routes::{FORM_SUBMIT_FIELD, ORIGINAL_METHOD_FIELD, ORIGINAL_URL_FIELD};

/// `Content-Type` of a replayed POST body.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fields that belong to the proxy rather than the origin form.
const INTERNAL_FIELDS: &[&str] = &[ORIGINAL_URL_FIELD, ORIGINAL_METHOD_FIELD, FORM_SUBMIT_FIELD, "url"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMethod {
    Get,
    Post,
}

impl ReplayMethod {
    /// Anything other than `get` is replayed as a POST.
    fn from_field(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(method) if method != "get" && !method.is_empty() => ReplayMethod::Post,
            _ => ReplayMethod::Get,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReplayMethod::Get => "GET",
            ReplayMethod::Post => "POST",
        }
    }
}

/// A form submission to forward to the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormReplay {
    pub url: String,
    pub method: ReplayMethod,
    /// The origin form's own fields, in submission order.
    pub fields: Vec<(String, String)>,
}

impl FormReplay {
    /// Extract a replay from the fields posted to the submit endpoint.
    ///
    /// Returns `Ok(None)` for a plain browse request (no `_form_submit=1`).
    pub fn from_fields<'a, I>(fields: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut original_url = None;
        let mut original_method = None;
        let mut submitted = false;
        let mut origin_fields = Vec::new();

        for (key, value) in fields {
            match key {
                ORIGINAL_URL_FIELD => original_url = Some(value.trim().to_string()),
                ORIGINAL_METHOD_FIELD => original_method = Some(value.to_string()),
                FORM_SUBMIT_FIELD => submitted = value == "1",
                key if INTERNAL_FIELDS.contains(&key) => {}
                key => origin_fields.push((key.to_string(), value.to_string())),
            }
        }

        if !submitted {
            return Ok(None);
        }
        let url = original_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProxyError::InvalidInput("form submission without target URL".into()))?;
        Url::parse(&url)
            .map_err(|e| ProxyError::InvalidInput(format!("invalid form target {url}: {e}")))?;

        let method = ReplayMethod::from_field(original_method.as_deref());
        tracing::debug!("Form submission to: {url} using method: {}", method.as_str());
        Ok(Some(Self {
            url,
            method,
            fields: origin_fields,
        }))
    }

    fn encoded_fields(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }

    /// URL to request. For GET the fields are appended as query parameters.
    pub fn target_url(&self) -> String {
        match self.method {
            ReplayMethod::Get if !self.fields.is_empty() => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{separator}{}", self.url, self.encoded_fields())
            }
            _ => self.url.clone(),
        }
    }

    /// URL-encoded request body, for POST replays only.
    pub fn body(&self) -> Option<String> {
        match self.method {
            ReplayMethod::Post => Some(self.encoded_fields()),
            ReplayMethod::Get => None,
        }
    }
}
