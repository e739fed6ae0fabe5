//! Per-request rewrite options.

use std::fmt;
use std::str::FromStr;

use crate::error::{ProxyError, Result};

/// Cumulative aggressiveness of the content filter: `None < Low < Medium < High`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentFilterLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl ContentFilterLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFilterLevel::None => "none",
            ContentFilterLevel::Low => "low",
            ContentFilterLevel::Medium => "medium",
            ContentFilterLevel::High => "high",
        }
    }
}

impl FromStr for ContentFilterLevel {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(ContentFilterLevel::None),
            "low" => Ok(ContentFilterLevel::Low),
            "medium" => Ok(ContentFilterLevel::Medium),
            "high" => Ok(ContentFilterLevel::High),
            other => Err(ProxyError::Config(format!(
                "unknown content filter level: {other}"
            ))),
        }
    }
}

impl fmt::Display for ContentFilterLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for one rewrite. Resolved once per request and never mutated by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Remove every `<script>` and every inline `on*` event handler.
    pub disable_scripts: bool,
    pub content_filter: ContentFilterLevel,
    /// The page is a search-engine result page.
    pub is_search_result: bool,
}

impl RewriteOptions {
    pub fn new(disable_scripts: bool, content_filter: ContentFilterLevel) -> Self {
        Self {
            disable_scripts,
            content_filter,
            is_search_result: false,
        }
    }

    pub fn search_result(mut self) -> Self {
        self.is_search_result = true;
        self
    }

    /// Build options from submitted key/value pairs.
    ///
    /// Accepted keys are `disable_scripts`, `content_filter` and
    /// `is_search_result`; any other key is rejected.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            match key {
                "disable_scripts" => options.disable_scripts = parse_flag(key, value)?,
                "content_filter" => options.content_filter = value.parse()?,
                "is_search_result" => options.is_search_result = parse_flag(key, value)?,
                unknown => {
                    return Err(ProxyError::Config(format!("unknown rewrite option: {unknown}")));
                }
            }
        }
        Ok(options)
    }
}

/// Parse an HTML-checkbox or environment style boolean.
pub(crate) fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" | "" => Ok(false),
        other => Err(ProxyError::Config(format!("invalid value for {key}: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_cumulative() {
        assert!(ContentFilterLevel::None < ContentFilterLevel::Low);
        assert!(ContentFilterLevel::Low < ContentFilterLevel::Medium);
        assert!(ContentFilterLevel::Medium < ContentFilterLevel::High);
    }

    #[test]
    fn level_round_trips_through_str() {
        for level in [
            ContentFilterLevel::None,
            ContentFilterLevel::Low,
            ContentFilterLevel::Medium,
            ContentFilterLevel::High,
        ] {
            assert_eq!(level.to_string().parse::<ContentFilterLevel>().unwrap(), level);
        }
        assert_eq!("HIGH".parse::<ContentFilterLevel>().unwrap(), ContentFilterLevel::High);
        assert!("extreme".parse::<ContentFilterLevel>().is_err());
    }

    #[test]
    fn options_from_form_pairs() {
        let options = RewriteOptions::from_pairs([
            ("disable_scripts", "on"),
            ("content_filter", "medium"),
        ])
        .unwrap();
        assert!(options.disable_scripts);
        assert_eq!(options.content_filter, ContentFilterLevel::Medium);
        assert!(!options.is_search_result);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let err = RewriteOptions::from_pairs([("disableJs", "on")]).unwrap_err();
        assert!(matches!(err, ProxyError::Config(msg) if msg.contains("disableJs")));
    }

    #[test]
    fn invalid_flag_is_rejected() {
        assert!(RewriteOptions::from_pairs([("disable_scripts", "maybe")]).is_err());
    }

    #[test]
    fn search_result_builder() {
        let options = RewriteOptions::new(true, ContentFilterLevel::Low).search_result();
        assert!(options.is_search_result);
        assert!(options.disable_scripts);
    }
}
