//! Error types for the `html_proxy` crate.

use std::fmt;

/// All errors that can occur while rewriting pages or serving proxied content.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// User input that must be a URL could not be interpreted as one.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A single reference could not be resolved against the page URL.
    ///
    /// Stages log this and leave the reference untouched; it never aborts a rewrite.
    #[error("Could not resolve {reference:?}: {reason}")]
    Resolution {
        reference: String,
        reason: url::ParseError,
    },

    /// The raw document could not be turned into a tree.
    #[error("Parse failure: {0}")]
    Parse(String),

    /// The origin could not be fetched.
    #[error("Upstream fetch failed: {0}")]
    Upstream(FetchFailure),

    /// Filesystem error while handling a download.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Options, settings or builder configuration are invalid.
    #[error("Config error: {0}")]
    Config(String),
}

/// A type alias for `Result<T, ProxyError>`.
pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    /// Human-readable message suitable for rendering in place of page content.
    pub fn user_message(&self) -> String {
        match self {
            ProxyError::InvalidInput(_) => "Invalid URL. Please enter a valid URL.".to_string(),
            ProxyError::Upstream(failure) => failure.user_message(),
            other => format!("Error processing content: {other}"),
        }
    }
}

/// Cause of a failed origin fetch, as reported by the outbound HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// DNS lookup for the origin host failed.
    HostNotFound,
    /// The origin actively refused the connection.
    ConnectionRefused,
    /// The origin did not answer within the fetch budget.
    TimedOut,
    /// The origin answered with an error status.
    HttpStatus { status: u16, reason: String },
    /// Anything else the client reported.
    Other(String),
}

impl FetchFailure {
    pub fn user_message(&self) -> String {
        match self {
            FetchFailure::HostNotFound => {
                "Website not found. Please check the URL and try again.".to_string()
            }
            FetchFailure::ConnectionRefused => {
                "Connection refused. The website may be down.".to_string()
            }
            FetchFailure::TimedOut => {
                "Request timed out. The website is taking too long to respond.".to_string()
            }
            FetchFailure::HttpStatus { status, reason } => {
                format!("Website returned error {status}: {reason}")
            }
            FetchFailure::Other(detail) => {
                format!("Error accessing the requested URL: {detail}")
            }
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::HostNotFound => f.write_str("host not found"),
            FetchFailure::ConnectionRefused => f.write_str("connection refused"),
            FetchFailure::TimedOut => f.write_str("timed out"),
            FetchFailure::HttpStatus { status, reason } => write!(f, "HTTP {status} {reason}"),
            FetchFailure::Other(detail) => f.write_str(detail),
        }
    }
}

impl From<FetchFailure> for ProxyError {
    fn from(failure: FetchFailure) -> Self {
        ProxyError::Upstream(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_messages_are_distinguished() {
        let messages: Vec<String> = [
            FetchFailure::HostNotFound,
            FetchFailure::ConnectionRefused,
            FetchFailure::TimedOut,
            FetchFailure::HttpStatus {
                status: 404,
                reason: "Not Found".into(),
            },
        ]
        .iter()
        .map(FetchFailure::user_message)
        .collect();

        assert!(messages[0].contains("not found"));
        assert!(messages[1].contains("refused"));
        assert!(messages[2].contains("timed out"));
        assert_eq!(messages[3], "Website returned error 404: Not Found");
    }

    #[test]
    fn upstream_error_renders_failure_message() {
        let err = ProxyError::from(FetchFailure::TimedOut);
        assert_eq!(err.user_message(), FetchFailure::TimedOut.user_message());
        assert_eq!(err.to_string(), "Upstream fetch failed: timed out");
    }

    #[test]
    fn invalid_input_has_generic_message() {
        let err = ProxyError::InvalidInput("not a url".into());
        assert_eq!(err.user_message(), "Invalid URL. Please enter a valid URL.");
    }
}
