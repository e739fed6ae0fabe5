//! The fixed routing table shared by the rewriter and the HTTP layer.
//!
//! Every rewritten reference has the shape `<path>?url=<percent-encoded absolute URL>`.
//! The HTTP layer implements one handler per [`RoutingTarget`] plus the
//! search route and the form-submission endpoint.

use std::time::Duration;

use url::{Url, form_urlencoded};

use crate::resolver::encode_component;

/// Endpoint that receives every rewritten form (always via POST).
pub const FORM_SUBMIT_PATH: &str = "/browse";
pub const SEARCH_PATH: &str = "/search";
/// Search engine queried by the search route.
pub const SEARCH_ENGINE_URL: &str = "https://duckduckgo.com/html/";

/// Hidden form field carrying the absolute original form action.
pub const ORIGINAL_URL_FIELD: &str = "_original_url";
/// Hidden form field carrying the lowercase original form method.
pub const ORIGINAL_METHOD_FIELD: &str = "_original_method";
/// Hidden form field marking a rewritten form submission.
pub const FORM_SUBMIT_FIELD: &str = "_form_submit";

/// Upstream fetch budget for pages.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
/// Upstream fetch budget for images, stylesheets, scripts and fonts.
pub const RESOURCE_TIMEOUT: Duration = Duration::from_secs(10);
/// Upstream fetch budget for media streams and downloads.
pub const MEDIA_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_REDIRECTS: usize = 5;
/// `Cache-Control` max-age applied to relayed sub-resources.
pub const RESOURCE_MAX_AGE_SECS: u64 = 86_400;

/// File extensions that route hyperlinks to the download endpoint.
const DOWNLOADABLE_EXTENSIONS: &[&str] = &[
    // archives and installers
    "zip", "rar", "7z", "tar", "gz", "tgz", "bz2", "xz", "iso", "dmg", "exe", "msi", "apk", "deb",
    "rpm",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf", "epub", "csv",
    // images
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "svg", "ico",
    // audio
    "mp3", "wav", "ogg", "oga", "flac", "aac", "m4a", "opus",
    // video
    "mp4", "m4v", "webm", "mkv", "avi", "mov", "wmv", "flv", "mpg", "mpeg",
];

/// How a discovered reference is re-routed through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingTarget {
    Navigate,
    Download,
    ProxyImage,
    ProxyMedia,
    ProxyResource,
}

impl RoutingTarget {
    pub const ALL: [RoutingTarget; 5] = [
        RoutingTarget::Navigate,
        RoutingTarget::Download,
        RoutingTarget::ProxyImage,
        RoutingTarget::ProxyMedia,
        RoutingTarget::ProxyResource,
    ];

    pub fn path(self) -> &'static str {
        match self {
            RoutingTarget::Navigate => "/browse",
            RoutingTarget::Download => "/download",
            RoutingTarget::ProxyImage => "/proxy-image",
            RoutingTarget::ProxyMedia => "/proxy-media",
            RoutingTarget::ProxyResource => "/proxy-resource",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|target| target.path() == path)
    }

    /// Build the proxy route for an absolute URL.
    pub fn route(self, absolute: &str) -> String {
        format!("{}?url={}", self.path(), encode_component(absolute))
    }

    fn prefix(self) -> String {
        format!("{}?url=", self.path())
    }
}

/// Route for a search query.
pub fn search_route(query: &str) -> String {
    format!("{SEARCH_PATH}?q={}", encode_component(query))
}

/// Upstream search engine URL for a query.
pub fn search_engine_url(query: &str) -> String {
    format!("{SEARCH_ENGINE_URL}?q={}", encode_component(query))
}

/// `Cache-Control` header value for relayed sub-resources.
pub fn resource_cache_control() -> String {
    format!("public, max-age={RESOURCE_MAX_AGE_SECS}")
}

/// Whether a reference already points at one of the proxy routes.
pub fn is_proxied(reference: &str) -> bool {
    let reference = reference.trim_start();
    reference.starts_with(&format!("{SEARCH_PATH}?q="))
        || RoutingTarget::ALL
            .into_iter()
            .any(|target| reference.starts_with(&target.prefix()))
}

/// Decode a rewritten `path?query` back into its target and absolute URL.
pub fn parse_route(path_and_query: &str) -> Option<(RoutingTarget, String)> {
    let (path, query) = path_and_query.split_once('?')?;
    let target = RoutingTarget::from_path(path)?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "url")
        .map(|(_, value)| (target, value.into_owned()))
        .filter(|(_, url)| !url.is_empty())
}

/// Whether an absolute URL names a file that should be downloaded rather than browsed.
pub fn is_downloadable(absolute: &str) -> bool {
    let Ok(url) = Url::parse(absolute) else {
        return false;
    };
    let Some(segment) = url.path_segments().and_then(|mut segments| segments.next_back()) else {
        return false;
    };
    segment
        .rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .is_some_and(|(_, ext)| {
            DOWNLOADABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}
