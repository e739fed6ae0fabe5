//! Temporary files backing the download route.
//!
//! A download is streamed from the origin into the download directory under
//! a collision-resistant name, served as an attachment, then deleted.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use futures::{Stream, StreamExt};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use url::{Url, form_urlencoded};

use crate::error::{ProxyError, Result};

/// Name used when neither the headers nor the URL provide one.
pub const FALLBACK_FILENAME: &str = "download";

/// Content type assumed when the origin does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

static CONTENT_DISPOSITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*=UTF-8''([^;]+)|filename="?([^";]+)"?"#)
        .expect("CONTENT_DISPOSITION_REGEX is a valid static regex pattern")
});

/// Extension for the content types the proxy recognizes.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "application/pdf" => Some(".pdf"),
        "application/zip" | "application/x-zip-compressed" => Some(".zip"),
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        "video/mp4" => Some(".mp4"),
        "audio/mpeg" => Some(".mp3"),
        _ => None,
    }
}

fn percent_decode(raw: &str) -> String {
    // Escape the characters form decoding would otherwise interpret.
    let escaped = raw
        .replace('+', "%2B")
        .replace('&', "%26")
        .replace('=', "%3D");
    form_urlencoded::parse(format!("v={escaped}").as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Strip any directory part and reject names that cannot be files.
fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => None,
        base => Some(base.to_string()),
    }
}

/// Filename announced by a `Content-Disposition` header.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let caps = CONTENT_DISPOSITION_REGEX.captures(header)?;
    let raw = caps.get(1).or_else(|| caps.get(2))?.as_str();
    sanitize_filename(&percent_decode(raw.trim()))
}

/// Last path segment of `url`, or [`FALLBACK_FILENAME`].
pub fn filename_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(percent_decode)
        })
        .and_then(|segment| sanitize_filename(&segment))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// Filename presented to the client: the header's name, else the URL's, with
/// an extension derived from the content type when it has none.
pub fn resolve_filename(url: &str, content_disposition: Option<&str>, content_type: &str) -> String {
    let name = content_disposition
        .and_then(filename_from_content_disposition)
        .unwrap_or_else(|| filename_from_url(url));
    let (_, extension) = split_extension(&name);
    match extension_for_content_type(content_type) {
        Some(derived) if extension.is_empty() => format!("{name}{derived}"),
        _ => name,
    }
}

/// Collision-resistant on-disk name: `<stem>-<8 hex chars><ext>`.
pub fn unique_name(filename: &str) -> String {
    let (stem, extension) = split_extension(filename);
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{stem}-{}{extension}", &id[..8])
}

/// Directory holding in-flight downloads.
#[derive(Debug, Clone)]
pub struct DownloadStore {
    dir: PathBuf,
}

impl DownloadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stream `body` into a new temporary file.
    ///
    /// The directory is created if missing. When the stream yields an error
    /// the partial file is deleted and the error returned.
    pub async fn save<S, B, E>(
        &self,
        filename: &str,
        content_type: &str,
        body: S,
    ) -> Result<TempDownload>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(unique_name(filename));
        tracing::debug!("Saving to: {}", path.display());

        match write_stream(&path, body).await {
            Ok(size) => {
                tracing::debug!("Download complete: {} ({size} bytes)", path.display());
                Ok(TempDownload {
                    path,
                    filename: filename.to_string(),
                    content_type: content_type.to_string(),
                    size,
                    removed: false,
                })
            }
            Err(e) => {
                if let Err(unlink) = tokio::fs::remove_file(&path).await {
                    tracing::error!("Error deleting incomplete file {}: {unlink}", path.display());
                }
                Err(e)
            }
        }
    }
}

async fn write_stream<S, B, E>(path: &Path, body: S) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut body = std::pin::pin!(body);
    let mut size = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ProxyError::Io(std::io::Error::other(e)))?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        size += bytes.len() as u64;
    }
    file.flush().await?;
    Ok(size)
}

/// A completed download waiting to be served.
///
/// Call [`remove`](Self::remove) once the response has been sent. If the
/// value is dropped first, the file is deleted synchronously.
#[derive(Debug)]
pub struct TempDownload {
    path: PathBuf,
    filename: String,
    content_type: String,
    size: u64,
    removed: bool,
}

impl TempDownload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name presented to the client.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// `Content-Disposition` header value for the response.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename.replace('"', "'"))
    }

    /// Delete the file.
    pub async fn remove(mut self) -> Result<()> {
        self.removed = true;
        tokio::fs::remove_file(&self.path).await?;
        tracing::debug!("Temporary file deleted: {}", self.path.display());
        Ok(())
    }
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Error deleting file {}: {e}", self.path.display()),
        }
    }
}
