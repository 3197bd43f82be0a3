//! Source identification and plain-text extraction.
//!
//! A source is either a filesystem path to a PDF or an absolute http(s) URL.
//! Extraction itself is a collaborator behind [`SourceExtractor`]: the
//! built-in [`DocumentExtractor`] fetches web pages with `reqwest` and pulls
//! paragraph text with `scraper`, and shells out to `pdftotext` for PDFs.
//! Zero-length extraction is a failure; downstream stages require text.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::types::RagError;

/// A validated source identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Filesystem path ending in `.pdf` (case-insensitive).
    Pdf(PathBuf),
    /// Absolute `http`/`https` URL.
    Web(Url),
}

impl SourceRef {
    /// Classify a raw source string.
    ///
    /// Anything that is neither a `.pdf` path nor an http(s) URL fails with
    /// [`RagError::UnsupportedSource`] immediately, before any shared state
    /// is touched.
    pub fn parse(raw: &str) -> Result<Self, RagError> {
        let trimmed = raw.trim();
        if trimmed.to_ascii_lowercase().ends_with(".pdf") {
            return Ok(SourceRef::Pdf(PathBuf::from(trimmed)));
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|_| RagError::UnsupportedSource(trimmed.to_string()))?;
            return Ok(SourceRef::Web(url));
        }
        Err(RagError::UnsupportedSource(trimmed.to_string()))
    }

    /// Human-readable label used in reports and error messages.
    pub fn label(&self) -> String {
        match self {
            SourceRef::Pdf(path) => path.display().to_string(),
            SourceRef::Web(url) => url.to_string(),
        }
    }
}

/// Source adapter collaborator: yields the plain text behind a source.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    async fn extract(&self, source: &SourceRef) -> Result<String, RagError>;
}

/// Default extractor covering both supported source kinds.
#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    client: Client,
}

impl DocumentExtractor {
    pub fn new() -> Result<Self, RagError> {
        let client = Client::builder()
            .user_agent(concat!("ragfuse/", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls()
            .build()
            .map_err(|err| RagError::extraction("http client", err.to_string()))?;
        Ok(Self { client })
    }

    /// Build an extractor around an existing HTTP client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn extract_web(&self, url: &Url) -> Result<String, RagError> {
        let label = url.as_str();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| RagError::extraction(label, err.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|err| RagError::extraction(label, err.to_string()))?;
        debug!(url = label, bytes = body.len(), "fetched page");
        let text = paragraph_text(&body);
        if text.trim().is_empty() {
            return Err(RagError::extraction(label, "page contains no paragraph text"));
        }
        Ok(text)
    }

    async fn extract_pdf(&self, path: &Path) -> Result<String, RagError> {
        let label = path.display().to_string();
        let output = Command::new("pdftotext")
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .await
            .map_err(|err| {
                RagError::extraction(label.as_str(), format!("failed to run pdftotext: {err}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RagError::extraction(
                label.as_str(),
                format!("pdftotext failed: {}", stderr.trim()),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).to_string();
        if text.trim().is_empty() {
            return Err(RagError::extraction(
                label.as_str(),
                "pdftotext produced no text",
            ));
        }
        debug!(path = %label, chars = text.len(), "extracted pdf text");
        Ok(text)
    }
}

#[async_trait]
impl SourceExtractor for DocumentExtractor {
    async fn extract(&self, source: &SourceRef) -> Result<String, RagError> {
        match source {
            SourceRef::Web(url) => self.extract_web(url).await,
            SourceRef::Pdf(path) => self.extract_pdf(path).await,
        }
    }
}

/// Concatenated text of all `<p>` elements, space-separated.
fn paragraph_text(body: &str) -> String {
    let document = Html::parse_document(body);
    // "p" is a valid selector; parse cannot fail on it.
    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };
    let mut out = String::new();
    for paragraph in document.select(&selector) {
        for piece in paragraph.text() {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(piece);
        }
    }
    out
}
