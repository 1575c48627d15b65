//! Configuration types for a Mineru conversion batch.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Keeping every knob in one immutable struct makes
//! it trivial to share a run's configuration across pipeline stages,
//! serialise it for logging, and diff two runs to understand why their
//! reports differ. The config is created once per invocation and never
//! mutated afterwards.
//!
//! This module also owns output-format resolution: [`OutputFormat`] and
//! [`build_extra_formats`] decide which renditions the remote service is
//! asked to produce, and which archive member counts as the primary
//! document when results come back.

use crate::error::Mineru2MdError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default language hint sent to the extraction service.
pub const DEFAULT_LANGUAGE: &str = "ch";

/// Default delay between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default ceiling on how long one batch may stay in the poll loop.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(1800);

/// Floor the poll interval is clamped to.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Floor the max wait is clamped to.
pub const MIN_MAX_WAIT: Duration = Duration::from_secs(60);

/// The service always produces an HTML rendition internally, so "html" is the
/// baseline extra-formats request.
pub const DEFAULT_EXTRA_FORMATS: &[&str] = &["html"];

/// The rendition of the result archive treated as the primary document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Markdown,
}

impl OutputFormat {
    /// Parse a caller-supplied format string.
    ///
    /// Trims and lowercases the input and accepts "md" as an alias for
    /// "markdown". Anything other than html/markdown is rejected.
    pub fn parse(input: &str) -> Result<Self, Mineru2MdError> {
        match input.trim().to_lowercase().as_str() {
            "html" => Ok(OutputFormat::Html),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(Mineru2MdError::InvalidFormat {
                input: input.to_string(),
            }),
        }
    }

    /// File extension of the primary document, dot included.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Html => ".html",
            OutputFormat::Markdown => ".md",
        }
    }

    /// The format name the remote API uses in `extra_formats`.
    pub fn as_api_str(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "markdown",
        }
    }
}

/// Build the `extra_formats` list actually sent upstream.
///
/// Starts from the caller's list (or the single-element default `["html"]`),
/// lowercases entries and drops empty ones, then guarantees membership of
/// "html" — the service renders HTML unconditionally, and asking for it keeps
/// the archive contents predictable — and of "markdown" when that is the
/// requested output format, so the primary document is guaranteed to exist in
/// the result archive. Order is preserved; entries are deduplicated by
/// membership only, exactly as the remote API tolerates.
pub fn build_extra_formats(requested: Option<&[String]>, format: OutputFormat) -> Vec<String> {
    let mut formats: Vec<String> = match requested {
        Some(list) if !list.is_empty() => list.to_vec(),
        _ => DEFAULT_EXTRA_FORMATS.iter().map(|s| s.to_string()).collect(),
    };
    formats = formats
        .iter()
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    if !formats.iter().any(|f| f == "html") {
        formats.push("html".to_string());
    }
    if format == OutputFormat::Markdown && !formats.iter().any(|f| f == "markdown") {
        formats.push("markdown".to_string());
    }
    formats
}

/// Immutable configuration for one conversion batch.
///
/// Built via [`BatchConfig::builder()`].
///
/// # Example
/// ```rust
/// use mineru2md::BatchConfig;
/// use std::time::Duration;
///
/// let config = BatchConfig::builder()
///     .api_token("sk-...")
///     .output_dir("out")
///     .language("en")
///     .poll_interval(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Bearer credential for the extraction API. Never logged.
    pub api_token: String,

    /// Directory the batch's PDFs were discovered in. Informational; the
    /// actual file list is passed to the orchestrator explicitly.
    pub pdf_dir: PathBuf,

    /// Directory the converted documents and asset directories land in.
    /// Created on demand; also hosts the per-download scratch directories.
    pub output_dir: PathBuf,

    /// Language hint forwarded to the extraction service. Default: "ch".
    pub language: String,

    /// Ask the service to extract tables. Default: true.
    pub enable_table: bool,

    /// Output renditions requested from the service, normalised via
    /// [`build_extra_formats`].
    pub extra_formats: Vec<String>,

    /// Delay between two status polls. Default: 3 s, floor: 1 s.
    ///
    /// The floor keeps a misconfigured caller from hammering the status
    /// endpoint in a tight loop.
    pub poll_interval: Duration,

    /// Ceiling on total poll-loop wall time. Default: 30 min, floor: 60 s.
    ///
    /// Conversion of a large scanned PDF routinely takes minutes; a floor
    /// below that would time out batches that were about to succeed.
    pub max_wait: Duration,

    /// Renumber extracted asset files and rewrite references to them in the
    /// primary document. Default: true.
    pub rename_assets: bool,

    /// Request OCR for every file in the batch. Default: true.
    pub is_ocr: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            pdf_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            enable_table: true,
            extra_formats: DEFAULT_EXTRA_FORMATS.iter().map(|s| s.to_string()).collect(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            rename_assets: true,
            is_ocr: true,
        }
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = token.into();
        self
    }

    pub fn pdf_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdf_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn enable_table(mut self, v: bool) -> Self {
        self.config.enable_table = v;
        self
    }

    pub fn extra_formats(mut self, formats: Vec<String>) -> Self {
        self.config.extra_formats = formats;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.config.max_wait = wait.max(MIN_MAX_WAIT);
        self
    }

    pub fn rename_assets(mut self, v: bool) -> Self {
        self.config.rename_assets = v;
        self
    }

    pub fn is_ocr(mut self, v: bool) -> Self {
        self.config.is_ocr = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, Mineru2MdError> {
        let c = &self.config;
        if c.api_token.trim().is_empty() {
            return Err(Mineru2MdError::InvalidConfig(
                "api_token must not be empty".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(Mineru2MdError::InvalidConfig(
                "language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
