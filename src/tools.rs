//! The callable tool surface exposed to the host protocol.
//!
//! Two operations exist: convert one named PDF, or recursively convert every
//! PDF under a directory. Both take a fully-resolved parameter set (the
//! transport layer that parses requests is an external caller, not part of
//! this crate) and return a serialisable [`BatchReport`].
//!
//! [`ToolContext`] replaces what would otherwise be process-wide globals:
//! the process entry point constructs it once and passes it to every tool
//! invocation explicitly. The core pipeline below this layer never reaches
//! for the environment or any registry itself.

use crate::client::{MineruClient, DEFAULT_BASE_URL};
use crate::config::{
    build_extra_formats, BatchConfig, OutputFormat, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL,
    MIN_MAX_WAIT, MIN_POLL_INTERVAL,
};
use crate::error::Mineru2MdError;
use crate::pipeline::discover;
use crate::report::BatchReport;
use crate::run;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Environment variable consulted when no explicit api_token is supplied.
pub const API_TOKEN_ENV: &str = "MINERU_API_TOKEN";

/// Per-process context for tool invocations.
///
/// Owns the service base URL and credential resolution. Constructed by the
/// process entry point; the pipeline itself takes no dependency on it.
#[derive(Debug, Clone)]
pub struct ToolContext {
    base_url: String,
}

impl ToolContext {
    /// Context against the production endpoint.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Context against an explicit endpoint (tests, self-hosted gateways).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Resolve the bearer credential: explicit override first, then the
    /// `MINERU_API_TOKEN` environment variable. Absence of both is a
    /// configuration error, raised before any network call.
    fn resolve_token(&self, explicit: Option<&str>) -> Result<String, Mineru2MdError> {
        if let Some(token) = explicit {
            if !token.trim().is_empty() {
                return Ok(token.to_string());
            }
        }
        match std::env::var(API_TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(Mineru2MdError::MissingApiToken {
                env_var: API_TOKEN_ENV,
            }),
        }
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuning parameters shared by both tools. All optional; defaults match the
/// service's documented behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversionParams {
    /// Bearer credential override; falls back to `MINERU_API_TOKEN`.
    pub api_token: Option<String>,
    /// Language hint, default "ch".
    pub language: Option<String>,
    /// Ask the service to extract tables, default true.
    pub enable_table: Option<bool>,
    /// Requested output renditions; "html" (and "markdown") are ensured.
    pub extra_formats: Option<Vec<String>>,
    /// Seconds between status polls, default 3, floor 1.
    pub poll_interval_secs: Option<f64>,
    /// Ceiling on poll-loop wall time in seconds, default 1800, floor 60.
    pub max_wait_secs: Option<f64>,
    /// Renumber assets and rewrite references, default true.
    pub rename_assets: Option<bool>,
    /// Request OCR, default true.
    pub is_ocr: Option<bool>,
}

/// Parameters for [`convert_single_pdf_to_markdown`].
#[derive(Debug, Clone, Deserialize)]
pub struct SinglePdfParams {
    pub pdf_path: String,
    pub output_dir: String,
    #[serde(flatten)]
    pub options: ConversionParams,
}

/// Parameters for [`convert_directory_pdfs_to_markdown`].
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryParams {
    pub pdf_dir: String,
    pub output_dir: String,
    #[serde(flatten)]
    pub options: ConversionParams,
}

/// Convert a single named PDF to Markdown.
///
/// Validates the path locally, then runs the full upload → poll → download
/// pipeline for a batch of one. No duplicate-name check: a single file
/// cannot collide with itself.
pub async fn convert_single_pdf_to_markdown(
    ctx: &ToolContext,
    params: SinglePdfParams,
) -> Result<BatchReport, Mineru2MdError> {
    let pdf_path = PathBuf::from(&params.pdf_path);
    run::validate_single_pdf(&pdf_path)?;
    info!(pdf = %pdf_path.display(), "tool call: convert single PDF");

    let pdf_dir = pdf_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let (client, config) = build_run(
        ctx,
        &params.options,
        pdf_dir,
        PathBuf::from(&params.output_dir),
        OutputFormat::Markdown,
    )?;

    run::convert_batch(&client, vec![pdf_path], &config, OutputFormat::Markdown, false).await
}

/// Recursively convert every PDF under a directory to Markdown.
///
/// Discovery is recursive and sorted; duplicate base names across
/// subdirectories are rejected before any network call because the remote
/// API keys results by file name.
pub async fn convert_directory_pdfs_to_markdown(
    ctx: &ToolContext,
    params: DirectoryParams,
) -> Result<BatchReport, Mineru2MdError> {
    let pdf_dir = PathBuf::from(&params.pdf_dir);
    if !pdf_dir.is_dir() {
        return Err(Mineru2MdError::DirectoryNotFound { path: pdf_dir });
    }
    info!(dir = %pdf_dir.display(), "tool call: convert directory PDFs");

    let pdf_files = discover::list_pdf_files(&pdf_dir, true);
    let (client, config) = build_run(
        ctx,
        &params.options,
        pdf_dir,
        PathBuf::from(&params.output_dir),
        OutputFormat::Markdown,
    )?;

    run::convert_batch(&client, pdf_files, &config, OutputFormat::Markdown, true).await
}

/// Resolve the credential and fold the optional tuning parameters into a
/// [`BatchConfig`] plus the client that will execute the run.
fn build_run(
    ctx: &ToolContext,
    options: &ConversionParams,
    pdf_dir: PathBuf,
    output_dir: PathBuf,
    format: OutputFormat,
) -> Result<(MineruClient, BatchConfig), Mineru2MdError> {
    let token = ctx.resolve_token(options.api_token.as_deref())?;
    let extra_formats = build_extra_formats(options.extra_formats.as_deref(), format);

    let config = BatchConfig::builder()
        .api_token(token.as_str())
        .pdf_dir(pdf_dir)
        .output_dir(output_dir)
        .language(options.language.clone().unwrap_or_else(|| {
            crate::config::DEFAULT_LANGUAGE.to_string()
        }))
        .enable_table(options.enable_table.unwrap_or(true))
        .extra_formats(extra_formats)
        .poll_interval(secs_duration(
            options.poll_interval_secs,
            DEFAULT_POLL_INTERVAL,
            MIN_POLL_INTERVAL,
        ))
        .max_wait(secs_duration(
            options.max_wait_secs,
            DEFAULT_MAX_WAIT,
            MIN_MAX_WAIT,
        ))
        .rename_assets(options.rename_assets.unwrap_or(true))
        .is_ocr(options.is_ocr.unwrap_or(true))
        .build()?;

    let client = MineruClient::with_base_url(ctx.base_url.as_str(), token);
    Ok((client, config))
}

/// Convert caller-supplied seconds to a `Duration` without ever panicking.
///
/// Host requests arrive as raw JSON numbers, so negative, NaN and
/// overflowing values are all reachable inputs; they land on the stage
/// floor. Small-but-valid values are clamped by the builder.
fn secs_duration(secs: Option<f64>, default: Duration, floor: Duration) -> Duration {
    match secs {
        Some(s) => Duration::try_from_secs_f64(s).unwrap_or(floor),
        None => default,
    }
}
