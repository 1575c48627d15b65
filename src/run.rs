//! Batch orchestration: validate inputs, then sequence upload → poll.
//!
//! This is the primary entry point of the core pipeline. It owns the rules
//! about what raises and what gets reported: configuration and
//! upload-target-request problems raise, everything per-file is folded into
//! the returned [`BatchReport`]. Every file that makes it past validation is
//! represented in the report's `details` with a final status — no file is
//! silently dropped.

use crate::client::MineruClient;
use crate::config::{BatchConfig, OutputFormat};
use crate::error::Mineru2MdError;
use crate::pipeline::{discover, poll, upload};
use crate::report::BatchReport;
use std::path::PathBuf;
use tracing::{info, warn};

/// Convert a batch of PDF files through the extraction service.
///
/// Sequences the full pipeline for one batch:
/// 1. create the output directory and validate every input path
/// 2. request pre-signed upload targets (one call for the whole batch)
/// 3. upload each file sequentially with per-file failure isolation
/// 4. poll until every uploaded file is terminal or `max_wait` passes
/// 5. assemble the report: upload outcomes first, then poll outcomes
///
/// # Errors
/// Returns `Err` only for configuration errors (bad paths, duplicate names)
/// and failures of the upload-target request itself. Per-file upload,
/// conversion and download problems are reported, not raised.
pub async fn convert_batch(
    client: &MineruClient,
    pdf_files: Vec<PathBuf>,
    config: &BatchConfig,
    format: OutputFormat,
    check_duplicate_names: bool,
) -> Result<BatchReport, Mineru2MdError> {
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| {
            Mineru2MdError::Internal(format!(
                "failed to create output directory '{}': {e}",
                config.output_dir.display()
            ))
        })?;

    let mut pdf_files = pdf_files;
    pdf_files.sort();

    if pdf_files.is_empty() {
        return Ok(BatchReport::empty("no PDF files found to convert"));
    }

    discover::validate_pdf_paths(&pdf_files)?;
    if check_duplicate_names {
        discover::ensure_unique_names(&pdf_files)?;
    }

    info!(files = pdf_files.len(), "starting conversion batch");

    // ── Stage 1: request upload targets ─────────────────────────────────
    let handle = client.request_upload_targets(&pdf_files, config).await?;

    // ── Stage 2: upload ─────────────────────────────────────────────────
    let upload_outcomes = upload::upload_all(client, &handle, &pdf_files).await;
    let uploaded_files: Vec<String> = upload_outcomes
        .iter()
        .filter(|o| o.is_success())
        .map(|o| o.file.clone())
        .collect();

    if uploaded_files.is_empty() {
        warn!("every upload failed; skipping poll");
        return Ok(BatchReport {
            pdf_total: pdf_files.len(),
            uploaded: 0,
            completed: 0,
            details: upload_outcomes,
            output_directory: None,
            message: Some("all file uploads failed".to_string()),
        });
    }

    // ── Stage 3: poll, download, relocate ───────────────────────────────
    let poll_outcomes = poll::poll_batch(
        client,
        &handle.batch_id,
        &uploaded_files,
        config,
        format,
    )
    .await?;

    // ── Stage 4: assemble report ────────────────────────────────────────
    let completed = poll_outcomes.iter().filter(|o| o.is_success()).count();
    let uploaded = uploaded_files.len();
    info!(
        total = pdf_files.len(),
        uploaded, completed, "batch finished"
    );

    let mut details = upload_outcomes;
    details.extend(poll_outcomes);

    Ok(BatchReport {
        pdf_total: pdf_files.len(),
        uploaded,
        completed,
        details,
        output_directory: Some(config.output_dir.display().to_string()),
        message: None,
    })
}

/// Validate a caller-supplied single PDF path before building a batch of one.
pub fn validate_single_pdf(path: &PathBuf) -> Result<(), Mineru2MdError> {
    discover::validate_pdf_paths(std::slice::from_ref(path))
}
