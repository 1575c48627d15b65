//! Per-file outcomes and the assembled batch report.
//!
//! The pipeline never throws for a single file's problem — every file that
//! enters a stage leaves it with exactly one [`FileOutcome`] record, success
//! or error. The orchestrator concatenates those records in emission order
//! (all upload outcomes first, then poll/convert/download outcomes) into a
//! [`BatchReport`], which is what the host-protocol tools hand back to the
//! external caller as JSON.

use serde::{Deserialize, Serialize};

/// Pipeline stage a [`FileOutcome`] was produced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Pushing the file's bytes to its pre-signed upload URL.
    Upload,
    /// The remote conversion itself (failure and timeout reports).
    Convert,
    /// Fetching, unpacking and relocating the result archive.
    Download,
}

/// Terminal status of one file in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// One record per file per pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// File name as submitted to the batch (base name, not the full path).
    pub file: String,
    pub stage: Stage,
    pub status: OutcomeStatus,
    /// Human-readable detail: what was saved, or what went wrong.
    pub message: String,
}

impl FileOutcome {
    pub fn success(file: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            stage,
            status: OutcomeStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(file: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            stage,
            status: OutcomeStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Final report for one batch, returned by the tool operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Number of PDF files submitted to the batch.
    pub pdf_total: usize,
    /// Number of files whose upload succeeded.
    pub uploaded: usize,
    /// Number of files whose result archive was downloaded and relocated.
    pub completed: usize,
    /// Ordered per-file records: upload outcomes first, then poll outcomes.
    pub details: Vec<FileOutcome>,
    /// Where the converted documents were written. Absent for early exits
    /// (empty batch, all uploads failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,
    /// Explanation for early exits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchReport {
    /// Report for a batch that never got off the ground (no input files).
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            pdf_total: 0,
            uploaded: 0,
            completed: 0,
            details: Vec::new(),
            output_directory: None,
            message: Some(message.into()),
        }
    }
}
