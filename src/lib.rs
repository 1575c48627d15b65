//! # mineru2md
//!
//! Batch-convert PDF documents to Markdown or HTML through the Mineru
//! document-extraction API.
//!
//! ## Why this crate?
//!
//! Local PDF-to-text tooling struggles with scanned documents, complex
//! layouts and embedded figures. The Mineru service does the heavy lifting
//! remotely; what remains on the client side — and what this crate
//! implements — is the orchestration of a multi-stage, partially-failable
//! batch pipeline: request upload targets for N files in one call, upload
//! each file with per-file failure isolation, poll until every file reaches
//! a terminal state, then download, unpack and relocate each result archive
//! into the output tree.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Discover  find and validate the batch's files (no network yet)
//!  ├─ 2. Targets   one batch call assigns a pre-signed URL per file
//!  ├─ 3. Upload    sequential PUTs, one failure never aborts siblings
//!  ├─ 4. Poll      pending → {done, failed, timeout} per file
//!  ├─ 5. Unpack    zip → scratch dir → classify members
//!  └─ 6. Relocate  document to {stem}.md, asset dirs merged into place
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mineru2md::{convert_single_pdf_to_markdown, SinglePdfParams, ToolContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from MINERU_API_TOKEN unless passed explicitly
//!     let ctx = ToolContext::new();
//!     let report = convert_single_pdf_to_markdown(
//!         &ctx,
//!         SinglePdfParams {
//!             pdf_path: "paper.pdf".into(),
//!             output_dir: "out".into(),
//!             options: Default::default(),
//!         },
//!     )
//!     .await?;
//!     println!("{}/{} files converted", report.completed, report.pdf_total);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Configuration problems and a rejected upload-target request raise
//! [`Mineru2MdError`]; everything that goes wrong for an individual file —
//! upload failure, remote conversion failure, malformed result archive,
//! timeout — becomes a [`FileOutcome`] record in the returned
//! [`BatchReport`] instead. Every submitted file is represented in the
//! report with a final status.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod run;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{BatchHandle, FileExtractResult, MineruClient, StatusSource};
pub use config::{build_extra_formats, BatchConfig, BatchConfigBuilder, OutputFormat};
pub use error::Mineru2MdError;
pub use report::{BatchReport, FileOutcome, OutcomeStatus, Stage};
pub use run::convert_batch;
pub use tools::{
    convert_directory_pdfs_to_markdown, convert_single_pdf_to_markdown, ConversionParams,
    DirectoryParams, SinglePdfParams, ToolContext, API_TOKEN_ENV,
};
