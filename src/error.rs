//! Error types for the mineru2md library.
//!
//! Two distinct failure modes get two distinct representations:
//!
//! * [`Mineru2MdError`] — **Fatal**: the batch cannot proceed at all
//!   (missing credential, invalid input path, the upload-target request was
//!   rejected). Returned as `Err(Mineru2MdError)` from the top-level
//!   tool operations.
//!
//! * Per-file failures — **Non-fatal**: one file's upload or download went
//!   wrong but the rest of the batch is fine. These are never raised; they
//!   become [`crate::report::FileOutcome`] records inside the final
//!   [`crate::report::BatchReport`] so callers can inspect partial success
//!   rather than losing the whole batch to one bad file.
//!
//! One deliberate asymmetry: a transport failure on the *status poll* is
//! fatal and aborts the whole loop, while transport failures on individual
//! uploads and archive downloads are recorded per file. The status endpoint
//! answers for the batch as a whole, so an unreachable status endpoint means
//! no file can make progress.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mineru2md library.
///
/// File-level failures are stored in [`crate::report::FileOutcome`] rather
/// than propagated here.
#[derive(Debug, Error)]
pub enum Mineru2MdError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No API token was supplied and the environment variable is unset.
    #[error(
        "Missing Mineru API token.\nPass api_token explicitly or set the {env_var} environment variable."
    )]
    MissingApiToken { env_var: &'static str },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The input path exists but is not a `.pdf` file.
    #[error("Only PDF files are supported, got: '{path}'")]
    NotAPdf { path: PathBuf },

    /// The directory given to the recursive tool does not exist.
    #[error("Directory not found: '{path}'")]
    DirectoryNotFound { path: PathBuf },

    /// Two or more files in one batch share a base name.
    ///
    /// The remote API keys status responses by file name, so duplicates would
    /// make results ambiguous. Raised before any network call.
    #[error("Duplicate PDF file names in batch: {names}\nRename the files so every name is unique.")]
    DuplicateNames { names: String },

    /// The requested output format is not "html", "markdown" or the alias "md".
    #[error("Unsupported output format '{input}': expected \"html\" or \"markdown\" (alias \"md\")")]
    InvalidFormat { input: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Remote protocol errors ────────────────────────────────────────────
    /// The API envelope carried a non-zero status code.
    #[error("Mineru API error: {message}")]
    Api { message: String },

    /// The response was well-formed HTTP but violated the API contract
    /// (missing batch id, wrong number of upload URLs, ...).
    #[error("Mineru API protocol violation: {detail}")]
    Protocol { detail: String },

    // ── Transport errors ──────────────────────────────────────────────────
    /// A network-level failure on a request whose errors are not isolated
    /// per file (the upload-target request and the status poll).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
