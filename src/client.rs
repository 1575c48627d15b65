//! HTTP client for the Mineru extraction API.
//!
//! [`MineruClient`] is the one object that knows the base URL, the bearer
//! credential and the reqwest client. It is constructed by the process entry
//! point and passed explicitly through the pipeline — the core stages take no
//! dependency on any global registry.
//!
//! The API wraps every JSON body in a `{code, msg, data}` envelope; `code`
//! zero means success and anything else carries a human-readable `msg`.
//! Pre-signed upload URLs and archive download URLs are plain HTTP targets
//! outside that envelope.
//!
//! [`StatusSource`] is the seam between the poll loop and the network: the
//! client implements it for production, tests inject a fake to exercise the
//! poller without a live endpoint.

use crate::config::BatchConfig;
use crate::error::Mineru2MdError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Production endpoint of the extraction service.
pub const DEFAULT_BASE_URL: &str = "https://mineru.net";

/// Timeout for enveloped JSON calls (upload-target request, status poll).
const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for bulk transfers (file upload, archive download).
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

// ── Wire types ───────────────────────────────────────────────────────────

/// The `{code, msg, data}` envelope every JSON response arrives in.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    msg: Option<String>,
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the envelope, mapping a non-zero code to [`Mineru2MdError::Api`]
    /// and a missing `data` field to a protocol violation.
    fn into_data(self) -> Result<T, Mineru2MdError> {
        if self.code != 0 {
            return Err(Mineru2MdError::Api {
                message: self.msg.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        self.data.ok_or(Mineru2MdError::Protocol {
            detail: "response carried no data field".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct UploadBatchRequest<'a> {
    enable_table: bool,
    language: &'a str,
    extra_formats: &'a [String],
    files: Vec<UploadFileEntry>,
}

#[derive(Debug, Serialize)]
struct UploadFileEntry {
    name: String,
    is_ocr: bool,
}

#[derive(Debug, Deserialize)]
struct UploadBatchData {
    batch_id: Option<String>,
    #[serde(default)]
    file_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractBatchData {
    #[serde(default)]
    extract_result: Vec<FileExtractResult>,
}

/// One file's status as reported by the batch status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FileExtractResult {
    pub file_name: Option<String>,
    /// "done" and "failed" are terminal; any other value leaves the file
    /// pending (the contract defines no other terminal states).
    pub state: Option<String>,
    pub full_zip_url: Option<String>,
    pub err_msg: Option<String>,
}

/// An opaque batch identifier plus the per-file upload targets assigned by
/// the upload-target request. Consumed by the uploader and the poller,
/// discarded after the run.
#[derive(Debug)]
pub struct BatchHandle {
    pub batch_id: String,
    /// file name → pre-signed upload URL.
    pub upload_targets: HashMap<String, String>,
}

// ── Client ───────────────────────────────────────────────────────────────

/// HTTP context for one process: reqwest client, base URL, credential.
#[derive(Debug, Clone)]
pub struct MineruClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl MineruClient {
    /// Client against the production endpoint.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_token)
    }

    /// Client against an explicit endpoint. Tests point this at a mock
    /// server; everything else goes through [`MineruClient::new`].
    pub fn with_base_url(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        }
    }

    /// Request pre-signed upload targets for every file in the batch.
    ///
    /// One call covers the whole batch: the request lists every file name
    /// together with the OCR flag, and the shared table/language/format
    /// options. Fails on a non-zero envelope code, a missing batch id, or an
    /// upload-URL count that does not match the file count — each of those
    /// would leave at least one file unaddressable later.
    pub async fn request_upload_targets(
        &self,
        pdf_files: &[PathBuf],
        config: &BatchConfig,
    ) -> Result<BatchHandle, Mineru2MdError> {
        let body = UploadBatchRequest {
            enable_table: config.enable_table,
            language: &config.language,
            extra_formats: &config.extra_formats,
            files: pdf_files
                .iter()
                .map(|path| UploadFileEntry {
                    name: file_name_of(path),
                    is_ocr: config.is_ocr,
                })
                .collect(),
        };

        let url = format!("{}/api/v4/file-urls/batch", self.base_url);
        debug!(url = %url, files = pdf_files.len(), "requesting upload targets");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .timeout(API_TIMEOUT)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let data: UploadBatchData = response
            .json::<ApiEnvelope<UploadBatchData>>()
            .await?
            .into_data()?;

        let batch_id = data.batch_id.filter(|id| !id.is_empty()).ok_or(
            Mineru2MdError::Protocol {
                detail: "no batch_id in upload-target response".to_string(),
            },
        )?;

        if data.file_urls.len() != pdf_files.len() {
            return Err(Mineru2MdError::Protocol {
                detail: format!(
                    "got {} upload URLs for {} files",
                    data.file_urls.len(),
                    pdf_files.len()
                ),
            });
        }

        let upload_targets = pdf_files
            .iter()
            .map(|p| file_name_of(p))
            .zip(data.file_urls)
            .collect();

        info!(batch_id = %batch_id, "upload targets assigned");
        Ok(BatchHandle {
            batch_id,
            upload_targets,
        })
    }

    /// Stream one file's bytes to its pre-signed target.
    ///
    /// Raw PUT, no JSON envelope; any non-2xx status is a transport error.
    /// The caller decides whether that aborts anything — per the uploader's
    /// contract it never does.
    pub async fn upload_file(&self, upload_url: &str, path: &Path) -> Result<(), Mineru2MdError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Mineru2MdError::Internal(format!("reading '{}': {e}", path.display())))?;
        debug!(url = %upload_url, bytes = bytes.len(), "uploading file");
        self.http
            .put(upload_url)
            .timeout(TRANSFER_TIMEOUT)
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// ── Status source seam ───────────────────────────────────────────────────

/// Where the poll loop gets batch status and result archives from.
///
/// [`MineruClient`] is the production implementation; tests swap in a fake so
/// every poller transition can be exercised without a network.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// One status query for the whole batch.
    ///
    /// A non-zero envelope code fails fast here — unlike per-file transport
    /// problems, a broken status endpoint stalls every file in the batch.
    async fn fetch_batch_status(
        &self,
        batch_id: &str,
    ) -> Result<Vec<FileExtractResult>, Mineru2MdError>;

    /// Fetch one file's result archive.
    async fn fetch_archive(&self, zip_url: &str) -> Result<Vec<u8>, Mineru2MdError>;
}

#[async_trait]
impl StatusSource for MineruClient {
    async fn fetch_batch_status(
        &self,
        batch_id: &str,
    ) -> Result<Vec<FileExtractResult>, Mineru2MdError> {
        let url = format!("{}/api/v4/extract-results/batch/{}", self.base_url, batch_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .timeout(API_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let data: ExtractBatchData = response
            .json::<ApiEnvelope<ExtractBatchData>>()
            .await?
            .into_data()?;
        Ok(data.extract_result)
    }

    async fn fetch_archive(&self, zip_url: &str) -> Result<Vec<u8>, Mineru2MdError> {
        debug!(url = %zip_url, "downloading result archive");
        let response = self
            .http
            .get(zip_url)
            .timeout(TRANSFER_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Base name of a path as the API sees it.
///
/// Batch submissions are keyed by base name, which is why duplicate names are
/// rejected up front on the recursive path.
pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
