//! Uploader: push each file's bytes to its assigned pre-signed target.
//!
//! Uploads run strictly sequentially — the remote service's pre-signed URLs
//! impose no ordering, but one in-flight transfer at a time keeps memory and
//! bandwidth predictable. Failure isolation is per file, never batch-wide: a
//! missing target or a transport failure produces an error outcome for that
//! file and the loop carries on. Every file therefore leaves this stage with
//! exactly one [`FileOutcome`].

use crate::client::{file_name_of, BatchHandle, MineruClient};
use crate::report::{FileOutcome, Stage};
use std::path::PathBuf;
use tracing::{info, warn};

/// Upload every file in the batch, one after the other.
///
/// Returns one outcome per file, in the order the files were supplied.
pub async fn upload_all(
    client: &MineruClient,
    handle: &BatchHandle,
    pdf_files: &[PathBuf],
) -> Vec<FileOutcome> {
    let mut outcomes = Vec::with_capacity(pdf_files.len());

    for path in pdf_files {
        let name = file_name_of(path);
        let Some(upload_url) = handle.upload_targets.get(&name) else {
            warn!(file = %name, "no upload target assigned");
            outcomes.push(FileOutcome::error(
                name.as_str(),
                Stage::Upload,
                "no upload target assigned",
            ));
            continue;
        };

        match client.upload_file(upload_url, path).await {
            Ok(()) => {
                info!(file = %name, "upload complete");
                outcomes.push(FileOutcome::success(name.as_str(), Stage::Upload, "uploaded"));
            }
            Err(e) => {
                warn!(file = %name, error = %e, "upload failed");
                outcomes.push(FileOutcome::error(
                    name.as_str(),
                    Stage::Upload,
                    format!("upload failed: {e}"),
                ));
            }
        }
    }

    outcomes
}
