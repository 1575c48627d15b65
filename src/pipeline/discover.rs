//! Input discovery: find the PDFs going into a batch and validate them.
//!
//! Everything here runs before the first network call, so every failure is a
//! configuration error the caller can fix locally. Discovery is sorted so a
//! batch submits files in a deterministic order regardless of directory
//! enumeration order on the underlying filesystem.

use crate::client::file_name_of;
use crate::error::Mineru2MdError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// List the `.pdf` files under `dir`, sorted by path.
///
/// Non-recursive mode looks at direct children only; recursive mode walks
/// the whole tree. Matching is case-insensitive on the extension.
pub fn list_pdf_files(dir: &Path, recursive: bool) -> Vec<PathBuf> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && has_pdf_extension(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    debug!(dir = %dir.display(), recursive, count = files.len(), "discovered PDF files");
    files
}

/// Validate that every path exists, is a regular file, and ends in `.pdf`.
pub fn validate_pdf_paths(pdf_files: &[PathBuf]) -> Result<(), Mineru2MdError> {
    for path in pdf_files {
        if !path.is_file() {
            return Err(Mineru2MdError::FileNotFound { path: path.clone() });
        }
        if !has_pdf_extension(path) {
            return Err(Mineru2MdError::NotAPdf { path: path.clone() });
        }
    }
    Ok(())
}

/// Reject a batch containing two files with the same base name.
///
/// The status endpoint keys results by file name, so a collision would make
/// responses ambiguous. Only the recursive entry path enforces this — a flat
/// directory cannot contain duplicates in the first place.
pub fn ensure_unique_names(pdf_files: &[PathBuf]) -> Result<(), Mineru2MdError> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for path in pdf_files {
        let name = file_name_of(path);
        if !seen.insert(name.clone()) {
            duplicates.insert(name);
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(Mineru2MdError::DuplicateNames {
            names: duplicates.into_iter().collect::<Vec<_>>().join(", "),
        })
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
