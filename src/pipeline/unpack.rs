//! Archive unpacking and relocation of conversion results.
//!
//! A finished file arrives as a zip archive containing the rendered document
//! (HTML and/or Markdown) plus asset directories of referenced images. This
//! stage extracts the archive into a uniquely named scratch directory,
//! classifies the members, optionally renumbers assets, and moves everything
//! into its final place under the output root.
//!
//! ## Why scratch space lives under the output root
//!
//! The scratch directory is a [`tempfile::TempDir`] created *inside* the
//! output directory, so the final relocation is a same-filesystem `rename` —
//! never a cross-device copy. Dropping the `TempDir` removes whatever is
//! left of it on every exit path, success, error or panic.
//!
//! Nothing here propagates errors: the whole stage collapses into a single
//! download-stage [`FileOutcome`] so one malformed archive cannot abort its
//! sibling files.

use crate::config::OutputFormat;
use crate::pipeline::assets;
use crate::report::{FileOutcome, Stage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Directory names the service uses for auxiliary image files.
const ASSET_DIR_NAMES: &[&str] = &["figure", "images", "assets"];

/// Classified contents of an extracted result archive.
#[derive(Debug, Default)]
struct ArchiveLayout {
    /// First `.html` file in sorted traversal order, if any.
    html_file: Option<PathBuf>,
    /// First `.md` file in sorted traversal order, if any.
    markdown_file: Option<PathBuf>,
    /// Every directory whose name matches a known asset-directory name.
    asset_dirs: Vec<PathBuf>,
}

/// Unpack one result archive and relocate its contents into `output_dir`.
///
/// Blocking fs work — callers drive this through `spawn_blocking`. Always
/// returns a download-stage outcome; the scratch directory is removed no
/// matter which path is taken.
pub fn unpack_and_relocate(
    archive_bytes: &[u8],
    file_name: &str,
    output_dir: &Path,
    format: OutputFormat,
    rename_assets: bool,
) -> FileOutcome {
    match process_archive(archive_bytes, file_name, output_dir, format, rename_assets) {
        Ok(message) => FileOutcome::success(file_name, Stage::Download, message),
        Err(message) => {
            warn!(file = %file_name, error = %message, "archive processing failed");
            FileOutcome::error(file_name, Stage::Download, message)
        }
    }
}

fn process_archive(
    archive_bytes: &[u8],
    file_name: &str,
    output_dir: &Path,
    format: OutputFormat,
    rename_assets: bool,
) -> Result<String, String> {
    fs::create_dir_all(output_dir)
        .map_err(|e| format!("failed to create output directory: {e}"))?;

    // Uniquely named per download; removed on drop, every exit path.
    let scratch = tempfile::Builder::new()
        .prefix(".mineru2md-")
        .tempdir_in(output_dir)
        .map_err(|e| format!("failed to create scratch directory: {e}"))?;

    zip::ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| format!("failed to open result archive: {e}"))?
        .extract(scratch.path())
        .map_err(|e| format!("failed to extract result archive: {e}"))?;

    let layout = scan_archive(scratch.path());
    debug!(
        file = %file_name,
        html = layout.html_file.is_some(),
        markdown = layout.markdown_file.is_some(),
        asset_dirs = layout.asset_dirs.len(),
        "archive scanned"
    );

    let primary = match format {
        OutputFormat::Html => layout.html_file.as_deref().ok_or_else(|| {
            "no HTML file found in result archive".to_string()
        })?,
        OutputFormat::Markdown => layout.markdown_file.as_deref().ok_or_else(|| {
            "no Markdown file found in result archive; \
             ensure extra_formats includes \"markdown\""
                .to_string()
        })?,
    };

    let base_name = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    if rename_assets {
        // Both renditions reference the same assets; rewrite whichever are
        // present so neither ends up with dangling links.
        let text_files: Vec<PathBuf> = [&layout.html_file, &layout.markdown_file]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        assets::rename_assets(&layout.asset_dirs, &text_files, &base_name)
            .map_err(|e| format!("failed to rename assets: {e}"))?;
    }

    let final_doc_path = output_dir.join(format!("{base_name}{}", format.extension()));
    if let Some(parent) = final_doc_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create output directory: {e}"))?;
    }
    fs::rename(primary, &final_doc_path)
        .map_err(|e| format!("failed to move document into place: {e}"))?;

    for asset_dir in &layout.asset_dirs {
        if !asset_dir.exists() {
            continue;
        }
        let dir_name = asset_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = output_dir.join(&dir_name);
        move_or_merge_dir(asset_dir, &target)
            .map_err(|e| format!("failed to relocate asset directory '{dir_name}': {e}"))?;
    }

    let saved = final_doc_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!(file = %file_name, saved = %saved, "result relocated");
    Ok(format!("saved {saved}"))
}

/// Classify the extracted tree: first document file of each kind in sorted
/// traversal order, plus every asset directory (all of them, not just one).
fn scan_archive(root: &Path) -> ArchiveLayout {
    let mut layout = ArchiveLayout::default();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() {
            match extension_lowercase(path).as_deref() {
                Some("html") if layout.html_file.is_none() => {
                    layout.html_file = Some(path.to_path_buf());
                }
                Some("md") if layout.markdown_file.is_none() => {
                    layout.markdown_file = Some(path.to_path_buf());
                }
                _ => {}
            }
        } else if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if ASSET_DIR_NAMES.contains(&name.as_str()) {
                layout.asset_dirs.push(path.to_path_buf());
            }
        }
    }
    layout
}

/// Move `src` to `target`, merging into an existing directory of the same
/// name. On a file-name collision the incoming file wins.
fn move_or_merge_dir(src: &Path, target: &Path) -> std::io::Result<()> {
    if target.exists() {
        merge_into(src, target)?;
        fs::remove_dir_all(src)?;
        Ok(())
    } else {
        fs::rename(src, target)
    }
}

fn merge_into(src: &Path, target: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&dest)?;
            merge_into(&entry.path(), &dest)?;
        } else {
            // rename replaces an existing file, which is the documented
            // later-write-wins collision rule
            fs::rename(entry.path(), &dest)?;
        }
    }
    Ok(())
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}
