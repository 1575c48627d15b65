//! Asset renaming: deterministic renumbering plus reference rewriting.
//!
//! The service names extracted images after content hashes, which makes the
//! output tree unreadable and collides badly when several documents share an
//! asset directory. This stage renames each image to
//! `{document base name}_{n}{ext}` — numbering is per directory, starts at 1
//! and advances only on files that are actually renamed — and then rewrites
//! every quoted reference (`"dir/old"` or `'dir/old'`) inside the rendered
//! documents to the new relative path.
//!
//! Listing is in fixed lexicographic order so the same archive always
//! produces the same numbering.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image extensions that take part in renumbering. Anything else is left
/// untouched and does not advance the counter.
const RENAMED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg"];

/// Renumber asset files in place and rewrite references in `text_files`.
///
/// `asset_dirs` are the archive's asset directories (still at their scratch
/// location), `text_files` the primary rendered documents. No-op when there
/// are no asset directories or no file qualifies for renaming.
pub fn rename_assets(
    asset_dirs: &[PathBuf],
    text_files: &[PathBuf],
    base_name: &str,
) -> io::Result<()> {
    if asset_dirs.is_empty() {
        return Ok(());
    }

    // old relative path → new relative path, both as "{dir name}/{file name}"
    let mut rename_map: BTreeMap<String, String> = BTreeMap::new();

    for asset_dir in asset_dirs {
        let dir_name = match asset_dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };

        let mut files: Vec<PathBuf> = fs::read_dir(asset_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let mut counter = 1usize;
        for file in files {
            let Some(extension) = renamed_extension(&file) else {
                continue;
            };
            let old_name = match file.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            let new_name = format!("{base_name}_{counter}{extension}");
            counter += 1;
            fs::rename(&file, file.with_file_name(&new_name))?;
            rename_map.insert(
                format!("{dir_name}/{old_name}"),
                format!("{dir_name}/{new_name}"),
            );
        }
    }

    if rename_map.is_empty() {
        return Ok(());
    }
    debug!(renamed = rename_map.len(), "assets renumbered");

    for text_file in text_files {
        let mut content = fs::read_to_string(text_file)?;
        for (old, new) in &rename_map {
            // Quoted occurrences only: attribute values and markdown titles.
            // A bare substring match would corrupt paths that merely contain
            // another path as a prefix.
            content = content.replace(&format!("\"{old}\""), &format!("\"{new}\""));
            content = content.replace(&format!("'{old}'"), &format!("'{new}'"));
        }
        fs::write(text_file, content)?;
    }

    Ok(())
}

/// The file's extension, lowercased and dot-prefixed, when it is one of the
/// renamed image kinds.
fn renamed_extension(path: &Path) -> Option<String> {
    let ext = format!(".{}", path.extension()?.to_string_lossy().to_lowercase());
    RENAMED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}
