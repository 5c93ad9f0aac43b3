//! Gathering annotation sources from disk.
//!
//! Decoders take text, not paths. This module reads files (or walks a
//! directory for the source format's extension) into [`SourceItem`]s and,
//! when an images directory is given, pairs each annotation file with the
//! image sharing its stem so formats without a file name still get one.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::Format;
use crate::error::AnnoconvError;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "png", "jpeg", "bmp", "webp"];

/// One annotation file's content plus what we know about its image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceItem {
    /// Where the content came from; used in error messages.
    pub name: String,
    pub content: String,
    /// File name for formats that do not carry one.
    pub file_name: Option<String>,
    /// Image file for size probing.
    pub image_path: Option<PathBuf>,
}

impl SourceItem {
    /// An in-memory source with no image information.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Reads `input` as sources of `format`.
///
/// A file is read as is. A directory is walked recursively for files with
/// the format's extension, sorted by relative path. With `images_dir`, each
/// source is paired with `images_dir/<relative stem>.<image ext>` when that
/// file exists.
///
/// # Errors
/// [`AnnoconvError::Io`] for unreadable files or directories, wrapped with
/// the offending path.
pub fn collect_sources(
    input: &Path,
    format: Format,
    images_dir: Option<&Path>,
) -> Result<Vec<SourceItem>, AnnoconvError> {
    let (root, files) = if input.is_dir() {
        (input, collect_files_with_extension(input, format.extension())?)
    } else {
        (input.parent().unwrap_or(Path::new("")), vec![input.to_path_buf()])
    };

    let mut items = Vec::with_capacity(files.len());
    for path in files {
        let content = fs::read_to_string(&path)
            .map_err(|source| AnnoconvError::from(source).in_file(&path))?;
        let image_path =
            images_dir.and_then(|dir| find_image_for_source(dir, rel_path(root, &path)));
        let file_name = image_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned());

        items.push(SourceItem {
            name: path.display().to_string(),
            content,
            file_name,
            image_path,
        });
    }

    tracing::debug!(input = %input.display(), sources = items.len(), "collected sources");
    Ok(items)
}

fn collect_files_with_extension(
    root: &Path,
    extension: &str,
) -> Result<Vec<PathBuf>, AnnoconvError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry
            .map_err(|source| AnnoconvError::from(std::io::Error::from(source)).in_file(root))?;

        if entry.file_type().is_file() && has_extension(entry.path(), &[extension]) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_by_cached_key(|path| rel_path(root, path).to_path_buf());
    Ok(files)
}

fn find_image_for_source(images_dir: &Path, source_rel_path: &Path) -> Option<PathBuf> {
    let stem_rel_path = source_rel_path.with_extension("");
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| images_dir.join(&stem_rel_path).with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

fn rel_path<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
