//! File-backed media libraries.

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;
use walkdir::WalkDir;

use super::codec;
use super::native::{AssetRecord, MediaLibrary};
use crate::config::ThumbnailOptions;
use crate::error::Error;

#[inline]
pub fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if ["jpg", "jpeg", "png", "webp", "gif"].contains(&e.as_str())
    )
}

/// Creation time in seconds since the epoch; `0.0` when the platform has none.
pub fn photo_created_at(path: &Path) -> f64 {
    fs::metadata(path)
        .and_then(|meta| meta.created().or_else(|_| meta.modified()))
        .ok()
        .and_then(|t: SystemTime| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0.0, |d| d.as_secs_f64())
}

/// Newest first; equal timestamps fall back to id order.
pub fn newest_first(a: &AssetRecord, b: &AssetRecord) -> Ordering {
    b.creation_timestamp
        .total_cmp(&a.creation_timestamp)
        .then_with(|| a.id.cmp(&b.id))
}

#[derive(Debug)]
struct Entry {
    record: AssetRecord,
    path: PathBuf,
}

fn sorted(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| newest_first(&a.record, &b.record));
    entries
}

fn decode_error(id: &str, err: anyhow::Error) -> Error {
    Error::DecodeFailed {
        id: id.to_owned(),
        reason: format!("{err:#}"),
    }
}

/// Library rooted at a directory tree, re-scanned on every enumeration.
///
/// Asset ids are paths relative to the root, `/`-separated.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scan(&self) -> Result<Vec<Entry>, Error> {
        if !self.root.is_dir() {
            return Err(Error::Transport(format!(
                "library root {} is not a directory",
                self.root.display()
            )));
        }
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path().to_path_buf();
            if !is_image(&path) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let creation_timestamp = photo_created_at(&path);
            entries.push(Entry {
                record: AssetRecord {
                    id,
                    creation_timestamp,
                },
                path,
            });
        }
        debug!(root = %self.root.display(), discovered = entries.len(), "library scan complete");
        Ok(sorted(entries))
    }

    fn resolve(&self, id: &str) -> Result<PathBuf, Error> {
        self.scan()?
            .into_iter()
            .find(|entry| entry.record.id == id)
            .map(|entry| entry.path)
            .ok_or_else(|| Error::NotFound(id.to_owned()))
    }
}

impl MediaLibrary for DirectoryLibrary {
    fn enumerate(&self) -> Result<Vec<AssetRecord>, Error> {
        Ok(self.scan()?.into_iter().map(|entry| entry.record).collect())
    }

    fn thumbnail(
        &self,
        asset: &AssetRecord,
        options: &ThumbnailOptions,
    ) -> anyhow::Result<Vec<u8>> {
        let path = self.root.join(&asset.id);
        codec::thumbnail_jpeg(&path, options.size_px, options.quality)
    }

    fn full_image(&self, id: &str, quality: u8) -> Result<Vec<u8>, Error> {
        let path = self.resolve(id)?;
        codec::full_jpeg(&path, quality).map_err(|err| decode_error(id, err))
    }
}

/// Fixed set of files handed over by a local picker.
///
/// Ids are the file paths as given. Files that disappear drop out of the
/// enumeration.
#[derive(Debug, Clone, Default)]
pub struct PickedFiles {
    files: Vec<PathBuf>,
}

impl PickedFiles {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    fn entries(&self) -> Vec<Entry> {
        let entries = self
            .files
            .iter()
            .filter(|path| path.is_file() && is_image(path))
            .map(|path| Entry {
                record: AssetRecord {
                    id: path.to_string_lossy().into_owned(),
                    creation_timestamp: photo_created_at(path),
                },
                path: path.clone(),
            })
            .collect();
        sorted(entries)
    }
}

impl MediaLibrary for PickedFiles {
    fn enumerate(&self) -> Result<Vec<AssetRecord>, Error> {
        Ok(self.entries().into_iter().map(|entry| entry.record).collect())
    }

    fn thumbnail(
        &self,
        asset: &AssetRecord,
        options: &ThumbnailOptions,
    ) -> anyhow::Result<Vec<u8>> {
        codec::thumbnail_jpeg(Path::new(&asset.id), options.size_px, options.quality)
    }

    fn full_image(&self, id: &str, quality: u8) -> Result<Vec<u8>, Error> {
        let path = self
            .entries()
            .into_iter()
            .find(|entry| entry.record.id == id)
            .map(|entry| entry.path)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        codec::full_jpeg(&path, quality).map_err(|err| decode_error(id, err))
    }
}
