//! Image set loading.
//!
//! Loads the stored frames of a directory in numeric index order and resizes each
//! to the canonical size. Files outside the allow-list are ignored; files that
//! fail to decode are logged and skipped.

use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::frame::TargetSize;
use crate::store::{parse_index, StoredFormat};

/// A stored frame resized to the canonical size.
#[derive(Clone, Debug)]
pub struct CanonicalImage {
    pub index: u64,
    pub path: PathBuf,
    pub image: RgbImage,
}

/// Outcome of a load: the images plus the files that had to be skipped.
#[derive(Debug, Default)]
pub struct LoadedSet {
    pub images: Vec<CanonicalImage>,
    pub skipped: Vec<LoadError>,
}

impl LoadedSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn into_images(self) -> Vec<RgbImage> {
        self.images.into_iter().map(|c| c.image).collect()
    }
}

/// Allow-listed files in `dir` with their ordering index, sorted numerically.
///
/// Files whose name holds no integer cannot be ordered and are skipped with a warning.
pub fn list_stored(dir: &Path) -> Result<Vec<(u64, PathBuf)>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDirectory(dir.to_path_buf()));
    }
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() || StoredFormat::from_path(&path).is_none() {
            continue;
        }
        match parse_index(&path) {
            Some(index) => entries.push((index, path)),
            None => log::warn!("skipping {}: no index in file name", path.display()),
        }
    }
    // Ties (e.g. image(3).png and image(3).jpeg) fall back to the path for a stable order.
    entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(entries)
}

/// Load and canonicalise every stored frame in `dir`.
pub fn load(dir: &Path, target: TargetSize) -> Result<LoadedSet, LoadError> {
    let entries = list_stored(dir)?;
    if entries.is_empty() {
        return Err(LoadError::EmptyDirectory(dir.to_path_buf()));
    }
    let set = decode_entries(entries, target);
    log::info!(
        "loaded {} images from {} ({} skipped)",
        set.images.len(),
        dir.display(),
        set.skipped.len()
    );
    Ok(set)
}

/// Load exactly `paths`, in the given order, e.g. the files one capture session wrote.
///
/// Files are decoded and skipped the same way as `load`. A path without an
/// index in its name takes its 1-based position.
pub fn load_paths(paths: &[PathBuf], target: TargetSize) -> LoadedSet {
    let entries = paths
        .iter()
        .enumerate()
        .map(|(i, path)| (parse_index(path).unwrap_or(i as u64 + 1), path.clone()))
        .collect();
    let set = decode_entries(entries, target);
    log::info!(
        "loaded {} captured images ({} skipped)",
        set.images.len(),
        set.skipped.len()
    );
    set
}

fn decode_entries(entries: Vec<(u64, PathBuf)>, target: TargetSize) -> LoadedSet {
    let mut set = LoadedSet::default();
    for (index, path) in entries {
        match image::open(&path) {
            Ok(decoded) => {
                let image = target.resize(&decoded.into_rgb8());
                set.images.push(CanonicalImage { index, path, image });
            }
            Err(e) => {
                let err = LoadError::UnreadableFile {
                    path,
                    reason: e.to_string(),
                };
                log::warn!("{}", err);
                set.skipped.push(err);
            }
        }
    }
    set
}
