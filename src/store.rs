//! Naming of stored frames.
//!
//! Captured frames are written as `image(N).<ext>` with N a 1-based, gapless
//! index in capture order. Only `.jpeg` and `.png` files take part in a run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use image::ImageFormat;

/// Raster formats allowed for stored frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoredFormat {
    Jpeg,
    #[default]
    Png,
}

impl StoredFormat {
    pub const ALL: [StoredFormat; 2] = [StoredFormat::Jpeg, StoredFormat::Png];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }

    /// Match a path against the allow-list. Case-sensitive, like the rig's tooling.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

impl std::str::FromStr for StoredFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!("unsupported image extension '{}' (expected jpeg or png)", other)),
        }
    }
}

/// File name for the frame stored at `index`.
pub fn stored_file_name(index: u64, format: StoredFormat) -> String {
    format!("image({}).{}", index, format.extension())
}

fn parenthesized_index() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+)\)").expect("static regex"))
}

fn bare_index() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex"))
}

/// Ordering index of a stored file: the last parenthesised integer in the file
/// stem, else the last run of digits. `None` when the stem holds no integer.
pub fn parse_index(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    if let Some(caps) = parenthesized_index().captures_iter(stem).last() {
        return caps.get(1)?.as_str().parse().ok();
    }
    bare_index().find_iter(stem).last()?.as_str().parse().ok()
}

/// Highest index among allow-listed files in `dir`, or 0 when there are none.
pub fn highest_index(dir: &Path) -> std::io::Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut highest = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if StoredFormat::from_path(&path).is_none() {
            continue;
        }
        if let Some(index) = parse_index(&path) {
            highest = highest.max(index);
        }
    }
    Ok(highest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn names_are_one_based_and_parenthesised() {
        assert_eq!(stored_file_name(1, StoredFormat::Png), "image(1).png");
        assert_eq!(stored_file_name(12, StoredFormat::Jpeg), "image(12).jpeg");
    }

    #[test]
    fn parses_parenthesised_and_bare_indices() {
        assert_eq!(parse_index(&PathBuf::from("image(12).png")), Some(12));
        assert_eq!(parse_index(&PathBuf::from("cam2 (7).jpeg")), Some(7));
        assert_eq!(parse_index(&PathBuf::from("frame_0042.png")), Some(42));
        assert_eq!(parse_index(&PathBuf::from("cover.png")), None);
    }

    #[test]
    fn allow_list_is_jpeg_and_png_only() {
        assert_eq!(
            StoredFormat::from_path(&PathBuf::from("a(1).jpeg")),
            Some(StoredFormat::Jpeg)
        );
        assert_eq!(StoredFormat::from_path(&PathBuf::from("a(1).jpg")), None);
        assert_eq!(StoredFormat::from_path(&PathBuf::from("a(1).bmp")), None);
        assert_eq!("PNG".parse::<StoredFormat>(), Ok(StoredFormat::Png));
        assert!("tiff".parse::<StoredFormat>().is_err());
    }

    #[test]
    fn highest_index_ignores_foreign_files() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("image(3).png"), b"x")?;
        std::fs::write(dir.path().join("image(9).txt"), b"x")?;
        assert_eq!(highest_index(dir.path())?, 3);
        assert_eq!(highest_index(&dir.path().join("missing"))?, 0);
        Ok(())
    }
}
