use anyhow::{anyhow, Context, Result};
use image::ImageFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::compose::LeadingEdge;
use crate::frame::TargetSize;
use crate::ingest::SourceConfig;
use crate::store::StoredFormat;

const DEFAULT_SOURCE: &str = "stub://rig";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_INPUT_DIR: &str = "images";
const DEFAULT_OUTPUT: &str = "panorama_with_rows.jpg";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_CAPTURE_COUNT: usize = 24;
const DEFAULT_IMAGES_PER_ROW: usize = 8;
const DEFAULT_ROWS: usize = 3;
const DEFAULT_OVERLAP: u32 = 100;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MosaicConfigFile {
    input_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    target: Option<TargetConfigFile>,
    source: Option<SourceConfigFile>,
    capture: Option<CaptureConfigFile>,
    layout: Option<LayoutConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TargetConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    locator: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    count: Option<usize>,
    format: Option<StoredFormat>,
    select_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct LayoutConfigFile {
    images_per_row: Option<usize>,
    /// Number of rows to build; `0` keeps every complete row.
    rows: Option<usize>,
    overlap: Option<u32>,
    leading_edge: Option<LeadingEdge>,
}

/// Everything one pipeline run needs. Passed explicitly; there is no global state.
#[derive(Debug, Clone)]
pub struct MosaicConfig {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    pub target: TargetSize,
    pub source: SourceConfig,
    pub capture: CaptureSettings,
    pub layout: LayoutSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub count: usize,
    pub format: StoredFormat,
    /// Select every Nth frame without an operator. `None` means interactive.
    pub select_every: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSettings {
    pub images_per_row: usize,
    /// Rows to build from the first images; `None` keeps every complete row.
    pub rows: Option<usize>,
    pub overlap: u32,
    pub leading_edge: LeadingEdge,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        let file = MosaicConfigFile::default();
        Self::from_file(file)
    }
}

impl MosaicConfig {
    /// Load from `MOSAIC_CONFIG` (if set), apply environment overrides, validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var("MOSAIC_CONFIG").ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Like `load`, with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => MosaicConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MosaicConfigFile) -> Self {
        let target = TargetSize::new(
            file.target
                .as_ref()
                .and_then(|t| t.width)
                .unwrap_or(DEFAULT_WIDTH),
            file.target
                .as_ref()
                .and_then(|t| t.height)
                .unwrap_or(DEFAULT_HEIGHT),
        );
        let source = SourceConfig {
            locator: file
                .source
                .as_ref()
                .and_then(|s| s.locator.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|s| s.target_fps)
                .unwrap_or(DEFAULT_SOURCE_FPS),
            width: target.width,
            height: target.height,
        };
        let capture = file.capture.unwrap_or_default();
        let capture = CaptureSettings {
            count: capture.count.unwrap_or(DEFAULT_CAPTURE_COUNT),
            format: capture.format.unwrap_or_default(),
            select_every: capture.select_every,
        };
        let layout = file.layout.unwrap_or_default();
        let layout = LayoutSettings {
            images_per_row: layout.images_per_row.unwrap_or(DEFAULT_IMAGES_PER_ROW),
            rows: match layout.rows {
                Some(0) => None,
                Some(rows) => Some(rows),
                None => Some(DEFAULT_ROWS),
            },
            overlap: layout.overlap.unwrap_or(DEFAULT_OVERLAP),
            leading_edge: layout.leading_edge.unwrap_or_default(),
        };
        Self {
            input_dir: file
                .input_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR)),
            output: file.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            target,
            source,
            capture,
            layout,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(locator) = env_non_empty("MOSAIC_SOURCE") {
            self.source.locator = locator;
        }
        if let Some(dir) = env_non_empty("MOSAIC_INPUT_DIR") {
            self.input_dir = PathBuf::from(dir);
        }
        if let Some(output) = env_non_empty("MOSAIC_OUTPUT") {
            self.output = PathBuf::from(output);
        }
        if let Some(count) = env_non_empty("MOSAIC_CAPTURE_COUNT") {
            self.capture.count = count
                .parse()
                .map_err(|_| anyhow!("MOSAIC_CAPTURE_COUNT must be a positive integer"))?;
        }
        if let Some(overlap) = env_non_empty("MOSAIC_OVERLAP") {
            self.layout.overlap = overlap
                .parse()
                .map_err(|_| anyhow!("MOSAIC_OVERLAP must be an integer number of pixels"))?;
        }
        if let Some(per_row) = env_non_empty("MOSAIC_IMAGES_PER_ROW") {
            self.layout.images_per_row = per_row
                .parse()
                .map_err(|_| anyhow!("MOSAIC_IMAGES_PER_ROW must be a positive integer"))?;
        }
        if let Some(rows) = env_non_empty("MOSAIC_ROWS") {
            // `0` and `all` both keep every complete row, as in the config file.
            self.layout.rows = if rows.eq_ignore_ascii_case("all") {
                None
            } else {
                let rows: usize = rows
                    .parse()
                    .map_err(|_| anyhow!("MOSAIC_ROWS must be an integer or 'all'"))?;
                (rows > 0).then_some(rows)
            };
        }
        Ok(())
    }

    /// Check the invariants every run relies on.
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(anyhow!("target size {} must be non-zero", self.target));
        }
        if self.layout.overlap >= self.target.width {
            return Err(anyhow!(
                "overlap {} must be smaller than target width {}",
                self.layout.overlap,
                self.target.width
            ));
        }
        if self.layout.images_per_row == 0 {
            return Err(anyhow!("images_per_row must be at least 1"));
        }
        if self.layout.rows == Some(0) {
            return Err(anyhow!("rows must be at least 1"));
        }
        if self.capture.count == 0 {
            return Err(anyhow!("capture count must be at least 1"));
        }
        if self.capture.select_every == Some(0) {
            return Err(anyhow!("select_every must be at least 1"));
        }
        output_format(&self.output)?;
        Ok(())
    }
}

/// Encoder for the mosaic output, chosen by file extension.
pub fn output_format(path: &Path) -> Result<ImageFormat> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("cannot infer image format of {}", path.display()))?;
    match format {
        ImageFormat::Jpeg | ImageFormat::Png => Ok(format),
        other => Err(anyhow!(
            "unsupported output format {:?} for {} (use .jpg, .jpeg or .png)",
            other,
            path.display()
        )),
    }
}

fn read_config_file(path: &Path) -> Result<MosaicConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path.extension().and_then(|e| e.to_str()) == Some("toml");
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
