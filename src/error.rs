//! Error taxonomy for the capture and mosaic pipeline.
//!
//! Each stage has its own error type so callers can react to the stage that
//! failed. `MosaicError` wraps them for the pipeline driver.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a video frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open video source {locator}: {reason}")]
    Connection { locator: String, reason: String },

    #[error("unsupported video source locator '{0}'")]
    Unsupported(String),

    #[error("video source is not open; call open() first")]
    NotOpen,

    #[error("invalid frame from source: {0}")]
    InvalidFrame(String),
}

/// Failures of an interactive capture session.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("video source could not be opened")]
    Unopened(#[source] SourceError),

    #[error("video stream ended before any frame was selected")]
    StreamEnded,

    #[error("partial capture: got {captured} of {requested} frames")]
    PartialCapture { captured: usize, requested: usize },

    #[error("capture cancelled after {captured} of {requested} frames")]
    Cancelled { captured: usize, requested: usize },

    #[error("video source failed mid-stream")]
    Source(#[source] SourceError),

    #[error("invalid capture request: {0}")]
    InvalidRequest(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("capture I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Number of frames persisted before the session failed.
    pub fn captured(&self) -> usize {
        match self {
            Self::PartialCapture { captured, .. } | Self::Cancelled { captured, .. } => *captured,
            _ => 0,
        }
    }
}

/// Failures while loading a persisted image set.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("no .jpeg/.png images found in {0}")]
    EmptyDirectory(PathBuf),

    /// Per-file failure. The loader logs and skips these; they never abort a load.
    #[error("unreadable image {path}: {reason}")]
    UnreadableFile { path: PathBuf, reason: String },

    #[error("cannot read directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while laying images out into rows and a mosaic.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("overlap {overlap} must be smaller than image width {width}")]
    InvalidOverlap { overlap: u32, width: u32 },

    #[error("images per row must be at least 1")]
    InvalidImagesPerRow,

    #[error("image {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("row of {width} pixels exceeds the maximum image width")]
    RowTooWide { width: u64 },

    #[error("cannot compose a row from zero images")]
    EmptyRow,

    #[error("insufficient images: need {required}, have {available}")]
    InsufficientImages { required: usize, available: usize },

    #[error("no complete rows: {available} images, {images_per_row} per row")]
    NoCompleteRows {
        available: usize,
        images_per_row: usize,
    },
}

/// Top-level pipeline failure.
#[derive(Debug, Error)]
pub enum MosaicError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("failed to write mosaic to {path}: {reason}")]
    Output { path: PathBuf, reason: String },
}
