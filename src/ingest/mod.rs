//! Frame ingestion sources.
//!
//! This module provides the pull-based sources a capture session reads from:
//! - Synthetic pattern streams (`stub://`), for tests and dry runs
//! - RTSP streams from IP cameras (feature: rtsp-gstreamer)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Scripted in-memory sequences (tests)
//!
//! All sources produce RGB24 `Frame`s. Reconnection and read timeouts belong to
//! the backend; callers treat `read()` as an ordinary blocking call.

pub mod locator;
pub(crate) mod normalize;
pub mod probe;
pub mod scripted;
pub mod synthetic;
#[cfg(feature = "rtsp-gstreamer")]
pub mod rtsp;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::frame::Frame;

pub use locator::{LocatorKind, RtspLocator};
pub use normalize::PixelFormat;
pub use probe::{probe, ProbeReport};
pub use scripted::{ScriptedRead, ScriptedSource};
pub use synthetic::SyntheticSource;

/// Result of a single `FrameSource::read`.
#[derive(Debug)]
pub enum ReadOutcome {
    Frame(Frame),
    /// The stream is exhausted; further reads will not produce frames.
    EndOfStream,
    /// The read failed but the stream may recover.
    Transient(String),
}

/// Pull-based live frame provider.
pub trait FrameSource {
    /// Locator this source was built from.
    fn locator(&self) -> &str;

    /// Connect to the stream. Must be called before `read`.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Read the next frame. Blocks as long as the backend does.
    fn read(&mut self) -> Result<ReadOutcome, SourceError>;

    /// Release backend resources. Safe to call more than once.
    fn close(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_read: u64,
    pub transient_failures: u64,
    pub locator: String,
}

/// Configuration for opening a frame source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Opaque locator: `stub://name`, `rtsp://...`, `/dev/videoN` or a device index.
    pub locator: String,
    /// Target frame rate (frames per second). Backends may decimate to this rate.
    pub target_fps: u32,
    /// Preferred frame width (synthetic and V4L2 sources).
    pub width: u32,
    /// Preferred frame height (synthetic and V4L2 sources).
    pub height: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            locator: "stub://rig".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Build the source named by `config.locator`. The source is not yet open.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, SourceError> {
    match LocatorKind::classify(&config.locator)? {
        LocatorKind::Stub => Ok(Box::new(SyntheticSource::new(config.clone())?)),
        LocatorKind::Rtsp => {
            #[cfg(feature = "rtsp-gstreamer")]
            {
                Ok(Box::new(rtsp::RtspSource::new(config.clone())?))
            }
            #[cfg(not(feature = "rtsp-gstreamer"))]
            {
                Err(SourceError::Connection {
                    locator: config.locator.clone(),
                    reason: "RTSP requires the rtsp-gstreamer feature".to_string(),
                })
            }
        }
        LocatorKind::Device(device) => {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Box::new(v4l2::V4l2Source::new(config.clone(), device)))
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(SourceError::Connection {
                    locator: device,
                    reason: "capture devices require the ingest-v4l2 feature".to_string(),
                })
            }
        }
    }
}
