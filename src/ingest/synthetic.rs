//! Synthetic frame source (`stub://`).
//!
//! Produces a moving test pattern so capture sessions can run without a camera.
//! Query parameters shape the stream:
//! - `frames=N`: end the stream after N frames
//! - `drop_every=K`: every Kth read is a transient failure

use url::Url;

use super::normalize::packed_len;
use super::{FrameSource, PixelFormat, ReadOutcome, SourceConfig, SourceStats};
use crate::error::SourceError;
use crate::frame::Frame;

pub struct SyntheticSource {
    config: SourceConfig,
    frame_limit: Option<u64>,
    drop_every: Option<u64>,
    frame_len: usize,
    reads: u64,
    frame_count: u64,
    transient_failures: u64,
    /// Simulated "scene" state, so consecutive frames differ.
    scene_state: u8,
    open: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        let url = Url::parse(&config.locator)
            .map_err(|_| SourceError::Unsupported(config.locator.clone()))?;
        let mut frame_limit = None;
        let mut drop_every = None;
        for (key, value) in url.query_pairs() {
            let parsed = value.parse::<u64>().map_err(|_| SourceError::Connection {
                locator: config.locator.clone(),
                reason: format!("'{}' must be an integer", key),
            })?;
            match key.as_ref() {
                "frames" => frame_limit = Some(parsed),
                "drop_every" if parsed > 0 => drop_every = Some(parsed),
                _ => log::debug!("SyntheticSource: ignoring parameter {}", key),
            }
        }
        if config.width == 0 || config.height == 0 {
            return Err(SourceError::Connection {
                locator: config.locator.clone(),
                reason: "synthetic frame size must be non-zero".to_string(),
            });
        }
        let frame_len = packed_len(config.width, config.height).map_err(|_| {
            SourceError::Connection {
                locator: config.locator.clone(),
                reason: format!("synthetic frame {}x{} is too large", config.width, config.height),
            }
        })?;
        Ok(Self {
            config,
            frame_limit,
            drop_every,
            frame_len,
            reads: 0,
            frame_count: 0,
            transient_failures: 0,
            scene_state: 0,
            open: false,
        })
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = self.frame_len;
        if self.frame_count.is_multiple_of(50) {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn locator(&self) -> &str {
        &self.config.locator
    }

    fn open(&mut self) -> Result<(), SourceError> {
        self.open = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.locator,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, SourceError> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        if self
            .frame_limit
            .is_some_and(|limit| self.frame_count >= limit)
        {
            return Ok(ReadOutcome::EndOfStream);
        }
        self.reads += 1;
        if self
            .drop_every
            .is_some_and(|every| self.reads.is_multiple_of(every))
        {
            self.transient_failures += 1;
            return Ok(ReadOutcome::Transient("synthetic dropped frame".to_string()));
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        let frame = Frame::from_pixels(
            pixels,
            self.config.width,
            self.config.height,
            PixelFormat::Rgb24,
            self.frame_count,
        )?;
        Ok(ReadOutcome::Frame(frame))
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_healthy(&self) -> bool {
        self.open
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            transient_failures: self.transient_failures,
            locator: self.config.locator.clone(),
        }
    }
}
