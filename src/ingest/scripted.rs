//! Scripted in-memory frame source.
//!
//! Replays a fixed sequence of reads. Used by tests and by callers that already
//! hold decoded frames.

use std::collections::VecDeque;

use image::{Rgb, RgbImage};

use super::{FrameSource, ReadOutcome, SourceStats};
use crate::error::SourceError;
use crate::frame::Frame;

/// One scripted read.
#[derive(Clone, Debug)]
pub enum ScriptedRead {
    Image(RgbImage),
    Transient,
}

pub struct ScriptedSource {
    locator: String,
    script: VecDeque<ScriptedRead>,
    refuse_open: bool,
    open: bool,
    frames_read: u64,
    transient_failures: u64,
}

impl ScriptedSource {
    pub fn new(locator: impl Into<String>, script: impl IntoIterator<Item = ScriptedRead>) -> Self {
        Self {
            locator: locator.into(),
            script: script.into_iter().collect(),
            refuse_open: false,
            open: false,
            frames_read: 0,
            transient_failures: 0,
        }
    }

    /// `count` solid frames whose red channel encodes their 1-based position.
    pub fn solid_frames(count: usize, width: u32, height: u32) -> Self {
        let script = (1..=count)
            .map(|i| ScriptedRead::Image(RgbImage::from_pixel(width, height, Rgb([i as u8, 0, 0]))));
        Self::new("scripted://solid", script)
    }

    /// Make `open()` fail, as an unreachable camera would.
    pub fn refusing_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FrameSource for ScriptedSource {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn open(&mut self) -> Result<(), SourceError> {
        if self.refuse_open {
            return Err(SourceError::Connection {
                locator: self.locator.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, SourceError> {
        if !self.open {
            return Err(SourceError::NotOpen);
        }
        match self.script.pop_front() {
            Some(ScriptedRead::Image(image)) => {
                self.frames_read += 1;
                Ok(ReadOutcome::Frame(Frame::from_image(image, self.frames_read)))
            }
            Some(ScriptedRead::Transient) => {
                self.transient_failures += 1;
                Ok(ReadOutcome::Transient("scripted failure".to_string()))
            }
            None => Ok(ReadOutcome::EndOfStream),
        }
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_healthy(&self) -> bool {
        self.open && !self.script.is_empty()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frames_read,
            transient_failures: self.transient_failures,
            locator: self.locator.clone(),
        }
    }
}
