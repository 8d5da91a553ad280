//! V4L2 frame source.
//!
//! Reads from a local capture device node (e.g. `/dev/video0`) through libv4l,
//! requesting packed RGB at the configured size. The driver may pick a different
//! size; frames carry whatever size the device negotiated.

use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::{FrameSource, PixelFormat, ReadOutcome, SourceConfig, SourceStats};
use crate::error::SourceError;
use crate::frame::Frame;

pub struct V4l2Source {
    config: SourceConfig,
    device: String,
    state: Option<DeviceV4l2State>,
    frame_count: u64,
    transient_failures: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceV4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: SourceConfig, device: String) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            device,
            state: None,
            frame_count: 0,
            transient_failures: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn connection_error(&self, reason: String) -> SourceError {
        SourceError::Connection {
            locator: self.device.clone(),
            reason,
        }
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn locator(&self) -> &str {
        &self.device
    }

    fn open(&mut self) -> Result<(), SourceError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.device)
            .map_err(|e| self.connection_error(format!("open device: {}", e)))?;
        let mut format = device
            .format()
            .map_err(|e| self.connection_error(format!("read format: {}", e)))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", self.device, err);
                device
                    .format()
                    .map_err(|e| self.connection_error(format!("read format: {}", e)))?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", self.device, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceV4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            self.connection_error(format!("create buffer stream: {}", err))
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{})",
            self.device,
            self.active_width,
            self.active_height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, SourceError> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().ok_or(SourceError::NotOpen)?;
        let captured = state.with_mut(|fields| {
            fields
                .stream
                .next()
                .map(|(buf, _meta)| buf.to_vec())
        });
        let pixels = match captured {
            Ok(pixels) => pixels,
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(ReadOutcome::EndOfStream);
            }
            Err(err) => {
                self.transient_failures += 1;
                self.last_error = Some(err.to_string());
                return Ok(ReadOutcome::Transient(err.to_string()));
            }
        };

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        self.last_error = None;
        let expected = (self.active_width * self.active_height * 3) as usize;
        let mut pixels = pixels;
        pixels.truncate(expected);
        let frame = Frame::from_pixels(
            pixels,
            self.active_width,
            self.active_height,
            PixelFormat::Rgb24,
            self.frame_count,
        )?;
        Ok(ReadOutcome::Frame(frame))
    }

    fn close(&mut self) {
        self.state = None;
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() || self.state.is_none() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            transient_failures: self.transient_failures,
            locator: self.device.clone(),
        }
    }
}
