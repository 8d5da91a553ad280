//! RTSP frame source.
//!
//! Decodes IP camera streams with GStreamer:
//! `rtspsrc ! decodebin ! videoconvert ! video/x-raw,format=RGB ! appsink`.
//! A stalled pull is reported as a transient failure; EOS ends the stream.

use std::time::{Duration, Instant};

use gstreamer::prelude::*;

use super::{FrameSource, PixelFormat, ReadOutcome, SourceConfig, SourceStats};
use crate::error::SourceError;
use crate::frame::Frame;

pub struct RtspSource {
    config: SourceConfig,
    pipeline: Option<gstreamer::Pipeline>,
    appsink: Option<gstreamer_app::AppSink>,
    frame_count: u64,
    transient_failures: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
    ended: bool,
}

impl RtspSource {
    pub fn new(config: SourceConfig) -> Result<Self, SourceError> {
        gstreamer::init().map_err(|e| SourceError::Connection {
            locator: config.locator.clone(),
            reason: format!("initialize gstreamer: {}", e),
        })?;
        Ok(Self {
            config,
            pipeline: None,
            appsink: None,
            frame_count: 0,
            transient_failures: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
            ended: false,
        })
    }

    fn connection_error(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Connection {
            locator: self.config.locator.clone(),
            reason: reason.into(),
        }
    }

    fn build_pipeline(&self) -> Result<(gstreamer::Pipeline, gstreamer_app::AppSink), SourceError> {
        let description = format!(
            "rtspsrc location={} latency=0 ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            self.config.locator
        );
        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| self.connection_error(format!("build RTSP pipeline: {}", e)))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| self.connection_error("RTSP pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| self.connection_error("appsink element missing from pipeline"))?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| self.connection_error("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);
        Ok((pipeline, appsink))
    }

    fn frame_timeout(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            500
        } else {
            (1000 / self.config.target_fps).saturating_mul(4)
        };
        Duration::from_millis(base_ms.max(500) as u64)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.as_ref().and_then(|p| p.bus()) else {
            return;
        };
        while let Some(message) = bus.timed_pop(gstreamer::ClockTime::ZERO) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.ended = true;
                }
                _ => {}
            }
        }
    }
}

impl FrameSource for RtspSource {
    fn locator(&self) -> &str {
        &self.config.locator
    }

    fn open(&mut self) -> Result<(), SourceError> {
        let (pipeline, appsink) = self.build_pipeline()?;
        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| self.connection_error(format!("set RTSP pipeline to Playing: {}", e)))?;
        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        self.connected_at = Some(Instant::now());
        self.ended = false;
        log::info!("RtspSource: connected to {}", self.config.locator);
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, SourceError> {
        self.poll_bus();
        if self.ended {
            return Ok(ReadOutcome::EndOfStream);
        }
        let timeout = self.frame_timeout();
        let appsink = self.appsink.as_ref().ok_or(SourceError::NotOpen)?;
        let timeout = gstreamer::ClockTime::from_mseconds(timeout.as_millis() as u64);
        let Some(sample) = appsink.try_pull_sample(timeout) else {
            if appsink.is_eos() {
                self.ended = true;
                return Ok(ReadOutcome::EndOfStream);
            }
            self.transient_failures += 1;
            return Ok(ReadOutcome::Transient("RTSP stream stalled".to_string()));
        };

        let (pixels, width, height) = match sample_to_pixels(&sample) {
            Ok(decoded) => decoded,
            Err(reason) => {
                self.transient_failures += 1;
                return Ok(ReadOutcome::Transient(reason));
            }
        };

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        let frame = Frame::from_pixels(pixels, width, height, PixelFormat::Rgb24, self.frame_count)?;
        Ok(ReadOutcome::Frame(frame))
    }

    fn close(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                log::warn!("RtspSource: failed to stop {}: {}", self.config.locator, e);
            }
        }
        self.appsink = None;
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() || self.ended {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.frame_count,
            transient_failures: self.transient_failures,
            locator: self.config.locator.clone(),
        }
    }
}

impl Drop for RtspSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32), String> {
    let buffer = sample.buffer().ok_or("RTSP sample missing buffer")?;
    let caps = sample.caps().ok_or("RTSP sample missing caps")?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| format!("parse RTSP caps as video info: {}", e))?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer
        .map_readable()
        .map_err(|e| format!("map RTSP buffer: {}", e))?;
    let data = map.as_slice();

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .ok_or("RTSP buffer is shorter than its caps")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(
            data.get(start..start + row_bytes)
                .ok_or("RTSP buffer row is out of bounds")?,
        );
    }
    Ok((pixels, width, height))
}
