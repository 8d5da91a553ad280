//! Source probe: open a source, pull a few frames, report what came back.

use serde::Serialize;

use super::{FrameSource, ReadOutcome};
use crate::error::SourceError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub locator: String,
    pub frames: u64,
    pub transient_failures: u64,
    pub ended: bool,
    /// Dimensions of the last frame received.
    pub dimensions: Option<(u32, u32)>,
    pub healthy: bool,
}

/// Read up to `frames` frames from `source`. The source is closed afterwards.
///
/// Counts come from the source's own `stats()`.
pub fn probe(source: &mut dyn FrameSource, frames: u64) -> Result<ProbeReport, SourceError> {
    source.open()?;
    let mut report = ProbeReport::default();
    // Bound the attempts so a source that only fails transiently still returns.
    let max_attempts = frames.saturating_mul(4).max(frames.saturating_add(8));
    let mut attempts = 0u64;
    let mut received = 0u64;
    let result = loop {
        if received >= frames || attempts >= max_attempts {
            break Ok(());
        }
        attempts += 1;
        match source.read() {
            Ok(ReadOutcome::Frame(frame)) => {
                received += 1;
                report.dimensions = Some((frame.width, frame.height));
            }
            Ok(ReadOutcome::Transient(reason)) => {
                log::debug!("probe {}: transient read failure: {}", source.locator(), reason);
            }
            Ok(ReadOutcome::EndOfStream) => {
                report.ended = true;
                break Ok(());
            }
            Err(err) => break Err(err),
        }
    };
    let stats = source.stats();
    report.locator = stats.locator;
    report.frames = stats.frames_read;
    report.transient_failures = stats.transient_failures;
    report.healthy = source.is_healthy();
    source.close();
    result.map(|()| report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ScriptedRead, ScriptedSource, SourceConfig, SyntheticSource};
    use image::RgbImage;

    #[test]
    fn reports_source_frame_and_transient_counts() {
        let mut source = ScriptedSource::new(
            "script://probe",
            vec![
                ScriptedRead::Image(RgbImage::new(8, 6)),
                ScriptedRead::Transient,
                ScriptedRead::Image(RgbImage::new(8, 6)),
            ],
        );
        let report = probe(&mut source, 5).unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.transient_failures, 1);
        assert!(report.ended);
        assert_eq!(report.dimensions, Some((8, 6)));
        assert_eq!(report.locator, "script://probe");
    }

    #[test]
    fn stops_at_requested_frames() {
        let config = SourceConfig {
            locator: "stub://probe".to_string(),
            width: 32,
            height: 24,
            ..SourceConfig::default()
        };
        let mut source = SyntheticSource::new(config).unwrap();
        let report = probe(&mut source, 3).unwrap();
        assert_eq!(report.frames, 3);
        assert_eq!(report.frames, source.stats().frames_read);
        assert!(!report.ended);
        assert_eq!(report.dimensions, Some((32, 24)));
    }

    #[test]
    fn unbounded_frame_request_does_not_overflow() {
        let mut source = ScriptedSource::new(
            "script://short",
            vec![ScriptedRead::Image(RgbImage::new(4, 4))],
        );
        let report = probe(&mut source, u64::MAX).unwrap();
        assert_eq!(report.frames, 1);
        assert!(report.ended);
    }

    #[test]
    fn open_failure_is_returned() {
        let mut source =
            ScriptedSource::new("script://down", Vec::<ScriptedRead>::new()).refusing_open();
        assert!(matches!(
            probe(&mut source, 1),
            Err(SourceError::Connection { .. })
        ));
    }
}
