//! Capture sessions.
//!
//! A session reads a live source frame by frame and persists exactly the frames
//! its trigger selects, resized to the canonical size, as `image(N).<ext>`.
//!
//! States: `Idle -> Streaming -> Captured(n) ... -> Done`, or `Aborted` on cancel
//! or premature end of stream. Files written before an abort stay on disk.

pub mod trigger;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::CaptureError;
use crate::frame::TargetSize;
use crate::ingest::{FrameSource, ReadOutcome};
use crate::store::{highest_index, stored_file_name, StoredFormat};

pub use trigger::{
    CaptureProgress, CaptureTrigger, IntervalTrigger, ScriptedTrigger, StdinTrigger, TriggerAction,
};

/// What to capture and where.
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub output_dir: PathBuf,
    pub target: TargetSize,
    pub count: usize,
    pub format: StoredFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Captured(usize),
    Done,
    Aborted,
}

type CaptureObserver<'a> = Box<dyn FnMut(&Path, CaptureProgress) + 'a>;

pub struct CaptureSession<'a> {
    request: CaptureRequest,
    cancel: Arc<AtomicBool>,
    state: SessionState,
    observer: Option<CaptureObserver<'a>>,
}

impl<'a> CaptureSession<'a> {
    pub fn new(request: CaptureRequest) -> Self {
        Self {
            request,
            cancel: Arc::new(AtomicBool::new(false)),
            state: SessionState::Idle,
            observer: None,
        }
    }

    /// Share a cancellation flag (e.g. one set from a Ctrl-C handler).
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Called after every persisted frame.
    pub fn with_observer(mut self, observer: impl FnMut(&Path, CaptureProgress) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the session to completion. Returns the stored paths in capture order.
    pub fn capture(
        &mut self,
        source: &mut dyn FrameSource,
        trigger: &mut dyn CaptureTrigger,
    ) -> Result<Vec<PathBuf>, CaptureError> {
        self.validate()?;
        let dir = self.request.output_dir.clone();
        std::fs::create_dir_all(&dir).map_err(|source| CaptureError::Io {
            path: dir.clone(),
            source,
        })?;
        // Indices continue after anything already in the directory, never reused.
        let first_index = highest_index(&dir).map_err(|source| CaptureError::Io {
            path: dir.clone(),
            source,
        })? + 1;

        source.open().map_err(CaptureError::Unopened)?;
        self.state = SessionState::Streaming;
        log::info!(
            "capturing {} frames from {} into {} ({})",
            self.request.count,
            source.locator(),
            dir.display(),
            self.request.target
        );

        let result = self.run_loop(source, trigger, first_index);
        source.close();
        self.state = match &result {
            Ok(_) => SessionState::Done,
            Err(_) => SessionState::Aborted,
        };
        result
    }

    fn validate(&self) -> Result<(), CaptureError> {
        if self.request.count == 0 {
            return Err(CaptureError::InvalidRequest(
                "frame count must be at least 1".to_string(),
            ));
        }
        if self.request.target.is_empty() {
            return Err(CaptureError::InvalidRequest(format!(
                "target size {} must be non-zero",
                self.request.target
            )));
        }
        Ok(())
    }

    fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        trigger: &mut dyn CaptureTrigger,
        first_index: u64,
    ) -> Result<Vec<PathBuf>, CaptureError> {
        let requested = self.request.count;
        let mut stored = Vec::with_capacity(requested);

        while stored.len() < requested {
            if self.cancel.load(Ordering::SeqCst) {
                log::warn!("capture cancelled after {} of {} frames", stored.len(), requested);
                return Err(CaptureError::Cancelled {
                    captured: stored.len(),
                    requested,
                });
            }

            let frame = match source.read().map_err(CaptureError::Source)? {
                ReadOutcome::Frame(frame) => frame,
                ReadOutcome::Transient(reason) => {
                    log::debug!("transient read failure from {}: {}", source.locator(), reason);
                    continue;
                }
                ReadOutcome::EndOfStream => {
                    log::warn!(
                        "{} ended after {} of {} frames",
                        source.locator(),
                        stored.len(),
                        requested
                    );
                    if stored.is_empty() {
                        return Err(CaptureError::StreamEnded);
                    }
                    return Err(CaptureError::PartialCapture {
                        captured: stored.len(),
                        requested,
                    });
                }
            };

            let progress = CaptureProgress {
                captured: stored.len(),
                requested,
            };
            match trigger.poll(&frame, progress) {
                TriggerAction::Idle => continue,
                TriggerAction::Cancel => {
                    log::warn!("capture cancelled after {} of {} frames", stored.len(), requested);
                    return Err(CaptureError::Cancelled {
                        captured: stored.len(),
                        requested,
                    });
                }
                TriggerAction::Select => {}
            }

            let index = first_index + stored.len() as u64;
            let path = self
                .request
                .output_dir
                .join(stored_file_name(index, self.request.format));
            let image = frame
                .to_canonical(self.request.target)
                .map_err(CaptureError::Source)?;
            image
                .save_with_format(&path, self.request.format.image_format())
                .map_err(|source| CaptureError::Write {
                    path: path.clone(),
                    source,
                })?;
            log::info!("captured frame {} -> {}", frame.sequence, path.display());

            stored.push(path);
            self.state = SessionState::Captured(stored.len());
            if let Some(observer) = self.observer.as_mut() {
                if let Some(last) = stored.last() {
                    observer(
                        last,
                        CaptureProgress {
                            captured: stored.len(),
                            requested,
                        },
                    );
                }
            }
        }

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ScriptedRead, ScriptedSource};
    use image::RgbImage;

    fn request(dir: &Path, count: usize) -> CaptureRequest {
        CaptureRequest {
            output_dir: dir.join("frames"),
            target: TargetSize::new(8, 6),
            count,
            format: StoredFormat::Png,
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn captures_selected_frames_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::solid_frames(6, 16, 12);
        let mut trigger = ScriptedTrigger::new([
            TriggerAction::Idle,
            TriggerAction::Select,
            TriggerAction::Idle,
            TriggerAction::Select,
        ]);
        let mut session = CaptureSession::new(request(dir.path(), 2));

        let paths = session.capture(&mut source, &mut trigger).unwrap();

        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(
            file_names(&dir.path().join("frames")),
            vec!["image(1).png", "image(2).png"]
        );
        assert_eq!(paths.len(), 2);
        // Frames 2 and 4 were selected; red encodes the source position.
        let first = image::open(&paths[0]).unwrap().into_rgb8();
        let second = image::open(&paths[1]).unwrap().into_rgb8();
        assert_eq!(first.dimensions(), (8, 6));
        assert_eq!(first.get_pixel(0, 0)[0], 2);
        assert_eq!(second.get_pixel(0, 0)[0], 4);
        assert_eq!(source.remaining(), 2);
    }

    #[test]
    fn premature_end_reports_partial_capture() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::solid_frames(3, 8, 6);
        let mut trigger = ScriptedTrigger::select_all(5);
        let mut session = CaptureSession::new(request(dir.path(), 5));

        let err = session.capture(&mut source, &mut trigger).unwrap_err();

        assert!(matches!(
            err,
            CaptureError::PartialCapture {
                captured: 3,
                requested: 5
            }
        ));
        assert_eq!(session.state(), SessionState::Aborted);
        assert_eq!(
            file_names(&dir.path().join("frames")),
            vec!["image(1).png", "image(2).png", "image(3).png"]
        );
    }

    #[test]
    fn empty_stream_reports_stream_ended() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new("scripted://empty", Vec::<ScriptedRead>::new());
        let mut trigger = ScriptedTrigger::select_all(1);
        let err = CaptureSession::new(request(dir.path(), 1))
            .capture(&mut source, &mut trigger)
            .unwrap_err();
        assert!(matches!(err, CaptureError::StreamEnded));
    }

    #[test]
    fn unopenable_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::solid_frames(1, 8, 6).refusing_open();
        let mut trigger = ScriptedTrigger::select_all(1);
        let err = CaptureSession::new(request(dir.path(), 1))
            .capture(&mut source, &mut trigger)
            .unwrap_err();
        assert!(matches!(err, CaptureError::Unopened(_)));
    }

    #[test]
    fn transient_failures_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::new(
            "scripted://flaky",
            [
                ScriptedRead::Transient,
                ScriptedRead::Image(RgbImage::new(8, 6)),
                ScriptedRead::Transient,
                ScriptedRead::Image(RgbImage::new(8, 6)),
            ],
        );
        let mut trigger = ScriptedTrigger::select_all(2);
        let paths = CaptureSession::new(request(dir.path(), 2))
            .capture(&mut source, &mut trigger)
            .unwrap();
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn cancel_flag_aborts_between_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::solid_frames(4, 8, 6);
        let mut trigger = ScriptedTrigger::select_all(4);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let mut session = CaptureSession::new(request(dir.path(), 4))
            .with_cancel_flag(cancel)
            .with_observer(move |_, progress| {
                if progress.captured == 1 {
                    flag.store(true, Ordering::SeqCst);
                }
            });

        let err = session.capture(&mut source, &mut trigger).unwrap_err();

        assert!(matches!(
            err,
            CaptureError::Cancelled {
                captured: 1,
                requested: 4
            }
        ));
        assert_eq!(err.captured(), 1);
    }

    #[test]
    fn indices_continue_after_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir_all(&frames).unwrap();
        RgbImage::new(8, 6).save(frames.join("image(1).png")).unwrap();

        let mut source = ScriptedSource::solid_frames(1, 8, 6);
        let mut trigger = ScriptedTrigger::select_all(1);
        let paths = CaptureSession::new(request(dir.path(), 1))
            .capture(&mut source, &mut trigger)
            .unwrap();
        assert_eq!(paths, vec![frames.join("image(2).png")]);
    }

    #[test]
    fn zero_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedSource::solid_frames(1, 8, 6);
        let mut trigger = ScriptedTrigger::select_all(1);
        let err = CaptureSession::new(request(dir.path(), 0))
            .capture(&mut source, &mut trigger)
            .unwrap_err();
        assert!(matches!(err, CaptureError::InvalidRequest(_)));
    }
}
