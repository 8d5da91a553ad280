//! Pipeline driver.
//!
//! Runs the stages strictly in order: optional capture, load, layout
//! selection, assembly, then one write of the mosaic. The first failing stage
//! ends the run; the output file is only replaced once the mosaic is fully
//! encoded.
//!
//! A run that captures assembles exactly the frames it captured, in capture
//! order. Older images in the same directory are left alone.

use image::RgbImage;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::capture::{CaptureRequest, CaptureSession, CaptureTrigger};
use crate::config::{output_format, MosaicConfig};
use crate::error::MosaicError;
use crate::ingest::FrameSource;
use crate::loader::{self, LoadedSet};
use crate::mosaic::{compose_mosaic_with, select_for_layout, GridLayout, Mosaic};
use crate::ui::Ui;

/// Live capture to run before loading.
pub struct CaptureStage<'a> {
    pub source: &'a mut dyn FrameSource,
    pub trigger: &'a mut dyn CaptureTrigger,
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub captured: Vec<PathBuf>,
    pub loaded: usize,
    pub skipped: usize,
    pub rows: usize,
    pub images_used: usize,
    pub images_dropped: usize,
    pub width: u32,
    pub height: u32,
    pub output: PathBuf,
}

impl From<&MosaicConfig> for CaptureRequest {
    fn from(config: &MosaicConfig) -> Self {
        CaptureRequest {
            output_dir: config.input_dir.clone(),
            target: config.target,
            count: config.capture.count,
            format: config.capture.format,
        }
    }
}

impl From<&MosaicConfig> for GridLayout {
    fn from(config: &MosaicConfig) -> Self {
        GridLayout::new(config.layout.images_per_row, config.layout.overlap)
            .with_leading_edge(config.layout.leading_edge)
    }
}

/// Run a capture session into `config.input_dir`.
pub fn capture(
    config: &MosaicConfig,
    stage: CaptureStage<'_>,
    ui: &Ui,
) -> Result<Vec<PathBuf>, MosaicError> {
    let _stage = ui.stage("capture frames");
    let bar = ui.capture_progress(config.capture.count);
    let mut session = CaptureSession::new(CaptureRequest::from(config)).with_observer(
        |path, progress| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            bar.update(progress.captured, progress.requested, &name);
        },
    );
    if let Some(cancel) = stage.cancel {
        session = session.with_cancel_flag(cancel);
    }
    Ok(session.capture(stage.source, stage.trigger)?)
}

/// Load `config.input_dir` and assemble the mosaic without writing it.
pub fn assemble(config: &MosaicConfig, ui: &Ui) -> Result<(Mosaic, usize, usize), MosaicError> {
    let set = {
        let _stage = ui.stage("load images");
        loader::load(&config.input_dir, config.target)?
    };
    assemble_set(set, config, ui)
}

/// Assemble the frames one capture session wrote, in capture order.
pub fn assemble_captured(
    captured: &[PathBuf],
    config: &MosaicConfig,
    ui: &Ui,
) -> Result<(Mosaic, usize, usize), MosaicError> {
    let set = {
        let _stage = ui.stage("load captured images");
        loader::load_paths(captured, config.target)
    };
    assemble_set(set, config, ui)
}

fn assemble_set(
    set: LoadedSet,
    config: &MosaicConfig,
    ui: &Ui,
) -> Result<(Mosaic, usize, usize), MosaicError> {
    let loaded = set.len();
    let skipped = set.skipped.len();

    let _stage = ui.stage("assemble mosaic");
    let mut images = set.into_images();
    if let Some(rows) = config.layout.rows {
        images = select_for_layout(images, config.layout.images_per_row, rows)?;
    }
    let mosaic = compose_mosaic_with(&images, GridLayout::from(config))?;
    log::info!(
        "mosaic {}x{}: {} rows, {} images used, {} dropped",
        mosaic.image.width(),
        mosaic.image.height(),
        mosaic.rows,
        mosaic.images_used,
        mosaic.images_dropped
    );
    Ok((mosaic, loaded, skipped))
}

/// Full run: optional capture, then load, assemble and write.
pub fn run(
    config: &MosaicConfig,
    capture_stage: Option<CaptureStage<'_>>,
    ui: &Ui,
) -> Result<PipelineReport, MosaicError> {
    // Reject an unusable output path before any work is done.
    output_format(&config.output).map_err(|e| MosaicError::Output {
        path: config.output.clone(),
        reason: e.to_string(),
    })?;

    let captured = match capture_stage {
        Some(stage) => capture(config, stage, ui)?,
        None => Vec::new(),
    };
    let (mosaic, loaded, skipped) = if captured.is_empty() {
        assemble(config, ui)?
    } else {
        assemble_captured(&captured, config, ui)?
    };
    {
        let _stage = ui.stage("write mosaic");
        write_mosaic(&mosaic.image, &config.output)?;
    }
    log::info!("mosaic written to {}", config.output.display());

    Ok(PipelineReport {
        captured,
        loaded,
        skipped,
        rows: mosaic.rows,
        images_used: mosaic.images_used,
        images_dropped: mosaic.images_dropped,
        width: mosaic.image.width(),
        height: mosaic.image.height(),
        output: config.output.clone(),
    })
}

/// Encode `image` next to `path` and move it into place, replacing any old file.
pub fn write_mosaic(image: &RgbImage, path: &Path) -> Result<(), MosaicError> {
    let output_err = |reason: String| MosaicError::Output {
        path: path.to_path_buf(),
        reason,
    };
    let format = output_format(path).map_err(|e| output_err(e.to_string()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| output_err(e.to_string()))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".mosaic-")
        .tempfile_in(&dir)
        .map_err(|e| output_err(e.to_string()))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        image
            .write_to(&mut writer, format)
            .map_err(|e| output_err(e.to_string()))?;
        writer.flush().map_err(|e| output_err(e.to_string()))?;
    }
    tmp.persist(path)
        .map_err(|e| output_err(e.error.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn write_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"old").unwrap();

        write_mosaic(&RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])), &path).unwrap();

        let written = image::open(&path).unwrap().into_rgb8();
        assert_eq!(written.dimensions(), (3, 2));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn unsupported_extension_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gif");
        let err = write_mosaic(&RgbImage::new(2, 2), &path).unwrap_err();
        assert!(matches!(err, MosaicError::Output { .. }));
        assert!(!path.exists());
    }
}
