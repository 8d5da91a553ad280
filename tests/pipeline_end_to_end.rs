use std::path::Path;

use image::{Rgb, RgbImage};

use rig_mosaic::capture::{ScriptedTrigger, TriggerAction};
use rig_mosaic::config::MosaicConfig;
use rig_mosaic::ingest::ScriptedSource;
use rig_mosaic::loader::{list_stored, load};
use rig_mosaic::pipeline::{self, CaptureStage};
use rig_mosaic::ui::Ui;
use rig_mosaic::{
    open_source, CaptureError, LayoutError, LoadError, MosaicError, StoredFormat, TargetSize,
};

/// Write `count` solid PNGs named image(1)..image(count); red channel = index.
fn write_numbered(dir: &Path, count: u32, width: u32, height: u32) {
    for i in 1..=count {
        RgbImage::from_pixel(width, height, Rgb([i as u8, 0, 0]))
            .save(dir.join(format!("image({}).png", i)))
            .unwrap();
    }
}

fn config_for(dir: &Path, output: &Path) -> MosaicConfig {
    let mut cfg = MosaicConfig::default();
    cfg.input_dir = dir.to_path_buf();
    cfg.output = output.to_path_buf();
    cfg
}

#[test]
fn numeric_order_puts_image_2_before_image_10() {
    let dir = tempfile::tempdir().unwrap();
    write_numbered(dir.path(), 12, 4, 4);

    let listed: Vec<u64> = list_stored(dir.path())
        .unwrap()
        .into_iter()
        .map(|(index, _)| index)
        .collect();
    assert_eq!(listed, (1..=12).collect::<Vec<u64>>());

    let set = load(dir.path(), TargetSize::new(4, 4)).unwrap();
    let reds: Vec<u8> = set.images.iter().map(|img| img.image.get_pixel(0, 0)[0]).collect();
    assert_eq!(reds, (1..=12).collect::<Vec<u8>>());
}

#[test]
fn twenty_four_images_build_three_rows() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    write_numbered(dir.path(), 24, 640, 480);
    let output = out_dir.path().join("panorama_with_rows.jpg");

    let report = pipeline::run(&config_for(dir.path(), &output), None, &Ui::plain()).unwrap();

    assert_eq!(report.loaded, 24);
    assert_eq!(report.rows, 3);
    assert_eq!((report.width, report.height), (4420, 1440));
    let written = image::open(&output).unwrap();
    assert_eq!((written.width(), written.height()), (4420, 1440));
}

#[test]
fn too_few_images_for_the_layout_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    write_numbered(dir.path(), 20, 64, 48);
    let output = dir.path().join("out.png");
    let mut cfg = config_for(dir.path(), &output);
    cfg.target = TargetSize::new(64, 48);
    cfg.layout.overlap = 10;

    let err = pipeline::run(&cfg, None, &Ui::plain()).unwrap_err();
    assert!(matches!(
        err,
        MosaicError::Layout(LayoutError::InsufficientImages {
            required: 24,
            available: 20
        })
    ));
    assert!(!output.exists());
}

#[test]
fn empty_directory_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    let err = pipeline::run(&config_for(dir.path(), &output), None, &Ui::plain()).unwrap_err();
    assert!(matches!(err, MosaicError::Load(LoadError::EmptyDirectory(_))));
    assert!(!output.exists());
}

#[test]
fn captures_from_synthetic_source_then_assembles() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mosaic.png");
    let mut cfg = config_for(&dir.path().join("images"), &output);
    cfg.target = TargetSize::new(64, 48);
    cfg.source.locator = "stub://rig?frames=30&drop_every=4".to_string();
    cfg.source.width = 80;
    cfg.source.height = 60;
    cfg.capture.count = 6;
    cfg.layout.images_per_row = 3;
    cfg.layout.rows = Some(2);
    cfg.layout.overlap = 10;
    cfg.validate().unwrap();

    let mut source = open_source(&cfg.source).unwrap();
    let mut trigger = ScriptedTrigger::new(
        [TriggerAction::Idle, TriggerAction::Select]
            .into_iter()
            .cycle()
            .take(12),
    );
    let stage = CaptureStage {
        source: source.as_mut(),
        trigger: &mut trigger,
        cancel: None,
    };
    let report = pipeline::run(&cfg, Some(stage), &Ui::plain()).unwrap();

    assert_eq!(report.captured.len(), 6);
    assert!(report.captured[0].ends_with("image(1).png"));
    assert!(report.captured[5].ends_with("image(6).png"));
    assert_eq!(report.rows, 2);
    assert_eq!((report.width, report.height), (64 * 3 - 10 * 2, 96));

    let stored = image::open(&report.captured[0]).unwrap();
    assert_eq!((stored.width(), stored.height()), (64, 48));
    assert!(output.exists());
}

#[test]
fn stream_ending_early_keeps_partial_capture_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("mosaic.jpg");
    let images = dir.path().join("images");
    let mut cfg = config_for(&images, &output);
    cfg.target = TargetSize::new(32, 24);
    cfg.source.locator = "stub://rig?frames=4".to_string();
    cfg.capture.count = 6;
    cfg.capture.format = StoredFormat::Jpeg;
    cfg.layout.overlap = 4;

    let mut source = open_source(&cfg.source).unwrap();
    let mut trigger = ScriptedTrigger::select_all(10);
    let stage = CaptureStage {
        source: source.as_mut(),
        trigger: &mut trigger,
        cancel: None,
    };
    let err = pipeline::run(&cfg, Some(stage), &Ui::plain()).unwrap_err();

    assert!(matches!(
        err,
        MosaicError::Capture(CaptureError::PartialCapture {
            captured: 4,
            requested: 6
        })
    ));
    let stored = list_stored(&images).unwrap();
    assert_eq!(stored.len(), 4);
    assert!(stored[3].1.ends_with("image(4).jpeg"));
    assert!(!output.exists());
}

#[test]
fn capture_into_used_directory_assembles_only_the_new_frames() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).unwrap();
    let stale = Rgb([7, 7, 7]);
    for i in 1..=24 {
        RgbImage::from_pixel(16, 12, stale)
            .save(images.join(format!("image({}).png", i)))
            .unwrap();
    }
    let output = dir.path().join("mosaic.png");
    let mut cfg = config_for(&images, &output);
    cfg.target = TargetSize::new(16, 12);
    cfg.layout.overlap = 2;

    // Red channel of frame N is N, so every new pixel has green = 0.
    let mut source = ScriptedSource::solid_frames(24, 16, 12);
    let mut trigger = ScriptedTrigger::select_all(24);
    let stage = CaptureStage {
        source: &mut source,
        trigger: &mut trigger,
        cancel: None,
    };
    let report = pipeline::run(&cfg, Some(stage), &Ui::plain()).unwrap();

    assert!(report.captured[0].ends_with("image(25).png"));
    assert!(report.captured[23].ends_with("image(48).png"));
    assert_eq!(report.loaded, 24);
    assert_eq!((report.width, report.height), (16 * 8 - 2 * 7, 36));

    let mosaic = image::open(&output).unwrap().into_rgb8();
    assert!(mosaic.pixels().all(|p| *p != stale));
    // Interior of the first tile of each row: frames 1, 9 and 17.
    assert_eq!(mosaic.get_pixel(8, 6), &Rgb([1, 0, 0]));
    assert_eq!(mosaic.get_pixel(8, 18), &Rgb([9, 0, 0]));
    assert_eq!(mosaic.get_pixel(8, 30), &Rgb([17, 0, 0]));

    // Earlier files are untouched.
    let old = image::open(images.join("image(1).png")).unwrap().into_rgb8();
    assert_eq!(old.get_pixel(0, 0), &stale);
}
