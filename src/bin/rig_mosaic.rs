//! rig_mosaic - capture frames from a camera rig and assemble them into a mosaic
//!
//! Subcommands:
//! - `capture`: select frames from a live source into the image directory
//! - `assemble`: build the mosaic from images already on disk
//! - `run`: optional capture followed by assembly
//! - `probe`: check that a source delivers frames

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rig_mosaic::capture::{CaptureTrigger, IntervalTrigger, StdinTrigger};
use rig_mosaic::config::MosaicConfig;
use rig_mosaic::ingest::{self, open_source};
use rig_mosaic::pipeline::{self, CaptureStage};
use rig_mosaic::ui::Ui;
use rig_mosaic::{LeadingEdge, StoredFormat};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to a JSON or TOML config file.
    #[arg(long, global = true, env = "MOSAIC_CONFIG")]
    config: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, global = true, default_value = "auto", value_name = "MODE")]
    ui: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select frames from a live source and store them as numbered images.
    Capture(CaptureArgs),
    /// Assemble stored images into a mosaic.
    Assemble(AssembleArgs),
    /// Capture (with --capture) and assemble in one run.
    Run {
        /// Capture new frames before assembling.
        #[arg(long)]
        capture: bool,
        #[command(flatten)]
        capture_args: CaptureArgs,
        #[command(flatten)]
        assemble_args: AssembleArgs,
    },
    /// Open a source, read a few frames, and report.
    Probe {
        #[arg(long)]
        source: Option<String>,
        /// Frames to read.
        #[arg(long, default_value_t = 10)]
        frames: u64,
    },
}

#[derive(Args, Debug, Default)]
struct CaptureArgs {
    /// Source locator (stub://name, rtsp://..., /dev/videoN or a device index).
    #[arg(long)]
    source: Option<String>,
    /// Number of frames to store.
    #[arg(long)]
    count: Option<usize>,
    /// Stored image format.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// Select every Nth frame automatically instead of waiting for Enter.
    #[arg(long)]
    select_every: Option<u64>,
}

#[derive(Args, Debug, Default)]
struct AssembleArgs {
    /// Directory holding image(N) files.
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Mosaic output path (.jpg or .png).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Overlap in pixels between neighbouring images.
    #[arg(long)]
    overlap: Option<u32>,
    #[arg(long)]
    images_per_row: Option<usize>,
    /// Rows to build; 0 keeps every complete row.
    #[arg(long)]
    rows: Option<usize>,
    #[arg(long, value_enum)]
    leading_edge: Option<LeadingEdgeArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LeadingEdgeArg {
    Blend,
    Overwrite,
}

impl CaptureArgs {
    fn apply(&self, cfg: &mut MosaicConfig) {
        if let Some(source) = &self.source {
            cfg.source.locator = source.clone();
        }
        if let Some(count) = self.count {
            cfg.capture.count = count;
        }
        if let Some(format) = self.format {
            cfg.capture.format = match format {
                FormatArg::Png => StoredFormat::Png,
                FormatArg::Jpeg => StoredFormat::Jpeg,
            };
        }
        if self.select_every.is_some() {
            cfg.capture.select_every = self.select_every;
        }
    }
}

impl AssembleArgs {
    fn apply(&self, cfg: &mut MosaicConfig) {
        if let Some(dir) = &self.input_dir {
            cfg.input_dir = dir.clone();
        }
        if let Some(output) = &self.output {
            cfg.output = output.clone();
        }
        if let Some(overlap) = self.overlap {
            cfg.layout.overlap = overlap;
        }
        if let Some(per_row) = self.images_per_row {
            cfg.layout.images_per_row = per_row;
        }
        if let Some(rows) = self.rows {
            cfg.layout.rows = (rows > 0).then_some(rows);
        }
        if let Some(edge) = self.leading_edge {
            cfg.layout.leading_edge = match edge {
                LeadingEdgeArg::Blend => LeadingEdge::BlendBackground,
                LeadingEdgeArg::Overwrite => LeadingEdge::Overwrite,
            };
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&cli.ui), is_tty, !stdout_is_tty);

    let mut cfg = MosaicConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Command::Capture(args) => {
            args.apply(&mut cfg);
            cfg.validate()?;
            let written = with_live_capture(&cfg, |stage| pipeline::capture(&cfg, stage, &ui))?;
            println!(
                "captured {} images into {}",
                written.len(),
                cfg.input_dir.display()
            );
        }
        Command::Assemble(args) => {
            args.apply(&mut cfg);
            cfg.validate()?;
            let report = pipeline::run(&cfg, None, &ui)?;
            print_report(&report);
        }
        Command::Run {
            capture,
            capture_args,
            assemble_args,
        } => {
            capture_args.apply(&mut cfg);
            assemble_args.apply(&mut cfg);
            cfg.validate()?;
            let report = if capture {
                with_live_capture(&cfg, |stage| pipeline::run(&cfg, Some(stage), &ui))?
            } else {
                pipeline::run(&cfg, None, &ui)?
            };
            print_report(&report);
        }
        Command::Probe { source, frames } => {
            if let Some(source) = source {
                cfg.source.locator = source;
            }
            let mut live = open_source(&cfg.source)?;
            let report = {
                let _stage = ui.stage("probe source");
                ingest::probe(live.as_mut(), frames)?
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.frames == 0 {
                return Err(anyhow!("source {} delivered no frames", report.locator));
            }
        }
    }
    Ok(())
}

/// Open the configured source, wire Ctrl-C to cancellation, and hand a
/// capture stage to `f`.
fn with_live_capture<T, E>(
    cfg: &MosaicConfig,
    f: impl FnOnce(CaptureStage<'_>) -> std::result::Result<T, E>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let mut source = open_source(&cfg.source)
        .with_context(|| format!("failed to open source {}", cfg.source.locator))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let mut trigger: Box<dyn CaptureTrigger> = match cfg.capture.select_every {
        Some(every) => {
            log::info!("selecting every {} frames", every);
            Box::new(IntervalTrigger::new(every))
        }
        None => {
            eprintln!("press Enter to capture a frame, q + Enter to stop");
            Box::new(StdinTrigger::spawn())
        }
    };

    let stage = CaptureStage {
        source: source.as_mut(),
        trigger: trigger.as_mut(),
        cancel: Some(cancel),
    };
    Ok(f(stage)?)
}

fn print_report(report: &pipeline::PipelineReport) {
    if !report.captured.is_empty() {
        println!("captured: {} images", report.captured.len());
    }
    println!(
        "loaded: {} images ({} skipped)",
        report.loaded, report.skipped
    );
    println!(
        "mosaic: {}x{}, {} rows, {} images used, {} dropped",
        report.width, report.height, report.rows, report.images_used, report.images_dropped
    );
    println!("output: {}", report.output.display());
}
