//! Rig mosaic
//!
//! Captures still frames from a live camera feed, stores them as numbered
//! images, and assembles them into one seamless multi-row mosaic.
//!
//! # Pipeline
//!
//! 1. **Capture**: an operator (or a trigger) selects frames from a live
//!    source; each is resized to the canonical size and saved as `image(N).png`.
//! 2. **Load**: stored images are listed in numeric index order
//!    (`image(2)` before `image(10)`) and decoded at the canonical size.
//! 3. **Assemble**: consecutive groups of `images_per_row` are composited into
//!    rows with a linear cross-fade over `overlap` columns, and the rows are
//!    stacked top to bottom.
//! 4. **Write**: the mosaic is encoded and moved into place in one step.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (synthetic, RTSP, V4L2, scripted) and the probe
//! - `frame`: Frames and the canonical target size
//! - `capture`: Capture sessions and selection triggers
//! - `store`: Stored file naming and index parsing
//! - `loader`: Ordered loading of stored images
//! - `compose`: The seamless row compositor
//! - `mosaic`: Grid assembly
//! - `pipeline`: End-to-end driver
//! - `config`: Run configuration (file + environment)

pub mod capture;
pub mod compose;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod loader;
pub mod mosaic;
pub mod pipeline;
pub mod store;
pub mod ui;

pub use capture::{
    CaptureProgress, CaptureRequest, CaptureSession, CaptureTrigger, IntervalTrigger,
    ScriptedTrigger, SessionState, StdinTrigger, TriggerAction,
};
pub use compose::{compose_row, compose_row_with, row_width, LeadingEdge};
pub use config::MosaicConfig;
pub use error::{CaptureError, LayoutError, LoadError, MosaicError, SourceError};
pub use frame::{Frame, TargetSize};
pub use ingest::{open_source, FrameSource, ReadOutcome, SourceConfig, SourceStats};
pub use loader::{load, CanonicalImage, LoadedSet};
pub use mosaic::{compose_mosaic, compose_mosaic_with, select_for_layout, GridLayout, Mosaic};
pub use pipeline::{run, CaptureStage, PipelineReport};
pub use store::StoredFormat;
