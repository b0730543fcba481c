//! Noise-field rendering pipeline and epicenter tracking.
//!
//! Sparse sound-level readings are indexed, interpolated onto a regular grid,
//! upsampled and smoothed, then colored through a palette lookup table. Next to
//! the raster, an epicenter resolver arbitrates between an externally supplied
//! estimate and locally derived ones.

pub mod color;
pub mod driver;
pub mod epicenter;
pub mod ingest;
pub mod interface;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use pipeline::{PipelineEvent, PipelineSnapshot, PipelineState};
pub use prelude::{PipelineConfig, ProcessingStage, StageError, StageResult};
