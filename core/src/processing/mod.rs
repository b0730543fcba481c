pub mod buffer_pool;
pub mod colorize;
pub mod interpolate;
pub mod smooth;
pub mod spatial_index;

pub use buffer_pool::BufferPool;
pub use colorize::{ColorizeJob, Colorizer};
pub use interpolate::{interpolate, FieldInterpolator, IdwParams};
pub use smooth::FieldSmoother;
pub use spatial_index::SpatialIndex;
