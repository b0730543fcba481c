pub mod candidate;
pub mod domain;
pub mod raster;
pub mod sample;

pub use candidate::{AuthoritativeMessage, EpicenterCandidate, EpicenterSource};
pub use domain::{Domain, Position};
pub use raster::{DenseField, RenderableRaster, Rgba, SmoothedRaster};
pub use sample::{NoiseLevel, RawSensorId, RawSensorReading, SamplePoint, SensorUpdate, Timestamp};
