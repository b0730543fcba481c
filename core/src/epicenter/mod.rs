pub mod resolver;
pub mod schedule;
pub mod sources;

pub use resolver::EpicenterResolver;
pub use schedule::RefreshSchedule;
pub use sources::{excess_weight, field_peak, sensor_weighted};
