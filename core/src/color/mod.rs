pub mod lut;
pub mod palette;

pub use lut::{build_lut, ColorLut, ColorMapper, LUT_SIZE};
pub use palette::{Palette, PaletteName};
