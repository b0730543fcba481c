use crate::color::palette::{Palette, PaletteName};
use crate::interface::Rgba;
use crate::prelude::{validate_opacity, StageResult};

pub const LUT_SIZE: usize = 256;

pub type ColorLut = [Rgba; LUT_SIZE];

/// Quantize a palette into a discrete lookup table.
///
/// Entry `i` takes the stop at `floor(i/255 * (stops - 1))`; there is no blending
/// between stops.
pub fn build_lut(palette: &Palette, opacity: f64) -> ColorLut {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let last_stop = palette.stops.len().saturating_sub(1);
    let mut lut = [[0, 0, 0, alpha]; LUT_SIZE];
    if palette.stops.is_empty() {
        return lut;
    }
    for (i, entry) in lut.iter_mut().enumerate() {
        let normalized = i as f64 / (LUT_SIZE - 1) as f64;
        let index = ((normalized * last_stop as f64).floor() as usize).min(last_stop);
        let [r, g, b] = palette.stops[index];
        *entry = [r, g, b, alpha];
    }
    lut
}

/// Palette/opacity pair with its cached lookup table.
///
/// The table is only rebuilt when one of the two inputs actually changes.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    palette: PaletteName,
    opacity: f64,
    lut: ColorLut,
    rebuilds: usize,
}

impl ColorMapper {
    pub fn new(palette: PaletteName, opacity: f64) -> StageResult<Self> {
        validate_opacity(opacity)?;
        Ok(Self {
            palette,
            opacity,
            lut: build_lut(&palette.palette(), opacity),
            rebuilds: 1,
        })
    }

    pub fn palette(&self) -> PaletteName {
        self.palette
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Number of table builds so far, including the initial one.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn set_palette(&mut self, palette: PaletteName) {
        if palette != self.palette {
            self.palette = palette;
            self.rebuild();
        }
    }

    pub fn set_opacity(&mut self, opacity: f64) -> StageResult<()> {
        validate_opacity(opacity)?;
        if opacity != self.opacity {
            self.opacity = opacity;
            self.rebuild();
        }
        Ok(())
    }

    #[inline]
    pub fn color_for(&self, normalized: f64) -> Rgba {
        let value = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        let index = ((value * (LUT_SIZE - 1) as f64).floor() as usize).min(LUT_SIZE - 1);
        self.lut[index]
    }

    pub fn lut(&self) -> &ColorLut {
        &self.lut
    }

    fn rebuild(&mut self) {
        self.lut = build_lut(&self.palette.palette(), self.opacity);
        self.rebuilds += 1;
        log::debug!(
            "rebuilt color table for {} at opacity {:.2}",
            self.palette,
            self.opacity
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lut_quantizes_two_stop_palette_into_halves() {
        let lut = build_lut(&PaletteName::Bluered.palette(), 1.0);
        assert_eq!(lut[0], [0, 0, 255, 255]);
        assert_eq!(lut[254], [0, 0, 255, 255]);
        assert_eq!(lut[255], [255, 0, 0, 255]);
    }

    #[test]
    fn lut_alpha_tracks_opacity() {
        let lut = build_lut(&PaletteName::Viridis.palette(), 0.6);
        assert!(lut.iter().all(|entry| entry[3] == 153));
        assert_eq!(&lut[0][..3], &[0x44, 0x01, 0x54]);
        assert_eq!(&lut[255][..3], &[0xfd, 0xe7, 0x25]);
    }

    #[test]
    fn color_for_clamps_and_is_deterministic() {
        let mapper = ColorMapper::new(PaletteName::Plasma, 1.0).unwrap();
        assert_eq!(mapper.color_for(-3.0), mapper.lut()[0]);
        assert_eq!(mapper.color_for(7.0), mapper.lut()[255]);
        assert_eq!(mapper.color_for(f64::NAN), mapper.lut()[0]);
        assert_eq!(mapper.color_for(0.42), mapper.color_for(0.42));
    }

    #[test]
    fn color_for_is_monotonic_in_stop_index() {
        let palette = PaletteName::Magma.palette();
        let mapper = ColorMapper::new(PaletteName::Magma, 1.0).unwrap();
        let stop_index = |rgba: Rgba| {
            palette
                .stops
                .iter()
                .position(|stop| stop[..] == rgba[..3])
                .unwrap()
        };
        let mut previous = 0;
        for step in 0..=1000 {
            let index = stop_index(mapper.color_for(step as f64 / 1000.0));
            assert!(index >= previous);
            previous = index;
        }
        assert_eq!(previous, palette.stops.len() - 1);
    }

    #[test]
    fn table_is_rebuilt_only_on_change() {
        let mut mapper = ColorMapper::new(PaletteName::Plasma, 0.6).unwrap();
        mapper.set_palette(PaletteName::Plasma);
        mapper.set_opacity(0.6).unwrap();
        assert_eq!(mapper.rebuilds(), 1);

        mapper.set_palette(PaletteName::Inferno);
        mapper.set_opacity(0.8).unwrap();
        assert_eq!(mapper.rebuilds(), 3);
        assert!(mapper.set_opacity(1.5).is_err());
        assert_eq!(mapper.opacity(), 0.8);
    }
}
