use crate::color::{ColorMapper, PaletteName};
use crate::interface::{RenderableRaster, SmoothedRaster};
use crate::prelude::{validate_opacity, PipelineConfig, ProcessingStage, StageError, StageResult};
use crate::telemetry::log::LogManager;

/// Smoothed grid tagged with the sample generation it came from.
#[derive(Debug, Clone)]
pub struct ColorizeJob {
    pub raster: SmoothedRaster,
    pub generation: u64,
}

/// Final stage: normalizes the smoothed grid and looks every cell up in the LUT.
pub struct Colorizer {
    mapper: Option<ColorMapper>,
    logger: LogManager,
}

impl Colorizer {
    pub fn new() -> Self {
        Self {
            mapper: None,
            logger: LogManager::new("colorize"),
        }
    }

    pub fn mapper(&self) -> Option<&ColorMapper> {
        self.mapper.as_ref()
    }

    pub fn set_palette(&mut self, palette: PaletteName) -> StageResult<()> {
        self.mapper_mut()?.set_palette(palette);
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f64) -> StageResult<()> {
        self.mapper_mut()?.set_opacity(opacity)
    }

    fn mapper_mut(&mut self) -> StageResult<&mut ColorMapper> {
        self.mapper
            .as_mut()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))
    }
}

impl Default for Colorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for Colorizer {
    type Input = ColorizeJob;
    type Output = Option<RenderableRaster>;

    fn initialize(&mut self, config: &PipelineConfig) -> StageResult<()> {
        validate_opacity(config.opacity)?;
        match self.mapper.as_mut() {
            // Keep the cached table when the palette and opacity are unchanged.
            Some(mapper) => {
                mapper.set_palette(config.palette);
                mapper.set_opacity(config.opacity)?;
            }
            None => self.mapper = Some(ColorMapper::new(config.palette, config.opacity)?),
        }
        Ok(())
    }

    fn execute(&mut self, input: Self::Input) -> StageResult<Self::Output> {
        let mapper = self
            .mapper
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let ColorizeJob { raster, generation } = input;
        if !raster.is_renderable() {
            return Ok(None);
        }

        let pixels = raster
            .values
            .iter()
            .map(|&value| mapper.color_for(raster.normalize(value)))
            .collect();

        self.logger.debug(&format!(
            "colored {}x{} raster with {} (range {:.1}..{:.1})",
            raster.cols(),
            raster.rows(),
            mapper.palette(),
            raster.min,
            raster.max
        ));

        Ok(Some(RenderableRaster::new(
            raster.cols(),
            raster.rows(),
            (raster.min, raster.max),
            generation,
            pixels,
        )))
    }

    fn cleanup(&mut self) {
        self.mapper = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn job(values: ndarray::Array2<f64>) -> ColorizeJob {
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        ColorizeJob {
            raster: SmoothedRaster { values, min, max },
            generation: 7,
        }
    }

    #[test]
    fn extremes_map_to_first_and_last_stop() {
        let mut stage = Colorizer::new();
        let config = PipelineConfig {
            palette: PaletteName::Bluered,
            opacity: 1.0,
            ..PipelineConfig::default()
        };
        stage.initialize(&config).unwrap();

        let raster = stage
            .execute(job(array![[40.0, 60.0], [50.0, 45.0]]))
            .unwrap()
            .unwrap();
        assert_eq!(raster.generation, 7);
        assert_eq!(raster.value_range, (40.0, 60.0));
        assert_eq!(raster.rgba_at(0, 0), Some([0, 0, 255, 255]));
        assert_eq!(raster.rgba_at(0, 1), Some([255, 0, 0, 255]));
        assert_eq!(raster.rgba_at(1, 0), Some([0, 0, 255, 255]));
    }

    #[test]
    fn flat_raster_is_not_rendered() {
        let mut stage = Colorizer::new();
        stage.initialize(&PipelineConfig::default()).unwrap();
        assert!(stage.execute(job(array![[50.0, 50.0]])).unwrap().is_none());
    }

    #[test]
    fn reinitializing_with_same_palette_keeps_table() {
        let mut stage = Colorizer::new();
        let config = PipelineConfig::default();
        stage.initialize(&config).unwrap();
        stage.initialize(&config).unwrap();
        assert_eq!(stage.mapper().unwrap().rebuilds(), 1);

        stage.set_palette(PaletteName::Magma).unwrap();
        assert_eq!(stage.mapper().unwrap().rebuilds(), 2);
    }

    #[test]
    fn rejected_reinitialize_leaves_mapper_untouched() {
        let mut stage = Colorizer::new();
        stage.initialize(&PipelineConfig::default()).unwrap();

        let bad = PipelineConfig {
            palette: PaletteName::Coolwarm,
            opacity: 1.4,
            ..PipelineConfig::default()
        };
        assert!(matches!(stage.initialize(&bad), Err(StageError::InvalidConfig(_))));

        let mapper = stage.mapper().unwrap();
        assert_eq!(mapper.palette(), PaletteName::Plasma);
        assert_eq!(mapper.opacity(), 0.6);
        assert_eq!(mapper.rebuilds(), 1);
    }
}
