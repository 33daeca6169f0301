/*
Copyright 2021 Jakub Lewandowski

This file is part of Climate Model Post-Processor (climpp).

Climate Model Post-Processor (climpp) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Climate Model Post-Processor (climpp) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Climate Model Post-Processor (climpp). If not, see https://www.gnu.org/licenses/.
*/

//! Synthesis of the `level_height` coordinate for fields on model levels.

use super::{configuration::Levels, vertlevs::VerticalLevels};
use crate::{
    constants::{LEVELS_SUFFIX, LEVEL_HEIGHT},
    errors::{ConfigError, LevelsError, PipelineError},
    field::{Attribute, Coord, Field},
    Float,
};
use log::debug;
use ndarray::Array1;
use std::path::PathBuf;

/// Source of level heights.
#[derive(Clone, PartialEq, Debug)]
pub enum LevelHeightStrategy {
    /// Levels equally spaced between the surface and the model top.
    Uniform { model_top_height: Float },

    /// Levels read from a UM level definition file.
    File {
        path: PathBuf,
        levels: VerticalLevels,
    },
}

impl LevelHeightStrategy {
    /// Chooses strategy from the command line label:
    /// `uniform` or `um_<levels set>` for `<vert_dir>/vertlevs_<levels set>`.
    pub fn from_label(label: &str, config: &Levels) -> Result<Self, PipelineError> {
        if label == "uniform" {
            return Ok(LevelHeightStrategy::Uniform {
                model_top_height: config.model_top_height,
            });
        }

        let set = label
            .strip_prefix("um_")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::InvalidLevelHeight(label.to_string()))?;

        let path = config.vert_dir.join(format!("vertlevs_{}", set));
        debug!("Reading level definitions from {}", path.display());
        let levels = VerticalLevels::from_file(&path)?;

        Ok(LevelHeightStrategy::File { path, levels })
    }

    /// Heights for `count` levels, full or half.
    fn heights(&self, coord_name: &str, count: usize, full: bool) -> Result<Vec<Float>, LevelsError> {
        let heights = match self {
            LevelHeightStrategy::Uniform { model_top_height } => {
                equally_spaced_heights(count, *model_top_height, full)
            }
            LevelHeightStrategy::File { levels, .. } if full => levels.theta_heights(),
            LevelHeightStrategy::File { levels, .. } => levels.rho_heights(),
        };

        if heights.len() != count {
            return Err(LevelsError::CountMismatch {
                coord: coord_name.to_string(),
                expected: count,
                found: heights.len(),
            });
        }

        Ok(heights)
    }
}

/// Heights of `count` levels equally spaced up to `top`.
///
/// Full levels span from the surface to the top inclusive,
/// half levels lie in the middle of `count` equal layers.
pub fn equally_spaced_heights(count: usize, top: Float, full: bool) -> Vec<Float> {
    if full {
        Array1::linspace(0.0, top, count).to_vec()
    } else {
        let edges = Array1::linspace(0.0, top, count + 1);
        edges
            .windows(2)
            .into_iter()
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect()
    }
}

/// Attaches `level_height` to a field with exactly one
/// dimension coordinate of model levels. Other fields are returned unchanged.
pub fn add_level_height(mut field: Field, strategy: &LevelHeightStrategy) -> Result<Field, LevelsError> {
    let level_coords: Vec<&Coord> = field
        .dim_coords()
        .into_iter()
        .filter(|c| c.name.ends_with(LEVELS_SUFFIX))
        .collect();

    let (name, axis, count) = match level_coords.as_slice() {
        [coord] => match coord.axis {
            Some(axis) => (coord.name.clone(), axis, coord.len()),
            None => return Ok(field),
        },
        _ => return Ok(field),
    };

    let full = name.to_lowercase().contains("full");
    let heights = strategy.heights(&name, count, full)?;

    let mut height = Coord::aux(LEVEL_HEIGHT, "m", Array1::from_vec(heights), Some(axis))
        .with_attribute("positive", Attribute::from("up"));
    if count > 1 {
        height.guess_bounds()?;
    }

    field.remove_coord(LEVEL_HEIGHT);
    field.add_coord(height)?;

    Ok(field)
}
