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

//! Module responsible for parsing and checking the configuration file.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing and automatic type checking.
//! Every section is optional and falls back to defaults used
//! for processing the LFRic benchmark simulations.
//!
//! The structures and their fields in this module directly correspond to
//! the fields inside the configuration file so you can check this documentation
//! for more details how to set it.

use super::interpolation::ExtrapolationPolicy;
use crate::{constants::DEFAULT_MODEL_TOP_HEIGHT, errors::ConfigError, Float};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Shape of the regular latitude-longitude grid
/// onto which all fields are regridded.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct GridShape {
    /// Number of latitude cells, spanning the pole-to-pole range.
    ///
    /// Cannot be smaller than `2`. Defaults to `90`.
    #[serde(default = "GridShape::default_nlat")]
    pub nlat: usize,

    /// Number of longitude cells, spanning the whole circle.
    ///
    /// Cannot be smaller than `3`. Defaults to `144`.
    #[serde(default = "GridShape::default_nlon")]
    pub nlon: usize,

    /// When `true` longitudes are in `-180..180` range,
    /// otherwise in `0..360`. Defaults to `true`.
    #[serde(default = "GridShape::default_pm180")]
    pub pm180: bool,
}

impl GridShape {
    fn default_nlat() -> usize {
        90
    }

    fn default_nlon() -> usize {
        144
    }

    fn default_pm180() -> bool {
        true
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.nlat < 2 {
            return Err(ConfigError::OutOfBounds(
                "Target grid needs at least 2 latitude cells",
            ));
        }

        if self.nlon < 3 {
            return Err(ConfigError::OutOfBounds(
                "Target grid needs at least 3 longitude cells",
            ));
        }

        Ok(())
    }
}

impl Default for GridShape {
    fn default() -> Self {
        GridShape {
            nlat: GridShape::default_nlat(),
            nlon: GridShape::default_nlon(),
            pm180: GridShape::default_pm180(),
        }
    }
}

/// Settings of the level height synthesis.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Levels {
    /// Height of the model top (in metres) for equally spaced levels.
    ///
    /// Must be positive. Defaults to `32000`.
    #[serde(default = "Levels::default_model_top_height")]
    pub model_top_height: Float,

    /// Directory with UM level definition files named `vertlevs_<set>`.
    ///
    /// Defaults to `data/vert`.
    #[serde(default = "Levels::default_vert_dir")]
    pub vert_dir: PathBuf,
}

impl Levels {
    fn default_model_top_height() -> Float {
        DEFAULT_MODEL_TOP_HEIGHT
    }

    fn default_vert_dir() -> PathBuf {
        PathBuf::from("data/vert")
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(self.model_top_height > 0.0) {
            return Err(ConfigError::OutOfBounds(
                "Model top height must be positive",
            ));
        }

        Ok(())
    }
}

impl Default for Levels {
    fn default() -> Self {
        Levels {
            model_top_height: Levels::default_model_top_height(),
            vert_dir: Levels::default_vert_dir(),
        }
    }
}

/// Settings of the vertical re-levelling.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Deserialize)]
pub struct Relevel {
    /// Treatment of target heights outside of the model levels:
    /// `linear`, `clamp`, `nan` or `error`. Defaults to `linear`.
    #[serde(default)]
    pub extrapolation: ExtrapolationPolicy,
}

/// What happens when a single field cannot be processed.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop processing and report the error.
    Abort,

    /// Log a warning and leave the field out of the output.
    Skip,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Abort
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the post-processor.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Heap memory limit in MB.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable-space.
    ///
    /// All fields are kept in memory, so with a capped allocator
    /// a too large dataset aborts with an out-of-memory message
    /// instead of exhausting the system.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if memory limit is above limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            memory: Resources::default_memory(),
        }
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target_grid: GridShape,

    #[serde(default)]
    pub levels: Levels,

    #[serde(default)]
    pub relevel: Relevel,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Names of fields selected for regridding.
    #[serde(default = "Config::default_fields")]
    pub fields: Vec<String>,

    /// Directory with planet constants files named `<planet>.json`.
    /// Constants are not attached when it is not set.
    #[serde(default)]
    pub const_dir: Option<PathBuf>,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        let config: Config = serde_yaml::from_slice(data.as_slice())?;

        config.check_bounds()?;

        Ok(config)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        self.target_grid.check_bounds()?;
        self.levels.check_bounds()?;
        self.resources.check_bounds()?;

        Ok(())
    }

    fn default_fields() -> Vec<String> {
        [
            "pmsl",
            "temperature",
            "u_in_w3",
            "v_in_w3",
            "w_in_wth",
            "grid_surface_temperature",
            "pressure_in_wth",
            "sw_direct_toa",
            "sw_up_toa",
            "lw_up_toa",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_grid: GridShape::default(),
            levels: Levels::default(),
            relevel: Relevel::default(),
            failure_policy: FailurePolicy::default(),
            fields: Config::default_fields(),
            const_dir: None,
            resources: Resources::default(),
        }
    }
}
