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

//! Module containing constants used by the post-processor.

use crate::Float;

/// Name of the time coordinate in model output.
pub const TIME: &str = "time";

/// Names of the horizontal coordinates attached to every
/// located field and to the regular target grid.
pub const LONGITUDE: &str = "longitude";
pub const LATITUDE: &str = "latitude";

/// Name of the synthesized vertical coordinate.
pub const LEVEL_HEIGHT: &str = "level_height";

/// Suffix of the model vertical level coordinates
/// (eg. `full_levels`, `half_levels`).
pub const LEVELS_SUFFIX: &str = "_levels";

/// Transient attributes differing between output files
/// of the same simulation that prevent concatenation.
pub const TRANSIENT_ATTRIBUTES: [&str; 2] = ["timeStamp", "uuid"];

/// Height of the model top (in metres) assumed
/// for the equally spaced levels.
pub const DEFAULT_MODEL_TOP_HEIGHT: Float = 32_000.0;

/// Seconds in one day, used for converting time coordinates.
pub const SECONDS_IN_DAY: Float = 86_400.0;

/// Number of sigma-p levels, close to the table A1
/// in Mayne et al. (2014).
pub const SIGMA_LEVELS_COUNT: usize = 34;

/// Topmost sigma-p level.
pub const SIGMA_LEVELS_TOP: Float = 0.01;

/// Threshold below which polygon overlaps are treated as empty.
pub const AREA_EPSILON: Float = 1.0e-14;
