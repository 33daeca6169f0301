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

//! Normalisation of fields at load time.

use crate::{
    constants::{SECONDS_IN_DAY, TIME, TRANSIENT_ATTRIBUTES},
    errors::FieldError,
    field::{Coord, Field},
    Float,
};
use log::debug;
use ndarray::Array1;
use std::path::Path;

/// Brings the time coordinate of a freshly loaded field into canonical form.
///
/// Fields without time are not used and `None` is returned.
/// A single time sample on a data axis is removed from the data,
/// leaving a scalar time coordinate. Multiple samples become the
/// dimension coordinate of their axis, sorting the field if needed.
pub fn fix_time_coord(mut field: Field, filename: &Path) -> Result<Option<Field>, FieldError> {
    let time = match field.find_coord(TIME) {
        Some(time) => time,
        None => {
            debug!(
                "{} from {} has no time coordinate, ignoring",
                field.name(),
                filename.display()
            );
            return Ok(None);
        }
    };

    match time.axis {
        None => Ok(Some(field)),
        Some(axis) if time.len() == 1 => Ok(Some(field.index_axis(axis, 0)?)),
        Some(_) if time.is_dim() => Ok(Some(field)),
        Some(_) => {
            if !time.is_increasing() {
                check_unique(time)?;
                field.sort_by_coord(TIME)?;
            }

            field.promote_to_dim(TIME)?;
            Ok(Some(field))
        }
    }
}

fn check_unique(time: &Coord) -> Result<(), FieldError> {
    let mut points = time.points().to_vec();
    points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    if points.windows(2).any(|w| w[0] == w[1]) {
        return Err(FieldError::NonMonotonic(time.name.clone()));
    }

    Ok(())
}

/// Removes attributes which differ between files of one simulation.
pub fn clean_attrs(field: &mut Field) {
    for attr in TRANSIENT_ATTRIBUTES {
        if !field.remove_attribute(attr) {
            debug!("{} has no {} attribute", field.name(), attr);
        }
    }
}

/// Converts time points to days since the reference date of their units.
pub fn time_in_days(time: &Coord) -> Result<Array1<Float>, FieldError> {
    let unit = time
        .units
        .split(" since ")
        .next()
        .map(str::trim)
        .filter(|_| time.units.contains(" since "))
        .ok_or_else(|| FieldError::UnknownTimeUnits(time.units.clone()))?;

    let seconds = match unit {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
        "days" | "day" | "d" => SECONDS_IN_DAY,
        _ => return Err(FieldError::UnknownTimeUnits(time.units.clone())),
    };

    Ok(time.points().mapv(|t| t * seconds / SECONDS_IN_DAY))
}
