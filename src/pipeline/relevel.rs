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

//! Vertical re-levelling of fields from model levels onto target heights.

use super::{
    grid::TargetGrid,
    interpolation::{linear_1d, ExtrapolationPolicy},
};
use crate::{
    constants::{LEVELS_SUFFIX, LEVEL_HEIGHT},
    errors::RelevelError,
    field::{Coord, Field},
    Float,
};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

/// Interpolates a field on model levels onto the target grid heights.
///
/// The model levels coordinate is dropped and the target `level_height`
/// becomes the dimension coordinate of the vertical axis.
/// Fields without model levels are returned unchanged.
pub fn relevel(
    field: Field,
    grid: &TargetGrid,
    policy: ExtrapolationPolicy,
) -> Result<Field, RelevelError> {
    let axis = match field
        .dim_coords()
        .into_iter()
        .find(|c| c.name.ends_with(LEVELS_SUFFIX))
        .and_then(|c| c.axis)
    {
        Some(axis) => axis,
        None => return Ok(field),
    };

    let source = field
        .find_coord(LEVEL_HEIGHT)
        .filter(|c| c.axis == Some(axis))
        .ok_or_else(|| RelevelError::MissingLevelHeight(field.name().to_string()))?;

    let target = grid
        .level_height
        .as_ref()
        .ok_or_else(|| RelevelError::MissingTargetLevels(field.name().to_string()))?;

    let mut column_shape = vec![1; field.ndim()];
    column_shape[axis] = source.len();

    let heights = source
        .points()
        .clone()
        .into_shape(IxDyn(&column_shape))
        .map_err(crate::errors::FieldError::from)?;
    let heights = heights.broadcast(field.shape()).ok_or_else(|| {
        RelevelError::ShapeMismatch(source.name.clone(), field.name().to_string())
    })?;

    let targets: Vec<Float> = target.points().to_vec();
    let data = interpolate_columns(field.data(), heights, axis, &targets, policy)?;

    let mut coords: Vec<Coord> = field
        .coords()
        .iter()
        .filter(|c| c.axis != Some(axis))
        .cloned()
        .collect();
    coords.push(target.clone().with_axis(axis).promoted());

    let mut relevelled = field.derived(data, field.dim_names().to_vec());
    relevelled.location = field.location;
    relevelled.mesh = field.mesh.clone();

    for coord in coords {
        relevelled.add_coord(coord)?;
    }

    Ok(relevelled)
}

/// Interpolates every column of `data` along `axis` from its own vertical
/// coordinate in `source` (same shape as data) onto `targets`.
pub fn interpolate_columns(
    data: ArrayViewD<Float>,
    source: ArrayViewD<Float>,
    axis: usize,
    targets: &[Float],
    policy: ExtrapolationPolicy,
) -> Result<ArrayD<Float>, RelevelError> {
    if data.shape() != source.shape() {
        return Err(RelevelError::ShapeMismatch(
            format!("{:?}", source.shape()),
            format!("{:?}", data.shape()),
        ));
    }

    let mut shape = data.shape().to_vec();
    shape[axis] = targets.len();
    let mut output = ArrayD::from_elem(IxDyn(&shape), Float::NAN);

    let columns = data.lanes(Axis(axis)).into_iter();
    let coordinates = source.lanes(Axis(axis)).into_iter();
    let outputs = output.lanes_mut(Axis(axis)).into_iter();

    for ((ys, xs), mut out) in columns.zip(coordinates).zip(outputs) {
        let xs = xs.to_vec();
        let ys = ys.to_vec();

        for (value, &target) in out.iter_mut().zip(targets) {
            *value = linear_1d(&xs, &ys, target, policy)?;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::relevel;
    use crate::{
        errors::RelevelError,
        field::{Coord, Field},
        pipeline::{grid::TargetGrid, interpolation::ExtrapolationPolicy},
        Float,
    };
    use float_cmp::approx_eq;
    use ndarray::{array, Array, IxDyn};

    fn levelled_field() -> Field {
        // value equals height so the result is easy to predict
        let heights = [5.0, 15.0, 25.0];
        let data = Array::from_shape_fn(IxDyn(&[2, 3, 4]), |ix| heights[ix[1]] + ix[0] as Float);

        let mut field = Field::new("theta", "K", data).with_dim_names(&["time", "half_levels", "x"]);
        field
            .add_coord(Coord::dim("time", "s", array![0.0, 1.0], 0))
            .unwrap();
        field
            .add_coord(Coord::dim("half_levels", "1", array![1.0, 2.0, 3.0], 1))
            .unwrap();
        field
            .add_coord(Coord::aux("level_height", "m", array![5.0, 15.0, 25.0], Some(1)))
            .unwrap();
        field
    }

    fn grid_with_levels(levels: Vec<Float>) -> TargetGrid {
        TargetGrid::regular(2, 3, true)
            .unwrap()
            .with_levels(Some(Coord::aux("level_height", "m", Array::from_vec(levels), Some(0))))
    }

    #[test]
    fn relevel_to_target_heights() {
        let grid = grid_with_levels(vec![0.0, 10.0, 20.0, 30.0]);
        let field = relevel(levelled_field(), &grid, ExtrapolationPolicy::Linear).unwrap();

        assert_eq!(field.shape(), &[2, 4, 4]);
        assert!(field.find_coord("half_levels").is_none());

        let height = field.coord("level_height").unwrap();
        assert!(height.is_dim());
        assert_eq!(height.axis, Some(1));

        assert!(approx_eq!(Float, field.data()[[0, 0, 0]], 0.0, epsilon = 1e-12));
        assert!(approx_eq!(Float, field.data()[[1, 2, 3]], 21.0, epsilon = 1e-12));
        assert!(approx_eq!(Float, field.data()[[1, 3, 0]], 31.0, epsilon = 1e-12));
    }

    #[test]
    fn clamp_policy() {
        let grid = grid_with_levels(vec![0.0, 30.0]);
        let field = relevel(levelled_field(), &grid, ExtrapolationPolicy::Clamp).unwrap();

        assert!(approx_eq!(Float, field.data()[[0, 0, 0]], 5.0));
        assert!(approx_eq!(Float, field.data()[[0, 1, 0]], 25.0));
    }

    #[test]
    fn field_without_levels_passes_through() {
        let field = Field::new("pmsl", "Pa", Array::zeros(IxDyn(&[2, 3])));
        let grid = TargetGrid::regular(2, 3, true).unwrap();

        let result = relevel(field, &grid, ExtrapolationPolicy::Linear).unwrap();
        assert_eq!(result.shape(), &[2, 3]);
    }

    #[test]
    fn missing_target_levels() {
        let grid = TargetGrid::regular(2, 3, true).unwrap();
        let result = relevel(levelled_field(), &grid, ExtrapolationPolicy::Linear);

        assert!(matches!(result, Err(RelevelError::MissingTargetLevels(_))));
    }
}
