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

//! Horizontal regridding of fields onto the target grid.
//!
//! Every regridder maps values at source points (mesh elements or cells
//! of a rectilinear grid) to target grid cells for one horizontal slice.
//! Fields are viewed as a stack of slices over all non-horizontal axes,
//! each slice is regridded and the results are assembled into a field
//! of shape `(non-horizontal..., latitude, longitude)`.

mod bilinear;
mod conservative;
mod edge;

pub use bilinear::BilinearRegridder;
pub use conservative::ConservativeRegridder;
pub use edge::EdgeRegridder;

use super::grid::TargetGrid;
use crate::{
    constants::{LATITUDE, LONGITUDE},
    errors::RegridError,
    field::Field,
    Float,
};
use ndarray::{Array1, Array2, ArrayView1, IxDyn};

pub trait Regridder {
    /// Number of source elements in one slice.
    fn source_len(&self) -> usize;

    fn grid(&self) -> &TargetGrid;

    /// Regrids one horizontal slice, returning values
    /// for all target cells in latitude-major order.
    fn regrid_slice(&self, values: ArrayView1<Float>) -> Array1<Float>;

    /// Data axes spanned by one slice, slowest varying first.
    fn horizontal_axes(&self, field: &Field) -> Result<Vec<usize>, RegridError> {
        Ok(vec![horizontal_axis(field)?])
    }

    fn regrid(&self, field: &Field) -> Result<Field, RegridError> {
        let axes = self.horizontal_axes(field)?;
        let found: usize = axes.iter().map(|&a| field.shape()[a]).product();

        if found != self.source_len() {
            return Err(RegridError::MeshMismatch {
                field: field.name().to_string(),
                expected: self.source_len(),
                found,
            });
        }

        let slices = horizontal_slices(field, &axes)?;
        let mut regridded = Array2::from_elem((slices.nrows(), self.grid().size()), Float::NAN);

        for (slice, mut out) in slices.outer_iter().zip(regridded.outer_iter_mut()) {
            let values = self.regrid_slice(slice);

            if values.len() != out.len() {
                return Err(RegridError::SliceMerge {
                    field: field.name().to_string(),
                    reason: format!(
                        "slice has {} values but the target grid has {} cells",
                        values.len(),
                        out.len()
                    ),
                });
            }
            out.assign(&values);
        }

        assemble(field, &axes, self.grid(), regridded)
    }
}

/// Data axis indexing mesh elements, found through the longitude coordinate.
pub fn horizontal_axis(field: &Field) -> Result<usize, RegridError> {
    let missing = |coord| RegridError::MissingCoord {
        field: field.name().to_string(),
        coord,
    };

    let axis = field.coord_axis(LONGITUDE).ok_or_else(|| missing(LONGITUDE))?;

    if field.coord_axis(LATITUDE) != Some(axis) {
        return Err(missing(LATITUDE));
    }

    Ok(axis)
}

/// Longitudes (wrapped into the grid convention) and latitudes
/// of the field's mesh elements.
pub fn source_points(field: &Field, grid: &TargetGrid) -> Result<(Vec<Float>, Vec<Float>), RegridError> {
    horizontal_axis(field)?;

    let lon = field.coord(LONGITUDE)?.points().iter().map(|&l| grid.wrap_longitude(l)).collect();
    let lat = field.coord(LATITUDE)?.points().to_vec();

    Ok((lon, lat))
}

/// Reshapes field data to `(slices, source points)`, slices in row-major order
/// of the non-horizontal axes.
fn horizontal_slices(field: &Field, axes: &[usize]) -> Result<Array2<Float>, RegridError> {
    let ndim = field.ndim();
    let mut order: Vec<usize> = (0..ndim).filter(|a| !axes.contains(a)).collect();
    order.extend_from_slice(axes);

    let npoints: usize = axes.iter().map(|&a| field.shape()[a]).product();
    let nslices = field.shape().iter().product::<usize>() / npoints.max(1);

    let permuted = field.data().permuted_axes(IxDyn(&order));
    let values: Vec<Float> = permuted.iter().copied().collect();

    Ok(Array2::from_shape_vec((nslices, npoints), values)?)
}

/// Builds the regridded field from slices, restoring non-horizontal
/// coordinates and metadata of the source.
fn assemble(
    field: &Field,
    axes: &[usize],
    grid: &TargetGrid,
    slices: Array2<Float>,
) -> Result<Field, RegridError> {
    let mut shape: Vec<usize> = field
        .shape()
        .iter()
        .enumerate()
        .filter(|(a, _)| !axes.contains(a))
        .map(|(_, &n)| n)
        .collect();
    let lat_axis = shape.len();
    shape.extend([grid.nlat(), grid.nlon()]);

    if slices.ncols() != grid.size() {
        return Err(RegridError::SliceMerge {
            field: field.name().to_string(),
            reason: format!("expected {} cells per slice", grid.size()),
        });
    }

    let values: Vec<Float> = slices.into_iter().collect();
    let data = ndarray::ArrayD::from_shape_vec(IxDyn(&shape), values)?;

    let mut dim_names: Vec<String> = field
        .dim_names()
        .iter()
        .enumerate()
        .filter(|(a, _)| !axes.contains(a))
        .map(|(_, n)| n.clone())
        .collect();
    dim_names.extend([LATITUDE.to_string(), LONGITUDE.to_string()]);

    let mut regridded = field.derived(data, dim_names);

    for coord in field.coords() {
        let moved = match coord.axis {
            Some(a) if axes.contains(&a) => continue,
            Some(a) => coord.clone().with_axis(a - axes.iter().filter(|&&h| h < a).count()),
            None => coord.clone(),
        };
        regridded.add_coord(moved)?;
    }

    regridded.add_coord(grid.latitude.clone().with_axis(lat_axis))?;
    regridded.add_coord(grid.longitude.clone().with_axis(lat_axis + 1))?;

    Ok(regridded)
}
