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

//! Bilinear interpolation of fields already on a rectilinear
//! latitude-longitude grid, such as UM output.
//!
//! Longitude is periodic. Target latitudes beyond the outermost
//! source rows take the values of those rows.

use super::Regridder;
use crate::{
    constants::{LATITUDE, LONGITUDE},
    errors::{FieldError, RegridError},
    field::Field,
    pipeline::{bisection::find_bracket, grid::TargetGrid},
    Float,
};
use log::debug;
use ndarray::{Array1, ArrayView1};

/// Two source indices along one direction with their weights.
type Pair = [(usize, Float); 2];

#[derive(Clone, Debug)]
pub struct BilinearRegridder {
    grid: TargetGrid,
    source_lat: Vec<Float>,
    source_lon: Vec<Float>,

    /// Interpolation along latitude for every target row.
    rows: Vec<Pair>,

    /// Interpolation along longitude for every target column.
    columns: Vec<Pair>,
}

impl BilinearRegridder {
    /// Builds the regridder from the latitude and longitude
    /// dimension coordinates of the field.
    pub fn for_field(field: &Field, grid: TargetGrid) -> Result<Self, RegridError> {
        rectilinear_axes(field)?;

        let latitude = field.coord(LATITUDE)?;
        if !latitude.is_monotonic() {
            return Err(FieldError::NonMonotonic(latitude.name.clone()).into());
        }

        let source_lat = latitude.points().to_vec();
        let source_lon = field.coord(LONGITUDE)?.points().to_vec();

        BilinearRegridder::new(&source_lat, &source_lon, grid)
    }

    /// Computes interpolation pairs from a grid of `source_lat` x `source_lon`
    /// points to target cell centres. Latitudes must be monotonic.
    pub fn new(source_lat: &[Float], source_lon: &[Float], grid: TargetGrid) -> Result<Self, RegridError> {
        if source_lat.is_empty() || source_lon.is_empty() {
            return Err(RegridError::EmptySource);
        }

        let rows = grid
            .latitude
            .points()
            .iter()
            .map(|&lat| latitude_pair(source_lat, lat))
            .collect::<Result<Vec<_>, _>>()?;

        let (xs, indices) = periodic_longitudes(source_lon, &grid)?;
        let columns = grid
            .longitude
            .points()
            .iter()
            .map(|&lon| longitude_pair(&xs, &indices, lon))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Bilinear regridder from {}x{} points onto {}x{} cells",
            source_lat.len(),
            source_lon.len(),
            grid.nlat(),
            grid.nlon()
        );

        Ok(BilinearRegridder {
            grid,
            source_lat: source_lat.to_vec(),
            source_lon: source_lon.to_vec(),
            rows,
            columns,
        })
    }

    /// Checks whether the field lies on the source grid of the regridder.
    pub fn fits(&self, field: &Field) -> bool {
        let same = |name: &str, points: &[Float]| {
            field
                .find_coord(name)
                .map_or(false, |c| c.points().iter().eq(points.iter()))
        };

        same(LATITUDE, &self.source_lat) && same(LONGITUDE, &self.source_lon)
    }
}

impl Regridder for BilinearRegridder {
    fn source_len(&self) -> usize {
        self.source_lat.len() * self.source_lon.len()
    }

    fn grid(&self) -> &TargetGrid {
        &self.grid
    }

    fn horizontal_axes(&self, field: &Field) -> Result<Vec<usize>, RegridError> {
        let (lat_axis, lon_axis) = rectilinear_axes(field)?;

        if !self.fits(field) {
            return Err(RegridError::MeshMismatch {
                field: field.name().to_string(),
                expected: self.source_len(),
                found: field.shape()[lat_axis] * field.shape()[lon_axis],
            });
        }

        Ok(vec![lat_axis, lon_axis])
    }

    fn regrid_slice(&self, values: ArrayView1<Float>) -> Array1<Float> {
        let nlon = self.source_lon.len();
        let mut regridded = Array1::from_elem(self.grid.size(), Float::NAN);

        for (i, row) in self.rows.iter().enumerate() {
            for (j, column) in self.columns.iter().enumerate() {
                let mut sum = 0.0;

                for &(r, wr) in row {
                    for &(c, wc) in column {
                        // zero weights must not bring NaNs of unused points in
                        let weight = wr * wc;
                        if weight != 0.0 {
                            sum += weight * values[r * nlon + c];
                        }
                    }
                }

                regridded[i * self.columns.len() + j] = sum;
            }
        }

        regridded
    }
}

/// Axes of the latitude and longitude dimension coordinates.
fn rectilinear_axes(field: &Field) -> Result<(usize, usize), RegridError> {
    let missing = |coord| RegridError::MissingCoord {
        field: field.name().to_string(),
        coord,
    };

    let lat_axis = field.coord_axis(LATITUDE).ok_or_else(|| missing(LATITUDE))?;
    let lon_axis = field.coord_axis(LONGITUDE).ok_or_else(|| missing(LONGITUDE))?;

    if lat_axis == lon_axis {
        return Err(RegridError::UnsupportedLocation {
            field: field.name().to_string(),
            location: field.location.to_string(),
        });
    }

    Ok((lat_axis, lon_axis))
}

fn latitude_pair(source: &[Float], lat: Float) -> Result<Pair, RegridError> {
    let n = source.len();
    let (first, last) = (source[0], source[n - 1]);

    if n == 1 || (lat - first) * (lat - last) > 0.0 {
        let nearest = if (lat - first).abs() <= (lat - last).abs() { 0 } else { n - 1 };
        return Ok([(nearest, 1.0), (nearest, 0.0)]);
    }

    let i = find_bracket(source, &lat)?;
    let t = (lat - source[i]) / (source[i + 1] - source[i]);

    Ok([(i, 1.0 - t), (i + 1, t)])
}

/// Finite source longitudes wrapped into the grid convention and sorted,
/// extended by one point across the seam on both sides.
/// Returns the longitudes and their indices in the source.
fn periodic_longitudes(source: &[Float], grid: &TargetGrid) -> Result<(Vec<Float>, Vec<usize>), RegridError> {
    let mut sorted: Vec<(Float, usize)> = source
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_finite())
        .map(|(i, &l)| (grid.wrap_longitude(l), i))
        .collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
    sorted.dedup_by(|a, b| (a.0 - b.0).abs() < 1.0e-9);

    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(RegridError::EmptySource),
    };

    let mut extended = Vec::with_capacity(sorted.len() + 2);
    extended.push((last.0 - 360.0, last.1));
    extended.extend(sorted);
    extended.push((first.0 + 360.0, first.1));

    Ok(extended.into_iter().unzip())
}

fn longitude_pair(xs: &[Float], indices: &[usize], lon: Float) -> Result<Pair, RegridError> {
    let j = find_bracket(xs, &lon)?;
    let t = (lon - xs[j]) / (xs[j + 1] - xs[j]);

    Ok([(indices[j], 1.0 - t), (indices[j + 1], t)])
}

#[cfg(test)]
mod tests {
    use super::{latitude_pair, BilinearRegridder};
    use crate::{
        errors::RegridError,
        field::{Coord, Field},
        pipeline::{grid::TargetGrid, regrid::Regridder},
        Float,
    };
    use float_cmp::approx_eq;
    use ndarray::{array, Array, IxDyn};

    fn um_field(lon: ndarray::Array1<Float>) -> Field {
        let data = Array::from_shape_fn(IxDyn(&[2, 3, 4]), |ix| {
            (100 * ix[0] + 10 * ix[1] + ix[2]) as Float
        });
        let mut field = Field::new("air_temperature", "K", data)
            .with_dim_names(&["time", "latitude", "longitude"]);

        field.add_coord(Coord::dim("time", "days", array![0.0, 1.0], 0)).unwrap();
        field
            .add_coord(Coord::dim("latitude", "degrees_north", array![-60.0, 0.0, 60.0], 1))
            .unwrap();
        field.add_coord(Coord::dim("longitude", "degrees_east", lon, 2)).unwrap();
        field
    }

    #[test]
    fn interpolates_across_the_seam() {
        let field = um_field(array![0.0, 90.0, 180.0, 270.0]);
        let grid = TargetGrid::regular(2, 4, true).unwrap();
        let regridder = BilinearRegridder::for_field(&field, grid).unwrap();

        let regridded = regridder.regrid(&field).unwrap();
        assert_eq!(regridded.shape(), &[2, 2, 4]);
        assert_eq!(regridded.coord("time").unwrap().axis, Some(0));
        assert_eq!(regridded.coord("longitude").unwrap().points()[0], -135.0);

        let data = regridded.data();
        // -135 lies between 180 (index 2) and 270 (index 3)
        assert!(approx_eq!(Float, data[[1, 0, 0]], 105.0, epsilon = 1e-12));
        // 135 lies between 90 (index 1) and 180 (index 2)
        assert!(approx_eq!(Float, data[[0, 1, 3]], 19.0, epsilon = 1e-12));
        // -45 lies between 270 (index 3) and 0 (index 0)
        assert!(approx_eq!(Float, data[[0, 0, 1]], 4.0, epsilon = 1e-12));
    }

    #[test]
    fn latitudes_outside_are_clamped() {
        let source = [60.0, 0.0, -60.0];

        assert_eq!(latitude_pair(&source, -75.0).unwrap(), [(2, 1.0), (2, 0.0)]);
        assert_eq!(latitude_pair(&source, 75.0).unwrap(), [(0, 1.0), (0, 0.0)]);

        let [(i, wi), (j, wj)] = latitude_pair(&source, 30.0).unwrap();
        assert_eq!((i, j), (0, 1));
        assert!(approx_eq!(Float, wi, 0.5));
        assert!(approx_eq!(Float, wj, 0.5));
    }

    #[test]
    fn other_source_grid_is_rejected() {
        let grid = TargetGrid::regular(2, 4, true).unwrap();
        let regridder =
            BilinearRegridder::for_field(&um_field(array![0.0, 90.0, 180.0, 270.0]), grid).unwrap();

        let staggered = um_field(array![45.0, 135.0, 225.0, 315.0]);
        assert!(!regridder.fits(&staggered));
        assert!(matches!(
            regridder.regrid(&staggered),
            Err(RegridError::MeshMismatch { .. })
        ));
    }

    #[test]
    fn mesh_fields_are_not_rectilinear() {
        let mut field = Field::new("theta", "K", Array::zeros(IxDyn(&[3])));
        field
            .add_coord(Coord::aux("longitude", "degrees_east", array![0.0, 1.0, 2.0], Some(0)))
            .unwrap();
        field
            .add_coord(Coord::aux("latitude", "degrees_north", array![0.0, 1.0, 2.0], Some(0)))
            .unwrap();

        let grid = TargetGrid::regular(2, 4, true).unwrap();
        assert!(BilinearRegridder::for_field(&field, grid).is_err());
    }
}
