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

//! Regular latitude-longitude grid onto which fields are regridded.

use crate::{
    constants::{LATITUDE, LONGITUDE},
    errors::FieldError,
    field::Coord,
    Float,
};
use ndarray::{Array1, Array2};

#[derive(Clone, PartialEq, Debug)]
pub struct TargetGrid {
    pub latitude: Coord,
    pub longitude: Coord,

    /// Heights onto which fields on model levels are re-levelled.
    pub level_height: Option<Coord>,

    pm180: bool,
}

impl TargetGrid {
    /// Creates a global grid of `nlat` x `nlon` equal-angle cells.
    ///
    /// Cell centres lie half a spacing away from the poles
    /// and from the first longitude (`-180` or `0` when `pm180` is false).
    pub fn regular(nlat: usize, nlon: usize, pm180: bool) -> Result<Self, FieldError> {
        let lon_start = if pm180 { -180.0 } else { 0.0 };

        let latitude = cell_coord(LATITUDE, "degrees_north", -90.0, 90.0, nlat, 0)?;
        let longitude = cell_coord(
            LONGITUDE,
            "degrees_east",
            lon_start,
            lon_start + 360.0,
            nlon,
            1,
        )?;

        Ok(TargetGrid {
            latitude,
            longitude,
            level_height: None,
            pm180,
        })
    }

    pub fn with_levels(mut self, level_height: Option<Coord>) -> Self {
        self.level_height = level_height;
        self
    }

    pub fn nlat(&self) -> usize {
        self.latitude.len()
    }

    pub fn nlon(&self) -> usize {
        self.longitude.len()
    }

    /// Number of horizontal cells.
    pub fn size(&self) -> usize {
        self.nlat() * self.nlon()
    }

    /// Brings longitude into the grid convention.
    pub fn wrap_longitude(&self, lon: Float) -> Float {
        let start = if self.pm180 { -180.0 } else { 0.0 };
        (lon - start).rem_euclid(360.0) + start
    }

    /// Cell edges along latitude, `nlat + 1` values.
    pub fn lat_edges(&self) -> Vec<Float> {
        edges(&self.latitude)
    }

    /// Cell edges along longitude, `nlon + 1` values.
    pub fn lon_edges(&self) -> Vec<Float> {
        edges(&self.longitude)
    }

    /// Areas of grid cells on the unit sphere, in (lat, lon) order.
    #[cfg(test)]
    pub fn cell_areas(&self) -> Array2<Float> {
        let lat = self.lat_edges();
        let lon = self.lon_edges();

        Array2::from_shape_fn((self.nlat(), self.nlon()), |(i, j)| {
            (lon[j + 1] - lon[j]).to_radians()
                * (lat[i + 1].to_radians().sin() - lat[i].to_radians().sin())
        })
    }

    /// Centres of all cells as (lon, lat) pairs, latitude-major.
    pub fn centres(&self) -> Vec<(Float, Float)> {
        let mut centres = Vec::with_capacity(self.size());

        for &lat in self.latitude.points() {
            for &lon in self.longitude.points() {
                centres.push((lon, lat));
            }
        }

        centres
    }
}

fn cell_coord(
    name: &str,
    units: &str,
    start: Float,
    end: Float,
    count: usize,
    axis: usize,
) -> Result<Coord, FieldError> {
    let edges = Array1::linspace(start, end, count + 1);
    let points = Array1::from_shape_fn(count, |i| 0.5 * (edges[i] + edges[i + 1]));
    let bounds = Array2::from_shape_fn((count, 2), |(i, j)| edges[i + j]);

    Coord::dim(name, units, points, axis).with_bounds(bounds)
}

fn edges(coord: &Coord) -> Vec<Float> {
    match coord.bounds() {
        Some(bounds) => {
            let mut edges: Vec<Float> = bounds.column(0).to_vec();
            edges.push(bounds[[bounds.nrows() - 1, 1]]);
            edges
        }
        None => coord.points().to_vec(),
    }
}
