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

//! First-order conservative regridding of cell-located fields.
//!
//! Overlaps between mesh faces and target cells are computed in the
//! Lambert cylindrical equal-area projection (`x = lon`, `y = sin(lat)`),
//! where planar areas equal areas on the unit sphere. Faces are clipped
//! against target cells with the Sutherland-Hodgman algorithm.
//! Face edges are treated as straight lines in that projection.

use super::Regridder;
use crate::{
    constants::AREA_EPSILON,
    errors::RegridError,
    field::{Field, MeshLocation},
    pipeline::{bisection::find_left_closest, grid::TargetGrid},
    Float,
};
use log::debug;
use ndarray::{Array1, ArrayView1};
use std::{f64::consts::PI, ops::Range};

type Point = (Float, Float);

/// Latitude (in degrees) above which a vertex is treated as a pole.
const POLE_THRESHOLD: Float = 90.0 - 1.0e-9;

#[derive(Clone, Debug)]
pub struct ConservativeRegridder {
    grid: TargetGrid,
    source_len: usize,

    /// Overlapping faces and overlap areas of each target cell, latitude-major.
    weights: Vec<Vec<(usize, Float)>>,
}

impl ConservativeRegridder {
    /// Computes overlap weights between faces of the reference field's mesh
    /// and cells of the target grid.
    pub fn new(reference: &Field, grid: TargetGrid) -> Result<Self, RegridError> {
        if reference.location != MeshLocation::Cell {
            return Err(RegridError::ReferenceLocation(reference.name().to_string()));
        }

        let mesh = reference
            .mesh
            .as_ref()
            .ok_or_else(|| RegridError::MissingMesh(reference.name().to_string()))?;

        let axis = super::horizontal_axis(reference)?;
        if reference.shape()[axis] != mesh.face_count() {
            return Err(RegridError::MeshMismatch {
                field: reference.name().to_string(),
                expected: mesh.face_count(),
                found: reference.shape()[axis],
            });
        }

        if mesh.face_count() == 0 {
            return Err(RegridError::EmptySource);
        }

        let x_edges: Vec<Float> = grid.lon_edges().iter().map(|l| l.to_radians()).collect();
        let y_edges: Vec<Float> = grid
            .lat_edges()
            .iter()
            .map(|l| l.to_radians().sin())
            .collect();
        let nlon = grid.nlon();

        let mut weights = vec![vec![]; grid.size()];
        let mut pairs = 0;

        for face in 0..mesh.face_count() {
            let polygon = project_face(&mesh.face_polygon(face));
            if polygon.len() < 3 {
                continue;
            }

            let (x_min, x_max, y_min, y_max) = extent(&polygon);

            for shift in [-2.0 * PI, 0.0, 2.0 * PI] {
                let shifted: Vec<Point> = polygon.iter().map(|&(x, y)| (x + shift, y)).collect();
                let lon_cells = match candidates(&x_edges, x_min + shift, x_max + shift) {
                    Some(cells) => cells,
                    None => continue,
                };
                let lat_cells = match candidates(&y_edges, y_min, y_max) {
                    Some(cells) => cells,
                    None => continue,
                };

                for i in lat_cells {
                    for j in lon_cells.clone() {
                        let clipped = clip(
                            &shifted,
                            (x_edges[j], x_edges[j + 1]),
                            (y_edges[i], y_edges[i + 1]),
                        );
                        let area = polygon_area(&clipped);

                        if area > AREA_EPSILON {
                            let cell = &mut weights[i * nlon + j];
                            match cell.iter_mut().find(|(f, _)| *f == face) {
                                Some((_, w)) => *w += area,
                                None => {
                                    cell.push((face, area));
                                    pairs += 1;
                                }
                            }
                        }
                    }
                }
            }
        }

        debug!(
            "Computed {} conservative weights for {} faces",
            pairs,
            mesh.face_count()
        );

        Ok(ConservativeRegridder {
            grid,
            source_len: mesh.face_count(),
            weights,
        })
    }
}

impl Regridder for ConservativeRegridder {
    fn source_len(&self) -> usize {
        self.source_len
    }

    fn grid(&self) -> &TargetGrid {
        &self.grid
    }

    fn regrid_slice(&self, values: ArrayView1<Float>) -> Array1<Float> {
        self.weights
            .iter()
            .map(|cell| {
                let (sum, total) = cell
                    .iter()
                    .filter(|(face, _)| !values[*face].is_nan())
                    .fold((0.0, 0.0), |(sum, total), &(face, w)| {
                        (sum + w * values[face], total + w)
                    });

                if total > 0.0 {
                    sum / total
                } else {
                    Float::NAN
                }
            })
            .collect()
    }
}

/// Projects face vertices (degrees) to the equal-area plane,
/// keeping longitudes continuous and closing faces around poles along the pole line.
fn project_face(vertices: &[(Float, Float)]) -> Vec<Point> {
    let n = vertices.len();
    if n < 3 {
        return vec![];
    }

    // successive unwrapping keeps every edge shorter than half a turn
    let mut lons = Vec::with_capacity(n);
    lons.push(vertices[0].0);
    for k in 1..n {
        lons.push(unwrap_step(vertices[k].0, lons[k - 1]));
    }
    let winding = unwrap_step(vertices[0].0, lons[n - 1]) - lons[0];

    let at_pole = |k: usize| vertices[k].1.abs() >= POLE_THRESHOLD;

    let mut projected = Vec::with_capacity(n + 3);
    for k in 0..n {
        let y = vertices[k].1.to_radians().sin();
        let prev = (k + n - 1) % n;
        let next = (k + 1) % n;

        if at_pole(k) && !at_pole(prev) && !at_pole(next) {
            // a pole vertex spans the whole pole line between its neighbours
            let prev_lon = if k == 0 { lons[n - 1] - winding } else { lons[prev] };
            let next_lon = if k == n - 1 { lons[0] + winding } else { lons[next] };

            projected.push((prev_lon.to_radians(), y));
            projected.push((next_lon.to_radians(), y));
        } else {
            projected.push((lons[k].to_radians(), y));
        }
    }

    if winding.abs() > 180.0 {
        let mean_lat: Float = vertices.iter().map(|v| v.1).sum::<Float>() / n as Float;
        let pole_y = if mean_lat >= 0.0 { 1.0 } else { -1.0 };
        let (x0, y0) = projected[0];
        let x_end = x0 + winding.to_radians();

        projected.push((x_end, y0));
        projected.push((x_end, pole_y));
        projected.push((x0, pole_y));
    }

    projected
}

/// Longitude equal to `lon` modulo a turn, within half a turn of `previous`.
fn unwrap_step(lon: Float, previous: Float) -> Float {
    previous + (lon - previous + 180.0).rem_euclid(360.0) - 180.0
}

fn extent(polygon: &[Point]) -> (Float, Float, Float, Float) {
    polygon.iter().fold(
        (
            Float::INFINITY,
            Float::NEG_INFINITY,
            Float::INFINITY,
            Float::NEG_INFINITY,
        ),
        |(x0, x1, y0, y1), &(x, y)| (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
    )
}

/// Cells (indices into ascending `edges`) possibly overlapping `lo..hi`.
fn candidates(edges: &[Float], lo: Float, hi: Float) -> Option<Range<usize>> {
    let first = *edges.first()?;
    let last = *edges.last()?;
    let cells = edges.len() - 1;

    if hi <= first || lo >= last {
        return None;
    }

    let start = find_left_closest(edges, &lo.max(first)).ok()?;
    let end = find_left_closest(edges, &hi.min(last)).ok()?;

    Some(start.min(cells - 1)..(end + 1).min(cells))
}

/// Sutherland-Hodgman clipping of a polygon to an axis-aligned rectangle.
fn clip(polygon: &[Point], x: (Float, Float), y: (Float, Float)) -> Vec<Point> {
    let mut output = polygon.to_vec();

    output = clip_edge(&output, |p| p.0 >= x.0, |a, b| cross_x(a, b, x.0));
    output = clip_edge(&output, |p| p.0 <= x.1, |a, b| cross_x(a, b, x.1));
    output = clip_edge(&output, |p| p.1 >= y.0, |a, b| cross_y(a, b, y.0));
    output = clip_edge(&output, |p| p.1 <= y.1, |a, b| cross_y(a, b, y.1));

    output
}

fn clip_edge(
    polygon: &[Point],
    inside: impl Fn(Point) -> bool,
    intersect: impl Fn(Point, Point) -> Point,
) -> Vec<Point> {
    let mut output = Vec::with_capacity(polygon.len() + 4);

    for (k, &current) in polygon.iter().enumerate() {
        let previous = polygon[(k + polygon.len() - 1) % polygon.len()];

        match (inside(previous), inside(current)) {
            (true, true) => output.push(current),
            (true, false) => output.push(intersect(previous, current)),
            (false, true) => {
                output.push(intersect(previous, current));
                output.push(current);
            }
            (false, false) => {}
        }
    }

    output
}

fn cross_x(a: Point, b: Point, x: Float) -> Point {
    let t = (x - a.0) / (b.0 - a.0);
    (x, a.1 + t * (b.1 - a.1))
}

fn cross_y(a: Point, b: Point, y: Float) -> Point {
    let t = (y - a.1) / (b.1 - a.1);
    (a.0 + t * (b.0 - a.0), y)
}

/// Shoelace formula.
fn polygon_area(polygon: &[Point]) -> Float {
    if polygon.len() < 3 {
        return 0.0;
    }

    let twice: Float = polygon
        .iter()
        .zip(polygon.iter().cycle().skip(1))
        .map(|(a, b)| a.0 * b.1 - b.0 * a.1)
        .sum();

    0.5 * twice.abs()
}
