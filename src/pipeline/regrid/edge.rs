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

//! Scattered linear interpolation of edge-located fields.
//!
//! Source points are triangulated (Delaunay) in the longitude-latitude
//! plane and target cell centres are interpolated with barycentric
//! weights of the enclosing triangle. Centres outside of the convex hull,
//! and those where interpolation yields NaN, take the value of the nearest
//! source point.

use super::{source_points, Regridder};
use crate::{
    errors::RegridError,
    field::Field,
    pipeline::{grid::TargetGrid, interpolation::barycentric_weights},
    Float,
};
use kd_tree::KdTree2;
use log::debug;
use ndarray::{Array1, ArrayView1};
use ordered_float::OrderedFloat;
use spade::{DelaunayTriangulation, HasPosition, Point2, PositionInTriangulation, Triangulation};

struct SourceVertex {
    position: Point2<Float>,
    index: usize,
}

impl HasPosition for SourceVertex {
    type Scalar = Float;

    fn position(&self) -> Point2<Float> {
        self.position
    }
}

/// Precomputed interpolation of one target cell.
#[derive(Copy, Clone, PartialEq, Debug)]
struct Stencil {
    vertices: [usize; 3],

    /// `None` outside of the convex hull of source points.
    weights: Option<[Float; 3]>,

    nearest: usize,
}

#[derive(Clone, Debug)]
pub struct EdgeRegridder {
    grid: TargetGrid,
    source_len: usize,
    stencils: Vec<Stencil>,
}

impl EdgeRegridder {
    /// Builds the regridder from the horizontal coordinates of the field.
    pub fn for_field(field: &Field, grid: TargetGrid) -> Result<Self, RegridError> {
        let (lon, lat) = source_points(field, &grid)?;
        EdgeRegridder::new(&lon, &lat, grid)
    }

    /// Computes interpolation stencils from source points to target cell centres.
    pub fn new(source_lon: &[Float], source_lat: &[Float], grid: TargetGrid) -> Result<Self, RegridError> {
        if source_lon.is_empty() {
            return Err(RegridError::EmptySource);
        }

        let mut triangulation: DelaunayTriangulation<SourceVertex> = DelaunayTriangulation::new();
        for (index, (&lon, &lat)) in source_lon.iter().zip(source_lat).enumerate() {
            triangulation.insert(SourceVertex {
                position: Point2::new(lon, lat),
                index,
            })?;
        }

        let points: Vec<(usize, [Float; 2])> = source_lon
            .iter()
            .zip(source_lat)
            .map(|(&lon, &lat)| [lon, lat])
            .enumerate()
            .collect();
        let tree = KdTree2::build_by_key(points, |item, k| OrderedFloat(item.1[k]));

        let mut stencils = Vec::with_capacity(grid.size());
        let mut outside = 0;

        for (lon, lat) in grid.centres() {
            let nearest = tree
                .nearest_by(&[lon, lat], |item, k| item.1[k])
                .map(|found| found.item.0)
                .ok_or(RegridError::EmptySource)?;

            let stencil = match triangulation.locate(Point2::new(lon, lat)) {
                PositionInTriangulation::OnFace(face) => {
                    let [a, b, c] = triangulation.face(face).vertices();
                    let corner = |p: Point2<Float>| (p.x, p.y);
                    let triangle = [corner(a.position()), corner(b.position()), corner(c.position())];

                    Stencil {
                        vertices: [a.data().index, b.data().index, c.data().index],
                        weights: barycentric_weights(triangle, (lon, lat)),
                        nearest,
                    }
                }
                PositionInTriangulation::OnEdge(edge) => {
                    let edge = triangulation.directed_edge(edge);
                    let (from, to) = (edge.from(), edge.to());
                    let t = segment_fraction(
                        (from.position().x, from.position().y),
                        (to.position().x, to.position().y),
                        (lon, lat),
                    );

                    Stencil {
                        vertices: [from.data().index, to.data().index, to.data().index],
                        weights: Some([1.0 - t, t, 0.0]),
                        nearest,
                    }
                }
                PositionInTriangulation::OnVertex(vertex) => {
                    let index = triangulation.vertex(vertex).data().index;

                    Stencil {
                        vertices: [index; 3],
                        weights: Some([1.0, 0.0, 0.0]),
                        nearest,
                    }
                }
                PositionInTriangulation::OutsideOfConvexHull(_)
                | PositionInTriangulation::NoTriangulation => {
                    outside += 1;

                    Stencil {
                        vertices: [nearest; 3],
                        weights: None,
                        nearest,
                    }
                }
            };

            stencils.push(stencil);
        }

        debug!(
            "Edge regridder: {} source points, {} of {} target cells outside the hull",
            source_lon.len(),
            outside,
            grid.size()
        );

        Ok(EdgeRegridder {
            grid,
            source_len: source_lon.len(),
            stencils,
        })
    }
}

impl Regridder for EdgeRegridder {
    fn source_len(&self) -> usize {
        self.source_len
    }

    fn grid(&self) -> &TargetGrid {
        &self.grid
    }

    fn regrid_slice(&self, values: ArrayView1<Float>) -> Array1<Float> {
        self.stencils
            .iter()
            .map(|stencil| {
                let interpolated = match stencil.weights {
                    Some(weights) => stencil
                        .vertices
                        .iter()
                        .zip(weights)
                        .filter(|(_, w)| *w != 0.0)
                        .map(|(&v, w)| w * values[v])
                        .sum(),
                    None => Float::NAN,
                };

                if interpolated.is_nan() {
                    values[stencil.nearest]
                } else {
                    interpolated
                }
            })
            .collect()
    }
}

/// Position of `p` projected onto the segment `a..b`, as a fraction of its length.
fn segment_fraction(a: (Float, Float), b: (Float, Float), p: (Float, Float)) -> Float {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = dx * dx + dy * dy;

    if length == 0.0 {
        return 0.0;
    }

    (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length).clamp(0.0, 1.0)
}
