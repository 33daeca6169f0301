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

//! Coordinates describing sample points along field axes.

use super::Attribute;
use crate::{errors::FieldError, Float};
use float_cmp::approx_eq;
use ndarray::{Array1, Array2, Axis};
use std::collections::BTreeMap;

/// Role of the coordinate in the field.
///
/// Every axis has at most one dimension coordinate,
/// which must be strictly monotonic. Auxiliary coordinates
/// can be scalar or span a single axis.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CoordKind {
    Dim,
    Aux,
}

/// Immutable set of sample points along one physical axis.
#[derive(Clone, PartialEq, Debug)]
pub struct Coord {
    pub name: String,
    pub units: String,
    pub attributes: BTreeMap<String, Attribute>,
    pub kind: CoordKind,

    /// Data axis spanned by the coordinate, `None` for scalars.
    pub axis: Option<usize>,

    points: Array1<Float>,
    bounds: Option<Array2<Float>>,
}

impl Coord {
    /// Creates a scalar auxiliary coordinate.
    pub fn scalar(name: &str, units: &str, value: Float) -> Self {
        Coord::aux(name, units, Array1::from_elem(1, value), None)
    }

    pub fn aux(name: &str, units: &str, points: Array1<Float>, axis: Option<usize>) -> Self {
        Coord {
            name: name.to_string(),
            units: units.to_string(),
            attributes: BTreeMap::new(),
            kind: CoordKind::Aux,
            axis,
            points,
            bounds: None,
        }
    }

    pub fn dim(name: &str, units: &str, points: Array1<Float>, axis: usize) -> Self {
        Coord {
            kind: CoordKind::Dim,
            ..Coord::aux(name, units, points, Some(axis))
        }
    }

    /// Attaches cell bounds, which must have one `(lower, upper)` row per point.
    pub fn with_bounds(mut self, bounds: Array2<Float>) -> Result<Self, FieldError> {
        if bounds.dim() != (self.points.len(), 2) {
            return Err(FieldError::BoundsShape(self.name));
        }

        self.bounds = Some(bounds);
        Ok(self)
    }

    /// Places the coordinate on data axis `axis`.
    pub fn with_axis(mut self, axis: usize) -> Self {
        self.axis = Some(axis);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: Attribute) -> Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn points(&self) -> &Array1<Float> {
        &self.points
    }

    pub fn bounds(&self) -> Option<&Array2<Float>> {
        self.bounds.as_ref()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.axis.is_none()
    }

    pub fn is_dim(&self) -> bool {
        self.kind == CoordKind::Dim
    }

    /// Strictly increasing or strictly decreasing.
    pub fn is_monotonic(&self) -> bool {
        self.is_increasing() || self.is_decreasing()
    }

    pub fn is_increasing(&self) -> bool {
        self.points.windows(2).into_iter().all(|w| w[0] < w[1])
    }

    pub fn is_decreasing(&self) -> bool {
        self.points.windows(2).into_iter().all(|w| w[0] > w[1])
    }

    /// Guesses contiguous bounds from points: inner bounds are midpoints
    /// and outer bounds are placed half of the adjacent spacing away.
    pub fn guess_bounds(&mut self) -> Result<(), FieldError> {
        let n = self.points.len();

        if n < 2 {
            return Err(FieldError::CantGuessBounds(self.name.clone()));
        }

        let mut edges = Vec::with_capacity(n + 1);
        edges.push(self.points[0] - 0.5 * (self.points[1] - self.points[0]));

        for i in 0..n - 1 {
            edges.push(0.5 * (self.points[i] + self.points[i + 1]));
        }

        edges.push(self.points[n - 1] + 0.5 * (self.points[n - 1] - self.points[n - 2]));

        let bounds = Array2::from_shape_fn((n, 2), |(i, j)| edges[i + j]);
        self.bounds = Some(bounds);

        Ok(())
    }

    /// Widths of the cells described by bounds.
    #[cfg(test)]
    pub fn bound_widths(&self) -> Option<Array1<Float>> {
        self.bounds
            .as_ref()
            .map(|b| b.map_axis(Axis(1), |row| (row[1] - row[0]).abs()))
    }

    /// Compares name, units, points and bounds, ignoring placement.
    pub fn same_values(&self, other: &Coord) -> bool {
        if self.name != other.name || self.units != other.units || self.len() != other.len() {
            return false;
        }

        let points_equal = self
            .points
            .iter()
            .zip(other.points.iter())
            .all(|(&a, &b)| approx_eq!(Float, a, b, ulps = 4));

        let bounds_equal = match (&self.bounds, &other.bounds) {
            (Some(a), Some(b)) => a
                .iter()
                .zip(b.iter())
                .all(|(&a, &b)| approx_eq!(Float, a, b, ulps = 4)),
            (None, None) => true,
            _ => false,
        };

        points_equal && bounds_equal
    }

    /// The same coordinate as the dimension coordinate of its axis.
    pub(crate) fn promoted(self) -> Coord {
        Coord {
            kind: CoordKind::Dim,
            ..self
        }
    }

    /// Picks points (and bounds) at given indices, keeping the placement.
    pub(crate) fn select(&self, indices: &[usize]) -> Coord {
        Coord {
            points: self.points.select(Axis(0), indices),
            bounds: self.bounds.as_ref().map(|b| b.select(Axis(0), indices)),
            ..self.clone()
        }
    }

    /// Extracts the cell at `index` as a scalar auxiliary coordinate.
    pub(crate) fn at(&self, index: usize) -> Coord {
        Coord {
            kind: CoordKind::Aux,
            axis: None,
            ..self.select(&[index])
        }
    }

    /// Collapses all points into one scalar spanning their whole range.
    pub(crate) fn collapsed(&self) -> Coord {
        let lower = self
            .bounds
            .as_ref()
            .map_or_else(|| min(self.points.iter()), |b| min(b.iter()));
        let upper = self
            .bounds
            .as_ref()
            .map_or_else(|| max(self.points.iter()), |b| max(b.iter()));

        Coord {
            kind: CoordKind::Aux,
            axis: None,
            points: Array1::from_elem(1, 0.5 * (lower + upper)),
            bounds: Some(Array2::from_shape_fn((1, 2), |(_, j)| {
                if j == 0 {
                    lower
                } else {
                    upper
                }
            })),
            ..self.clone()
        }
    }

    /// Joins points (and bounds, when all parts have them) of coordinates
    /// spanning the same axis.
    pub(crate) fn joined(parts: &[&Coord]) -> Result<Coord, FieldError> {
        let first = parts
            .first()
            .ok_or_else(|| FieldError::MissingCoord(String::from("<empty>")))?;

        let points: Vec<Float> = parts.iter().flat_map(|c| c.points.iter().copied()).collect();
        let mut joined = Coord {
            points: Array1::from_vec(points),
            bounds: None,
            ..(*first).clone()
        };

        if parts.iter().all(|c| c.bounds.is_some()) {
            let rows: Vec<Float> = parts
                .iter()
                .filter_map(|c| c.bounds.as_ref())
                .flat_map(|b| b.iter().copied())
                .collect();
            let bounds = Array2::from_shape_vec((joined.len(), 2), rows)?;
            joined = joined.with_bounds(bounds)?;
        }

        Ok(joined)
    }
}

fn min<'a>(values: impl Iterator<Item = &'a Float>) -> Float {
    values.fold(Float::INFINITY, |acc, &v| acc.min(v))
}

fn max<'a>(values: impl Iterator<Item = &'a Float>) -> Float {
    values.fold(Float::NEG_INFINITY, |acc, &v| acc.max(v))
}

#[cfg(test)]
mod tests {
    use super::Coord;
    use crate::Float;
    use float_cmp::approx_eq;
    use ndarray::array;

    #[test]
    fn guess_bounds() {
        let mut coord = Coord::aux("level_height", "m", array![5.0, 15.0, 25.0], Some(0));
        coord.guess_bounds().unwrap();

        let bounds = coord.bounds().unwrap();
        assert_eq!(bounds.row(0).to_vec(), vec![0.0, 10.0]);
        assert_eq!(bounds.row(2).to_vec(), vec![20.0, 30.0]);

        let widths = coord.bound_widths().unwrap();
        assert!(widths.iter().all(|&w| approx_eq!(Float, w, 10.0)));
    }

    #[test]
    fn guess_bounds_needs_two_points() {
        let mut coord = Coord::scalar("time", "s", 0.0);
        assert!(coord.guess_bounds().is_err());
    }

    #[test]
    fn monotonicity() {
        let inc = Coord::aux("x", "1", array![1.0, 2.0, 3.0], Some(0));
        let dec = Coord::aux("x", "1", array![3.0, 2.0, 1.0], Some(0));
        let rep = Coord::aux("x", "1", array![1.0, 1.0, 3.0], Some(0));

        assert!(inc.is_increasing() && inc.is_monotonic());
        assert!(dec.is_decreasing() && dec.is_monotonic());
        assert!(!rep.is_monotonic());
    }

    #[test]
    fn collapsed_spans_bounds() {
        let mut coord = Coord::dim("time", "days since 2000-01-01", array![0.5, 1.5, 2.5], 0);
        coord.guess_bounds().unwrap();

        let scalar = coord.collapsed();
        assert!(scalar.is_scalar());
        assert_eq!(scalar.points().to_vec(), vec![1.5]);
        assert_eq!(scalar.bounds().unwrap().row(0).to_vec(), vec![0.0, 3.0]);
    }

    #[test]
    fn joined_keeps_bounds() {
        let mut a = Coord::dim("time", "s", array![0.0, 1.0], 0);
        let mut b = Coord::dim("time", "s", array![2.0, 3.0], 0);
        a.guess_bounds().unwrap();
        b.guess_bounds().unwrap();

        let joined = Coord::joined(&[&a, &b]).unwrap();
        assert_eq!(joined.points().to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(joined.bounds().unwrap().nrows(), 4);
    }
}
