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

//! Data model of loaded and processed climate fields.
//!
//! A [`Field`] is a named multi-dimensional array of values
//! with coordinates describing where each value was sampled.
//! Fields can be located on cells, edges or nodes of an unstructured
//! [`Mesh`], in which case one data axis indexes mesh elements.

mod collection;
mod coord;
mod mesh;

pub use collection::Collection;
pub use coord::{Coord, CoordKind};
pub use mesh::Mesh;

use crate::{errors::FieldError, Float};
use ndarray::{ArrayD, ArrayViewD, Axis};
use std::{cmp::Ordering, collections::BTreeMap, fmt, sync::Arc};

/// Metadata value of a field, coordinate or file.
#[derive(Clone, PartialEq, Debug)]
pub enum Attribute {
    Text(String),
    Int(i64),
    Float(Float),
    Floats(Vec<Float>),
}

impl Attribute {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Attribute::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<Float> {
        match self {
            Attribute::Float(v) => Some(*v),
            Attribute::Int(v) => Some(*v as Float),
            Attribute::Floats(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::Text(value.to_string())
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Attribute::Text(value)
    }
}

impl From<Float> for Attribute {
    fn from(value: Float) -> Self {
        Attribute::Float(value)
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::Int(value)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Text(s) => write!(f, "{}", s),
            Attribute::Int(v) => write!(f, "{}", v),
            Attribute::Float(v) => write!(f, "{}", v),
            Attribute::Floats(v) => write!(f, "{:?}", v),
        }
    }
}

/// Mesh element a field's horizontal axis is located on.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MeshLocation {
    Cell,
    Edge,
    Node,

    /// Field is not located on a mesh.
    None,
}

impl MeshLocation {
    /// Parses the UGRID `location` attribute value.
    pub fn from_ugrid(location: &str) -> Option<Self> {
        match location {
            "face" => Some(MeshLocation::Cell),
            "edge" => Some(MeshLocation::Edge),
            "node" => Some(MeshLocation::Node),
            _ => None,
        }
    }
}

impl fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MeshLocation::Cell => "face",
            MeshLocation::Edge => "edge",
            MeshLocation::Node => "node",
            MeshLocation::None => "none",
        };

        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug)]
pub struct Field {
    pub var_name: String,
    pub standard_name: Option<String>,
    pub long_name: Option<String>,
    pub units: String,
    pub attributes: BTreeMap<String, Attribute>,
    pub location: MeshLocation,
    pub mesh: Option<Arc<Mesh>>,

    data: ArrayD<Float>,
    dim_names: Vec<String>,
    coords: Vec<Coord>,
}

impl Field {
    pub fn new(var_name: &str, units: &str, data: ArrayD<Float>) -> Self {
        let dim_names = (0..data.ndim()).map(|i| format!("dim{}", i)).collect();

        Field {
            var_name: var_name.to_string(),
            standard_name: None,
            long_name: None,
            units: units.to_string(),
            attributes: BTreeMap::new(),
            location: MeshLocation::None,
            mesh: None,
            data,
            dim_names,
            coords: vec![],
        }
    }

    /// Creates a field with metadata of `self`, but new data and no coordinates.
    pub fn derived(&self, data: ArrayD<Float>, dim_names: Vec<String>) -> Self {
        Field {
            var_name: self.var_name.clone(),
            standard_name: self.standard_name.clone(),
            long_name: self.long_name.clone(),
            units: self.units.clone(),
            attributes: self.attributes.clone(),
            location: MeshLocation::None,
            mesh: None,
            data,
            dim_names,
            coords: vec![],
        }
    }

    pub fn with_dim_names(mut self, names: &[&str]) -> Self {
        for (dim, name) in self.dim_names.iter_mut().zip(names) {
            *dim = name.to_string();
        }

        self
    }

    /// Name used to identify the field: standard name, long name or variable name.
    pub fn name(&self) -> &str {
        self.standard_name
            .as_deref()
            .or(self.long_name.as_deref())
            .unwrap_or(&self.var_name)
    }

    /// Checks whether any of the field's names is equal to `name`.
    pub fn matches(&self, name: &str) -> bool {
        self.var_name == name
            || self.standard_name.as_deref() == Some(name)
            || self.long_name.as_deref() == Some(name)
    }

    pub fn data(&self) -> ArrayViewD<Float> {
        self.data.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn dim_names(&self) -> &[String] {
        &self.dim_names
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    pub fn find_coord(&self, name: &str) -> Option<&Coord> {
        self.coords.iter().find(|c| c.name == name)
    }

    pub fn coord(&self, name: &str) -> Result<&Coord, FieldError> {
        self.find_coord(name)
            .ok_or_else(|| FieldError::MissingCoord(name.to_string()))
    }

    pub fn dim_coord(&self, axis: usize) -> Option<&Coord> {
        self.coords
            .iter()
            .find(|c| c.is_dim() && c.axis == Some(axis))
    }

    /// All dimension coordinates, in axis order.
    pub fn dim_coords(&self) -> Vec<&Coord> {
        let mut dims: Vec<&Coord> = self.coords.iter().filter(|c| c.is_dim()).collect();
        dims.sort_by_key(|c| c.axis);
        dims
    }

    /// Axis spanned by coordinate `name`, `None` if it is scalar or missing.
    pub fn coord_axis(&self, name: &str) -> Option<usize> {
        self.find_coord(name).and_then(|c| c.axis)
    }

    /// Adds a coordinate, checking it fits the data shape.
    pub fn add_coord(&mut self, coord: Coord) -> Result<(), FieldError> {
        if self.find_coord(&coord.name).is_some() {
            return Err(FieldError::DuplicateCoord(coord.name));
        }

        match coord.axis {
            Some(axis) => {
                if axis >= self.ndim() {
                    return Err(FieldError::AxisOutOfRange {
                        axis,
                        ndim: self.ndim(),
                    });
                }

                let found = coord.len();
                if found != self.shape()[axis] {
                    return Err(FieldError::CoordShape {
                        coord: coord.name,
                        axis,
                        expected: self.shape()[axis],
                        found,
                    });
                }

                if coord.is_dim() {
                    if self.dim_coord(axis).is_some() {
                        return Err(FieldError::DuplicateDimCoord(axis));
                    }

                    if !coord.is_monotonic() {
                        return Err(FieldError::NonMonotonic(coord.name));
                    }
                }
            }
            None => {
                let found = coord.len();
                if found != 1 || coord.is_dim() {
                    return Err(FieldError::CoordShape {
                        coord: coord.name,
                        axis: 0,
                        expected: 1,
                        found,
                    });
                }
            }
        }

        self.coords.push(coord);
        Ok(())
    }

    pub fn remove_coord(&mut self, name: &str) -> Option<Coord> {
        let index = self.coords.iter().position(|c| c.name == name)?;
        Some(self.coords.remove(index))
    }

    /// Removes an attribute, returning whether it was present.
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        self.attributes.remove(name).is_some()
    }

    /// Makes an auxiliary coordinate the dimension coordinate of its axis.
    /// Dimension coordinate previously on that axis becomes auxiliary.
    pub fn promote_to_dim(&mut self, name: &str) -> Result<(), FieldError> {
        let coord = self.coord(name)?;

        if coord.is_dim() {
            return Ok(());
        }

        let axis = coord
            .axis
            .ok_or_else(|| FieldError::MissingCoord(format!("{} on a data axis", name)))?;

        if !coord.is_monotonic() {
            return Err(FieldError::NonMonotonic(name.to_string()));
        }

        for c in self.coords.iter_mut().filter(|c| c.axis == Some(axis)) {
            c.kind = if c.name == name {
                CoordKind::Dim
            } else {
                CoordKind::Aux
            };
        }

        Ok(())
    }

    /// Sorts the field along the axis of coordinate `name` in ascending order of its points.
    pub fn sort_by_coord(&mut self, name: &str) -> Result<(), FieldError> {
        let coord = self.coord(name)?;
        let axis = coord
            .axis
            .ok_or_else(|| FieldError::MissingCoord(format!("{} on a data axis", name)))?;

        let points = coord.points();
        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|&a, &b| {
            points[a]
                .partial_cmp(&points[b])
                .unwrap_or(Ordering::Equal)
        });

        *self = self.select_along(axis, &order);
        Ok(())
    }

    /// Picks elements at `indices` along `axis`, together with their coordinates.
    pub fn select_along(&self, axis: usize, indices: &[usize]) -> Field {
        let coords = self
            .coords
            .iter()
            .map(|c| {
                if c.axis != Some(axis) {
                    return c.clone();
                }

                let mut selected = c.select(indices);
                if selected.is_dim() && !selected.is_monotonic() {
                    selected.kind = CoordKind::Aux;
                }
                selected
            })
            .collect();

        Field {
            data: self.data.select(Axis(axis), indices),
            coords,
            ..self.clone()
        }
    }

    /// Removes `axis` by taking the element at `index`.
    /// Coordinates on that axis become scalar.
    pub fn index_axis(&self, axis: usize, index: usize) -> Result<Field, FieldError> {
        self.check_axis(axis)?;

        if index >= self.shape()[axis] {
            return Err(FieldError::AxisOutOfRange {
                axis: index,
                ndim: self.shape()[axis],
            });
        }

        let coords = self
            .coords
            .iter()
            .map(|c| match c.axis {
                Some(a) if a == axis => c.at(index),
                _ => shifted_down(c, axis),
            })
            .collect();

        let mut dim_names = self.dim_names.clone();
        dim_names.remove(axis);

        Ok(Field {
            data: self.data.index_axis(Axis(axis), index).to_owned(),
            dim_names,
            coords,
            ..self.clone()
        })
    }

    /// Averages data over `axis`. Coordinates on that axis collapse
    /// into scalars spanning the whole averaged range.
    pub fn collapse_mean(&self, axis: usize) -> Result<Field, FieldError> {
        self.check_axis(axis)?;

        let axis_name = self
            .dim_coord(axis)
            .map_or_else(|| self.dim_names[axis].clone(), |c| c.name.clone());

        let data = self
            .data
            .mean_axis(Axis(axis))
            .ok_or_else(|| FieldError::EmptySelection(axis_name.clone()))?;

        let coords = self
            .coords
            .iter()
            .map(|c| match c.axis {
                Some(a) if a == axis => c.collapsed(),
                _ => shifted_down(c, axis),
            })
            .collect();

        let mut dim_names = self.dim_names.clone();
        dim_names.remove(axis);

        let mut attributes = self.attributes.clone();
        let method = format!("{}: mean", axis_name);
        let cell_methods = match attributes.get("cell_methods").and_then(Attribute::as_text) {
            Some(previous) => format!("{} {}", previous, method),
            None => method,
        };
        attributes.insert("cell_methods".to_string(), cell_methods.into());

        Ok(Field {
            data,
            dim_names,
            coords,
            attributes,
            ..self.clone()
        })
    }

    /// Turns scalar coordinate `name` into a new leading axis of length one.
    pub fn expand_scalar(&self, name: &str) -> Result<Field, FieldError> {
        let coord = self.coord(name)?;

        if !coord.is_scalar() {
            return Err(FieldError::MissingCoord(format!("scalar {}", name)));
        }

        let coords = self
            .coords
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.name == name {
                    c.kind = CoordKind::Dim;
                    c.axis = Some(0);
                } else if let Some(a) = c.axis {
                    c.axis = Some(a + 1);
                }
                c
            })
            .collect();

        let mut dim_names = self.dim_names.clone();
        dim_names.insert(0, name.to_string());

        Ok(Field {
            data: self.data.clone().insert_axis(Axis(0)),
            dim_names,
            coords,
            ..self.clone()
        })
    }

    /// Replaces data and all coordinates, keeping metadata. Caller guarantees consistency.
    pub(crate) fn with_data(mut self, data: ArrayD<Float>, coords: Vec<Coord>) -> Field {
        self.data = data;
        self.coords = coords;
        self
    }

    fn check_axis(&self, axis: usize) -> Result<(), FieldError> {
        if axis >= self.ndim() {
            return Err(FieldError::AxisOutOfRange {
                axis,
                ndim: self.ndim(),
            });
        }

        Ok(())
    }
}

fn shifted_down(coord: &Coord, removed: usize) -> Coord {
    let mut coord = coord.clone();
    if let Some(a) = coord.axis {
        if a > removed {
            coord.axis = Some(a - 1);
        }
    }
    coord
}
