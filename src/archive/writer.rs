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

use crate::{
    constants::{LATITUDE, LONGITUDE, TIME},
    errors::ArchiveError,
    field::{Attribute, Collection, Coord, Field, MeshLocation},
    Float,
};
use log::debug;
use netcdf::AttributeValue;
use rustc_hash::FxHashSet;
use std::{collections::BTreeMap, path::Path};

const BOUNDS_DIM: &str = "bnds";

/// Dimension already defined in the output file.
struct WrittenDim {
    base: String,
    name: String,
    len: usize,
    coord: Option<Coord>,
}

/// Auxiliary or scalar coordinate variable already written.
struct WrittenCoord {
    name: String,
    dims: Vec<String>,
    coord: Coord,
}

/// Tracks names in the output file so that fields
/// share identical dimensions and coordinates
/// and differing ones get unique names.
#[derive(Default)]
struct Layout {
    dims: Vec<WrittenDim>,
    coords: Vec<WrittenCoord>,
    dim_names: FxHashSet<String>,
    var_names: FxHashSet<String>,
}

impl Layout {
    fn unique_name(taken: &FxHashSet<String>, base: &str) -> String {
        if !taken.contains(base) {
            return base.to_string();
        }

        (1..)
            .map(|i| format!("{}_{}", base, i))
            .find(|name| !taken.contains(name))
            .unwrap_or_else(|| base.to_string())
    }

    fn dimension(
        &mut self,
        file: &mut netcdf::FileMut,
        base: &str,
        len: usize,
        coord: Option<&Coord>,
    ) -> Result<String, ArchiveError> {
        let existing = self.dims.iter().find(|d| {
            d.base == base
                && d.len == len
                && match (&d.coord, coord) {
                    (Some(a), Some(b)) => a.same_values(b),
                    (None, None) => true,
                    _ => false,
                }
        });

        if let Some(dim) = existing {
            return Ok(dim.name.clone());
        }

        let taken: FxHashSet<String> = self.dim_names.union(&self.var_names).cloned().collect();
        let name = Layout::unique_name(&taken, base);

        file.add_dimension(&name, len)?;
        self.dim_names.insert(name.clone());

        if let Some(coord) = coord {
            self.write_coord(file, &name, coord, &[name.as_str()])?;
        }

        self.dims.push(WrittenDim {
            base: base.to_string(),
            name: name.clone(),
            len,
            coord: coord.cloned(),
        });

        Ok(name)
    }

    fn aux_coord(
        &mut self,
        file: &mut netcdf::FileMut,
        coord: &Coord,
        dims: Vec<String>,
    ) -> Result<String, ArchiveError> {
        let existing = self
            .coords
            .iter()
            .find(|c| c.dims == dims && c.coord.same_values(coord));

        if let Some(written) = existing {
            return Ok(written.name.clone());
        }

        let name = Layout::unique_name(&self.var_names, &coord.name);
        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
        self.write_coord(file, &name, coord, &dim_refs)?;

        self.coords.push(WrittenCoord {
            name: name.clone(),
            dims,
            coord: coord.clone(),
        });

        Ok(name)
    }

    fn write_coord(
        &mut self,
        file: &mut netcdf::FileMut,
        name: &str,
        coord: &Coord,
        dims: &[&str],
    ) -> Result<(), ArchiveError> {
        self.var_names.insert(name.to_string());
        let bounds_name = Layout::unique_name(&self.var_names, &format!("{}_bnds", name));

        {
            let mut var = file.add_variable::<Float>(name, dims)?;

            if [LONGITUDE, LATITUDE, TIME].contains(&coord.name.as_str()) {
                var.put_attribute("standard_name", coord.name.as_str())?;
            }
            var.put_attribute("units", coord.units.as_str())?;

            for (key, value) in &coord.attributes {
                var.put_attribute(key, to_netcdf(value))?;
            }

            if coord.bounds().is_some() {
                var.put_attribute("bounds", bounds_name.as_str())?;
            }

            let points: Vec<Float> = coord.points().iter().copied().collect();
            var.put_values(&points, ..)?;
        }

        if let Some(bounds) = coord.bounds() {
            if !self.dim_names.contains(BOUNDS_DIM) {
                file.add_dimension(BOUNDS_DIM, 2)?;
                self.dim_names.insert(BOUNDS_DIM.to_string());
            }

            let mut bounds_dims: Vec<&str> = dims.to_vec();
            bounds_dims.push(BOUNDS_DIM);

            let values: Vec<Float> = bounds.iter().copied().collect();
            let mut var = file.add_variable::<Float>(&bounds_name, &bounds_dims)?;
            var.put_values(&values, ..)?;
            self.var_names.insert(bounds_name);
        }

        Ok(())
    }

    fn field(&mut self, file: &mut netcdf::FileMut, field: &Field) -> Result<(), ArchiveError> {
        if field.location != MeshLocation::None || field.mesh.is_some() {
            return Err(ArchiveError::MeshOutput(field.var_name.clone()));
        }

        let mut dims = Vec::with_capacity(field.ndim());
        for axis in 0..field.ndim() {
            let coord = field.dim_coord(axis);
            let base = coord.map_or_else(|| field.dim_names()[axis].clone(), |c| c.name.clone());
            dims.push(self.dimension(file, &base, field.shape()[axis], coord)?);
        }

        let mut coord_names = vec![];
        for coord in field.coords().iter().filter(|c| !c.is_dim()) {
            let coord_dims = coord.axis.map(|a| vec![dims[a].clone()]).unwrap_or_default();
            coord_names.push(self.aux_coord(file, coord, coord_dims)?);
        }

        let name = Layout::unique_name(&self.var_names, &field.var_name);
        self.var_names.insert(name.clone());

        let dim_refs: Vec<&str> = dims.iter().map(String::as_str).collect();
        let mut var = file.add_variable::<Float>(&name, &dim_refs)?;

        if let Some(standard_name) = &field.standard_name {
            var.put_attribute("standard_name", standard_name.as_str())?;
        }
        if let Some(long_name) = &field.long_name {
            var.put_attribute("long_name", long_name.as_str())?;
        }
        var.put_attribute("units", field.units.as_str())?;

        for (key, value) in &field.attributes {
            var.put_attribute(key, to_netcdf(value))?;
        }

        if !coord_names.is_empty() {
            var.put_attribute("coordinates", coord_names.join(" "))?;
        }

        let values: Vec<Float> = field.data().iter().copied().collect();
        var.put_values(&values, ..)?;

        debug!("Wrote {} with dimensions {:?}", name, dims);
        Ok(())
    }
}

/// Writes all fields of the collection into a new NetCDF file.
///
/// Fields must be gridded, mesh-located fields cannot be saved.
pub fn save(
    collection: &Collection,
    path: &Path,
    globals: &BTreeMap<String, Attribute>,
) -> Result<(), ArchiveError> {
    let mut file = netcdf::create(path)?;
    let mut layout = Layout::default();

    for field in collection.iter() {
        layout.field(&mut file, field)?;
    }

    if !globals.contains_key("Conventions") {
        file.add_attribute("Conventions", "CF-1.7")?;
    }

    for (key, value) in globals {
        file.add_attribute(key, to_netcdf(value))?;
    }

    Ok(())
}

fn to_netcdf(value: &Attribute) -> AttributeValue {
    match value {
        Attribute::Text(s) => AttributeValue::Str(s.clone()),
        Attribute::Int(v) => AttributeValue::Longlong(*v),
        Attribute::Float(v) => AttributeValue::Double(*v),
        Attribute::Floats(v) => AttributeValue::Doubles(v.clone()),
    }
}
