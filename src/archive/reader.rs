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
    field::{Attribute, Coord, Field, Mesh, MeshLocation},
    Float,
};
use log::debug;
use ndarray::{Array1, Array2, ArrayD, IxDyn};
use netcdf::{types::NcVariableType, AttributeValue};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{collections::BTreeMap, path::Path, sync::Arc};

/// Variable attributes that are represented by field members
/// and are not copied into the attributes map.
const STRUCTURAL_ATTRIBUTES: [&str; 10] = [
    "standard_name",
    "long_name",
    "units",
    "coordinates",
    "bounds",
    "mesh",
    "location",
    "_FillValue",
    "missing_value",
    "_Netcdf4Dimid",
];

/// Metadata of one variable, read once.
#[derive(Clone, Debug)]
struct VarInfo {
    name: String,
    dims: Vec<String>,
    attrs: BTreeMap<String, Attribute>,

    /// Integer or floating point storage.
    numeric: bool,
}

impl VarInfo {
    fn text(&self, attr: &str) -> Option<&str> {
        self.attrs.get(attr).and_then(Attribute::as_text)
    }

    fn names_in(&self, attr: &str) -> Vec<String> {
        self.text(attr)
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// CF coordinate variable: one-dimensional and named as its dimension.
    fn is_coordinate_variable(&self) -> bool {
        self.dims.len() == 1 && self.dims[0] == self.name
    }

    /// Name the variable gets when used as a coordinate.
    fn coord_name(&self) -> String {
        match self.text("standard_name") {
            Some(std @ (LONGITUDE | LATITUDE | TIME)) => std.to_string(),
            _ => self.name.clone(),
        }
    }
}

/// Reads all data variables of the file as fields.
pub fn read(path: &Path) -> Result<Vec<Field>, ArchiveError> {
    let file = netcdf::open(path)?;

    let mut globals = BTreeMap::new();
    for attr in file.attributes() {
        if let Some(value) = convert_attribute(attr.value()?) {
            globals.insert(attr.name().to_string(), value);
        }
    }

    let mut vars = FxHashMap::default();
    let mut order = vec![];
    for var in file.variables() {
        let mut attrs = BTreeMap::new();
        for attr in var.attributes() {
            if let Some(value) = convert_attribute(attr.value()?) {
                attrs.insert(attr.name().to_string(), value);
            }
        }

        let info = VarInfo {
            name: var.name(),
            dims: var.dimensions().iter().map(|d| d.name()).collect(),
            attrs,
            numeric: matches!(var.vartype(), NcVariableType::Int(_) | NcVariableType::Float(_)),
        };

        order.push(info.name.clone());
        vars.insert(info.name.clone(), info);
    }

    let mut excluded: FxHashSet<String> = FxHashSet::default();
    let mut meshes = FxHashMap::default();

    for info in vars.values() {
        if info.text("cf_role") == Some("mesh_topology") {
            let mesh = read_mesh(&file, info, &vars)?;
            excluded.insert(info.name.clone());
            for attr in [
                "node_coordinates",
                "face_coordinates",
                "edge_coordinates",
                "face_node_connectivity",
                "edge_node_connectivity",
                "face_edge_connectivity",
                "face_face_connectivity",
                "edge_face_connectivity",
                "boundary_node_connectivity",
            ] {
                excluded.extend(info.names_in(attr));
            }
            meshes.insert(info.name.clone(), Arc::new(mesh));
        }

        if info.is_coordinate_variable() {
            excluded.insert(info.name.clone());
        }
        excluded.extend(info.names_in("coordinates"));
        excluded.extend(info.names_in("bounds"));
    }

    let mut fields = vec![];
    for name in order.iter().filter(|n| !excluded.contains(*n)) {
        let info = &vars[name];

        if !info.numeric {
            debug!("Skipping non-numeric variable {} of {}", name, path.display());
            continue;
        }

        fields.push(read_field(&file, info, &vars, &meshes, &globals)?);
    }

    Ok(fields)
}

fn read_field(
    file: &netcdf::File,
    info: &VarInfo,
    vars: &FxHashMap<String, VarInfo>,
    meshes: &FxHashMap<String, Arc<Mesh>>,
    globals: &BTreeMap<String, Attribute>,
) -> Result<Field, ArchiveError> {
    let data = read_array(file, info)?;

    let mut attributes = globals.clone();
    for (key, value) in &info.attrs {
        if !STRUCTURAL_ATTRIBUTES.contains(&key.as_str()) {
            attributes.insert(key.clone(), value.clone());
        }
    }

    let dim_names: Vec<&str> = info.dims.iter().map(String::as_str).collect();
    let mut field = Field::new(
        &info.name,
        info.text("units").unwrap_or("1"),
        data,
    )
    .with_dim_names(&dim_names);
    field.standard_name = info.text("standard_name").map(str::to_string);
    field.long_name = info.text("long_name").map(str::to_string);
    field.attributes = attributes;

    for (axis, dim) in info.dims.iter().enumerate() {
        if let Some(coord_var) = vars.get(dim).filter(|v| v.is_coordinate_variable()) {
            let coord = read_coord(file, coord_var, vars, Some(axis))?;

            if coord.is_monotonic() {
                field.add_coord(coord.promoted())?;
            } else {
                field.add_coord(coord)?;
            }
        }
    }

    for coord_name in info.names_in("coordinates") {
        let coord_var = match vars.get(&coord_name) {
            Some(v) => v,
            None => {
                debug!("Coordinate {} of {} not found", coord_name, info.name);
                continue;
            }
        };

        let axis = match coord_var.dims.as_slice() {
            [] => None,
            [dim] => match info.dims.iter().position(|d| d == dim) {
                Some(axis) => Some(axis),
                None => continue,
            },
            _ => {
                debug!("Multi-dimensional coordinate {} is not supported", coord_name);
                continue;
            }
        };

        let coord = read_coord(file, coord_var, vars, axis)?;
        if field.find_coord(&coord.name).is_none() {
            field.add_coord(coord)?;
        }
    }

    if let (Some(mesh_name), Some(location)) = (info.text("mesh"), info.text("location")) {
        let mesh = meshes
            .get(mesh_name)
            .ok_or_else(|| ArchiveError::InvalidMesh(format!("mesh {} not found", mesh_name)))?;
        let location = MeshLocation::from_ugrid(location).ok_or_else(|| {
            ArchiveError::InvalidMesh(format!("location {} is not supported", location))
        })?;

        attach_mesh(&mut field, Arc::clone(mesh), location)?;
    }

    Ok(field)
}

/// Sets the field location and adds horizontal coordinates of mesh elements
/// if the file did not list them.
fn attach_mesh(field: &mut Field, mesh: Arc<Mesh>, location: MeshLocation) -> Result<(), ArchiveError> {
    let axis = mesh
        .dim_name(location)
        .and_then(|dim| field.dim_names().iter().position(|d| d == dim));

    if let (Some(axis), Some((lon, lat))) = (axis, mesh.location_points(location)) {
        if field.find_coord(LONGITUDE).is_none() {
            field.add_coord(Coord::aux(LONGITUDE, "degrees_east", Array1::from_vec(lon), Some(axis)))?;
        }
        if field.find_coord(LATITUDE).is_none() {
            field.add_coord(Coord::aux(LATITUDE, "degrees_north", Array1::from_vec(lat), Some(axis)))?;
        }
    }

    field.location = location;
    field.mesh = Some(mesh);

    Ok(())
}

fn read_coord(
    file: &netcdf::File,
    info: &VarInfo,
    vars: &FxHashMap<String, VarInfo>,
    axis: Option<usize>,
) -> Result<Coord, ArchiveError> {
    let points = Array1::from_vec(read_values(file, &info.name)?);

    let mut coord = Coord::aux(
        &info.coord_name(),
        info.text("units").unwrap_or("1"),
        points,
        axis,
    );

    for (key, value) in &info.attrs {
        if !STRUCTURAL_ATTRIBUTES.contains(&key.as_str()) {
            coord.attributes.insert(key.clone(), value.clone());
        }
    }

    if let Some(bounds_var) = info.text("bounds").and_then(|b| vars.get(b)) {
        let values = read_values(file, &bounds_var.name)?;
        let bounds = Array2::from_shape_vec((coord.len(), 2), values)?;
        coord = coord.with_bounds(bounds)?;
    }

    Ok(coord)
}

fn read_mesh(
    file: &netcdf::File,
    info: &VarInfo,
    vars: &FxHashMap<String, VarInfo>,
) -> Result<Mesh, ArchiveError> {
    let invalid = |what: &str| ArchiveError::InvalidMesh(format!("{} of {}", what, info.name));

    let (node_lon, node_lat) = read_lon_lat(file, &info.names_in("node_coordinates"), vars)?
        .ok_or_else(|| invalid("node coordinates"))?;
    if node_lon.iter().chain(&node_lat).any(|v| !v.is_finite()) {
        return Err(invalid("non-finite node coordinates"));
    }
    let face_centres = read_lon_lat(file, &info.names_in("face_coordinates"), vars)?;
    let edge_centres = read_lon_lat(file, &info.names_in("edge_coordinates"), vars)?;

    let connectivity_name = info
        .text("face_node_connectivity")
        .ok_or_else(|| invalid("face node connectivity"))?;
    let connectivity = vars
        .get(connectivity_name)
        .ok_or_else(|| ArchiveError::MissingVariable(connectivity_name.to_string()))?;

    let start_index = connectivity
        .attrs
        .get("start_index")
        .and_then(Attribute::as_float)
        .unwrap_or(0.0) as i64;
    let fill_value = connectivity
        .attrs
        .get("_FillValue")
        .and_then(Attribute::as_float)
        .map(|v| v as i64);

    let var = file
        .variable(connectivity_name)
        .ok_or_else(|| ArchiveError::MissingVariable(connectivity_name.to_string()))?;
    let raw: Vec<i64> = var.get_values(..)?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let nodes_per_face = match shape.as_slice() {
        [_, n] if *n > 0 => *n,
        _ => return Err(invalid("face node connectivity shape")),
    };

    let mut face_nodes = Vec::with_capacity(raw.len() / nodes_per_face);
    for row in raw.chunks(nodes_per_face) {
        let mut face = Vec::with_capacity(nodes_per_face);

        for &value in row {
            if Some(value) == fill_value || value < start_index {
                continue;
            }

            let node = (value - start_index) as usize;
            if node >= node_lon.len() {
                return Err(invalid("face node index"));
            }
            face.push(node);
        }
        face_nodes.push(face);
    }

    let node_dim = first_dim(&info.names_in("node_coordinates"), vars).unwrap_or_default();
    let face_dim = info
        .text("face_dimension")
        .map(str::to_string)
        .or_else(|| connectivity.dims.first().cloned())
        .unwrap_or_default();
    let edge_dim = info
        .text("edge_dimension")
        .map(str::to_string)
        .or_else(|| first_dim(&info.names_in("edge_coordinates"), vars))
        .unwrap_or_default();

    debug!(
        "Read mesh {} with {} nodes and {} faces",
        info.name,
        node_lon.len(),
        face_nodes.len()
    );

    Ok(Mesh {
        name: info.name.clone(),
        node_lon,
        node_lat,
        face_nodes,
        face_lon: face_centres.as_ref().map(|c| c.0.clone()),
        face_lat: face_centres.map(|c| c.1),
        edge_lon: edge_centres.as_ref().map(|c| c.0.clone()),
        edge_lat: edge_centres.map(|c| c.1),
        node_dim,
        face_dim,
        edge_dim,
    })
}

/// Reads a pair of coordinate variables, ordered as (longitude, latitude)
/// by their standard names, or as listed when those are missing.
fn read_lon_lat(
    file: &netcdf::File,
    names: &[String],
    vars: &FxHashMap<String, VarInfo>,
) -> Result<Option<(Vec<Float>, Vec<Float>)>, ArchiveError> {
    if names.len() != 2 {
        return Ok(None);
    }

    let is_lat = |name: &String| {
        vars.get(name)
            .map_or(false, |v| v.text("standard_name") == Some(LATITUDE))
    };

    let (lon_name, lat_name) = if is_lat(&names[0]) {
        (&names[1], &names[0])
    } else {
        (&names[0], &names[1])
    };

    Ok(Some((read_values(file, lon_name)?, read_values(file, lat_name)?)))
}

fn first_dim(names: &[String], vars: &FxHashMap<String, VarInfo>) -> Option<String> {
    names
        .first()
        .and_then(|n| vars.get(n))
        .and_then(|v| v.dims.first().cloned())
}

fn read_values(file: &netcdf::File, name: &str) -> Result<Vec<Float>, ArchiveError> {
    let var = file
        .variable(name)
        .ok_or_else(|| ArchiveError::MissingVariable(name.to_string()))?;

    Ok(var.get_values::<Float, _>(..)?)
}

/// Reads variable data, replacing fill and missing values with NaN.
fn read_array(file: &netcdf::File, info: &VarInfo) -> Result<ArrayD<Float>, ArchiveError> {
    let var = file
        .variable(&info.name)
        .ok_or_else(|| ArchiveError::MissingVariable(info.name.clone()))?;

    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let mut values: Vec<Float> = var.get_values(..)?;

    let missing: Vec<Float> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|a| info.attrs.get(*a).and_then(Attribute::as_float))
        .collect();

    if !missing.is_empty() {
        for v in values.iter_mut() {
            if missing.contains(v) {
                *v = Float::NAN;
            }
        }
    }

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

fn convert_attribute(value: AttributeValue) -> Option<Attribute> {
    let attribute = match value {
        AttributeValue::Str(s) => Attribute::Text(s),
        AttributeValue::Strs(s) => Attribute::Text(s.join(" ")),
        AttributeValue::Uchar(v) => Attribute::Int(v.into()),
        AttributeValue::Schar(v) => Attribute::Int(v.into()),
        AttributeValue::Ushort(v) => Attribute::Int(v.into()),
        AttributeValue::Short(v) => Attribute::Int(v.into()),
        AttributeValue::Uint(v) => Attribute::Int(v.into()),
        AttributeValue::Int(v) => Attribute::Int(v.into()),
        AttributeValue::Longlong(v) => Attribute::Int(v),
        AttributeValue::Ulonglong(v) => Attribute::Int(v as i64),
        AttributeValue::Float(v) => Attribute::Float(v.into()),
        AttributeValue::Double(v) => Attribute::Float(v),
        AttributeValue::Floats(v) => Attribute::Floats(v.into_iter().map(Float::from).collect()),
        AttributeValue::Doubles(v) => Attribute::Floats(v),
        AttributeValue::Shorts(v) => Attribute::Floats(v.into_iter().map(Float::from).collect()),
        AttributeValue::Ints(v) => Attribute::Floats(v.into_iter().map(Float::from).collect()),
        _ => return None,
    };

    Some(attribute)
}

#[cfg(test)]
mod tests {
    use super::read;
    use crate::errors::ArchiveError;

    #[test]
    fn text_variables_are_not_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.nc");

        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("cell", 3).unwrap();

            let mut station = file.add_string_variable("station", &["cell"]).unwrap();
            station.put_string("north", [0usize]).unwrap();

            let mut temperature = file.add_variable::<f64>("temperature", &["cell"]).unwrap();
            temperature.put_attribute("units", "K").unwrap();
            temperature.put_values(&[250.0, 260.0, 270.0], ..).unwrap();
        }

        let fields = read(&path).unwrap();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].var_name, "temperature");
        assert_eq!(fields[0].units, "K");
        assert_eq!(fields[0].data()[[2]], 270.0);
    }

    #[test]
    fn infinite_nodes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.nc");

        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("nMesh2d_node", 3).unwrap();
            file.add_dimension("nMesh2d_face", 1).unwrap();
            file.add_dimension("nMesh2d_vertex", 3).unwrap();

            let mut mesh = file.add_variable::<i32>("Mesh2d", &[]).unwrap();
            mesh.put_attribute("cf_role", "mesh_topology").unwrap();
            mesh.put_attribute("node_coordinates", "Mesh2d_node_x Mesh2d_node_y").unwrap();
            mesh.put_attribute("face_node_connectivity", "Mesh2d_face_nodes").unwrap();

            let mut x = file.add_variable::<f64>("Mesh2d_node_x", &["nMesh2d_node"]).unwrap();
            x.put_attribute("standard_name", "longitude").unwrap();
            x.put_values(&[0.0, f64::INFINITY, 10.0], ..).unwrap();

            let mut y = file.add_variable::<f64>("Mesh2d_node_y", &["nMesh2d_node"]).unwrap();
            y.put_attribute("standard_name", "latitude").unwrap();
            y.put_values(&[0.0, 0.0, 10.0], ..).unwrap();

            let mut faces = file
                .add_variable::<i32>("Mesh2d_face_nodes", &["nMesh2d_face", "nMesh2d_vertex"])
                .unwrap();
            faces.put_values(&[0, 1, 2], ..).unwrap();
        }

        assert!(matches!(read(&path), Err(ArchiveError::InvalidMesh(_))));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(read(&dir.path().join("absent.nc")).is_err());
    }
}
