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

//! End-to-end tests of the pipelines on small UGRID files.

use super::{
    configuration::{Config, FailurePolicy},
    regrid, sigma_p, time_mean, ModelKind,
};
use crate::{
    archive,
    cli::{RegridArgs, SigmaPArgs, TimeMeanArgs},
    errors::{PipelineError, RegridError},
    field::{Attribute, Collection, Coord, Field},
    Float,
};
use float_cmp::approx_eq;
use ndarray::{array, Array, IxDyn};
use std::{collections::BTreeMap, fs, path::Path};

const LON_EDGES: [Float; 6] = [-180.0, -108.0, -36.0, 36.0, 108.0, 180.0];
const LAT_EDGES: [Float; 3] = [-90.0, 0.0, 90.0];
const TIMES_PER_FILE: usize = 3;
const LEVELS: usize = 3;

/// Writes one LFRic-like diagnostics file with a 10-cell mesh covering the globe.
fn write_diag(path: &Path, file_index: usize) {
    let nlon = LON_EDGES.len();
    let nodes = nlon * LAT_EDGES.len();
    let faces = (nlon - 1) * (LAT_EDGES.len() - 1);

    let mut node_x = vec![];
    let mut node_y = vec![];
    for &lat in &LAT_EDGES {
        for &lon in &LON_EDGES {
            node_x.push(lon);
            node_y.push(lat);
        }
    }

    let mut face_nodes: Vec<i32> = vec![];
    let mut face_x = vec![];
    let mut face_y = vec![];
    for i in 0..LAT_EDGES.len() - 1 {
        for j in 0..nlon - 1 {
            let sw = (i * nlon + j) as i32;
            face_nodes.extend([sw, sw + 1, sw + 1 + nlon as i32, sw + nlon as i32]);
            face_x.push(0.5 * (LON_EDGES[j] + LON_EDGES[j + 1]));
            face_y.push(0.5 * (LAT_EDGES[i] + LAT_EDGES[i + 1]));
        }
    }

    // edges at the middle of cell sides along latitude lines
    let mut edge_x = vec![];
    let mut edge_y = vec![];
    for &lat in &LAT_EDGES {
        for j in 0..nlon - 1 {
            edge_x.push(0.5 * (LON_EDGES[j] + LON_EDGES[j + 1]));
            edge_y.push(lat.clamp(-80.0, 80.0));
        }
    }

    let mut file = netcdf::create(path).unwrap();
    file.add_attribute("timeStamp", format!("2023-01-0{}", file_index + 1).as_str())
        .unwrap();
    file.add_attribute("uuid", format!("run-{}", file_index).as_str()).unwrap();
    file.add_attribute("source", "lfric").unwrap();

    file.add_dimension("nMesh2d_node", nodes).unwrap();
    file.add_dimension("nMesh2d_face", faces).unwrap();
    file.add_dimension("nMesh2d_edge", edge_x.len()).unwrap();
    file.add_dimension("nMesh2d_vertex", 4).unwrap();
    file.add_dimension("time", TIMES_PER_FILE).unwrap();
    file.add_dimension("full_levels", LEVELS).unwrap();

    {
        let mut mesh = file.add_variable::<i32>("Mesh2d", &[]).unwrap();
        mesh.put_attribute("cf_role", "mesh_topology").unwrap();
        mesh.put_attribute("topology_dimension", 2i32).unwrap();
        mesh.put_attribute("node_coordinates", "Mesh2d_node_x Mesh2d_node_y").unwrap();
        mesh.put_attribute("face_coordinates", "Mesh2d_face_x Mesh2d_face_y").unwrap();
        mesh.put_attribute("edge_coordinates", "Mesh2d_edge_x Mesh2d_edge_y").unwrap();
        mesh.put_attribute("face_node_connectivity", "Mesh2d_face_nodes").unwrap();
        mesh.put_attribute("face_dimension", "nMesh2d_face").unwrap();
        mesh.put_attribute("edge_dimension", "nMesh2d_edge").unwrap();
    }

    for (name, dim, std_name, values) in [
        ("Mesh2d_node_x", "nMesh2d_node", "longitude", &node_x),
        ("Mesh2d_node_y", "nMesh2d_node", "latitude", &node_y),
        ("Mesh2d_face_x", "nMesh2d_face", "longitude", &face_x),
        ("Mesh2d_face_y", "nMesh2d_face", "latitude", &face_y),
        ("Mesh2d_edge_x", "nMesh2d_edge", "longitude", &edge_x),
        ("Mesh2d_edge_y", "nMesh2d_edge", "latitude", &edge_y),
    ] {
        let mut var = file.add_variable::<Float>(name, &[dim]).unwrap();
        var.put_attribute("standard_name", std_name).unwrap();
        var.put_values(values, ..).unwrap();
    }

    {
        let mut var = file
            .add_variable::<i32>("Mesh2d_face_nodes", &["nMesh2d_face", "nMesh2d_vertex"])
            .unwrap();
        var.put_attribute("start_index", 0i32).unwrap();
        var.put_values(&face_nodes, ..).unwrap();
    }

    {
        let first_day = (file_index * TIMES_PER_FILE + 1) as Float;
        let times: Vec<Float> = (0..TIMES_PER_FILE)
            .map(|t| (first_day + t as Float) * 86_400.0)
            .collect();

        let mut var = file.add_variable::<Float>("time", &["time"]).unwrap();
        var.put_attribute("standard_name", "time").unwrap();
        var.put_attribute("units", "seconds since 2000-01-01 00:00:00").unwrap();
        var.put_values(&times, ..).unwrap();
    }

    {
        let levels: Vec<Float> = (0..LEVELS).map(|l| l as Float).collect();
        let mut var = file.add_variable::<Float>("full_levels", &["full_levels"]).unwrap();
        var.put_values(&levels, ..).unwrap();
    }

    {
        // constant in space, one value per time step
        let values: Vec<Float> = (0..TIMES_PER_FILE * faces)
            .map(|k| 250.0 + (file_index * TIMES_PER_FILE + k / faces) as Float)
            .collect();

        let mut var = file
            .add_variable::<Float>("temperature", &["time", "nMesh2d_face"])
            .unwrap();
        var.put_attribute("units", "K").unwrap();
        var.put_attribute("mesh", "Mesh2d").unwrap();
        var.put_attribute("location", "face").unwrap();
        var.put_attribute("online_operation", "instant").unwrap();
        var.put_values(&values, ..).unwrap();
    }

    {
        // grows with model level
        let values: Vec<Float> = (0..TIMES_PER_FILE * LEVELS * faces)
            .map(|k| 300.0 + 10.0 * ((k / faces) % LEVELS) as Float)
            .collect();

        let mut var = file
            .add_variable::<Float>(
                "air_potential_temperature",
                &["time", "full_levels", "nMesh2d_face"],
            )
            .unwrap();
        var.put_attribute("units", "K").unwrap();
        var.put_attribute("mesh", "Mesh2d").unwrap();
        var.put_attribute("location", "face").unwrap();
        var.put_values(&values, ..).unwrap();
    }

    {
        let values = vec![5.0; TIMES_PER_FILE * edge_x.len()];
        let mut var = file
            .add_variable::<Float>("u_in_w2h", &["time", "nMesh2d_edge"])
            .unwrap();
        var.put_attribute("units", "ms-1").unwrap();
        var.put_attribute("mesh", "Mesh2d").unwrap();
        var.put_attribute("location", "edge").unwrap();
        var.put_values(&values, ..).unwrap();
    }

    {
        let values = vec![1.0; TIMES_PER_FILE * nodes];
        let mut var = file
            .add_variable::<Float>("height_at_nodes", &["time", "nMesh2d_node"])
            .unwrap();
        var.put_attribute("units", "m").unwrap();
        var.put_attribute("mesh", "Mesh2d").unwrap();
        var.put_attribute("location", "node").unwrap();
        var.put_values(&values, ..).unwrap();
    }

    {
        let mut var = file
            .add_variable::<Float>("orography", &["nMesh2d_face"])
            .unwrap();
        var.put_attribute("units", "m").unwrap();
        var.put_attribute("mesh", "Mesh2d").unwrap();
        var.put_attribute("location", "face").unwrap();
        var.put_values(&vec![0.0; faces], ..).unwrap();
    }
}

/// Creates `<root>/inp/<run>/run_C4/lfric_diag.nc` for two runs.
fn prepare_runs(root: &Path) {
    for run in 0..2 {
        let dir = root.join("inp").join(run.to_string()).join("run_C4");
        fs::create_dir_all(&dir).unwrap();
        write_diag(&dir.join("lfric_diag.nc"), run);
    }

    // not a run directory
    fs::create_dir_all(root.join("inp").join("logs").join("run_C4")).unwrap();
}

fn small_config(fields: &[&str]) -> Config {
    let mut config = Config::default();
    config.target_grid.nlat = 4;
    config.target_grid.nlon = 4;
    config.fields = fields.iter().map(|s| s.to_string()).collect();
    config
}

fn regrid_args(root: &Path) -> RegridArgs {
    RegridArgs {
        model: ModelKind::Lfric,
        inpdir: root.join("inp"),
        outdir: root.join("out"),
        label: "hs".to_string(),
        planet: "earth".to_string(),
        cnum: "C4".to_string(),
        ref_field: None,
        level_height: "uniform".to_string(),
    }
}

#[test]
fn temperature_joined_and_regridded() {
    let dir = tempfile::tempdir().unwrap();
    prepare_runs(dir.path());

    let config = small_config(&["temperature"]);
    let mut args = regrid_args(dir.path());
    args.ref_field = Some("temperature".to_string());

    regrid(&args, &config).unwrap();

    let out_path = dir.path().join("out").join("hs_inst_days1_6.nc");
    let fields = archive::read(&out_path).unwrap();
    assert_eq!(fields.len(), 1);

    let temperature = &fields[0];
    assert_eq!(temperature.var_name, "temperature");
    assert_eq!(temperature.shape(), &[6, 4, 4]);

    let time = temperature.coord("time").unwrap();
    assert!(time.is_increasing());
    assert_eq!(time.len(), 6);

    for t in 0..6 {
        for i in 0..4 {
            for j in 0..4 {
                assert!(approx_eq!(
                    Float,
                    temperature.data()[[t, i, j]],
                    250.0 + t as Float,
                    epsilon = 1e-9
                ));
            }
        }
    }

    assert_eq!(
        temperature.attributes.get("online_operation"),
        Some(&Attribute::from("instant"))
    );
    assert_eq!(temperature.attributes.get("source"), Some(&Attribute::from("lfric")));
    assert_eq!(temperature.attributes.get("processed"), Some(&Attribute::from("True")));
    assert!(temperature.attributes.get("timeStamp").is_none());
    assert!(temperature.attributes.get("uuid").is_none());
}

#[test]
fn levels_and_edges() {
    let dir = tempfile::tempdir().unwrap();
    prepare_runs(dir.path());

    let const_dir = dir.path().join("const");
    fs::create_dir_all(&const_dir).unwrap();
    fs::write(
        const_dir.join("earth.json"),
        r#"{"gravity": {"value": 9.80665, "units": "m s-2"}}"#,
    )
    .unwrap();

    let mut config = small_config(&["air_potential_temperature", "u_in_w2h", "orography"]);
    config.const_dir = Some(const_dir);
    config.failure_policy = FailurePolicy::Skip;

    regrid(&regrid_args(dir.path()), &config).unwrap();

    let out_path = dir.path().join("out").join("hs_inst_days1_6.nc");
    let fields = archive::read(&out_path).unwrap();
    // orography has no time and is not loaded
    assert_eq!(fields.len(), 2);

    let theta = fields.iter().find(|f| f.var_name == "air_potential_temperature").unwrap();
    assert_eq!(theta.shape(), &[6, 3, 4, 4]);

    let height = theta.coord("level_height").unwrap();
    assert!(approx_eq!(Float, height.points()[1], 16_000.0));
    assert!(approx_eq!(Float, theta.data()[[2, 1, 3, 0]], 310.0, epsilon = 1e-9));

    let wind = fields.iter().find(|f| f.var_name == "u_in_w2h").unwrap();
    assert_eq!(wind.shape(), &[6, 4, 4]);
    assert_eq!(wind.units, "m s-1");
    assert!(wind.data().iter().all(|&u| approx_eq!(Float, u, 5.0, epsilon = 1e-9)));

    assert_eq!(wind.attributes.get("planet_gravity"), Some(&Attribute::Float(9.80665)));
}

#[test]
fn missing_reference_aborts() {
    let dir = tempfile::tempdir().unwrap();
    prepare_runs(dir.path());

    let config = small_config(&["temperature"]);
    let mut args = regrid_args(dir.path());
    args.ref_field = Some("exner".to_string());

    assert!(regrid(&args, &config).is_err());
    assert!(!dir.path().join("out").join("hs_inst_days1_6.nc").exists());
}

#[test]
fn no_input_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("inp")).unwrap();

    let result = regrid(&regrid_args(dir.path()), &small_config(&["temperature"]));
    assert!(matches!(result, Err(PipelineError::NoInputFiles(_))));
}

#[test]
fn processed_file_averaged_and_interpolated() {
    let dir = tempfile::tempdir().unwrap();
    prepare_runs(dir.path());

    let config = small_config(&["air_potential_temperature", "temperature"]);
    regrid(&regrid_args(dir.path()), &config).unwrap();

    let proc_dir = dir.path().join("out");

    time_mean::run(&TimeMeanArgs {
        model: ModelKind::Lfric,
        inpdir: proc_dir.clone(),
        outdir: dir.path().join("final"),
        label: "hs".to_string(),
        days: Some(2.0),
    })
    .unwrap();

    let fields = archive::read(&dir.path().join("final").join("hs_inst_time_mean.nc")).unwrap();
    let temperature = fields.iter().find(|f| f.var_name == "temperature").unwrap();

    assert_eq!(temperature.shape(), &[4, 4]);
    assert!(approx_eq!(Float, temperature.data()[[0, 0]], 254.5, epsilon = 1e-9));
    assert_eq!(
        temperature.attributes.get("title"),
        Some(&Attribute::from("Model Output from LFRic"))
    );

    // no pressure in the processed file
    let result = sigma_p::run(
        &SigmaPArgs {
            model: ModelKind::Lfric,
            inpdir: proc_dir,
            outdir: None,
        },
        &config,
    );
    assert!(result.is_err());
}

#[test]
fn node_field_skipped_or_aborting() {
    let dir = tempfile::tempdir().unwrap();
    prepare_runs(dir.path());

    let mut args = regrid_args(dir.path());
    args.ref_field = Some("temperature".to_string());
    let out_path = dir.path().join("out").join("hs_inst_days1_6.nc");

    let mut config = small_config(&["temperature", "height_at_nodes"]);
    let result = regrid(&args, &config);
    assert!(matches!(
        result,
        Err(PipelineError::Regrid(RegridError::UnsupportedLocation { .. }))
    ));
    assert!(!out_path.exists());

    config.failure_policy = FailurePolicy::Skip;
    regrid(&args, &config).unwrap();

    let fields = archive::read(&out_path).unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].var_name, "temperature");
}

/// Writes one UM-like file on a regular grid of 3 latitudes and 4 longitudes.
fn write_um(path: &Path) {
    let mut file = netcdf::create(path).unwrap();
    file.add_dimension("time", 2).unwrap();
    file.add_dimension("latitude", 3).unwrap();
    file.add_dimension("longitude", 4).unwrap();

    for (name, std_name, units, values) in [
        ("time", "time", "days since 2000-01-01 00:00:00", vec![1.0, 2.0]),
        ("latitude", "latitude", "degrees_north", vec![-60.0, 0.0, 60.0]),
        ("longitude", "longitude", "degrees_east", vec![0.0, 90.0, 180.0, 270.0]),
    ] {
        let mut var = file.add_variable::<Float>(name, &[name]).unwrap();
        var.put_attribute("standard_name", std_name).unwrap();
        var.put_attribute("units", units).unwrap();
        var.put_values(&values, ..).unwrap();
    }

    for (name, value) in [("air_potential_temperature", 300.0), ("air_temperature", 250.0)] {
        let values: Vec<Float> = (0..2 * 3 * 4).map(|k| value + (k / 12) as Float).collect();

        let mut var = file
            .add_variable::<Float>(name, &["time", "latitude", "longitude"])
            .unwrap();
        var.put_attribute("standard_name", name).unwrap();
        var.put_attribute("units", "K").unwrap();
        var.put_values(&values, ..).unwrap();
    }
}

#[test]
fn um_output_interpolated() {
    let dir = tempfile::tempdir().unwrap();
    let inpdir = dir.path().join("um");
    fs::create_dir_all(&inpdir).unwrap();
    write_um(&inpdir.join("atmosa_pa000.nc"));

    let mut args = regrid_args(dir.path());
    args.model = ModelKind::Um;
    args.inpdir = inpdir;

    regrid(&args, &small_config(&["air_temperature"])).unwrap();

    let fields = archive::read(&dir.path().join("out").join("hs_inst_days1_2.nc")).unwrap();
    assert_eq!(fields.len(), 1);

    let temperature = &fields[0];
    assert_eq!(temperature.shape(), &[2, 4, 4]);
    assert_eq!(temperature.coord("longitude").unwrap().points()[0], -135.0);

    for t in 0..2 {
        for i in 0..4 {
            for j in 0..4 {
                assert!(approx_eq!(
                    Float,
                    temperature.data()[[t, i, j]],
                    250.0 + t as Float,
                    epsilon = 1e-9
                ));
            }
        }
    }
}

fn on_levels(name: &str, units: &str, values: fn(usize) -> Float) -> Field {
    let data = Array::from_shape_fn(IxDyn(&[3, 2, 2]), |ix| values(ix[0]));
    let mut field =
        Field::new(name, units, data).with_dim_names(&["level_height", "latitude", "longitude"]);

    field
        .add_coord(Coord::dim("level_height", "m", array![0.0, 5000.0, 10000.0], 0))
        .unwrap();
    field
        .add_coord(Coord::dim("latitude", "degrees_north", array![-45.0, 45.0], 1))
        .unwrap();
    field
        .add_coord(Coord::dim("longitude", "degrees_east", array![0.0, 180.0], 2))
        .unwrap();
    field
}

#[test]
fn sigma_p_derives_density() {
    let dir = tempfile::tempdir().unwrap();

    let const_dir = dir.path().join("const");
    fs::create_dir_all(&const_dir).unwrap();
    fs::write(
        const_dir.join("earth.json"),
        r#"{"dry_air_gas_constant": {"value": 287.05, "units": "J kg-1 K-1"}}"#,
    )
    .unwrap();

    let proc_dir = dir.path().join("proc");
    fs::create_dir_all(&proc_dir).unwrap();

    let fields = Collection::new(vec![
        on_levels("pressure_in_wth", "Pa", |l| 100_000.0 * (-0.5 * l as Float).exp()),
        on_levels("temperature", "K", |l| 300.0 - 10.0 * l as Float),
    ]);
    let globals: BTreeMap<String, Attribute> =
        [("planet".to_string(), Attribute::from("earth"))].into_iter().collect();
    archive::save(&fields, &proc_dir.join("hs_inst_days1_6.nc"), &globals).unwrap();

    let mut config = Config::default();
    config.const_dir = Some(const_dir);

    sigma_p::run(
        &SigmaPArgs {
            model: ModelKind::Lfric,
            inpdir: proc_dir.clone(),
            outdir: None,
        },
        &config,
    )
    .unwrap();

    let fields = archive::read(&proc_dir.join("hs_inst_days1_6_sigma_p.nc")).unwrap();
    assert_eq!(fields.len(), 3);

    let density = fields.iter().find(|f| f.var_name == "density").unwrap();
    assert_eq!(density.shape(), &[34, 2, 2]);
    assert_eq!(density.units, "kg m-3");
    assert!(density.coord("sigma_p").unwrap().is_dim());
    assert!(approx_eq!(
        Float,
        density.data()[[0, 1, 0]],
        100_000.0 / (287.05 * 300.0),
        epsilon = 1e-9
    ));
}
