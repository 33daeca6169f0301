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

//! Re-levelling of processed fields onto surfaces of constant
//! sigma-p, the ratio of pressure to its surface value.

use super::{
    configuration::Config,
    interpolation::ExtrapolationPolicy,
    planet::{PlanetConstants, DRY_AIR_GAS_CONSTANT},
    relevel::interpolate_columns,
    tables::ModelSpec,
};
use crate::{
    archive,
    cli::SigmaPArgs,
    constants::{SIGMA_LEVELS_COUNT, SIGMA_LEVELS_TOP},
    errors::{FieldError, PipelineError, RelevelError},
    field::{Attribute, Collection, Coord, Field},
    Float,
};
use log::{debug, error, info, warn};
use ndarray::{Array1, ArrayD, Axis};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Name of the sigma-p coordinate and dimension.
const SIGMA_P: &str = "sigma_p";

pub fn run(args: &SigmaPArgs, config: &Config) -> Result<(), PipelineError> {
    let spec = args.model.spec();
    let outdir = args.outdir.as_ref().unwrap_or(&args.inpdir);
    fs::create_dir_all(outdir)?;

    let path = match input_file(&args.inpdir)? {
        Some(path) => path,
        None => {
            error!("No file found");
            return Err(PipelineError::NoInputFiles(args.inpdir.clone()));
        }
    };
    info!("Interpolating {} to sigma-p levels", path.display());

    let mut fields = Collection::new(archive::read(&path)?);
    if fields.is_empty() {
        error!("The file is empty");
        return Err(PipelineError::EmptyInput);
    }

    match gas_constant(&fields, config.const_dir.as_deref())? {
        Some(gas_constant) => add_density(&mut fields, spec, gas_constant)?,
        None => warn!("Gas constant of the planet is not known, density is not derived"),
    }

    let relevelled = to_sigma_p(&fields, spec)?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let out_path = outdir.join(format!("{}_{}.nc", stem, SIGMA_P));

    archive::save(&relevelled, &out_path, &BTreeMap::new())?;
    info!("Saved to {}", out_path.display());

    Ok(())
}

/// First `*.nc` file in `inpdir` that is not a sigma-p or conservation output.
pub fn input_file(inpdir: &Path) -> Result<Option<PathBuf>, PipelineError> {
    let mut paths = vec![];

    for entry in fs::read_dir(inpdir)? {
        let path = entry?.path();

        if path.extension().map_or(true, |e| e != "nc") {
            continue;
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if !stem.contains("_sigma_p") && !stem.contains("conservation") {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths.into_iter().next())
}

/// Gas constant attached to the fields while regridding, or read
/// from constants of the planet named in the file.
fn gas_constant(fields: &Collection, const_dir: Option<&Path>) -> Result<Option<Float>, PipelineError> {
    let attributes = match fields.iter().next() {
        Some(field) => &field.attributes,
        None => return Ok(None),
    };

    let attached = attributes
        .get(&format!("planet_{}", DRY_AIR_GAS_CONSTANT))
        .and_then(Attribute::as_float);
    if attached.is_some() {
        return Ok(attached);
    }

    match (const_dir, attributes.get("planet").and_then(Attribute::as_text)) {
        (Some(dir), Some(planet)) => Ok(PlanetConstants::from_dir(dir, planet)?.get(DRY_AIR_GAS_CONSTANT)),
        _ => Ok(None),
    }
}

/// Adds air density from the ideal gas law, `p / (R T)`,
/// unless the collection already has it.
pub fn add_density(fields: &mut Collection, spec: &ModelSpec, gas_constant: Float) -> Result<(), PipelineError> {
    if !fields.extract(&[spec.dens]).is_empty() {
        return Ok(());
    }

    let (pressure, temperature) = match (fields.extract_field(spec.pres), fields.extract_field(spec.temp)) {
        (Ok(pressure), Ok(temperature)) => (pressure, temperature),
        _ => {
            warn!("Density needs {} and {}, it is not derived", spec.pres, spec.temp);
            return Ok(());
        }
    };

    if pressure.shape() != temperature.shape() {
        return Err(RelevelError::ShapeMismatch(
            pressure.name().to_string(),
            temperature.name().to_string(),
        )
        .into());
    }

    debug!("Deriving {} with R = {}", spec.dens, gas_constant);
    let data = &pressure.data() / &temperature.data().mapv(|t| gas_constant * t);

    let mut density = pressure.derived(data, pressure.dim_names().to_vec());
    density.var_name = spec.dens.to_string();
    density.standard_name = None;
    density.long_name = None;
    density.units = "kg m-3".to_string();

    for coord in pressure.coords() {
        density.add_coord(coord.clone())?;
    }

    fields.push(density);
    Ok(())
}

/// Sigma-p levels from the surface upwards.
pub fn sigma_levels() -> Array1<Float> {
    Array1::linspace(1.0, SIGMA_LEVELS_TOP, SIGMA_LEVELS_COUNT)
}

/// Re-levels temperature, winds, pressure and density onto sigma-p levels.
pub fn to_sigma_p(fields: &Collection, spec: &ModelSpec) -> Result<Collection, PipelineError> {
    let pressure = fields.extract_field(spec.pres)?;
    let axis = pressure
        .coord_axis(spec.z)
        .ok_or_else(|| FieldError::MissingCoord(spec.z.to_string()))?;

    let sigma = sigma_p(pressure, spec.z, axis)?;
    let targets = sigma_levels();

    let mut relevelled = Collection::default();

    for field in fields
        .extract(&[spec.temp, spec.u, spec.v, spec.w, spec.pres, spec.dens])
        .iter()
    {
        if field.shape() != pressure.shape() || field.coord_axis(spec.z) != Some(axis) {
            warn!("{} is not on the pressure levels, skipping it", field.name());
            continue;
        }

        debug!("Interpolating {} to sigma-p", field.name());
        relevelled.push(relevel_field(field, &sigma, axis, &targets)?);
    }

    Ok(relevelled)
}

/// Pressure divided by the pressure at zero height,
/// or at the lowest level when no level lies at the surface.
fn sigma_p(pressure: &Field, z: &str, axis: usize) -> Result<ArrayD<Float>, PipelineError> {
    let heights = pressure.coord(z)?.points();

    let surface = heights
        .iter()
        .position(|&h| h == 0.0)
        .or_else(|| {
            heights
                .iter()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
        })
        .ok_or_else(|| FieldError::EmptySelection(z.to_string()))?;

    let data = pressure.data();
    let surface_pressure = data.index_axis(Axis(axis), surface).insert_axis(Axis(axis));
    let surface_pressure = surface_pressure.broadcast(data.shape()).ok_or_else(|| {
        RelevelError::ShapeMismatch(SIGMA_P.to_string(), pressure.name().to_string())
    })?;

    Ok(&data / &surface_pressure)
}

fn relevel_field(
    field: &Field,
    sigma: &ArrayD<Float>,
    axis: usize,
    targets: &Array1<Float>,
) -> Result<Field, PipelineError> {
    let targets_vec = targets.to_vec();
    let data = interpolate_columns(
        field.data(),
        sigma.view(),
        axis,
        &targets_vec,
        ExtrapolationPolicy::Linear,
    )?;

    let mut dim_names = field.dim_names().to_vec();
    dim_names[axis] = SIGMA_P.to_string();

    let mut relevelled = field.derived(data, dim_names);

    for coord in field.coords().iter().filter(|c| c.axis != Some(axis)) {
        relevelled.add_coord(coord.clone())?;
    }
    relevelled.add_coord(Coord::dim(SIGMA_P, "1", targets.clone(), axis))?;

    Ok(relevelled)
}

#[cfg(test)]
mod tests {
    use super::{add_density, gas_constant, input_file, sigma_levels, to_sigma_p};
    use crate::{
        field::{Attribute, Collection, Coord, Field},
        pipeline::tables::ModelKind,
        Float,
    };
    use float_cmp::approx_eq;
    use ndarray::{array, Array, IxDyn};
    use std::fs;

    fn on_levels(name: &str, units: &str, values: impl Fn(usize, usize) -> Float) -> Field {
        let data = Array::from_shape_fn(IxDyn(&[3, 2]), |ix| values(ix[0], ix[1]));
        let mut field = Field::new(name, units, data).with_dim_names(&["level_height", "x"]);

        field
            .add_coord(Coord::dim("level_height", "m", array![0.0, 5000.0, 10000.0], 0))
            .unwrap();
        field
    }

    fn pressure(level: usize, column: usize) -> Float {
        let surface = [100_000.0, 90_000.0][column];
        surface * (-(level as Float) * 0.5).exp()
    }

    #[test]
    fn levels() {
        let levels = sigma_levels();

        assert_eq!(levels.len(), 34);
        assert!(approx_eq!(Float, levels[0], 1.0));
        assert!(approx_eq!(Float, levels[33], 0.01));
    }

    #[test]
    fn temperature_linear_in_sigma() {
        let fields = Collection::new(vec![
            on_levels("pressure_in_wth", "Pa", pressure),
            on_levels("temperature", "K", |l, c| 300.0 * pressure(l, c) / pressure(0, c)),
            on_levels("pmsl", "Pa", |_, _| 1.0),
        ]);

        let result = to_sigma_p(&fields, ModelKind::Lfric.spec()).unwrap();
        assert_eq!(result.len(), 2);

        let temperature = result.extract_field("temperature").unwrap();
        assert_eq!(temperature.shape(), &[34, 2]);
        assert!(temperature.find_coord("level_height").is_none());

        let sigma = temperature.coord("sigma_p").unwrap();
        for (k, &s) in sigma.points().iter().enumerate() {
            for c in 0..2 {
                assert!(approx_eq!(Float, temperature.data()[[k, c]], 300.0 * s, epsilon = 1e-8));
            }
        }

        let pressure = result.extract_field("pressure_in_wth").unwrap();
        assert!(approx_eq!(Float, pressure.data()[[0, 1]], 90_000.0, epsilon = 1e-6));
    }

    #[test]
    fn input_file_skips_outputs() {
        let dir = tempfile::tempdir().unwrap();

        for name in ["b_inst.nc", "a_inst_sigma_p.nc", "a_conservation.nc", "c.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let path = input_file(dir.path()).unwrap().unwrap();
        assert_eq!(path.file_name().unwrap(), "b_inst.nc");
    }

    #[test]
    fn density_from_gas_law() {
        let mut fields = Collection::new(vec![
            on_levels("pressure_in_wth", "Pa", pressure),
            on_levels("temperature", "K", |l, _| 300.0 - 10.0 * l as Float),
        ]);
        let spec = ModelKind::Lfric.spec();

        add_density(&mut fields, spec, 287.05).unwrap();
        assert_eq!(fields.len(), 3);

        let density = fields.extract_field("density").unwrap();
        assert_eq!(density.units, "kg m-3");
        assert!(density.coord("level_height").unwrap().is_dim());
        assert!(approx_eq!(
            Float,
            density.data()[[1, 1]],
            pressure(1, 1) / (287.05 * 290.0),
            epsilon = 1e-12
        ));

        // present density is kept
        add_density(&mut fields, spec, 1.0).unwrap();
        assert_eq!(fields.len(), 3);

        let result = to_sigma_p(&fields, spec).unwrap();
        assert_eq!(result.extract_field("density").unwrap().shape(), &[34, 2]);
    }

    #[test]
    fn gas_constant_from_attributes_or_files() {
        let mut field = on_levels("pressure_in_wth", "Pa", pressure);
        field.attributes.insert("planet".to_string(), "earth".into());
        let fields = Collection::new(vec![field.clone()]);

        assert_eq!(gas_constant(&fields, None).unwrap(), None);

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("earth.json"),
            r#"{"dry_air_gas_constant": {"value": 287.05, "units": "J kg-1 K-1"}}"#,
        )
        .unwrap();
        assert_eq!(gas_constant(&fields, Some(dir.path())).unwrap(), Some(287.05));

        field
            .attributes
            .insert("planet_dry_air_gas_constant".to_string(), Attribute::Float(200.0));
        let fields = Collection::new(vec![field]);
        assert_eq!(gas_constant(&fields, Some(dir.path())).unwrap(), Some(200.0));
    }
}
