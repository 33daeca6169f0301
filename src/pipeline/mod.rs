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

//! Module containing the post-processing pipelines.
//!
//! The main pipeline turns raw LFRic diagnostics, stored on a cubed-sphere
//! mesh and split across many run directories, into a single file
//! on a regular latitude-longitude grid:
//!
//! 1. Input files are discovered and every field is loaded with its
//! time coordinate fixed and level heights attached.
//! 2. Fields of the same variable are concatenated along time.
//! 3. Selected fields are regridded horizontally (conservatively for
//! cell data, by triangulation for edge data) and re-levelled onto
//! the heights of the reference field.
//! 4. Planet constants are attached and the result is written to NetCDF.
//!
//! Processed files can be further averaged in time ([`time_mean`])
//! or interpolated onto sigma-p surfaces ([`sigma_p`]).

mod bisection;
mod configuration;
mod fixes;
mod grid;
mod interpolation;
mod levels;
mod orchestrator;
mod planet;
mod regrid;
mod relevel;
mod sigma_p;
mod tables;
mod time_mean;
mod vertlevs;

#[cfg(test)]
mod super_tests;

pub use configuration::Config;
pub use tables::ModelKind;

use crate::{
    archive,
    cli::{Cli, Command, RegridArgs},
    constants::TIME,
    errors::PipelineError,
    field::{Attribute, Collection},
    ALLOCATOR,
};
use fixes::{clean_attrs, fix_time_coord, time_in_days};
use levels::{add_level_height, LevelHeightStrategy};
use log::{debug, error, info};
use orchestrator::Core;
use planet::PlanetConstants;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Main program function, dispatching the chosen subcommand.
pub fn main(args: Cli) -> Result<(), PipelineError> {
    let config = match &args.config {
        Some(path) => {
            debug!("Reading configuration from {}", path.display());
            Config::new_from_file(path)?
        }
        None => Config::default(),
    };

    debug!("Setting memory limit");
    let limit = config.resources.memory;
    ALLOCATOR
        .set_limit(limit.saturating_mul(1024 * 1024))
        .map_err(|_| PipelineError::MemoryLimit(limit))?;

    match &args.command {
        Command::Regrid(regrid_args) => regrid(regrid_args, &config),
        Command::TimeMean(time_mean_args) => time_mean::run(time_mean_args),
        Command::SigmaP(sigma_p_args) => sigma_p::run(sigma_p_args, &config),
    }
}

/// Regrids raw model output of one simulation into a single file.
pub fn regrid(args: &RegridArgs, config: &Config) -> Result<(), PipelineError> {
    let spec = args.model.spec();
    info!("Processing {} output of {} ({})", spec.title, args.label, args.planet);

    let strategy = LevelHeightStrategy::from_label(&args.level_height, &config.levels)?;

    let paths = input_files(&args.inpdir, &args.cnum, args.model)?;
    let (first, last) = match (paths.first(), paths.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            error!("No files found!");
            return Err(PipelineError::NoInputFiles(args.inpdir.clone()));
        }
    };
    info!("Found {} files: {} ... {}", paths.len(), first.display(), last.display());

    fs::create_dir_all(&args.outdir)?;

    let loaded = archive::load(&paths, |field, path| {
        let field = match fix_time_coord(field, path)? {
            Some(field) => field,
            None => return Ok(None),
        };

        let mut field = add_level_height(field, &strategy)?;
        clean_attrs(&mut field);

        Ok::<_, PipelineError>(Some(field))
    })?
    .concatenate()?;

    if loaded.is_empty() {
        error!("Files are empty!");
        return Err(PipelineError::EmptyInput);
    }

    let ref_field = args.ref_field.as_deref().unwrap_or(spec.ref_field);
    let reference = loaded.extract_field(ref_field)?.clone();
    let selected = select_fields(&loaded, config, spec.w);
    drop(loaded);

    let core = Core::new(config);
    let mut processed = core.regrid(selected, &reference)?;

    if processed.is_empty() {
        error!("No field could be processed");
        return Err(PipelineError::EmptyInput);
    }

    if let Some(const_dir) = &config.const_dir {
        PlanetConstants::from_dir(const_dir, &args.planet)?.attach(&mut processed);
    }

    let out_path = args.outdir.join(output_name(&processed, &args.label)?);

    let globals: BTreeMap<String, Attribute> = [
        ("name", args.label.as_str()),
        ("planet", args.planet.as_str()),
        ("processed", "True"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), Attribute::from(*v)))
    .collect();

    archive::save(&processed, &out_path, &globals)?;
    info!("Saved to {}", out_path.display());

    Ok(())
}

/// Raw output files of the model, in the order of runs.
///
/// LFRic runs are stored as `<inpdir>/<N>/*<cnum>*/lfric_diag.nc`
/// and sorted by the run number `N`, UM output is every `*.nc` in `inpdir`.
pub fn input_files(inpdir: &Path, cnum: &str, model: ModelKind) -> Result<Vec<PathBuf>, PipelineError> {
    let mut runs: Vec<(u64, PathBuf)> = vec![];

    match model {
        ModelKind::Lfric => {
            for run_dir in fs::read_dir(inpdir)? {
                let run_dir = run_dir?.path();

                let run = match run_dir.file_name().and_then(|n| n.to_str()).map(str::parse::<u64>) {
                    Some(Ok(run)) if run_dir.is_dir() => run,
                    _ => continue,
                };

                for mesh_dir in fs::read_dir(&run_dir)? {
                    let mesh_dir = mesh_dir?.path();
                    let matches = mesh_dir
                        .file_name()
                        .and_then(|n| n.to_str())
                        .map_or(false, |n| n.contains(cnum));

                    let path = mesh_dir.join("lfric_diag.nc");
                    if matches && path.is_file() {
                        runs.push((run, path));
                    }
                }
            }
        }
        ModelKind::Um => {
            for entry in fs::read_dir(inpdir)? {
                let path = entry?.path();
                if path.is_file() && path.extension().map_or(false, |e| e == "nc") {
                    runs.push((0, path));
                }
            }
        }
    }

    runs.sort();
    Ok(runs.into_iter().map(|(_, path)| path).collect())
}

/// Picks configured fields, dropping duplicates
/// and normalising the units of wind components.
fn select_fields(fields: &Collection, config: &Config, w_name: &str) -> Collection {
    let names: Vec<&str> = config.fields.iter().map(String::as_str).collect();
    let mut selected = fields.extract(&names).unique();

    let w_indices: Vec<usize> = selected
        .iter()
        .enumerate()
        .filter(|(_, f)| f.matches(w_name))
        .map(|(i, _)| i)
        .collect();

    if let [_, second] = w_indices.as_slice() {
        debug!("Dropping the second {} field", w_name);
        selected.remove(*second);
    }

    for field in selected.iter_mut() {
        if field.units == "ms-1" {
            field.units = "m s-1".to_string();
        }
    }

    selected
}

/// `<label>_inst_days<first>[_<last>].nc` from the time of the first field.
fn output_name(fields: &Collection, label: &str) -> Result<String, PipelineError> {
    let mut day_str = String::from("days");

    if let Some(time) = fields.iter().next().and_then(|f| f.find_coord(TIME)) {
        let days: Vec<i64> = time_in_days(time)?.iter().map(|&d| d as i64).collect();

        if let (Some(first), Some(last)) = (days.first(), days.last()) {
            day_str.push_str(&first.to_string());
            if days.len() > 1 {
                day_str.push_str(&format!("_{}", last));
            }
        }
    }

    Ok(format!("{}_inst_{}.nc", label, day_str))
}
