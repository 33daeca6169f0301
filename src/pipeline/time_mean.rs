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

//! Averaging of processed fields over the final days of a simulation.

use super::{
    fixes::time_in_days,
    tables::{Experiment, ModelKind, PUBLISHED_ATTRIBUTES},
};
use crate::{
    archive,
    cli::TimeMeanArgs,
    constants::TIME,
    errors::{ConfigError, PipelineError},
    field::{Attribute, Collection, Field},
    Float,
};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Averages every processed field of a simulation over its last days
/// and writes them to `<label>_<suffix>_time_mean.nc`.
pub fn run(args: &TimeMeanArgs) -> Result<(), PipelineError> {
    let spec = args.model.spec();

    let days = match args.days {
        Some(days) => days,
        None => Experiment::from_label(&args.label)
            .map(Experiment::time_mean_period)
            .ok_or_else(|| ConfigError::UnknownExperiment(args.label.clone()))?,
    };
    info!("Averaging {} over the last {} days", args.label, days);

    let paths = processed_files(&args.inpdir, &args.label, args.model)?;
    if paths.is_empty() {
        error!("No files found!");
        return Err(PipelineError::NoInputFiles(args.inpdir.clone()));
    }
    debug!("Found {} processed files", paths.len());

    let fields = archive::load(&paths, |field, _| Ok::<_, PipelineError>(Some(field)))?.concatenate()?;
    if fields.is_empty() {
        error!("Files are empty!");
        return Err(PipelineError::EmptyInput);
    }

    let averaged = fields
        .iter()
        .map(|f| last_n_day_mean(f, days))
        .collect::<Result<Collection, PipelineError>>()?;

    let mut globals: BTreeMap<String, Attribute> = PUBLISHED_ATTRIBUTES
        .iter()
        .map(|(k, v)| (k.to_string(), Attribute::from(*v)))
        .collect();
    globals.insert(
        "title".to_string(),
        format!("Model Output from {}", spec.title).into(),
    );
    globals.insert(
        "date_created".to_string(),
        format!("{} GMT", Utc::now().format("%Y-%m-%d %H:%M:%S")).into(),
    );

    fs::create_dir_all(&args.outdir)?;
    let out_path = args
        .outdir
        .join(format!("{}_{}_time_mean.nc", args.label, spec.proc_suffix));

    archive::save(&averaged, &out_path, &globals)?;
    info!("Saved to {}", out_path.display());

    Ok(())
}

/// Processed files of the simulation `label`, sorted by name.
pub fn processed_files(inpdir: &Path, label: &str, model: ModelKind) -> Result<Vec<PathBuf>, PipelineError> {
    let suffix = model.spec().proc_suffix;
    let mut paths = vec![];

    for entry in fs::read_dir(inpdir)? {
        let path = entry?.path();

        if path.extension().map_or(true, |e| e != "nc") {
            continue;
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem.starts_with(label) && stem.contains(suffix) && !stem.ends_with("time_mean") {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Mean of `field` over the times later than `days` before its last time.
/// Fields without a time axis are returned unchanged.
pub fn last_n_day_mean(field: &Field, days: Float) -> Result<Field, PipelineError> {
    let time = match field.find_coord(TIME).filter(|c| c.is_dim()) {
        Some(time) => time,
        None => {
            warn!("{} has no time axis, leaving it as it is", field.name());
            return Ok(field.clone());
        }
    };

    // dim coordinates always have an axis
    let axis = time.axis.unwrap_or_default();
    let time_days = time_in_days(time)?;

    let last = time_days.iter().copied().fold(Float::NEG_INFINITY, Float::max);
    let selected: Vec<usize> = time_days
        .iter()
        .enumerate()
        .filter(|(_, &t)| t > last - days)
        .map(|(i, _)| i)
        .collect();

    debug!(
        "Averaging {} over {} of {} time points",
        field.name(),
        selected.len(),
        time_days.len()
    );

    Ok(field.select_along(axis, &selected).collapse_mean(axis)?)
}
