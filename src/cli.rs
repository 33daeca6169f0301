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

//! Command line interface.

use crate::pipeline::ModelKind;
use crate::Float;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Post-processing of LFRic and UM climate model output.
#[derive(Parser, Debug)]
#[command(name = "climpp", version, about)]
pub struct Cli {
    /// Optional YAML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Regrid raw model output onto a regular grid and model-independent heights.
    Regrid(RegridArgs),

    /// Average processed files over the final days of the simulation.
    TimeMean(TimeMeanArgs),

    /// Interpolate a processed file onto sigma-p surfaces.
    SigmaP(SigmaPArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RegridArgs {
    #[arg(short, long, value_enum, default_value_t = ModelKind::Lfric)]
    pub model: ModelKind,

    /// Input directory
    #[arg(short, long)]
    pub inpdir: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub outdir: PathBuf,

    /// Simulation label
    #[arg(short, long)]
    pub label: String,

    /// Planet configuration
    #[arg(short, long)]
    pub planet: String,

    /// Cubed sphere mesh number
    #[arg(short, long, default_value = "C48")]
    pub cnum: String,

    /// Field to which coordinates all data will be regridded
    #[arg(long)]
    pub ref_field: Option<String>,

    /// Type of the vertical level height coordinate: `uniform` or `um_<levels set>`
    #[arg(long, default_value = "uniform")]
    pub level_height: String,
}

#[derive(Args, Clone, Debug)]
pub struct TimeMeanArgs {
    #[arg(short, long, value_enum, default_value_t = ModelKind::Lfric)]
    pub model: ModelKind,

    /// Directory with processed files
    #[arg(short, long)]
    pub inpdir: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub outdir: PathBuf,

    /// Simulation label
    #[arg(short, long)]
    pub label: String,

    /// Number of final days to average, by default taken from the experiment
    #[arg(short, long)]
    pub days: Option<Float>,
}

#[derive(Args, Clone, Debug)]
pub struct SigmaPArgs {
    #[arg(short, long, value_enum)]
    pub model: ModelKind,

    /// Input directory
    #[arg(short, long)]
    pub inpdir: PathBuf,

    /// Output directory, defaults to the input directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,
}
