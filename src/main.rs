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

//! Climate Model Post-Processor (climpp) prepares output of the LFRic
//! and UM climate models for analysis and comparison.
//!
//! LFRic writes its diagnostics on an unstructured cubed-sphere mesh,
//! split into many files and without physical heights of model levels.
//! climpp joins those files, synthesizes level heights, regrids all fields
//! onto a common latitude-longitude grid and re-levels them onto common
//! heights, so that they can be compared with the UM directly.

mod archive;
mod cli;
mod constants;
mod errors;
mod field;
mod pipeline;

use cap::Cap;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::{alloc, process::ExitCode};

type Float = f64;

/// Global allocator used by the post-processor.
///
/// Use of static global allocator allows for capping the memory to the limit set by user
/// in configuration file and in effect provide better [OOM error](https://en.wikipedia.org/wiki/Out_of_memory) handling.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`pipeline::main`].
///
/// To provide meaningful and high-quality error messages the `env_logger`
/// needs to be initiated before any log messages are possible to occur.
fn main() -> ExitCode {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("CLIMPP_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("CLIMPP_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    let args = cli::Cli::parse();

    match pipeline::main(args) {
        Ok(_) => {
            info!("Processing finished. Check the output directory and log.");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Processing failed with error: {}", err);
            ExitCode::FAILURE
        }
    }
}
