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

//! Reading and writing fields from/to NetCDF files.
//!
//! The reader understands CF conventions (coordinate variables,
//! `coordinates` and `bounds` attributes) and UGRID mesh topologies.
//! The writer emits CF-style files of gridded fields.

mod reader;
mod writer;

pub use reader::read;
pub use writer::save;

use crate::{errors::ArchiveError, field::Collection, field::Field};
use log::debug;
use std::path::{Path, PathBuf};

/// Loads all fields from `paths`, passing each through `callback`.
///
/// The callback can modify the field or return `None`
/// to leave it out of the returned collection.
pub fn load<F, E>(paths: &[PathBuf], mut callback: F) -> Result<Collection, E>
where
    F: FnMut(Field, &Path) -> Result<Option<Field>, E>,
    E: From<ArchiveError>,
{
    let mut collection = Collection::default();

    for path in paths {
        debug!("Loading fields from {}", path.display());

        for field in read(path)? {
            if let Some(field) = callback(field, path)? {
                collection.push(field);
            }
        }
    }

    Ok(collection)
}
