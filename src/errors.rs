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

use crate::Float;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Error while reading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while reading or writing archive: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Field operation failed: {0}")]
    Field(#[from] FieldError),

    #[error("Cannot concatenate fields: {0}")]
    Concatenate(#[from] ConcatenateError),

    #[error("Cannot synthesize level heights: {0}")]
    Levels(#[from] LevelsError),

    #[error("Horizontal regridding failed: {0}")]
    Regrid(#[from] RegridError),

    #[error("Vertical re-levelling failed: {0}")]
    Relevel(#[from] RelevelError),

    #[error("Filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No input files found in {0}")]
    NoInputFiles(PathBuf),

    #[error("Input files do not contain any usable field")]
    EmptyInput,

    #[error("Cannot set the memory limit of {0} MB")]
    MemoryLimit(usize),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open configuration file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize configuration file: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds {0}")]
    OutOfBounds(&'static str),

    #[error("Level height type {0} is not valid, use 'uniform' or 'um_<levels set>'")]
    InvalidLevelHeight(String),

    #[error("Experiment {0} is not known, provide the averaging period explicitly")]
    UnknownExperiment(String),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("NetCDF library error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Variable {0} not found in the file")]
    MissingVariable(String),

    #[error("Mesh definition is incorrect: {0}")]
    InvalidMesh(String),

    #[error("Field {0} lives on a mesh and cannot be written as a gridded variable")]
    MeshOutput(String),

    #[error("Variable data does not match its dimensions: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Cannot construct field: {0}")]
    Field(#[from] FieldError),
}

#[derive(Error, Debug)]
pub enum FieldError {
    #[error("Coordinate {coord} has {found} points but axis {axis} has length {expected}")]
    CoordShape {
        coord: String,
        axis: usize,
        expected: usize,
        found: usize,
    },

    #[error("Axis {axis} is out of range for a field with {ndim} dimensions")]
    AxisOutOfRange { axis: usize, ndim: usize },

    #[error("Axis {0} already has a dimension coordinate")]
    DuplicateDimCoord(usize),

    #[error("Coordinate {0} already exists")]
    DuplicateCoord(String),

    #[error("Coordinate {0} not found")]
    MissingCoord(String),

    #[error("Coordinate {0} is not strictly monotonic")]
    NonMonotonic(String),

    #[error("Coordinate {0} needs at least two points to guess bounds")]
    CantGuessBounds(String),

    #[error("Bounds of coordinate {0} must have shape (points, 2)")]
    BoundsShape(String),

    #[error("Field {0} not found")]
    FieldNotFound(String),

    #[error("Constraint {name} matches {count} fields, expected exactly one")]
    AmbiguousField { name: String, count: usize },

    #[error("Time units {0} are not supported")]
    UnknownTimeUnits(String),

    #[error("Array shape is incorrect: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Cannot average over an empty selection of {0}")]
    EmptySelection(String),
}

/// Errors raised while joining same-named fields along time.
#[derive(Error, Debug)]
pub enum ConcatenateError {
    #[error("Field {0} has overlapping time values across inputs")]
    Overlap(String),

    #[error("Field {0} has non-monotonic time values")]
    NonMonotonic(String),

    #[error("Fields named {name} differ in {reason}")]
    Mismatch { name: String, reason: String },

    #[error("Cannot assemble field: {0}")]
    Field(#[from] FieldError),
}

#[derive(Error, Debug)]
pub enum LevelsError {
    #[error("Cannot open level definition file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot parse level definition file: {0}")]
    Parse(String),

    #[error("Level definition file lacks {0}")]
    MissingKey(&'static str),

    #[error("Coordinate {coord} has {expected} levels but the definition provides {found}")]
    CountMismatch {
        coord: String,
        expected: usize,
        found: usize,
    },

    #[error("Cannot attach level heights: {0}")]
    Field(#[from] FieldError),
}

#[derive(Error, Debug)]
pub enum RegridError {
    #[error("Field {field} lacks the {coord} coordinate")]
    MissingCoord { field: String, coord: &'static str },

    #[error("Field {field} is located on {location} which cannot be regridded")]
    UnsupportedLocation { field: String, location: String },

    #[error("Field {0} does not carry a mesh definition")]
    MissingMesh(String),

    #[error("Reference field {0} must be located on mesh cells")]
    ReferenceLocation(String),

    #[error("Field {field} has {found} horizontal points but the regridder expects {expected}")]
    MeshMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("Source point cloud is empty")]
    EmptySource,

    #[error("Cannot triangulate source points: {0}")]
    Triangulation(#[from] spade::InsertionError),

    #[error("Cannot locate target cell on the source grid: {0}")]
    Search(#[from] SearchError),

    #[error("Cannot merge slices of {field}: {reason}")]
    SliceMerge { field: String, reason: String },

    #[error("Cannot assemble regridded field: {0}")]
    Field(#[from] FieldError),

    #[error("Array shape is incorrect: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Error, Debug)]
pub enum RelevelError {
    #[error("Target grid has no level heights to interpolate {0} onto")]
    MissingTargetLevels(String),

    #[error("Field {0} has model levels but no level_height coordinate")]
    MissingLevelHeight(String),

    #[error("Fields {0} and {1} do not share the same shape")]
    ShapeMismatch(String, String),

    #[error("Interpolation failed: {0}")]
    Interpolation(#[from] InterpolationError),

    #[error("Cannot assemble re-levelled field: {0}")]
    Field(#[from] FieldError),
}

#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Value {0} is outside the source range and extrapolation is disabled")]
    OutOfRange(Float),

    #[error("Search for bracketing points failed: {0}")]
    Search(#[from] SearchError),

    #[error("Sample points and values differ in length ({0} and {1})")]
    LengthMismatch(usize, usize),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Searched array is empty")]
    EmptyArray,

    #[error("Searched array needs at least two elements")]
    TooShort,

    #[error("Searched value is out of array bounds")]
    OutOfBounds,
}
