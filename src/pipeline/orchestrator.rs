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

//! Regridding and re-levelling of a whole collection of fields.
//!
//! Cell fields go through the conservative regridder built once from
//! the reference field, edge fields through a scattered regridder built
//! once per mesh and fields on rectilinear grids through a bilinear
//! regridder built once per source grid. Every regridded field is then
//! re-levelled onto the reference level heights.

use super::{
    configuration::{Config, FailurePolicy},
    grid::TargetGrid,
    regrid::{BilinearRegridder, ConservativeRegridder, EdgeRegridder, Regridder},
    relevel::relevel,
};
use crate::{
    constants::LEVEL_HEIGHT,
    errors::{PipelineError, RegridError},
    field::{Collection, Field, Mesh, MeshLocation},
};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::sync::Arc;

/// Structure holding everything needed to process a collection.
#[derive(Debug)]
pub struct Core<'a> {
    pub config: &'a Config,
}

/// Regridders built so far, reused by fields on the same source.
struct Regridders {
    grid: TargetGrid,
    reference: String,

    /// `None` when the reference field is not located on mesh cells.
    conservative: Option<ConservativeRegridder>,

    edge: Vec<(Arc<Mesh>, EdgeRegridder)>,
    bilinear: Vec<BilinearRegridder>,
}

impl Regridders {
    fn new(reference: &Field, grid: TargetGrid) -> Result<Self, RegridError> {
        let conservative = match reference.location {
            MeshLocation::Cell => {
                debug!("Computing conservative weights from {}", reference.name());
                Some(ConservativeRegridder::new(reference, grid.clone())?)
            }
            _ => None,
        };

        Ok(Regridders {
            grid,
            reference: reference.name().to_string(),
            conservative,
            edge: vec![],
            bilinear: vec![],
        })
    }

    fn conservative(&self) -> Result<&ConservativeRegridder, RegridError> {
        self.conservative
            .as_ref()
            .ok_or_else(|| RegridError::ReferenceLocation(self.reference.clone()))
    }

    fn edge(&mut self, field: &Field) -> Result<&EdgeRegridder, RegridError> {
        let mesh = field
            .mesh
            .as_ref()
            .ok_or_else(|| RegridError::MissingMesh(field.name().to_string()))?;

        let index = match self.edge.iter().position(|(m, _)| Arc::ptr_eq(m, mesh)) {
            Some(index) => index,
            None => {
                debug!("Triangulating edges of {}", mesh.name);
                let regridder = EdgeRegridder::for_field(field, self.grid.clone())?;
                self.edge.push((Arc::clone(mesh), regridder));
                self.edge.len() - 1
            }
        };

        Ok(&self.edge[index].1)
    }

    fn bilinear(&mut self, field: &Field) -> Result<&BilinearRegridder, RegridError> {
        let index = match self.bilinear.iter().position(|r| r.fits(field)) {
            Some(index) => index,
            None => {
                debug!("Computing bilinear weights from {}", field.name());
                let regridder = BilinearRegridder::for_field(field, self.grid.clone())?;
                self.bilinear.push(regridder);
                self.bilinear.len() - 1
            }
        };

        Ok(&self.bilinear[index])
    }
}

impl<'a> Core<'a> {
    pub fn new(config: &'a Config) -> Self {
        Core { config }
    }

    /// Builds the target grid with level heights of the reference field.
    pub fn target_grid(&self, reference: &Field) -> Result<TargetGrid, PipelineError> {
        let shape = self.config.target_grid;

        let level_height = reference
            .find_coord(LEVEL_HEIGHT)
            .map(|c| c.clone().with_axis(0).promoted());

        Ok(TargetGrid::regular(shape.nlat, shape.nlon, shape.pm180)?.with_levels(level_height))
    }

    /// Regrids and re-levels all fields, keeping their order.
    /// The reference field need not be part of the collection.
    pub fn regrid(&self, fields: Collection, reference: &Field) -> Result<Collection, PipelineError> {
        let grid = self.target_grid(reference)?;
        let mut regridders = Regridders::new(reference, grid)?;

        let fields_bar = ProgressBar::new(fields.len() as u64);
        fields_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .progress_chars("#>-"),
        );
        fields_bar.set_prefix("Regridded fields");

        let mut regridded = Collection::default();

        for field in fields {
            let name = field.name().to_string();

            match self.process(&field, &mut regridders) {
                Ok(field) => regridded.push(field),
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::Abort => {
                        fields_bar.abandon();
                        return Err(err);
                    }
                    FailurePolicy::Skip => {
                        warn!("Skipping field {}: {}", name, err);
                    }
                },
            }

            fields_bar.inc(1);
        }

        fields_bar.finish_with_message("All fields regridded");
        info!("Regridded {} fields", regridded.len());

        Ok(regridded)
    }

    fn process(&self, field: &Field, regridders: &mut Regridders) -> Result<Field, PipelineError> {
        debug!("Regridding {} located on {}", field.name(), field.location);

        let regridded = match field.location {
            MeshLocation::Cell => regridders.conservative()?.regrid(field)?,
            MeshLocation::Edge => regridders.edge(field)?.regrid(field)?,
            MeshLocation::None => regridders.bilinear(field)?.regrid(field)?,
            MeshLocation::Node => {
                return Err(RegridError::UnsupportedLocation {
                    field: field.name().to_string(),
                    location: field.location.to_string(),
                }
                .into())
            }
        };

        Ok(relevel(regridded, &regridders.grid, self.config.relevel.extrapolation)?)
    }
}
