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

//! Physical constants of simulated planets attached to output fields.

use crate::{
    errors::PipelineError,
    field::{Attribute, Collection},
    Float,
};
use log::debug;
use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};

/// Specific gas constant of dry air, used to derive density.
pub const DRY_AIR_GAS_CONSTANT: &str = "dry_air_gas_constant";

#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Constant {
    pub value: Float,

    #[serde(default)]
    pub units: String,
}

/// Constants keyed by their names, eg. `gravity` or `radius`.
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct PlanetConstants(pub BTreeMap<String, Constant>);

impl PlanetConstants {
    /// Reads `<directory>/<planet>.json`.
    pub fn from_dir(directory: &Path, planet: &str) -> Result<Self, PipelineError> {
        let path = directory.join(format!("{}.json", planet));
        debug!("Reading planet constants from {}", path.display());

        let data = fs::read(&path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Self, PipelineError> {
        serde_yaml::from_slice(data).map_err(|e| crate::errors::ConfigError::from(e).into())
    }

    pub fn get(&self, name: &str) -> Option<Float> {
        self.0.get(name).map(|c| c.value)
    }

    /// Attaches every constant as a `planet_<name>` attribute.
    pub fn attach(&self, fields: &mut Collection) {
        for field in fields.iter_mut() {
            for (name, constant) in &self.0 {
                field
                    .attributes
                    .insert(format!("planet_{}", name), Attribute::Float(constant.value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PlanetConstants;
    use crate::field::{Attribute, Collection, Field};
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn parse_and_attach() {
        let constants = PlanetConstants::parse(
            br#"{"gravity": {"value": 9.80665, "units": "m s-2"}, "radius": {"value": 6371200.0, "units": "m"}}"#,
        )
        .unwrap();

        assert_eq!(constants.0.len(), 2);
        assert_eq!(constants.0["gravity"].units, "m s-2");
        assert_eq!(constants.get("radius"), Some(6371200.0));
        assert!(constants.get("dry_air_gas_constant").is_none());

        let mut fields = Collection::new(vec![Field::new("pmsl", "Pa", ArrayD::zeros(IxDyn(&[2])))]);
        constants.attach(&mut fields);

        assert_eq!(
            fields.fields()[0].attributes.get("planet_radius"),
            Some(&Attribute::Float(6371200.0))
        );
    }

    #[test]
    fn malformed_file() {
        assert!(PlanetConstants::parse(b"{\"gravity\": 9.8}").is_err());
    }
}
