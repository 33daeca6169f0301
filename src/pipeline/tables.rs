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

//! Static descriptions of supported models and simulation cases.

use crate::Float;
use clap::ValueEnum;

/// Climate model which produced the data.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, ValueEnum)]
pub enum ModelKind {
    Um,
    Lfric,
}

/// Names and conventions of a model's output.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ModelSpec {
    pub title: &'static str,

    /// Marker in names of processed files of this model.
    pub proc_suffix: &'static str,

    /// Vertical coordinate of processed fields.
    pub z: &'static str,

    pub temp: &'static str,
    pub u: &'static str,
    pub v: &'static str,
    pub w: &'static str,
    pub pres: &'static str,
    pub dens: &'static str,

    /// Field on whose cells data are regridded by default.
    pub ref_field: &'static str,
}

const UM: ModelSpec = ModelSpec {
    title: "UM",
    proc_suffix: "ga9",
    z: "level_height",
    temp: "air_temperature",
    u: "x_wind",
    v: "y_wind",
    w: "upward_air_velocity",
    pres: "air_pressure",
    dens: "air_density",
    ref_field: "air_potential_temperature",
};

const LFRIC: ModelSpec = ModelSpec {
    title: "LFRic",
    proc_suffix: "inst",
    z: "level_height",
    temp: "temperature",
    u: "u_in_w3",
    v: "v_in_w3",
    w: "w_in_wth",
    pres: "pressure_in_wth",
    dens: "density",
    ref_field: "air_potential_temperature",
};

impl ModelKind {
    pub fn spec(self) -> &'static ModelSpec {
        match self {
            ModelKind::Um => &UM,
            ModelKind::Lfric => &LFRIC,
        }
    }
}

/// Simulation cases with known setup.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Experiment {
    Hs,
    El,
    Tle,
    ThaiBen1,
    ThaiBen2,
    ThaiHab1,
    ThaiHab2,
}

impl Experiment {
    pub fn from_label(label: &str) -> Option<Self> {
        let experiment = match label {
            "hs" => Experiment::Hs,
            "el" => Experiment::El,
            "tle" => Experiment::Tle,
            "thai_ben1" => Experiment::ThaiBen1,
            "thai_ben2" => Experiment::ThaiBen2,
            "thai_hab1" => Experiment::ThaiHab1,
            "thai_hab2" => Experiment::ThaiHab2,
            _ => return None,
        };

        Some(experiment)
    }

    /// Number of final days averaged in time-mean files.
    pub fn time_mean_period(self) -> Float {
        match self {
            Experiment::Hs | Experiment::El | Experiment::Tle => 1000.0,
            Experiment::ThaiBen1
            | Experiment::ThaiBen2
            | Experiment::ThaiHab1
            | Experiment::ThaiHab2 => 610.0,
        }
    }
}

/// Global attributes of published time-mean files.
pub const PUBLISHED_ATTRIBUTES: [(&str, &str); 7] = [
    ("summary", "Model data for Sergeev et al. (egusphere-2023-647)"),
    ("conventions", "CF-1.7,ACDD-1.3"),
    ("creator_name", "Denis Sergeev"),
    ("creator_email", "d.sergeev@exeter.ac.uk"),
    ("creator_institution", "University of Exeter"),
    ("project", "Exascale Exoplanet Modelling"),
    ("coverage_content_type", "modelResult"),
];

#[cfg(test)]
mod tests {
    use super::{Experiment, ModelKind};

    #[test]
    fn experiment_lookup() {
        let hab1 = Experiment::from_label("thai_hab1").unwrap();
        assert_eq!(hab1.time_mean_period(), 610.0);
        assert_eq!(Experiment::from_label("tle").unwrap().time_mean_period(), 1000.0);
        assert!(Experiment::from_label("trap1e").is_none());
    }

    #[test]
    fn model_names() {
        assert_eq!(ModelKind::Lfric.spec().w, "w_in_wth");
        assert_eq!(ModelKind::Um.spec().title, "UM");
    }
}
