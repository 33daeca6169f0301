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

//! Parser of UM vertical level definition files.
//!
//! Files are Fortran namelists of the form:
//!
//! ```text
//! &VERTLEVS
//!  z_top_of_model = 40000.0,
//!  first_constant_r_rho_level = 30,
//!  eta_theta = 0.0, 0.5e-3, ...,
//!  eta_rho = 0.25e-3, ...,
//! /
//! ```
//!
//! `eta_theta` describes full (theta) levels including the surface,
//! `eta_rho` describes half (rho) levels between them. Both are
//! fractions of the model top height.

use crate::{errors::LevelsError, Float};
use rustc_hash::FxHashMap;
use std::{fs, path::Path};

#[derive(Clone, PartialEq, Debug)]
pub struct VerticalLevels {
    pub z_top_of_model: Float,
    pub eta_theta: Vec<Float>,
    pub eta_rho: Vec<Float>,
}

impl VerticalLevels {
    pub fn from_file(path: &Path) -> Result<Self, LevelsError> {
        let text = fs::read_to_string(path)?;
        VerticalLevels::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, LevelsError> {
        let mut values = parse_namelist(text)?;

        let mut take = |key: &'static str| values.remove(key).ok_or(LevelsError::MissingKey(key));

        let z_top_of_model = single(take("z_top_of_model")?, "z_top_of_model")?;
        let eta_theta = take("eta_theta")?;
        let eta_rho = take("eta_rho")?;

        if eta_theta.len() != eta_rho.len() + 1 {
            return Err(LevelsError::Parse(format!(
                "eta_theta has {} values, expected one more than {} of eta_rho",
                eta_theta.len(),
                eta_rho.len()
            )));
        }

        Ok(VerticalLevels {
            z_top_of_model,
            eta_theta,
            eta_rho,
        })
    }

    /// Heights of full levels in metres.
    pub fn theta_heights(&self) -> Vec<Float> {
        self.eta_theta
            .iter()
            .map(|eta| eta * self.z_top_of_model)
            .collect()
    }

    /// Heights of half levels in metres.
    pub fn rho_heights(&self) -> Vec<Float> {
        self.eta_rho
            .iter()
            .map(|eta| eta * self.z_top_of_model)
            .collect()
    }
}

fn single(values: Vec<Float>, key: &str) -> Result<Float, LevelsError> {
    match values.as_slice() {
        [value] => Ok(*value),
        _ => Err(LevelsError::Parse(format!("{} must be a single value", key))),
    }
}

/// Reads the `&VERTLEVS` group into lowercase keys and their numeric values.
fn parse_namelist(text: &str) -> Result<FxHashMap<String, Vec<Float>>, LevelsError> {
    let body: String = text
        .lines()
        .map(|line| line.split('!').next().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(" ");

    let start = body
        .to_lowercase()
        .find("&vertlevs")
        .ok_or_else(|| LevelsError::Parse("no &VERTLEVS group".to_string()))?;
    let body = &body[start + "&vertlevs".len()..];
    let body = body.split('/').next().unwrap_or("");

    let spaced = body.replace('=', " = ").replace(',', " ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();

    let mut values: FxHashMap<String, Vec<Float>> = FxHashMap::default();
    let mut key: Option<String> = None;
    let mut i = 0;

    while i < tokens.len() {
        if tokens.get(i + 1) == Some(&"=") {
            let name = tokens[i].to_lowercase();
            values.insert(name.clone(), vec![]);
            key = Some(name);
            i += 2;
            continue;
        }

        let current = key
            .as_ref()
            .and_then(|k| values.get_mut(k))
            .ok_or_else(|| LevelsError::Parse(format!("value {} without a key", tokens[i])))?;
        current.extend(parse_value(tokens[i])?);
        i += 1;
    }

    Ok(values)
}

/// Parses a Fortran number, possibly repeated (`3*0.5`) or with `d` exponent.
fn parse_value(token: &str) -> Result<Vec<Float>, LevelsError> {
    let invalid = || LevelsError::Parse(format!("invalid value {}", token));
    let number = |s: &str| {
        s.replace(['d', 'D'], "e")
            .parse::<Float>()
            .map_err(|_| invalid())
    };

    match token.split_once('*') {
        Some((count, value)) => {
            let count: usize = count.parse().map_err(|_| invalid())?;
            Ok(vec![number(value)?; count])
        }
        None => Ok(vec![number(token)?]),
    }
}
