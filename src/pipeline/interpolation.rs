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

//! Module containing interpolation methods.

use super::bisection::find_bracket;
use crate::{
    errors::{InterpolationError, SearchError},
    Float,
};
use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;

/// Behaviour of 1-D interpolation for values outside the source range.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtrapolationPolicy {
    /// Continue the line through the two outermost points.
    Linear,

    /// Use the value of the outermost point.
    Clamp,

    /// Return NaN.
    Nan,

    /// Fail with [`InterpolationError::OutOfRange`].
    Error,
}

impl Default for ExtrapolationPolicy {
    fn default() -> Self {
        ExtrapolationPolicy::Linear
    }
}

/// Linearly interpolates `ys` sampled at monotonic `xs` to `x`.
pub fn linear_1d(
    xs: &[Float],
    ys: &[Float],
    x: Float,
    policy: ExtrapolationPolicy,
) -> Result<Float, InterpolationError> {
    if xs.len() != ys.len() {
        return Err(InterpolationError::LengthMismatch(xs.len(), ys.len()));
    }

    if xs.is_empty() {
        return Err(SearchError::EmptyArray.into());
    }

    if x.is_nan() {
        return Ok(Float::NAN);
    }

    if xs.len() == 1 {
        return if x == xs[0] {
            Ok(ys[0])
        } else {
            extrapolate_single(ys[0], x, policy)
        };
    }

    let n = xs.len();
    let (lo, hi) = if xs[0] < xs[n - 1] {
        (xs[0], xs[n - 1])
    } else {
        (xs[n - 1], xs[0])
    };

    let i = if (lo..=hi).contains(&x) {
        find_bracket(xs, &x)?
    } else {
        let near_first = (x - xs[0]).abs() < (x - xs[n - 1]).abs();

        match policy {
            ExtrapolationPolicy::Linear if near_first => 0,
            ExtrapolationPolicy::Linear => n - 2,
            ExtrapolationPolicy::Clamp if near_first => return Ok(ys[0]),
            ExtrapolationPolicy::Clamp => return Ok(ys[n - 1]),
            ExtrapolationPolicy::Nan => return Ok(Float::NAN),
            ExtrapolationPolicy::Error => return Err(InterpolationError::OutOfRange(x)),
        }
    };

    let t = (x - xs[i]) / (xs[i + 1] - xs[i]);
    Ok(ys[i] + t * (ys[i + 1] - ys[i]))
}

fn extrapolate_single(
    y: Float,
    x: Float,
    policy: ExtrapolationPolicy,
) -> Result<Float, InterpolationError> {
    match policy {
        ExtrapolationPolicy::Linear | ExtrapolationPolicy::Clamp => Ok(y),
        ExtrapolationPolicy::Nan => Ok(Float::NAN),
        ExtrapolationPolicy::Error => Err(InterpolationError::OutOfRange(x)),
    }
}

/// Barycentric coordinates of `point` in `triangle`.
///
/// Returns `None` for degenerate triangles.
pub fn barycentric_weights(
    triangle: [(Float, Float); 3],
    point: (Float, Float),
) -> Option<[Float; 3]> {
    let [a, b, c] = triangle;

    let lhs = Matrix3::new(a.0, b.0, c.0, a.1, b.1, c.1, 1.0, 1.0, 1.0);
    let rhs = Vector3::new(point.0, point.1, 1.0);

    let weights = lhs.try_inverse()? * rhs;
    Some([weights[0], weights[1], weights[2]])
}
