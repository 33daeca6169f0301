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

use super::{Coord, Field, MeshLocation};
use crate::{
    constants::TIME,
    errors::{ConcatenateError, FieldError},
    Float,
};
use log::debug;
use ndarray::{concatenate, ArrayViewD, Axis};

/// Ordered list of fields.
#[derive(Clone, Debug, Default)]
pub struct Collection(Vec<Field>);

/// Placement of the time coordinate, which decides how fields are joined.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum TimePlacement {
    Axis(usize),
    Scalar,
    Missing,
}

impl TimePlacement {
    fn of(field: &Field) -> Self {
        match field.find_coord(TIME) {
            Some(c) => c.axis.map_or(TimePlacement::Scalar, TimePlacement::Axis),
            None => TimePlacement::Missing,
        }
    }
}

/// Fields that can only be joined if their key is equal.
#[derive(Clone, PartialEq, Debug)]
struct GroupKey {
    var_name: String,
    location: MeshLocation,
    time: TimePlacement,
    other_shape: Vec<usize>,
}

impl GroupKey {
    fn of(field: &Field) -> Self {
        let time = TimePlacement::of(field);
        let other_shape = field
            .shape()
            .iter()
            .enumerate()
            .filter(|(i, _)| time != TimePlacement::Axis(*i))
            .map(|(_, &n)| n)
            .collect();

        GroupKey {
            var_name: field.var_name.clone(),
            location: field.location,
            time,
            other_shape,
        }
    }
}

impl Collection {
    pub fn new(fields: Vec<Field>) -> Self {
        Collection(fields)
    }

    pub fn fields(&self) -> &[Field] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, field: Field) {
        self.0.push(field);
    }

    pub fn remove(&mut self, index: usize) -> Field {
        self.0.remove(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Field> {
        self.0.iter_mut()
    }

    /// Fields matching any of `names`, in collection order.
    pub fn extract(&self, names: &[&str]) -> Collection {
        Collection(
            self.0
                .iter()
                .filter(|f| names.iter().any(|n| f.matches(n)))
                .cloned()
                .collect(),
        )
    }

    /// The single field matching `name`.
    pub fn extract_field(&self, name: &str) -> Result<&Field, FieldError> {
        let mut matching = self.0.iter().filter(|f| f.matches(name));

        match (matching.next(), matching.count()) {
            (Some(field), 0) => Ok(field),
            (Some(_), rest) => Err(FieldError::AmbiguousField {
                name: name.to_string(),
                count: rest + 1,
            }),
            (None, _) => Err(FieldError::FieldNotFound(name.to_string())),
        }
    }

    /// Drops fields whose name repeats an earlier field's name.
    pub fn unique(self) -> Collection {
        let mut seen = rustc_hash::FxHashSet::default();

        Collection(
            self.0
                .into_iter()
                .filter(|f| seen.insert(f.name().to_string()))
                .collect(),
        )
    }

    /// Joins same-named fields that differ only along time.
    ///
    /// Scalar time coordinates are stacked into a new leading axis.
    /// Joined fields keep metadata of the first loaded member
    /// and its position in the collection. Members with an empty
    /// time axis are skipped.
    pub fn concatenate(self) -> Result<Collection, ConcatenateError> {
        let mut groups: Vec<(GroupKey, Vec<Field>)> = vec![];

        for field in self.0 {
            let key = GroupKey::of(&field);

            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(field),
                None => groups.push((key, vec![field])),
            }
        }

        let fields = groups
            .into_iter()
            .map(|(key, members)| join_group(key, members))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Collection(fields))
    }
}

impl IntoIterator for Collection {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<Field> for Collection {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Collection(iter.into_iter().collect())
    }
}

fn join_group(key: GroupKey, mut members: Vec<Field>) -> Result<Field, ConcatenateError> {
    if members.len() == 1 {
        return Ok(members.remove(0));
    }

    let name = key.var_name;

    let axis = match key.time {
        TimePlacement::Missing => {
            return Err(ConcatenateError::Mismatch {
                name,
                reason: "lack of time coordinate".to_string(),
            })
        }
        TimePlacement::Scalar => {
            members = members
                .iter()
                .map(|f| f.expand_scalar(TIME))
                .collect::<Result<Vec<_>, _>>()?;
            0
        }
        TimePlacement::Axis(axis) => axis,
    };

    let (mut members, empty): (Vec<Field>, Vec<Field>) = members
        .into_iter()
        .partition(|f| f.shape().get(axis).map_or(true, |&n| n > 0));

    if !empty.is_empty() {
        debug!("Skipping {} inputs of {} without time values", empty.len(), name);
    }

    if members.len() <= 1 {
        return members
            .pop()
            .or_else(|| empty.into_iter().next())
            .ok_or_else(|| ConcatenateError::Mismatch {
                name: name.clone(),
                reason: "lack of members".to_string(),
            });
    }

    let mut times = Vec::with_capacity(members.len());
    for field in &members {
        let time = field.coord(TIME)?;
        if !time.is_increasing() {
            return Err(ConcatenateError::NonMonotonic(name));
        }
        times.push(time.points().to_vec());
    }

    let mut order: Vec<usize> = (0..members.len()).collect();
    order.sort_by(|&a, &b| {
        times[a][0]
            .partial_cmp(&times[b][0])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for pair in order.windows(2) {
        let last = times[pair[0]].last().copied().unwrap_or(Float::NAN);
        let next = times[pair[1]][0];

        if !(last < next) {
            return Err(ConcatenateError::Overlap(name));
        }
    }

    let first = &members[order[0]];
    for &i in &order[1..] {
        check_same_structure(first, &members[i], axis)?;
    }

    let views: Vec<ArrayViewD<Float>> = order.iter().map(|&i| members[i].data()).collect();
    let data = concatenate(Axis(axis), &views).map_err(FieldError::from)?;

    let mut coords = Vec::with_capacity(first.coords().len());
    for coord in first.coords() {
        if coord.axis != Some(axis) {
            coords.push(coord.clone());
            continue;
        }

        let parts: Option<Vec<&Coord>> = order
            .iter()
            .map(|&i| members[i].find_coord(&coord.name))
            .collect();

        // aux coordinates absent from some members are dropped
        if let Some(parts) = parts {
            coords.push(Coord::joined(&parts)?);
        }
    }

    let joined = members.swap_remove(0);
    Ok(joined.with_data(data, coords))
}

fn check_same_structure(first: &Field, other: &Field, axis: usize) -> Result<(), ConcatenateError> {
    let mismatch = |reason: String| ConcatenateError::Mismatch {
        name: first.var_name.clone(),
        reason,
    };

    if first.units != other.units {
        return Err(mismatch("units".to_string()));
    }

    for coord in first.coords().iter().filter(|c| c.axis != Some(axis)) {
        match other.find_coord(&coord.name) {
            Some(c) if c.axis == coord.axis && c.kind == coord.kind && c.same_values(coord) => {}
            _ => return Err(mismatch(format!("coordinate {}", coord.name))),
        }
    }

    let first_count = first.coords().iter().filter(|c| c.axis != Some(axis)).count();
    let other_count = other.coords().iter().filter(|c| c.axis != Some(axis)).count();
    if first_count != other_count {
        return Err(mismatch("number of coordinates".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Collection;
    use crate::{
        errors::ConcatenateError,
        field::{Coord, Field},
        Float,
    };
    use ndarray::{array, Array, IxDyn};

    fn timed(name: &str, times: &[Float]) -> Field {
        let data = Array::from_shape_fn(IxDyn(&[times.len(), 2]), |ix| times[ix[0]] + ix[1] as Float);
        let mut field = Field::new(name, "K", data).with_dim_names(&["time", "cell"]);
        field
            .add_coord(Coord::dim(
                "time",
                "seconds since 2000-01-01",
                Array::from_vec(times.to_vec()),
                0,
            ))
            .unwrap();
        field
            .add_coord(Coord::aux("longitude", "degrees_east", array![0.0, 90.0], Some(1)))
            .unwrap();
        field
    }

    #[test]
    fn concatenate_sorts_members() {
        let collection = Collection::new(vec![
            timed("temperature", &[3.0, 4.0]),
            timed("pressure", &[0.0]),
            timed("temperature", &[1.0, 2.0]),
        ]);

        let joined = collection.concatenate().unwrap();
        assert_eq!(joined.len(), 2);

        let temperature = joined.extract_field("temperature").unwrap();
        assert_eq!(temperature.shape(), &[4, 2]);
        assert_eq!(
            temperature.coord("time").unwrap().points().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(temperature.data()[[3, 1]], 5.0);
    }

    #[test]
    fn concatenate_rejects_overlap() {
        let collection = Collection::new(vec![
            timed("temperature", &[1.0, 2.0]),
            timed("temperature", &[2.0, 3.0]),
        ]);

        assert!(matches!(
            collection.concatenate(),
            Err(ConcatenateError::Overlap(_))
        ));
    }

    #[test]
    fn concatenate_rejects_mismatch() {
        let mut other = timed("temperature", &[3.0]);
        other.units = "degC".to_string();
        let collection = Collection::new(vec![timed("temperature", &[1.0]), other]);

        assert!(matches!(
            collection.concatenate(),
            Err(ConcatenateError::Mismatch { .. })
        ));
    }

    #[test]
    fn concatenate_stacks_scalar_times() {
        let scalar = |t: Float| {
            let mut field = Field::new("pmsl", "Pa", Array::from_elem(IxDyn(&[2]), t));
            field.add_coord(Coord::scalar("time", "s", t)).unwrap();
            field
        };

        let joined = Collection::new(vec![scalar(5.0), scalar(1.0)])
            .concatenate()
            .unwrap();
        let pmsl = joined.extract_field("pmsl").unwrap();

        assert_eq!(pmsl.shape(), &[2, 2]);
        assert!(pmsl.coord("time").unwrap().is_dim());
        assert_eq!(pmsl.data()[[0, 0]], 1.0);
    }

    #[test]
    fn concatenate_skips_empty_times() {
        let mut empty = timed("temperature", &[]);
        empty.attributes.insert("source".to_string(), "second".into());
        let joined = Collection::new(vec![
            timed("temperature", &[1.0, 2.0]),
            empty,
            timed("temperature", &[3.0]),
        ])
        .concatenate()
        .unwrap();

        let temperature = joined.extract_field("temperature").unwrap();
        assert_eq!(temperature.shape(), &[3, 2]);
        assert!(temperature.attributes.get("source").is_none());
    }

    #[test]
    fn concatenate_keeps_first_loaded_metadata() {
        let mut late = timed("temperature", &[3.0, 4.0]);
        late.attributes.insert("source".to_string(), "first file".into());
        let mut early = timed("temperature", &[1.0, 2.0]);
        early.attributes.insert("source".to_string(), "second file".into());

        let joined = Collection::new(vec![late, early]).concatenate().unwrap();
        let temperature = joined.extract_field("temperature").unwrap();

        assert_eq!(
            temperature.coord("time").unwrap().points().to_vec(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
        assert_eq!(
            temperature.attributes.get("source").map(|a| a.to_string()),
            Some("first file".to_string())
        );
    }

    #[test]
    fn extract_and_unique() {
        let collection = Collection::new(vec![
            timed("u", &[0.0]),
            timed("v", &[0.0]),
            timed("u", &[1.0]),
        ]);

        assert_eq!(collection.extract(&["u"]).len(), 2);
        assert!(collection.extract_field("u").is_err());
        assert!(collection.extract_field("w").is_err());
        assert_eq!(collection.unique().len(), 2);
    }
}
