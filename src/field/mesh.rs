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

use super::MeshLocation;
use crate::Float;

/// Two-dimensional UGRID mesh topology.
///
/// All positions are in degrees. Face-node connectivity is
/// zero-based and ragged (fill values are dropped on read).
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Mesh {
    pub name: String,
    pub node_lon: Vec<Float>,
    pub node_lat: Vec<Float>,
    pub face_nodes: Vec<Vec<usize>>,
    pub face_lon: Option<Vec<Float>>,
    pub face_lat: Option<Vec<Float>>,
    pub edge_lon: Option<Vec<Float>>,
    pub edge_lat: Option<Vec<Float>>,
    pub node_dim: String,
    pub face_dim: String,
    pub edge_dim: String,
}

impl Mesh {
    pub fn face_count(&self) -> usize {
        self.face_nodes.len()
    }

    /// Vertices of face `index` as `(lon, lat)` pairs, in connectivity order.
    pub fn face_polygon(&self, index: usize) -> Vec<(Float, Float)> {
        self.face_nodes[index]
            .iter()
            .map(|&n| (self.node_lon[n], self.node_lat[n]))
            .collect()
    }

    /// Name of the data dimension indexing elements at `location`.
    pub fn dim_name(&self, location: MeshLocation) -> Option<&str> {
        match location {
            MeshLocation::Cell => Some(&self.face_dim),
            MeshLocation::Edge => Some(&self.edge_dim),
            MeshLocation::Node => Some(&self.node_dim),
            MeshLocation::None => None,
        }
    }

    /// Longitudes and latitudes of elements at `location`.
    ///
    /// Face centres missing from the file are computed
    /// as vertex averages, edge centres are required.
    pub fn location_points(&self, location: MeshLocation) -> Option<(Vec<Float>, Vec<Float>)> {
        match location {
            MeshLocation::Node => Some((self.node_lon.clone(), self.node_lat.clone())),
            MeshLocation::Edge => Some((self.edge_lon.clone()?, self.edge_lat.clone()?)),
            MeshLocation::Cell => match (&self.face_lon, &self.face_lat) {
                (Some(lon), Some(lat)) => Some((lon.clone(), lat.clone())),
                _ => Some(self.face_centroids()),
            },
            MeshLocation::None => None,
        }
    }

    fn face_centroids(&self) -> (Vec<Float>, Vec<Float>) {
        (0..self.face_count())
            .map(|i| {
                let polygon = self.face_polygon(i);
                let n = polygon.len().max(1) as Float;
                let reference = polygon.first().map_or(0.0, |p| p.0);

                let (lon_sum, lat_sum) = polygon.iter().fold((0.0, 0.0), |(lon, lat), p| {
                    (lon + unwrap_near(p.0, reference), lat + p.1)
                });

                (lon_sum / n, lat_sum / n)
            })
            .unzip()
    }
}

/// Shifts `lon` by whole turns so it lies within half a turn of `reference`.
///
/// Non-finite input gives NaN.
pub fn unwrap_near(lon: Float, reference: Float) -> Float {
    reference + (lon - reference + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::{unwrap_near, Mesh};
    use crate::{field::MeshLocation, Float};
    use float_cmp::approx_eq;

    #[test]
    fn centroid_across_seam() {
        let mesh = Mesh {
            node_lon: vec![170.0, -170.0, -170.0, 170.0],
            node_lat: vec![0.0, 0.0, 10.0, 10.0],
            face_nodes: vec![vec![0, 1, 2, 3]],
            ..Mesh::default()
        };

        let (lon, lat) = mesh.location_points(MeshLocation::Cell).unwrap();
        assert!(approx_eq!(Float, lon[0], 180.0));
        assert!(approx_eq!(Float, lat[0], 5.0));
    }

    #[test]
    fn edges_need_centres() {
        let mesh = Mesh::default();
        assert!(mesh.location_points(MeshLocation::Edge).is_none());
        assert!(mesh.location_points(MeshLocation::None).is_none());
    }

    #[test]
    fn unwrap() {
        assert!(approx_eq!(Float, unwrap_near(-170.0, 170.0), 190.0));
        assert!(approx_eq!(Float, unwrap_near(350.0, 0.0), -10.0));
        assert!(approx_eq!(Float, unwrap_near(3610.0, 0.0), 10.0, epsilon = 1e-9));
        assert!(unwrap_near(Float::INFINITY, 0.0).is_nan());
        assert!(unwrap_near(Float::NEG_INFINITY, 170.0).is_nan());
    }
}
