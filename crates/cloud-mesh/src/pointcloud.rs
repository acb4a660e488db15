//! Point cloud storage.
//!
//! A [`PointCloud`] is an ordered list of 3-D positions. It is created by
//! loading a file (see [`crate::io`]) or from positions in memory, and is
//! never mutated by the completion stages.

use std::path::Path;

use nalgebra::Point3;

use crate::error::{CloudError, CloudResult};
use crate::geometry::{self, BoundingBox};

/// An ordered collection of 3-D points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// The points, in file order.
    pub points: Vec<Point3<f64>>,
}

impl PointCloud {
    /// Create a new empty point cloud.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a point cloud with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Create a point cloud from a list of positions.
    pub fn from_positions(positions: &[Point3<f64>]) -> Self {
        Self {
            points: positions.to_vec(),
        }
    }

    /// Number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point from coordinates.
    #[inline]
    pub fn push_coords(&mut self, x: f64, y: f64, z: f64) {
        self.points.push(Point3::new(x, y, z));
    }

    /// Axis-aligned bounding box of the cloud.
    pub fn bounds(&self) -> CloudResult<BoundingBox> {
        geometry::bounding_box(&self.points)
    }

    /// Midpoint of the bounding box.
    pub fn center(&self) -> CloudResult<Point3<f64>> {
        geometry::pointcloud_center(&self.points)
    }

    /// Check that the cloud is non-empty and every coordinate is finite.
    pub fn validate(&self) -> CloudResult<()> {
        if self.points.is_empty() {
            return Err(CloudError::empty_cloud("no points to process"));
        }

        for (point_index, p) in self.points.iter().enumerate() {
            for (coordinate, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
                if !value.is_finite() {
                    return Err(CloudError::InvalidCoordinate {
                        point_index,
                        coordinate,
                        value,
                    });
                }
            }
        }

        Ok(())
    }

    /// Load a point cloud from file, auto-detecting format.
    pub fn load(path: impl AsRef<Path>) -> CloudResult<Self> {
        crate::io::load_point_cloud(path)
    }
}
