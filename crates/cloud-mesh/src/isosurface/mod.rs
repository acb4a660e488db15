//! Isosurface extraction from sampled scalar fields.
//!
//! Extractors work in grid-index space: the sample at `(x, y, z)` sits at
//! the point `(x, y, z)` and output vertices use the same coordinates.
//! Mapping back to world space is the job of [`crate::rescale`].

mod marching_cubes;
mod tables;

pub use marching_cubes::MarchingCubes;

use crate::Mesh;
use crate::voxel::OccupancyGrid;

/// Isovalue separating empty (0) from occupied (1) cells.
pub const OCCUPANCY_ISOVALUE: f64 = 0.5;

/// A scalar field sampled on a regular 3-D lattice.
pub trait ScalarField {
    /// Number of samples along x, y and z.
    fn dims(&self) -> [usize; 3];

    /// Sample at lattice point `(x, y, z)`. Callers stay within [`dims`](Self::dims).
    fn value(&self, x: usize, y: usize, z: usize) -> f64;
}

impl ScalarField for OccupancyGrid {
    fn dims(&self) -> [usize; 3] {
        let d = self.dim();
        [d, d, d]
    }

    #[inline]
    fn value(&self, x: usize, y: usize, z: usize) -> f64 {
        if self.is_occupied(x, y, z) { 1.0 } else { 0.0 }
    }
}

/// A dense field stored in `x`-fastest order.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseField {
    dims: [usize; 3],
    values: Vec<f64>,
}

impl DenseField {
    /// Sample `f` at every lattice point.
    pub fn from_fn(dims: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    values.push(f(x, y, z));
                }
            }
        }
        Self { dims, values }
    }
}

impl ScalarField for DenseField {
    fn dims(&self) -> [usize; 3] {
        self.dims
    }

    #[inline]
    fn value(&self, x: usize, y: usize, z: usize) -> f64 {
        self.values[x + y * self.dims[0] + z * self.dims[0] * self.dims[1]]
    }
}

/// Strategy that turns a scalar field into a triangle mesh.
pub trait IsosurfaceExtractor {
    /// Extract the surface where `field` equals `isovalue`.
    ///
    /// Samples below `isovalue` are outside; face winding makes normals
    /// point from the inside region toward the outside.
    fn extract(&self, field: &dyn ScalarField, isovalue: f64) -> Mesh;
}
