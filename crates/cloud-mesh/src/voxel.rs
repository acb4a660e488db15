//! World space to voxel-grid space mapping and occupancy grid construction.
//!
//! A [`GridPlacement`] fixes where the cloud sits inside a cubic grid of
//! `patch_size` voxels per axis. The same placement drives both directions of
//! the mapping: [`GridPlacement::to_grid`] when building the occupancy grid
//! and [`GridPlacement::to_world`] when rescaling the extracted mesh.

use nalgebra::{Point3, Vector3};

use crate::completion::CompletionParams;
use crate::error::CloudResult;
use crate::geometry;
use crate::pointcloud::PointCloud;

/// Placement of a point cloud inside a cubic voxel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPlacement {
    /// World-space point mapped to `offset` in grid space.
    pub center: Point3<f64>,

    /// World-space edge length of one voxel.
    pub resolution: f64,

    /// Voxels per grid axis.
    pub patch_size: usize,

    /// Grid-space position of `center`, i.e. `(percent_x, percent_y, percent_z) * patch_size`.
    pub offset: Vector3<f64>,
}

impl GridPlacement {
    /// Create a placement from explicit values.
    ///
    /// `offset_fraction` is the position of `center` as a fraction of the
    /// grid edge on each axis.
    pub fn new(
        center: Point3<f64>,
        resolution: f64,
        patch_size: usize,
        offset_fraction: Vector3<f64>,
    ) -> Self {
        Self {
            center,
            resolution,
            patch_size,
            offset: offset_fraction * patch_size as f64,
        }
    }

    /// Derive the placement for `cloud` from completion parameters.
    ///
    /// Validates the parameters and computes the resolution and center of
    /// the cloud.
    pub fn from_params(cloud: &PointCloud, params: &CompletionParams) -> CloudResult<Self> {
        params.validate()?;
        let resolution =
            geometry::voxel_resolution(&cloud.points, params.patch_size, params.percent_patch_size)?;
        let center = geometry::pointcloud_center(&cloud.points)?;

        Ok(Self::new(
            center,
            resolution,
            params.patch_size,
            params.offset_fraction(),
        ))
    }

    /// Continuous grid-space coordinates of a world point.
    #[inline]
    pub fn to_grid(&self, p: &Point3<f64>) -> Vector3<f64> {
        (p - self.center + self.offset * self.resolution) / self.resolution
    }

    /// World-space coordinates of a grid-space point.
    ///
    /// Exact inverse of [`to_grid`](Self::to_grid).
    #[inline]
    pub fn to_world(&self, g: &Point3<f64>) -> Point3<f64> {
        Point3::from(g.coords * self.resolution - self.offset * self.resolution)
            + self.center.coords
    }

    /// Integer cell of a world point, or where it falls outside the grid.
    ///
    /// Index 0 on any axis counts as below range, so occupied cells always
    /// have a zero-valued neighbor layer beneath them.
    pub fn cell_of(&self, p: &Point3<f64>) -> CellLookup {
        let g = self.to_grid(p).map(f64::floor);
        let dim = self.patch_size as f64;

        if g.x >= dim || g.y >= dim || g.z >= dim {
            CellLookup::AboveRange
        } else if g.x <= 0.0 || g.y <= 0.0 || g.z <= 0.0 {
            CellLookup::BelowRange
        } else {
            CellLookup::Inside([g.x as usize, g.y as usize, g.z as usize])
        }
    }
}

/// Result of mapping one point into the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLookup {
    /// The point lands in this cell.
    Inside([usize; 3]),
    /// Some axis index is `<= 0`.
    BelowRange,
    /// Some axis index is `>= patch_size`.
    AboveRange,
}

/// A cubic grid of binary occupancy flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    dim: usize,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// Create an all-empty grid with `dim` cells per axis.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            cells: vec![false; dim * dim * dim],
        }
    }

    /// Cells per axis.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    fn linear(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.dim + z * self.dim * self.dim
    }

    /// Whether cell `(x, y, z)` is occupied. Out-of-range cells are empty.
    #[inline]
    pub fn is_occupied(&self, x: usize, y: usize, z: usize) -> bool {
        x < self.dim && y < self.dim && z < self.dim && self.cells[self.linear(x, y, z)]
    }

    /// Mark cell `(x, y, z)` occupied. Returns true if it was empty before.
    ///
    /// # Panics
    ///
    /// Panics if any index is `>= dim`.
    pub fn set(&mut self, x: usize, y: usize, z: usize) -> bool {
        assert!(
            x < self.dim && y < self.dim && z < self.dim,
            "cell ({}, {}, {}) outside grid of dim {}",
            x,
            y,
            z,
            self.dim
        );
        let i = self.linear(x, y, z);
        let was_empty = !self.cells[i];
        self.cells[i] = true;
        was_empty
    }

    /// Number of occupied cells.
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// True when no cell is occupied.
    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }

    /// Occupied cell indices in `x`-fastest order.
    pub fn occupied_cells(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        let dim = self.dim;
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c)
            .map(move |(i, _)| [i % dim, (i / dim) % dim, i / (dim * dim)])
    }
}

/// Counts gathered while voxelizing a cloud.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct VoxelizationStats {
    /// Points in the input cloud.
    pub total_points: usize,

    /// Points that landed inside the grid.
    pub kept_points: usize,

    /// Points discarded because an axis index was `<= 0`.
    pub discarded_below: usize,

    /// Points discarded because an axis index was `>= patch_size`.
    pub discarded_above: usize,

    /// Distinct occupied cells.
    pub occupied_voxels: usize,
}

impl VoxelizationStats {
    /// Total discarded points.
    #[inline]
    pub fn discarded(&self) -> usize {
        self.discarded_below + self.discarded_above
    }
}

/// Build the occupancy grid of `points` under `placement`.
///
/// Points outside the grid are dropped and counted, never reported as an
/// error. An all-empty grid is a valid result; see
/// [`log_voxelization`](crate::tracing_ext::log_voxelization) for reporting.
pub fn build_occupancy_grid(
    points: &[Point3<f64>],
    placement: &GridPlacement,
) -> (OccupancyGrid, VoxelizationStats) {
    let mut grid = OccupancyGrid::new(placement.patch_size);
    let mut stats = VoxelizationStats {
        total_points: points.len(),
        ..Default::default()
    };

    for p in points {
        match placement.cell_of(p) {
            CellLookup::Inside([x, y, z]) => {
                stats.kept_points += 1;
                if grid.set(x, y, z) {
                    stats.occupied_voxels += 1;
                }
            }
            CellLookup::BelowRange => stats.discarded_below += 1,
            CellLookup::AboveRange => stats.discarded_above += 1,
        }
    }

    (grid, stats)
}
