//! Completion pipeline: point cloud in, world-space mesh out.
//!
//! Partial completion runs geometry → voxelization → marching cubes →
//! rescale. Each call is self-contained: it allocates its own grid and mesh
//! and shares no state with other calls.
//!
//! # Example
//!
//! ```ignore
//! use cloud_mesh::{complete_partial, CompletionParams, PointCloud};
//!
//! let cloud = PointCloud::load("scan.pcd")?;
//! let output = complete_partial(&cloud, &CompletionParams::default())?;
//! if output.stats.is_empty_result() {
//!     eprintln!("every point fell outside the grid");
//! }
//! ```

use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CloudError, CloudResult};
use crate::hull::convex_hull_mesh;
use crate::isosurface::{IsosurfaceExtractor, MarchingCubes, OCCUPANCY_ISOVALUE};
use crate::pointcloud::PointCloud;
use crate::rescale::rescale_mesh;
use crate::tracing_ext::{OperationTimer, log_mesh_stats, log_voxelization};
use crate::triangulation::fast_triangulate;
use crate::voxel::{GridPlacement, VoxelizationStats, build_occupancy_grid};
use crate::Mesh;

/// Default voxel budget, about 370³ cells.
pub const DEFAULT_MAX_VOXELS: usize = 50_000_000;

/// Parameters for voxel-based completion.
///
/// All fields have defaults, so a TOML config only needs the values it
/// changes:
///
/// ```toml
/// patch_size = 80
/// percent_z = 0.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionParams {
    /// Voxels per grid axis. Default: 120
    pub patch_size: usize,

    /// Grid-space x position of the cloud center, as a fraction of `patch_size`. Default: 0.5
    pub percent_x: f64,

    /// Grid-space y position of the cloud center, as a fraction of `patch_size`. Default: 0.5
    pub percent_y: f64,

    /// Grid-space z position of the cloud center, as a fraction of `patch_size`.
    /// Default: 0.45, leaving more room above the cloud than below.
    pub percent_z: f64,

    /// Fraction of the grid edge spanned by the cloud's largest axis. Default: 0.8
    pub percent_patch_size: f64,

    /// Upper bound on `patch_size³`. Default: 50 million
    pub max_voxels: usize,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            patch_size: 120,
            percent_x: 0.5,
            percent_y: 0.5,
            percent_z: 0.45,
            percent_patch_size: 0.8,
            max_voxels: DEFAULT_MAX_VOXELS,
        }
    }
}

impl CompletionParams {
    /// Coarse grid for quick previews.
    pub fn preview() -> Self {
        Self {
            patch_size: 40,
            ..Default::default()
        }
    }

    /// Cloud centered on every axis.
    pub fn centered() -> Self {
        Self {
            percent_z: 0.5,
            ..Default::default()
        }
    }

    /// Set the grid dimension.
    pub fn with_patch_size(mut self, patch_size: usize) -> Self {
        self.patch_size = patch_size;
        self
    }

    /// Set the placement of the cloud center within the grid.
    pub fn with_placement(mut self, percent_x: f64, percent_y: f64, percent_z: f64) -> Self {
        self.percent_x = percent_x;
        self.percent_y = percent_y;
        self.percent_z = percent_z;
        self
    }

    /// Set the fraction of the grid the cloud spans.
    pub fn with_percent_patch_size(mut self, percent_patch_size: f64) -> Self {
        self.percent_patch_size = percent_patch_size;
        self
    }

    /// Set the voxel budget.
    pub fn with_max_voxels(mut self, max_voxels: usize) -> Self {
        self.max_voxels = max_voxels;
        self
    }

    /// Placement fractions as a vector.
    pub fn offset_fraction(&self) -> Vector3<f64> {
        Vector3::new(self.percent_x, self.percent_y, self.percent_z)
    }

    /// Check that every parameter is in range.
    pub fn validate(&self) -> CloudResult<()> {
        if self.patch_size == 0 {
            return Err(CloudError::invalid_parameter(
                "patch_size",
                self.patch_size,
                "must be positive",
            ));
        }
        if !(self.percent_patch_size.is_finite() && self.percent_patch_size > 0.0) {
            return Err(CloudError::invalid_parameter(
                "percent_patch_size",
                self.percent_patch_size,
                "must be a positive finite fraction",
            ));
        }
        for (name, value) in [
            ("percent_x", self.percent_x),
            ("percent_y", self.percent_y),
            ("percent_z", self.percent_z),
        ] {
            if !value.is_finite() {
                return Err(CloudError::invalid_parameter(name, value, "must be finite"));
            }
        }

        let total = self
            .patch_size
            .checked_mul(self.patch_size)
            .and_then(|n| n.checked_mul(self.patch_size));
        match total {
            Some(total) if total <= self.max_voxels => Ok(()),
            _ => Err(CloudError::GridTooLarge {
                patch_size: self.patch_size,
                total: total.unwrap_or(usize::MAX),
                max: self.max_voxels,
            }),
        }
    }

    /// Parse parameters from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load parameters from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> CloudResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CloudError::io_read(path, e))?;
        Self::from_toml(&contents).map_err(|e| CloudError::ConfigError {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// Serialize parameters to a TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// How a cloud is turned into a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMethod {
    /// Voxelize, run marching cubes, rescale.
    Partial,
    /// 2-D Delaunay on (x, y) with z reattached.
    FastTriangulation,
    /// Convex hull of the cloud.
    ConvexHull,
    /// Gaussian-process surface fit. Not implemented.
    GaussianProcess,
}

impl CompletionMethod {
    /// Short name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            CompletionMethod::Partial => "partial",
            CompletionMethod::FastTriangulation => "fast_triangulation",
            CompletionMethod::ConvexHull => "convex_hull",
            CompletionMethod::GaussianProcess => "gaussian_process",
        }
    }
}

impl std::fmt::Display for CompletionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a completion run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionStats {
    /// Method that produced the mesh.
    pub method: CompletionMethod,

    /// Points in the input cloud.
    pub input_points: usize,

    /// Voxel edge length (voxel methods only).
    pub resolution: Option<f64>,

    /// Bounding-box center of the cloud (voxel methods only).
    pub center: Option<[f64; 3]>,

    /// Grid-space offset of the center (voxel methods only).
    pub grid_offset: Option<[f64; 3]>,

    /// Voxelization counts (voxel methods only).
    pub voxelization: Option<VoxelizationStats>,

    /// Vertices in the output mesh.
    pub output_vertices: usize,

    /// Faces in the output mesh.
    pub output_faces: usize,
}

impl CompletionStats {
    fn for_mesh(method: CompletionMethod, input_points: usize, mesh: &Mesh) -> Self {
        Self {
            method,
            input_points,
            resolution: None,
            center: None,
            grid_offset: None,
            voxelization: None,
            output_vertices: mesh.vertex_count(),
            output_faces: mesh.face_count(),
        }
    }

    /// True when the run succeeded but produced no triangles.
    pub fn is_empty_result(&self) -> bool {
        self.output_faces == 0
    }

    /// Points dropped outside the occupancy grid.
    pub fn discarded_points(&self) -> usize {
        self.voxelization.map_or(0, |v| v.discarded())
    }
}

/// A completed mesh together with its statistics.
#[derive(Debug, Clone)]
pub struct CompletionOutput {
    /// World-space mesh.
    pub mesh: Mesh,
    /// How it was produced.
    pub stats: CompletionStats,
}

/// Voxel-based partial completion with a pluggable isosurface extractor.
#[derive(Debug, Clone)]
pub struct PartialCompletion<E = MarchingCubes> {
    params: CompletionParams,
    extractor: E,
}

impl PartialCompletion<MarchingCubes> {
    /// Partial completion with marching cubes.
    pub fn new(params: CompletionParams) -> Self {
        Self {
            params,
            extractor: MarchingCubes,
        }
    }
}

impl<E: IsosurfaceExtractor> PartialCompletion<E> {
    /// Swap in another isosurface extractor.
    pub fn with_extractor<F: IsosurfaceExtractor>(self, extractor: F) -> PartialCompletion<F> {
        PartialCompletion {
            params: self.params,
            extractor,
        }
    }

    /// Parameters in use.
    pub fn params(&self) -> &CompletionParams {
        &self.params
    }

    /// Complete one cloud.
    ///
    /// An empty occupancy grid is not an error: the returned mesh is empty
    /// and [`CompletionStats::is_empty_result`] reports it.
    pub fn run(&self, cloud: &PointCloud) -> CloudResult<CompletionOutput> {
        let _timer = OperationTimer::new("partial_completion");
        cloud.validate()?;

        let placement = GridPlacement::from_params(cloud, &self.params)?;

        let (grid, voxelization) = {
            let _timer = OperationTimer::new("voxelize");
            build_occupancy_grid(&cloud.points, &placement)
        };
        log_voxelization(&placement, &voxelization);

        let mut mesh = self.extractor.extract(&grid, OCCUPANCY_ISOVALUE);
        rescale_mesh(&mut mesh, &placement);
        log_mesh_stats(&mesh, "partial_completion");

        let mut stats = CompletionStats::for_mesh(CompletionMethod::Partial, cloud.len(), &mesh);
        stats.resolution = Some(placement.resolution);
        let (c, o) = (placement.center, placement.offset);
        stats.center = Some([c.x, c.y, c.z]);
        stats.grid_offset = Some([o.x, o.y, o.z]);
        stats.voxelization = Some(voxelization);

        info!(
            points = cloud.len(),
            resolution = placement.resolution,
            occupied_voxels = voxelization.occupied_voxels,
            vertices = stats.output_vertices,
            faces = stats.output_faces,
            "Partial completion complete"
        );

        Ok(CompletionOutput { mesh, stats })
    }
}

/// Run partial completion on `cloud` with marching cubes.
pub fn complete_partial(
    cloud: &PointCloud,
    params: &CompletionParams,
) -> CloudResult<CompletionOutput> {
    PartialCompletion::new(params.clone()).run(cloud)
}

/// Complete `cloud` with the given method.
///
/// `params` only affects [`CompletionMethod::Partial`].
pub fn complete(
    cloud: &PointCloud,
    method: CompletionMethod,
    params: &CompletionParams,
) -> CloudResult<CompletionOutput> {
    match method {
        CompletionMethod::Partial => complete_partial(cloud, params),
        CompletionMethod::FastTriangulation => {
            let mesh = fast_triangulate(cloud)?;
            let stats = CompletionStats::for_mesh(method, cloud.len(), &mesh);
            Ok(CompletionOutput { mesh, stats })
        }
        CompletionMethod::ConvexHull => {
            let mesh = convex_hull_mesh(cloud)?;
            let stats = CompletionStats::for_mesh(method, cloud.len(), &mesh);
            Ok(CompletionOutput { mesh, stats })
        }
        CompletionMethod::GaussianProcess => Err(CloudError::NotImplemented {
            method: "gaussian process",
            details: "the measurement model for the surface fit is not defined",
        }),
    }
}
