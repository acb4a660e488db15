//! Point cloud completion into triangle meshes.
//!
//! A partial scan of an object is turned into a closed surface by placing
//! it in a fixed-size occupancy grid, extracting the 0.5 isosurface with
//! marching cubes and mapping the mesh back to world coordinates. Two
//! cheaper alternatives are provided: a 2-D Delaunay triangulation of the
//! (x, y) projection and the convex hull.
//!
//! # Features
//!
//! - **File I/O**: load PCD (ASCII and binary), PLY and XYZ clouds, write PLY meshes
//! - **Voxel completion**: resolution from the cloud extent, configurable placement
//!   of the cloud in the grid, marching cubes at 0.5, world-space rescale
//! - **Fast triangulation**: Bowyer-Watson Delaunay on (x, y) with z reattached
//! - **Convex hull**: closed hull with outward normals
//! - **Batch processing**: per-file isolation, optional rayon parallelism
//!
//! # Coordinate System
//!
//! Output meshes are in the input cloud's units and frame. Face winding is
//! counter-clockwise when viewed from outside, so closed meshes have positive
//! signed volume.
//!
//! # Quick Start
//!
//! ```no_run
//! use cloud_mesh::{CompletionParams, PlyEncoding, PointCloud, complete_partial, save_ply};
//!
//! let cloud = PointCloud::load("scan.pcd").unwrap();
//! let params = CompletionParams::default().with_patch_size(80);
//!
//! let output = complete_partial(&cloud, &params).unwrap();
//! println!(
//!     "resolution {:.4}, {} faces",
//!     output.stats.resolution.unwrap_or_default(),
//!     output.stats.output_faces
//! );
//!
//! save_ply(&output.mesh, "scan_partial.ply", PlyEncoding::Ascii).unwrap();
//! ```
//!
//! ## Many files
//!
//! ```no_run
//! use cloud_mesh::{CompletionParams, batch::partial_completion};
//!
//! let report = partial_completion(&["a.pcd", "b.pcd"], &CompletionParams::default(), "_partial");
//! println!("{} ok, {} failed", report.succeeded(), report.failed());
//! ```
//!
//! # Error Handling
//!
//! Operations return `CloudResult<T>`, which is `Result<T, CloudError>`.
//! Every error carries an [`ErrorCode`] and a [`RecoverySuggestion`].
//!
//! ```
//! use cloud_mesh::{CloudError, PointCloud};
//!
//! match PointCloud::load("nonexistent.pcd") {
//!     Ok(_) => println!("Loaded successfully"),
//!     Err(CloudError::IoRead { path, source }) => {
//!         println!("Failed to read {:?}: {}", path, source);
//!     }
//!     Err(e) => println!("{}: {}", e.code(), e),
//! }
//! ```

mod error;
mod types;

pub mod batch;
pub mod completion;
pub mod geometry;
pub mod hull;
pub mod io;
pub mod isosurface;
pub mod pointcloud;
pub mod rescale;
pub mod tracing_ext;
pub mod triangulation;
pub mod voxel;

use std::path::Path;

// Re-export core types at crate root
pub use error::{CloudError, CloudResult, ErrorCategory, ErrorCode, RecoverySuggestion};
pub use types::{EdgeReport, Mesh, Vertex};

pub use batch::{BatchConfig, BatchReport, FileOutcome, output_path_for, run_batch};
pub use completion::{
    CompletionMethod, CompletionOutput, CompletionParams, CompletionStats, DEFAULT_MAX_VOXELS,
    PartialCompletion, complete, complete_partial,
};
pub use geometry::{BoundingBox, bounding_box, pointcloud_center, voxel_resolution};
pub use hull::convex_hull_mesh;
pub use io::{PlyEncoding, PointCloudFormat, load_ply_mesh, load_point_cloud, save_ply};
pub use isosurface::{IsosurfaceExtractor, MarchingCubes, OCCUPANCY_ISOVALUE, ScalarField};
pub use pointcloud::PointCloud;
pub use rescale::rescale_mesh;
pub use triangulation::{BowyerWatson, Triangulator2d, fast_triangulate};
pub use voxel::{GridPlacement, OccupancyGrid, VoxelizationStats, build_occupancy_grid};

// Re-export tracing extensions for structured logging and performance monitoring
pub use tracing_ext::{OperationTimer, log_mesh_stats, log_voxelization};

impl Mesh {
    /// Load a mesh from a PLY file.
    pub fn load(path: impl AsRef<Path>) -> CloudResult<Self> {
        io::load_ply_mesh(path)
    }

    /// Save the mesh as PLY.
    pub fn save(&self, path: impl AsRef<Path>, encoding: PlyEncoding) -> CloudResult<()> {
        io::save_ply(self, path, encoding)
    }
}
