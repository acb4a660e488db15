//! Tracing extensions for completion stages.
//!
//! The library never installs a subscriber. Applications choose one, for
//! example:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=cloud_mesh=debug for per-stage detail
//! ```
//!
//! # Targets
//!
//! - `cloud_mesh::timing`: stage start (DEBUG) and duration (INFO)
//! - `cloud_mesh::mesh_state`: mesh sizes and extents
//! - `cloud_mesh::voxelization`: grid placement and discard counts

use std::time::Instant;
use tracing::span::EnteredSpan;
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::voxel::{GridPlacement, VoxelizationStats};

/// A performance timer that logs duration on drop.
///
/// The timer enters a `cloud_operation` span for its lifetime, so events
/// logged by the stage carry the operation name.
///
/// ```rust,ignore
/// use cloud_mesh::tracing_ext::OperationTimer;
///
/// fn voxelize() {
///     let _timer = OperationTimer::new("voxelize");
///     // ... do work ...
/// } // logs elapsed time here
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    _span: EnteredSpan,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("cloud_operation", operation = name).entered();
        debug!(target: "cloud_mesh::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            _span: span,
        }
    }

    /// Get the elapsed time.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        info!(
            target: "cloud_mesh::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", elapsed_ms),
            "Operation completed"
        );
    }
}

/// Log mesh statistics at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let (min_bounds, max_bounds) = mesh.bounds().unwrap_or_default();
    let dims = max_bounds - min_bounds;

    debug!(
        target: "cloud_mesh::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.3} x {:.3} x {:.3}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log the grid placement and what voxelization kept.
///
/// Discarded points are logged at INFO, an empty grid at WARN.
pub fn log_voxelization(placement: &GridPlacement, stats: &VoxelizationStats) {
    debug!(
        target: "cloud_mesh::voxelization",
        resolution = placement.resolution,
        patch_size = placement.patch_size,
        center = format!(
            "({:.4}, {:.4}, {:.4})",
            placement.center.x, placement.center.y, placement.center.z
        ),
        offset = format!(
            "({:.2}, {:.2}, {:.2})",
            placement.offset.x, placement.offset.y, placement.offset.z
        ),
        "Grid placement"
    );

    if stats.occupied_voxels == 0 {
        warn!(
            target: "cloud_mesh::voxelization",
            total_points = stats.total_points,
            "Occupancy grid is empty, completion yields an empty mesh"
        );
    } else if stats.discarded() > 0 {
        info!(
            target: "cloud_mesh::voxelization",
            kept = stats.kept_points,
            discarded_below = stats.discarded_below,
            discarded_above = stats.discarded_above,
            occupied_voxels = stats.occupied_voxels,
            "Dropped points outside the grid"
        );
    } else {
        debug!(
            target: "cloud_mesh::voxelization",
            kept = stats.kept_points,
            occupied_voxels = stats.occupied_voxels,
            "Voxelized cloud"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_operation_timer() {
        let timer = OperationTimer::new("test_operation");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_operation_timer_enters_span() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let outer = OperationTimer::new("outer");
            let inner = OperationTimer::new("inner");
            let current = tracing::Span::current();
            assert_eq!(current.metadata().map(|m| m.name()), Some("cloud_operation"));
            drop(inner);
            drop(outer);
            assert!(tracing::Span::current().is_none());
        });
    }

    #[test]
    fn test_log_helpers() {
        // Just verify they don't panic
        log_mesh_stats(&Mesh::new(), "test");
        let placement = GridPlacement::new(Point3::origin(), 1.0, 8, Vector3::new(0.5, 0.5, 0.5));
        log_voxelization(&placement, &VoxelizationStats::default());
    }
}
