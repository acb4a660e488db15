//! Table-driven marching cubes.

use hashbrown::HashMap;
use nalgebra::Point3;
use tracing::debug;

use super::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};
use super::{IsosurfaceExtractor, ScalarField};
use crate::tracing_ext::OperationTimer;
use crate::{Mesh, Vertex};

/// Classic marching cubes over every cell of the lattice.
///
/// Vertices on a cube edge shared by neighbouring cells are emitted once, so
/// a closed isosurface gives a watertight indexed mesh.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarchingCubes;

impl MarchingCubes {
    /// Create the extractor.
    pub fn new() -> Self {
        Self
    }
}

impl IsosurfaceExtractor for MarchingCubes {
    fn extract(&self, field: &dyn ScalarField, isovalue: f64) -> Mesh {
        let _timer = OperationTimer::new("marching_cubes");
        let [nx, ny, nz] = field.dims();
        let mut mesh = Mesh::new();

        if nx < 2 || ny < 2 || nz < 2 {
            return mesh;
        }

        // Global edge key -> vertex index
        let mut edge_vertices: HashMap<(usize, usize), u32> = HashMap::new();

        for z in 0..nz - 1 {
            for y in 0..ny - 1 {
                for x in 0..nx - 1 {
                    let mut corners = [[0usize; 3]; 8];
                    let mut values = [0.0f64; 8];
                    let mut cube_index = 0usize;

                    for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
                        corners[i] = [x + offset[0], y + offset[1], z + offset[2]];
                        values[i] = field.value(corners[i][0], corners[i][1], corners[i][2]);
                        if values[i] < isovalue {
                            cube_index |= 1 << i;
                        }
                    }

                    let edges = EDGE_TABLE[cube_index];
                    if edges == 0 {
                        continue;
                    }

                    let mut cube_vertices = [0u32; 12];
                    for (e, &[c0, c1]) in EDGE_CONNECTIONS.iter().enumerate() {
                        if edges & (1 << e) == 0 {
                            continue;
                        }
                        let key = edge_key(corners[c0], corners[c1], nx, ny);
                        cube_vertices[e] = *edge_vertices.entry(key).or_insert_with(|| {
                            let position = interpolate(
                                corners[c0],
                                corners[c1],
                                values[c0],
                                values[c1],
                                isovalue,
                            );
                            mesh.vertices.push(Vertex::new(position));
                            (mesh.vertices.len() - 1) as u32
                        });
                    }

                    for tri in TRI_TABLE[cube_index].chunks_exact(3) {
                        if tri[0] < 0 {
                            break;
                        }
                        mesh.faces.push([
                            cube_vertices[tri[0] as usize],
                            cube_vertices[tri[1] as usize],
                            cube_vertices[tri[2] as usize],
                        ]);
                    }
                }
            }
        }

        debug!(
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            isovalue,
            "Marching cubes finished"
        );

        mesh
    }
}

/// Identify a lattice edge by its lower corner and axis.
fn edge_key(a: [usize; 3], b: [usize; 3], nx: usize, ny: usize) -> (usize, usize) {
    let lower = if a <= b { a } else { b };
    let axis = if a[0] != b[0] {
        0
    } else if a[1] != b[1] {
        1
    } else {
        2
    };
    (lower[0] + lower[1] * nx + lower[2] * nx * ny, axis)
}

fn interpolate(a: [usize; 3], b: [usize; 3], va: f64, vb: f64, isovalue: f64) -> Point3<f64> {
    let pa = Point3::new(a[0] as f64, a[1] as f64, a[2] as f64);
    let pb = Point3::new(b[0] as f64, b[1] as f64, b[2] as f64);

    let denom = vb - va;
    let t = if denom.abs() < 1e-12 {
        0.5
    } else {
        ((isovalue - va) / denom).clamp(0.0, 1.0)
    };

    pa + (pb - pa) * t
}
