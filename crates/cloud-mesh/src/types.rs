//! Core mesh data types.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};

/// A mesh vertex.
///
/// Coordinates are grid indices straight out of the isosurface extractor
/// and world units after rescaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,
}

impl Vertex {
    /// Create a new vertex at the given position.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A triangle mesh with indexed vertices and faces.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    /// Each face is [v0, v1, v2] with counter-clockwise winding.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh is empty.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let mut min = first;
        let mut max = first;

        for vertex in &self.vertices[1..] {
            let p = &vertex.position;
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }

    /// Translate mesh by the given vector.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale mesh uniformly around the origin.
    pub fn scale(&mut self, factor: f64) {
        for vertex in &mut self.vertices {
            vertex.position.coords *= factor;
        }
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Sum of signed tetrahedra formed by each face and the origin. For a
    /// closed mesh with outward-facing normals this is positive; for an open
    /// mesh the value is not a meaningful volume.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;

        for &[i0, i1, i2] in &self.faces {
            let v0 = &self.vertices[i0 as usize].position;
            let v1 = &self.vertices[i1 as usize].position;
            let v2 = &self.vertices[i2 as usize].position;

            volume += v0.coords.dot(&v1.coords.cross(&v2.coords));
        }

        volume / 6.0
    }

    /// Count how many faces use each undirected edge.
    pub fn edge_report(&self) -> EdgeReport {
        let mut uses: HashMap<(u32, u32), usize> = HashMap::with_capacity(self.faces.len() * 3 / 2);

        for &[a, b, c] in &self.faces {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                let key = if u < v { (u, v) } else { (v, u) };
                *uses.entry(key).or_insert(0) += 1;
            }
        }

        let mut report = EdgeReport {
            edge_count: uses.len(),
            ..EdgeReport::default()
        };
        for count in uses.values() {
            match count {
                1 => report.boundary_edge_count += 1,
                2 => {}
                _ => report.non_manifold_edge_count += 1,
            }
        }
        report
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Edge usage summary for a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeReport {
    /// Number of distinct undirected edges.
    pub edge_count: usize,

    /// Number of edges used by exactly one face.
    pub boundary_edge_count: usize,

    /// Number of edges used by more than two faces.
    pub non_manifold_edge_count: usize,
}

impl EdgeReport {
    /// True when every edge is shared by exactly two faces.
    ///
    /// A mesh with no edges is not considered watertight.
    pub fn is_watertight(&self) -> bool {
        self.edge_count > 0 && self.boundary_edge_count == 0 && self.non_manifold_edge_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
        // Outward winding
        mesh.faces.push([0, 2, 1]);
        mesh.faces.push([0, 1, 3]);
        mesh.faces.push([0, 3, 2]);
        mesh.faces.push([1, 2, 3]);
        mesh
    }

    #[test]
    fn test_bounds() {
        let mesh = tetrahedron();
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 1.0));
        assert!(Mesh::new().bounds().is_none());
    }

    #[test]
    fn test_signed_volume_outward() {
        let mesh = tetrahedron();
        let volume = mesh.signed_volume();
        assert!((volume - 1.0 / 6.0).abs() < 1e-12, "volume {}", volume);
    }

    #[test]
    fn test_translate_and_scale() {
        let mut mesh = tetrahedron();
        mesh.scale(2.0);
        mesh.translate(Vector3::new(1.0, 0.0, 0.0));
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Point3::new(1.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(3.0, 2.0, 2.0));
        assert!((mesh.signed_volume() - 8.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_edge_report_closed() {
        let report = tetrahedron().edge_report();
        assert_eq!(report.edge_count, 6);
        assert_eq!(report.boundary_edge_count, 0);
        assert!(report.is_watertight());
    }

    #[test]
    fn test_edge_report_open() {
        let mut mesh = tetrahedron();
        mesh.faces.pop();
        let report = mesh.edge_report();
        assert_eq!(report.boundary_edge_count, 3);
        assert_eq!(report.non_manifold_edge_count, 0);
        assert!(!report.is_watertight());
        assert!(!Mesh::new().edge_report().is_watertight());
    }
}
