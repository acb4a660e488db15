//! Map an extracted mesh from grid-index space back to world space.

use crate::Mesh;
use crate::voxel::GridPlacement;

/// Rescale every vertex of `mesh` from grid space to world space in place.
///
/// Applies `v * resolution - offset * resolution + center`, the inverse of
/// the mapping used to build the occupancy grid. Faces are untouched.
pub fn rescale_mesh(mesh: &mut Mesh, placement: &GridPlacement) {
    for vertex in &mut mesh.vertices {
        vertex.position = placement.to_world(&vertex.position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_rescale_inverts_forward_map() {
        let placement = GridPlacement::new(
            Point3::new(10.0, -4.0, 2.5),
            0.25,
            40,
            Vector3::new(0.5, 0.5, 0.45),
        );
        let world = [
            Point3::new(10.0, -4.0, 2.5),
            Point3::new(12.3, -1.1, 0.0),
            Point3::new(7.9, -6.0, 5.1),
        ];

        let mut mesh = Mesh::new();
        for p in &world {
            mesh.vertices.push(Vertex::new(Point3::from(placement.to_grid(p))));
        }
        mesh.faces.push([0, 1, 2]);

        rescale_mesh(&mut mesh, &placement);

        for (v, p) in mesh.vertices.iter().zip(&world) {
            assert!((v.position - p).norm() < 1e-9);
        }
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_grid_center_maps_to_cloud_center() {
        let placement = GridPlacement::new(
            Point3::new(1.0, 2.0, 3.0),
            0.5,
            20,
            Vector3::new(0.5, 0.5, 0.45),
        );
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(10.0, 10.0, 9.0));
        rescale_mesh(&mut mesh, &placement);
        assert!((mesh.vertices[0].position - Point3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
    }

    #[test]
    fn test_empty_mesh() {
        let placement = GridPlacement::new(Point3::origin(), 1.0, 4, Vector3::new(0.5, 0.5, 0.5));
        let mut mesh = Mesh::new();
        rescale_mesh(&mut mesh, &placement);
        assert!(mesh.is_empty());
    }
}
