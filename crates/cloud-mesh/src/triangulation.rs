//! Fast triangulation: 2-D Delaunay on the (x, y) projection.
//!
//! The cloud is projected onto the xy-plane, triangulated, and each point
//! gets its original z back. Every input point becomes a vertex of the
//! output mesh, in input order, so face indices refer directly to the
//! cloud.
//!
//! The default [`Triangulator2d`] is [`BowyerWatson`], an incremental
//! insertion in lexicographic (x, y) order on exact `orient2d`/`incircle`
//! predicates from `robust`. The hull is closed off by triangles sharing a
//! symbolic vertex at infinity, so the output is the full Delaunay
//! triangulation and covers the convex hull of the input.

use hashbrown::{HashMap, HashSet};
use robust::{Coord, incircle, orient2d};
use tracing::{debug, info, warn};

use crate::error::{CloudError, CloudResult};
use crate::pointcloud::PointCloud;
use crate::tracing_ext::OperationTimer;
use crate::{Mesh, Vertex};

/// Strategy that triangulates a planar point set.
pub trait Triangulator2d {
    /// Triangulate `points`, returning counter-clockwise index triples into
    /// `points`.
    ///
    /// Fails with [`CloudError::TriangulationFailed`] when no triangle can
    /// be formed.
    fn triangulate(&self, points: &[[f64; 2]]) -> CloudResult<Vec<[u32; 3]>>;
}

/// Bowyer-Watson Delaunay triangulation.
///
/// Each point is inserted after every point that precedes it in (x, y)
/// order, so it always lies outside the current hull and the cavity search
/// can start from the hull edges of the previously inserted point.
///
/// Points that repeat an earlier (x, y) are skipped and end up unreferenced.
#[derive(Debug, Clone, Copy, Default)]
pub struct BowyerWatson;

/// The vertex at infinity shared by every hull triangle.
const GHOST: usize = usize::MAX;

/// Triangle soup with directed-edge adjacency.
///
/// Triangles are counter-clockwise. Hull triangles store [`GHOST`] last; the
/// edge `[a, b]` of a hull triangle has the outside of the hull on its left.
struct Triangulation<'a> {
    points: &'a [[f64; 2]],
    triangles: Vec<[usize; 3]>,
    alive: Vec<bool>,
    // Directed edge -> triangle that owns it
    edges: HashMap<(usize, usize), usize>,
}

impl<'a> Triangulation<'a> {
    fn new(points: &'a [[f64; 2]]) -> Self {
        Self {
            points,
            triangles: Vec::new(),
            alive: Vec::new(),
            edges: HashMap::new(),
        }
    }

    fn coord(&self, i: usize) -> Coord<f64> {
        Coord {
            x: self.points[i][0],
            y: self.points[i][1],
        }
    }

    fn add(&mut self, t: [usize; 3]) {
        let t = match t.iter().position(|&v| v == GHOST) {
            Some(0) => [t[1], t[2], t[0]],
            Some(1) => [t[2], t[0], t[1]],
            _ => t,
        };
        let index = self.triangles.len();
        for edge in directed_edges(t) {
            self.edges.insert(edge, index);
        }
        self.triangles.push(t);
        self.alive.push(true);
    }

    fn remove(&mut self, index: usize) {
        self.alive[index] = false;
        for edge in directed_edges(self.triangles[index]) {
            if self.edges.get(&edge) == Some(&index) {
                self.edges.remove(&edge);
            }
        }
    }

    /// Triangle across the edge `(a, b)` from the one that owns it.
    fn neighbor(&self, (a, b): (usize, usize)) -> Option<usize> {
        self.edges.get(&(b, a)).copied()
    }

    /// Whether `p` lies strictly inside the circumcircle of triangle `index`.
    ///
    /// For a hull triangle the circumcircle degenerates to the open half-plane
    /// outside its edge plus the open edge itself.
    fn in_conflict(&self, index: usize, p: usize) -> bool {
        let [a, b, c] = self.triangles[index];
        if c == GHOST {
            let side = orient2d(self.coord(a), self.coord(b), self.coord(p));
            if side != 0.0 {
                return side > 0.0;
            }
            let (lo, hi) = if self.points[a] < self.points[b] {
                (self.points[a], self.points[b])
            } else {
                (self.points[b], self.points[a])
            };
            return lo < self.points[p] && self.points[p] < hi;
        }
        incircle(self.coord(a), self.coord(b), self.coord(c), self.coord(p)) > 0.0
    }

    /// Fan the collinear run `chain` (sorted) to `apex` and close the hull.
    fn seed(&mut self, chain: &[usize], apex: usize) {
        let first = chain[0];
        let last = chain[chain.len() - 1];
        let apex_left =
            orient2d(self.coord(first), self.coord(last), self.coord(apex)) > 0.0;

        for pair in chain.windows(2) {
            if apex_left {
                self.add([pair[0], pair[1], apex]);
            } else {
                self.add([pair[1], pair[0], apex]);
            }
        }

        let hull_edges: Vec<(usize, usize)> = self
            .triangles
            .iter()
            .flat_map(|&t| directed_edges(t))
            .filter(|&(a, b)| !self.edges.contains_key(&(b, a)))
            .collect();
        for (a, b) in hull_edges {
            self.add([b, a, GHOST]);
        }
    }

    /// Insert `p`, which sorts after every point inserted so far.
    fn insert(&mut self, p: usize, previous: usize) -> CloudResult<()> {
        let start = [(previous, GHOST), (GHOST, previous)]
            .iter()
            .filter_map(|edge| self.edges.get(edge).copied())
            .find(|&t| self.in_conflict(t, p))
            .or_else(|| {
                (0..self.triangles.len()).find(|&t| self.alive[t] && self.in_conflict(t, p))
            });
        let Some(start) = start else {
            return Err(CloudError::triangulation_failed(format!(
                "point {} conflicts with no triangle",
                p
            )));
        };

        let mut cavity = HashSet::new();
        cavity.insert(start);
        let mut stack = vec![start];
        while let Some(t) = stack.pop() {
            for edge in directed_edges(self.triangles[t]) {
                if let Some(n) = self.neighbor(edge) {
                    if !cavity.contains(&n) && self.in_conflict(n, p) {
                        cavity.insert(n);
                        stack.push(n);
                    }
                }
            }
        }

        let mut boundary = Vec::new();
        for &t in &cavity {
            for edge in directed_edges(self.triangles[t]) {
                if !self.neighbor(edge).is_some_and(|n| cavity.contains(&n)) {
                    boundary.push(edge);
                }
            }
        }

        for &t in &cavity {
            self.remove(t);
        }
        for (a, b) in boundary {
            self.add([a, b, p]);
        }
        Ok(())
    }

    fn into_faces(self) -> Vec<[u32; 3]> {
        self.triangles
            .iter()
            .zip(&self.alive)
            .filter(|&(t, &alive)| alive && t[2] != GHOST)
            .map(|(t, _)| [t[0] as u32, t[1] as u32, t[2] as u32])
            .collect()
    }
}

fn directed_edges([a, b, c]: [usize; 3]) -> [(usize, usize); 3] {
    [(a, b), (b, c), (c, a)]
}

impl Triangulator2d for BowyerWatson {
    fn triangulate(&self, points: &[[f64; 2]]) -> CloudResult<Vec<[u32; 3]>> {
        let n = points.len();
        if n < 3 {
            return Err(CloudError::triangulation_failed(format!(
                "need at least 3 points, got {}",
                n
            )));
        }
        if let Some(i) = points.iter().position(|p| !(p[0].is_finite() && p[1].is_finite())) {
            return Err(CloudError::triangulation_failed(format!(
                "point {} has a non-finite coordinate",
                i
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            points[a][0]
                .total_cmp(&points[b][0])
                .then(points[a][1].total_cmp(&points[b][1]))
        });

        // Adding 0.0 folds -0.0 into 0.0
        let mut seen = HashSet::with_capacity(n);
        order.retain(|&i| {
            let [x, y] = points[i];
            seen.insert(((x + 0.0).to_bits(), (y + 0.0).to_bits()))
        });
        if order.len() < n {
            warn!(
                duplicates = n - order.len(),
                "Skipping points with repeated (x, y)"
            );
        }
        if order.len() < 3 {
            return Err(CloudError::triangulation_failed(format!(
                "need at least 3 distinct (x, y) positions, got {}",
                order.len()
            )));
        }

        let coord = |i: usize| Coord {
            x: points[i][0],
            y: points[i][1],
        };
        let Some(apex_pos) = (2..order.len())
            .find(|&k| orient2d(coord(order[0]), coord(order[1]), coord(order[k])) != 0.0)
        else {
            return Err(CloudError::triangulation_failed(
                "all points are collinear in (x, y)",
            ));
        };

        let mut tri = Triangulation::new(points);
        tri.seed(&order[..apex_pos], order[apex_pos]);

        let mut previous = order[apex_pos];
        for &p in &order[apex_pos + 1..] {
            tri.insert(p, previous)?;
            previous = p;
        }

        let faces = tri.into_faces();
        debug!(points = n, triangles = faces.len(), "Delaunay triangulation");
        Ok(faces)
    }
}

/// Triangulate the (x, y) projection of `cloud` with [`BowyerWatson`].
pub fn fast_triangulate(cloud: &PointCloud) -> CloudResult<Mesh> {
    fast_triangulate_with(cloud, &BowyerWatson)
}

/// Triangulate the (x, y) projection of `cloud` with a custom strategy.
pub fn fast_triangulate_with(
    cloud: &PointCloud,
    triangulator: &dyn Triangulator2d,
) -> CloudResult<Mesh> {
    let _timer = OperationTimer::new("fast_triangulation");
    cloud.validate()?;

    let projected: Vec<[f64; 2]> = cloud.points.iter().map(|p| [p.x, p.y]).collect();
    let faces = triangulator.triangulate(&projected)?;

    let mut mesh = Mesh::with_capacity(cloud.len(), faces.len());
    mesh.vertices
        .extend(cloud.points.iter().map(|&p| Vertex::new(p)));
    mesh.faces = faces;

    info!(
        points = cloud.len(),
        triangles = mesh.face_count(),
        "Fast triangulation complete"
    );
    Ok(mesh)
}
