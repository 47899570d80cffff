//! Mesh geometry as it comes out of a loader.
//!
//! A `Mesh` is plain indexed geometry. It is turned into a `Scene` (with
//! precomputed triangles) once any centering and rescaling is done, since
//! the triangle intersection data depends on final vertex positions.

use vane_math::{Aabb, Vec3};

/// Models are rescaled so that their largest coordinate magnitude is this.
pub const MAX_COORD_AFTER_RESCALE: f32 = 1.2;

/// A mesh consisting of vertex positions, optional normals, and triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional - smoothed from faces when missing)
    pub normals: Option<Vec<Vec3>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    ///
    /// If normals are not provided, they will NOT be automatically computed.
    /// Call `compute_normals()` explicitly if you need them.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            normals,
            indices,
            bounds,
        }
    }

    /// Compute axis-aligned bounding box from positions.
    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for pos in positions {
            bounds.grow_point(*pos);
        }
        bounds
    }

    /// Compute smooth vertex normals by averaging face normals.
    ///
    /// Faces are counter-clockwise: the face normal is `AB x AC`.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let i0 = face[0] as usize;
            let i1 = face[1] as usize;
            let i2 = face[2] as usize;

            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0)
                .cross(self.positions[i2] - p0)
                .normalize_or_zero();

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            let len = normal.length();
            if len > 0.0 {
                *normal /= len;
            } else {
                *normal = Vec3::Y; // Default up normal for unreferenced vertices
            }
        }

        self.normals = Some(normals);
    }

    /// Check if the mesh has normals.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Ensure the mesh has one normal per vertex, computing them if necessary.
    pub fn ensure_normals(&mut self) {
        let should_compute = match &self.normals {
            None => true,
            Some(normals) => normals.len() != self.positions.len(),
        };

        if should_compute {
            if let Some(normals) = &self.normals {
                log::debug!(
                    "Normals array length ({}) doesn't match vertex count ({}), computing smooth normals",
                    normals.len(),
                    self.positions.len()
                );
            }
            self.compute_normals();
        }
    }

    /// Move the mesh so its bounding box is centered at the origin, then scale
    /// it uniformly so the largest coordinate magnitude equals `max_coord`.
    pub fn recenter_and_rescale(&mut self, max_coord: f32) {
        if self.positions.is_empty() {
            return;
        }

        let center = self.bounds.centroid();
        for pos in &mut self.positions {
            *pos -= center;
        }

        let max_abs = self
            .positions
            .iter()
            .fold(0.0f32, |acc, p| acc.max(p.abs().max_element()));
        if max_abs > 0.0 {
            let scale = max_coord / max_abs;
            for pos in &mut self.positions {
                *pos *= scale;
            }
        }

        self.bounds = Self::compute_bounds(&self.positions);
    }

    /// Get the mesh center (center of bounding box).
    pub fn center(&self) -> Vec3 {
        self.bounds.centroid()
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}
