//! Triangle primitive with precomputed ray intersection data.
//!
//! Intersection uses the plane + three edge-planes formulation: a ray hits
//! the triangle when it crosses the supporting plane at a point that lies on
//! the inner side of all three edge planes. Everything that does not depend
//! on the ray is computed once here, at load time.

use vane_math::{Aabb, Vec3};

use crate::scene::Color;

/// A mesh vertex with its (smoothed) normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self { position, normal }
    }
}

/// A scene triangle. Immutable once the scene is built.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Indices of A, B, C into the scene's vertex list
    pub vertices: [u32; 3],
    /// Average of the three vertices
    pub center: Vec3,
    /// Unit plane normal
    pub normal: Vec3,
    /// Plane distance: `normal . A`
    pub d: f32,
    /// Unit normals of the planes through AB, BC and CA, pointing inwards
    pub edges: [Vec3; 3],
    /// Edge plane distances
    pub edge_d: [f32; 3],
    /// Min corner of the bounding box
    pub bottom: Vec3,
    /// Max corner of the bounding box
    pub top: Vec3,
    /// Two-sided triangles are never backface culled
    pub two_sided: bool,
    /// Surface color (linear, 0-1)
    pub color: Color,
}

impl Triangle {
    /// Create a triangle over three entries of `vertices`.
    ///
    /// Degenerate triangles (zero area) end up with a zero normal, which
    /// makes every ray parallel to them as far as intersection is concerned.
    pub fn new(vertices: &[Vertex], indices: [u32; 3], color: Color, two_sided: bool) -> Self {
        let a = vertices[indices[0] as usize].position;
        let b = vertices[indices[1] as usize].position;
        let c = vertices[indices[2] as usize].position;

        // Edge vectors
        let vc1 = b - a;
        let vc2 = c - b;
        let vc3 = a - c;

        // Plane of the triangle: the longest of the three cross products is
        // the most accurate one for slivers
        let mut normal = vc1.cross(vc2);
        let alt1 = vc2.cross(vc3);
        if alt1.length() > normal.length() {
            normal = alt1;
        }
        let alt2 = vc3.cross(vc1);
        if alt2.length() > normal.length() {
            normal = alt2;
        }
        let normal = normal.normalize_or_zero();
        let d = normal.dot(a);

        // Edge planes
        let e1 = normal.cross(vc1).normalize_or_zero();
        let e2 = normal.cross(vc2).normalize_or_zero();
        let e3 = normal.cross(vc3).normalize_or_zero();

        Self {
            vertices: indices,
            center: (a + b + c) / 3.0,
            normal,
            d,
            edges: [e1, e2, e3],
            edge_d: [e1.dot(a), e2.dot(b), e3.dot(c)],
            bottom: a.min(b).min(c),
            top: a.max(b).max(c),
            two_sided,
            color,
        }
    }

    /// Bounding box of the triangle.
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.bottom, self.top)
    }

    /// Centroid of the bounding box (not of the triangle), used for BVH splits.
    #[inline]
    pub fn bounds_center(&self) -> Vec3 {
        (self.bottom + self.top) * 0.5
    }

    /// Signed distances of `p` from the three edge planes.
    ///
    /// All three are non-negative exactly when `p` (assumed on the plane)
    /// lies inside the triangle.
    #[inline]
    pub fn edge_distances(&self, p: Vec3) -> [f32; 3] {
        [
            self.edges[0].dot(p) - self.edge_d[0],
            self.edges[1].dot(p) - self.edge_d[1],
            self.edges[2].dot(p) - self.edge_d[2],
        ]
    }
}
