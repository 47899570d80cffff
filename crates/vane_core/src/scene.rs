//! Scene representation consumed by the renderers.
//!
//! The scene owns one flat, randomly indexable triangle list. The BVH refers
//! to triangles purely by their offset in this list, so the list must not be
//! reordered or mutated once a BVH has been built (or cached) for it.

use std::path::{Path, PathBuf};

use vane_math::{Aabb, Vec3};

use crate::mesh::Mesh;
use crate::triangle::{Triangle, Vertex};

/// Linear RGB color, each channel nominally in 0-1.
pub type Color = Vec3;

/// A white point light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
}

impl Light {
    pub fn new(position: Vec3) -> Self {
        Self { position }
    }
}

/// A complete scene: vertices, triangles with intersection data, and lights.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Shared vertex pool
    pub vertices: Vec<Vertex>,

    /// Triangles, addressed by index from the BVH
    pub triangles: Vec<Triangle>,

    /// Point lights
    pub lights: Vec<Light>,

    /// File the scene was loaded from (keys the BVH cache)
    pub source: Option<PathBuf>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from a mesh, giving every triangle the same color.
    ///
    /// Normals are smoothed from the faces when the mesh doesn't carry
    /// per-vertex normals.
    pub fn from_mesh(mesh: &Mesh, color: Color) -> Self {
        let mut mesh = mesh.clone();
        mesh.ensure_normals();

        let normals = mesh.normals.unwrap_or_default();
        let vertices: Vec<Vertex> = mesh
            .positions
            .iter()
            .zip(normals.iter())
            .map(|(&p, &n)| Vertex::new(p, n))
            .collect();

        let mut triangles = Vec::with_capacity(mesh.indices.len() / 3);
        for face in mesh.indices.chunks_exact(3) {
            let indices = [face[0], face[1], face[2]];
            if indices.iter().any(|&i| i as usize >= vertices.len()) {
                log::warn!(
                    "Invalid triangle indices: {:?}, vertex count: {}",
                    indices,
                    vertices.len()
                );
                continue;
            }
            triangles.push(Triangle::new(&vertices, indices, color, false));
        }

        Self {
            vertices,
            triangles,
            lights: Vec::new(),
            source: None,
        }
    }

    /// Record the file this scene came from.
    pub fn with_source(mut self, path: impl AsRef<Path>) -> Self {
        self.source = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a point light.
    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    /// Append a triangle over existing vertices and return its index.
    pub fn add_triangle(&mut self, indices: [u32; 3], color: Color, two_sided: bool) -> u32 {
        let idx = self.triangles.len() as u32;
        self.triangles
            .push(Triangle::new(&self.vertices, indices, color, two_sided));
        idx
    }

    /// Append a vertex and return its index.
    pub fn add_vertex(&mut self, vertex: Vertex) -> u32 {
        let idx = self.vertices.len() as u32;
        self.vertices.push(vertex);
        idx
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Bounding box of every triangle.
    pub fn bounds(&self) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for tri in &self.triangles {
            bounds.grow(&tri.bounds());
        }
        bounds
    }
}
