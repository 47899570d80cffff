//! Wavefront OBJ loading.
//!
//! Every model in the file is merged into a single `Mesh`. Faces are
//! triangulated by `tobj`; normals are kept only when the file supplies one
//! per vertex.

use std::path::Path;

use thiserror::Error;
use vane_math::Vec3;

use crate::mesh::Mesh;

/// Errors that can occur while loading a mesh file.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("No geometry found in {0}")]
    NoGeometry(String),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Load an OBJ file into one merged mesh.
pub fn load_obj<P: AsRef<Path>>(path: P) -> LoadResult<Mesh> {
    let path = path.as_ref();
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )?;

    if models.is_empty() {
        return Err(LoadError::NoGeometry(path.display().to_string()));
    }

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut indices = Vec::new();
    let mut all_have_normals = true;

    for model in &models {
        let mesh = &model.mesh;
        let base = positions.len() as u32;

        positions.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2])),
        );

        if mesh.normals.len() == mesh.positions.len() {
            normals.extend(
                mesh.normals
                    .chunks_exact(3)
                    .map(|n| Vec3::new(n[0], n[1], n[2])),
            );
        } else {
            all_have_normals = false;
        }

        indices.extend(mesh.indices.iter().map(|&i| base + i));
    }

    log::info!(
        "Loaded {}: {} models, {} vertices, {} triangles",
        path.display(),
        models.len(),
        positions.len(),
        indices.len() / 3
    );

    let normals = if all_have_normals { Some(normals) } else { None };
    Ok(Mesh::new(positions, indices, normals))
}
