//! Vane Core - scene geometry for the vane renderers.
//!
//! This crate provides:
//!
//! - **Geometry types**: `Vertex`, `Triangle` (with precomputed ray
//!   intersection coefficients), `Mesh`
//! - **Scene**: the flat triangle list the BVH is built over, plus lights
//! - **OBJ loading**: a thin `tobj` wrapper producing a `Mesh`
//!
//! # Example
//!
//! ```ignore
//! use vane_core::{load_obj, Scene};
//!
//! let mut mesh = load_obj("teapot.obj")?;
//! mesh.recenter_and_rescale(vane_core::MAX_COORD_AFTER_RESCALE);
//! let scene = Scene::from_mesh(&mesh, Color::new(0.8, 0.8, 0.8)).with_source("teapot.obj");
//! println!("Loaded {} triangles", scene.triangle_count());
//! ```

pub mod mesh;
pub mod obj;
pub mod scene;
pub mod triangle;

// Re-export commonly used types
pub use mesh::{Mesh, MAX_COORD_AFTER_RESCALE};
pub use obj::{load_obj, LoadError};
pub use scene::{Color, Light, Scene};
pub use triangle::{Triangle, Vertex};
