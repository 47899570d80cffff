// Re-export glam for convenience
pub use glam::*;

// Vane math types
mod aabb;
mod ray;
pub use aabb::Aabb;
pub use ray::Ray;

/// Component of `v` along axis `n` (0=X, 1=Y, 2=Z).
#[inline]
pub fn axis(v: Vec3, n: usize) -> f32 {
    match n {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}
