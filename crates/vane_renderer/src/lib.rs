//! vane renderer: SAH BVH and Whitted ray tracing over triangle scenes.
//!
//! The [`bvh`] module builds, caches and traverses the acceleration
//! structure; [`raytracer`] is its consumer, shading primary, shadow,
//! reflection and refraction rays bucket by bucket.

pub mod bvh;
mod bucket;
mod camera;
pub mod raytracer;

pub use bucket::{generate_buckets, render_bucket, Bucket, BucketResult, DEFAULT_BUCKET_SIZE};
pub use bvh::{update_bvh, BuildProgress, Bvh, BvhError, CacheError, Culling, Hit, NoProgress};
pub use camera::Camera;
pub use raytracer::{color_to_rgba, render, ImageBuffer, RenderConfig, Tracer};

/// Re-export math types from vane_math
pub use vane_math::{Aabb, Ray, Vec3};
