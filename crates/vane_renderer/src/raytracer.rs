//! Whitted-style recursive ray tracer.
//!
//! Every hit is shaded with ambient, diffuse and specular terms per light,
//! shadow rays decide whether a light is visible, and reflection and
//! refraction rays recurse up to `max_ray_depth`. All ray queries go
//! through the shared BVH.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use vane_core::{Color, Scene, Triangle};
use vane_math::{Ray, Vec3};

use crate::bucket::{generate_buckets, render_bucket, BucketResult, DEFAULT_BUCKET_SIZE};
use crate::bvh::{Bvh, Culling, Hit};
use crate::Camera;

/// Render configuration.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Rays deeper than this contribute nothing (primary rays are depth 0)
    pub max_ray_depth: u32,
    /// Cast shadow rays towards every light
    pub shadows: bool,
    /// Trace mirror reflections
    pub reflections: bool,
    /// Weight of the reflected color
    pub reflection_rate: f32,
    /// Trace refractions through every surface
    pub refractions: bool,
    /// Weight of the refracted color
    pub refraction_rate: f32,
    /// Interpolate vertex normals across triangles instead of using the face normal
    pub phong_normals: bool,
    /// Ambient factor applied to the surface color
    pub ambient: f32,
    /// Peak diffuse factor
    pub diffuse: f32,
    /// Peak specular intensity
    pub specular: f32,
    /// Color of rays that hit nothing
    pub background: Color,
    /// Bucket edge length in pixels
    pub bucket_size: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_ray_depth: 3,
            shadows: true,
            reflections: true,
            reflection_rate: 0.375,
            refractions: false,
            refraction_rate: 0.58,
            phong_normals: true,
            ambient: 96.0 / 255.0,
            diffuse: 128.0 / 255.0,
            specular: 192.0 / 255.0,
            background: Color::ZERO,
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }
}

impl RenderConfig {
    pub fn with_max_ray_depth(mut self, depth: u32) -> Self {
        self.max_ray_depth = depth;
        self
    }

    pub fn with_shadows(mut self, enabled: bool) -> Self {
        self.shadows = enabled;
        self
    }

    pub fn with_reflections(mut self, enabled: bool) -> Self {
        self.reflections = enabled;
        self
    }

    pub fn with_refractions(mut self, enabled: bool) -> Self {
        self.refractions = enabled;
        self
    }

    pub fn with_bucket_size(mut self, size: u32) -> Self {
        self.bucket_size = size;
        self
    }
}

/// Everything a ray needs to be traced, shared read-only by all workers.
#[derive(Clone, Copy)]
pub struct Tracer<'a> {
    scene: &'a Scene,
    bvh: &'a Bvh,
    config: &'a RenderConfig,
    eye: Vec3,
}

impl<'a> Tracer<'a> {
    /// `eye` is used for the specular half vector.
    pub fn new(scene: &'a Scene, bvh: &'a Bvh, config: &'a RenderConfig, eye: Vec3) -> Self {
        Self {
            scene,
            bvh,
            config,
            eye,
        }
    }

    /// Trace a camera ray. Primary rays cull back faces.
    pub fn trace_primary(&self, ray: &Ray) -> Color {
        self.trace(ray, None, 0, Culling::Backfaces)
    }

    /// Color seen along `ray`, ignoring the triangle it starts from.
    pub fn trace(&self, ray: &Ray, exclude: Option<u32>, depth: u32, culling: Culling) -> Color {
        if depth >= self.config.max_ray_depth {
            return Color::ZERO;
        }

        let Some(hit) = self
            .bvh
            .closest_hit(&self.scene.triangles, ray, exclude, culling)
        else {
            return self.config.background;
        };

        let triangle = &self.scene.triangles[hit.triangle as usize];
        let normal = if self.config.phong_normals {
            self.phong_normal(triangle, &hit)
        } else {
            triangle.normal
        };

        let mut color = triangle.color * self.config.ambient;

        for light in &self.scene.lights {
            let to_light = light.position - hit.point;

            if self.config.shadows {
                let shadow_ray = Ray::new(hit.point, to_light.normalize_or_zero());
                if self.bvh.occluded(
                    &self.scene.triangles,
                    &shadow_ray,
                    light.position,
                    Some(hit.triangle),
                    culling,
                ) {
                    continue;
                }
            }

            let to_light = to_light.normalize_or_zero();
            let intensity = normal.dot(to_light);
            if intensity < 0.0 {
                continue;
            }
            color += triangle.color * (self.config.diffuse * intensity);

            // Blinn specular, exponent 32
            let to_eye = (self.eye - hit.point).normalize_or_zero();
            let half = (to_light + to_eye).normalize_or_zero();
            let intensity = half.dot(normal);
            if intensity > 0.0 {
                color += Color::splat(self.config.specular * intensity.powi(32));
            }
        }

        let c1 = -ray.direction.dot(normal);

        if self.config.reflections {
            let reflected = (ray.direction + normal * (2.0 * c1)).normalize_or_zero();
            color += self.trace(
                &Ray::new(hit.point, reflected),
                Some(hit.triangle),
                depth + 1,
                Culling::Backfaces,
            ) * self.config.reflection_rate;
        }

        if self.config.refractions {
            // Two media, swapped at every level
            let n1 = 1.0 + (depth & 1) as f32;
            let n2 = 2.0 + (depth & 1) as f32;
            let n = n1 / n2;
            let k = 1.0 - n * n * (1.0 - c1 * c1);
            if k >= 0.0 {
                let refracted = (ray.direction * n + normal * (n * c1 - k.sqrt())).normalize_or_zero();
                color += self.trace(
                    &Ray::new(hit.point, refracted),
                    Some(hit.triangle),
                    depth + 1,
                    Culling::Disabled,
                ) * self.config.refraction_rate;
            }
        }

        color
    }

    /// Interpolate the vertex normals at the hit point.
    ///
    /// Each vertex normal is weighted by the area of the sub-triangle
    /// opposite it, which the edge distances give directly.
    fn phong_normal(&self, triangle: &Triangle, hit: &Hit) -> Vec3 {
        let [a, b, c] = triangle.vertices.map(|i| &self.scene.vertices[i as usize]);

        let area = (b.position - a.position)
            .cross(c.position - b.position)
            .length();
        if area == 0.0 {
            return triangle.normal;
        }

        let [k_ab, k_bc, k_ca] = hit.edge_distances;
        let ab = k_ab * a.position.distance(b.position);
        let bc = k_bc * b.position.distance(c.position);
        let ca = k_ca * c.position.distance(a.position);

        let normal = a.normal * (bc / area) + b.normal * (ca / area) + c.normal * (ab / area);
        let normal = normal.normalize_or_zero();
        if normal == Vec3::ZERO {
            triangle.normal
        } else {
            normal
        }
    }
}

/// Rendered image in linear color.
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; pixel_count(width, height)],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[y as usize * self.width as usize + x as usize] = color;
    }

    /// Copy a finished bucket into place.
    pub fn write_bucket(&mut self, result: &BucketResult) {
        let bucket = &result.bucket;
        for (i, color) in result.pixels.iter().enumerate() {
            let i = i as u32;
            self.set(bucket.x + i % bucket.width, bucket.y + i / bucket.width, *color);
        }
    }

    /// Convert to RGBA bytes, clamping every channel to [0, 1].
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(*color));
        }
        bytes
    }

    /// Save as an image file; the format follows the extension.
    pub fn save(&self, path: &Path) -> image::ImageResult<()> {
        image::save_buffer(
            path,
            &self.to_rgba(),
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )
    }
}

/// Number of pixels in a `width` x `height` image, counted in `usize` so
/// large resolutions don't wrap.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let c = color.clamp(Color::ZERO, Color::ONE) * 255.0;
    [c.x as u8, c.y as u8, c.z as u8, 255]
}

/// Render the scene through `camera`, buckets in parallel.
pub fn render(scene: &Scene, bvh: &Bvh, camera: &Camera, config: &RenderConfig) -> ImageBuffer {
    let start = Instant::now();
    let tracer = Tracer::new(scene, bvh, config, camera.eye());
    let buckets = generate_buckets(camera.image_width, camera.image_height, config.bucket_size);

    let results: Vec<BucketResult> = buckets
        .par_iter()
        .map(|bucket| BucketResult::new(*bucket, render_bucket(bucket, camera, &tracer)))
        .collect();

    let mut image = ImageBuffer::new(camera.image_width, camera.image_height);
    for result in &results {
        image.write_bucket(result);
    }

    log::info!(
        "Rendered {}x{} in {} buckets, {:.2?}",
        camera.image_width,
        camera.image_height,
        results.len(),
        start.elapsed()
    );
    image
}
