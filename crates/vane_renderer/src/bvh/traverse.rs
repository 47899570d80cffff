//! Stack-based ray traversal of the compacted BVH.

use vane_core::Triangle;
use vane_math::{Ray, Vec3};

use super::{Bvh, NodeKind, BVH_STACK_SIZE};

/// Hits closer than this along the ray are treated as self-intersections.
pub const NUDGE_FACTOR: f32 = 1e-5;

/// Whether single-sided triangles facing away from the ray origin are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Culling {
    Backfaces,
    Disabled,
}

/// Closest intersection found along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Offset of the triangle in the scene's triangle list
    pub triangle: u32,
    /// World-space intersection point
    pub point: Vec3,
    /// Squared distance from the ray origin to `point`
    pub distance_sq: f32,
    /// Signed distances of `point` from the triangle's three edge planes
    pub edge_distances: [f32; 3],
}

impl Bvh {
    /// Find the closest triangle hit by `ray`, skipping `exclude`.
    pub fn closest_hit(
        &self,
        triangles: &[Triangle],
        ray: &Ray,
        exclude: Option<u32>,
        culling: Culling,
    ) -> Option<Hit> {
        match culling {
            Culling::Backfaces => self.walk::<false, true>(triangles, ray, exclude, f32::MAX),
            Culling::Disabled => self.walk::<false, false>(triangles, ray, exclude, f32::MAX),
        }
    }

    /// True if any triangle hit by `ray` lies strictly closer to the ray
    /// origin than `light` does. Stops at the first such triangle.
    pub fn occluded(
        &self,
        triangles: &[Triangle],
        ray: &Ray,
        light: Vec3,
        exclude: Option<u32>,
        culling: Culling,
    ) -> bool {
        let limit_sq = ray.origin.distance_squared(light);
        let hit = match culling {
            Culling::Backfaces => self.walk::<true, true>(triangles, ray, exclude, limit_sq),
            Culling::Disabled => self.walk::<true, false>(triangles, ray, exclude, limit_sq),
        };
        hit.is_some()
    }

    fn walk<const STOP_AT_FIRST_HIT: bool, const CULL: bool>(
        &self,
        triangles: &[Triangle],
        ray: &Ray,
        exclude: Option<u32>,
        limit_sq: f32,
    ) -> Option<Hit> {
        let mut best: Option<Hit> = None;
        let mut best_distance_sq = f32::MAX;

        let mut stack = [0u32; BVH_STACK_SIZE];
        let mut top = 1usize;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];

            if !node.bounds().hit(ray) {
                continue;
            }

            match node.kind() {
                NodeKind::Inner { left, right } => {
                    // Left is popped first
                    stack[top] = right;
                    stack[top + 1] = left;
                    top += 2;
                }
                NodeKind::Leaf { start, count } => {
                    let range = start as usize..start as usize + count as usize;
                    for &index in &self.triangle_indices[range] {
                        if exclude == Some(index) {
                            continue;
                        }
                        let triangle = &triangles[index as usize];

                        if CULL
                            && !triangle.two_sided
                            && (ray.origin - triangle.center).dot(triangle.normal) < 0.0
                        {
                            continue;
                        }

                        let Some((point, edge_distances)) = intersect(triangle, ray) else {
                            continue;
                        };
                        let distance_sq = ray.origin.distance_squared(point);

                        if STOP_AT_FIRST_HIT {
                            if distance_sq < limit_sq {
                                return Some(Hit {
                                    triangle: index,
                                    point,
                                    distance_sq,
                                    edge_distances,
                                });
                            }
                        } else if distance_sq < best_distance_sq {
                            best_distance_sq = distance_sq;
                            best = Some(Hit {
                                triangle: index,
                                point,
                                distance_sq,
                                edge_distances,
                            });
                        }
                    }
                }
            }
        }

        best
    }
}

/// Ray against the triangle's plane, then the hit point against its three
/// edge planes.
#[inline]
fn intersect(triangle: &Triangle, ray: &Ray) -> Option<(Vec3, [f32; 3])> {
    let k = triangle.normal.dot(ray.direction);
    if k == 0.0 {
        return None;
    }

    let s = (triangle.d - triangle.normal.dot(ray.origin)) / k;
    if s <= NUDGE_FACTOR {
        return None;
    }

    let point = ray.at(s);
    let edge_distances = triangle.edge_distances(point);
    if edge_distances.iter().all(|&e| e >= 0.0) {
        Some((point, edge_distances))
    } else {
        None
    }
}
