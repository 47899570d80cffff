use crate::{Ray, Vec3};

/// Axis-Aligned Bounding Box used by the BVH.
///
/// Stored as its two extreme corners: `bottom` (min x, min y, min z) and
/// `top` (max x, max y, max z). Boxes are kept tight; nothing is padded, so
/// a flat triangle produces a box with zero extent on one axis.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub bottom: Vec3,
    pub top: Vec3,
}

impl Aabb {
    /// An inverted box that grows to exactly the first thing merged into it.
    pub const EMPTY: Aabb = Aabb {
        bottom: Vec3::MAX,
        top: Vec3::MIN,
    };

    /// Create a box from its corners.
    pub fn new(bottom: Vec3, top: Vec3) -> Self {
        Self { bottom, top }
    }

    /// Create an AABB from two arbitrary corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            bottom: a.min(b),
            top: a.max(b),
        }
    }

    /// Grow this box to also enclose `other`.
    #[inline]
    pub fn grow(&mut self, other: &Aabb) {
        self.bottom = self.bottom.min(other.bottom);
        self.top = self.top.max(other.top);
    }

    /// Grow this box to also enclose a point.
    #[inline]
    pub fn grow_point(&mut self, p: Vec3) {
        self.bottom = self.bottom.min(p);
        self.top = self.top.max(p);
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            bottom: box0.bottom.min(box1.bottom),
            top: box0.top.max(box1.top),
        }
    }

    /// Per-axis size of the box.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.top - self.bottom
    }

    /// Half the surface area: `sx*sy + sy*sz + sz*sx`.
    ///
    /// The SAH only compares costs against each other, so the factor of two
    /// is dropped.
    #[inline]
    pub fn half_area(&self) -> f32 {
        let s = self.extent();
        s.x * s.y + s.y * s.z + s.z * s.x
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.bottom + self.top) * 0.5
    }

    /// True when `other` lies fully inside this box (boundaries included).
    pub fn contains(&self, other: &Aabb) -> bool {
        other.bottom.cmpge(self.bottom).all() && other.top.cmple(self.top).all()
    }

    /// Slab test: does the ray (as a half-line from its origin) cross the box?
    ///
    /// Axes are processed one at a time and the test bails out on the first
    /// axis that rules the box out. A zero direction component means the ray
    /// is parallel to that pair of planes, so only the origin is checked.
    #[inline]
    pub fn hit(&self, ray: &Ray) -> bool {
        let origin = ray.origin.to_array();
        let dir = ray.direction.to_array();
        let bottom = self.bottom.to_array();
        let top = self.top.to_array();

        let mut t_near = f32::MIN;
        let mut t_far = f32::MAX;

        for i in 0..3 {
            if dir[i] == 0.0 {
                if origin[i] < bottom[i] || origin[i] > top[i] {
                    return false;
                }
            } else {
                let mut t1 = (bottom[i] - origin[i]) / dir[i];
                let mut t2 = (top[i] - origin[i]) / dir[i];
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                if t1 > t_near {
                    t_near = t1;
                }
                if t2 < t_far {
                    t_far = t2;
                }
                if t_near > t_far || t_far < 0.0 {
                    return false;
                }
            }
        }

        true
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));

        assert_eq!(aabb.bottom, Vec3::ZERO);
        assert_eq!(aabb.top, Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_surrounding() {
        let box1 = Aabb::from_points(Vec3::ZERO, Vec3::new(5.0, 5.0, 5.0));
        let box2 = Aabb::from_points(Vec3::new(3.0, 3.0, 3.0), Vec3::new(10.0, 10.0, 10.0));
        let surrounding = Aabb::surrounding(&box1, &box2);

        assert_eq!(surrounding.bottom.x, 0.0);
        assert_eq!(surrounding.top.x, 10.0);
        assert!(surrounding.contains(&box1));
        assert!(surrounding.contains(&box2));
        assert!(!box1.contains(&box2));
    }

    #[test]
    fn test_empty_grows_to_first_box() {
        let mut aabb = Aabb::EMPTY;

        let b = Aabb::from_points(Vec3::new(-1.0, 2.0, 3.0), Vec3::new(1.0, 4.0, 3.0));
        aabb.grow(&b);
        assert_eq!(aabb, b);
    }

    #[test]
    fn test_half_area() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        // 1*2 + 2*3 + 3*1
        assert_eq!(aabb.half_area(), 11.0);

        // Flat boxes still have area on the remaining face
        let flat = Aabb::from_points(Vec3::ZERO, Vec3::new(2.0, 2.0, 0.0));
        assert_eq!(flat.half_area(), 4.0);
    }

    #[test]
    fn test_aabb_hit() {
        let aabb = Aabb::from_points(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        // Ray pointing at center
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(aabb.hit(&ray));

        // Ray pointing away
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(!aabb.hit(&ray));

        // Axis-parallel ray outside the x slab
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(!aabb.hit(&ray));

        // Diagonal miss
        let ray = Ray::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(!aabb.hit(&ray));

        // Origin inside the box always hits
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.3, -0.2, 0.9));
        assert!(aabb.hit(&ray));
    }

    #[test]
    fn test_flat_box_hit() {
        // Zero thickness along z, like the box of a single z=1 triangle
        let aabb = Aabb::from_points(Vec3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 1.0, 1.0));

        let ray = Ray::new(Vec3::new(0.2, 0.2, 0.0), Vec3::Z);
        assert!(aabb.hit(&ray));

        let ray = Ray::new(Vec3::new(0.2, 0.2, 0.0), -Vec3::Z);
        assert!(!aabb.hit(&ray));
    }

    #[test]
    fn test_aabb_centroid() {
        let aabb = Aabb::from_points(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(aabb.centroid(), Vec3::new(5.0, 5.0, 5.0));
    }
}
