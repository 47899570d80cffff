//! Top-down SAH construction of the pointer-based BVH tree.
//!
//! Each level samples candidate split planes on a uniform grid along every
//! axis, partitions the work set by bounding-box centers, and keeps the
//! candidate with the lowest surface-area-weighted cost. The grid gets
//! coarser with depth (1024 samples at the root, 512 one level down, ...),
//! which bounds total construction time.

use vane_core::Triangle;
use vane_math::{axis, Aabb, Vec3};

/// Work sets smaller than this become leaves without a split search.
pub const LEAF_THRESHOLD: usize = 4;

/// Number of candidate split planes per axis at the root.
pub const SPLIT_GRID: f32 = 1024.0;

/// Axes whose extent is below this are considered flat and never split.
pub const FLAT_AXIS_EPSILON: f32 = 1e-4;

/// Per-triangle record used only while building.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildItem {
    /// Min corner of the triangle's box
    pub bottom: Vec3,
    /// Max corner of the triangle's box
    pub top: Vec3,
    /// Center of the box, used to decide the side of a split
    pub center: Vec3,
    /// Offset of the triangle in the scene's triangle list
    pub triangle: u32,
}

impl BuildItem {
    /// Gather the build record of one scene triangle.
    pub fn from_triangle(index: u32, triangle: &Triangle) -> Self {
        Self {
            bottom: triangle.bottom,
            top: triangle.top,
            center: triangle.bounds_center(),
            triangle: index,
        }
    }

    #[inline]
    fn bounds(&self) -> Aabb {
        Aabb::new(self.bottom, self.top)
    }
}

/// BVH node in tree form. Each node owns its subtree outright.
#[derive(Debug, Clone, PartialEq)]
pub enum BvhNode {
    /// Internal node with two children.
    Inner {
        bounds: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
    /// Leaf node listing triangle offsets, in build order.
    Leaf { bounds: Aabb, triangles: Vec<u32> },
}

impl BvhNode {
    pub fn bounds(&self) -> &Aabb {
        match self {
            BvhNode::Inner { bounds, .. } | BvhNode::Leaf { bounds, .. } => bounds,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }

    /// Total number of nodes in this subtree, this one included.
    pub fn node_count(&self) -> usize {
        match self {
            BvhNode::Inner { left, right, .. } => 1 + left.node_count() + right.node_count(),
            BvhNode::Leaf { .. } => 1,
        }
    }

    /// Total number of triangle references held by the leaves of this subtree.
    pub fn triangle_count(&self) -> usize {
        match self {
            BvhNode::Inner { left, right, .. } => left.triangle_count() + right.triangle_count(),
            BvhNode::Leaf { triangles, .. } => triangles.len(),
        }
    }

    /// Depth of the deepest node below this one (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        match self {
            BvhNode::Inner { left, right, .. } => 1 + left.depth().max(right.depth()),
            BvhNode::Leaf { .. } => 0,
        }
    }
}

/// Receives construction progress as a fraction in `[0, 1]`.
pub trait BuildProgress {
    fn on_progress(&mut self, fraction: f64);
}

impl<F: FnMut(f64)> BuildProgress for F {
    fn on_progress(&mut self, fraction: f64) {
        self(fraction)
    }
}

/// Progress sink that ignores every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl BuildProgress for NoProgress {
    fn on_progress(&mut self, _fraction: f64) {}
}

/// Collect the build records for every scene triangle.
pub fn gather_items(triangles: &[Triangle]) -> Vec<BuildItem> {
    triangles
        .iter()
        .enumerate()
        .map(|(i, tri)| BuildItem::from_triangle(i as u32, tri))
        .collect()
}

/// Build a BVH tree over a non-empty work set.
///
/// The caller guarantees `items` is not empty; `Bvh::build` rejects empty
/// scenes before getting here.
pub fn build_tree(items: Vec<BuildItem>, progress: &mut dyn BuildProgress) -> BvhNode {
    let mut builder = Builder {
        progress,
        total: items.len(),
        placed: 0,
        last_percent: 0,
    };
    let root = builder.recurse(items, 0);
    builder.progress.on_progress(1.0);
    root
}

struct Builder<'p> {
    progress: &'p mut dyn BuildProgress,
    total: usize,
    placed: usize,
    last_percent: u32,
}

/// The winning candidate of a split search.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Split {
    axis: usize,
    value: f32,
}

impl Builder<'_> {
    fn recurse(&mut self, work: Vec<BuildItem>, depth: usize) -> BvhNode {
        if work.len() < LEAF_THRESHOLD {
            return self.leaf(work);
        }

        let bounds = union_of(&work);
        match find_split(&work, &bounds, depth) {
            None => self.leaf(work),
            Some(split) => {
                let (left, right): (Vec<BuildItem>, Vec<BuildItem>) = work
                    .into_iter()
                    .partition(|item| axis(item.center, split.axis) < split.value);

                let left = self.recurse(left, depth + 1);
                let right = self.recurse(right, depth + 1);

                BvhNode::Inner {
                    bounds: Aabb::surrounding(left.bounds(), right.bounds()),
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        }
    }

    fn leaf(&mut self, work: Vec<BuildItem>) -> BvhNode {
        let bounds = union_of(&work);
        self.placed += work.len();
        self.report();

        BvhNode::Leaf {
            bounds,
            triangles: work.into_iter().map(|item| item.triangle).collect(),
        }
    }

    /// Report whenever another whole percent of the triangles is placed.
    fn report(&mut self) {
        if self.total == 0 {
            return;
        }
        let percent = (self.placed * 100 / self.total) as u32;
        if percent > self.last_percent {
            self.last_percent = percent;
            self.progress
                .on_progress(self.placed as f64 / self.total as f64);
        }
    }
}

fn union_of(work: &[BuildItem]) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for item in work {
        bounds.grow(&item.bounds());
    }
    bounds
}

/// Search all three axes for the split with the lowest SAH cost.
///
/// Returns `None` when no candidate beats keeping everything in one leaf,
/// including the case where every axis is flat.
fn find_split(work: &[BuildItem], bounds: &Aabb, depth: usize) -> Option<Split> {
    let mut min_cost = work.len() as f32 * bounds.half_area();
    let mut best = None;

    for ax in 0..3 {
        let start = axis(bounds.bottom, ax);
        let stop = axis(bounds.top, ax);

        if (stop - start).abs() < FLAT_AXIS_EPSILON {
            continue;
        }

        // Sampling grid: 1024 planes at depth 0, 512 at depth 1, etc.
        let step = (stop - start) / (SPLIT_GRID / (depth as f32 + 1.0));

        let mut test_split = start + step;
        while test_split < stop - step {
            if let Some(cost) = split_cost(work, ax, test_split) {
                if cost < min_cost {
                    min_cost = cost;
                    best = Some(Split {
                        axis: ax,
                        value: test_split,
                    });
                }
            }

            let next = test_split + step;
            if next <= test_split {
                // step vanished against a huge coordinate
                break;
            }
            test_split = next;
        }
    }

    best
}

/// SAH cost of splitting at `value` on `ax`, or `None` for a degenerate
/// partition (one side holding at most one item).
fn split_cost(work: &[BuildItem], ax: usize, value: f32) -> Option<f32> {
    let mut left = Aabb::EMPTY;
    let mut right = Aabb::EMPTY;
    let mut count_left = 0usize;
    let mut count_right = 0usize;

    for item in work {
        if axis(item.center, ax) < value {
            left.grow(&item.bounds());
            count_left += 1;
        } else {
            right.grow(&item.bounds());
            count_right += 1;
        }
    }

    if count_left <= 1 || count_right <= 1 {
        return None;
    }

    Some(left.half_area() * count_left as f32 + right.half_area() * count_right as f32)
}
