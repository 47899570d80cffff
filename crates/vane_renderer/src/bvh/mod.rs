//! Bounding Volume Hierarchy over the scene's triangles.
//!
//! The hierarchy is built top-down with a surface area heuristic into a
//! boxed tree ([`BvhNode`]), then flattened into an array of fixed-size
//! [`CompactNode`]s plus a triangle index list. Only the flat form is kept:
//! it is what traversal walks, what the cache file stores, and it is
//! immutable, so any number of render threads can share one `&Bvh`.

mod build;
mod cache;
mod compact;
mod traverse;

pub use build::{
    build_tree, gather_items, BuildItem, BuildProgress, BvhNode, NoProgress, FLAT_AXIS_EPSILON,
    LEAF_THRESHOLD, SPLIT_GRID,
};
pub use cache::{cache_path, load, save, update_bvh, CacheError};
pub use compact::{compact, CompactNode, NodeKind, LEAF_COUNT_MASK, LEAF_FLAG};
pub use traverse::{Culling, Hit, NUDGE_FACTOR};

use std::time::Instant;

use thiserror::Error;
use vane_core::Triangle;

/// Capacity of the traversal stack, and therefore the deepest tree allowed.
pub const BVH_STACK_SIZE: usize = 32;

/// Errors raised while building or validating a BVH.
///
/// None of these are recoverable by retrying: they signal either unusable
/// input or a broken invariant in the construction itself.
#[derive(Error, Debug)]
pub enum BvhError {
    #[error("Cannot build a BVH over an empty scene")]
    EmptyScene,

    #[error("BVH depth {depth} exceeds the traversal stack ({limit}); raise BVH_STACK_SIZE")]
    DepthExceeded { depth: usize, limit: usize },

    #[error("BVH compaction mismatch: {0}")]
    CompactionMismatch(String),

    #[error("Leaf holds {0} triangles, more than a 31-bit count can encode")]
    LeafOverflow(usize),

    #[error("Scene has {0} triangles, more than a BVH can index")]
    TooManyTriangles(usize),

    #[error("Invalid BVH: {0}")]
    Invalid(String),
}

/// Compacted BVH: flat node array (root at index 0) and the triangle index
/// list the leaves point into.
#[derive(Debug, Clone, PartialEq)]
pub struct Bvh {
    nodes: Vec<CompactNode>,
    triangle_indices: Vec<u32>,
}

impl Bvh {
    /// Build a BVH over `triangles`, reporting progress along the way.
    pub fn build(triangles: &[Triangle], progress: &mut dyn BuildProgress) -> Result<Self, BvhError> {
        if triangles.is_empty() {
            return Err(BvhError::EmptyScene);
        }
        if triangles.len() > LEAF_COUNT_MASK as usize {
            return Err(BvhError::TooManyTriangles(triangles.len()));
        }

        let start = Instant::now();
        let tree = build_tree(gather_items(triangles), progress);
        log::debug!("SAH build finished in {:.2?}", start.elapsed());

        let bvh = compact(&tree)?;
        log::info!(
            "Built BVH over {} triangles in {:.2?}: {} nodes, depth {}",
            triangles.len(),
            start.elapsed(),
            bvh.node_count(),
            bvh.depth()
        );
        Ok(bvh)
    }

    /// Assemble a BVH from raw parts. Callers are expected to `validate` it.
    pub(crate) fn from_parts(nodes: Vec<CompactNode>, triangle_indices: Vec<u32>) -> Self {
        Self {
            nodes,
            triangle_indices,
        }
    }

    pub fn nodes(&self) -> &[CompactNode] {
        &self.nodes
    }

    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangle_indices
    }

    /// The root node.
    pub fn root(&self) -> &CompactNode {
        &self.nodes[0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the triangle index list.
    pub fn triangle_count(&self) -> usize {
        self.triangle_indices.len()
    }

    /// Depth of the deepest node, the root being at depth 0.
    ///
    /// Only meaningful on a BVH that passed `validate` (or came out of
    /// `build`); child indices are followed without cycle detection.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(0u32, 0usize)];
        while let Some((index, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            if let Some(NodeKind::Inner { left, right }) = self.nodes.get(index as usize).map(|n| n.kind()) {
                pending.push((left, depth + 1));
                pending.push((right, depth + 1));
            }
        }
        deepest
    }

    /// Check the structure against a scene of `triangle_count` triangles.
    ///
    /// Verifies that every child index is in range, that the nodes form a
    /// tree reaching every array slot exactly once, that the tree fits the
    /// traversal stack, that the leaf ranges tile the index list without
    /// overlap, and that the index list is a permutation of
    /// `0..triangle_count`.
    pub fn validate(&self, triangle_count: usize) -> Result<(), BvhError> {
        if self.nodes.is_empty() {
            return Err(BvhError::Invalid("no nodes".into()));
        }
        if self.triangle_indices.len() != triangle_count {
            return Err(BvhError::Invalid(format!(
                "index list has {} entries, scene has {} triangles",
                self.triangle_indices.len(),
                triangle_count
            )));
        }

        let mut visited = vec![false; self.nodes.len()];
        let mut covered = vec![false; self.triangle_indices.len()];
        let mut leaf_total = 0usize;
        let mut visits = 0usize;
        let mut pending = vec![(0u32, 0usize)];
        visited[0] = true;

        while let Some((index, depth)) = pending.pop() {
            visits += 1;
            if depth >= BVH_STACK_SIZE {
                return Err(BvhError::DepthExceeded {
                    depth,
                    limit: BVH_STACK_SIZE,
                });
            }

            match self.nodes[index as usize].kind() {
                NodeKind::Inner { left, right } => {
                    for child in [left, right] {
                        if child == index {
                            return Err(BvhError::Invalid(format!("node {} is its own child", index)));
                        }
                        let seen = visited.get_mut(child as usize).ok_or_else(|| {
                            BvhError::Invalid(format!(
                                "node {} points at {}, past the end of {} nodes",
                                index,
                                child,
                                self.nodes.len()
                            ))
                        })?;
                        if *seen {
                            return Err(BvhError::Invalid(format!(
                                "node {} is reachable twice",
                                child
                            )));
                        }
                        *seen = true;
                        pending.push((child, depth + 1));
                    }
                }
                NodeKind::Leaf { start, count } => {
                    let end = start as usize + count as usize;
                    if end > self.triangle_indices.len() {
                        return Err(BvhError::Invalid(format!(
                            "leaf {} covers {}..{}, index list has {} entries",
                            index,
                            start,
                            end,
                            self.triangle_indices.len()
                        )));
                    }
                    if let Some(slot) = covered[start as usize..end].iter().position(|&c| c) {
                        return Err(BvhError::Invalid(format!(
                            "leaf {} overlaps another leaf at index slot {}",
                            index,
                            start as usize + slot
                        )));
                    }
                    covered[start as usize..end].fill(true);
                    leaf_total += count as usize;
                }
            }
        }

        if leaf_total != self.triangle_indices.len() {
            return Err(BvhError::Invalid(format!(
                "leaves cover {} of {} index slots",
                leaf_total,
                self.triangle_indices.len()
            )));
        }

        if visits != self.nodes.len() {
            return Err(BvhError::Invalid(format!(
                "{} of {} nodes reachable from the root",
                visits,
                self.nodes.len()
            )));
        }

        let mut seen = vec![false; triangle_count];
        for &t in &self.triangle_indices {
            match seen.get_mut(t as usize) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => return Err(BvhError::Invalid(format!("triangle {} listed twice", t))),
                None => return Err(BvhError::Invalid(format!("triangle {} out of range", t))),
            }
        }

        Ok(())
    }
}
