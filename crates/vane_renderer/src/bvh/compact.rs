//! Flattening of the BVH tree into an index-addressed node array.

use bytemuck::{Pod, Zeroable};
use vane_math::{Aabb, Vec3};

use super::build::BvhNode;
use super::{Bvh, BvhError, BVH_STACK_SIZE};

/// Top bit of a leaf's first word marks the node as a leaf.
pub const LEAF_FLAG: u32 = 0x8000_0000;

/// Leaf triangle counts live in the remaining 31 bits.
pub const LEAF_COUNT_MASK: u32 = !LEAF_FLAG;

/// Fixed-size, array-resident BVH node (32 bytes).
///
/// Inner nodes store the array indices of their children in `word0` and
/// `word1`. Leaves store `LEAF_FLAG | count` in `word0` and the offset of
/// their first entry in the triangle index list in `word1`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CompactNode {
    pub bottom: [f32; 3],
    pub top: [f32; 3],
    pub word0: u32,
    pub word1: u32,
}

/// Decoded payload of a [`CompactNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Inner { left: u32, right: u32 },
    Leaf { start: u32, count: u32 },
}

impl CompactNode {
    pub fn inner(bounds: &Aabb, left: u32, right: u32) -> Self {
        Self {
            bottom: bounds.bottom.to_array(),
            top: bounds.top.to_array(),
            word0: left,
            word1: right,
        }
    }

    /// `count` must fit in 31 bits.
    pub fn leaf(bounds: &Aabb, start: u32, count: u32) -> Self {
        debug_assert!(count <= LEAF_COUNT_MASK);
        Self {
            bottom: bounds.bottom.to_array(),
            top: bounds.top.to_array(),
            word0: LEAF_FLAG | count,
            word1: start,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.word0 & LEAF_FLAG != 0
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        if self.is_leaf() {
            NodeKind::Leaf {
                start: self.word1,
                count: self.word0 & LEAF_COUNT_MASK,
            }
        } else {
            NodeKind::Inner {
                left: self.word0,
                right: self.word1,
            }
        }
    }

    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::from_array(self.bottom), Vec3::from_array(self.top))
    }
}

/// Flatten a BVH tree, pre-order, into a [`Bvh`].
///
/// Each node gets the next free slot before its children do, so the left
/// child of an inner node always sits right after it.
pub fn compact(root: &BvhNode) -> Result<Bvh, BvhError> {
    let node_total = root.node_count();
    let triangle_total = root.triangle_count();

    if triangle_total > u32::MAX as usize || node_total > u32::MAX as usize {
        return Err(BvhError::TooManyTriangles(triangle_total));
    }

    let mut compactor = Compactor {
        nodes: vec![CompactNode::zeroed(); node_total],
        triangle_indices: Vec::with_capacity(triangle_total),
        next: 0,
        max_depth: 0,
    };
    compactor.place(root, 0)?;

    let Compactor {
        nodes,
        triangle_indices,
        next,
        max_depth,
    } = compactor;

    if next != node_total {
        return Err(BvhError::CompactionMismatch(format!(
            "placed {} nodes, tree has {}",
            next, node_total
        )));
    }

    let leaf_total: usize = nodes
        .iter()
        .filter_map(|n| match n.kind() {
            NodeKind::Leaf { count, .. } => Some(count as usize),
            NodeKind::Inner { .. } => None,
        })
        .sum();
    if leaf_total != triangle_indices.len() || triangle_indices.len() != triangle_total {
        return Err(BvhError::CompactionMismatch(format!(
            "leaves hold {} triangles, index list has {}, tree has {}",
            leaf_total,
            triangle_indices.len(),
            triangle_total
        )));
    }

    if max_depth >= BVH_STACK_SIZE {
        return Err(BvhError::DepthExceeded {
            depth: max_depth,
            limit: BVH_STACK_SIZE,
        });
    }

    Ok(Bvh::from_parts(nodes, triangle_indices))
}

struct Compactor {
    nodes: Vec<CompactNode>,
    triangle_indices: Vec<u32>,
    next: usize,
    max_depth: usize,
}

impl Compactor {
    /// Reserve a slot for `node`, fill its subtree, and return the slot.
    fn place(&mut self, node: &BvhNode, depth: usize) -> Result<u32, BvhError> {
        let slot = self.next;
        if slot >= self.nodes.len() {
            return Err(BvhError::CompactionMismatch(format!(
                "node array sized for {} nodes overflowed",
                self.nodes.len()
            )));
        }
        self.next += 1;
        self.max_depth = self.max_depth.max(depth);

        self.nodes[slot] = match node {
            BvhNode::Inner {
                bounds,
                left,
                right,
            } => {
                let left = self.place(left, depth + 1)?;
                let right = self.place(right, depth + 1)?;
                CompactNode::inner(bounds, left, right)
            }
            BvhNode::Leaf { bounds, triangles } => {
                if triangles.len() > LEAF_COUNT_MASK as usize {
                    return Err(BvhError::LeafOverflow(triangles.len()));
                }
                let start = self.triangle_indices.len() as u32;
                self.triangle_indices.extend_from_slice(triangles);
                CompactNode::leaf(bounds, start, triangles.len() as u32)
            }
        };

        Ok(slot as u32)
    }
}
