//! Max-coverage octree color quantization.
//!
//! Every unique color is inserted into an octree eight levels deep, so that each leaf initially
//! holds exactly one color. Leaves are then folded into their parents from the deepest level upwards,
//! always merging the node covering the fewest pixels first, until no more than the requested number
//! of leaves remain. The colors covering the most pixels therefore keep their own leaves
//! the longest. Each remaining leaf is represented by the pixel-weighted mean of its colors.
//!
//! This is the fastest of the provided strategies but usually has a higher error than
//! [`kmeans`](crate::kmeans) or [`median_cut`](crate::median_cut).

// Reference: M. Gervautz and W. Purgathofer, A simple method for color quantization:
// octree quantization, New Trends in Computer Graphics, 219–231, 1988.
// https://doi.org/10.1007/978-3-642-83492-9_20

use crate::{traits::squared_distance, IndexedColorCounts, PaletteSize, QuantizeOutput};
use palette::Srgb;

/// The depth of the tree, one level per bit of an 8-bit component.
const DEPTH: u8 = 8;

/// Marks a node that is not (or no longer) a leaf of the tree.
const NO_SLOT: u32 = u32::MAX;

/// A node of the octree. Its statistics cover every color in its subtree.
#[derive(Debug, Clone, Default)]
struct Node {
    /// Child node ids, where `0` means there is no child (the root is never a child).
    children: [u32; 8],
    /// The number of pixels in the subtree.
    count: u64,
    /// The pixel-weighted component sums of the subtree.
    sum: [u64; 3],
    /// The depth of this node, `0` being the root.
    level: u8,
}

impl Node {
    /// Whether this node has no children.
    fn is_leaf(&self) -> bool {
        self.children.iter().all(|&c| c == 0)
    }

    /// The pixel-weighted mean color of the subtree, rounded to 8 bits.
    #[allow(clippy::cast_possible_truncation)]
    fn mean(&self) -> Srgb<u8> {
        let n = self.count;
        let [r, g, b] = self.sum.map(|s| ((s + n / 2) / n) as u8);
        Srgb::new(r, g, b)
    }
}

/// The child slot of `color` below a node at `level`.
#[inline]
fn child_index(color: [u8; 3], level: u8) -> usize {
    let shift = DEPTH - 1 - level;
    let [r, g, b] = color.map(|c| usize::from((c >> shift) & 1));
    (r << 2) | (g << 1) | b
}

/// An arena-allocated octree over the unique colors of an image.
struct Octree {
    /// The nodes, with the root at index `0`.
    ///
    /// Merged subtrees stay in the arena but are no longer reachable from the root.
    nodes: Vec<Node>,
    /// The number of leaves reachable from the root.
    leaves: usize,
}

impl Octree {
    /// Builds a full-depth tree with one leaf per unique color.
    fn new(colors: &[[u8; 3]], counts: &[u32]) -> Self {
        let mut nodes = vec![Node::default()];

        for (&color, &n) in colors.iter().zip(counts) {
            let n = u64::from(n);
            let mut id = 0;
            for level in 0..=DEPTH {
                let node = &mut nodes[id];
                node.count += n;
                for (sum, c) in node.sum.iter_mut().zip(color) {
                    *sum += n * u64::from(c);
                }

                if level == DEPTH {
                    break;
                }

                let slot = child_index(color, level);
                id = match nodes[id].children[slot] {
                    0 => {
                        let child = nodes.len();
                        nodes.push(Node { level: level + 1, ..Node::default() });
                        #[allow(clippy::cast_possible_truncation)]
                        {
                            nodes[id].children[slot] = child as u32;
                        }
                        child
                    }
                    child => child as usize,
                };
            }
        }

        Self { nodes, leaves: colors.len() }
    }

    /// The number of leaves in the subtree rooted at `id`.
    fn leaf_count(&self, id: usize) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                count += 1;
            } else {
                stack.extend(node.children.iter().filter(|&&c| c != 0).map(|&c| c as usize));
            }
        }
        count
    }

    /// Merges subtrees, deepest and least covering first, until at most `k` leaves remain.
    ///
    /// A merge that would leave fewer than `k` leaves is skipped, so the tree may still hold
    /// slightly more than `k` leaves afterwards.
    fn reduce(&mut self, k: usize) {
        for level in (0..DEPTH).rev() {
            if self.leaves <= k {
                break;
            }

            let mut candidates = (0..self.nodes.len())
                .filter(|&i| self.nodes[i].level == level && !self.nodes[i].is_leaf())
                .collect::<Vec<_>>();

            candidates.sort_by_key(|&i| (self.nodes[i].count, i));

            for i in candidates {
                if self.leaves <= k {
                    break;
                }

                let removed = self.leaf_count(i) - 1;
                if self.leaves - removed >= k {
                    self.nodes[i].children = [0; 8];
                    self.leaves -= removed;
                }
            }
        }
    }

    /// The ids of the leaves reachable from the root.
    fn leaf_ids(&self) -> Vec<usize> {
        let mut leaves = Vec::with_capacity(self.leaves);
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                leaves.push(id);
            } else {
                stack.extend(node.children.iter().filter(|&&c| c != 0).map(|&c| c as usize));
            }
        }
        leaves
    }

    /// The id of the leaf that `color` falls into.
    fn find_leaf(&self, color: [u8; 3]) -> usize {
        let mut id = 0;
        for level in 0..DEPTH {
            let node = &self.nodes[id];
            if node.is_leaf() {
                break;
            }
            id = node.children[child_index(color, level)] as usize;
        }
        id
    }
}

/// Computes a palette of at most `palette_size` colors with a max-coverage octree.
///
/// If there are no more unique colors than `palette_size`, the unique colors are returned as is.
/// Otherwise, the palette is sorted by the number of pixels each color covers, in descending order.
/// If the tree could not be reduced to exactly `palette_size` leaves, only the most covering leaves
/// are kept and the colors of the others are mapped to the nearest kept color.
#[must_use]
pub fn indexed_palette(colors: &IndexedColorCounts, palette_size: PaletteSize) -> QuantizeOutput {
    let k = palette_size.as_usize();
    if colors.len() <= k {
        return QuantizeOutput::trivial(colors.colors());
    }

    let components = colors.color_components();
    let mut tree = Octree::new(&components, colors.counts());
    tree.reduce(k);

    let mut leaves = tree.leaf_ids();
    leaves.sort_by_key(|&id| (std::cmp::Reverse(tree.nodes[id].count), id));

    if leaves.len() > k {
        tracing::trace!(leaves = leaves.len(), k, "octree overshot, dropping least covering leaves");
    }

    let palette = leaves.iter().take(k).map(|&id| tree.nodes[id].mean()).collect::<Vec<_>>();

    let mut slots = vec![NO_SLOT; tree.nodes.len()];
    #[allow(clippy::cast_possible_truncation)]
    for (slot, &id) in leaves.iter().enumerate() {
        slots[id] = if slot < k {
            slot as u32
        } else {
            let mean = tree.nodes[id].mean();
            palette
                .iter()
                .enumerate()
                .min_by_key(|&(_, &p)| squared_distance(p, mean))
                .map_or(0, |(i, _)| i as u32)
        };
    }

    #[allow(clippy::cast_possible_truncation)]
    let indices = components
        .iter()
        .map(|&color| {
            let slot = slots[tree.find_leaf(color)];
            debug_assert_ne!(slot, NO_SLOT);
            slot as u8
        })
        .collect();

    QuantizeOutput { palette, indices }
}
