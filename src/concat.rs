//! Concatenation of two trees.
//!
//! Both operands arrive as roots only, the left tail having been folded into its root by
//! the caller. The taller operand descends its boundary child until the shifts match, then
//! the boundary children are merged level by level on the way back up. At each level the
//! children of the left operand (except its last), the merged center, and the children of
//! the right operand (except its first) are redistributed so that at most two nodes are
//! short of full, which bounds the search degradation concatenation can introduce.

use crate::node::{Internal, Leaf, NodeRef};
use crate::pos::InnerPos;
use crate::size_table::SizeTable;
use crate::{RRB_WIDTH, WIDTH_BITS};
use archery::{SharedPointer, SharedPointerKind};
use std::fmt::Debug;

/// Merging two operands at one level yields at most `2 * RRB_WIDTH + 1` child nodes, which
/// repack into at most three full-or-nearly-full parents.
const MAX_CENTER_NODES: usize = 3;

/// The merged middle of a concatenation in progress: up to three nodes, tagged with their
/// subtree sizes, sitting at level `shift - WIDTH_BITS`.
pub(crate) struct ConcatCenter<A: Clone + Debug, P: SharedPointerKind> {
    pub shift: usize,
    pub nodes: Vec<(NodeRef<A, P>, usize)>,
}

impl<A: Clone + Debug, P: SharedPointerKind> ConcatCenter<A, P> {
    /// Turns the finished center into a root: a single node is adopted directly, several
    /// are wrapped in a fresh relaxed node one level up.
    fn realize(self) -> (usize, SharedPointer<Internal<A, P>, P>) {
        let shift = self.shift;
        if self.nodes.len() == 1 {
            debug_assert!(shift - WIDTH_BITS >= WIDTH_BITS);
            let (node, _) = self.nodes.into_iter().next().unwrap();
            (shift - WIDTH_BITS, node.internal())
        } else {
            let mut root = Internal::empty_internals();
            root.sizes = Some(SizeTable::new());
            for (node, size) in self.nodes {
                root.children.push(node);
                root.sizes.as_mut().unwrap().push_child_size(size);
            }
            (shift, SharedPointer::new(root))
        }
    }
}

/// Concatenates two roots, returning the new root and its shift.
pub(crate) fn concat_trees<A, P>(
    lroot: &SharedPointer<Internal<A, P>, P>,
    lshift: usize,
    lsize: usize,
    rroot: &SharedPointer<Internal<A, P>, P>,
    rshift: usize,
    rsize: usize,
) -> (usize, SharedPointer<Internal<A, P>, P>)
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    let l = InnerPos::new(lroot, lshift, lsize);
    let r = InnerPos::new(rroot, rshift, rsize);
    concat_sub(l, r).realize()
}

/// Merges two subtrees, descending the boundary of the taller one until the shifts align.
fn concat_sub<A, P>(l: InnerPos<'_, A, P>, r: InnerPos<'_, A, P>) -> ConcatCenter<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    if l.shift() > r.shift() {
        let center = concat_sub(l.child_pos(l.count() - 1), r);
        rebalance(Some(&l), center, None)
    } else if l.shift() < r.shift() {
        let center = concat_sub(l, r.child_pos(0));
        rebalance(None, center, Some(&r))
    } else if l.leaf_children() {
        let left_leaf = l.child_node(l.count() - 1);
        let right_leaf = r.child_node(0);
        let left_len = left_leaf.leaf_ref().len();
        let right_len = right_leaf.leaf_ref().len();
        let center = ConcatCenter {
            shift: WIDTH_BITS,
            nodes: vec![(left_leaf, left_len), (right_leaf, right_len)],
        };
        rebalance(Some(&l), center, Some(&r))
    } else {
        let center = concat_sub(l.child_pos(l.count() - 1), r.child_pos(0));
        rebalance(Some(&l), center, Some(&r))
    }
}

/// Redistributes one level's worth of nodes: the left operand's children except the last,
/// the center, and the right operand's children except the first, in that order.
fn rebalance<A, P>(
    l: Option<&InnerPos<'_, A, P>>,
    center: ConcatCenter<A, P>,
    r: Option<&InnerPos<'_, A, P>>,
) -> ConcatCenter<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    let item_shift = center.shift - WIDTH_BITS;
    let center_shift = center.shift;

    let mut items: Vec<(NodeRef<A, P>, usize)> = Vec::new();
    if let Some(l) = l {
        for i in 0..l.count() - 1 {
            items.push((l.child_node(i), l.child_size(i)));
        }
    }
    items.extend(center.nodes);
    if let Some(r) = r {
        for i in 1..r.count() {
            items.push((r.child_node(i), r.child_size(i)));
        }
    }

    let mut plan: Vec<usize> = items.iter().map(|(node, _)| node.slots()).collect();
    shuffle(&mut plan);

    let mut merger = Merger::new(item_shift, plan);
    for (node, size) in &items {
        merger.push_item(node, *size);
    }
    ConcatCenter {
        shift: center_shift + WIDTH_BITS,
        nodes: merger.finish(),
    }
}

/// Reduces the node count of the plan toward `ceil(total / RRB_WIDTH)`.
///
/// The tree tolerates two fewer-than-full nodes per merge; beyond that, the first short
/// node is redistributed into its successors and dropped from the plan. This preserves the
/// total element count while avoiding a full repack.
fn shuffle(counts: &mut Vec<usize>) {
    const EXTRAS: usize = 2;
    const INVARIANT: usize = 1;
    let total: usize = counts.iter().sum();
    let optimal = ((total - 1) >> WIDTH_BITS) + 1;
    let mut i = 0;
    while counts.len() >= optimal + EXTRAS {
        // Skip nodes that are already close enough to full.
        while counts[i] > RRB_WIDTH - INVARIANT {
            i += 1;
        }
        // Short node: spill its share into the following nodes.
        let mut remaining = counts[i];
        loop {
            let merged = (remaining + counts[i + 1]).min(RRB_WIDTH);
            remaining = remaining + counts[i + 1] - merged;
            counts[i] = merged;
            i += 1;
            if remaining == 0 {
                break;
            }
        }
        counts.remove(i);
        i -= 1;
    }
}

/// Walks the level's nodes in order, carving each one into destination slots of the
/// planned sizes. A source that exactly matches the next planned slot while no destination
/// is in flight is adopted as-is, keeping its subtree shared.
struct Merger<A: Clone + Debug, P: SharedPointerKind> {
    plan: Vec<usize>,
    cur: usize,
    item_shift: usize,
    dests: Vec<(Internal<A, P>, usize)>,
    building_leaf: Option<Leaf<A>>,
    building_inner: Option<Internal<A, P>>,
}

impl<A: Clone + Debug, P: SharedPointerKind> Merger<A, P> {
    fn new(item_shift: usize, plan: Vec<usize>) -> Self {
        Merger {
            plan,
            cur: 0,
            item_shift,
            dests: Vec::new(),
            building_leaf: None,
            building_inner: None,
        }
    }

    /// Appends a finished node to the center under construction, opening a new center node
    /// when the current one is full.
    fn add_child(&mut self, node: NodeRef<A, P>, size: usize) {
        let full = match self.dests.last() {
            Some((dest, _)) => dest.slots() == RRB_WIDTH,
            None => true,
        };
        if full {
            let mut dest = if self.item_shift == 0 {
                Internal::empty_leaves()
            } else {
                Internal::empty_internals()
            };
            dest.sizes = Some(SizeTable::new());
            self.dests.push((dest, 0));
        }
        let (dest, dest_size) = self.dests.last_mut().unwrap();
        dest.children.push(node);
        dest.sizes.as_mut().unwrap().push_child_size(size);
        *dest_size += size;
    }

    fn push_item(&mut self, node: &NodeRef<A, P>, size: usize) {
        match node {
            NodeRef::Leaf(leaf) => self.merge_leaf(leaf),
            NodeRef::Internal(internal) => self.merge_inner(internal, size),
        }
    }

    fn merge_leaf(&mut self, from: &SharedPointer<Leaf<A>, P>) {
        if self.building_leaf.is_none() && self.plan[self.cur] == from.len() {
            let size = from.len();
            self.add_child(NodeRef::Leaf(SharedPointer::clone(from)), size);
            self.cur += 1;
            return;
        }
        let slice = from.buffer.as_slice();
        let mut offset = 0;
        while offset < slice.len() {
            let wanted = {
                let building = self.building_leaf.get_or_insert_with(Leaf::empty);
                let want = self.plan[self.cur] - building.len();
                let take = want.min(slice.len() - offset);
                building.buffer.extend_from_slice(&slice[offset..offset + take]);
                offset += take;
                building.len() == self.plan[self.cur]
            };
            if wanted {
                let done = self.building_leaf.take().unwrap();
                let size = done.len();
                self.add_child(NodeRef::Leaf(SharedPointer::new(done)), size);
                self.cur += 1;
            }
        }
    }

    fn merge_inner(&mut self, from: &SharedPointer<Internal<A, P>, P>, size: usize) {
        if self.building_inner.is_none() && self.plan[self.cur] == from.slots() {
            self.add_child(NodeRef::Internal(SharedPointer::clone(from)), size);
            self.cur += 1;
            return;
        }
        let pos = InnerPos::new(from, self.item_shift, size);
        let count = pos.count();
        let mut offset = 0;
        while offset < count {
            let finished = {
                if self.building_inner.is_none() {
                    let mut fresh = if self.item_shift == WIDTH_BITS {
                        Internal::empty_leaves()
                    } else {
                        Internal::empty_internals()
                    };
                    fresh.sizes = Some(SizeTable::new());
                    self.building_inner = Some(fresh);
                }
                let building = self.building_inner.as_mut().unwrap();
                let want = self.plan[self.cur] - building.slots();
                let take = want.min(count - offset);
                for i in offset..offset + take {
                    building.children.push(pos.child_node(i));
                    building
                        .sizes
                        .as_mut()
                        .unwrap()
                        .push_child_size(pos.child_size(i));
                }
                offset += take;
                building.slots() == self.plan[self.cur]
            };
            if finished {
                let done = self.building_inner.take().unwrap();
                let done_size = done.sizes.as_ref().unwrap().total();
                self.add_child(NodeRef::Internal(SharedPointer::new(done)), done_size);
                self.cur += 1;
            }
        }
    }

    fn finish(self) -> Vec<(NodeRef<A, P>, usize)> {
        debug_assert!(self.building_leaf.is_none());
        debug_assert!(self.building_inner.is_none());
        debug_assert_eq!(self.cur, self.plan.len());
        debug_assert!(self.dests.len() <= MAX_CENTER_NODES);
        self.dests
            .into_iter()
            .map(|(dest, size)| (NodeRef::Internal(SharedPointer::new(dest)), size))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shuffle_leaves_balanced_plans_alone() {
        let mut counts = vec![RRB_WIDTH, RRB_WIDTH, 7];
        let before = counts.clone();
        shuffle(&mut counts);
        assert_eq!(counts, before);
    }

    #[test]
    fn shuffle_merges_short_nodes() {
        // 4 nodes holding 35 elements; optimal is 2, tolerance allows up to 3.
        let mut counts = vec![1, 1, RRB_WIDTH, 1];
        shuffle(&mut counts);
        let total: usize = counts.iter().sum();
        assert_eq!(total, 35);
        assert!(counts.len() <= 3);
        assert!(counts.iter().all(|count| *count <= RRB_WIDTH));
    }

    #[test]
    fn shuffle_preserves_totals() {
        let mut counts = vec![3, 5, 2, 31, 32, 1, 1, 1, 6, 9];
        let total_before: usize = counts.iter().sum();
        shuffle(&mut counts);
        let total: usize = counts.iter().sum();
        let optimal = ((total - 1) >> WIDTH_BITS) + 1;
        assert_eq!(total, total_before);
        assert!(counts.len() < optimal + 2);
        assert!(counts.iter().all(|count| *count <= RRB_WIDTH));
    }
}
