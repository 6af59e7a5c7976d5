//! Persistent tree algorithms.
//!
//! Every operation here is a visitor that walks one root-to-leaf spine, building new nodes
//! along the spine and sharing everything off it. Off-spine subtrees are retained by
//! cloning their pointers; displaced nodes are released when the last pointer to them
//! drops. Algorithms adjust their index context before descending, so the index a handler
//! sees is always local to the node being visited.

use crate::node::{make_path, Leaf, NodeRef};
use crate::pos::{InnerPos, LeafPos, RegularPos, RelaxedPos, Visitor};
use crate::size_table::SizeTable;
use crate::{MASK, RRB_WIDTH, WIDTH_BITS};
use archery::{SharedPointer, SharedPointerKind};
use std::fmt::Debug;

/// Replaces the element at `idx` with the result of the closure, copying the spine.
pub(crate) struct Update<F> {
    pub idx: usize,
    pub f: Option<F>,
}

impl<A, P, F> Visitor<A, P> for Update<F>
where
    A: Clone + Debug,
    P: SharedPointerKind,
    F: FnOnce(&A) -> A,
{
    type Output = NodeRef<A, P>;

    fn leaf(&mut self, pos: LeafPos<'_, A, P>) -> NodeRef<A, P> {
        let mut leaf = (**pos.node).clone();
        let f = self.f.take().expect("update closure applied twice");
        let new = f(leaf.buffer.get(self.idx).unwrap());
        *leaf.buffer.get_mut(self.idx).unwrap() = new;
        NodeRef::Leaf(SharedPointer::new(leaf))
    }

    fn regular(&mut self, pos: RegularPos<'_, A, P>) -> NodeRef<A, P> {
        let slot = pos.subindex(self.idx);
        self.idx -= pos.size_before(slot);
        let new_child = pos.descend(slot, self);
        let mut node = (**pos.node).clone();
        node.children.set(slot, new_child);
        NodeRef::Internal(SharedPointer::new(node))
    }

    fn relaxed(&mut self, pos: RelaxedPos<'_, A, P>) -> NodeRef<A, P> {
        let slot = pos.subindex(self.idx);
        self.idx -= pos.size_before(slot);
        let new_child = pos.descend(slot, self);
        let mut node = (**pos.node).clone();
        node.children.set(slot, new_child);
        NodeRef::Internal(SharedPointer::new(node))
    }
}

/// Inserts a full-or-partial tail leaf as the rightmost leaf of the subtree.
///
/// Returns `None` when the subtree has no room, in which case the caller grows the tree by
/// a level. Regular subtrees visited here always have room (the container checks fullness
/// up front), so only the relaxed handler can reject.
pub(crate) struct PushTail<A: Clone + Debug, P: SharedPointerKind> {
    pub tail: Option<SharedPointer<Leaf<A>, P>>,
    pub tail_len: usize,
}

impl<A, P> Visitor<A, P> for PushTail<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    type Output = Option<NodeRef<A, P>>;

    fn leaf(&mut self, _pos: LeafPos<'_, A, P>) -> Option<NodeRef<A, P>> {
        unreachable!("push_tail never descends into a leaf")
    }

    fn regular(&mut self, pos: RegularPos<'_, A, P>) -> Option<NodeRef<A, P>> {
        debug_assert_eq!(pos.size & MASK, 0);
        let idx = pos.subindex(pos.size - 1);
        let new_idx = pos.subindex(pos.size + RRB_WIDTH - 1);
        let new_child = if idx == new_idx {
            pos.descend(idx, self)
                .expect("a non-full regular subtree always accepts the tail")
        } else {
            make_path(pos.shift - WIDTH_BITS, self.tail.take().unwrap())
        };
        let mut node = (**pos.node).clone();
        node.children.truncate(new_idx);
        node.children.push(new_child);
        Some(NodeRef::Internal(SharedPointer::new(node)))
    }

    fn relaxed(&mut self, pos: RelaxedPos<'_, A, P>) -> Option<NodeRef<A, P>> {
        let idx = pos.count() - 1;
        let child_size = pos.child_size(idx);
        let total = pos.size();
        let mut new_idx = if child_size == 1 << pos.shift || pos.leaf_children() {
            idx + 1
        } else {
            idx
        };
        if new_idx >= RRB_WIDTH {
            return None;
        }
        let new_child = if new_idx == idx {
            match pos.descend(idx, self) {
                Some(child) => child,
                None => {
                    // The last child is packed all the way down; open the next slot.
                    new_idx += 1;
                    if new_idx >= RRB_WIDTH {
                        return None;
                    }
                    make_path(pos.shift - WIDTH_BITS, self.tail.take().unwrap())
                }
            }
        } else {
            make_path(pos.shift - WIDTH_BITS, self.tail.take().unwrap())
        };
        let mut node = (**pos.node).clone();
        node.children.truncate(new_idx);
        node.children.push(new_child);
        let sizes = node.sizes.as_mut().unwrap();
        sizes.truncate(new_idx);
        sizes.push_cumulative(total + self.tail_len);
        Some(NodeRef::Internal(SharedPointer::new(node)))
    }
}

/// The result of a right slice: the shift of the produced root, the root (`None` when
/// everything kept fits in the tail), the tail length, and the tail leaf.
pub(crate) type SliceRightResult<A, P> = (
    usize,
    Option<NodeRef<A, P>>,
    usize,
    SharedPointer<Leaf<A>, P>,
);

/// Keeps the elements up to and including `last`, carving the trailing partial leaf out as
/// the new tail.
///
/// `collapse` is enabled on the original root only: a slice that leaves a single spine of
/// nodes on the left edge shrinks the tree by forwarding the child result directly.
pub(crate) struct SliceRight {
    pub last: usize,
    pub collapse: bool,
}

impl<A, P> Visitor<A, P> for SliceRight
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    type Output = SliceRightResult<A, P>;

    fn leaf(&mut self, pos: LeafPos<'_, A, P>) -> SliceRightResult<A, P> {
        let new_len = self.last + 1;
        let tail = if new_len == pos.count() {
            SharedPointer::clone(pos.node)
        } else {
            SharedPointer::new(Leaf::from_slice(&pos.as_slice()[..new_len]))
        };
        (0, None, new_len, tail)
    }

    fn regular(&mut self, pos: RegularPos<'_, A, P>) -> SliceRightResult<A, P> {
        let idx = pos.subindex(self.last);
        if self.collapse && idx == 0 {
            return pos.descend(0, self);
        }
        let local_last = self.last;
        let mut sub = SliceRight {
            last: local_last - pos.size_before(idx),
            collapse: false,
        };
        let (_, next, tail_len, tail) = pos.descend(idx, &mut sub);
        match next {
            Some(child) => {
                let mut node = (**pos.node).clone();
                node.children.truncate(idx);
                node.children.push(child);
                (
                    pos.shift,
                    Some(NodeRef::Internal(SharedPointer::new(node))),
                    tail_len,
                    tail,
                )
            }
            None if idx == 0 => (pos.shift, None, tail_len, tail),
            None if self.collapse && idx == 1 && !pos.leaf_children() => (
                pos.shift - WIDTH_BITS,
                Some(pos.node.children.get(0)),
                tail_len,
                tail,
            ),
            None => {
                let mut node = (**pos.node).clone();
                node.children.truncate(idx);
                (
                    pos.shift,
                    Some(NodeRef::Internal(SharedPointer::new(node))),
                    tail_len,
                    tail,
                )
            }
        }
    }

    fn relaxed(&mut self, pos: RelaxedPos<'_, A, P>) -> SliceRightResult<A, P> {
        let idx = pos.subindex(self.last);
        if self.collapse && idx == 0 {
            return pos.descend(0, self);
        }
        let local_last = self.last;
        let mut sub = SliceRight {
            last: local_last - pos.size_before(idx),
            collapse: false,
        };
        let (_, next, tail_len, tail) = pos.descend(idx, &mut sub);
        match next {
            Some(child) => {
                let mut node = (**pos.node).clone();
                node.children.truncate(idx);
                node.children.push(child);
                let sizes = node.sizes.as_mut().unwrap();
                sizes.truncate(idx);
                sizes.push_cumulative(local_last + 1 - tail_len);
                (
                    pos.shift,
                    Some(NodeRef::Internal(SharedPointer::new(node))),
                    tail_len,
                    tail,
                )
            }
            None if idx == 0 => (pos.shift, None, tail_len, tail),
            None if self.collapse && idx == 1 && !pos.leaf_children() => (
                pos.shift - WIDTH_BITS,
                Some(pos.node.children.get(0)),
                tail_len,
                tail,
            ),
            None => {
                let mut node = (**pos.node).clone();
                node.children.truncate(idx);
                node.sizes.as_mut().unwrap().truncate(idx);
                (
                    pos.shift,
                    Some(NodeRef::Internal(SharedPointer::new(node))),
                    tail_len,
                    tail,
                )
            }
        }
    }
}

/// Drops the elements before `first`, building a relaxed spine on the left edge.
///
/// The produced node is always relaxed: its first child is partially dropped, so a size
/// table is required even where the source was regular. `collapse` is enabled on the
/// original root only; a cut landing in the last child shrinks the tree by a level, except
/// directly above the leaves where the root must stay an internal node.
pub(crate) struct SliceLeft {
    pub first: usize,
    pub collapse: bool,
}

impl SliceLeft {
    fn inner<A, P>(&mut self, pos: InnerPos<'_, A, P>) -> (usize, NodeRef<A, P>)
    where
        A: Clone + Debug,
        P: SharedPointerKind,
    {
        let count = pos.count();
        let idx = pos.subindex(self.first);
        let child_size = pos.child_size(idx);
        let child_dropped = self.first - pos.size_before(idx);
        if self.collapse && !pos.leaf_children() && idx == count - 1 {
            self.first = child_dropped;
            return pos.descend(idx, self);
        }
        let (_, new_child) = {
            let mut sub = SliceLeft {
                first: child_dropped,
                collapse: false,
            };
            pos.descend(idx, &mut sub)
        };
        let mut sizes = SizeTable::new();
        sizes.push_child_size(child_size - child_dropped);
        for i in idx + 1..count {
            sizes.push_child_size(pos.child_size(i));
        }
        let mut node = (**pos.node()).clone();
        node.children.remove_front(idx);
        node.children.set(0, new_child);
        node.sizes = Some(sizes);
        (pos.shift(), NodeRef::Internal(SharedPointer::new(node)))
    }
}

impl<A, P> Visitor<A, P> for SliceLeft
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    type Output = (usize, NodeRef<A, P>);

    fn leaf(&mut self, pos: LeafPos<'_, A, P>) -> (usize, NodeRef<A, P>) {
        let leaf = Leaf::from_slice(&pos.as_slice()[self.first..]);
        (0, NodeRef::Leaf(SharedPointer::new(leaf)))
    }

    fn regular(&mut self, pos: RegularPos<'_, A, P>) -> (usize, NodeRef<A, P>) {
        self.inner(InnerPos::Regular(pos))
    }

    fn relaxed(&mut self, pos: RelaxedPos<'_, A, P>) -> (usize, NodeRef<A, P>) {
        self.inner(InnerPos::Relaxed(pos))
    }
}

/// Calls a closure on every leaf range of the subtree, in order.
pub(crate) struct EachChunk<'f, F> {
    pub f: &'f mut F,
}

impl<A, P, F> Visitor<A, P> for EachChunk<'_, F>
where
    A: Clone + Debug,
    P: SharedPointerKind,
    F: FnMut(&[A]),
{
    type Output = ();

    fn leaf(&mut self, pos: LeafPos<'_, A, P>) {
        (self.f)(pos.as_slice());
    }

    fn regular(&mut self, pos: RegularPos<'_, A, P>) {
        for slot in 0..pos.count() {
            pos.descend(slot, self);
        }
    }

    fn relaxed(&mut self, pos: RelaxedPos<'_, A, P>) {
        for slot in 0..pos.count() {
            pos.descend(slot, self);
        }
    }
}
