//! Positions over tree nodes and the visitor dispatch.
//!
//! A position wraps a node together with the context needed to reason about it without
//! recomputing: the shift of its level and, for regular nodes, the subtree size that its
//! layout implies. Every tree algorithm is written as a visitor with one handler per node
//! flavor; dispatching a position routes to exactly one handler by the node's variant tag.

use crate::node::{ChildList, Internal, Leaf, NodeRef};
use crate::size_table::SizeTable;
use crate::{MASK, WIDTH_BITS};
use archery::{SharedPointer, SharedPointerKind};
use std::fmt::Debug;

/// A visitor over tree positions: one handler per node flavor. Context travels in the
/// visitor's own fields and the result type is the visitor's to choose.
pub(crate) trait Visitor<A: Clone + Debug, P: SharedPointerKind> {
    /// The result produced by each handler.
    type Output;

    /// Visits a leaf.
    fn leaf(&mut self, pos: LeafPos<'_, A, P>) -> Self::Output;
    /// Visits a regular internal node.
    fn regular(&mut self, pos: RegularPos<'_, A, P>) -> Self::Output;
    /// Visits a relaxed internal node.
    fn relaxed(&mut self, pos: RelaxedPos<'_, A, P>) -> Self::Output;
}

/// Dispatches a visitor on an internal node, routing by its variant. `size` is only
/// consulted when the node is regular.
pub(crate) fn visit_node<A, P, V>(
    node: &SharedPointer<Internal<A, P>, P>,
    shift: usize,
    size: usize,
    visitor: &mut V,
) -> V::Output
where
    A: Clone + Debug,
    P: SharedPointerKind,
    V: Visitor<A, P>,
{
    if node.is_relaxed() {
        visitor.relaxed(RelaxedPos { node, shift })
    } else {
        visitor.regular(RegularPos { node, shift, size })
    }
}

/// A position over a leaf.
pub(crate) struct LeafPos<'a, A: Clone + Debug, P: SharedPointerKind> {
    pub node: &'a SharedPointer<Leaf<A>, P>,
}

impl<'a, A: Clone + Debug, P: SharedPointerKind> LeafPos<'a, A, P> {
    /// The number of values in the leaf.
    pub fn count(&self) -> usize {
        self.node.len()
    }

    /// The values of the leaf.
    pub fn as_slice(&self) -> &'a [A] {
        self.node.buffer.as_slice()
    }
}

/// A position over a regular internal node. The subtree size cannot be recovered from the
/// node alone, so the position carries it.
pub(crate) struct RegularPos<'a, A: Clone + Debug, P: SharedPointerKind> {
    pub node: &'a SharedPointer<Internal<A, P>, P>,
    pub shift: usize,
    pub size: usize,
}

impl<'a, A: Clone + Debug, P: SharedPointerKind> RegularPos<'a, A, P> {
    /// The number of children.
    pub fn count(&self) -> usize {
        debug_assert_eq!(self.node.slots(), ((self.size - 1) >> self.shift) + 1);
        self.node.slots()
    }

    /// The number of elements in children before `slot`.
    pub fn size_before(&self, slot: usize) -> usize {
        slot << self.shift
    }

    /// The number of elements below the child at `slot`.
    pub fn child_size(&self, slot: usize) -> usize {
        if slot == self.count() - 1 {
            self.size - (slot << self.shift)
        } else {
            1 << self.shift
        }
    }

    /// The child holding the element at `idx`.
    pub fn subindex(&self, idx: usize) -> usize {
        (idx >> self.shift) & MASK
    }

    /// Whether the children of this node are leaves.
    pub fn leaf_children(&self) -> bool {
        self.shift == WIDTH_BITS
    }

    /// Dispatches the visitor on the child at `slot`.
    pub fn descend<V: Visitor<A, P>>(&self, slot: usize, visitor: &mut V) -> V::Output {
        match &self.node.children {
            ChildList::Leaves(children) => visitor.leaf(LeafPos {
                node: children.get(slot).unwrap(),
            }),
            ChildList::Internals(children) => {
                let child = children.get(slot).unwrap();
                debug_assert!(!child.is_relaxed());
                visitor.regular(RegularPos {
                    node: child,
                    shift: self.shift - WIDTH_BITS,
                    size: self.child_size(slot),
                })
            }
        }
    }
}

/// A position over a relaxed internal node; sizes come from its table.
pub(crate) struct RelaxedPos<'a, A: Clone + Debug, P: SharedPointerKind> {
    pub node: &'a SharedPointer<Internal<A, P>, P>,
    pub shift: usize,
}

impl<'a, A: Clone + Debug, P: SharedPointerKind> RelaxedPos<'a, A, P> {
    /// The node's size table.
    pub fn table(&self) -> &'a SizeTable {
        self.node.sizes.as_ref().unwrap()
    }

    /// The number of children.
    pub fn count(&self) -> usize {
        self.table().len()
    }

    /// The total number of elements below this node.
    pub fn size(&self) -> usize {
        self.table().total()
    }

    /// The number of elements in children before `slot`.
    pub fn size_before(&self, slot: usize) -> usize {
        self.table().size_before(slot)
    }

    /// The number of elements below the child at `slot`.
    pub fn child_size(&self, slot: usize) -> usize {
        self.table().child_size(slot)
    }

    /// The child holding the element at `idx`.
    pub fn subindex(&self, idx: usize) -> usize {
        self.table().position_for(idx, self.shift).0
    }

    /// Whether the children of this node are leaves.
    pub fn leaf_children(&self) -> bool {
        self.shift == WIDTH_BITS
    }

    /// Dispatches the visitor on the child at `slot`.
    pub fn descend<V: Visitor<A, P>>(&self, slot: usize, visitor: &mut V) -> V::Output {
        match &self.node.children {
            ChildList::Leaves(children) => visitor.leaf(LeafPos {
                node: children.get(slot).unwrap(),
            }),
            ChildList::Internals(children) => {
                let child = children.get(slot).unwrap();
                visit_node(child, self.shift - WIDTH_BITS, self.child_size(slot), visitor)
            }
        }
    }
}

/// A position over either internal flavor, for algorithms whose regular and relaxed arms
/// coincide once slot geometry is abstracted.
pub(crate) enum InnerPos<'a, A: Clone + Debug, P: SharedPointerKind> {
    Regular(RegularPos<'a, A, P>),
    Relaxed(RelaxedPos<'a, A, P>),
}

impl<'a, A: Clone + Debug, P: SharedPointerKind> InnerPos<'a, A, P> {
    /// Wraps a node of either flavor; `size` is only consulted when the node is regular.
    pub fn new(node: &'a SharedPointer<Internal<A, P>, P>, shift: usize, size: usize) -> Self {
        if node.is_relaxed() {
            InnerPos::Relaxed(RelaxedPos { node, shift })
        } else {
            InnerPos::Regular(RegularPos { node, shift, size })
        }
    }

    /// The node pointer.
    pub fn node(&self) -> &'a SharedPointer<Internal<A, P>, P> {
        match self {
            InnerPos::Regular(pos) => pos.node,
            InnerPos::Relaxed(pos) => pos.node,
        }
    }

    /// The shift of this node's level.
    pub fn shift(&self) -> usize {
        match self {
            InnerPos::Regular(pos) => pos.shift,
            InnerPos::Relaxed(pos) => pos.shift,
        }
    }

    /// The number of children.
    pub fn count(&self) -> usize {
        match self {
            InnerPos::Regular(pos) => pos.count(),
            InnerPos::Relaxed(pos) => pos.count(),
        }
    }

    /// The number of elements in children before `slot`.
    pub fn size_before(&self, slot: usize) -> usize {
        match self {
            InnerPos::Regular(pos) => pos.size_before(slot),
            InnerPos::Relaxed(pos) => pos.size_before(slot),
        }
    }

    /// The number of elements below the child at `slot`.
    pub fn child_size(&self, slot: usize) -> usize {
        match self {
            InnerPos::Regular(pos) => pos.child_size(slot),
            InnerPos::Relaxed(pos) => pos.child_size(slot),
        }
    }

    /// The child holding the element at `idx`.
    pub fn subindex(&self, idx: usize) -> usize {
        match self {
            InnerPos::Regular(pos) => pos.subindex(idx),
            InnerPos::Relaxed(pos) => pos.subindex(idx),
        }
    }

    /// Whether the children of this node are leaves.
    pub fn leaf_children(&self) -> bool {
        match self {
            InnerPos::Regular(pos) => pos.leaf_children(),
            InnerPos::Relaxed(pos) => pos.leaf_children(),
        }
    }

    /// A copy of the pointer to the child at `slot`.
    pub fn child_node(&self, slot: usize) -> NodeRef<A, P> {
        self.node().children.get(slot)
    }

    /// The position of the internal child at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if the children of this node are leaves.
    pub fn child_pos(&self, slot: usize) -> InnerPos<'a, A, P> {
        let children = self.node().children.internals_ref();
        InnerPos::new(
            children.get(slot).unwrap(),
            self.shift() - WIDTH_BITS,
            self.child_size(slot),
        )
    }

    /// Dispatches the visitor on the child at `slot`.
    pub fn descend<V: Visitor<A, P>>(&self, slot: usize, visitor: &mut V) -> V::Output {
        match self {
            InnerPos::Regular(pos) => pos.descend(slot, visitor),
            InnerPos::Relaxed(pos) => pos.descend(slot, visitor),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::make_path;
    use archery::RcK;

    #[test]
    fn regular_geometry() {
        // A two level path: one internal node over a leaf of three items.
        let leaf: SharedPointer<Leaf<usize>, RcK> =
            SharedPointer::new(Leaf::from_slice(&[1, 2, 3]));
        let root = make_path(WIDTH_BITS, leaf).internal();
        let pos = RegularPos {
            node: &root,
            shift: WIDTH_BITS,
            size: 3,
        };
        assert_eq!(pos.count(), 1);
        assert_eq!(pos.child_size(0), 3);
        assert_eq!(pos.size_before(0), 0);
        assert_eq!(pos.subindex(2), 0);
        assert!(pos.leaf_children());
    }
}
