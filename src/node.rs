//! Collection of nodes used for the RRB tree.
//!
//! A node is either a leaf holding values or an internal node holding children. Internal
//! nodes come in two flavors: regular nodes, whose children are all full for their level
//! except possibly the last, so their sizes are implicit in their position, and relaxed
//! nodes, which carry an explicit cumulative size table. A regular node only ever has
//! regular children; relaxed nodes may hold either kind.

use crate::buffer::Buffer;
use crate::size_table::SizeTable;
use crate::{RRB_WIDTH, WIDTH_BITS};
use archery::{SharedPointer, SharedPointerKind};
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

/// A leaf indicates a terminal node in the tree.
#[derive(Debug)]
pub(crate) struct Leaf<A: Clone + Debug> {
    pub buffer: Buffer<A>,
}

impl<A: Clone + Debug> Leaf<A> {
    /// Constructs a new empty leaf.
    pub fn empty() -> Self {
        Leaf {
            buffer: Buffer::new(),
        }
    }

    /// Constructs a new leaf with a single item.
    pub fn with_item(item: A) -> Self {
        Leaf {
            buffer: Buffer::with_item(item),
        }
    }

    /// Constructs a new leaf holding clones of the given items.
    ///
    /// # Panics
    ///
    /// Panics if the slice is longer than `RRB_WIDTH`.
    pub fn from_slice(items: &[A]) -> Self {
        Leaf {
            buffer: Buffer::from_slice(items),
        }
    }
}

impl<A: Clone + Debug> Clone for Leaf<A> {
    fn clone(&self) -> Self {
        Leaf {
            buffer: self.buffer.clone(),
        }
    }
}

impl<A: Clone + Debug> Deref for Leaf<A> {
    type Target = Buffer<A>;

    fn deref(&self) -> &Buffer<A> {
        &self.buffer
    }
}

impl<A: Clone + Debug> DerefMut for Leaf<A> {
    fn deref_mut(&mut self) -> &mut Buffer<A> {
        &mut self.buffer
    }
}

/// Represents a homogenous list of nodes, the children of an internal node.
#[derive(Debug)]
pub(crate) enum ChildList<A: Clone + Debug, P: SharedPointerKind> {
    /// The children are leaves; the parent sits directly above the leaf level.
    Leaves(Buffer<SharedPointer<Leaf<A>, P>>),
    /// The children are internal nodes.
    Internals(Buffer<SharedPointer<Internal<A, P>, P>>),
}

impl<A: Clone + Debug, P: SharedPointerKind> ChildList<A, P> {
    /// Returns a reference to the list as a list of leaf nodes.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not a list of leaf nodes.
    pub fn leaves_ref(&self) -> &Buffer<SharedPointer<Leaf<A>, P>> {
        if let ChildList::Leaves(x) = self {
            x
        } else {
            panic!("Failed to unwrap a child list as a leaves list")
        }
    }

    /// Returns a reference to the list as a list of internal nodes.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not a list of internal nodes.
    pub fn internals_ref(&self) -> &Buffer<SharedPointer<Internal<A, P>, P>> {
        if let ChildList::Internals(x) = self {
            x
        } else {
            panic!("Failed to unwrap a child list as an internals list")
        }
    }

    /// Returns the number of direct children in the list.
    pub fn slots(&self) -> usize {
        match self {
            ChildList::Leaves(children) => children.len(),
            ChildList::Internals(children) => children.len(),
        }
    }

    /// Returns a copy of the pointer to the node at the given position.
    pub fn get(&self, idx: usize) -> NodeRef<A, P> {
        match self {
            ChildList::Leaves(children) => {
                NodeRef::Leaf(SharedPointer::clone(children.get(idx).unwrap()))
            }
            ChildList::Internals(children) => {
                NodeRef::Internal(SharedPointer::clone(children.get(idx).unwrap()))
            }
        }
    }

    /// Adds a node to the back of the list.
    ///
    /// # Panics
    ///
    /// Panics if the node's kind does not match the list, or the list is full.
    pub fn push(&mut self, node: NodeRef<A, P>) {
        match (self, node) {
            (ChildList::Leaves(children), NodeRef::Leaf(leaf)) => children.push_back(leaf),
            (ChildList::Internals(children), NodeRef::Internal(internal)) => {
                children.push_back(internal)
            }
            _ => panic!("Tried to push a node into a child list of the wrong kind"),
        }
    }

    /// Replaces the node at the given position.
    ///
    /// # Panics
    ///
    /// Panics if the node's kind does not match the list.
    pub fn set(&mut self, idx: usize, node: NodeRef<A, P>) {
        match (self, node) {
            (ChildList::Leaves(children), NodeRef::Leaf(leaf)) => {
                *children.get_mut(idx).unwrap() = leaf
            }
            (ChildList::Internals(children), NodeRef::Internal(internal)) => {
                *children.get_mut(idx).unwrap() = internal
            }
            _ => panic!("Tried to place a node into a child list of the wrong kind"),
        }
    }

    /// Shortens the list to the first `new_len` children, releasing the rest.
    pub fn truncate(&mut self, new_len: usize) {
        match self {
            ChildList::Leaves(children) => children.truncate(new_len),
            ChildList::Internals(children) => children.truncate(new_len),
        }
    }

    /// Removes the first `count` children, releasing them.
    pub fn remove_front(&mut self, count: usize) {
        match self {
            ChildList::Leaves(children) => children.remove_front(count),
            ChildList::Internals(children) => children.remove_front(count),
        }
    }
}

impl<A: Clone + Debug, P: SharedPointerKind> Clone for ChildList<A, P> {
    fn clone(&self) -> Self {
        match self {
            ChildList::Leaves(children) => ChildList::Leaves(children.clone()),
            ChildList::Internals(children) => ChildList::Internals(children.clone()),
        }
    }
}

/// An internal node indicates a non-terminal node in the tree.
///
/// The node is regular when `sizes` is `None` and relaxed otherwise.
#[derive(Debug)]
pub(crate) struct Internal<A: Clone + Debug, P: SharedPointerKind> {
    pub sizes: Option<SizeTable>,
    pub children: ChildList<A, P>,
}

impl<A: Clone + Debug, P: SharedPointerKind> Internal<A, P> {
    /// Constructs a new empty regular node sitting directly above the leaf level.
    pub fn empty_leaves() -> Self {
        Internal {
            sizes: None,
            children: ChildList::Leaves(Buffer::new()),
        }
    }

    /// Constructs a new empty regular node whose children are internal nodes.
    pub fn empty_internals() -> Self {
        Internal {
            sizes: None,
            children: ChildList::Internals(Buffer::new()),
        }
    }

    /// Returns whether the node carries a size table.
    pub fn is_relaxed(&self) -> bool {
        self.sizes.is_some()
    }

    /// Returns the number of direct children of the node.
    pub fn slots(&self) -> usize {
        self.children.slots()
    }

    /// Returns the size (number of elements hanging off) of the node at the given shift.
    pub fn len(&self, shift: usize) -> usize {
        if let Some(sizes) = &self.sizes {
            return sizes.total();
        }
        let slots = self.slots();
        if slots == 0 {
            return 0;
        }
        let full = (slots - 1) << shift;
        let last = match &self.children {
            ChildList::Leaves(children) => children.get(slots - 1).unwrap().len(),
            ChildList::Internals(children) => {
                children.get(slots - 1).unwrap().len(shift - WIDTH_BITS)
            }
        };
        full + last
    }

    /// Checks the structural invariants of the subtree: child kinds match the shift,
    /// regular children are full except for the last, relaxed size tables agree with the
    /// children they describe, and the whole subtree holds `size` elements.
    pub fn debug_check(&self, shift: usize, size: usize) -> bool {
        assert!(shift >= WIDTH_BITS);
        let slots = self.slots();
        assert!(slots > 0);
        assert!(slots <= RRB_WIDTH);
        match &self.children {
            ChildList::Leaves(_) => assert_eq!(shift, WIDTH_BITS),
            ChildList::Internals(_) => assert!(shift > WIDTH_BITS),
        }
        if let Some(sizes) = &self.sizes {
            sizes.debug_check(shift);
            assert_eq!(sizes.len(), slots);
            assert_eq!(sizes.total(), size);
            for i in 0..slots {
                let child_size = sizes.child_size(i);
                match &self.children {
                    ChildList::Leaves(children) => {
                        assert_eq!(children.get(i).unwrap().len(), child_size)
                    }
                    ChildList::Internals(children) => {
                        children
                            .get(i)
                            .unwrap()
                            .debug_check(shift - WIDTH_BITS, child_size);
                    }
                }
            }
        } else {
            assert!(size > (slots - 1) << shift);
            assert!(size <= slots << shift);
            for i in 0..slots {
                let child_size = if i == slots - 1 {
                    size - (i << shift)
                } else {
                    1 << shift
                };
                match &self.children {
                    ChildList::Leaves(children) => {
                        assert_eq!(children.get(i).unwrap().len(), child_size)
                    }
                    ChildList::Internals(children) => {
                        let child = children.get(i).unwrap();
                        assert!(!child.is_relaxed());
                        child.debug_check(shift - WIDTH_BITS, child_size);
                    }
                }
            }
        }
        true
    }
}

impl<A: Clone + Debug, P: SharedPointerKind> Clone for Internal<A, P> {
    fn clone(&self) -> Self {
        Internal {
            sizes: self.sizes.clone(),
            children: self.children.clone(),
        }
    }
}

/// Represents an arbitrary node in the tree.
#[derive(Debug)]
pub(crate) enum NodeRef<A: Clone + Debug, P: SharedPointerKind> {
    Leaf(SharedPointer<Leaf<A>, P>),
    Internal(SharedPointer<Internal<A, P>, P>),
}

impl<A: Clone + Debug, P: SharedPointerKind> NodeRef<A, P> {
    /// Consumes `self` and returns the node as an internal node.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not an internal node.
    pub fn internal(self) -> SharedPointer<Internal<A, P>, P> {
        if let NodeRef::Internal(x) = self {
            x
        } else {
            panic!("Failed to unwrap a node as an internal node")
        }
    }

    /// Returns a reference to the node as a leaf node.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not a leaf node.
    pub fn leaf_ref(&self) -> &SharedPointer<Leaf<A>, P> {
        if let NodeRef::Leaf(x) = self {
            x
        } else {
            panic!("Failed to unwrap a node as a leaf node")
        }
    }

    /// Returns the number of direct children of the node.
    pub fn slots(&self) -> usize {
        match self {
            NodeRef::Leaf(leaf) => leaf.len(),
            NodeRef::Internal(internal) => internal.slots(),
        }
    }
}

impl<A: Clone + Debug, P: SharedPointerKind> Clone for NodeRef<A, P> {
    fn clone(&self) -> Self {
        match self {
            NodeRef::Leaf(leaf) => NodeRef::Leaf(SharedPointer::clone(leaf)),
            NodeRef::Internal(internal) => NodeRef::Internal(SharedPointer::clone(internal)),
        }
    }
}

impl<A: Clone + Debug, P: SharedPointerKind> From<SharedPointer<Leaf<A>, P>> for NodeRef<A, P> {
    fn from(t: SharedPointer<Leaf<A>, P>) -> NodeRef<A, P> {
        NodeRef::Leaf(t)
    }
}

impl<A: Clone + Debug, P: SharedPointerKind> From<SharedPointer<Internal<A, P>, P>>
    for NodeRef<A, P>
{
    fn from(t: SharedPointer<Internal<A, P>, P>) -> NodeRef<A, P> {
        NodeRef::Internal(t)
    }
}

/// Builds the chain of single-child regular nodes that carries `tail` down to the leaf
/// level, returning the node that sits at level `shift`.
pub(crate) fn make_path<A: Clone + Debug, P: SharedPointerKind>(
    shift: usize,
    tail: SharedPointer<Leaf<A>, P>,
) -> NodeRef<A, P> {
    if shift == 0 {
        return NodeRef::Leaf(tail);
    }
    let mut node = if shift == WIDTH_BITS {
        Internal::empty_leaves()
    } else {
        Internal::empty_internals()
    };
    node.children.push(make_path(shift - WIDTH_BITS, tail));
    NodeRef::Internal(SharedPointer::new(node))
}

#[cfg(test)]
mod test {
    use super::*;
    use archery::RcK;

    #[test]
    fn path_shape() {
        let leaf: SharedPointer<Leaf<usize>, RcK> =
            SharedPointer::new(Leaf::from_slice(&[1, 2, 3]));
        let path = make_path(2 * WIDTH_BITS, leaf);
        let top = path.internal();
        assert!(!top.is_relaxed());
        assert_eq!(top.slots(), 1);
        let mid = top.children.internals_ref().get(0).unwrap();
        assert_eq!(mid.slots(), 1);
        let bottom = mid.children.leaves_ref().get(0).unwrap();
        assert_eq!(bottom.len(), 3);
        assert_eq!(top.len(2 * WIDTH_BITS), 3);
    }

    #[test]
    fn child_list_round_trip() {
        let mut list: ChildList<usize, RcK> = ChildList::Leaves(Buffer::new());
        list.push(NodeRef::Leaf(SharedPointer::new(Leaf::with_item(1))));
        list.push(NodeRef::Leaf(SharedPointer::new(Leaf::with_item(2))));
        assert_eq!(list.slots(), 2);
        list.set(0, NodeRef::Leaf(SharedPointer::new(Leaf::with_item(7))));
        assert_eq!(list.get(0).leaf_ref().get(0), Some(&7));
        list.truncate(1);
        assert_eq!(list.slots(), 1);
    }
}
