//! A container for representing a sequence of elements.
//!
//! # Terminology
//!
//! * Shift
//!
//! The number of index bits consumed above a node's subtree. An internal node directly
//! above the leaves has shift `WIDTH_BITS`; each level above adds `WIDTH_BITS`. The slot
//! for an index at a regular node is `(idx >> shift) & MASK`.
//!
//! * Tail
//!
//! The trailing partial leaf of the sequence, held outside the root. Appending goes
//! through the tail, so `push_back` only touches the tree itself once every `RRB_WIDTH`
//! insertions and is amortized constant time.
//!
//! * Tail offset
//!
//! The number of elements held by the root; equivalently the index of the first tail
//! element. A relaxed root records it in its size table; a regular root always holds a
//! multiple of `RRB_WIDTH` elements, so it is recoverable from the size alone.
//!
//! * Regular and relaxed nodes
//!
//! A regular node's children are all exactly full for their level except possibly the
//! last, so a slot is found with pure radix arithmetic. Slicing and concatenation produce
//! nodes that break this density; those carry a size table and a slot lookup consults it.
//!
//! # Operations
//!
//! All of the persistent operations take `&self` and return a fresh vector sharing
//! structure with the input: they copy the nodes of one root-to-leaf path and take new
//! references to everything else. [`take`], [`skip`] and [`concat`] may also rebuild the
//! handful of nodes along the cut or the seam. [`concat`] rebalances the merged boundary
//! so that lookups stay logarithmic no matter how the sequence was assembled.
//!
//! [`take`]: ./struct.RrbTree.html#method.take
//! [`skip`]: ./struct.RrbTree.html#method.skip
//! [`concat`]: ./struct.RrbTree.html#method.concat

use crate::concat::concat_trees;
use crate::node::{make_path, ChildList, Internal, Leaf, NodeRef};
use crate::ops::{EachChunk, PushTail, SliceLeft, SliceRight, Update};
use crate::pos::visit_node;
use crate::size_table::SizeTable;
use crate::transient::Transient;
use crate::{MASK, RRB_WIDTH, WIDTH_BITS};
use archery::{ArcK, RcK, SharedPointer, SharedPointerKind};
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::iter::{FromIterator, FusedIterator};
use std::ops::Index;

/// Construct a vector.
///
/// # Examples
///
/// ```
/// # #[macro_use] extern crate rrbtree;
/// # use rrbtree::Vector;
/// let first = vector![1, 2, 3];
/// let mut second = Vector::new();
/// second = second.push_back(1);
/// second = second.push_back(2);
/// second = second.push_back(3);
/// assert_eq!(first, second);
/// ```
#[macro_export]
macro_rules! vector {
    () => { $crate::tree::Vector::new() };

    ( $($x:expr),* ) => {{
        let mut t = $crate::tree::Vector::new().transient();
        $(
            t.push_back($x);
        )*
            t.persistent()
    }};

    ( $($x:expr ,)* ) => {{
        let mut t = $crate::tree::Vector::new().transient();
        $(
            t.push_back($x);
        )*
            t.persistent()
    }};
}

/// Construct a thread-safe vector.
///
/// # Examples
///
/// ```
/// # #[macro_use] extern crate rrbtree;
/// # use rrbtree::ThreadSafeVector;
/// let first = vector_ts![1, 2, 3];
/// let mut second = ThreadSafeVector::new();
/// second = second.push_back(1);
/// second = second.push_back(2);
/// second = second.push_back(3);
/// assert_eq!(first, second);
/// ```
#[macro_export]
macro_rules! vector_ts {
    () => { $crate::tree::ThreadSafeVector::new() };

    ( $($x:expr),* ) => {{
        let mut t = $crate::tree::ThreadSafeVector::new().transient();
        $(
            t.push_back($x);
        )*
            t.persistent()
    }};

    ( $($x:expr ,)* ) => {{
        let mut t = $crate::tree::ThreadSafeVector::new().transient();
        $(
            t.push_back($x);
        )*
            t.persistent()
    }};
}

/// A persistent sequence of elements backed by an RRB tree.
///
/// The tree proper holds every element except a trailing partial leaf, which lives in the
/// tail. The root is always an internal node; an empty root together with a non-empty tail
/// is the normal state of any sequence of up to `RRB_WIDTH` elements.
pub struct RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    pub(crate) size: usize,
    pub(crate) shift: usize,
    pub(crate) root: SharedPointer<Internal<A, P>, P>,
    pub(crate) tail: SharedPointer<Leaf<A>, P>,
}

/// A sequence with non-atomic reference counts, for single threaded use.
pub type Vector<A> = RrbTree<A, RcK>;

/// A sequence with atomic reference counts, shareable across threads.
pub type ThreadSafeVector<A> = RrbTree<A, ArcK>;

impl<A, P> RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    /// Constructs a new empty vector.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v: Vector<u64> = Vector::new();
    /// assert_eq!(v, vector![]);
    /// ```
    pub fn new() -> Self {
        RrbTree {
            size: 0,
            shift: WIDTH_BITS,
            root: SharedPointer::new(Internal::empty_leaves()),
            tail: SharedPointer::new(Leaf::empty()),
        }
    }

    /// Constructs a new vector with a single element.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = Vector::unit(1);
    /// assert_eq!(v, vector![1]);
    /// ```
    pub fn unit(item: A) -> Self {
        RrbTree {
            size: 1,
            shift: WIDTH_BITS,
            root: SharedPointer::new(Internal::empty_leaves()),
            tail: SharedPointer::new(Leaf::with_item(item)),
        }
    }

    /// Returns the length of the vector.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v: Vector<u64> = Vector::new();
    /// assert_eq!(v.len(), 0);
    /// assert_eq!(Vector::unit(1).len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.size
    }

    /// Tests whether the vector is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v: Vector<u64> = Vector::new();
    /// assert!(v.is_empty());
    /// assert!(!Vector::unit(1).is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The index of the first element held by the tail; equivalently the number of
    /// elements in the root.
    pub(crate) fn tail_offset(&self) -> usize {
        if let Some(sizes) = &self.root.sizes {
            sizes.total()
        } else if self.size > 0 {
            (self.size - 1) & !MASK
        } else {
            0
        }
    }

    /// Returns a reference to the element at the given index, or `None` if out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3];
    /// assert_eq!(v.get(1), Some(&2));
    /// assert_eq!(v.get(3), None);
    /// ```
    pub fn get(&self, idx: usize) -> Option<&A> {
        if idx >= self.size {
            return None;
        }
        let tail_off = self.tail_offset();
        if idx >= tail_off {
            return self.tail.buffer.get(idx - tail_off);
        }
        let mut node = &self.root;
        let mut shift = self.shift;
        let mut idx = idx;
        loop {
            let (slot, sub) = match &node.sizes {
                Some(sizes) => sizes.position_for(idx, shift),
                None => {
                    let slot = (idx >> shift) & MASK;
                    (slot, idx - (slot << shift))
                }
            };
            match &node.children {
                ChildList::Leaves(children) => {
                    return children.get(slot).unwrap().buffer.get(sub);
                }
                ChildList::Internals(children) => {
                    node = children.get(slot).unwrap();
                    shift -= WIDTH_BITS;
                    idx = sub;
                }
            }
        }
    }

    /// Returns a reference to the first element, if any.
    pub fn front(&self) -> Option<&A> {
        self.get(0)
    }

    /// Returns a reference to the last element, if any.
    pub fn back(&self) -> Option<&A> {
        self.tail.buffer.back()
    }

    /// Returns a new vector with the element at the given index replaced by the result of
    /// the closure. The original is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3];
    /// let w = v.update(2, |x| x * 10);
    /// assert_eq!(w, vector![1, 2, 30]);
    /// assert_eq!(v, vector![1, 2, 3]);
    /// ```
    pub fn update<F: FnOnce(&A) -> A>(&self, idx: usize, f: F) -> Self {
        assert!(idx < self.size, "Index out of bounds.");
        let tail_off = self.tail_offset();
        if idx >= tail_off {
            let mut tail = (*self.tail).clone();
            let new = f(tail.buffer.get(idx - tail_off).unwrap());
            *tail.buffer.get_mut(idx - tail_off).unwrap() = new;
            RrbTree {
                size: self.size,
                shift: self.shift,
                root: SharedPointer::clone(&self.root),
                tail: SharedPointer::new(tail),
            }
        } else {
            let mut visitor = Update { idx, f: Some(f) };
            let root = visit_node(&self.root, self.shift, tail_off, &mut visitor).internal();
            RrbTree {
                size: self.size,
                shift: self.shift,
                root,
                tail: SharedPointer::clone(&self.tail),
            }
        }
    }

    /// Returns a new vector with the element at the given index overwritten.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3];
    /// assert_eq!(v.set(0, 9), vector![9, 2, 3]);
    /// ```
    pub fn set(&self, idx: usize, item: A) -> Self {
        self.update(idx, move |_| item)
    }

    /// Returns a new vector with a single item appended to the back.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = Vector::new().push_back(1).push_back(2);
    /// assert_eq!(v, vector![1, 2]);
    /// ```
    pub fn push_back(&self, item: A) -> Self {
        let tail_off = self.tail_offset();
        let tail_len = self.size - tail_off;
        if tail_len < RRB_WIDTH {
            let mut tail = (*self.tail).clone();
            tail.buffer.push_back(item);
            RrbTree {
                size: self.size + 1,
                shift: self.shift,
                root: SharedPointer::clone(&self.root),
                tail: SharedPointer::new(tail),
            }
        } else {
            let (shift, root) =
                Self::push_tail(&self.root, self.shift, tail_off, &self.tail, RRB_WIDTH);
            RrbTree {
                size: self.size + 1,
                shift,
                root,
                tail: SharedPointer::new(Leaf::with_item(item)),
            }
        }
    }

    /// Inserts the given leaf as the rightmost leaf of the root, growing the tree by a
    /// level when the root has no slot left. `size` is the number of elements in the root.
    fn push_tail(
        root: &SharedPointer<Internal<A, P>, P>,
        shift: usize,
        size: usize,
        tail: &SharedPointer<Leaf<A>, P>,
        tail_len: usize,
    ) -> (usize, SharedPointer<Internal<A, P>, P>) {
        if size == 0 {
            debug_assert_eq!(shift, WIDTH_BITS);
            return (shift, make_path(shift, SharedPointer::clone(tail)).internal());
        }
        if root.is_relaxed() {
            let mut visitor = PushTail {
                tail: Some(SharedPointer::clone(tail)),
                tail_len,
            };
            match visit_node(root, shift, size, &mut visitor) {
                Some(new_root) => (shift, new_root.internal()),
                None => {
                    let mut new_root = Internal::empty_internals();
                    new_root
                        .children
                        .push(NodeRef::Internal(SharedPointer::clone(root)));
                    new_root
                        .children
                        .push(make_path(shift, SharedPointer::clone(tail)));
                    let mut sizes = SizeTable::new();
                    sizes.push_cumulative(size);
                    sizes.push_cumulative(size + tail_len);
                    new_root.sizes = Some(sizes);
                    (shift + WIDTH_BITS, SharedPointer::new(new_root))
                }
            }
        } else if size == RRB_WIDTH << shift {
            let mut new_root = Internal::empty_internals();
            new_root
                .children
                .push(NodeRef::Internal(SharedPointer::clone(root)));
            new_root
                .children
                .push(make_path(shift, SharedPointer::clone(tail)));
            (shift + WIDTH_BITS, SharedPointer::new(new_root))
        } else {
            let mut visitor = PushTail {
                tail: Some(SharedPointer::clone(tail)),
                tail_len,
            };
            let new_root = visit_node(root, shift, size, &mut visitor)
                .expect("a non-full regular root always accepts the tail");
            (shift, new_root.internal())
        }
    }

    /// Returns a new vector holding the first `len` elements. Keeping more than the whole
    /// vector returns it unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3, 4, 5];
    /// assert_eq!(v.take(2), vector![1, 2]);
    /// assert_eq!(v.take(9), v);
    /// ```
    pub fn take(&self, len: usize) -> Self {
        if len == 0 {
            return RrbTree::new();
        }
        if len >= self.size {
            return self.clone();
        }
        let tail_off = self.tail_offset();
        if len > tail_off {
            let tail = Leaf::from_slice(&self.tail.buffer.as_slice()[..len - tail_off]);
            return RrbTree {
                size: len,
                shift: self.shift,
                root: SharedPointer::clone(&self.root),
                tail: SharedPointer::new(tail),
            };
        }
        let mut visitor = SliceRight {
            last: len - 1,
            collapse: true,
        };
        let (shift, root, _, tail) = visit_node(&self.root, self.shift, tail_off, &mut visitor);
        match root {
            Some(root) => RrbTree {
                size: len,
                shift,
                root: root.internal(),
                tail,
            },
            None => RrbTree {
                size: len,
                shift: WIDTH_BITS,
                root: SharedPointer::new(Internal::empty_leaves()),
                tail,
            },
        }
    }

    /// Returns a new vector without the first `from` elements. Skipping the whole vector
    /// or more returns an empty vector.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3, 4, 5];
    /// assert_eq!(v.skip(3), vector![4, 5]);
    /// assert_eq!(v.skip(0), v);
    /// ```
    pub fn skip(&self, from: usize) -> Self {
        if from == 0 {
            return self.clone();
        }
        if from >= self.size {
            return RrbTree::new();
        }
        let tail_off = self.tail_offset();
        if from == tail_off {
            return RrbTree {
                size: self.size - from,
                shift: WIDTH_BITS,
                root: SharedPointer::new(Internal::empty_leaves()),
                tail: SharedPointer::clone(&self.tail),
            };
        }
        if from > tail_off {
            let tail = Leaf::from_slice(&self.tail.buffer.as_slice()[from - tail_off..]);
            return RrbTree {
                size: self.size - from,
                shift: WIDTH_BITS,
                root: SharedPointer::new(Internal::empty_leaves()),
                tail: SharedPointer::new(tail),
            };
        }
        let mut visitor = SliceLeft {
            first: from,
            collapse: true,
        };
        let (shift, root) = visit_node(&self.root, self.shift, tail_off, &mut visitor);
        RrbTree {
            size: self.size - from,
            shift,
            root: root.internal(),
            tail: SharedPointer::clone(&self.tail),
        }
    }

    /// Splits the vector at the given index, returning the prefix and the suffix.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3, 4];
    /// let (front, back) = v.split_at(2);
    /// assert_eq!(front, vector![1, 2]);
    /// assert_eq!(back, vector![3, 4]);
    /// ```
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        (self.take(idx), self.skip(idx))
    }

    /// Returns a new vector holding the elements of `self` followed by the elements of
    /// `other`.
    ///
    /// The merged boundary is rebalanced, so a vector assembled from many concatenations
    /// keeps logarithmic lookups.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3].concat(&vector![4, 5, 6]);
    /// assert_eq!(v, vector![1, 2, 3, 4, 5, 6]);
    /// ```
    pub fn concat(&self, other: &Self) -> Self {
        if self.size == 0 {
            return other.clone();
        }
        if other.size == 0 {
            return self.clone();
        }
        if other.tail_offset() == 0 {
            // The right operand is tail only.
            let tail_off = self.tail_offset();
            let tail_len = self.size - tail_off;
            if tail_len == RRB_WIDTH {
                let (shift, root) =
                    Self::push_tail(&self.root, self.shift, tail_off, &self.tail, tail_len);
                return RrbTree {
                    size: self.size + other.size,
                    shift,
                    root,
                    tail: SharedPointer::clone(&other.tail),
                };
            }
            if tail_len + other.size <= RRB_WIDTH {
                let mut tail = (*self.tail).clone();
                tail.buffer.extend_from_slice(other.tail.buffer.as_slice());
                return RrbTree {
                    size: self.size + other.size,
                    shift: self.shift,
                    root: SharedPointer::clone(&self.root),
                    tail: SharedPointer::new(tail),
                };
            }
            let remaining = RRB_WIDTH - tail_len;
            let mut filled = (*self.tail).clone();
            filled
                .buffer
                .extend_from_slice(&other.tail.buffer.as_slice()[..remaining]);
            let new_tail = Leaf::from_slice(&other.tail.buffer.as_slice()[remaining..]);
            let (shift, root) = Self::push_tail(
                &self.root,
                self.shift,
                tail_off,
                &SharedPointer::new(filled),
                RRB_WIDTH,
            );
            return RrbTree {
                size: self.size + other.size,
                shift,
                root,
                tail: SharedPointer::new(new_tail),
            };
        }
        // General case: fold our tail into our root, then merge the two roots.
        let tail_off = self.tail_offset();
        let tail_len = self.size - tail_off;
        let (lshift, lroot) =
            Self::push_tail(&self.root, self.shift, tail_off, &self.tail, tail_len);
        let (shift, root) = concat_trees(
            &lroot,
            lshift,
            self.size,
            &other.root,
            other.shift,
            other.tail_offset(),
        );
        RrbTree {
            size: self.size + other.size,
            shift,
            root,
            tail: SharedPointer::clone(&other.tail),
        }
    }

    /// Calls the closure on every contiguous leaf range of the vector, in order.
    ///
    /// This is the hook iteration is built on: a full traversal visits `N / RRB_WIDTH`
    /// leaves rather than `N` elements.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v: Vector<usize> = (0..100).collect();
    /// let mut total = 0;
    /// v.for_each_chunk(|chunk| total += chunk.len());
    /// assert_eq!(total, 100);
    /// ```
    pub fn for_each_chunk<F: FnMut(&[A])>(&self, mut f: F) {
        let tail_off = self.tail_offset();
        if tail_off > 0 {
            let mut visitor = EachChunk { f: &mut f };
            visit_node(&self.root, self.shift, tail_off, &mut visitor);
        }
        if self.size > tail_off {
            f(self.tail.buffer.as_slice());
        }
    }

    /// Returns the leaf range holding `idx`: its elements and the range of indices it
    /// covers.
    fn leaf_for(&self, idx: usize) -> (&[A], usize, usize) {
        debug_assert!(idx < self.size);
        let tail_off = self.tail_offset();
        if idx >= tail_off {
            return (self.tail.buffer.as_slice(), tail_off, self.size);
        }
        let mut node = &self.root;
        let mut shift = self.shift;
        let mut local = idx;
        let mut base = 0;
        loop {
            let (slot, sub) = match &node.sizes {
                Some(sizes) => sizes.position_for(local, shift),
                None => {
                    let slot = (local >> shift) & MASK;
                    (slot, local - (slot << shift))
                }
            };
            base += local - sub;
            match &node.children {
                ChildList::Leaves(children) => {
                    let leaf = children.get(slot).unwrap();
                    return (leaf.buffer.as_slice(), base, base + leaf.len());
                }
                ChildList::Internals(children) => {
                    node = children.get(slot).unwrap();
                    shift -= WIDTH_BITS;
                    local = sub;
                }
            }
        }
    }

    /// Returns an iterator over the vector's elements.
    ///
    /// # Examples
    ///
    /// ```
    /// # #[macro_use] extern crate rrbtree;
    /// # use rrbtree::Vector;
    /// let v = vector![1, 2, 3];
    /// assert_eq!(v.iter().sum::<i32>(), 6);
    /// ```
    pub fn iter(&self) -> Iter<'_, A, P> {
        Iter {
            tree: self,
            front: 0,
            back: self.size,
            front_chunk: None,
            back_chunk: None,
        }
    }

    /// Begins an in-place edit of this vector. The edit initially shares every node with
    /// `self`; nodes are copied one by one as the edit touches them.
    pub fn transient(&self) -> Transient<A, P> {
        Transient { tree: self.clone() }
    }

    /// Checks the structural invariants of the whole tree, panicking on any violation.
    /// Used by the tests after every operation; always returns true otherwise.
    pub fn assert_invariants(&self) -> bool {
        assert!(self.shift >= WIDTH_BITS);
        let tail_off = self.tail_offset();
        let tail_len = self.size - tail_off;
        assert!(tail_len <= RRB_WIDTH);
        assert_eq!(self.tail.len(), tail_len);
        if self.size > 0 {
            assert!(tail_len > 0);
        }
        if tail_off == 0 {
            assert_eq!(self.root.slots(), 0);
            assert_eq!(self.shift, WIDTH_BITS);
            assert!(!self.root.is_relaxed());
        } else {
            if !self.root.is_relaxed() {
                assert_eq!(tail_off & MASK, 0);
            }
            self.root.debug_check(self.shift, tail_off);
        }
        true
    }
}

impl<A, P> Clone for RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    fn clone(&self) -> Self {
        RrbTree {
            size: self.size,
            shift: self.shift,
            root: SharedPointer::clone(&self.root),
            tail: SharedPointer::clone(&self.tail),
        }
    }
}

impl<A, P> Default for RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    fn default() -> Self {
        RrbTree::new()
    }
}

impl<A, P> Debug for RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<A, P, P2> PartialEq<RrbTree<A, P2>> for RrbTree<A, P>
where
    A: Clone + Debug + PartialEq,
    P: SharedPointerKind,
    P2: SharedPointerKind,
{
    fn eq(&self, other: &RrbTree<A, P2>) -> bool {
        self.size == other.size && self.iter().eq(other.iter())
    }
}

impl<A, P> Eq for RrbTree<A, P>
where
    A: Clone + Debug + Eq,
    P: SharedPointerKind,
{
}

impl<A, P> Hash for RrbTree<A, P>
where
    A: Clone + Debug + Hash,
    P: SharedPointerKind,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        for item in self.iter() {
            item.hash(state);
        }
    }
}

impl<A, P> Index<usize> for RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    type Output = A;

    fn index(&self, idx: usize) -> &A {
        self.get(idx).expect("Index out of bounds.")
    }
}

impl<A, P> FromIterator<A> for RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut transient = RrbTree::new().transient();
        for item in iter {
            transient.push_back(item);
        }
        transient.persistent()
    }
}

/// An iterator over a vector.
///
/// The iterator caches the leaf range it is standing in at each end, so a full traversal
/// performs one tree descent per leaf rather than one per element.
pub struct Iter<'a, A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    tree: &'a RrbTree<A, P>,
    front: usize,
    back: usize,
    front_chunk: Option<(&'a [A], usize, usize)>,
    back_chunk: Option<(&'a [A], usize, usize)>,
}

impl<'a, A, P> Iterator for Iter<'a, A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    type Item = &'a A;

    fn next(&mut self) -> Option<&'a A> {
        if self.front == self.back {
            return None;
        }
        let refresh = match self.front_chunk {
            Some((_, first, end)) => self.front < first || self.front >= end,
            None => true,
        };
        if refresh {
            self.front_chunk = Some(self.tree.leaf_for(self.front));
        }
        let (chunk, first, _) = self.front_chunk.unwrap();
        let item = &chunk[self.front - first];
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<'a, A, P> DoubleEndedIterator for Iter<'a, A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    fn next_back(&mut self) -> Option<&'a A> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        let refresh = match self.back_chunk {
            Some((_, first, end)) => self.back < first || self.back >= end,
            None => true,
        };
        if refresh {
            self.back_chunk = Some(self.tree.leaf_for(self.back));
        }
        let (chunk, first, _) = self.back_chunk.unwrap();
        Some(&chunk[self.back - first])
    }
}

impl<'a, A, P> ExactSizeIterator for Iter<'a, A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
}

impl<'a, A, P> FusedIterator for Iter<'a, A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
}

impl<'a, A, P> Clone for Iter<'a, A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    fn clone(&self) -> Self {
        Iter {
            tree: self.tree,
            front: self.front,
            back: self.back,
            front_chunk: self.front_chunk,
            back_chunk: self.back_chunk,
        }
    }
}

impl<'a, A, P> IntoIterator for &'a RrbTree<A, P>
where
    A: Clone + Debug,
    P: SharedPointerKind,
{
    type Item = &'a A;
    type IntoIter = Iter<'a, A, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use proptest::proptest;
    use proptest_derive::Arbitrary;

    const MAX_EXTEND_SIZE: usize = 256;

    fn sequential(len: usize) -> Vector<usize> {
        (0..len).collect()
    }

    fn assert_matches(vector: &Vector<u64>, model: &[u64]) {
        assert!(vector.assert_invariants());
        assert_eq!(vector.len(), model.len());
        assert!(vector.iter().eq(model.iter()));
    }

    #[test]
    pub fn empty() {
        let empty: Vector<usize> = Vector::new();

        // Len
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert!(empty.assert_invariants());

        // Back and front
        assert_eq!(empty.back(), None);
        assert_eq!(empty.front(), None);

        // Concat
        let empty_concat = empty.concat(&empty);
        assert!(empty_concat.is_empty());

        // Slice
        assert!(empty.take(10).is_empty());
        assert!(empty.skip(10).is_empty());

        // Iter
        assert_eq!(empty.iter().next(), None);
    }

    #[test]
    pub fn single() {
        let single = Vector::unit(9);

        assert!(!single.is_empty());
        assert_eq!(single.len(), 1);
        assert_eq!(single.front(), Some(&9));
        assert_eq!(single.back(), Some(&9));
        assert_eq!(single.get(0), Some(&9));
        assert_eq!(single.get(1), None);
        assert_eq!(single[0], 9);
        assert!(single.assert_invariants());
    }

    #[test]
    pub fn push_and_get_a_thousand() {
        let mut v = Vector::new();
        for i in 0..1000 {
            v = v.push_back(i);
        }
        assert_eq!(v.len(), 1000);
        assert!(v.assert_invariants());
        for i in 0..1000 {
            assert_eq!(v.get(i), Some(&i));
        }
        assert_eq!(v.get(1000), None);
    }

    #[test]
    pub fn update_middle() {
        let v = sequential(1000);
        let w = v.update(500, |x| x + 1000);
        assert!(w.assert_invariants());
        assert_eq!(w.get(500), Some(&1500));
        assert_eq!(w.get(499), Some(&499));
        assert_eq!(w.get(501), Some(&501));
        // The original is untouched.
        assert_eq!(v.get(500), Some(&500));
    }

    #[test]
    pub fn concat_small_onto_full_leaves() {
        let a = sequential(256);
        let b: Vector<usize> = (32..64).collect();
        let joined = a.concat(&b);
        assert!(joined.assert_invariants());
        assert_eq!(joined.len(), 288);
        assert_eq!(joined.get(255), Some(&255));
        assert_eq!(joined.get(256), Some(&32));
        assert_eq!(joined.get(287), Some(&63));
    }

    #[test]
    pub fn take_a_third() {
        let v = sequential(1000);
        let front = v.take(333);
        assert!(front.assert_invariants());
        assert_eq!(front.len(), 333);
        assert_eq!(front.get(332), Some(&332));
        assert_eq!(front.get(333), None);
        assert_eq!(v.get(332), Some(&332));
        assert_eq!(v.len(), 1000);
    }

    #[test]
    pub fn skip_a_third() {
        let v = sequential(1000);
        let back = v.skip(333);
        assert!(back.assert_invariants());
        assert_eq!(back.len(), 667);
        assert_eq!(back.get(0), Some(&333));
        assert_eq!(back.get(666), Some(&999));
        assert_eq!(v.get(0), Some(&0));
    }

    #[test]
    pub fn repeated_self_concat() {
        let mut v = sequential(100);
        for _ in 0..10 {
            v = v.concat(&v);
            assert!(v.assert_invariants());
        }
        assert_eq!(v.len(), 102_400);
        for idx in (0..102_400).step_by(997) {
            assert_eq!(v.get(idx), Some(&(idx % 100)));
        }
        assert_eq!(v.get(102_399), Some(&99));
    }

    #[test]
    pub fn three_levels_deep() {
        const N: usize = 40_000;
        let v = sequential(N);
        assert!(v.assert_invariants());
        for i in (0..N).step_by(41) {
            assert_eq!(v.get(i), Some(&i));
        }

        let front = v.take(N - 12_345);
        assert!(front.assert_invariants());
        assert_eq!(front.len(), N - 12_345);
        for i in (0..front.len()).step_by(733) {
            assert_eq!(front.get(i), Some(&i));
        }

        let back = v.skip(12_345);
        assert!(back.assert_invariants());
        assert_eq!(back.len(), N - 12_345);
        for i in (0..back.len()).step_by(733) {
            assert_eq!(back.get(i), Some(&(i + 12_345)));
        }

        let rejoined = front.take(7_000).concat(&v.skip(7_000));
        assert!(rejoined.assert_invariants());
        assert_eq!(rejoined.len(), N);
        for i in (0..N).step_by(733) {
            assert_eq!(rejoined.get(i), Some(&i));
        }
    }

    #[test]
    pub fn round_trip_split() {
        for len in &[0, 1, 31, 32, 33, 100, 1024, 1057, 5000] {
            let v = sequential(*len);
            for cut in &[0, 1, *len / 3, *len / 2, *len] {
                let (front, back) = v.split_at(*cut);
                assert!(front.assert_invariants());
                assert!(back.assert_invariants());
                let rejoined = front.concat(&back);
                assert!(rejoined.assert_invariants());
                assert_eq!(rejoined, v);
            }
        }
    }

    #[test]
    pub fn idempotent_slices() {
        let v = sequential(2500);
        assert_eq!(v.take(v.len()), v);
        assert_eq!(v.skip(0), v);
        assert!(v.take(0).is_empty());
        assert!(v.skip(v.len()).is_empty());
    }

    #[test]
    pub fn iterator_both_ends() {
        const N: usize = 10_000;
        let v = sequential(N);
        assert_eq!(
            v.iter().copied().collect::<Vec<_>>(),
            (0..N).collect::<Vec<_>>()
        );
        assert_eq!(
            v.iter().rev().copied().collect::<Vec<_>>(),
            (0..N).rev().collect::<Vec<_>>()
        );
        let mut iter = v.iter();
        assert_eq!(iter.len(), N);
        assert_eq!(iter.next(), Some(&0));
        assert_eq!(iter.next_back(), Some(&(N - 1)));
        assert_eq!(iter.len(), N - 2);
    }

    #[test]
    pub fn chunks_cover_everything() {
        let v = sequential(3000).skip(17).take(2500);
        let mut collected = Vec::new();
        v.for_each_chunk(|chunk| collected.extend_from_slice(chunk));
        assert_eq!(collected, (17..2517).collect::<Vec<_>>());
    }

    #[test]
    pub fn transient_round_trip() {
        let v = sequential(1234);
        let w = v.transient().persistent();
        assert_eq!(v, w);
    }

    #[test]
    pub fn collection_traits() {
        let v: Vector<usize> = (0..10).collect();
        assert_eq!(v, vector![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(v[3], 3);
        assert_eq!((&v).into_iter().count(), 10);

        use std::collections::hash_map::DefaultHasher;
        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        v.hash(&mut h1);
        (0..10).collect::<Vector<usize>>().hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    pub fn thread_safe_flavor() {
        let v: ThreadSafeVector<usize> = (0..100).collect();
        assert!(v.assert_invariants());
        let handle = {
            let v = v.clone();
            std::thread::spawn(move || v.iter().sum::<usize>())
        };
        assert_eq!(handle.join().unwrap(), 4950);
    }

    #[derive(Arbitrary)]
    enum Action<A: Clone + Debug + Arbitrary + 'static>
    where A: Arbitrary<Parameters = ()> {
        PushBack(A),
        #[proptest(no_params)]
        Set(usize, A),
        Update(usize),
        Take(usize),
        Skip(usize),
        #[proptest(
            strategy = "prop::collection::vec(any::<A>(), 0..MAX_EXTEND_SIZE).prop_map(Action::ConcatBack)"
        )]
        ConcatBack(Vec<A>),
        #[proptest(
            strategy = "prop::collection::vec(any::<A>(), 0..MAX_EXTEND_SIZE).prop_map(Action::ConcatFront)"
        )]
        ConcatFront(Vec<A>),
    }

    impl<A: Clone + Debug + Arbitrary<Parameters = ()> + 'static> Debug for Action<A> {
        fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
            match self {
                Action::PushBack(item) => {
                    fmt.write_str(&format!("vector = vector.push_back({:?});\n", item))?;
                }
                Action::Set(idx, item) => {
                    fmt.write_str(&format!(
                        "let idx = {:?} % vector.len(); vector = vector.set(idx, {:?});\n",
                        idx, item
                    ))?;
                }
                Action::Update(idx) => {
                    fmt.write_str(&format!(
                        "let idx = {:?} % vector.len(); vector = vector.update(idx, f);\n",
                        idx
                    ))?;
                }
                Action::Take(len) => {
                    fmt.write_str(&format!(
                        "let len = {:?} % (1 + vector.len()); vector = vector.take(len);\n",
                        len
                    ))?;
                }
                Action::Skip(from) => {
                    fmt.write_str(&format!(
                        "let from = {:?} % (1 + vector.len()); vector = vector.skip(from);\n",
                        from
                    ))?;
                }
                Action::ConcatBack(items) => {
                    fmt.write_str(&format!(
                        "let other: Vector<u64> = vec!{:?}.into_iter().collect(); vector = vector.concat(&other);\n",
                        items
                    ))?;
                }
                Action::ConcatFront(items) => {
                    fmt.write_str(&format!(
                        "let other: Vector<u64> = vec!{:?}.into_iter().collect(); vector = other.concat(&vector);\n",
                        items
                    ))?;
                }
            }
            Ok(())
        }
    }

    #[derive(Arbitrary)]
    struct ActionList<A: Clone + Debug + Arbitrary + 'static>
    where A: Arbitrary<Parameters = ()> {
        actions: Vec<Action<A>>,
    }

    impl<A: Clone + Debug + Arbitrary<Parameters = ()> + 'static> Debug for ActionList<A> {
        fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
            fmt.write_str("let mut vector = Vector::new();\n")?;
            for action in &self.actions {
                fmt.write_str(&format!(
                    "{:?}assert!(vector.assert_invariants());\n",
                    action
                ))?;
            }
            Ok(())
        }
    }

    proptest! {
        #[test]
        fn random_persistent_ops(actions: ActionList<u64>) {
            let mut model: Vec<u64> = Vec::new();
            let mut vector: Vector<u64> = Vector::new();

            for action in &actions.actions {
                match action {
                    Action::PushBack(item) => {
                        model.push(*item);
                        vector = vector.push_back(*item);
                    }
                    Action::Set(idx, item) => {
                        if !model.is_empty() {
                            let idx = idx % model.len();
                            model[idx] = *item;
                            vector = vector.set(idx, *item);
                        }
                    }
                    Action::Update(idx) => {
                        if !model.is_empty() {
                            let idx = idx % model.len();
                            model[idx] = model[idx].wrapping_add(1);
                            vector = vector.update(idx, |x| x.wrapping_add(1));
                        }
                    }
                    Action::Take(len) => {
                        let len = len % (1 + model.len());
                        model.truncate(len);
                        vector = vector.take(len);
                    }
                    Action::Skip(from) => {
                        let from = from % (1 + model.len());
                        model.drain(..from);
                        vector = vector.skip(from);
                    }
                    Action::ConcatBack(items) => {
                        model.extend_from_slice(items);
                        let other: Vector<u64> = items.iter().copied().collect();
                        vector = vector.concat(&other);
                    }
                    Action::ConcatFront(items) => {
                        let other: Vector<u64> = items.iter().copied().collect();
                        vector = other.concat(&vector);
                        let mut front = items.clone();
                        front.extend_from_slice(&model);
                        model = front;
                    }
                }
                assert_matches(&vector, &model);
            }

            assert!(vector.iter().rev().eq(model.iter().rev()));
        }

        #[test]
        fn random_transient_matches_persistent(actions: ActionList<u64>) {
            let mut persistent: Vector<u64> = Vector::new();
            let mut transient = Vector::new().transient();

            for action in &actions.actions {
                match action {
                    Action::PushBack(item) => {
                        persistent = persistent.push_back(*item);
                        transient.push_back(*item);
                    }
                    Action::Set(idx, item) => {
                        if !persistent.is_empty() {
                            let idx = idx % persistent.len();
                            persistent = persistent.set(idx, *item);
                            transient.set(idx, *item);
                        }
                    }
                    Action::Update(idx) => {
                        if !persistent.is_empty() {
                            let idx = idx % persistent.len();
                            persistent = persistent.update(idx, |x| x.wrapping_add(1));
                            transient.update(idx, |x| x.wrapping_add(1));
                        }
                    }
                    Action::Take(len) => {
                        let len = len % (1 + persistent.len());
                        persistent = persistent.take(len);
                        transient.slice_from_start(len);
                    }
                    Action::Skip(from) => {
                        let from = from % (1 + persistent.len());
                        persistent = persistent.skip(from);
                        transient.slice_to_end(from);
                    }
                    Action::ConcatBack(items) => {
                        let other: Vector<u64> = items.iter().copied().collect();
                        persistent = persistent.concat(&other);
                        transient.append(other.transient());
                    }
                    Action::ConcatFront(items) => {
                        let other: Vector<u64> = items.iter().copied().collect();
                        persistent = other.concat(&persistent);
                        let back = std::mem::replace(&mut transient, other.transient());
                        transient.append(back);
                    }
                }
            }

            let result = transient.persistent();
            assert!(result.assert_invariants());
            assert_eq!(result, persistent);
        }

        #[test]
        fn take_keeps_a_prefix(len in 0usize..1500, cut: usize) {
            let v = sequential(len);
            let n = cut % (1 + len);
            let front = v.take(n);
            assert!(front.assert_invariants());
            assert_eq!(front.len(), n);
            assert!(front.iter().eq((0..n).collect::<Vec<_>>().iter()));
            assert_eq!(v.len(), len);
        }

        #[test]
        fn skip_keeps_a_suffix(len in 0usize..1500, cut: usize) {
            let v = sequential(len);
            let n = cut % (1 + len);
            let back = v.skip(n);
            assert!(back.assert_invariants());
            assert_eq!(back.len(), len - n);
            assert!(back.iter().eq((n..len).collect::<Vec<_>>().iter()));
        }

        #[test]
        fn concat_joins(left in 0usize..800, right in 0usize..800) {
            let a = sequential(left);
            let b: Vector<usize> = (left..left + right).collect();
            let joined = a.concat(&b);
            assert!(joined.assert_invariants());
            assert_eq!(joined.len(), left + right);
            assert!(joined.iter().eq((0..left + right).collect::<Vec<_>>().iter()));
        }

        #[test]
        fn split_concat_is_identity(len in 0usize..1200, cut: usize) {
            let v = sequential(len);
            let n = cut % (1 + len);
            let rejoined = v.take(n).concat(&v.skip(n));
            assert!(rejoined.assert_invariants());
            assert_eq!(rejoined, v);
        }
    }
}
