//! A size table implementation.
//!
//! The size table maps a position to a child index in a relaxed node of the RRB tree. It
//! stores cumulative totals: entry `i` is the number of elements in children `0..=i`, so
//! the last entry is the total size of the node and lookups are a scan for the first entry
//! exceeding the queried position.

use crate::buffer::Buffer;
use crate::{MASK, RRB_WIDTH};

/// A cumulative table of the sizes of a relaxed node's children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SizeTable {
    buffer: Buffer<usize>,
}

impl SizeTable {
    /// Constructs a new empty `SizeTable`.
    pub fn new() -> Self {
        SizeTable {
            buffer: Buffer::new(),
        }
    }

    /// Returns the number of children tracked by the table, not the size of the node!
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the table tracks no children.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the total size of the node.
    pub fn total(&self) -> usize {
        self.buffer.back().copied().unwrap_or_default()
    }

    /// Returns the sum of the sizes of children `0..=idx`.
    pub fn cumulative(&self, idx: usize) -> usize {
        *self.buffer.get(idx).unwrap()
    }

    /// Returns the sum of the sizes of the children before `idx`.
    pub fn size_before(&self, idx: usize) -> usize {
        if idx == 0 {
            0
        } else {
            self.cumulative(idx - 1)
        }
    }

    /// Returns the size of the child at the given index.
    pub fn child_size(&self, idx: usize) -> usize {
        self.cumulative(idx) - self.size_before(idx)
    }

    /// Returns the position of the child that holds the given index, along with the
    /// remaining index to query in that child.
    ///
    /// The scan starts from the radix guess for `shift`; relaxed children are never larger
    /// than dense ones, so the guess can only undershoot.
    pub fn position_for(&self, idx: usize, shift: usize) -> (usize, usize) {
        debug_assert!(idx < self.total());
        let mut slot = (idx >> shift) & MASK;
        debug_assert!(slot < self.len());
        while self.cumulative(slot) <= idx {
            slot += 1;
        }
        (slot, idx - self.size_before(slot))
    }

    /// Adds a child of the given size to the back of the table.
    pub fn push_child_size(&mut self, size: usize) {
        let total = self.total();
        self.buffer.push_back(total + size);
    }

    /// Adds a child to the back of the table by its cumulative total.
    pub fn push_cumulative(&mut self, cumulative: usize) {
        debug_assert!(self.is_empty() || cumulative > self.total());
        self.buffer.push_back(cumulative);
    }

    /// Overwrites the cumulative total at the given index.
    pub fn set_cumulative(&mut self, idx: usize, cumulative: usize) {
        *self.buffer.get_mut(idx).unwrap() = cumulative;
    }

    /// Adds a number of elements to the last child.
    pub fn add_to_last(&mut self, increment: usize) {
        *self.buffer.back_mut().unwrap() += increment;
    }

    /// Shortens the table to the first `new_len` children.
    pub fn truncate(&mut self, new_len: usize) {
        self.buffer.truncate(new_len);
    }

    /// Checks that the table could belong to a well formed node: non-empty, strictly
    /// increasing, and with every child size in `1..=1 << shift`.
    pub fn debug_check(&self, shift: usize) -> bool {
        assert!(!self.is_empty());
        assert!(self.len() <= RRB_WIDTH);
        let mut last = 0;
        for i in 0..self.len() {
            let cumulative = self.cumulative(i);
            assert!(cumulative > last);
            assert!(cumulative - last <= 1 << shift);
            last = cumulative;
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::WIDTH_BITS;

    #[test]
    fn empty() {
        let empty = SizeTable::new();
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert_eq!(empty.total(), 0);
    }

    #[test]
    fn linear() {
        let length = RRB_WIDTH;
        let mut linear = SizeTable::new();
        for i in 0..length {
            linear.push_child_size(i + 1);
        }

        assert!(!linear.is_empty());
        assert_eq!(linear.len(), length);

        for i in 0..length {
            assert_eq!(linear.cumulative(i), (i + 1) * (i + 2) / 2);
            assert_eq!(linear.child_size(i), i + 1);
            assert_eq!(linear.size_before(i), i * (i + 1) / 2);
        }
        assert_eq!(linear.total(), length * (length + 1) / 2);

        linear.add_to_last(10);
        assert_eq!(linear.total(), length * (length + 1) / 2 + 10);
        assert_eq!(linear.child_size(length - 1), length + 10);

        linear.truncate(4);
        assert_eq!(linear.len(), 4);
        assert_eq!(linear.total(), 10);
    }

    #[test]
    fn position_for_dense() {
        let mut table = SizeTable::new();
        for _ in 0..8 {
            table.push_child_size(RRB_WIDTH);
        }
        for idx in 0..8 * RRB_WIDTH {
            let (slot, sub) = table.position_for(idx, WIDTH_BITS);
            assert_eq!(slot, idx / RRB_WIDTH);
            assert_eq!(sub, idx % RRB_WIDTH);
        }
    }

    #[test]
    fn position_for_relaxed() {
        let sizes = [3, RRB_WIDTH, 1, 17, RRB_WIDTH, 2];
        let mut table = SizeTable::new();
        for size in sizes.iter() {
            table.push_child_size(*size);
        }
        let mut idx = 0;
        for (slot, size) in sizes.iter().enumerate() {
            for sub in 0..*size {
                assert_eq!(table.position_for(idx, WIDTH_BITS), (slot, sub));
                idx += 1;
            }
        }
        assert_eq!(idx, table.total());
    }
}
