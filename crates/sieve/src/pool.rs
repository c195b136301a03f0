//! Contiguous storage for PSM feature vectors
//!
//! Every PSM owns exactly one fixed-width row of `f64`s. Rows are addressed by
//! [`Slot`] index rather than by reference, so that rows can be relocated
//! (e.g. to make each cross-validation fold contiguous) without leaving any
//! dangling handles: the pool records which PSM owns each slot, and a swap
//! reports the new location of both rows.

use crate::psm::PsmIx;
use crate::Error;

/// Index of a feature row inside a [`FeaturePool`]
#[derive(Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub usize);

#[derive(Clone, Debug, Default)]
pub struct FeaturePool {
    width: usize,
    data: Vec<f64>,
    owners: Vec<Option<PsmIx>>,
    free: Vec<Slot>,
}

impl FeaturePool {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    /// Total number of slots, allocated or free
    pub fn capacity(&self) -> usize {
        self.owners.len()
    }

    /// Number of slots currently owned by a PSM
    pub fn allocated(&self) -> usize {
        self.owners.iter().filter(|o| o.is_some()).count()
    }

    /// Hand out a zeroed row to `owner`, reusing a returned slot if possible
    pub fn allocate(&mut self, owner: PsmIx) -> Slot {
        while let Some(slot) = self.free.pop() {
            // Entries on the free list can go stale when a free slot is
            // swapped with an owned one
            if self.owners[slot.0].is_none() {
                self.owners[slot.0] = Some(owner);
                self.row_mut(slot).iter_mut().for_each(|x| *x = 0.0);
                return slot;
            }
        }
        let slot = Slot(self.owners.len());
        self.owners.push(Some(owner));
        self.data.extend(std::iter::repeat(0.0).take(self.width));
        slot
    }

    /// Allocate a row for `owner` and copy `features` into it
    pub fn insert(&mut self, owner: PsmIx, features: &[f64]) -> Result<Slot, Error> {
        if features.len() != self.width {
            return Err(Error::FeatureWidth {
                expected: self.width,
                found: features.len(),
            });
        }
        let slot = self.allocate(owner);
        self.row_mut(slot).copy_from_slice(features);
        Ok(slot)
    }

    /// Return a row to the pool
    pub fn deallocate(&mut self, slot: Slot) {
        if self.owners[slot.0].take().is_some() {
            self.free.push(slot);
        }
    }

    pub fn address_from_index(&self, ix: usize) -> Slot {
        assert!(
            ix < self.owners.len(),
            "slot {} out of bounds for pool of {} rows",
            ix,
            self.owners.len()
        );
        Slot(ix)
    }

    pub fn owner(&self, slot: Slot) -> Option<PsmIx> {
        self.owners[slot.0]
    }

    pub fn row(&self, slot: Slot) -> &[f64] {
        let start = slot.0 * self.width;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, slot: Slot) -> &mut [f64] {
        let start = slot.0 * self.width;
        &mut self.data[start..start + self.width]
    }

    /// Exchange the contents (and owners) of two rows in place. Returns the
    /// owners of `a` and `b` *after* the swap, so callers can update the
    /// handles held by those PSMs.
    pub fn swap(&mut self, a: Slot, b: Slot) -> (Option<PsmIx>, Option<PsmIx>) {
        if a != b {
            let w = self.width;
            let (lo, hi) = if a.0 < b.0 { (a.0, b.0) } else { (b.0, a.0) };
            let (left, right) = self.data.split_at_mut(hi * w);
            left[lo * w..(lo + 1) * w].swap_with_slice(&mut right[..w]);
            self.owners.swap(lo, hi);

            for slot in [a, b] {
                if self.owners[slot.0].is_none() {
                    self.free.push(slot);
                }
            }
        }
        (self.owners[a.0], self.owners[b.0])
    }
}
