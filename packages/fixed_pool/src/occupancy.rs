use bitvec::order::Lsb0;
use bitvec::slice::IterOnes;
use bitvec::vec::BitVec;

/// Tracks which slots of a pool hold an item.
///
/// There is one flag per slot plus a running count of the set flags. The count lets us answer
/// "is the pool full" without scanning.
///
/// Vacant slots are always handed out lowest index first. We do not cache the lowest vacancy -
/// finding it is a scan over the flag words, which is cheap for any reasonable capacity and keeps
/// the reuse order trivially deterministic.
#[derive(Debug)]
pub(crate) struct OccupancyMap {
    // Slot index to "holds an item" status.
    occupied: BitVec,

    live_count: usize,
}

impl OccupancyMap {
    /// Creates a map where every slot is vacant.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            occupied: BitVec::repeat(false, capacity),
            live_count: 0,
        }
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.occupied.len()
    }

    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub(crate) fn live_count(&self) -> usize {
        self.live_count
    }

    #[must_use]
    pub(crate) fn is_full(&self) -> bool {
        self.live_count >= self.capacity()
    }

    /// Whether the slot at `index` holds an item. Out of bounds indexes are never occupied.
    #[must_use]
    pub(crate) fn is_occupied(&self, index: usize) -> bool {
        self.occupied.get(index).is_some_and(|flag| *flag)
    }

    /// Index of the lowest-index vacant slot or `None` if every slot is occupied.
    #[must_use]
    pub(crate) fn first_vacant(&self) -> Option<usize> {
        if self.is_full() {
            return None;
        }

        self.occupied.first_zero()
    }

    /// Indexes of all occupied slots, in ascending order.
    pub(crate) fn occupied_indexes(&self) -> IterOnes<'_, usize, Lsb0> {
        self.occupied.iter_ones()
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds or the slot is already occupied.
    pub(crate) fn mark_occupied(&mut self, index: usize) {
        let was_occupied = self.occupied.replace(index, true);

        assert!(
            !was_occupied,
            "slot {index} was already occupied when marked as occupied"
        );

        self.live_count = self
            .live_count
            .checked_add(1)
            .expect("guarded by the slot having been vacant, so count is below capacity");
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds or the slot is already vacant.
    pub(crate) fn mark_vacant(&mut self, index: usize) {
        let was_occupied = self.occupied.replace(index, false);

        assert!(
            was_occupied,
            "slot {index} was already vacant when marked as vacant"
        );

        self.live_count = self
            .live_count
            .checked_sub(1)
            .expect("guarded by the slot having been occupied, so count must be non-zero");
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    pub(crate) fn integrity_check(&self) {
        let observed_occupied_count = self.occupied.count_ones();

        assert!(
            self.live_count == observed_occupied_count,
            "live count {} does not match the observed occupied count {}",
            self.live_count,
            observed_occupied_count
        );

        assert!(
            self.live_count <= self.capacity(),
            "live count {} exceeds capacity {}",
            self.live_count,
            self.capacity()
        );
    }
}
