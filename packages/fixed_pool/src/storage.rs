use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::any::type_name;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use num_integer::Integer;

use crate::{Error, Result};

/// Uninitialized backing storage for the slots of a `FixedPool`.
///
/// This is one heap allocation of `capacity` consecutive `T`-sized slots, obtained directly at
/// the alignment of `T` so every slot satisfies it, including over-aligned types. The storage
/// knows nothing about which slots hold values - the owner tracks that and must drop any values
/// before the storage itself is dropped. Dropping the storage only releases the memory.
pub(crate) struct SlotStorage<T> {
    first_slot_ptr: NonNull<MaybeUninit<T>>,

    capacity: usize,

    /// Layout of the entire allocation. Its size is exactly `capacity * size_of::<T>()`.
    layout: Layout,

    _owns: PhantomData<T>,
}

impl<T> SlotStorage<T> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero or the storage would be too big
    /// to describe with a [`Layout`]. Nothing is allocated in that case.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    pub(crate) fn new(capacity: usize) -> Result<Self> {
        assert!(
            size_of::<T>() > 0,
            "FixedPool must have non-zero item size"
        );

        if capacity == 0 {
            return Err(Error::InvalidCapacity { capacity });
        }

        let Ok(layout) = Layout::array::<T>(capacity) else {
            return Err(Error::InvalidCapacity { capacity });
        };

        // SAFETY: The layout is not zero-sized (both capacity and item size are non-zero).
        let ptr = unsafe { alloc(layout) };

        let Some(first_slot_ptr) = NonNull::new(ptr.cast::<MaybeUninit<T>>()) else {
            handle_alloc_error(layout);
        };

        Ok(Self {
            first_slot_ptr,
            capacity,
            layout,
            _owns: PhantomData,
        })
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot_ptr(&self, index: usize) -> NonNull<MaybeUninit<T>> {
        assert!(
            index < self.capacity,
            "slot {index} index out of bounds in pool of {} with capacity {}",
            type_name::<T>(),
            self.capacity
        );

        // SAFETY: Guarded by bounds check above, so the result is inside our allocation.
        unsafe { self.first_slot_ptr.add(index) }
    }

    /// Resolves an address to the index of the slot that starts at that address.
    ///
    /// This only performs address arithmetic and says nothing about whether the slot holds
    /// a value. The pointer is never dereferenced.
    ///
    /// # Errors
    ///
    /// * [`Error::AddressNotInPool`] if the address is outside the storage.
    /// * [`Error::AddressMisaligned`] if the address is inside the storage but not at the
    ///   start of a slot.
    pub(crate) fn index_of(&self, ptr: *const T) -> Result<usize> {
        let address = ptr.addr();
        let base = self.first_slot_ptr.as_ptr().addr();

        let Some(offset) = address
            .checked_sub(base)
            .filter(|offset| *offset < self.layout.size())
        else {
            return Err(Error::AddressNotInPool { address });
        };

        let (index, remainder) = offset.div_rem(&size_of::<T>());

        if remainder != 0 {
            return Err(Error::AddressMisaligned { address, offset });
        }

        Ok(index)
    }

    /// Moves `value` into the slot at `index` and returns a pointer to it.
    ///
    /// Any value already in the slot is overwritten without being dropped.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn write(&mut self, index: usize, value: T) -> NonNull<T> {
        let mut slot_ptr = self.slot_ptr(index);

        // SAFETY: The pointer is in bounds and aligned, `MaybeUninit` has no validity
        // requirements and we hold an exclusive reference to the storage.
        let slot = unsafe { slot_ptr.as_mut() };

        NonNull::from(slot.write(value))
    }

    /// # Safety
    ///
    /// The slot at `index` must hold an initialized value.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) unsafe fn get(&self, index: usize) -> &T {
        let slot_ptr = self.slot_ptr(index).cast::<T>();

        // SAFETY: Forwarding the "initialized" requirement to the caller. Shared access is
        // enforced by our own `&self` receiver.
        unsafe { slot_ptr.as_ref() }
    }

    /// # Safety
    ///
    /// The slot at `index` must hold an initialized value.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[allow(
        clippy::needless_pass_by_ref_mut,
        reason = "exclusive access to the slot is granted through the exclusive receiver"
    )]
    pub(crate) unsafe fn get_mut(&mut self, index: usize) -> &mut T {
        let mut slot_ptr = self.slot_ptr(index).cast::<T>();

        // SAFETY: Forwarding the "initialized" requirement to the caller. Exclusive access is
        // enforced by our own `&mut self` receiver.
        unsafe { slot_ptr.as_mut() }
    }

    /// Drops the value in the slot at `index`, leaving the slot uninitialized.
    ///
    /// # Safety
    ///
    /// The slot at `index` must hold an initialized value. The caller must treat the slot as
    /// uninitialized afterwards.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[allow(
        clippy::needless_pass_by_ref_mut,
        reason = "exclusive access to the slot is granted through the exclusive receiver"
    )]
    pub(crate) unsafe fn drop_in_place(&mut self, index: usize) {
        let slot_ptr = self.slot_ptr(index).cast::<T>();

        // SAFETY: Forwarding the requirements to the caller.
        unsafe {
            slot_ptr.drop_in_place();
        }
    }
}

impl<T> Drop for SlotStorage<T> {
    fn drop(&mut self) {
        // SAFETY: The layout must match between alloc and dealloc. It does.
        unsafe {
            dealloc(self.first_slot_ptr.as_ptr().cast(), self.layout);
        }
    }
}

impl<T> std::fmt::Debug for SlotStorage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotStorage")
            .field("first_slot_ptr", &self.first_slot_ptr)
            .field("capacity", &self.capacity)
            .field("layout", &self.layout)
            .finish()
    }
}

// SAFETY: The storage owns its memory exclusively and hands out no references that outlive a
// borrow of itself, so it can move between threads as long as the values in it can.
unsafe impl<T: Send> Send for SlotStorage<T> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use super::*;

    #[repr(align(64))]
    struct CacheLineAligned([u8; 64]);

    #[repr(align(512))]
    struct PageFragmentAligned([u8; 8]);

    #[test]
    fn zero_capacity_is_rejected() {
        let result = SlotStorage::<u64>::new(0);

        assert_eq!(result.unwrap_err(), Error::InvalidCapacity { capacity: 0 });
    }

    #[test]
    fn oversized_capacity_is_rejected() {
        let result = SlotStorage::<u64>::new(usize::MAX);

        assert_eq!(
            result.unwrap_err(),
            Error::InvalidCapacity {
                capacity: usize::MAX
            }
        );
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        drop(SlotStorage::<()>::new(3));
    }

    #[test]
    fn write_then_read() {
        let mut storage = SlotStorage::<u64>::new(3).unwrap();

        storage.write(0, 10);
        storage.write(2, 12);

        assert_eq!(unsafe { *storage.get(0) }, 10);
        assert_eq!(unsafe { *storage.get(2) }, 12);

        unsafe {
            *storage.get_mut(2) = 22;
        }
        assert_eq!(unsafe { *storage.get(2) }, 22);
    }

    #[test]
    #[should_panic]
    fn write_out_of_bounds_panics() {
        let mut storage = SlotStorage::<u64>::new(3).unwrap();

        storage.write(3, 10);
    }

    #[test]
    fn index_of_slot_starts() {
        let mut storage = SlotStorage::<u64>::new(4).unwrap();

        for index in 0..4 {
            let ptr = storage.write(index, 0);
            assert_eq!(storage.index_of(ptr.as_ptr()), Ok(index));
        }
    }

    #[test]
    fn index_of_foreign_address_is_not_in_pool() {
        let storage = SlotStorage::<u64>::new(4).unwrap();
        let outsider = 5_u64;

        assert!(matches!(
            storage.index_of(&outsider),
            Err(Error::AddressNotInPool { .. })
        ));
    }

    #[test]
    fn index_of_one_past_end_is_not_in_pool() {
        let mut storage = SlotStorage::<u64>::new(4).unwrap();
        let last = storage.write(3, 0);

        let past_end = last.as_ptr().wrapping_add(1);

        assert!(matches!(
            storage.index_of(past_end),
            Err(Error::AddressNotInPool { .. })
        ));
    }

    #[test]
    fn index_of_before_start_is_not_in_pool() {
        let mut storage = SlotStorage::<u64>::new(4).unwrap();
        let first = storage.write(0, 0);

        let before_start = first.as_ptr().wrapping_sub(1);

        assert!(matches!(
            storage.index_of(before_start),
            Err(Error::AddressNotInPool { .. })
        ));
    }

    #[test]
    #[allow(clippy::cast_ptr_alignment, reason = "deliberately misaligned")]
    fn index_of_mid_slot_is_misaligned() {
        let mut storage = SlotStorage::<u64>::new(4).unwrap();
        let second = storage.write(1, 0);

        let mid_slot = second.as_ptr().cast::<u8>().wrapping_add(3).cast::<u64>();

        assert_eq!(
            storage.index_of(mid_slot),
            Err(Error::AddressMisaligned {
                address: mid_slot.addr(),
                offset: 11,
            })
        );
    }

    #[test]
    fn slots_honor_over_alignment() {
        let mut storage = SlotStorage::<CacheLineAligned>::new(3).unwrap();

        for index in 0..3 {
            let ptr = storage.write(index, CacheLineAligned([0; 64]));
            assert_eq!(ptr.as_ptr().addr() % 64, 0);
        }

        let mut storage = SlotStorage::<PageFragmentAligned>::new(3).unwrap();

        for index in 0..3 {
            let ptr = storage.write(index, PageFragmentAligned([0; 8]));
            assert_eq!(ptr.as_ptr().addr() % 512, 0);
        }
    }

    #[test]
    fn drop_in_place_runs_destructor() {
        let mut storage = SlotStorage::<String>::new(2).unwrap();
        storage.write(1, "hello".to_string());

        assert_eq!(unsafe { storage.get(1) }, "hello");

        // Miri would flag a leak here if the string was not dropped.
        unsafe { storage.drop_in_place(1) };
    }
}
