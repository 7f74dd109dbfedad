use std::any::type_name;
use std::fmt;
use std::iter::FusedIterator;
use std::pin::Pin;
use std::thread;

use bitvec::order::Lsb0;
use bitvec::slice::IterOnes;
use tracing::{debug, trace};

use crate::{
    DropPolicy, Error, FixedPoolBuilder, OccupancyMap, Pooled, Result, ScopedPooled, SlotStorage,
};

/// An object pool with a fixed capacity, decided when the pool is created.
///
/// All the storage for the items is reserved up front in a single allocation. Allocating an
/// item moves or constructs it directly into a vacant slot and freeing it drops it in place, so
/// neither operation touches the heap.
///
/// There are multiple ways to allocate an item:
///
/// * [`alloc()`][1] - moves an existing value into the pool.
/// * [`alloc_with()`][2] - constructs the value in the pool from a closure. The closure is only
///   called once a vacant slot has been found, so nothing is constructed if the pool is full.
/// * [`alloc_default()`][3] - constructs the value via [`Default`].
/// * [`alloc_scoped()`][4] - like `alloc()` but returns a guard that frees the item when
///   dropped.
///
/// Each of them picks the vacant slot with the lowest index, so slot reuse order is
/// deterministic: after freeing slots 3 and 1 (in that order), the next two items go to
/// slot 1 and then slot 3.
///
/// # Releasing items
///
/// Items are released via [`free()`][5] (or [`free_ptr()`][6] for plain pointers). The pool
/// identifies the slot from the address alone, rejecting:
///
/// * addresses outside the pool storage (items from other pools, the heap or the stack),
/// * addresses inside the storage that are not at the start of a slot,
/// * slots that do not currently hold an item.
///
/// A failed release leaves the pool untouched and drops nothing.
///
/// # Out of band access
///
/// The pool never moves its items and does not keep references to them. You can obtain a
/// pointer from the [`Pooled`] handle and access the item from unsafe code until the item is
/// freed or the pool is dropped, as long as you do not concurrently ask the pool for a
/// conflicting reference (e.g. via [`get_mut()`][7]).
///
/// # Example
///
/// ```rust
/// use fixed_pool::{Error, FixedPool};
///
/// let mut pool = FixedPool::<String>::new(2).unwrap();
///
/// let alice = pool.alloc("Alice".to_string()).unwrap();
/// let bob = pool.alloc_with(|| "Bob".to_string()).unwrap();
///
/// assert_eq!(pool.len(), 2);
/// assert_eq!(
///     pool.alloc("Charlie".to_string()),
///     Err(Error::PoolExhausted { capacity: 2 })
/// );
///
/// pool.free(bob).unwrap();
/// assert_eq!(pool.get(alice).map(String::as_str), Some("Alice"));
/// ```
///
/// [1]: Self::alloc
/// [2]: Self::alloc_with
/// [3]: Self::alloc_default
/// [4]: Self::alloc_scoped
/// [5]: Self::free
/// [6]: Self::free_ptr
/// [7]: Self::get_mut
pub struct FixedPool<T> {
    storage: SlotStorage<T>,

    occupancy: OccupancyMap,

    drop_policy: DropPolicy,
}

impl<T> FixedPool<T> {
    pub(crate) fn new_inner(capacity: usize, drop_policy: DropPolicy) -> Result<Self> {
        let storage = SlotStorage::new(capacity).inspect_err(|error| {
            debug!(item_type = type_name::<T>(), %error, "fixed pool creation rejected");
        })?;

        debug!(
            item_type = type_name::<T>(),
            capacity,
            item_size = size_of::<T>(),
            item_align = align_of::<T>(),
            "created fixed pool"
        );

        Ok(Self {
            storage,
            occupancy: OccupancyMap::new(capacity),
            drop_policy,
        })
    }

    /// Creates a new [`FixedPool`] with room for `capacity` items and the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero or the storage for that many
    /// items would not fit in memory.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::{Error, FixedPool};
    ///
    /// let pool = FixedPool::<u64>::new(10).unwrap();
    /// assert_eq!(pool.capacity(), 10);
    /// assert_eq!(pool.len(), 0);
    ///
    /// assert_eq!(
    ///     FixedPool::<u64>::new(0).unwrap_err(),
    ///     Error::InvalidCapacity { capacity: 0 }
    /// );
    /// ```
    pub fn new(capacity: usize) -> Result<Self> {
        Self::builder().capacity(capacity).build()
    }

    /// Starts building a new [`FixedPool`].
    ///
    /// Use this when you want to customize the pool configuration beyond the defaults.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::{DropPolicy, FixedPool};
    ///
    /// let pool = FixedPool::<u32>::builder()
    ///     .capacity(32)
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(pool.is_empty());
    /// ```
    pub fn builder() -> FixedPoolBuilder<T> {
        FixedPoolBuilder::new()
    }

    /// The number of items the pool can hold. This never changes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// The number of items currently in the pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<i32>::new(4).unwrap();
    /// assert_eq!(pool.len(), 0);
    ///
    /// let item = pool.alloc(42).unwrap();
    /// assert_eq!(pool.len(), 1);
    ///
    /// pool.free(item).unwrap();
    /// assert_eq!(pool.len(), 0);
    /// ```
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub fn len(&self) -> usize {
        self.occupancy.live_count()
    }

    /// Whether the pool holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.occupancy.live_count() == 0
    }

    /// Whether every slot in the pool holds an item, in which case allocating fails.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.occupancy.is_full()
    }

    /// Moves `value` into the lowest-index vacant slot of the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if every slot is occupied. The value is dropped in that
    /// case. Use [`alloc_with()`][Self::alloc_with] if the value should only be constructed
    /// when there is room for it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<u64>::new(2).unwrap();
    ///
    /// let item = pool.alloc(1234).unwrap();
    /// assert_eq!(pool.get(item), Some(&1234));
    /// ```
    pub fn alloc(&mut self, value: T) -> Result<Pooled<T>> {
        self.alloc_with(|| value)
    }

    /// Constructs an item with [`Default`] in the lowest-index vacant slot of the pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if every slot is occupied. Nothing is constructed in
    /// that case.
    pub fn alloc_default(&mut self) -> Result<Pooled<T>>
    where
        T: Default,
    {
        self.alloc_with(T::default)
    }

    /// Constructs an item in the lowest-index vacant slot of the pool.
    ///
    /// The closure is called exactly once if there is a vacant slot and not at all if there
    /// is none. If the closure panics, the pool is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if every slot is occupied.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::{Error, FixedPool};
    ///
    /// struct Point {
    ///     x: i32,
    ///     y: i32,
    /// }
    ///
    /// let mut pool = FixedPool::<Point>::new(1).unwrap();
    ///
    /// let point = pool.alloc_with(|| Point { x: 0, y: 1 }).unwrap();
    /// assert_eq!(pool.get(point).map(|p| (p.x, p.y)), Some((0, 1)));
    ///
    /// // The pool is full, so the closure is never called.
    /// let result = pool.alloc_with(|| unreachable!());
    /// assert_eq!(result.unwrap_err(), Error::PoolExhausted { capacity: 1 });
    /// ```
    pub fn alloc_with<F>(&mut self, f: F) -> Result<Pooled<T>>
    where
        F: FnOnce() -> T,
    {
        #[cfg(debug_assertions)]
        self.occupancy.integrity_check();

        let Some(index) = self.occupancy.first_vacant() else {
            debug!(
                item_type = type_name::<T>(),
                capacity = self.capacity(),
                "alloc rejected, pool is exhausted"
            );

            return Err(Error::PoolExhausted {
                capacity: self.capacity(),
            });
        };

        // If `f` panics, we have not yet touched any state, so the slot simply stays vacant.
        let ptr = self.storage.write(index, f());
        self.occupancy.mark_occupied(index);

        trace!(item_type = type_name::<T>(), index, "allocated slot");

        Ok(Pooled::new(ptr))
    }

    /// Moves `value` into the pool and returns a guard that frees it when dropped.
    ///
    /// The guard holds an exclusive borrow of the pool, so it is best suited for items with a
    /// short, lexically scoped life. Call [`ScopedPooled::into_pooled()`] to keep the item in
    /// the pool beyond the scope of the guard.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if every slot is occupied. The value is dropped in that
    /// case.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<String>::new(1).unwrap();
    ///
    /// {
    ///     let mut greeting = pool.alloc_scoped("Hello".to_string()).unwrap();
    ///     greeting.push_str(", world");
    ///     assert_eq!(&*greeting, "Hello, world");
    /// }
    ///
    /// assert!(pool.is_empty());
    /// ```
    pub fn alloc_scoped(&mut self, value: T) -> Result<ScopedPooled<'_, T>> {
        let item = self.alloc(value)?;

        Ok(ScopedPooled::new(self, item))
    }

    /// Drops an item and returns its slot to the pool.
    ///
    /// # Errors
    ///
    /// * [`Error::AddressNotInPool`] if the item was not allocated from this pool.
    /// * [`Error::DoubleFree`] if the item has already been freed.
    ///
    /// Nothing is dropped and the pool is unchanged if an error is returned.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::{Error, FixedPool};
    ///
    /// let mut pool = FixedPool::<u64>::new(1).unwrap();
    ///
    /// let item = pool.alloc(1).unwrap();
    /// pool.free(item).unwrap();
    ///
    /// assert!(matches!(pool.free(item), Err(Error::DoubleFree { index: 0 })));
    /// ```
    pub fn free(&mut self, item: Pooled<T>) -> Result<()> {
        self.free_ptr(item.ptr().as_ptr())
    }

    /// Drops the item at `ptr` and returns its slot to the pool.
    ///
    /// The pointer is only used for address arithmetic until it has been verified to point at
    /// an occupied slot of this pool, so any pointer is safe to pass - including references to
    /// values that live elsewhere.
    ///
    /// # Errors
    ///
    /// * [`Error::AddressNotInPool`] if `ptr` is outside the pool storage.
    /// * [`Error::AddressMisaligned`] if `ptr` is inside the pool storage but does not point at
    ///   the start of a slot.
    /// * [`Error::DoubleFree`] if the slot does not hold an item.
    ///
    /// Nothing is dropped and the pool is unchanged if an error is returned.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::{Error, FixedPool};
    ///
    /// let mut pool = FixedPool::<u64>::new(1).unwrap();
    ///
    /// let outsider = Box::new(5_u64);
    /// assert!(matches!(
    ///     pool.free_ptr(&*outsider),
    ///     Err(Error::AddressNotInPool { .. })
    /// ));
    /// ```
    pub fn free_ptr(&mut self, ptr: *const T) -> Result<()> {
        #[cfg(debug_assertions)]
        self.occupancy.integrity_check();

        let index = self.resolve(ptr).inspect_err(|error| {
            debug!(item_type = type_name::<T>(), %error, "free rejected");
        })?;

        // We mark the slot vacant first, so if the drop panics the pool still considers the
        // value gone. A panicking drop is still a completed drop as far as Rust is concerned.
        self.occupancy.mark_vacant(index);

        // SAFETY: `resolve()` verified that the slot held an item and we just marked it vacant,
        // so the value will not be accessed again until the slot is written to again.
        unsafe {
            self.storage.drop_in_place(index);
        }

        trace!(item_type = type_name::<T>(), index, "freed slot");

        Ok(())
    }

    /// Whether `ptr` points at an item currently in this pool, i.e. whether
    /// [`free_ptr()`][Self::free_ptr] would succeed.
    #[must_use]
    pub fn contains(&self, ptr: *const T) -> bool {
        self.resolve(ptr).is_ok()
    }

    /// Gets a shared reference to an item in the pool.
    ///
    /// Returns `None` if the handle does not refer to an item currently in this pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<u64>::new(1).unwrap();
    /// let mut other_pool = FixedPool::<u64>::new(1).unwrap();
    ///
    /// let item = pool.alloc(42).unwrap();
    ///
    /// assert_eq!(pool.get(item), Some(&42));
    /// assert_eq!(other_pool.get(item), None);
    /// ```
    #[must_use]
    pub fn get(&self, item: Pooled<T>) -> Option<&T> {
        let index = self.resolve(item.ptr().as_ptr()).ok()?;

        // SAFETY: `resolve()` verified that the slot holds an item.
        Some(unsafe { self.storage.get(index) })
    }

    /// Gets an exclusive reference to an item in the pool.
    ///
    /// Returns `None` if the handle does not refer to an item currently in this pool.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<String>::new(1).unwrap();
    /// let item = pool.alloc("Hello".to_string()).unwrap();
    ///
    /// pool.get_mut(item).unwrap().push_str(", world");
    ///
    /// assert_eq!(pool.get(item).map(String::as_str), Some("Hello, world"));
    /// ```
    #[must_use]
    pub fn get_mut(&mut self, item: Pooled<T>) -> Option<&mut T> {
        let index = self.resolve(item.ptr().as_ptr()).ok()?;

        // SAFETY: `resolve()` verified that the slot holds an item.
        Some(unsafe { self.storage.get_mut(index) })
    }

    /// Gets a pinned shared reference to an item in the pool.
    ///
    /// Items never move while they are in the pool, so they can be accessed as pinned.
    #[must_use]
    pub fn get_pin(&self, item: Pooled<T>) -> Option<Pin<&T>> {
        // SAFETY: Items are dropped in place and never moved while in the pool.
        self.get(item).map(|value| unsafe { Pin::new_unchecked(value) })
    }

    /// Gets a pinned exclusive reference to an item in the pool.
    ///
    /// Items never move while they are in the pool, so they can be accessed as pinned.
    #[must_use]
    pub fn get_pin_mut(&mut self, item: Pooled<T>) -> Option<Pin<&mut T>> {
        // SAFETY: Items are dropped in place and never moved while in the pool.
        self.get_mut(item).map(|value| unsafe { Pin::new_unchecked(value) })
    }

    /// Iterates over the items in the pool, in slot order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<u32>::new(4).unwrap();
    ///
    /// let first = pool.alloc(1).unwrap();
    /// pool.alloc(2).unwrap();
    /// pool.alloc(3).unwrap();
    /// pool.free(first).unwrap();
    ///
    /// assert_eq!(pool.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            indexes: self.occupancy.occupied_indexes(),
            storage: &self.storage,
        }
    }

    /// Identifies the slot at `ptr`, requiring it to hold an item.
    fn resolve(&self, ptr: *const T) -> Result<usize> {
        let index = self.storage.index_of(ptr)?;

        if !self.occupancy.is_occupied(index) {
            return Err(Error::DoubleFree { index });
        }

        Ok(index)
    }
}

impl<T> Drop for FixedPool<T> {
    fn drop(&mut self) {
        let remaining = self.occupancy.live_count();

        debug!(
            item_type = type_name::<T>(),
            capacity = self.capacity(),
            remaining,
            "dropping fixed pool"
        );

        for index in self.occupancy.occupied_indexes() {
            // SAFETY: The occupancy map says the slot holds an item. The pool is going away,
            // so nothing will look at the slot after this.
            unsafe {
                self.storage.drop_in_place(index);
            }
        }

        // The storage releases its memory when the field is dropped right after this, which
        // also happens if we panic below.
        //
        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            assert!(
                remaining == 0,
                "dropped a non-empty pool of {} with a policy that says it must be empty when dropped",
                type_name::<T>()
            );
        }
    }
}

impl<T> fmt::Debug for FixedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool")
            .field("item_type", &type_name::<T>())
            .field("storage", &self.storage)
            .field("occupancy", &self.occupancy)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<'p, T> IntoIterator for &'p FixedPool<T> {
    type Item = &'p T;
    type IntoIter = Iter<'p, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the items in a [`FixedPool`], returned by [`FixedPool::iter()`].
pub struct Iter<'p, T> {
    indexes: IterOnes<'p, usize, Lsb0>,
    storage: &'p SlotStorage<T>,
}

impl<'p, T> Iterator for Iter<'p, T> {
    type Item = &'p T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.indexes.next()?;

        // SAFETY: We only visit slots that the occupancy map says hold an item, and the
        // shared borrow of the pool prevents anyone from freeing them meanwhile.
        Some(unsafe { self.storage.get(index) })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.indexes.size_hint()
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

impl<T> fmt::Debug for Iter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("item_type", &type_name::<T>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(FixedPool<u32>: Send);
    assert_not_impl_any!(FixedPool<u32>: Sync);
    assert_not_impl_any!(FixedPool<Rc<u32>>: Send);

    struct Droppable {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Droppable {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn smoke_test() {
        let mut pool = FixedPool::<u32>::new(3).unwrap();

        let a = pool.alloc(42).unwrap();
        let b = pool.alloc(43).unwrap();
        let c = pool.alloc(44).unwrap();

        assert_eq!(pool.get(a), Some(&42));
        assert_eq!(pool.get(b), Some(&43));
        assert_eq!(pool.get(c), Some(&44));
        assert_eq!(pool.len(), 3);
        assert!(pool.is_full());

        pool.free(b).unwrap();
        assert_eq!(pool.len(), 2);

        let d = pool.alloc(45).unwrap();

        assert_eq!(pool.get(a), Some(&42));
        assert_eq!(pool.get(c), Some(&44));
        assert_eq!(pool.get(d), Some(&45));
        assert!(pool.is_full());
    }

    #[test]
    fn slots_are_filled_in_order() {
        let mut pool = FixedPool::<u64>::new(3).unwrap();

        let a = pool.alloc(0).unwrap();
        let b = pool.alloc(1).unwrap();
        let c = pool.alloc(2).unwrap();

        let size = size_of::<u64>();
        assert_eq!(b.addr() - a.addr(), size);
        assert_eq!(c.addr() - b.addr(), size);
    }

    #[test]
    fn freed_slot_is_reused_lowest_first() {
        let mut pool = FixedPool::<u64>::new(5).unwrap();

        let items = (0..5).map(|n| pool.alloc(n).unwrap()).collect::<Vec<_>>();

        pool.free(items[3]).unwrap();
        pool.free(items[1]).unwrap();

        assert_eq!(pool.alloc(10).unwrap(), items[1]);
        assert_eq!(pool.alloc(11).unwrap(), items[3]);
    }

    #[test]
    fn exhausted_alloc_leaves_state_unchanged() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();

        let a = pool.alloc(1).unwrap();

        assert_eq!(
            pool.alloc(2).unwrap_err(),
            Error::PoolExhausted { capacity: 1 }
        );
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(a), Some(&1));
    }

    #[test]
    fn alloc_with_skips_closure_when_full() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();
        let calls = Cell::new(0);

        pool.alloc_with(|| {
            calls.set(calls.get() + 1);
            1
        })
        .unwrap();

        let result = pool.alloc_with(|| {
            calls.set(calls.get() + 1);
            2
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn panicking_constructor_leaves_slot_vacant() {
        let mut pool = FixedPool::<u32>::new(2).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| {
            _ = pool.alloc_with(|| panic!("constructor failed"));
        }));

        assert!(result.is_err());
        assert_eq!(pool.len(), 0);

        let a = pool.alloc(5).unwrap();
        assert_eq!(pool.get(a), Some(&5));
    }

    #[test]
    fn alloc_default_constructs_default() {
        let mut pool = FixedPool::<String>::new(1).unwrap();

        let item = pool.alloc_default().unwrap();

        assert_eq!(pool.get(item).map(String::as_str), Some(""));
    }

    #[test]
    fn free_drops_exactly_once() {
        let drops = Rc::new(Cell::new(0));
        let mut pool = FixedPool::<Droppable>::new(2).unwrap();

        let a = pool
            .alloc(Droppable {
                drops: Rc::clone(&drops),
            })
            .unwrap();

        pool.free(a).unwrap();
        assert_eq!(drops.get(), 1);

        assert_eq!(pool.free(a), Err(Error::DoubleFree { index: 0 }));
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn free_foreign_item_is_rejected() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();
        let mut other = FixedPool::<u32>::new(1).unwrap();

        let item = other.alloc(1).unwrap();

        assert!(matches!(
            pool.free(item),
            Err(Error::AddressNotInPool { .. })
        ));
        assert_eq!(other.len(), 1);

        other.free(item).unwrap();
    }

    #[test]
    #[allow(clippy::cast_ptr_alignment, reason = "deliberately misaligned")]
    fn free_mid_item_is_misaligned() {
        let mut pool = FixedPool::<u64>::new(2).unwrap();

        let item = pool.alloc(1).unwrap();
        let mid_item = item.ptr().as_ptr().cast::<u8>().wrapping_add(4).cast::<u64>();

        assert!(matches!(
            pool.free_ptr(mid_item),
            Err(Error::AddressMisaligned { offset: 4, .. })
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn contains_tracks_occupancy() {
        let mut pool = FixedPool::<u32>::new(2).unwrap();
        let outsider = 0_u32;

        let item = pool.alloc(1).unwrap();
        assert!(pool.contains(item.ptr().as_ptr()));
        assert!(!pool.contains(&outsider));

        pool.free(item).unwrap();
        assert!(!pool.contains(item.ptr().as_ptr()));
    }

    #[test]
    fn get_rejects_invalid_handles() {
        let mut pool = FixedPool::<u32>::new(2).unwrap();

        let item = pool.alloc(1).unwrap();
        pool.free(item).unwrap();

        assert_eq!(pool.get(item), None);
        assert_eq!(pool.get_mut(item), None);
        assert!(pool.get_pin(item).is_none());
        assert!(pool.get_pin_mut(item).is_none());
    }

    #[test]
    fn get_mut_modifies_in_place() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();

        let item = pool.alloc(1).unwrap();
        *pool.get_mut(item).unwrap() = 2;

        assert_eq!(pool.get(item), Some(&2));
        assert_eq!(unsafe { *item.ptr().as_ref() }, 2);
    }

    #[test]
    fn pinned_access_points_at_same_item() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();

        let item = pool.alloc(7).unwrap();

        let pinned = pool.get_pin(item).unwrap();
        assert_eq!(*pinned, 7);
        assert_eq!(
            std::ptr::from_ref(pinned.get_ref()).addr(),
            item.addr()
        );

        *pool.get_pin_mut(item).unwrap() = 8;
        assert_eq!(pool.get(item), Some(&8));
    }

    #[test]
    fn iter_visits_items_in_slot_order() {
        let mut pool = FixedPool::<u32>::new(5).unwrap();

        let items = (0..5).map(|n| pool.alloc(n).unwrap()).collect::<Vec<_>>();
        pool.free(items[0]).unwrap();
        pool.free(items[3]).unwrap();

        assert_eq!(pool.iter().copied().collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!((&pool).into_iter().count(), 3);
    }

    #[test]
    fn drop_drops_remaining_items_only() {
        let drops = Rc::new(Cell::new(0));

        {
            let mut pool = FixedPool::<Droppable>::new(5).unwrap();

            let a = pool
                .alloc(Droppable {
                    drops: Rc::clone(&drops),
                })
                .unwrap();
            pool.alloc(Droppable {
                drops: Rc::clone(&drops),
            })
            .unwrap();
            pool.alloc(Droppable {
                drops: Rc::clone(&drops),
            })
            .unwrap();

            pool.free(a).unwrap();
            assert_eq!(drops.get(), 1);
        }

        assert_eq!(drops.get(), 3);
    }

    #[test]
    #[should_panic]
    fn drop_item_with_forbidden_to_drop_policy_panics() {
        let mut pool = FixedPool::<u32>::builder()
            .capacity(3)
            .drop_policy(DropPolicy::MustNotDropItems)
            .build()
            .unwrap();

        _ = pool.alloc(123);
    }

    #[test]
    fn drop_itemless_with_forbidden_to_drop_policy_ok() {
        let mut pool = FixedPool::<u32>::builder()
            .capacity(3)
            .drop_policy(DropPolicy::MustNotDropItems)
            .build()
            .unwrap();

        let item = pool.alloc(123).unwrap();
        pool.free(item).unwrap();

        drop(pool);
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        drop(FixedPool::<()>::new(3));
    }

    #[test]
    fn multithreaded_via_mutex() {
        let pool = Arc::new(Mutex::new(FixedPool::<u32>::new(3).unwrap()));

        let (a, b) = {
            let mut pool = pool.lock().unwrap();
            (pool.alloc(42).unwrap(), pool.alloc(43).unwrap())
        };

        let pool_clone = Arc::clone(&pool);
        std::thread::spawn(move || {
            let mut pool = pool_clone.lock().unwrap();

            pool.free(b).unwrap();
            assert_eq!(pool.get(a), Some(&42));
        })
        .join()
        .unwrap();

        let pool = pool.lock().unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn debug_output_names_item_type() {
        let pool = FixedPool::<u32>::new(2).unwrap();

        assert!(format!("{pool:?}").contains("u32"));
    }
}
