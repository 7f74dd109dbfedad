use std::fmt;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

/// Handle to an item allocated in a [`FixedPool`][crate::FixedPool].
///
/// The handle is nothing more than the address of the item inside the pool's storage. It can be
/// copied freely and is returned to the pool through [`free()`][crate::FixedPool::free], which
/// identifies the slot purely from that address. A handle that outlived its item is detected
/// as long as the slot is still vacant: freeing it fails with
/// [`Error::DoubleFree`][crate::Error::DoubleFree] and looking it up returns `None`.
///
/// Access the item via [`FixedPool::get()`][crate::FixedPool::get] and friends, which validate
/// the handle first, or through [`ptr()`][Self::ptr] from unsafe code.
///
/// # Example
///
/// ```rust
/// use fixed_pool::FixedPool;
///
/// let mut pool = FixedPool::<String>::new(4).unwrap();
///
/// let item = pool.alloc("Hello".to_string()).unwrap();
/// let copy = item;
///
/// assert_eq!(pool.get(copy).map(String::as_str), Some("Hello"));
///
/// pool.free(item).unwrap();
/// assert!(pool.get(copy).is_none());
/// ```
pub struct Pooled<T> {
    ptr: NonNull<T>,
}

impl<T> Pooled<T> {
    #[must_use]
    pub(crate) fn new(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    /// Returns a pointer to the item.
    ///
    /// The pointer stays valid until the item is freed or the pool is dropped. The pool does
    /// not hold references to its items, so you may create `&` or `&mut` references from the
    /// pointer as long as you do not also ask the pool for a conflicting reference.
    ///
    /// # Example
    ///
    /// ```rust
    /// use fixed_pool::FixedPool;
    ///
    /// let mut pool = FixedPool::<u64>::new(4).unwrap();
    /// let item = pool.alloc(42).unwrap();
    ///
    /// // SAFETY: The item has not been freed and the pool is still alive.
    /// let value = unsafe { *item.ptr().as_ref() };
    /// assert_eq!(value, 42);
    /// ```
    #[must_use]
    #[inline]
    pub fn ptr(&self) -> NonNull<T> {
        self.ptr
    }

    /// The address of the item, as used by the pool to identify its slot.
    #[must_use]
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr().addr()
    }
}

impl<T> Copy for Pooled<T> {}

impl<T> Clone for Pooled<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Pooled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Pooled<T> {}

impl<T> Hash for Pooled<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

impl<T> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("type_name", &std::any::type_name::<T>())
            .field("ptr", &self.ptr)
            .finish()
    }
}

// SAFETY: Pooled<T> is just a fancy reference, so its thread-safety is entirely driven by the
// underlying type T and the presence of the `Sync` auto trait on it.
unsafe impl<T: Sync> Send for Pooled<T> {}

// SAFETY: Pooled<T> is just a fancy reference, so its thread-safety is entirely driven by the
// underlying type T and the presence of the `Sync` auto trait on it.
unsafe impl<T: Sync> Sync for Pooled<T> {}
