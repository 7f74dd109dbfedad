use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};

use crate::{FixedPool, Pooled};

/// An item in a [`FixedPool`] that is freed when this guard is dropped.
///
/// Returned by [`FixedPool::alloc_scoped()`]. The guard holds an exclusive borrow of the pool
/// for as long as it lives, which guarantees the item cannot be freed by anyone else and lets
/// the guard hand out plain references to it via [`Deref`] and [`DerefMut`].
///
/// # Example
///
/// ```rust
/// use fixed_pool::FixedPool;
///
/// let mut pool = FixedPool::<Vec<u8>>::new(2).unwrap();
///
/// let kept = {
///     let mut scratch = pool.alloc_scoped(Vec::new()).unwrap();
///     scratch.extend_from_slice(b"abc");
///     assert_eq!(scratch.len(), 3);
///
///     // Detach to keep the item after the guard goes away.
///     scratch.into_pooled()
/// };
///
/// assert_eq!(pool.len(), 1);
/// assert_eq!(pool.get(kept).map(Vec::len), Some(3));
/// ```
pub struct ScopedPooled<'p, T> {
    pool: &'p mut FixedPool<T>,
    item: Pooled<T>,
}

impl<'p, T> ScopedPooled<'p, T> {
    #[must_use]
    pub(crate) fn new(pool: &'p mut FixedPool<T>, item: Pooled<T>) -> Self {
        Self { pool, item }
    }

    /// The plain handle of the item.
    ///
    /// The handle can be stored for comparison or for use after
    /// [`into_pooled()`][Self::into_pooled] but keep in mind the item is freed when the guard
    /// is dropped.
    #[must_use]
    pub fn pooled(&self) -> Pooled<T> {
        self.item
    }

    /// Releases the guard without freeing the item, returning the plain handle.
    ///
    /// The item stays in the pool until it is explicitly freed or the pool is dropped.
    #[must_use]
    pub fn into_pooled(self) -> Pooled<T> {
        let item = self.item;

        // Skip our Drop, which would free the item. Nothing else in `self` needs dropping.
        mem::forget(self);

        item
    }
}

impl<T> Deref for ScopedPooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.pool
            .get(self.item)
            .expect("the guard holds an exclusive borrow of the pool so the item cannot be freed")
    }
}

impl<T> DerefMut for ScopedPooled<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.pool
            .get_mut(self.item)
            .expect("the guard holds an exclusive borrow of the pool so the item cannot be freed")
    }
}

impl<T> Drop for ScopedPooled<'_, T> {
    fn drop(&mut self) {
        self.pool
            .free(self.item)
            .expect("the guard holds an exclusive borrow of the pool so the item cannot be freed");
    }
}

impl<T> fmt::Debug for ScopedPooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedPooled")
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::Error;

    use super::*;

    struct Droppable {
        drops: Rc<Cell<usize>>,
    }

    impl Drop for Droppable {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    #[test]
    fn dropping_guard_frees_item() {
        let drops = Rc::new(Cell::new(0));
        let mut pool = FixedPool::<Droppable>::new(1).unwrap();

        {
            let _guard = pool
                .alloc_scoped(Droppable {
                    drops: Rc::clone(&drops),
                })
                .unwrap();
        }

        assert_eq!(drops.get(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn into_pooled_keeps_item() {
        let drops = Rc::new(Cell::new(0));
        let mut pool = FixedPool::<Droppable>::new(1).unwrap();

        let item = pool
            .alloc_scoped(Droppable {
                drops: Rc::clone(&drops),
            })
            .unwrap()
            .into_pooled();

        assert_eq!(drops.get(), 0);
        assert_eq!(pool.len(), 1);

        pool.free(item).unwrap();
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn guard_gives_mutable_access() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();

        let mut guard = pool.alloc_scoped(1).unwrap();
        *guard += 1;

        assert_eq!(*guard, 2);
    }

    #[test]
    fn pooled_matches_detached_handle() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();

        let guard = pool.alloc_scoped(1).unwrap();
        let handle = guard.pooled();

        assert_eq!(guard.into_pooled(), handle);
    }

    #[test]
    fn scoped_alloc_on_full_pool_fails() {
        let mut pool = FixedPool::<u32>::new(1).unwrap();

        let _kept = pool.alloc(1).unwrap();

        assert_eq!(
            pool.alloc_scoped(2).unwrap_err(),
            Error::PoolExhausted { capacity: 1 }
        );
    }
}
