use std::marker::PhantomData;

use crate::{DropPolicy, FixedPool, Result};

/// Builder for creating an instance of [`FixedPool`].
///
/// The only mandatory setting is the [capacity][Self::capacity]. If you do not need to
/// customize anything else, [`FixedPool::new()`][1] is a shorthand for the same.
///
/// # Examples
///
/// ```
/// use fixed_pool::{DropPolicy, FixedPool};
///
/// let pool = FixedPool::<String>::builder()
///     .capacity(16)
///     .drop_policy(DropPolicy::MayDropItems)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.capacity(), 16);
/// ```
///
/// [1]: FixedPool::new
#[must_use]
pub struct FixedPoolBuilder<T> {
    capacity: usize,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T> std::fmt::Debug for FixedPoolBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedPoolBuilder")
            .field(
                "item_type",
                &std::format_args!("{}", std::any::type_name::<T>()),
            )
            .field("capacity", &self.capacity)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> FixedPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            capacity: 0,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }

    /// Sets the number of items the pool can hold. The capacity never changes after the pool
    /// has been built.
    ///
    /// If not set, the capacity is zero and [`build()`][Self::build] fails.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat remaining items in the pool when the pool is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::{DropPolicy, FixedPool};
    ///
    /// let pool = FixedPool::<u32>::builder()
    ///     .capacity(4)
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the pool, reserving storage for all of its items at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`][crate::Error::InvalidCapacity] if the capacity is
    /// zero or if the storage for that many items would not fit in memory. No storage is
    /// reserved in that case.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    ///
    /// # Examples
    ///
    /// ```
    /// use fixed_pool::{Error, FixedPool};
    ///
    /// let result = FixedPool::<u64>::builder().build();
    /// assert_eq!(result.unwrap_err(), Error::InvalidCapacity { capacity: 0 });
    /// ```
    pub fn build(self) -> Result<FixedPool<T>> {
        FixedPool::new_inner(self.capacity, self.drop_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn default_builder_has_zero_capacity() {
        let result = FixedPool::<u32>::builder().build();

        assert_eq!(result.unwrap_err(), Error::InvalidCapacity { capacity: 0 });
    }

    #[test]
    fn builder_applies_capacity() {
        let pool = FixedPool::<u32>::builder().capacity(5).build().unwrap();

        assert_eq!(pool.capacity(), 5);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn builder_debug_names_item_type() {
        let builder = FixedPool::<u32>::builder().capacity(3);
        let debug = format!("{builder:?}");

        assert!(debug.contains("u32"));
        assert!(debug.contains("capacity: 3"));
    }
}
