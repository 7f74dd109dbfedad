use thiserror::Error;

/// Errors returned by [`FixedPool`][crate::FixedPool] operations.
///
/// Every error leaves the pool exactly as it was before the call. No item is constructed or
/// dropped on an error path, so the caller is free to retry (e.g. after freeing space).
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The pool was configured with a capacity that cannot be satisfied: either zero
    /// or so large that the storage size does not fit into a valid memory layout.
    #[error("invalid pool capacity {capacity}: capacity must be non-zero and fit in memory")]
    InvalidCapacity {
        /// The capacity that was requested.
        capacity: usize,
    },

    /// Every slot in the pool is occupied.
    #[error("pool is exhausted: all {capacity} slots are occupied")]
    PoolExhausted {
        /// The fixed capacity of the pool.
        capacity: usize,
    },

    /// The address does not point into the storage of this pool. This is typical of
    /// items that were allocated on the heap, on the stack or in a different pool.
    #[error("address {address:#x} does not belong to this pool")]
    AddressNotInPool {
        /// The address that was rejected.
        address: usize,
    },

    /// The address points into the storage of this pool but not at the start of a slot.
    #[error("address {address:#x} is {offset} bytes from the start of the pool, which is not a slot boundary")]
    AddressMisaligned {
        /// The address that was rejected.
        address: usize,

        /// Distance in bytes from the start of the pool storage.
        offset: usize,
    },

    /// The address points at a slot that does not currently hold an item.
    #[error("slot {index} does not hold an item - was it already freed?")]
    DoubleFree {
        /// Index of the vacant slot.
        index: usize,
    },
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug, Copy);

    #[test]
    fn messages_include_context() {
        let error = Error::PoolExhausted { capacity: 7 };
        assert_eq!(
            error.to_string(),
            "pool is exhausted: all 7 slots are occupied"
        );

        let error = Error::AddressNotInPool { address: 0x1000 };
        assert!(error.to_string().contains("0x1000"));

        let error = Error::AddressMisaligned {
            address: 0x1004,
            offset: 4,
        };
        assert!(error.to_string().contains("4 bytes"));

        let error = Error::DoubleFree { index: 3 };
        assert!(error.to_string().contains("slot 3"));
    }
}
