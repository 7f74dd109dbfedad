#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity object pool that stores items of one type in a single preallocated block
//! of memory.
//!
//! This package provides [`FixedPool`], which reserves storage for exactly `capacity` items
//! when it is created and never grows. Allocating an item constructs it in place inside the
//! pool, freeing an item drops it in place, and neither operation allocates on the heap.
//!
//! # Key Features
//!
//! - **Fixed capacity**: All storage is reserved up front; a full pool refuses new items
//!   instead of growing.
//! - **Deterministic slot reuse**: Items always go into the lowest-index vacant slot.
//! - **Alignment-correct storage**: Every slot satisfies the alignment of `T`, including
//!   over-aligned types such as `#[repr(align(64))]`.
//! - **Strict release validation**: Freeing an item checks its address against the pool
//!   storage, detecting items from other pools, pointers into the middle of an item and
//!   double frees. Failed operations leave the pool untouched.
//! - **Stable addresses**: Items never move while they are in the pool.
//! - **Automatic cleanup**: Items still in the pool are dropped together with the pool,
//!   subject to the configured [`DropPolicy`].
//!
//! # Example
//!
//! ```rust
//! use fixed_pool::{Error, FixedPool};
//!
//! let mut pool = FixedPool::<u64>::new(2).unwrap();
//!
//! let a = pool.alloc(1).unwrap();
//! let b = pool.alloc(2).unwrap();
//! assert_eq!(pool.len(), 2);
//!
//! // The pool never grows beyond its capacity.
//! assert_eq!(pool.alloc(3), Err(Error::PoolExhausted { capacity: 2 }));
//!
//! pool.free(a).unwrap();
//!
//! // Freeing the same item twice is detected.
//! assert!(matches!(pool.free(a), Err(Error::DoubleFree { .. })));
//!
//! // The freed slot is reused.
//! let c = pool.alloc(3).unwrap();
//! assert_eq!(c, a);
//! # pool.free(b).unwrap();
//! ```

mod builder;
mod drop_policy;
mod error;
mod occupancy;
mod pool;
mod pooled;
mod scoped;
mod storage;

pub use builder::*;
pub use drop_policy::*;
pub use error::*;
pub(crate) use occupancy::*;
pub use pool::{FixedPool, Iter};
pub use pooled::Pooled;
pub use scoped::ScopedPooled;
pub(crate) use storage::*;
