/// Determines what happens to items still in the pool when the pool is dropped.
///
/// By default, the pool drops any remaining items in place before releasing its storage.
///
/// # Examples
///
/// ```
/// use fixed_pool::{DropPolicy, FixedPool};
///
/// let pool = FixedPool::<u32>::builder()
///     .capacity(8)
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// Items still in the pool are dropped together with the pool. This is the default.
    #[default]
    MayDropItems,

    /// The pool panics if it still contains items when it is dropped.
    ///
    /// Useful when every allocation is expected to be paired with a `free()`, for example
    /// because pointers to the items are handed out to unsafe code that must be told about the
    /// removal first. The storage is still released before the panic.
    MustNotDropItems,
}
