//! Integration tests for the `fixed_pool` package.
//!
//! These tests verify the allocation and release lifecycle of `FixedPool`, counting
//! constructions and destructions of the pooled items to prove that each happens exactly once.

use std::cell::Cell;
use std::rc::Rc;

use fixed_pool::{Error, FixedPool, Pooled};

/// Counts the lifecycle events of the test objects of a single test.
#[derive(Debug, Default)]
struct Tally {
    constructions: Cell<usize>,
    param_constructions: Cell<usize>,
    destructions: Cell<usize>,
}

impl Tally {
    fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn bump(counter: &Cell<usize>) {
        counter.set(counter.get().checked_add(1).unwrap());
    }
}

struct TestObject {
    x: i32,
    y: i32,
    tally: Rc<Tally>,
}

impl TestObject {
    fn new(tally: &Rc<Tally>) -> Self {
        Tally::bump(&tally.constructions);

        Self {
            x: 0,
            y: 0,
            tally: Rc::clone(tally),
        }
    }

    fn with_coords(tally: &Rc<Tally>, x: i32, y: i32) -> Self {
        Tally::bump(&tally.constructions);
        Tally::bump(&tally.param_constructions);

        Self {
            x,
            y,
            tally: Rc::clone(tally),
        }
    }
}

impl Drop for TestObject {
    fn drop(&mut self) {
        Tally::bump(&self.tally.destructions);
    }
}

#[repr(align(64))]
struct CacheLineAligned {
    _data: [u8; 64],
}

#[repr(align(512))]
struct WideAligned {
    _data: [u8; 16],
}

#[test]
fn new_pool_reports_capacity_and_no_items() {
    for capacity in [1, 2, 10, 1000] {
        let pool = FixedPool::<u32>::new(capacity).unwrap();

        assert_eq!(pool.capacity(), capacity);
        assert_eq!(pool.len(), 0);
        assert!(pool.is_empty());
    }
}

#[test]
fn zero_capacity_is_rejected() {
    let result = FixedPool::<u32>::new(0);

    assert!(matches!(result, Err(Error::InvalidCapacity { capacity: 0 })));
}

#[test]
fn alloc_counts_constructions() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(2).unwrap();

    pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(tally.constructions.get(), 1);

    pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(tally.constructions.get(), 2);
}

#[test]
fn alloc_with_arguments() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let item = pool
        .alloc_with(|| TestObject::with_coords(&tally, 10, 20))
        .unwrap();

    assert_eq!(tally.param_constructions.get(), 1);

    let object = pool.get(item).unwrap();
    assert_eq!(object.x, 10);
    assert_eq!(object.y, 20);
}

#[test]
fn exhausted_pool_constructs_nothing() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    pool.alloc_with(|| TestObject::new(&tally)).unwrap();

    let result = pool.alloc_with(|| TestObject::new(&tally));

    assert!(matches!(result, Err(Error::PoolExhausted { capacity: 1 })));
    assert_eq!(tally.constructions.get(), 1);
    assert_eq!(pool.len(), 1);
}

#[test]
fn free_counts_destructions() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let item = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(tally.destructions.get(), 0);

    pool.free(item).unwrap();
    assert_eq!(pool.len(), 0);
    assert_eq!(tally.destructions.get(), 1);
}

#[test]
fn reallocation_reuses_slot() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let first = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    pool.free(first).unwrap();

    let second = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    pool.free(second).unwrap();

    assert_eq!(first, second);
    assert_eq!(pool.len(), 0);
    assert_eq!(tally.constructions.get(), 2);
    assert_eq!(tally.destructions.get(), 2);
}

#[test]
fn capacity_one_scenario() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let item = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    assert_eq!(pool.len(), 1);

    let result = pool.alloc_with(|| TestObject::new(&tally));
    assert!(matches!(result, Err(Error::PoolExhausted { .. })));
    assert_eq!(pool.len(), 1);

    pool.free(item).unwrap();
    assert_eq!(pool.len(), 0);

    pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    assert_eq!(pool.len(), 1);
    assert_eq!(tally.constructions.get(), 2);
}

#[test]
fn double_free_is_detected() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let item = pool.alloc_with(|| TestObject::new(&tally)).unwrap();

    pool.free(item).unwrap();
    assert_eq!(pool.len(), 0);

    assert!(matches!(
        pool.free(item),
        Err(Error::DoubleFree { index: 0 })
    ));
    assert_eq!(pool.len(), 0);
    assert_eq!(tally.destructions.get(), 1);
}

#[test]
fn freeing_heap_object_is_rejected() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let _item = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    let heap_object = Box::new(TestObject::new(&tally));

    assert!(matches!(
        pool.free_ptr(&*heap_object),
        Err(Error::AddressNotInPool { .. })
    ));
    assert_eq!(pool.len(), 1);
    assert_eq!(tally.destructions.get(), 0);

    drop(heap_object);
    assert_eq!(tally.destructions.get(), 1);
}

#[test]
fn freeing_stack_object_is_rejected() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let _item = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    let not_in_pool = TestObject::new(&tally);

    assert!(matches!(
        pool.free_ptr(&not_in_pool),
        Err(Error::AddressNotInPool { .. })
    ));
    assert_eq!(pool.len(), 1);
}

#[test]
fn freeing_object_from_another_pool_is_rejected() {
    let tally = Tally::new();
    let mut pool1 = FixedPool::<TestObject>::new(1).unwrap();
    let mut pool2 = FixedPool::<TestObject>::new(1).unwrap();

    let from_pool1 = pool1.alloc_with(|| TestObject::new(&tally)).unwrap();

    assert!(matches!(
        pool2.free(from_pool1),
        Err(Error::AddressNotInPool { .. })
    ));
    assert_eq!(tally.destructions.get(), 0);

    pool1.free(from_pool1).unwrap();
    assert_eq!(tally.destructions.get(), 1);
}

#[test]
#[allow(clippy::cast_ptr_alignment, reason = "deliberately misaligned")]
fn freeing_pointer_to_middle_of_object_is_rejected() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    let item = pool.alloc_with(|| TestObject::new(&tally)).unwrap();

    let mid_object = item
        .ptr()
        .as_ptr()
        .cast::<u8>()
        .wrapping_add(size_of::<i32>())
        .cast::<TestObject>();

    assert!(matches!(
        pool.free_ptr(mid_object),
        Err(Error::AddressMisaligned { .. })
    ));
    assert_eq!(pool.len(), 1);
    assert_eq!(tally.destructions.get(), 0);
}

#[test]
fn freeing_vacant_slot_inside_pool_is_rejected() {
    let mut pool = FixedPool::<u8>::new(100).unwrap();

    let item = pool.alloc(1).unwrap();
    let five_slots_later = item.ptr().as_ptr().wrapping_add(5);

    assert!(matches!(
        pool.free_ptr(five_slots_later),
        Err(Error::DoubleFree { index: 5 })
    ));
    assert_eq!(pool.len(), 1);
}

#[test]
fn pool_drop_destroys_remaining_items() {
    let tally = Tally::new();

    {
        let mut pool = FixedPool::<TestObject>::new(5).unwrap();

        pool.alloc_with(|| TestObject::new(&tally)).unwrap();
        pool.alloc_with(|| TestObject::new(&tally)).unwrap();
        let freed = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
        pool.free(freed).unwrap();

        assert_eq!(tally.destructions.get(), 1);
    }

    assert_eq!(tally.destructions.get(), 3);
}

#[test]
fn mixed_alloc_and_free() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(3).unwrap();

    let obj1 = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    let obj2 = pool.alloc_with(|| TestObject::new(&tally)).unwrap();
    let obj3 = pool
        .alloc_with(|| TestObject::with_coords(&tally, 1, 2))
        .unwrap();

    assert_eq!(pool.len(), 3);
    assert_eq!(tally.constructions.get(), 3);
    assert_eq!(tally.param_constructions.get(), 1);

    pool.free(obj2).unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(tally.destructions.get(), 1);

    let obj4 = pool
        .alloc_with(|| TestObject::with_coords(&tally, 3, 4))
        .unwrap();
    assert_eq!(obj4, obj2);
    assert_eq!(tally.constructions.get(), 4);
    assert_eq!(tally.param_constructions.get(), 2);
    assert_eq!(pool.len(), 3);

    pool.free(obj1).unwrap();
    pool.free(obj3).unwrap();
    pool.free(obj4).unwrap();

    assert_eq!(pool.len(), 0);
    assert_eq!(tally.destructions.get(), 4);
}

#[test]
fn len_tracks_outstanding_allocations() {
    let mut pool = FixedPool::<u64>::new(8).unwrap();
    let mut outstanding: Vec<Pooled<u64>> = Vec::new();

    // A fixed interleaving of allocs (true) and frees (false).
    let script = [
        true, true, false, true, true, true, false, false, true, true, true, true, true, false,
        true, false, false, false,
    ];

    for (step, alloc) in script.into_iter().enumerate() {
        if alloc {
            outstanding.push(pool.alloc(u64::try_from(step).unwrap()).unwrap());
        } else {
            let item = outstanding.remove(0);
            pool.free(item).unwrap();
        }

        assert_eq!(pool.len(), outstanding.len());
    }
}

#[test]
fn heavy_churn_ends_empty() {
    const CAPACITY: usize = 1000;

    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(CAPACITY).unwrap();

    let mut items = (0..CAPACITY)
        .map(|_| pool.alloc_with(|| TestObject::new(&tally)).unwrap())
        .collect::<Vec<_>>();

    assert_eq!(pool.len(), CAPACITY);

    for item in items.iter().step_by(2) {
        pool.free(*item).unwrap();
    }

    assert_eq!(pool.len(), CAPACITY / 2);

    for item in items.iter_mut().step_by(2) {
        let replacement = pool.alloc_with(|| TestObject::new(&tally)).unwrap();

        // Vacated slots are refilled lowest index first, i.e. in the order we freed them.
        assert_eq!(replacement, *item);
        *item = replacement;
    }

    assert!(pool.is_full());

    for item in items {
        pool.free(item).unwrap();
    }

    assert_eq!(pool.len(), 0);
    assert_eq!(tally.constructions.get(), CAPACITY + CAPACITY / 2);
    assert_eq!(tally.destructions.get(), tally.constructions.get());
}

#[test]
fn cache_line_aligned_items_are_aligned() {
    let mut pool = FixedPool::<CacheLineAligned>::new(2).unwrap();

    let obj1 = pool.alloc(CacheLineAligned { _data: [0; 64] }).unwrap();
    let obj2 = pool.alloc(CacheLineAligned { _data: [1; 64] }).unwrap();

    assert_eq!(obj1.addr() % 64, 0);
    assert_eq!(obj2.addr() % 64, 0);
}

#[test]
fn wide_aligned_items_are_aligned() {
    let mut pool = FixedPool::<WideAligned>::new(4).unwrap();

    for _ in 0..4 {
        let item = pool.alloc(WideAligned { _data: [0; 16] }).unwrap();
        assert_eq!(item.addr() % 512, 0);
    }
}

#[test]
fn scoped_items_are_freed_at_end_of_scope() {
    let tally = Tally::new();
    let mut pool = FixedPool::<TestObject>::new(1).unwrap();

    {
        let scoped = pool
            .alloc_scoped(TestObject::with_coords(&tally, 5, 6))
            .unwrap();
        assert_eq!(scoped.x, 5);
    }

    assert!(pool.is_empty());
    assert_eq!(tally.destructions.get(), 1);
}
