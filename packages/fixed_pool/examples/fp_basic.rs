//! Basic usage of the `fixed_pool` crate:
//!
//! * Creating a pool.
//! * Allocating items, either from values or from constructor closures.
//! * Reading items.
//! * Freeing items and what happens when things go wrong.

use fixed_pool::FixedPool;

#[derive(Debug, Default)]
struct Point {
    x: i32,
    y: i32,
}

impl Point {
    fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

fn main() {
    let mut numbers = FixedPool::<i32>::new(10).unwrap();

    let a = numbers.alloc(1).unwrap();
    let b = numbers.alloc(2).unwrap();
    let c = numbers.alloc(3).unwrap();

    println!(
        "Pool contains {:?} {:?} {:?} ({} of {} slots used)",
        numbers.get(a),
        numbers.get(b),
        numbers.get(c),
        numbers.len(),
        numbers.capacity()
    );

    let mut points = FixedPool::<Point>::new(2).unwrap();

    // The closure only runs once a slot has been found for the point.
    let origin = points.alloc_default().unwrap();
    let p2 = points.alloc_with(|| Point::new(0, 1)).unwrap();

    if let Some(point) = points.get(p2) {
        println!("Second point is at ({}, {})", point.x, point.y);
    }

    // The pool has a fixed capacity and refuses to grow.
    if let Err(error) = points.alloc(Point::new(5, 5)) {
        println!("Cannot allocate a third point: {error}");
    }

    points.free(origin).unwrap();

    // Freeing the same item twice is detected and reported.
    if let Err(error) = points.free(origin) {
        println!("Cannot free the origin again: {error}");
    }

    // Items that do not belong to the pool are rejected, too.
    let stray = Point::new(9, 9);
    if let Err(error) = points.free_ptr(&stray) {
        println!("Cannot free a point that lives on the stack: {error}");
    }

    // Anything still in a pool is dropped together with the pool.
    println!("Dropping pools with {} and {} items", numbers.len(), points.len());
}
