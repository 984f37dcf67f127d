// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A two-dimensional buffer shared across the worker pool
//!
//! Both intermediate products of a carving pass — the cumulative-cost
//! table and the compacted pixel buffer — are written by several
//! workers at once.  Handing each worker `&mut` slices would force the
//! stage loops into a shape dictated by the borrow checker instead of
//! by the tiling, so [`SharedGrid`] instead exposes cell reads and
//! writes through `&self` and leans on the scheduler's contract:
//! within a stage, tiles partition the written cells disjointly, and a
//! barrier separates one stage's writes from the next stage's reads.
//!
//! Violating that contract is a data race.  Every writer path in this
//! crate goes through tiles produced by `Tile::split_columns` or
//! `Tile::split_rows`, which cannot overlap.

use std::cell::UnsafeCell;

/// A `width × height` grid of copyable cells, writable from multiple
/// workers into disjoint cells.
pub struct SharedGrid<P> {
    width: u32,
    height: u32,
    cells: UnsafeCell<Box<[P]>>,
}

// Writes are partitioned by tile and ordered across stages by the
// scheduler's barrier; see the module docs.
unsafe impl<P: Send> Sync for SharedGrid<P> {}

impl<P: Copy> SharedGrid<P> {
    /// A grid with every cell set to `fill`.
    pub fn filled(width: u32, height: u32, fill: P) -> Self {
        SharedGrid {
            width,
            height,
            cells: UnsafeCell::new(
                vec![fill; width as usize * height as usize].into_boxed_slice(),
            ),
        }
    }

    /// Grid width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    // The index math lives here and nowhere else; it is the same
    // row-major layout image.rs uses.
    fn index(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height);
        y as usize * self.width as usize + x as usize
    }

    /// Read one cell.
    pub fn get(&self, x: u32, y: u32) -> P {
        let i = self.index(x, y);
        unsafe { (*self.cells.get())[i] }
    }

    /// Write one cell.  The caller's tile must own `(x, y)` for the
    /// current stage.
    pub fn set(&self, x: u32, y: u32, value: P) {
        let i = self.index(x, y);
        unsafe {
            (*self.cells.get())[i] = value;
        }
    }

    /// Copy the whole grid out.  Only meaningful after a stage barrier,
    /// when no writer is active.
    pub fn snapshot(&self) -> Vec<P> {
        unsafe { (*self.cells.get()).to_vec() }
    }
}
