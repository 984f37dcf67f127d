#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Content-aware PNG reduction
//!
//! Seam carving shrinks an image by repeatedly removing a seam: a
//! one-pixel-wide connected path from edge to edge that crosses as
//! little visual information as possible.  Each removal computes a
//! Sobel-gradient energy map, relaxes it into cumulative path costs
//! with a dynamic program, backtraces the cheapest seam, marks it, and
//! compacts the image around the marks.  Salient structure survives;
//! flat regions quietly collapse.
//!
//! The interesting half of this crate is the scheduler: every stage of
//! a removal is divided into tiles and spread over a fixed worker
//! pool, with the dynamic program's serial row-by-row dependency
//! enforced by per-row barriers.  Tie-breaks are pinned down tightly
//! enough that the pool and the single-threaded driver produce
//! byte-identical output for any thread count.

extern crate image;

// 8-bit pixels with signed accumulators for kernel application.
pub mod pixel;

// The two fixed Sobel kernels.
pub mod filter;

// Work tiles: a rectangle plus a stage instruction, and the strip
// splitters the scheduler builds stages from.
pub mod tile;

// A 2-D buffer many workers may write, tile-disjointly, without locks.
pub mod grid;

// One seam removal: energy map, cost sweep, backtrace, compaction.
pub mod pass;

// The trait the drivers implement.
pub mod carver;
pub use carver::Carver;

// The one-thread reference driver.
pub mod sequential;
pub use sequential::SequentialCarver;

// The worker pool and the concurrent driver.
pub mod scheduler;
pub use scheduler::ConcurrentCarver;

// The jobs-file reader and batch runners.
pub mod jobs;
