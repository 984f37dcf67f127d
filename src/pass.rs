// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! One seam-removal iteration
//!
//! A [`CarvePass`] owns everything a single removal needs: the current
//! image (read-only for the whole pass), the cumulative-cost table, and
//! the output buffer sized one pixel smaller along the carved axis.
//! The cost table goes through three lives per pass:
//!
//! 1. filled with per-pixel gradient magnitudes (`pixel_magnitudes`),
//! 2. relaxed into cumulative path costs, one row or column at a time
//!    (`minimize_*_seam`), so each cell holds the cheapest way to reach
//!    it from the starting edge,
//! 3. stamped with `-1` along the chosen seam (`find_min_seam` +
//!    `mark_*_seam`), which is how the compactors know what to skip.
//!
//! Every operation takes a [`Tile`], so the same code serves the
//! sequential driver (one whole-image tile) and the worker pool (strip
//! tiles).  Two orderings are contractual and shared between the sweep
//! and the backtrace:
//!
//! * parent candidates are tried upper-left, top, upper-right (or
//!   left-upper, left, left-lower); the first in-bounds candidate seeds
//!   the minimum and later candidates must be *strictly* cheaper to
//!   displace it;
//! * the end-of-sweep scan runs x-outer, y-inner, and keeps the first
//!   minimum it sees.
//!
//! Change either and ties resolve differently, seams move, and the
//! sequential and concurrent drivers stop agreeing with each other.

use crate::filter::{Kernel, X_GRADIENT, Y_GRADIENT};
use crate::grid::SharedGrid;
use crate::pixel::{gradient_magnitude, PixelAccumulator};
use crate::tile::{Instruction, Tile};
use image::{Pixel, Rgba, RgbaImage};
use itertools::iproduct;

/// Cost-table sentinel for "this pixel is on the seam".
const SEAM_MARK: f32 = -1.0;

/// The state of one seam removal: source image, cost table, and the
/// one-pixel-smaller output buffer.
pub struct CarvePass {
    image: RgbaImage,
    cost: SharedGrid<f32>,
    carved: SharedGrid<Rgba<u8>>,
}

fn blank() -> Rgba<u8> {
    Pixel::from_channels(0, 0, 0, 0)
}

impl CarvePass {
    /// A pass that will remove one vertical seam (output is one column
    /// narrower).
    pub fn vertical(image: RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        CarvePass {
            cost: SharedGrid::filled(w, h, 0.0),
            carved: SharedGrid::filled(w - 1, h, blank()),
            image,
        }
    }

    /// A pass that will remove one horizontal seam (output is one row
    /// shorter).
    pub fn horizontal(image: RgbaImage) -> Self {
        let (w, h) = image.dimensions();
        CarvePass {
            cost: SharedGrid::filled(w, h, 0.0),
            carved: SharedGrid::filled(w, h - 1, blank()),
            image,
        }
    }

    // Reads with the decoder's out-of-range convention: anything off
    // the canvas is transparent black.
    fn sample(&self, x: i64, y: i64) -> Rgba<u8> {
        let (w, h) = self.image.dimensions();
        if x < 0 || y < 0 || x >= i64::from(w) || y >= i64::from(h) {
            blank()
        } else {
            *self.image.get_pixel(x as u32, y as u32)
        }
    }

    // Run one kernel centered on (x, y).  Alpha is taken from the
    // center pixel; the color sums are clamped before returning.
    fn apply_filter(&self, x: i64, y: i64, kernel: &Kernel) -> PixelAccumulator {
        let center = self.sample(x, y);
        let mut acc = PixelAccumulator {
            a: i32::from(center.channels()[3]),
            ..Default::default()
        };
        for sx in 0..3usize {
            for sy in 0..3usize {
                let p = self.sample(x - 1 + sx as i64, y - 1 + sy as i64);
                let c = p.channels();
                let weight = kernel[sx][sy];
                acc.r += i32::from(c[0]) * weight;
                acc.g += i32::from(c[1]) * weight;
                acc.b += i32::from(c[2]) * weight;
            }
        }
        acc.clamp_negative_rgb();
        acc
    }

    /// Fill the tile's cost cells with gradient magnitudes.
    ///
    /// The kernel center for the last row and column collapses onto the
    /// second-to-last (`W-2`/`H-2`) so the 3×3 window never runs off
    /// the high edge.  That skews energy at the far edges, but the skew
    /// is part of the output contract and stays.
    pub fn pixel_magnitudes(&self, tile: Tile) {
        let (w, h) = self.image.dimensions();
        for x in tile.min_x..tile.max_x {
            for y in tile.min_y..tile.max_y {
                let xc = i64::from(x).min(i64::from(w) - 2);
                let yc = i64::from(y).min(i64::from(h) - 2);
                let x_gradient = self.apply_filter(xc, yc, &X_GRADIENT);
                let y_gradient = self.apply_filter(xc, yc, &Y_GRADIENT);
                let (cost, _magnitude) = gradient_magnitude(&x_gradient, &y_gradient);
                self.cost.set(x, y, cost);
            }
        }
    }

    // Of up to three parent candidates, in contract order: skip the
    // out-of-bounds ones, seed with the first survivor, replace only on
    // strictly smaller cost.
    fn min_parent(&self, candidates: [(i64, i64); 3]) -> (u32, u32) {
        let (w, h) = (i64::from(self.cost.width()), i64::from(self.cost.height()));
        let mut best: Option<(u32, u32)> = None;
        for &(cx, cy) in candidates.iter() {
            if cx < 0 || cy < 0 || cx >= w || cy >= h {
                continue;
            }
            let candidate = (cx as u32, cy as u32);
            best = match best {
                None => Some(candidate),
                Some(b) => {
                    if self.cost.get(candidate.0, candidate.1) < self.cost.get(b.0, b.1) {
                        Some(candidate)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best.unwrap()
    }

    /// Relax the tile's cells against the row above: each cell gains
    /// the cost of its cheapest upper parent.  Callers must have fully
    /// relaxed row `y - 1` before any cell of row `y` runs.
    pub fn minimize_vertical_seam(&self, tile: Tile) {
        for y in tile.min_y..tile.max_y {
            for x in tile.min_x..tile.max_x {
                let (px, py) = self.min_parent([
                    (i64::from(x) - 1, i64::from(y) - 1),
                    (i64::from(x), i64::from(y) - 1),
                    (i64::from(x) + 1, i64::from(y) - 1),
                ]);
                let relaxed = self.cost.get(x, y) + self.cost.get(px, py);
                self.cost.set(x, y, relaxed);
            }
        }
    }

    /// Relax the tile's cells against the column to the left; the
    /// mirror of [`CarvePass::minimize_vertical_seam`].
    pub fn minimize_horizontal_seam(&self, tile: Tile) {
        for x in tile.min_x..tile.max_x {
            for y in tile.min_y..tile.max_y {
                let (px, py) = self.min_parent([
                    (i64::from(x) - 1, i64::from(y) - 1),
                    (i64::from(x) - 1, i64::from(y)),
                    (i64::from(x) - 1, i64::from(y) + 1),
                ]);
                let relaxed = self.cost.get(x, y) + self.cost.get(px, py);
                self.cost.set(x, y, relaxed);
            }
        }
    }

    /// Scan the tile (x outer, y inner) for the cheapest cell.  Ties go
    /// to the first cell scanned.
    pub fn find_min_seam(&self, tile: Tile) -> (u32, u32) {
        let mut best = (tile.min_x, tile.min_y);
        let mut best_cost = std::f32::MAX;
        for (x, y) in iproduct!(tile.min_x..tile.max_x, tile.min_y..tile.max_y) {
            let c = self.cost.get(x, y);
            if c < best_cost {
                best_cost = c;
                best = (x, y);
            }
        }
        best
    }

    /// Mark the vertical seam ending at `(x, y)`: stamp the cell, then
    /// walk parents upward stamping each, until the top row.
    pub fn mark_vertical_seam(&self, x: u32, y: u32) {
        self.cost.set(x, y, SEAM_MARK);
        let (mut x, mut y) = (x, y);
        while y > 0 {
            let (px, py) = self.min_parent([
                (i64::from(x) - 1, i64::from(y) - 1),
                (i64::from(x), i64::from(y) - 1),
                (i64::from(x) + 1, i64::from(y) - 1),
            ]);
            self.cost.set(px, py, SEAM_MARK);
            x = px;
            y = py;
        }
    }

    /// Mark the horizontal seam ending at `(x, y)`, walking leftward to
    /// the first column.
    pub fn mark_horizontal_seam(&self, x: u32, y: u32) {
        self.cost.set(x, y, SEAM_MARK);
        let (mut x, mut y) = (x, y);
        while x > 0 {
            let (px, py) = self.min_parent([
                (i64::from(x) - 1, i64::from(y) - 1),
                (i64::from(x) - 1, i64::from(y)),
                (i64::from(x) - 1, i64::from(y) + 1),
            ]);
            self.cost.set(px, py, SEAM_MARK);
            x = px;
            y = py;
        }
    }

    /// Copy the tile's rows into the output, dropping the one marked
    /// cell per row.  Compaction relies on the backtrace having left
    /// exactly one mark in every row.
    pub fn remove_column(&self, tile: Tile) {
        for y in tile.min_y..tile.max_y {
            let mut nx = 0;
            for x in tile.min_x..tile.max_x {
                if self.cost.get(x, y) > SEAM_MARK {
                    self.carved.set(nx, y, *self.image.get_pixel(x, y));
                    nx += 1;
                }
            }
        }
    }

    /// Copy the tile's columns into the output, dropping the one marked
    /// cell per column.
    pub fn remove_row(&self, tile: Tile) {
        for x in tile.min_x..tile.max_x {
            let mut ny = 0;
            for y in tile.min_y..tile.max_y {
                if self.cost.get(x, y) > SEAM_MARK {
                    self.carved.set(x, ny, *self.image.get_pixel(x, y));
                    ny += 1;
                }
            }
        }
    }

    /// Run the stage a tile's instruction names.
    pub fn process_instruction(&self, tile: Tile) {
        match tile.instruction {
            Instruction::PixelMagnitude => self.pixel_magnitudes(tile),
            Instruction::MinimizeVerticalSeam => self.minimize_vertical_seam(tile),
            Instruction::MinimizeHorizontalSeam => self.minimize_horizontal_seam(tile),
            Instruction::RemoveColumn => self.remove_column(tile),
            Instruction::RemoveRow => self.remove_row(tile),
        }
    }

    /// The compacted image.  Valid once the remove stage has covered
    /// the whole source image.
    pub fn carved_image(&self) -> RgbaImage {
        let cells = self.carved.snapshot();
        let mut raw = Vec::with_capacity(cells.len() * 4);
        for px in cells {
            raw.extend_from_slice(px.channels());
        }
        RgbaImage::from_raw(self.carved.width(), self.carved.height(), raw).unwrap()
    }
}
