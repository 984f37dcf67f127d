// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The single-threaded carving driver
//!
//! The same stages the worker pool runs, called directly with
//! whole-image tiles.  This is both the `N = 1` fallback and the
//! reference the pool is required to agree with byte for byte.

use crate::carver::Carver;
use crate::pass::CarvePass;
use crate::tile::{Instruction, Tile};
use image::RgbaImage;
use log::debug;

fn remove_vertical_seam(image: RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let pass = CarvePass::vertical(image);
    pass.pixel_magnitudes(Tile::new(0, 0, w, h, Instruction::PixelMagnitude));
    // Row 0 keeps its raw energy; every later row relaxes in order.
    pass.minimize_vertical_seam(Tile::new(0, 1, w, h, Instruction::MinimizeVerticalSeam));
    let (x, y) = pass.find_min_seam(Tile::new(0, h - 1, w, h, Instruction::MinimizeVerticalSeam));
    pass.mark_vertical_seam(x, y);
    pass.remove_column(Tile::new(0, 0, w, h, Instruction::RemoveColumn));
    pass.carved_image()
}

fn remove_horizontal_seam(image: RgbaImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let pass = CarvePass::horizontal(image);
    pass.pixel_magnitudes(Tile::new(0, 0, w, h, Instruction::PixelMagnitude));
    pass.minimize_horizontal_seam(Tile::new(1, 0, w, h, Instruction::MinimizeHorizontalSeam));
    let (x, y) = pass.find_min_seam(Tile::new(w - 1, 0, w, h, Instruction::MinimizeHorizontalSeam));
    pass.mark_horizontal_seam(x, y);
    pass.remove_row(Tile::new(0, 0, w, h, Instruction::RemoveRow));
    pass.carved_image()
}

/// The one-thread driver.
pub struct SequentialCarver;

impl Carver for SequentialCarver {
    fn carve(&self, image: RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
        let mut current = image;
        while current.height() > target_h || current.width() > target_w {
            if current.height() > target_h {
                current = remove_horizontal_seam(current);
            }
            if current.width() > target_w {
                current = remove_vertical_seam(current);
            }
            debug!("carved to {}x{}", current.width(), current.height());
        }
        current
    }
}
