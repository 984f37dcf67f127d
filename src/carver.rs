// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The driver seam.  Two drivers exist — one thread and a worker pool —
//! and both reduce an image to target dimensions by repeated seam
//! removal.  Everything past the batch loader talks to this trait.

use image::RgbaImage;

/// Reduce an image to exactly `target_w × target_h` by removing seams.
/// Callers guarantee the targets are at least 1 and no larger than the
/// image.
pub trait Carver {
    /// Carve until the target dimensions are reached.
    fn carve(&self, image: RgbaImage, target_w: u32, target_h: u32) -> RgbaImage;
}
