// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pixel algebra for the energy stage
//!
//! Kernel application needs signed, wider-than-8-bit arithmetic: a 3×3
//! kernel with weights up to ±2 over 8-bit channels can reach ±1020 per
//! channel before the clamp.  [`PixelAccumulator`] carries those
//! intermediate values, and [`gradient_magnitude`] combines a pair of
//! accumulators (one per kernel) into the scalar cost the rest of the
//! pipeline runs on.

use image::{Pixel, Rgba};

/// A signed 32-bit RGBA quadruple holding a pixel mid-filter.  The
/// alpha channel rides along unfiltered: it is copied from the source
/// pixel and never enters the kernel sums.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PixelAccumulator {
    /// Red sum.
    pub r: i32,
    /// Green sum.
    pub g: i32,
    /// Blue sum.
    pub b: i32,
    /// Alpha, passed through from the source pixel.
    pub a: i32,
}

impl PixelAccumulator {
    /// Clamp negative color sums to zero.  Alpha is left alone.
    pub fn clamp_negative_rgb(&mut self) {
        if self.r < 0 {
            self.r = 0;
        }
        if self.g < 0 {
            self.g = 0;
        }
        if self.b < 0 {
            self.b = 0;
        }
    }

    /// Narrow the accumulator back to an 8-bit pixel.  Callers clamp
    /// first, so the casts do not wrap.
    pub fn to_rgba(&self) -> Rgba<u8> {
        Pixel::from_channels(self.r as u8, self.g as u8, self.b as u8, self.a as u8)
    }
}

/// Combine the x- and y-kernel accumulators of one pixel into its
/// gradient magnitude.
///
/// Each channel becomes `sqrt(x² + y²)`; the returned scalar is the
/// plain sum of the three color magnitudes (not a Euclidean norm — the
/// cost table and every tie-break downstream depend on exactly this
/// formula).  The second return is the magnitude as a pixel, with alpha
/// taken from the x accumulator.
pub fn gradient_magnitude(
    x: &PixelAccumulator,
    y: &PixelAccumulator,
) -> (f32, PixelAccumulator) {
    let r = f64::from(x.r * x.r + y.r * y.r).sqrt() as f32;
    let g = f64::from(x.g * x.g + y.g * y.g).sqrt() as f32;
    let b = f64::from(x.b * x.b + y.b * y.b).sqrt() as f32;

    (
        r + g + b,
        PixelAccumulator {
            r: r as i32,
            g: g as i32,
            b: b as i32,
            a: x.a,
        },
    )
}
