// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The two fixed convolution kernels
//!
//! Weights from the Sobel operator
//! (https://en.wikipedia.org/wiki/Sobel_operator).  A kernel is
//! addressed `K[sx][sy]`, and `(sx, sy)` maps to the neighbor at
//! `(x - 1 + sx, y - 1 + sy)` — the first index walks the x axis.
//! That addressing is load-bearing: reordering it changes every energy
//! value and therefore every seam.

/// A 3×3 integer kernel.
pub type Kernel = [[i32; 3]; 3];

/// Picks out differences across the image's x axis.
pub const X_GRADIENT: Kernel = [[1, 0, -1], [2, 0, -2], [1, 0, -1]];

/// Picks out differences across the image's y axis.
pub const Y_GRADIENT: Kernel = [[1, 2, 1], [0, 0, 0], [-1, -2, -1]];
