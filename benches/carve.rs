// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{criterion_group, criterion_main, Criterion};
use image::{Pixel, Rgba, RgbaImage};
use pngseam::{Carver, SequentialCarver};

fn patterned(w: u32, h: u32) -> RgbaImage {
    let mut img = RgbaImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let px: Rgba<u8> = Pixel::from_channels(
                ((x * 31 + y * 17) % 251) as u8,
                ((x * 7 + y * 3) % 239) as u8,
                ((x * 13 + y * 29) % 227) as u8,
                255,
            );
            img.put_pixel(x, y, px);
        }
    }
    img
}

fn bench_carve(c: &mut Criterion) {
    let image = patterned(48, 48);
    c.bench_function("carve 48x48 to 40x40", move |b| {
        b.iter(|| SequentialCarver.carve(image.clone(), 40, 40))
    });
}

criterion_group!(benches, bench_carve);
criterion_main!(benches);
