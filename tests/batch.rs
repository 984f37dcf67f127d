// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end batch runs through the `editor` binary.

use assert_cmd::prelude::*;
use image::{Pixel, Rgba, RgbaImage};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;

fn editor() -> Command {
    Command::cargo_bin("editor").unwrap()
}

fn write_uniform(dir: &Path, name: &str, w: u32, h: u32, color: [u8; 4]) {
    let mut img = RgbaImage::new(w, h);
    for p in img.pixels_mut() {
        let px: Rgba<u8> = Pixel::from_channels(color[0], color[1], color[2], color[3]);
        *p = px;
    }
    img.save(dir.join(name)).unwrap();
}

fn write_patterned(dir: &Path, name: &str, w: u32, h: u32) {
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
    img.save(dir.join(name)).unwrap();
}

#[test]
fn solid_image_halves_to_a_solid_image() {
    let dir = tempfile::tempdir().unwrap();
    write_uniform(dir.path(), "in.png", 10, 10, [255, 0, 0, 255]);
    let jobs = dir.path().join("jobs.csv");
    fs::write(&jobs, "in.png, out.png, 0.5, 0.5\n").unwrap();

    editor().arg(&jobs).assert().success();

    let out = image::open(dir.path().join("out.png")).unwrap().to_rgba();
    assert_eq!(out.dimensions(), (5, 5));
    for p in out.pixels() {
        assert_eq!(p.channels(), &[255, 0, 0, 255]);
    }
}

#[test]
fn pool_runs_match_the_sequential_run_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    write_patterned(dir.path(), "in.png", 20, 16);
    for (jobs, out) in &[("seq.csv", "seq.png"), ("p2.csv", "p2.png"), ("p4.csv", "p4.png")] {
        fs::write(
            dir.path().join(jobs),
            format!("in.png, {}, 0.8, 0.75\n", out),
        )
        .unwrap();
    }

    editor().arg(dir.path().join("seq.csv")).assert().success();
    editor()
        .arg(dir.path().join("p2.csv"))
        .arg("-p=2")
        .assert()
        .success();
    editor()
        .arg(dir.path().join("p4.csv"))
        .arg("-p=4")
        .assert()
        .success();

    let seq = fs::read(dir.path().join("seq.png")).unwrap();
    assert_eq!(fs::read(dir.path().join("p2.png")).unwrap(), seq);
    assert_eq!(fs::read(dir.path().join("p4.png")).unwrap(), seq);
}

#[test]
fn malformed_line_aborts_the_rest_of_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_uniform(dir.path(), "in.png", 8, 8, [0, 128, 0, 255]);
    let jobs = dir.path().join("jobs.csv");
    fs::write(
        &jobs,
        "in.png, first.png, 0.5, 0.5\nin.png, second.png\nin.png, third.png, 0.5, 0.5\n",
    )
    .unwrap();

    editor()
        .arg(&jobs)
        .assert()
        .success()
        .stderr(predicate::str::contains("malformed"));

    assert!(dir.path().join("first.png").exists());
    assert!(!dir.path().join("second.png").exists());
    assert!(!dir.path().join("third.png").exists());
}

#[test]
fn missing_input_skips_only_that_job() {
    let dir = tempfile::tempdir().unwrap();
    write_uniform(dir.path(), "in.png", 8, 8, [0, 0, 200, 255]);
    let jobs = dir.path().join("jobs.csv");
    fs::write(
        &jobs,
        "gone.png, lost.png, 0.5, 0.5\nin.png, kept.png, 0.5, 0.5\n",
    )
    .unwrap();

    editor().arg(&jobs).assert().success();

    assert!(!dir.path().join("lost.png").exists());
    let kept = image::open(dir.path().join("kept.png")).unwrap().to_rgba();
    assert_eq!(kept.dimensions(), (4, 4));
}

#[test]
fn missing_jobs_file_is_a_hard_failure() {
    let dir = tempfile::tempdir().unwrap();
    editor()
        .arg(dir.path().join("no-such.csv"))
        .assert()
        .failure();
}

#[test]
fn unit_scales_copy_the_image_through() {
    let dir = tempfile::tempdir().unwrap();
    write_patterned(dir.path(), "in.png", 6, 5);
    let jobs = dir.path().join("jobs.csv");
    fs::write(&jobs, "in.png, out.png, 1.0, 1.0\n").unwrap();

    editor().arg(&jobs).assert().success();

    let input = image::open(dir.path().join("in.png")).unwrap().to_rgba();
    let out = image::open(dir.path().join("out.png")).unwrap().to_rgba();
    assert_eq!(out.dimensions(), input.dimensions());
    assert_eq!(&*out, &*input);
}
