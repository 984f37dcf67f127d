// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The batch loader
//!
//! A jobs file is one job per line: input path, output path, x scale,
//! y scale, comma-separated, with paths resolved relative to the jobs
//! file itself.  The loader walks the file and feeds validated jobs to
//! a carving driver.  Failure containment lives entirely here: a job
//! that cannot be loaded or scaled is logged and skipped, a malformed
//! line aborts the rest of the batch, and only an unreadable jobs file
//! is an error the caller sees.

use crate::carver::Carver;
use crate::scheduler;
use crate::sequential::SequentialCarver;
use failure::Fail;
use image::png::PNGEncoder;
use image::{ColorType, ImageError, RgbaImage};
use log::{error, info, warn};
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Why one job was dropped from a batch.
#[derive(Debug, Fail)]
pub enum JobError {
    /// The input file could not be opened.
    #[fail(display = "could not open {}: {}", path, cause)]
    InputMissing {
        /// The input path as resolved.
        path: String,
        /// The underlying open failure.
        cause: io::Error,
    },
    /// The input file opened but did not decode as a PNG.
    #[fail(display = "could not decode {}: {}", path, cause)]
    Undecodable {
        /// The input path as resolved.
        path: String,
        /// The decoder's complaint.
        cause: ImageError,
    },
    /// The scale fields did not parse, fell outside `(0, 1]`, or
    /// floored a target dimension to zero.
    #[fail(display = "invalid scale factors {}, {} for {}", scale_x, scale_y, path)]
    BadScale {
        /// The input path as resolved.
        path: String,
        /// The x scale field as written.
        scale_x: String,
        /// The y scale field as written.
        scale_y: String,
    },
}

/// Why a whole batch stopped.
#[derive(Debug, Fail)]
pub enum BatchError {
    /// The jobs file itself could not be opened; nothing ran.
    #[fail(display = "could not open jobs file {}: {}", path, cause)]
    JobsFileUnreadable {
        /// The jobs file path.
        path: String,
        /// The underlying open failure.
        cause: io::Error,
    },
    /// A line had too few fields (or none at all); the batch aborts at
    /// this line and later jobs never run.
    #[fail(display = "jobs file line {} is malformed: {}", number, reason)]
    MalformedJobLine {
        /// One-based line number.
        number: usize,
        /// What was missing.
        reason: String,
    },
}

// The four fields of a job line, whitespace already stripped.
pub(crate) struct JobLine {
    pub input: String,
    pub output: String,
    pub scale_x: String,
    pub scale_y: String,
}

// A job that passed validation and is ready to carve.
pub(crate) struct LoadedJob {
    pub image: RgbaImage,
    pub output: PathBuf,
    pub target_w: u32,
    pub target_h: u32,
}

// Strip every whitespace character (interior included), then split on
// commas.  Ok(None) is the quiet skip for lines with an empty input or
// output field.
pub(crate) fn split_line(line: &str, number: usize) -> Result<Option<JobLine>, BatchError> {
    let stripped: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    if stripped.is_empty() {
        return Err(BatchError::MalformedJobLine {
            number,
            reason: "empty line".to_string(),
        });
    }
    let fields: Vec<&str> = stripped.split(',').collect();
    if fields.len() < 2 {
        return Err(BatchError::MalformedJobLine {
            number,
            reason: format!("no input/output paths in {:?}", stripped),
        });
    }
    if fields.len() < 4 {
        return Err(BatchError::MalformedJobLine {
            number,
            reason: format!("missing scale factors in {:?}", stripped),
        });
    }
    if fields[0].is_empty() || fields[1].is_empty() {
        return Ok(None);
    }
    Ok(Some(JobLine {
        input: fields[0].to_string(),
        output: fields[1].to_string(),
        scale_x: fields[2].to_string(),
        scale_y: fields[3].to_string(),
    }))
}

// Decode the input and turn the scale fields into target dimensions.
pub(crate) fn load_job(dir: &Path, fields: &JobLine) -> Result<LoadedJob, JobError> {
    let input = dir.join(&fields.input);
    let image = image::open(&input)
        .map_err(|e| match e {
            ImageError::IoError(cause) => JobError::InputMissing {
                path: input.display().to_string(),
                cause,
            },
            cause => JobError::Undecodable {
                path: input.display().to_string(),
                cause,
            },
        })?
        .to_rgba();

    let bad_scale = || JobError::BadScale {
        path: input.display().to_string(),
        scale_x: fields.scale_x.clone(),
        scale_y: fields.scale_y.clone(),
    };
    let scale_x: f64 = fields.scale_x.parse().map_err(|_| bad_scale())?;
    let scale_y: f64 = fields.scale_y.parse().map_err(|_| bad_scale())?;
    if !(scale_x > 0.0 && scale_x <= 1.0 && scale_y > 0.0 && scale_y <= 1.0) {
        return Err(bad_scale());
    }
    let (w, h) = image.dimensions();
    let target_w = (f64::from(w) * scale_x).floor() as u32;
    let target_h = (f64::from(h) * scale_y).floor() as u32;
    if target_w == 0 || target_h == 0 {
        return Err(bad_scale());
    }
    Ok(LoadedJob {
        image,
        output: dir.join(&fields.output),
        target_w,
        target_h,
    })
}

// Open the jobs file and hand back a buffered reader plus the
// directory job paths resolve against.
pub(crate) fn open_jobs_file(path: &Path) -> Result<(BufReader<File>, PathBuf), BatchError> {
    let file = File::open(path).map_err(|cause| BatchError::JobsFileUnreadable {
        path: path.display().to_string(),
        cause,
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    Ok((BufReader::new(file), dir))
}

// Encode as PNG no matter what extension the output path carries.
pub(crate) fn save_png(path: &Path, image: &RgbaImage) -> io::Result<()> {
    let file = File::create(path)?;
    PNGEncoder::new(file).encode(image, image.width(), image.height(), ColorType::RGBA(8))
}

// The batch walk both runners share: parse each line, load the job,
// hand it to `carve`.  Malformed lines abort the walk; per-job
// failures skip the job.
pub(crate) fn drive_batch<R: BufRead>(reader: R, dir: &Path, mut carve: impl FnMut(LoadedJob)) {
    for (index, line) in reader.lines().enumerate() {
        let number = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("jobs file stopped being readable at line {}: {}", number, e);
                return;
            }
        };
        let fields = match split_line(&line, number) {
            Ok(Some(fields)) => fields,
            Ok(None) => continue,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };
        match load_job(dir, &fields) {
            Ok(job) => {
                info!(
                    "carving {} to {}x{}",
                    fields.input, job.target_w, job.target_h
                );
                carve(job);
            }
            Err(e) => warn!("skipping job at line {}: {}", number, e),
        }
    }
}

/// Run a jobs file start to finish on one thread, writing each output
/// as its job completes.
pub fn run_sequential(jobs_path: &Path) -> Result<(), failure::Error> {
    let (reader, dir) = open_jobs_file(jobs_path)?;
    drive_batch(reader, &dir, |job| {
        let carved = SequentialCarver.carve(job.image, job.target_w, job.target_h);
        if let Err(e) = save_png(&job.output, &carved) {
            warn!("could not write {}: {}", job.output.display(), e);
        }
    });
    Ok(())
}

/// Run a jobs file with `threads` participants; one thread means the
/// sequential runner.
pub fn run(jobs_path: &Path, threads: u32) -> Result<(), failure::Error> {
    if threads > 1 {
        scheduler::run_batch(jobs_path, threads)
    } else {
        run_sequential(jobs_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Pixel, Rgba};

    #[test]
    fn whitespace_is_stripped_everywhere() {
        let fields = split_line("  my photo.png ,\tout dir/out.png , 0.5 , 0.9  ", 1)
            .unwrap()
            .unwrap();
        assert_eq!(fields.input, "myphoto.png");
        assert_eq!(fields.output, "outdir/out.png");
        assert_eq!(fields.scale_x, "0.5");
        assert_eq!(fields.scale_y, "0.9");
    }

    #[test]
    fn short_lines_are_malformed() {
        assert!(split_line("only.png", 3).is_err());
        assert!(split_line("in.png,out.png,0.5", 3).is_err());
        match split_line("", 7) {
            Err(BatchError::MalformedJobLine { number, .. }) => assert_eq!(number, 7),
            other => panic!("expected malformed line, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn blank_paths_skip_the_line() {
        assert!(split_line(",out.png,0.5,0.5", 1).unwrap().is_none());
        assert!(split_line("in.png,,0.5,0.5", 1).unwrap().is_none());
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let fields = split_line("a.png,b.png,0.5,0.5,leftover", 1).unwrap().unwrap();
        assert_eq!(fields.scale_y, "0.5");
    }

    fn jobline(input: &str, sx: &str, sy: &str) -> JobLine {
        JobLine {
            input: input.to_string(),
            output: "out.png".to_string(),
            scale_x: sx.to_string(),
            scale_y: sy.to_string(),
        }
    }

    fn write_test_png(dir: &Path, name: &str, w: u32, h: u32) {
        let mut img = RgbaImage::new(w, h);
        for p in img.pixels_mut() {
            let px: Rgba<u8> = Pixel::from_channels(120, 30, 10, 255);
            *p = px;
        }
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn scales_outside_unit_interval_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_test_png(dir.path(), "in.png", 10, 10);
        for (sx, sy) in &[("0", "0.5"), ("1.5", "0.5"), ("0.5", "-0.2"), ("abc", "0.5")] {
            let result = load_job(dir.path(), &jobline("in.png", sx, sy));
            match result {
                Err(JobError::BadScale { .. }) => {}
                _ => panic!("scale ({}, {}) should be rejected", sx, sy),
            }
        }
    }

    #[test]
    fn scales_that_floor_to_zero_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_test_png(dir.path(), "in.png", 10, 10);
        let result = load_job(dir.path(), &jobline("in.png", "0.05", "0.5"));
        assert!(result.is_err());
    }

    #[test]
    fn unit_scale_is_a_valid_zero_work_job() {
        let dir = tempfile::tempdir().unwrap();
        write_test_png(dir.path(), "in.png", 10, 8);
        let job = load_job(dir.path(), &jobline("in.png", "1.0", "1.0")).unwrap();
        assert_eq!((job.target_w, job.target_h), (10, 8));
    }

    #[test]
    fn targets_floor_downward() {
        let dir = tempfile::tempdir().unwrap();
        write_test_png(dir.path(), "in.png", 10, 8);
        let job = load_job(dir.path(), &jobline("in.png", "0.57", "0.9")).unwrap();
        assert_eq!((job.target_w, job.target_h), (5, 7));
    }

    #[test]
    fn missing_input_is_input_missing() {
        let dir = tempfile::tempdir().unwrap();
        match load_job(dir.path(), &jobline("nope.png", "0.5", "0.5")) {
            Err(JobError::InputMissing { .. }) => {}
            _ => panic!("expected InputMissing"),
        }
    }

    #[test]
    fn garbage_input_is_undecodable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.png"), b"not a png at all").unwrap();
        match load_job(dir.path(), &jobline("bad.png", "0.5", "0.5")) {
            Err(JobError::Undecodable { .. }) => {}
            _ => panic!("expected Undecodable"),
        }
    }

    #[test]
    fn saved_outputs_are_png_regardless_of_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut img = RgbaImage::new(2, 2);
        for p in img.pixels_mut() {
            *p = Pixel::from_channels(1, 2, 3, 255);
        }
        let path = dir.path().join("out.data");
        save_png(&path, &img).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
