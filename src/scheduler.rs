// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The worker pool
//!
//! A fixed pool of N participants: N-1 spawned workers plus the
//! coordinator, which enqueues work and then pitches in on the same
//! queue so no core idles while it waits.  Every carving stage follows
//! the same rendezvous:
//!
//! 1. The coordinator splits the stage into N strip tiles, stages them
//!    on a fresh per-stage queue, and preloads a counter channel with
//!    the descending integers `N-1 … 0` before closing it.
//! 2. It then pumps: move staged tiles onto the shared work queue,
//!    opportunistically execute tiles itself, and return when the stage
//!    gate closes.
//! 3. Whoever finishes a tile takes one integer off the counter.
//!    Taking `0` means every tile of the stage is done, and that
//!    participant closes the gate.
//!
//! The counter gives the pool a single observable "last tile done"
//! event without any participant knowing N or bumping an atomic per
//! tile.  Closing the gate is the stage barrier: a worker only takes
//! its integer after its writes land, so everything written during
//! stage k is visible to stage k+1.
//!
//! Finished images ride a separate pipeline: `(path, image)` pairs on
//! an outputs queue, each paired with a completion token — `1` for an
//! intermediate image, `-1` for the batch's last.  Whichever worker
//! consumes the `-1` signals the coordinator and leaves; the rest drain
//! and leave when the queues close.  Workers never fail a tile; a
//! broken output write is logged and the batch moves on.

use crate::carver::Carver;
use crate::jobs::{self, LoadedJob};
use crate::pass::CarvePass;
use crate::tile::{Instruction, Tile};
use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::select;
use image::RgbaImage;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Completion token for an image with more batch behind it.
const MORE_OUTPUT: i32 = 1;
/// Completion token for the batch's final image.
const LAST_OUTPUT: i32 = -1;

// A finished image on its way to the PNG encoder.
struct OutputJob {
    path: PathBuf,
    image: RgbaImage,
}

// Per-stage rendezvous state: the descending counter and the gate the
// last finisher closes.
struct StageSync {
    remaining: Receiver<u32>,
    gate: Mutex<Option<Sender<()>>>,
}

impl StageSync {
    fn new(workers: u32) -> (Arc<StageSync>, Receiver<()>) {
        let (count_tx, count_rx) = bounded(workers as usize);
        for left in (0..workers).rev() {
            count_tx.send(left).unwrap();
        }
        // Closing the counter marks it as the stage's full allotment.
        drop(count_tx);
        let (gate_tx, gate_rx) = bounded(0);
        (
            Arc::new(StageSync {
                remaining: count_rx,
                gate: Mutex::new(Some(gate_tx)),
            }),
            gate_rx,
        )
    }

    // Called once per processed tile.  The participant that draws 0
    // closes the gate and releases everyone blocked on the stage.
    fn complete_tile(&self) {
        if self.remaining.recv().unwrap() == 0 {
            self.gate.lock().unwrap().take();
        }
    }
}

// One tile plus the pass and stage it belongs to.  Tiles are owned by
// whichever participant dequeues them.
struct WorkUnit {
    tile: Tile,
    pass: Arc<CarvePass>,
    sync: Arc<StageSync>,
}

fn execute(unit: WorkUnit) {
    // The all-zero sentinel is skipped without drawing a counter token.
    if unit.tile.is_null() {
        return;
    }
    unit.pass.process_instruction(unit.tile);
    unit.sync.complete_tile();
}

// Write one image and draw its completion token.  Returns true when
// this worker should exit.
fn write_and_track(job: OutputJob, completion: &Receiver<i32>, finished: &Sender<()>) -> bool {
    if let Err(e) = jobs::save_png(&job.path, &job.image) {
        warn!("could not write {}: {}", job.path.display(), e);
    }
    match completion.recv() {
        Ok(LAST_OUTPUT) => {
            let _ = finished.send(());
            true
        }
        Ok(_) => false,
        Err(_) => true,
    }
}

fn worker_loop(
    work: Receiver<WorkUnit>,
    outputs: Receiver<OutputJob>,
    completion: Receiver<i32>,
    finished: Sender<()>,
) {
    loop {
        select! {
            recv(work) -> unit => match unit {
                Ok(unit) => execute(unit),
                Err(_) => break,
            },
            recv(outputs) -> job => match job {
                Ok(job) => {
                    if write_and_track(job, &completion, &finished) {
                        return;
                    }
                }
                Err(_) => return,
            },
        }
    }
    // The work queue is closed, so no stage is coming; whatever images
    // are still queued must be written before leaving.
    for job in outputs.iter() {
        if write_and_track(job, &completion, &finished) {
            return;
        }
    }
}

// The coordinator's half of the pool: it owns the only sender for the
// shared work queue, so dropping it is the pool's shutdown signal.
struct Coordinator {
    workers: u32,
    work_tx: Sender<WorkUnit>,
    work_rx: Receiver<WorkUnit>,
}

impl Coordinator {
    // Run one stage to its barrier.  The coordinator both feeds the
    // shared queue from the staging queue and competes for tiles on it.
    fn run_stage(&self, pass: &Arc<CarvePass>, tiles: Vec<Tile>) {
        let (sync, gate) = StageSync::new(self.workers);
        let (staged_tx, staged_rx) = bounded(self.workers as usize);
        for tile in tiles {
            staged_tx
                .send(WorkUnit {
                    tile,
                    pass: Arc::clone(pass),
                    sync: Arc::clone(&sync),
                })
                .unwrap();
        }
        let work_rx = &self.work_rx;
        loop {
            select! {
                recv(staged_rx) -> unit => {
                    if let Ok(unit) = unit {
                        self.work_tx.send(unit).unwrap();
                    }
                }
                recv(work_rx) -> unit => {
                    if let Ok(unit) = unit {
                        execute(unit);
                    }
                }
                recv(gate) -> _closed => break,
            }
        }
    }

    fn remove_vertical_seam(&self, image: RgbaImage) -> RgbaImage {
        let (w, h) = image.dimensions();
        let pass = Arc::new(CarvePass::vertical(image));
        self.run_stage(
            &pass,
            Tile::new(0, 0, w, h, Instruction::PixelMagnitude).split_columns(self.workers),
        );
        // Each row of the sweep is its own stage: row y may not start
        // until row y-1 is fully relaxed.
        for y in 1..h {
            self.run_stage(
                &pass,
                Tile::new(0, y, w, y + 1, Instruction::MinimizeVerticalSeam)
                    .split_columns(self.workers),
            );
        }
        let (x, y) =
            pass.find_min_seam(Tile::new(0, h - 1, w, h, Instruction::MinimizeVerticalSeam));
        pass.mark_vertical_seam(x, y);
        self.run_stage(
            &pass,
            Tile::new(0, 0, w, h, Instruction::RemoveColumn).split_rows(self.workers),
        );
        pass.carved_image()
    }

    fn remove_horizontal_seam(&self, image: RgbaImage) -> RgbaImage {
        let (w, h) = image.dimensions();
        let pass = Arc::new(CarvePass::horizontal(image));
        self.run_stage(
            &pass,
            Tile::new(0, 0, w, h, Instruction::PixelMagnitude).split_columns(self.workers),
        );
        for x in 1..w {
            self.run_stage(
                &pass,
                Tile::new(x, 0, x + 1, h, Instruction::MinimizeHorizontalSeam)
                    .split_rows(self.workers),
            );
        }
        let (x, y) =
            pass.find_min_seam(Tile::new(w - 1, 0, w, h, Instruction::MinimizeHorizontalSeam));
        pass.mark_horizontal_seam(x, y);
        self.run_stage(
            &pass,
            Tile::new(0, 0, w, h, Instruction::RemoveRow).split_columns(self.workers),
        );
        pass.carved_image()
    }

    fn carve(&self, image: RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
        let mut current = image;
        while current.height() > target_h || current.width() > target_w {
            if current.height() > target_h {
                current = self.remove_horizontal_seam(current);
            }
            if current.width() > target_w {
                current = self.remove_vertical_seam(current);
            }
            debug!("carved to {}x{}", current.width(), current.height());
        }
        current
    }
}

/// Carve a single image on a temporary pool of `threads` participants.
/// The sequential driver and this function produce byte-identical
/// images for every thread count.
pub fn carve_with_pool(
    image: RgbaImage,
    target_w: u32,
    target_h: u32,
    threads: u32,
) -> RgbaImage {
    let threads = threads.max(1);
    let (work_tx, work_rx) = bounded(threads as usize);
    let (outputs_tx, outputs_rx) = bounded::<OutputJob>(threads as usize);
    let (completion_tx, completion_rx) = bounded::<i32>(threads as usize);
    let (finished_tx, finished_rx) = bounded::<()>(1);
    crossbeam::scope(|scope| {
        for _ in 1..threads {
            let work = work_rx.clone();
            let outputs = outputs_rx.clone();
            let completion = completion_rx.clone();
            let finished = finished_tx.clone();
            scope.spawn(move |_| worker_loop(work, outputs, completion, finished));
        }
        let coordinator = Coordinator {
            workers: threads,
            work_tx,
            work_rx,
        };
        let carved = coordinator.carve(image, target_w, target_h);
        drop(coordinator);
        drop(outputs_tx);
        drop(completion_tx);
        drop(finished_tx);
        drop(finished_rx);
        carved
    })
    .unwrap()
}

/// The worker-pool driver with a fixed thread count.
pub struct ConcurrentCarver {
    threads: u32,
}

impl ConcurrentCarver {
    /// A driver running `threads` participants per image.
    pub fn new(threads: u32) -> Self {
        ConcurrentCarver {
            threads: threads.max(1),
        }
    }
}

impl Carver for ConcurrentCarver {
    fn carve(&self, image: RgbaImage, target_w: u32, target_h: u32) -> RgbaImage {
        carve_with_pool(image, target_w, target_h, self.threads)
    }
}

/// Run a whole jobs file on one long-lived pool.  Image decoding stays
/// on the coordinator; carving stages and PNG writes are shared with
/// the workers.  Requires at least two threads — one-thread batches
/// belong to the sequential runner.
pub fn run_batch(jobs_path: &Path, threads: u32) -> Result<(), failure::Error> {
    debug_assert!(threads >= 2);
    let (reader, dir) = jobs::open_jobs_file(jobs_path)?;
    let (work_tx, work_rx) = bounded(threads as usize);
    let (outputs_tx, outputs_rx) = bounded::<OutputJob>(threads as usize);
    let (completion_tx, completion_rx) = bounded::<i32>(threads as usize);
    let (finished_tx, finished_rx) = bounded::<()>(1);
    crossbeam::scope(|scope| {
        for _ in 1..threads {
            let work = work_rx.clone();
            let outputs = outputs_rx.clone();
            let completion = completion_rx.clone();
            let finished = finished_tx.clone();
            scope.spawn(move |_| worker_loop(work, outputs, completion, finished));
        }
        drop(finished_tx);
        let coordinator = Coordinator {
            workers: threads,
            work_tx,
            work_rx,
        };

        // The newest finished image is held back one job: when the
        // batch ends we still need to pair the final image with its -1
        // token, and only hindsight says which image is final.
        let mut held: Option<OutputJob> = None;
        jobs::drive_batch(reader, &dir, |job| {
            let LoadedJob {
                image,
                output,
                target_w,
                target_h,
            } = job;
            let carved = coordinator.carve(image, target_w, target_h);
            if let Some(previous) = held.take() {
                outputs_tx.send(previous).unwrap();
                completion_tx.send(MORE_OUTPUT).unwrap();
            }
            held = Some(OutputJob {
                path: output,
                image: carved,
            });
        });
        if let Some(last) = held.take() {
            outputs_tx.send(last).unwrap();
            completion_tx.send(LAST_OUTPUT).unwrap();
            let _ = finished_rx.recv();
        }
        drop(coordinator);
        drop(outputs_tx);
        drop(completion_tx);
    })
    .unwrap();
    Ok(())
}
