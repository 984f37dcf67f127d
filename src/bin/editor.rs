// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, Arg};
use log::error;
use std::path::Path;
use std::process;

fn main() {
    env_logger::init();
    let matches = App::new("editor")
        .version("0.1.0")
        .about("Content-aware PNG reduction driven by a batch jobs file")
        .arg(
            Arg::with_name("jobs")
                .help("Jobs file: one `input, output, x scale, y scale` per line")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("parallel")
                .short("p")
                .takes_value(true)
                .min_values(0)
                .help("Carve on a worker pool; bare -p uses every core, -p=N uses N threads"),
        )
        .get_matches();

    let threads = if matches.is_present("parallel") {
        match matches.value_of("parallel") {
            Some(count) => match count.parse::<u32>() {
                Ok(count) => count,
                Err(_) => {
                    eprintln!("editor: -p wants a thread count, not {:?}", count);
                    process::exit(1);
                }
            },
            None => num_cpus::get() as u32,
        }
    } else {
        1
    };

    let jobs_path = Path::new(matches.value_of("jobs").unwrap());
    if let Err(e) = pngseam::jobs::run(jobs_path, threads) {
        error!("{}", e);
        process::exit(1);
    }
}
