//! Diagnostics setup for the `mediamover` binary.
//!
//! The level comes from `RUST_LOG` when set, otherwise from the `-q`/`-v`
//! flags. Diagnostics go to stderr, or to a file with `--log-file`, so they
//! never interleave with the operator lines on stdout.

use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Install the global logger. Call once, before the first log line.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> io::Result<()> {
    let mut builder = Builder::new();

    let from_env = env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }

    match log_file {
        Some(path) => {
            let file = File::create(path)?;
            builder.target(Target::Pipe(Box::new(file)));
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} {:<5} [{}] {}",
                    buf.timestamp_seconds(),
                    record.level(),
                    record.target(),
                    record.args()
                )
            });
        }
        None => {
            builder.target(Target::Stderr);
            builder.format(|buf, record| {
                let style = buf.default_level_style(record.level());
                writeln!(buf, "{style}{:<5}{style:#} {}", record.level(), record.args())
            });
        }
    }

    builder.init();
    if !from_env {
        log::debug!("log level {:?}", level_for(verbose, quiet));
    }
    Ok(())
}

fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
