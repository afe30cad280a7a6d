mod logging;

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::Context;
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};

use mediamover_core::dedup::HashStrategy;
use mediamover_core::{Event, ProcessOptions, ProcessResult, Stage};

#[derive(Debug, Parser)]
#[command(
    name = "mediamover",
    version,
    about = "Move photos and videos into image/<model>/<date> and video/<date> folders, skipping duplicates"
)]
struct Cli {
    /// Directory to collect media from
    source: PathBuf,

    /// Directory to move media into (created if missing)
    destination: PathBuf,

    /// Collect threads; 1 processes files one by one in walk order [default: 1]
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Hash only the first BYTES of each file (faster, may merge files sharing a header)
    #[arg(long, value_name = "BYTES")]
    hash_prefix: Option<u64>,

    /// Print a progress line every N files while collecting [default: 1000]
    #[arg(long, value_name = "N")]
    progress_every: Option<u64>,

    /// Classify by file extension when the content matches no known signature
    #[arg(long)]
    extension_fallback: bool,

    /// Leave empty source directories in place
    #[arg(long)]
    keep_empty_dirs: bool,

    /// JSON file with default options; flags given here take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the final result as JSON instead of the console summary
    #[arg(long)]
    json: bool,

    /// Write diagnostics to FILE instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// More diagnostics (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Options from the config file (if any) with the command line on top.
    fn options(&self) -> anyhow::Result<ProcessOptions> {
        let mut options = match &self.config {
            Some(path) => ProcessOptions::from_json_file(path)?,
            None => ProcessOptions::new(PathBuf::new(), PathBuf::new()),
        };
        options.source = self.source.clone();
        options.destination = self.destination.clone();
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if let Some(bytes) = self.hash_prefix {
            options.hash = HashStrategy::Prefix { bytes };
        }
        if let Some(every) = self.progress_every {
            options.progress_interval = every;
        }
        options.extension_fallback |= self.extension_fallback;
        options.keep_empty_dirs |= self.keep_empty_dirs;
        Ok(options)
    }
}

/// Renders pipeline events as operator lines on stdout.
struct Console {
    muted: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl Console {
    fn new(muted: bool) -> Self {
        Self {
            muted,
            bar: Mutex::new(None),
        }
    }

    fn handle(&self, event: Event<'_>) {
        if self.muted {
            return;
        }
        match event {
            Event::StageStarted { stage, total } => {
                println!("start -> {}", stage.label());
                if let (Stage::Relocate, Some(len)) = (stage, total) {
                    *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(relocate_bar(len));
                }
            }
            Event::StageFinished { stage, elapsed } => {
                if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    bar.finish_and_clear();
                }
                println!("end -> {}, elapsed time {}(ms)", stage.label(), elapsed.as_millis());
            }
            Event::Progress {
                stage: Stage::Relocate,
                current,
                ..
            } => {
                if let Some(bar) = self.bar.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
                    bar.set_position(current);
                }
            }
            Event::Progress { current, .. } => println!(">>> processing count {}", current),
            Event::Report(report) => {
                println!("total media count is {}", report.files);
                println!("total media size is {:.2} MB", report.megabytes());
            }
            Event::DirectoryRemoved(path) => println!(">>> delete empty folder {}", path.display()),
        }
    }
}

fn relocate_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_message("moving");
    bar
}

fn print_summary(result: &ProcessResult) {
    println!(
        "moved {}, deleted as redundant {}, failed {}",
        result.relocate.relocated, result.relocate.redundant_deleted, result.relocate.failed
    );
    println!(
        "duplicates skipped {}, unreadable {}, empty folders removed {}",
        result.collect.duplicates_rejected,
        result.collect.extraction_failed + result.walk.unreadable,
        result.cleanup.removed
    );
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())
        .context("cannot open log file")?;

    let options = cli.options()?;
    log::debug!("{:?}", options);

    let console = Console::new(cli.json);
    let result = mediamover_core::process(&options, &|event| console.handle(event))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
        println!("complete");
    }
    Ok(())
}
