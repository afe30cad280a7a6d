use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::report::Report;

/// The phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collect,
    Relocate,
    Cleanup,
}

impl Stage {
    /// Operator-facing name.
    pub fn label(self) -> &'static str {
        match self {
            Stage::Collect => "1. collect file info",
            Stage::Relocate => "2. move files",
            Stage::Cleanup => "3. remove empty folders",
        }
    }
}

/// Something the front end may want to show.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    StageStarted { stage: Stage, total: Option<u64> },
    StageFinished { stage: Stage, elapsed: Duration },
    /// `current` items done; `total` is unknown while walking
    Progress { stage: Stage, current: u64, total: Option<u64> },
    Report(&'a Report),
    DirectoryRemoved(&'a Path),
}

/// Type alias for the event sink. The sink may borrow from its caller.
pub type EventCallback<'a> = dyn Fn(Event<'_>) + Send + Sync + 'a;

/// Sink that drops every event.
pub fn silent(_: Event<'_>) {}

/// Run `f` as `stage`, announcing its start and its elapsed time.
pub fn timed<T>(stage: Stage, total: Option<u64>, events: &EventCallback<'_>, f: impl FnOnce() -> T) -> T {
    events(Event::StageStarted { stage, total });
    let start = Instant::now();
    let out = f();
    events(Event::StageFinished {
        stage,
        elapsed: start.elapsed(),
    });
    out
}
