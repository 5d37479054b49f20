//! Progress UI (spinner) for sync runs, fed by engine progress events.

use std::time::Duration;

use dumpany_core::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Running counts shown on the spinner.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ProgressTally {
    pub fetched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: u64,
    pub last: Option<String>,
}

impl ProgressTally {
    pub(crate) fn apply(&mut self, event: ProgressEvent) {
        let name = match event {
            ProgressEvent::Skipped { name } => {
                self.skipped += 1;
                name
            }
            ProgressEvent::Fetched { name, bytes } => {
                self.fetched += 1;
                self.bytes += bytes;
                name
            }
            ProgressEvent::Failed { name, .. } => {
                self.failed += 1;
                name
            }
        };
        self.last = Some(name);
    }

    pub(crate) fn message(&self) -> String {
        let counts = format!(
            "[{} fetched, {} skipped, {} failed]",
            self.fetched, self.skipped, self.failed
        );
        match &self.last {
            Some(name) => format!("{counts} {name}"),
            None => counts,
        }
    }
}

/// Spawns the progress UI (spinner) when requested.
///
/// Returns the task handle and the sender to hand to the engine. The task
/// ends once every sender is dropped. When `use_spinner` is false nothing is
/// spawned and no sender is returned.
pub(crate) fn spawn_progress_ui(
    use_spinner: bool,
) -> (
    Option<tokio::task::JoinHandle<ProgressTally>>,
    Option<UnboundedSender<ProgressEvent>>,
) {
    if !use_spinner {
        return (None, None);
    }
    let (sender, receiver) = mpsc::unbounded_channel();
    (Some(spawn_spinner_inner(receiver)), Some(sender))
}

fn spawn_spinner_inner(
    mut receiver: UnboundedReceiver<ProgressEvent>,
) -> tokio::task::JoinHandle<ProgressTally> {
    tokio::spawn(async move {
        let mut tally = ProgressTally::default();

        // The spinner appears with the first event, so it never draws over
        // the confirmation prompt.
        let Some(first) = receiver.recv().await else {
            return tally;
        };

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));

        tally.apply(first);
        spinner.set_message(tally.message());
        while let Some(event) = receiver.recv().await {
            tally.apply(event);
            spinner.set_message(tally.message());
        }

        spinner.finish_and_clear();
        tally
    })
}
