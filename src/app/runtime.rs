use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dumpany_core::download::constants::{DEFAULT_QUOTA_REQUESTS, DEFAULT_QUOTA_WINDOW};
use dumpany_core::{
    Config, DownloadEngine, HttpClient, RateGovernor, RegistryClient, RetryPolicy, RunCoordinator,
};
use tracing::{debug, info, warn};

use crate::app::input_processor::StartConfirmed;
use crate::app::{exit_handler, input_processor, progress_manager, terminal};
use crate::cli::Args;
use crate::{ProcessExit, output};

pub(crate) async fn run_dumpany() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let default_level = terminal::resolve_default_log_level(args.quiet, args.verbose);
    terminal::init_tracing(default_level, terminal::is_no_color_requested(&args));

    debug!(?args, "CLI arguments parsed");

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(output_dir) = &args.output_dir {
        config.dump_dir.clone_from(output_dir);
    }

    input_processor::ensure_can_confirm(args.yes, io::stdin().is_terminal())?;
    let ids = input_processor::collect_company_ids(&args)?;
    info!(companies = ids.len(), dump_dir = %config.dump_dir.display(), "dumpany starting");

    let interrupted = Arc::new(AtomicBool::new(false));

    let governor = Arc::new(
        RateGovernor::new(DEFAULT_QUOTA_REQUESTS, DEFAULT_QUOTA_WINDOW)
            .with_min_interval(Duration::from_millis(args.min_interval)),
    );
    let client = Arc::new(RegistryClient::new(
        HttpClient::new(config.api_key.clone())?,
        governor,
        RetryPolicy::with_max_attempts(args.max_attempts()),
        config.endpoints.clone(),
    ));

    let use_spinner = terminal::should_use_spinner(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let (progress_handle, progress_sender) = progress_manager::spawn_progress_ui(use_spinner);

    let mut engine = DownloadEngine::new(client, &config.dump_dir, usize::from(args.concurrency))?
        .with_page_size(args.page_size);
    if let Some(sender) = progress_sender {
        engine = engine.with_progress(sender);
    }
    let coordinator = RunCoordinator::new(engine, Arc::clone(&interrupted));

    let entities = coordinator.resolve_entities(&ids).await;
    output::print_entity_list(&entities);

    let Some(confirmed) = input_processor::confirm_start(args.yes)? else {
        info!("Nothing downloaded.");
        return Ok(ProcessExit::Success);
    };
    watch_for_interrupt(&interrupted, confirmed);

    let summary = coordinator.run(entities).await;

    // Dropping the engine closes the progress channel so the spinner can finish
    drop(coordinator);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    output::print_run_summary(&summary);

    if summary.cancelled || interrupted.load(Ordering::SeqCst) {
        warn!(
            fetched = summary.total_fetched(),
            skipped = summary.total_skipped(),
            "Interrupted. Run again to resume."
        );
        return Ok(ProcessExit::Failure);
    }

    Ok(exit_handler::exit_outcome_for(&summary))
}

/// Turns Ctrl-C into a cooperative stop. Installed only once the run is
/// confirmed, so Ctrl-C at the prompt still ends the process.
fn watch_for_interrupt(interrupted: &Arc<AtomicBool>, _confirmed: StartConfirmed) {
    let interrupted_signal = Arc::clone(interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });
}
