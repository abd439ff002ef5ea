//! CLI entry point for the nightly-fetch tool.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use chrono::Local;
use clap::Parser;
use nightly_fetch_core::{
    ArtifactLink, DirectoryCrawler, DownloadEngine, HttpClient, ProgressAggregator, TransferJob,
    probe_size, resolve_last, resolve_range,
};
use tracing::{debug, error, info, warn};

mod cli;
mod exit;

use cli::Args;
use exit::ProcessExit;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    match run(args).await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(e) => {
            error!(error = %e, "run aborted");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    // Resolve dates up front; a bad date or shorthand aborts the run
    // before any network use.
    let dates = match (&args.start, &args.end, &args.last) {
        (Some(start), Some(end), None) => resolve_range(start, end)?,
        (None, None, Some(span)) => resolve_last(span, Local::now().date_naive())?,
        _ => bail!("exactly one of --start/--end or --last must be given"),
    };
    info!(
        dates = dates.len(),
        first = %dates[0],
        last = %dates[dates.len() - 1],
        "resolved date range"
    );

    let config = args.run_config();
    let client = HttpClient::from_config(&config)?;

    // Ctrl-C sets the shared cancel flag; discovery, probing, and
    // transfers all observe it at their next check point.
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_signal = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_signal.store(true, Ordering::SeqCst);
        }
    });

    let crawler = DirectoryCrawler::new(&client, &config);
    let artifacts = crawler.discover(&dates, &cancel).await;

    if cancel.load(Ordering::SeqCst) {
        warn!("interrupted during discovery");
        return Ok(ProcessExit::Interrupted);
    }
    if artifacts.is_empty() {
        info!("no artifacts discovered, nothing to do");
        return Ok(ProcessExit::Success);
    }

    // Probe sizes ahead of scheduling so skip and resume decisions can
    // compare against the remote length.
    let policy = config.retry_policy();
    let mut plan = Vec::with_capacity(artifacts.len());
    for link in artifacts {
        if cancel.load(Ordering::SeqCst) {
            warn!("interrupted during size probing");
            return Ok(ProcessExit::Interrupted);
        }
        let size = probe_size(&client, &link.url, &policy, &cancel).await;
        plan.push((link, size));
    }

    if config.dry_run {
        report_dry_run(&plan);
        return Ok(ProcessExit::Success);
    }

    let render = io::stderr().is_terminal() && !args.quiet;
    let aggregator = if render {
        ProgressAggregator::with_render()
    } else {
        ProgressAggregator::disabled()
    };

    let jobs = plan
        .iter()
        .map(|(link, size)| {
            let job = TransferJob::plan(link, *size, &config.download_dir);
            let progress = aggregator.register(&link.filename, *size);
            (job, progress)
        })
        .collect();

    let engine = DownloadEngine::new(config.workers, policy)?;
    let stats = engine.run(&client, jobs, Arc::clone(&cancel)).await?;
    aggregator.finish();

    info!(
        completed = stats.completed(),
        skipped = stats.skipped(),
        failed = stats.failed(),
        cancelled = stats.cancelled(),
        bytes = aggregator.bytes_completed(),
        "run finished"
    );
    if stats.was_interrupted() {
        warn!("interrupted; partial files are kept and resumed on the next run");
    }

    Ok(exit::determine_exit_outcome(&stats))
}

/// Lists the planned transfers without opening any write path.
fn report_dry_run(plan: &[(ArtifactLink, Option<u64>)]) {
    let mut known_total: u64 = 0;
    let mut unknown = 0usize;
    for (link, size) in plan {
        match size {
            Some(bytes) => {
                known_total += bytes;
                info!(
                    date = %link.date,
                    build = link.build.trim_matches('/'),
                    file = %link.filename,
                    bytes,
                    "would fetch"
                );
            }
            None => {
                unknown += 1;
                info!(
                    date = %link.date,
                    build = link.build.trim_matches('/'),
                    file = %link.filename,
                    size = "unknown",
                    "would fetch"
                );
            }
        }
    }
    info!(
        artifacts = plan.len(),
        unknown_sizes = unknown,
        known_mib = format!("{:.1}", known_total as f64 / (1024.0 * 1024.0)),
        "dry run complete"
    );
}
