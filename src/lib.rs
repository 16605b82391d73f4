//! dupelink - duplicate file finder and hardlink deduplicator
//!
//! Finds files with identical content under one or more folders and, on
//! request, replaces every copy with a hardlink to a single origin. Candidate
//! sets are narrowed by size, then a partial BLAKE3 digest, then a full one;
//! each stage groups its candidates through an external sort so memory stays
//! flat regardless of how many files are scanned.

pub mod actions;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::CommandFactory;

use crate::actions::{BatchLinkResult, Linker};
use crate::cli::{Cli, OutputFormat};
use crate::config::Settings;
use crate::duplicates::{DuplicateFinder, MatchGroup};
use crate::error::ExitCode;
use crate::output::{link_summary, scan_summary, JsonOutput, TextReport};
use crate::progress::{Progress, ProgressCallback};
use crate::signal::Interrupted;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error if configuration is invalid, a root cannot be scanned,
/// the run is interrupted, or the report cannot be written. Problems with
/// individual files are logged and never fail the run.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    if cli.folders.is_empty() {
        Cli::command()
            .print_help()
            .context("failed to print usage")?;
        println!();
        return Ok(ExitCode::Success);
    }

    let settings = Settings::load(&cli).context("failed to load configuration")?;
    let cancel = signal::install_handler().context("failed to install signal handler")?;

    let progress: Option<Arc<Progress>> =
        (!cli.quiet && io::stderr().is_terminal()).then(|| Arc::new(Progress::new(false)));

    let mut finder_config = settings
        .finder_config(cli.fix)
        .context("invalid configuration")?
        .with_cancel_token(cancel.clone());
    if let Some(ref progress) = progress {
        finder_config = finder_config.with_progress_callback(progress.clone());
    }
    log::debug!("Finder configuration: {:?}", finder_config);
    let finder = DuplicateFinder::new(finder_config);

    let linker = cli.fix.then(|| {
        let linker = Linker::new(cancel.clone());
        match progress {
            Some(ref progress) => linker.with_progress_callback(progress.clone()),
            None => linker,
        }
    });

    let format = settings.output;
    let stdout = io::stdout();
    let mut report = (format == OutputFormat::Text).then(|| TextReport::new(stdout.lock()));
    let mut collected: Vec<MatchGroup> = Vec::new();
    let mut link_result = match format {
        OutputFormat::Json => BatchLinkResult::default(),
        OutputFormat::Text => BatchLinkResult::counts_only(),
    };
    let mut linking_started = false;
    let mut write_error: Option<io::Error> = None;

    let scan = finder.for_each_duplicate(&cli.folders, |group| {
        if let Some(ref mut report) = report {
            if let Err(e) = report.write_group(&group) {
                write_error = Some(e);
                return Err(Interrupted);
            }
        }
        if let Some(ref linker) = linker {
            if !linking_started {
                linking_started = true;
                if let Some(ref progress) = progress {
                    progress.on_phase_start("linking", 0);
                }
            }
            linker.link_group(&group, &mut link_result)?;
        }
        if format == OutputFormat::Json {
            collected.push(group);
        }
        Ok(())
    });

    if linking_started {
        if let Some(ref progress) = progress {
            progress.on_phase_end("linking");
        }
    }
    if let Some(e) = write_error {
        return Err(e).context("failed to write report");
    }
    let stats = scan.context("scan failed")?;

    match report {
        Some(mut report) => {
            report.write_total().context("failed to write report")?;
            let mut out = report.into_inner();
            if !cli.quiet {
                writeln!(out, "{}", scan_summary(&stats)).context("failed to write report")?;
            }
            if cli.fix {
                writeln!(out, "{}", link_summary(&link_result))
                    .context("failed to write report")?;
            }
        }
        None => {
            let mut output = JsonOutput::new(&collected, &stats, ExitCode::Success);
            if cli.fix {
                output = output.with_link_result(&link_result);
            }
            output
                .write_to(&mut io::stdout().lock())
                .context("failed to write JSON report")?;
        }
    }

    if cli.fix {
        log::info!("{}", link_result.summary());
    }
    Ok(ExitCode::Success)
}
