use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use pcheck_core::path_safety::PathPolicy;
use pcheck_core::verify::{IoErrorPolicy, Status};
use pcheck_core::{verify_streaming, Manifest, VerificationOutcome, VerifyConfig, VerifyReport};

mod logging;
mod reporter;

#[derive(Parser, Debug)]
#[command(name = "pcheck", version, about = "Check downloaded data against its piece digests")]
struct Cli {
    /// `.torrent` metainfo, or a `.json` manifest
    manifest: PathBuf,
    /// Only check pieces touching files that match these globs (default: all)
    globs: Vec<String>,
    /// Data directory; the manifest name resolves under it
    #[arg(long, default_value = ".")]
    datadir: PathBuf,
    /// Worker threads (default: number of CPUs)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1024))]
    checkers: Option<u32>,
    /// Tracing filter; RUST_LOG overrides
    #[arg(long, default_value = "info")]
    loglevel: String,
    /// Record unreadable files as failed pieces instead of aborting
    #[arg(long, default_value_t = false)]
    keep_going: bool,
    /// Follow symlinks that stay inside the data root
    #[arg(long, default_value_t = false)]
    follow_symlinks: bool,
    /// Print the report as JSON on stdout
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Periodic progress lines on stderr
    #[arg(long, default_value_t = false)]
    progress: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    manifest: String,
    name: &'a str,
    piece_length: u64,
    checked_utc: String,
    ok: bool,
    #[serde(flatten)]
    report: &'a VerifyReport,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.loglevel);
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every checked piece matched.
fn run(cli: &Cli) -> Result<bool> {
    let manifest = Manifest::load(&cli.manifest)?;
    tracing::info!(
        name = %manifest.name,
        pieces = manifest.piece_count(),
        files = manifest.files.len(),
        bytes = manifest.total_length(),
        "loaded {}",
        cli.manifest.display()
    );

    let cfg = VerifyConfig {
        patterns: cli.globs.clone(),
        concurrency: cli.checkers.map(|n| n as usize),
        policy: PathPolicy { follow_symlinks: cli.follow_symlinks },
        on_io_error: if cli.keep_going { IoErrorPolicy::Record } else { IoErrorPolicy::Abort },
        ..Default::default()
    };

    let cancel = cfg.cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted, cancelling outstanding pieces");
        cancel.cancel();
    })
    .context("install Ctrl-C handler")?;

    let reporter = cli.progress.then(|| reporter::spawn(cfg.progress.clone(), manifest.piece_count()));
    let result = verify_streaming(&manifest, &cli.datadir, &cfg, |o| log_outcome(&manifest, o));
    if let Some(handle) = reporter {
        // early validation errors return before the run marks itself finished
        cfg.progress.finish();
        let _ = handle.join();
    }
    let report = result.with_context(|| format!("verify {}", cli.datadir.display()))?;

    let ok = report.is_clean();
    if cli.json {
        let out = JsonReport {
            manifest: cli.manifest.display().to_string(),
            name: &manifest.name,
            piece_length: manifest.piece_length,
            checked_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ok,
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", summary(&report));
    }
    Ok(ok)
}

fn log_outcome(manifest: &Manifest, o: &VerificationOutcome) {
    match &o.status {
        Status::Match => tracing::trace!(piece = o.index, "ok"),
        Status::Mismatch { expected, actual } => tracing::warn!(
            piece = o.index,
            piece_length = manifest.piece_length,
            offset = o.offset,
            paths = ?o.paths,
            expected = %expected,
            actual = %actual,
            "piece mismatch"
        ),
        Status::Failed { cause } => tracing::warn!(
            piece = o.index,
            paths = ?o.paths,
            "piece unreadable: {}",
            cause
        ),
    }
}

fn summary(report: &VerifyReport) -> String {
    if report.is_clean() {
        format!(
            "OK: {} pieces checked, {} skipped, {} bytes",
            report.pieces_checked, report.pieces_skipped, report.bytes_checked
        )
    } else {
        format!(
            "BAD: {} mismatched, {} unreadable of {} pieces checked ({} skipped)",
            report.mismatches().count(),
            report.failures().count(),
            report.pieces_checked,
            report.pieces_skipped
        )
    }
}
