use crate::error::{Result, VerifyError};
use crate::filter::PathFilter;
use crate::hasher::{hash_piece_counted, HashContext};
use crate::manifest::{Digest, Manifest};
use crate::path_safety::{check_components, PathPolicy};
use crate::progress::{CancelFlag, Progress};
use crate::segment::{PieceTask, Segmenter};
use serde::Serialize;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// What a worker does with a file it cannot open or read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IoErrorPolicy {
    /// Cancel the run and return the error.
    #[default]
    Abort,
    /// Record a `Failed` outcome for the piece and keep going.
    Record,
}

#[derive(Clone, Debug, Default)]
pub struct VerifyConfig {
    /// Glob patterns selecting which pieces are checked; empty checks all.
    pub patterns: Vec<String>,
    /// Worker threads; `None` uses one per logical CPU.
    pub concurrency: Option<usize>,
    pub policy: PathPolicy,
    pub on_io_error: IoErrorPolicy,
    /// Set by the caller to stop the run early (e.g. on Ctrl-C). Never set
    /// by the verifier itself, so a config can be reused across runs.
    pub cancel: CancelFlag,
    /// Reset at the start of every run.
    pub progress: Progress,
}

/// How often the collector looks at the caller's cancel flag while idle.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Match,
    Mismatch { expected: Digest, actual: Digest },
    Failed { cause: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    pub index: u64,
    /// Bytes the piece covers according to the manifest.
    pub length: u64,
    /// Bytes actually read; short of `length` when a file is truncated.
    pub bytes_read: u64,
    /// Offset of the piece in its first file.
    pub offset: u64,
    pub paths: Vec<String>,
    #[serde(flatten)]
    pub status: Status,
}

impl VerificationOutcome {
    fn new(task: &PieceTask, bytes_read: u64, status: Status) -> Self {
        Self {
            index: task.index,
            length: task.len(),
            bytes_read,
            offset: task.offset(),
            paths: task.files().map(|f| f.display_path()).collect(),
            status,
        }
    }

    pub fn is_match(&self) -> bool {
        self.status == Status::Match
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct VerifyReport {
    /// One entry per checked piece, ordered by piece index.
    pub outcomes: Vec<VerificationOutcome>,
    pub pieces_total: usize,
    pub pieces_checked: usize,
    pub pieces_skipped: usize,
    /// Bytes read from disk across all checked pieces.
    pub bytes_checked: u64,
}

impl VerifyReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &VerificationOutcome> + '_ {
        self.outcomes.iter().filter(|o| matches!(o.status, Status::Mismatch { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerificationOutcome> + '_ {
        self.outcomes.iter().filter(|o| matches!(o.status, Status::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(VerificationOutcome::is_match)
    }
}

enum Msg {
    Done(VerificationOutcome),
    Fatal(VerifyError),
}

/// Verify every admitted piece of `manifest` against the files under `target`.
pub fn verify(manifest: &Manifest, target: &Path, cfg: &VerifyConfig) -> Result<VerifyReport> {
    verify_streaming(manifest, target, cfg, |_| {})
}

/// Like [`verify`], also handing each outcome to `sink` as it is collected
/// (completion order). Nothing reaches `sink` once the run is cancelled.
pub fn verify_streaming<F>(
    manifest: &Manifest,
    target: &Path,
    cfg: &VerifyConfig,
    mut sink: F,
) -> Result<VerifyReport>
where
    F: FnMut(&VerificationOutcome),
{
    if !manifest.name.is_empty() {
        check_components(std::slice::from_ref(&manifest.name))?;
    }
    for f in &manifest.files {
        check_components(&f.path)?;
    }
    let filter = PathFilter::new(&cfg.patterns)?;
    let segmenter = Segmenter::new(manifest)?;

    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("pcheck-worker-{i}"));
    if let Some(n) = cfg.concurrency {
        builder = builder.num_threads(n.max(1));
    }
    let pool = builder.build()?;

    let ctx = Arc::new(HashContext {
        root: manifest.data_root(target),
        algo: manifest.hash,
        piece_length: manifest.piece_length,
        policy: cfg.policy,
        cancel: CancelFlag::new(),
        progress: cfg.progress.clone(),
    });
    ctx.progress.reset();
    tracing::debug!(
        pieces = manifest.piece_count(),
        threads = pool.current_num_threads(),
        root = %ctx.root.display(),
        "starting verification"
    );

    let mut report = VerifyReport::default();
    let mut first_error: Option<VerifyError> = None;
    let forward_cancel = || {
        if cfg.cancel.is_cancelled() && !ctx.cancel.is_cancelled() {
            tracing::debug!("cancelled by caller");
            ctx.cancel.cancel();
        }
    };
    let mut collect = |msg: Msg, report: &mut VerifyReport| match msg {
        Msg::Done(outcome) => {
            if first_error.is_none() && !ctx.cancel.is_cancelled() {
                sink(&outcome);
                report.outcomes.push(outcome);
            }
        }
        Msg::Fatal(VerifyError::Cancelled) => {}
        Msg::Fatal(e) => {
            if first_error.is_none() {
                tracing::debug!(error = %e, "cancelling pending work");
                ctx.cancel.cancel();
                first_error = Some(e);
            }
        }
    };

    let (tx, rx) = mpsc::channel::<Msg>();
    for task in segmenter {
        forward_cancel();
        if ctx.cancel.is_cancelled() {
            break;
        }
        report.pieces_total += 1;
        if !filter.admits(&task) {
            report.pieces_skipped += 1;
            continue;
        }
        ctx.progress.inc_queued();
        let tx = tx.clone();
        let job_ctx = Arc::clone(&ctx);
        let on_io_error = cfg.on_io_error;
        pool.spawn(move || {
            let _ = tx.send(check_piece(task, &job_ctx, on_io_error));
        });
        while let Ok(msg) = rx.try_recv() {
            collect(msg, &mut report);
        }
    }
    drop(tx);
    // Every job holds a sender; the channel closes once the last one has run.
    loop {
        forward_cancel();
        match rx.recv_timeout(CANCEL_POLL) {
            Ok(msg) => collect(msg, &mut report),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    drop(collect);
    ctx.progress.finish();

    if let Some(e) = first_error {
        return Err(e);
    }
    if ctx.cancel.is_cancelled() {
        return Err(VerifyError::Cancelled);
    }
    report.outcomes.sort_by_key(|o| o.index);
    report.pieces_checked = report.outcomes.len();
    report.bytes_checked = report.outcomes.iter().map(|o| o.bytes_read).sum();
    Ok(report)
}

fn check_piece(task: PieceTask, ctx: &HashContext, on_io_error: IoErrorPolicy) -> Msg {
    if ctx.cancel.is_cancelled() {
        return Msg::Fatal(VerifyError::Cancelled);
    }
    let (result, bytes_read) = match hash_piece_counted(&task, ctx) {
        Ok((actual, n)) => (Ok(actual), n),
        Err(e) => (Err(e), 0),
    };
    let status = match result {
        Ok(actual) if actual == task.expected_digest => Status::Match,
        Ok(actual) => {
            ctx.progress.inc_mismatch();
            Status::Mismatch { expected: task.expected_digest.clone(), actual }
        }
        Err(e @ (VerifyError::Io { .. } | VerifyError::UnsafePath { .. }))
            if on_io_error == IoErrorPolicy::Record =>
        {
            Status::Failed { cause: format!("{:#}", anyhow::Error::new(e)) }
        }
        Err(e) => return Msg::Fatal(e),
    };
    ctx.progress.inc_done();
    Msg::Done(VerificationOutcome::new(&task, bytes_read, status))
}
