use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

/// Counters shared between the verifier's workers and whoever displays
/// progress. Cheap to clone; all clones see the same values.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    pieces_queued: Arc<AtomicUsize>,
    pieces_done: Arc<AtomicUsize>,
    mismatches: Arc<AtomicUsize>,
    bytes_done: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub pieces_queued: usize,
    pub pieces_done: usize,
    pub mismatches: usize,
    pub bytes_done: u64,
    pub finished: bool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the counters and clear `finished` for a new run.
    pub fn reset(&self) {
        self.pieces_queued.store(0, Ordering::Relaxed);
        self.pieces_done.store(0, Ordering::Relaxed);
        self.mismatches.store(0, Ordering::Relaxed);
        self.bytes_done.store(0, Ordering::Relaxed);
        self.finished.store(false, Ordering::Release);
    }

    pub fn inc_queued(&self) {
        self.pieces_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_done(&self) {
        self.pieces_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mismatch(&self) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_done.fetch_add(n, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pieces_queued: self.pieces_queued.load(Ordering::Relaxed),
            pieces_done: self.pieces_done.load(Ordering::Relaxed),
            mismatches: self.mismatches.load(Ordering::Relaxed),
            bytes_done: self.bytes_done.load(Ordering::Relaxed),
            finished: self.is_finished(),
        }
    }
}

/// Run-wide cancellation flag. Set once, observed by every worker.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
