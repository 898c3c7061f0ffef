use pcheck_core::progress::Progress;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const INTERVAL: Duration = Duration::from_secs(2);
const TICK: Duration = Duration::from_millis(100);

/// Log a progress line every [`INTERVAL`] until the run marks `progress` finished.
pub fn spawn(progress: Progress, pieces_total: usize) -> JoinHandle<()> {
    thread::spawn(move || {
        let t0 = Instant::now();
        let mut last = t0;
        while !progress.is_finished() {
            thread::sleep(TICK);
            if last.elapsed() < INTERVAL {
                continue;
            }
            last = Instant::now();
            let s = progress.snapshot();
            let mib = s.bytes_done as f64 / (1024.0 * 1024.0);
            let rate = mib / t0.elapsed().as_secs_f64().max(0.001);
            tracing::info!(
                "[{:>4}s] pieces {}/{} (of {}) | {:.1} MiB at {:.1} MiB/s | {} bad",
                t0.elapsed().as_secs(),
                s.pieces_done,
                s.pieces_queued,
                pieces_total,
                mib,
                rate,
                s.mismatches
            );
        }
    })
}
