//! Instrumentation overhead calibration
//!
//! The profiler's own bookkeeping is cheap per call but adds up at high
//! call volume, and for very short functions it can dominate the
//! measurement. At startup the calibrator times the four primitive
//! operations the hooks perform; every hook then charges these constants
//! to the frame it touches, and aggregation subtracts the accumulated
//! charge from each reported duration.
//!
//! Calibration runs hot loops; host load at startup skews the constants,
//! which is why they are means over a large iteration count.

use std::hint::black_box;
use std::time::{Duration, Instant};

/// Iterations each primitive is measured over.
const CALIBRATION_ROUNDS: u32 = 100_000;

/// Mean per-operation cost of the profiler's own bookkeeping.
///
/// All four costs are zero when calibration is disabled; reported timings
/// then include instrumentation overhead.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    /// Cost of one empty, non-inlinable function call.
    pub empty_call: Duration,
    /// Cost of one call deferred to scope exit (guard teardown).
    pub deferred_call: Duration,
    /// Cost of one monotonic clock read.
    pub clock_read: Duration,
    /// Cost of one elapsed-time computation.
    pub elapsed_read: Duration,
}

impl Calibration {
    /// Measure all four primitive costs on the current host.
    ///
    /// Takes a few milliseconds; run it once at engine construction, not
    /// on any hot path.
    pub fn measure() -> Self {
        Self::measure_rounds(CALIBRATION_ROUNDS)
    }

    /// Measure with an explicit iteration count. Exposed for tests and
    /// benchmarks that want a faster, rougher calibration.
    pub fn measure_rounds(rounds: u32) -> Self {
        let rounds = rounds.max(1);

        let started = Instant::now();
        for _ in 0..rounds {
            probe_call();
        }
        let empty_call = started.elapsed() / rounds;

        let started = Instant::now();
        for _ in 0..rounds {
            let _probe = DeferredProbe;
        }
        let deferred_call = started.elapsed() / rounds;

        let started = Instant::now();
        for _ in 0..rounds {
            black_box(Instant::now());
        }
        let clock_read = started.elapsed() / rounds;

        let reference = Instant::now();
        let started = Instant::now();
        for _ in 0..rounds {
            black_box(reference.elapsed());
        }
        let elapsed_read = started.elapsed() / rounds;

        Self {
            empty_call,
            deferred_call,
            clock_read,
            elapsed_read,
        }
    }

    /// Zero-cost constants: timings are reported overhead-inclusive.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Bookkeeping charged to a frame when its scope is opened: the hook
    /// call itself plus the entry clock read.
    pub fn entry_cost(&self) -> Duration {
        self.empty_call + self.clock_read
    }

    /// Bookkeeping charged to a frame when its scope is closed: the
    /// deferred hook call, the exit clock read and the elapsed
    /// computation.
    pub fn exit_cost(&self) -> Duration {
        self.deferred_call + self.clock_read + self.elapsed_read
    }
}

/// The empty call every hook cost is measured against. `inline(never)`
/// keeps the optimizer from erasing the call edge itself.
#[inline(never)]
fn probe_call() {
    black_box(());
}

/// Measures the teardown cost of a guard object, the shape scope-exit
/// hooks take at instrumented call sites.
struct DeferredProbe;

impl Drop for DeferredProbe {
    fn drop(&mut self) {
        probe_call();
    }
}
