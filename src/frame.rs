//! Call frames and the frame free-list
//!
//! A `CallFrame` records one invocation of an instrumented function: entry
//! and exit ticks, the instrumentation overhead accumulated inside the
//! frame, and the frames of calls made from its scope. Frames are acquired
//! from and recycled through a `FramePool` so steady-state instrumentation
//! does not allocate.
//!
//! # Design
//!
//! - Pre-allocated free list of frames, refilled on release
//! - Graceful exhaustion: an empty pool falls back to fresh allocation
//! - Recycled frames are fully reset before reuse
//! - Hit-rate statistics for tuning the pool capacity

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default number of frames kept ready for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Configuration for the frame pool.
#[derive(Debug, Clone)]
pub struct FramePoolConfig {
    /// Number of frames pre-allocated and kept for reuse.
    pub capacity: usize,
    /// Whether pooling is enabled. Disabled, every acquire allocates.
    pub enabled: bool,
}

impl Default for FramePoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            enabled: true,
        }
    }
}

impl FramePoolConfig {
    /// Pool configuration with a specific capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            enabled: true,
        }
    }

    /// Disable pooling (useful for allocation-sensitivity comparisons).
    pub fn disabled() -> Self {
        Self {
            capacity: 0,
            enabled: false,
        }
    }
}

/// One recorded invocation of an instrumented function.
///
/// Entry and exit ticks are monotonic; `overhead` holds the calibrated
/// bookkeeping cost accumulated inside this frame's scope, including the
/// overhead folded up from completed children.
#[derive(Debug)]
pub struct CallFrame {
    name: String,
    entered_at: Instant,
    exited_at: Instant,
    overhead: Duration,
    children: Vec<CallFrame>,
}

impl CallFrame {
    fn empty() -> Self {
        let tick = Instant::now();
        Self {
            name: String::new(),
            entered_at: tick,
            exited_at: tick,
            overhead: Duration::ZERO,
            children: Vec::new(),
        }
    }

    /// Reinitialize a recycled frame for a new invocation. The child list
    /// is already empty at this point; see `FramePool::release`.
    fn reset(&mut self, name: &str) {
        self.name.clear();
        self.name.push_str(name);
        let tick = Instant::now();
        self.entered_at = tick;
        self.exited_at = tick;
        self.overhead = Duration::ZERO;
    }

    /// Function name this frame was recorded under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Monotonic tick at which the scope was entered.
    pub fn entered_at(&self) -> Instant {
        self.entered_at
    }

    /// Monotonic tick at which the scope was exited.
    pub fn exited_at(&self) -> Instant {
        self.exited_at
    }

    /// Completed frames of calls made from this scope, in call order.
    pub fn children(&self) -> &[CallFrame] {
        &self.children
    }

    /// Accumulated instrumentation overhead charged to this frame.
    pub fn overhead(&self) -> Duration {
        self.overhead
    }

    /// Raw wall time between entry and exit.
    pub fn elapsed(&self) -> Duration {
        self.exited_at.saturating_duration_since(self.entered_at)
    }

    /// Wall time with the accumulated instrumentation overhead removed.
    /// This is the duration aggregation reports.
    pub fn reported_time(&self) -> Duration {
        self.elapsed().saturating_sub(self.overhead)
    }

    /// Record the entry tick. Also resets the exit tick so a frame never
    /// exposes an exit older than its entry.
    pub fn stamp_entry(&mut self, tick: Instant) {
        self.entered_at = tick;
        self.exited_at = tick;
    }

    /// Record the exit tick.
    pub fn stamp_exit(&mut self, tick: Instant) {
        self.exited_at = tick;
    }

    /// Charge instrumentation bookkeeping cost to this frame.
    pub fn add_overhead(&mut self, cost: Duration) {
        self.overhead += cost;
    }

    /// Attach a completed child frame.
    pub fn push_child(&mut self, child: CallFrame) {
        self.children.push(child);
    }
}

/// Free list of reusable call frames.
///
/// Frames released back to the pool have their child lists cleared, so a
/// recycled frame can never leak calls from an earlier profile.
#[derive(Debug)]
pub struct FramePool {
    frames: Vec<CallFrame>,
    config: FramePoolConfig,
    /// Total frames ever allocated (pre-allocation included).
    allocated: AtomicUsize,
    /// Total acquire calls served.
    acquired: AtomicUsize,
}

impl FramePool {
    pub fn new(config: FramePoolConfig) -> Self {
        let prealloc = if config.enabled { config.capacity } else { 0 };
        let mut frames = Vec::with_capacity(prealloc);
        for _ in 0..prealloc {
            frames.push(CallFrame::empty());
        }
        Self {
            frames,
            config,
            allocated: AtomicUsize::new(prealloc),
            acquired: AtomicUsize::new(0),
        }
    }

    /// Take a frame initialized for `name`, recycling one when available.
    pub fn acquire(&mut self, name: &str) -> CallFrame {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        match self.frames.pop() {
            Some(mut frame) => {
                frame.reset(name);
                frame
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                let mut frame = CallFrame::empty();
                frame.reset(name);
                frame
            }
        }
    }

    /// Return a single frame to the pool. Any children still attached are
    /// dropped, not recycled; use `release_tree` to recycle a whole tree.
    pub fn release(&mut self, mut frame: CallFrame) {
        if !self.config.enabled {
            return;
        }
        frame.children.clear();
        if self.frames.len() < self.config.capacity {
            self.frames.push(frame);
        }
        // Beyond capacity the frame is dropped; the pool never grows.
    }

    /// Recycle a frame and every descendant attached to it.
    pub fn release_tree(&mut self, root: CallFrame) {
        let mut pending = vec![root];
        while let Some(mut frame) = pending.pop() {
            pending.append(&mut frame.children);
            self.release(frame);
        }
    }

    /// Frames currently available for reuse.
    pub fn available(&self) -> usize {
        self.frames.len()
    }

    /// Configured pool capacity.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Whether pooling is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Snapshot of pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.config.capacity,
            available: self.frames.len(),
            allocated: self.allocated.load(Ordering::Relaxed),
            acquired: self.acquired.load(Ordering::Relaxed),
            enabled: self.config.enabled,
        }
    }
}

/// Pool statistics for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    /// Total frames ever allocated, pre-allocation included.
    pub allocated: usize,
    /// Total acquire calls served.
    pub acquired: usize,
    pub enabled: bool,
}

impl PoolStats {
    /// Percentage of acquires served without a fresh allocation.
    pub fn hit_rate(&self) -> f64 {
        if self.acquired == 0 {
            return 0.0;
        }
        let misses = self.allocated.saturating_sub(self.capacity);
        let hits = self.acquired.saturating_sub(misses);
        (hits as f64 / self.acquired as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_preallocates_to_capacity() {
        let pool = FramePool::new(FramePoolConfig::new(16));
        assert_eq!(pool.available(), 16);
        assert_eq!(pool.capacity(), 16);
        assert!(pool.is_enabled());
    }

    #[test]
    fn test_acquire_reuses_released_frames() {
        let mut pool = FramePool::new(FramePoolConfig::new(4));
        let frame = pool.acquire("first");
        assert_eq!(pool.available(), 3);

        pool.release(frame);
        assert_eq!(pool.available(), 4);

        let stats = pool.stats();
        assert_eq!(stats.allocated, 4);
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.hit_rate(), 100.0);
    }

    #[test]
    fn test_exhausted_pool_allocates_fresh_frames() {
        let mut pool = FramePool::new(FramePoolConfig::new(2));
        let a = pool.acquire("a");
        let b = pool.acquire("b");
        let c = pool.acquire("c");
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.stats().allocated, 3);

        // Releases beyond capacity drop the extra frame.
        pool.release(a);
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_recycled_frame_is_fully_reset() {
        let mut pool = FramePool::new(FramePoolConfig::new(1));
        let mut frame = pool.acquire("stale_name");
        frame.add_overhead(Duration::from_micros(5));
        frame.push_child(pool.acquire("stale_child"));
        frame.stamp_exit(Instant::now() + Duration::from_secs(1));
        pool.release(frame);

        let reused = pool.acquire("fresh");
        assert_eq!(reused.name(), "fresh");
        assert!(reused.children().is_empty());
        assert_eq!(reused.overhead(), Duration::ZERO);
        assert_eq!(reused.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_release_tree_recycles_descendants() {
        let mut pool = FramePool::new(FramePoolConfig::new(8));
        let mut root = pool.acquire("root");
        let mut mid = pool.acquire("mid");
        mid.push_child(pool.acquire("leaf_a"));
        mid.push_child(pool.acquire("leaf_b"));
        root.push_child(mid);
        assert_eq!(pool.available(), 4);

        pool.release_tree(root);
        assert_eq!(pool.available(), 8);
    }

    #[test]
    fn test_disabled_pool_always_allocates() {
        let mut pool = FramePool::new(FramePoolConfig::disabled());
        assert_eq!(pool.available(), 0);

        let frame = pool.acquire("x");
        pool.release(frame);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.stats().allocated, 1);
        assert!(!pool.stats().enabled);
    }

    #[test]
    fn test_reported_time_subtracts_overhead() {
        let mut pool = FramePool::new(FramePoolConfig::new(1));
        let mut frame = pool.acquire("f");
        let start = Instant::now();
        frame.stamp_entry(start);
        frame.stamp_exit(start + Duration::from_millis(10));
        frame.add_overhead(Duration::from_millis(3));

        assert_eq!(frame.elapsed(), Duration::from_millis(10));
        assert_eq!(frame.reported_time(), Duration::from_millis(7));
    }

    #[test]
    fn test_reported_time_saturates_at_zero() {
        let mut pool = FramePool::new(FramePoolConfig::new(1));
        let mut frame = pool.acquire("f");
        let start = Instant::now();
        frame.stamp_entry(start);
        frame.stamp_exit(start + Duration::from_nanos(10));
        frame.add_overhead(Duration::from_millis(1));

        assert_eq!(frame.reported_time(), Duration::ZERO);
    }

    #[test]
    fn test_stamp_entry_clears_prior_exit() {
        let mut pool = FramePool::new(FramePoolConfig::new(1));
        let mut frame = pool.acquire("f");
        let start = Instant::now();
        frame.stamp_exit(start + Duration::from_secs(5));
        frame.stamp_entry(start + Duration::from_secs(10));
        assert_eq!(frame.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_hit_rate_counts_fallback_allocations_as_misses() {
        let mut pool = FramePool::new(FramePoolConfig::new(1));
        let a = pool.acquire("a");
        let b = pool.acquire("b");
        drop(a);
        drop(b);

        // Two acquires, one served from the pool.
        let stats = pool.stats();
        assert_eq!(stats.acquired, 2);
        assert_eq!(stats.allocated, 2);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);
    }
}
