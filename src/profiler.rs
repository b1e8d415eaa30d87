//! The profiling engine
//!
//! One [`Profiler`] instance owns all mutable state: the registry of open
//! frame stacks keyed by execution context, the frame pool, the
//! calibration constants and the delivery handle to the sink.
//! Instrumented call sites share the instance (usually behind an `Arc`)
//! and drive it through four hooks:
//!
//! - [`begin_profile`](Profiler::begin_profile) opens a root scope
//! - [`enter`](Profiler::enter) opens a nested scope
//! - [`leave`](Profiler::leave) closes the innermost scope
//! - [`end_profile`](Profiler::end_profile) closes the root, aggregates
//!   the frame tree and queues the finished profile to the sink
//!
//! [`profile`](Profiler::profile) and [`scope`](Profiler::scope) wrap the
//! hook pairs in RAII guards.
//!
//! Every hook is attributed to the calling context, so concurrently
//! profiling threads never share frames. Hooks with no active profile on
//! their context are cheap no-ops, which keeps partially instrumented
//! call graphs safe. The one fatal misuse is a `leave` with no matching
//! `enter`: the frame stack is inconsistent at that point and the engine
//! panics rather than attribute time to the wrong frames.

use fnv::FnvHashMap;
use std::sync::Mutex;
use std::time::{Instant, SystemTime};
use tracing::{debug, warn};

use crate::aggregate;
use crate::calibration::Calibration;
use crate::context::{ContextId, ContextIdProvider, OsThreadId};
use crate::frame::{CallFrame, FramePool, FramePoolConfig, PoolStats, DEFAULT_POOL_CAPACITY};
use crate::profile::Profile;
use crate::sink::{ProfileSender, Sink, SinkError};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Free-text label attached to every produced profile. Downstream
    /// tooling groups runs by it.
    pub label: String,
    /// Capacity of the sink delivery queue. Zero forces a rendezvous
    /// with the sink worker on every finished profile.
    pub queue_capacity: usize,
    /// Frame-pool capacity. Zero effectively disables pooling.
    pub pool_capacity: usize,
    /// Measure instrumentation overhead at startup. Disabled, the engine
    /// reports raw overhead-inclusive timings.
    pub calibrate: bool,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            label: String::new(),
            queue_capacity: 100,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            calibrate: true,
        }
    }
}

/// One open profile: wall-clock start plus the stack of open frames,
/// innermost last.
struct ActiveProfile {
    started_at: SystemTime,
    frames: Vec<CallFrame>,
}

struct Delivery {
    sink: Box<dyn Sink>,
    input: Option<ProfileSender>,
}

/// Function call profiler with per-context frame stacks, statistical
/// aggregation and asynchronous sink delivery.
pub struct Profiler {
    label: String,
    calibration: Calibration,
    context_ids: Box<dyn ContextIdProvider>,
    registry: Mutex<FnvHashMap<ContextId, ActiveProfile>>,
    pool: Mutex<FramePool>,
    delivery: Mutex<Delivery>,
}

impl Profiler {
    /// Build the engine, run calibration (unless disabled) and open the
    /// sink. Execution contexts are identified by OS thread id.
    ///
    /// Fails when the sink cannot start. A profiler without a working
    /// sink is useless, so treat this as fatal at initialization.
    pub fn new(config: ProfilerConfig, sink: Box<dyn Sink>) -> Result<Self, SinkError> {
        Self::with_context_ids(config, sink, Box::new(OsThreadId))
    }

    /// Like [`new`](Profiler::new) with an explicit execution-context id
    /// provider.
    pub fn with_context_ids(
        config: ProfilerConfig,
        mut sink: Box<dyn Sink>,
        context_ids: Box<dyn ContextIdProvider>,
    ) -> Result<Self, SinkError> {
        let calibration = if config.calibrate {
            Calibration::measure()
        } else {
            Calibration::disabled()
        };
        sink.open(config.queue_capacity)?;
        let input = sink.input().ok_or(SinkError::NotOpen)?;

        Ok(Self {
            label: config.label,
            calibration,
            context_ids,
            registry: Mutex::new(FnvHashMap::default()),
            pool: Mutex::new(FramePool::new(FramePoolConfig::new(config.pool_capacity))),
            delivery: Mutex::new(Delivery {
                sink,
                input: Some(input),
            }),
        })
    }

    /// Calibration constants in effect.
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Frame-pool counters.
    pub fn pool_stats(&self) -> PoolStats {
        match self.pool.lock() {
            Ok(pool) => pool.stats(),
            Err(_) => PoolStats::default(),
        }
    }

    /// Open a root profile for the calling execution context.
    ///
    /// If the context already has an active profile it is discarded and
    /// its frames recycled; the new root wins.
    pub fn begin_profile(&self, name: &str) {
        let context = self.context_ids.current();
        let mut root = {
            let Ok(mut pool) = self.pool.lock() else { return };
            pool.acquire(name)
        };
        root.add_overhead(self.calibration.entry_cost());
        let started_at = SystemTime::now();
        // Stamp last so pool bookkeeping stays outside the measured span.
        root.stamp_entry(Instant::now());

        let replaced = {
            let Ok(mut registry) = self.registry.lock() else { return };
            registry.insert(
                context,
                ActiveProfile {
                    started_at,
                    frames: vec![root],
                },
            )
        };
        if let Some(old) = replaced {
            warn!(
                "profiler: context {context} began a profile while one was active; discarding the unfinished one"
            );
            self.recycle_stack(old.frames);
        }
    }

    /// Open a nested scope on the calling context. A no-op when the
    /// context has no active profile, so partially instrumented call
    /// graphs are tolerated.
    pub fn enter(&self, name: &str) {
        let context = self.context_ids.current();
        {
            let Ok(registry) = self.registry.lock() else { return };
            if !registry.contains_key(&context) {
                return;
            }
        }

        let mut frame = {
            let Ok(mut pool) = self.pool.lock() else { return };
            pool.acquire(name)
        };
        frame.add_overhead(self.calibration.entry_cost());
        frame.stamp_entry(Instant::now());

        let Ok(mut registry) = self.registry.lock() else { return };
        if let Some(active) = registry.get_mut(&context) {
            active.frames.push(frame);
        }
    }

    /// Close the innermost open scope on the calling context and attach
    /// its frame to the parent scope. A no-op when the context has no
    /// active profile.
    ///
    /// # Panics
    ///
    /// Panics when the innermost frame is the profile root. An unmatched
    /// `leave` means enter/leave instrumentation is inconsistent, and
    /// every measurement after it would charge time to the wrong frame.
    pub fn leave(&self) {
        let context = self.context_ids.current();
        let exit_cost = self.calibration.exit_cost();
        let mut orphaned = false;
        {
            let Ok(mut registry) = self.registry.lock() else { return };
            match registry.get_mut(&context) {
                None => {}
                Some(active) if active.frames.len() <= 1 => orphaned = true,
                Some(active) => {
                    if let Some(mut frame) = active.frames.pop() {
                        frame.stamp_exit(Instant::now());
                        frame.add_overhead(exit_cost);
                        if let Some(parent) = active.frames.last_mut() {
                            // The child's whole bookkeeping cost is also
                            // overhead inside the parent's span.
                            parent.add_overhead(frame.overhead());
                            parent.push_child(frame);
                        }
                    }
                }
            }
        }
        // Raised outside the lock so the registry is not poisoned.
        if orphaned {
            panic!("profiler: leave without a matching enter on context {context}");
        }
    }

    /// Close the calling context's root scope, aggregate the frame tree
    /// and queue the finished profile to the sink. Blocks while the sink
    /// queue is full. A no-op when the context has no active profile.
    ///
    /// Scopes still open at this point (missing `leave` calls) are closed
    /// at the root's end tick.
    pub fn end_profile(&self) {
        let context = self.context_ids.current();
        let removed = {
            let Ok(mut registry) = self.registry.lock() else { return };
            registry.remove(&context)
        };
        let Some(active) = removed else { return };
        let Some(root) = self.seal(context, active.frames) else {
            return;
        };

        let profile = Profile {
            id: context,
            created_at: active.started_at,
            label: self.label.clone(),
            target: aggregate::aggregate(&root),
        };
        self.deliver(profile);

        if let Ok(mut pool) = self.pool.lock() {
            pool.release_tree(root);
        }
    }

    /// Open a root profile that ends when the guard drops.
    pub fn profile(&self, name: &str) -> ProfileGuard<'_> {
        self.begin_profile(name);
        ProfileGuard { profiler: self }
    }

    /// Open a nested scope that is left when the guard drops.
    pub fn scope(&self, name: &str) -> ScopeGuard<'_> {
        self.enter(name);
        ScopeGuard { profiler: self }
    }

    /// Stop delivering and shut the sink down, draining profiles already
    /// queued. Call once before process exit; profiles finished after
    /// shutdown are dropped.
    pub fn shutdown(&self) -> Result<(), SinkError> {
        // A poisoned delivery lock still holds a usable sink, and
        // shutdown has to make progress regardless.
        let mut delivery = self
            .delivery
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        delivery.input = None;
        delivery.sink.close()
    }

    /// Stamp the end tick on every still-open frame and fold the stack
    /// into a single root frame.
    fn seal(&self, context: ContextId, mut frames: Vec<CallFrame>) -> Option<CallFrame> {
        let end = Instant::now();
        if frames.len() > 1 {
            debug!(
                "profiler: context {context} ended a profile with {} scopes still open",
                frames.len() - 1
            );
        }
        let mut frame = frames.pop()?;
        frame.stamp_exit(end);
        frame.add_overhead(self.calibration.exit_cost());
        while let Some(mut parent) = frames.pop() {
            parent.stamp_exit(end);
            parent.add_overhead(frame.overhead());
            parent.push_child(frame);
            frame = parent;
        }
        Some(frame)
    }

    fn deliver(&self, profile: Profile) {
        // Clone the handle out of the lock; the send must not serialize
        // other contexts behind a slow sink.
        let input = match self.delivery.lock() {
            Ok(delivery) => delivery.input.clone(),
            Err(_) => None,
        };
        match input {
            Some(input) => {
                if input.send(profile).is_err() {
                    debug!("profiler: sink disconnected; dropping profile");
                }
            }
            None => debug!("profiler: delivery is shut down; dropping profile"),
        }
    }

    fn recycle_stack(&self, frames: Vec<CallFrame>) {
        let Ok(mut pool) = self.pool.lock() else { return };
        for frame in frames {
            pool.release_tree(frame);
        }
    }
}

/// RAII handle for a root profile; ends the profile when dropped.
#[must_use = "the profile ends as soon as the guard drops"]
pub struct ProfileGuard<'a> {
    profiler: &'a Profiler,
}

impl Drop for ProfileGuard<'_> {
    fn drop(&mut self) {
        self.profiler.end_profile();
    }
}

/// RAII handle for a nested scope; leaves the scope when dropped.
#[must_use = "the scope is left as soon as the guard drops"]
pub struct ScopeGuard<'a> {
    profiler: &'a Profiler,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.profiler.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{BufferSink, ProfileBuffer};

    fn buffered(label: &str) -> (Profiler, ProfileBuffer) {
        let sink = BufferSink::new();
        let buffer = sink.buffer();
        let config = ProfilerConfig {
            label: label.to_owned(),
            queue_capacity: 16,
            calibrate: false,
            ..Default::default()
        };
        let profiler = Profiler::new(config, Box::new(sink)).unwrap();
        (profiler, buffer)
    }

    #[test]
    fn test_default_config() {
        let config = ProfilerConfig::default();
        assert_eq!(config.label, "");
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.pool_capacity, DEFAULT_POOL_CAPACITY);
        assert!(config.calibrate);
    }

    #[test]
    fn test_disabled_calibration_reports_zero_costs() {
        let (profiler, _buffer) = buffered("calibration");
        assert_eq!(profiler.calibration(), Calibration::disabled());
        profiler.shutdown().unwrap();
    }

    #[test]
    fn test_hooks_without_active_profile_are_noops() {
        let (profiler, buffer) = buffered("noop");
        profiler.enter("ignored");
        profiler.leave();
        profiler.end_profile();
        profiler.shutdown().unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_second_begin_discards_the_first_profile() {
        let (profiler, buffer) = buffered("double-begin");
        profiler.begin_profile("first");
        profiler.enter("stale");
        profiler.begin_profile("second");
        profiler.end_profile();
        profiler.shutdown().unwrap();

        let profiles = buffer.profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].target.fn_name, "second");
        assert!(profiles[0].target.calls.is_empty());
    }

    #[test]
    #[should_panic(expected = "leave without a matching enter")]
    fn test_orphaned_leave_panics() {
        let (profiler, _buffer) = buffered("orphan");
        profiler.begin_profile("main");
        profiler.leave();
    }

    #[test]
    fn test_profile_delivery_carries_label_and_context() {
        let (profiler, buffer) = buffered("run-42");
        profiler.begin_profile("main");
        profiler.end_profile();
        profiler.shutdown().unwrap();

        let profiles = buffer.profiles();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].label, "run-42");
        assert_eq!(profiles[0].id, OsThreadId.current());
    }

    #[test]
    fn test_frames_return_to_pool_after_end() {
        let (profiler, _buffer) = buffered("pool");
        let before = profiler.pool_stats();

        profiler.begin_profile("main");
        profiler.enter("a");
        profiler.leave();
        profiler.enter("b");
        profiler.leave();
        profiler.end_profile();
        profiler.shutdown().unwrap();

        let after = profiler.pool_stats();
        assert_eq!(after.acquired, before.acquired + 3);
        assert_eq!(after.available, before.available);
        assert_eq!(after.allocated, before.allocated);
    }

    #[test]
    fn test_shutdown_twice_reports_not_open() {
        let (profiler, _buffer) = buffered("shutdown");
        profiler.shutdown().unwrap();
        assert!(matches!(profiler.shutdown(), Err(SinkError::NotOpen)));
    }

    #[test]
    fn test_profiles_after_shutdown_are_dropped() {
        let (profiler, buffer) = buffered("late");
        profiler.shutdown().unwrap();
        profiler.begin_profile("main");
        profiler.end_profile();
        assert!(buffer.is_empty());
    }
}
