//! Execution-context identity
//!
//! Every profiling operation is attributed to the calling execution
//! context: the engine keeps one open call stack per context id, so two
//! threads profiling concurrently never see each other's frames. The
//! default provider uses the OS thread id; embedders with their own
//! scheduling model (or tests that need fixed ids) can plug in another
//! provider.

use std::cell::Cell;

/// Opaque identifier of one execution context, usually an OS thread.
pub type ContextId = u64;

/// Source of the current execution-context id.
///
/// `current` sits on the instrumentation hot path and runs once per hook,
/// so implementations must be cheap and must never block.
pub trait ContextIdProvider: Send + Sync {
    /// Id of the context executing the call. Contexts that can run
    /// concurrently must never share an id while both are live.
    fn current(&self) -> ContextId;
}

/// Default provider backed by the OS thread id.
///
/// On Linux this is the kernel tid, read once per thread via `gettid` and
/// cached in a thread-local. Elsewhere each thread draws a process-unique
/// id from a counter on first use.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsThreadId;

impl ContextIdProvider for OsThreadId {
    fn current(&self) -> ContextId {
        current_thread_id()
    }
}

thread_local! {
    // 0 marks "not yet resolved"; no platform hands out tid 0.
    static CACHED_THREAD_ID: Cell<ContextId> = const { Cell::new(0) };
}

fn current_thread_id() -> ContextId {
    CACHED_THREAD_ID.with(|cached| {
        let id = cached.get();
        if id != 0 {
            return id;
        }
        let id = resolve_thread_id();
        cached.set(id);
        id
    })
}

#[cfg(target_os = "linux")]
fn resolve_thread_id() -> ContextId {
    // SAFETY: gettid takes no arguments and always succeeds.
    (unsafe { libc::syscall(libc::SYS_gettid) }) as ContextId
}

#[cfg(not(target_os = "linux"))]
fn resolve_thread_id() -> ContextId {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
}
