//! Profile sinks
//!
//! A sink consumes finished profiles off the hot path: `open` starts one
//! background worker behind a bounded queue, `input` hands out the
//! queue's write handle, and `close` drains the queue and joins the
//! worker. A full queue applies backpressure to profile completion
//! rather than dropping data; a failed write inside a worker drops that
//! one profile and never takes the profiled program down.
//!
//! Shipped implementations:
//! - [`FileSink`]: one JSON document per profile under an output directory
//! - [`DiscardSink`]: counts and drops everything (overhead measurements)
//! - [`BufferSink`]: collects profiles in memory (tests, embedders)

mod buffer;
mod discard;
mod file;

pub use buffer::{BufferSink, ProfileBuffer};
pub use discard::DiscardSink;
pub use file::FileSink;

use crossbeam::channel::{bounded, Sender};
use std::io;
use std::thread::JoinHandle;
use thiserror::Error;

use crate::profile::Profile;

/// Write handle for queueing profiles into an open sink.
///
/// `send` blocks while the sink's queue is full and fails once the sink
/// has been closed.
pub type ProfileSender = Sender<Profile>;

/// Errors raised by sink setup and teardown.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is not open")]
    NotOpen,

    #[error("sink is already open")]
    AlreadyOpen,

    #[error("could not prepare sink output: {0}")]
    Io(#[from] io::Error),

    #[error("sink worker thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// Consumer of finished profiles.
///
/// Lifecycle: `open`, any number of profiles through the input handle,
/// `close`. `open` must not return before the worker is running, and
/// `close` must not return before the worker has drained every queued
/// profile and exited.
pub trait Sink: Send {
    /// Start the sink with a delivery queue holding `queue_capacity`
    /// profiles. Zero means rendezvous delivery: every queued profile
    /// waits for the worker to take it.
    fn open(&mut self, queue_capacity: usize) -> Result<()>;

    /// Write handle for the delivery queue; `None` unless the sink is
    /// open.
    fn input(&self) -> Option<ProfileSender>;

    /// Stop accepting profiles, drain the queue and wait for the worker.
    fn close(&mut self) -> Result<()>;
}

/// Spawn a named worker thread and block until it is running.
fn spawn_worker<F>(name: &str, work: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let (ready_tx, ready_rx) = bounded(0);
    let handle = std::thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            // Rendezvous so the caller cannot observe a half-started sink.
            let _ = ready_tx.send(());
            work();
        })?;
    ready_rx.recv().map_err(|_| SinkError::WorkerPanicked)?;
    Ok(handle)
}

/// Join a worker handle left behind by `open`, if any.
fn join_worker(worker: Option<JoinHandle<()>>) -> Result<()> {
    match worker {
        Some(handle) => handle.join().map_err(|_| SinkError::WorkerPanicked),
        None => Ok(()),
    }
}
