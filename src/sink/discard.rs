//! Null sink
//!
//! Consumes and drops every profile, counting what it discards. Used by
//! overhead benchmarks and smoke tests where persisted output is
//! irrelevant but the full delivery path should still run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::{join_worker, spawn_worker, ProfileSender, Result, Sink, SinkError};

#[derive(Default)]
pub struct DiscardSink {
    discarded: Arc<AtomicU64>,
    input: Option<ProfileSender>,
    worker: Option<JoinHandle<()>>,
}

impl DiscardSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of profiles dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl Sink for DiscardSink {
    fn open(&mut self, queue_capacity: usize) -> Result<()> {
        if self.input.is_some() {
            return Err(SinkError::AlreadyOpen);
        }
        let (tx, rx) = crossbeam::channel::bounded(queue_capacity);
        let discarded = Arc::clone(&self.discarded);
        self.worker = Some(spawn_worker("profile-discard-sink", move || {
            for _profile in rx.iter() {
                discarded.fetch_add(1, Ordering::Relaxed);
            }
        })?);
        self.input = Some(tx);
        Ok(())
    }

    fn input(&self) -> Option<ProfileSender> {
        self.input.clone()
    }

    fn close(&mut self) -> Result<()> {
        if self.input.take().is_none() {
            return Err(SinkError::NotOpen);
        }
        join_worker(self.worker.take())
    }
}
