//! In-memory profile sink
//!
//! Collects every delivered profile in a shared buffer. The profiler
//! takes ownership of the sink, so callers keep a [`ProfileBuffer`]
//! handle around to read what arrived. Mainly for tests; also handy for
//! embedders that post-process profiles themselves.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use super::{join_worker, spawn_worker, ProfileSender, Result, Sink, SinkError};
use crate::profile::Profile;

/// Shared read handle over a [`BufferSink`]'s collected profiles.
#[derive(Clone, Default)]
pub struct ProfileBuffer {
    profiles: Arc<Mutex<Vec<Profile>>>,
}

impl ProfileBuffer {
    /// Snapshot of every profile delivered so far.
    pub fn profiles(&self) -> Vec<Profile> {
        self.profiles
            .lock()
            .map(|profiles| profiles.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.profiles.lock().map(|profiles| profiles.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct BufferSink {
    buffer: ProfileBuffer,
    input: Option<ProfileSender>,
    worker: Option<JoinHandle<()>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read handle that stays valid after the sink moves into a profiler.
    pub fn buffer(&self) -> ProfileBuffer {
        self.buffer.clone()
    }
}

impl Sink for BufferSink {
    fn open(&mut self, queue_capacity: usize) -> Result<()> {
        if self.input.is_some() {
            return Err(SinkError::AlreadyOpen);
        }
        let (tx, rx) = crossbeam::channel::bounded(queue_capacity);
        let buffer = Arc::clone(&self.buffer.profiles);
        self.worker = Some(spawn_worker("profile-buffer-sink", move || {
            for profile in rx.iter() {
                if let Ok(mut profiles) = buffer.lock() {
                    profiles.push(profile);
                }
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
