//! File-backed profile sink
//!
//! Persists each profile as one JSON document under the configured
//! output directory, named
//! `profile-<function>-<entry unix nanos>-<context id>.json` so repeated
//! runs of the same root never collide. Path-hostile characters in the
//! function name are replaced before it reaches the filename.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{info, warn};

use super::{join_worker, spawn_worker, ProfileSender, Result, Sink, SinkError};
use crate::profile::Profile;

/// Characters that would escape or nest inside the output directory.
const BAD_FILENAME_CHARS: &str = r"[\./\\]";

const PROFILE_PREFIX: &str = "profile-";

/// Sink writing one JSON file per profile.
pub struct FileSink {
    output_dir: PathBuf,
    sanitizer: Regex,
    input: Option<ProfileSender>,
    worker: Option<JoinHandle<()>>,
}

impl FileSink {
    /// Sink storing profiles under `output_dir`. The directory is created
    /// on `open` if missing.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            // Infallible: the pattern is a compile-time constant.
            sanitizer: Regex::new(BAD_FILENAME_CHARS).expect("static filename pattern"),
            input: None,
            worker: None,
        }
    }

    /// Directory profiles are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Sink for FileSink {
    fn open(&mut self, queue_capacity: usize) -> Result<()> {
        if self.input.is_some() {
            return Err(SinkError::AlreadyOpen);
        }
        fs::create_dir_all(&self.output_dir)?;
        info!(
            "profiler: writing profiles to {}",
            self.output_dir.display()
        );

        let (tx, rx) = crossbeam::channel::bounded(queue_capacity);
        let output_dir = self.output_dir.clone();
        let sanitizer = self.sanitizer.clone();
        self.worker = Some(spawn_worker("profile-file-sink", move || {
            for profile in rx.iter() {
                write_profile(&output_dir, &sanitizer, &profile);
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

/// Persist one profile, logging and dropping it on any failure. Sink I/O
/// must never panic the worker.
fn write_profile(output_dir: &Path, sanitizer: &Regex, profile: &Profile) {
    let name = sanitizer.replace_all(&profile.target.fn_name, "_");
    let filename = format!(
        "{}{}-{}-{}.json",
        PROFILE_PREFIX,
        name,
        profile.created_at_nanos(),
        profile.id
    );
    let path = output_dir.join(filename);

    let payload = match serde_json::to_vec(profile) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(
                "profiler: could not serialize profile {:?}: {err}; dropping it",
                profile.label
            );
            return;
        }
    };
    if let Err(err) = fs::write(&path, payload) {
        warn!(
            "profiler: could not write {}: {err}; dropping profile",
            path.display()
        );
    }
}
