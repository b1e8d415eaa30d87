//! Finished-profile data model
//!
//! `Profile` wraps the aggregated call-group tree produced when a root
//! scope ends. Sinks receive owned `Profile` values; the file sink
//! serializes them with the JSON layout defined here. Durations persist
//! as integer nanoseconds, so stored profiles are resolution-exact and
//! trivially diffable.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::context::ContextId;
use crate::stats::TimingSummary;

/// Aggregated metrics for one call group, nested to mirror the shape of
/// the call tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMetrics {
    /// Function name shared by every invocation in the group.
    #[serde(rename = "fn")]
    pub fn_name: String,

    /// Total time spent across all invocations in the group.
    #[serde(with = "duration_nanos")]
    pub total_time: Duration,

    /// Fastest invocation.
    #[serde(with = "duration_nanos")]
    pub min_time: Duration,

    /// Slowest invocation.
    #[serde(with = "duration_nanos")]
    pub max_time: Duration,

    /// Mean invocation time, truncated to whole nanoseconds.
    #[serde(with = "duration_nanos")]
    pub mean_time: Duration,

    /// Median invocation time.
    #[serde(with = "duration_nanos")]
    pub median_time: Duration,

    /// Nearest-rank percentiles.
    #[serde(with = "duration_nanos")]
    pub p50_time: Duration,
    #[serde(with = "duration_nanos")]
    pub p75_time: Duration,
    #[serde(with = "duration_nanos")]
    pub p90_time: Duration,
    #[serde(with = "duration_nanos")]
    pub p99_time: Duration,

    /// Population standard deviation of invocation times, in nanoseconds.
    pub std_dev: f64,

    /// Number of invocations folded into this group.
    pub invocations: usize,

    /// Metrics of the call groups reached from this group's scope, in
    /// first-call order.
    pub calls: Vec<CallMetrics>,
}

impl CallMetrics {
    /// Build a leaf metrics node from a timing summary. Child groups are
    /// attached by the aggregator.
    pub(crate) fn from_summary(fn_name: &str, summary: &TimingSummary) -> Self {
        Self {
            fn_name: fn_name.to_owned(),
            total_time: summary.total,
            min_time: summary.min,
            max_time: summary.max,
            mean_time: summary.mean,
            median_time: summary.median,
            p50_time: summary.p50,
            p75_time: summary.p75,
            p90_time: summary.p90,
            p99_time: summary.p99,
            std_dev: summary.std_dev,
            invocations: summary.invocations,
            calls: Vec::new(),
        }
    }
}

/// One finished profile: the aggregated tree for a single root scope on
/// one execution context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Id of the execution context that produced the profile. Not part of
    /// the JSON document; the file sink folds it into the filename.
    #[serde(skip)]
    pub id: ContextId,

    /// Wall-clock time at which the root scope was entered. Also omitted
    /// from the document and carried in the filename instead.
    #[serde(skip, default = "unix_epoch")]
    pub created_at: SystemTime,

    /// Free-text label grouping profiles from one run.
    pub label: String,

    /// Metrics of the root call group.
    pub target: CallMetrics,
}

fn unix_epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH
}

impl Profile {
    /// Serialize to the on-disk JSON document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Nanoseconds between the Unix epoch and the root scope entry.
    /// Zero if the host clock sits before the epoch.
    pub fn created_at_nanos(&self) -> u128 {
        self.created_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    }
}

/// Serde adapter storing a `Duration` as integer nanoseconds.
mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
