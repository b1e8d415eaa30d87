//! Medir - In-process function call profiler with statistical aggregation
//!
//! Instrumented call sites drive four hooks (`begin_profile`, `enter`,
//! `leave`, `end_profile`, or their RAII guards). Each execution context
//! builds a tree of timed call frames; when a root scope ends, repeated
//! invocations of the same call site are folded into per-function
//! statistics (total/min/max/mean/median, percentiles, standard
//! deviation) and the finished profile is queued to a pluggable sink
//! consumed by a background worker. Calibrated instrumentation overhead
//! is subtracted from every reported duration.
//!
//! # Example
//!
//! ```no_run
//! use medir::profiler::{Profiler, ProfilerConfig};
//! use medir::sink::FileSink;
//!
//! fn fibonacci(profiler: &Profiler, n: u64) -> u64 {
//!     let _scope = profiler.scope("fibonacci");
//!     match n {
//!         0 | 1 => n,
//!         _ => fibonacci(profiler, n - 1) + fibonacci(profiler, n - 2),
//!     }
//! }
//!
//! let config = ProfilerConfig {
//!     label: "fib-demo".to_owned(),
//!     ..Default::default()
//! };
//! let profiler = Profiler::new(config, Box::new(FileSink::new("./profiles"))).unwrap();
//!
//! {
//!     let _profile = profiler.profile("main");
//!     fibonacci(&profiler, 10);
//! }
//!
//! profiler.shutdown().unwrap();
//! ```

pub mod aggregate;
pub mod calibration;
pub mod context;
pub mod frame;
pub mod profile;
pub mod profiler;
pub mod sink;
pub mod stats;
