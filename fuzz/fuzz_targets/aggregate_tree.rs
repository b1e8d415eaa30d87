#![no_main]

//! Fuzz call-group aggregation with arbitrary frame trees.
//!
//! Bytes drive a bounded preorder tree build; aggregation of any tree
//! must uphold the per-group ordering invariants and account for every
//! frame at least once.

use libfuzzer_sys::fuzz_target;
use medir::aggregate::aggregate;
use medir::frame::{CallFrame, FramePool, FramePoolConfig};
use medir::profile::CallMetrics;
use std::time::{Duration, Instant};

const MAX_NODES: usize = 512;
const MAX_DEPTH: usize = 16;
const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

struct Builder<'a> {
    bytes: &'a [u8],
    cursor: usize,
    nodes: usize,
    pool: FramePool,
    base: Instant,
}

impl Builder<'_> {
    fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.bytes.get(self.cursor)?;
        self.cursor += 1;
        Some(byte)
    }

    /// One byte picks the node's name and duration, the next caps its
    /// child count.
    fn build(&mut self, depth: usize) -> Option<CallFrame> {
        if self.nodes >= MAX_NODES {
            return None;
        }
        let shape = self.next_byte()?;
        self.nodes += 1;

        let name = NAMES[(shape % NAMES.len() as u8) as usize];
        let mut frame = self.pool.acquire(name);
        frame.stamp_entry(self.base);
        frame.stamp_exit(self.base + Duration::from_nanos(u64::from(shape) * 37 + 1));

        if depth < MAX_DEPTH {
            let children = self.next_byte().unwrap_or(0) % 8;
            for _ in 0..children {
                match self.build(depth + 1) {
                    Some(child) => frame.push_child(child),
                    None => break,
                }
            }
        }
        Some(frame)
    }
}

/// Assert the ordering invariants for a group and return the invocation
/// count summed over the subtree.
fn check(metrics: &CallMetrics) -> usize {
    assert!(metrics.invocations >= 1);
    assert!(metrics.min_time <= metrics.p50_time);
    assert!(metrics.p50_time <= metrics.p75_time);
    assert!(metrics.p75_time <= metrics.p90_time);
    assert!(metrics.p90_time <= metrics.p99_time);
    assert!(metrics.p99_time <= metrics.max_time);
    assert!(metrics.min_time <= metrics.mean_time);
    assert!(metrics.mean_time <= metrics.max_time);
    assert!(metrics.total_time >= metrics.max_time);
    assert!(metrics.std_dev >= 0.0);
    metrics.invocations + metrics.calls.iter().map(check).sum::<usize>()
}

fuzz_target!(|data: &[u8]| {
    let mut builder = Builder {
        bytes: data,
        cursor: 0,
        nodes: 0,
        pool: FramePool::new(FramePoolConfig::disabled()),
        base: Instant::now(),
    };
    let root = match builder.build(0) {
        Some(root) => root,
        None => return,
    };

    let metrics = aggregate(&root);
    let counted = check(&metrics);
    // A group reached from two parent groups is reported under both, so
    // the invocation sum can exceed the node count but never undershoot.
    assert!(counted >= builder.nodes);
});
