//! Call-group aggregation
//!
//! A finished frame tree records every invocation separately; reporting
//! wants one statistical row per distinct call site. Aggregation folds
//! the tree in three passes:
//!
//! 1. **Insert**: walk the tree depth-first and assign every frame to a
//!    group keyed by `(parent function name, own function name)` within
//!    its tree depth.
//! 2. **Link**: from the second-deepest level upward, attach a child
//!    group to a parent group when any member of the child group was
//!    called from a member of the parent group.
//! 3. **Summarize**: walk the linked groups from the root and reduce each
//!    group's reported times to one [`CallMetrics`] node.
//!
//! For a root `a` that calls `b` twice, where the first `b` calls `c` and
//! `d` and the second calls `c` and `e`, grouping folds the two `b`
//! invocations into one row and the two `c` invocations reached through
//! `b` into another, preserving the tree shape:
//!
//! ```text
//!           |- c (x2)
//! a -- b  --|- d
//!      (x2) |- e
//! ```
//!
//! A group whose members were called from members of two different parent
//! groups is linked under both parents, and both report the group's full
//! statistics. Keys only see the parent's name, not its full path, so
//! this arises when the same parent/child name pair occurs under distinct
//! grandparents.

use fnv::FnvHashMap;
use std::time::Duration;

use crate::frame::CallFrame;
use crate::profile::CallMetrics;
use crate::stats;

/// Frames at one tree depth sharing `(parent name, own name)`.
struct CallGroup {
    fn_name: String,
    /// Reported time of each member, in completion order.
    times: Vec<Duration>,
    /// For each member, the group index of its parent one level up.
    parent_groups: Vec<usize>,
    /// Indices of linked child groups one level down, in discovery order.
    children: Vec<usize>,
}

/// Insertion-ordered groups at one tree depth.
#[derive(Default)]
struct DepthLevel {
    index_by_key: FnvHashMap<String, usize>,
    groups: Vec<CallGroup>,
}

/// Aggregate a finished frame tree into its grouped statistics tree.
///
/// The root frame becomes the root group; sibling calls with the same
/// name and parent collapse into shared groups with one statistics row.
pub fn aggregate(root: &CallFrame) -> CallMetrics {
    let mut levels: Vec<DepthLevel> = Vec::new();
    insert(&mut levels, 0, root, "", 0);
    link(&mut levels);
    summarize(&levels, 0, 0)
}

fn insert(
    levels: &mut Vec<DepthLevel>,
    depth: usize,
    frame: &CallFrame,
    parent_name: &str,
    parent_group: usize,
) {
    if levels.len() <= depth {
        levels.push(DepthLevel::default());
    }
    let level = &mut levels[depth];

    let key = format!("{},{}", parent_name, frame.name());
    let group_index = match level.index_by_key.get(&key) {
        Some(&index) => index,
        None => {
            let index = level.groups.len();
            level.groups.push(CallGroup {
                fn_name: frame.name().to_owned(),
                times: Vec::new(),
                parent_groups: Vec::new(),
                children: Vec::new(),
            });
            level.index_by_key.insert(key, index);
            index
        }
    };

    let group = &mut level.groups[group_index];
    group.times.push(frame.reported_time());
    group.parent_groups.push(parent_group);

    for child in frame.children() {
        insert(levels, depth + 1, child, frame.name(), group_index);
    }
}

/// Attach child groups to parent groups, one level pair at a time. A
/// single membership match links the whole child group; further members
/// of the same group cannot add duplicate links.
fn link(levels: &mut [DepthLevel]) {
    for depth in (0..levels.len().saturating_sub(1)).rev() {
        let (upper, lower) = levels.split_at_mut(depth + 1);
        let parents = &mut upper[depth];
        let children = &lower[0];

        for parent_index in 0..parents.groups.len() {
            for (child_index, child) in children.groups.iter().enumerate() {
                if child.parent_groups.contains(&parent_index) {
                    parents.groups[parent_index].children.push(child_index);
                }
            }
        }
    }
}

fn summarize(levels: &[DepthLevel], depth: usize, group_index: usize) -> CallMetrics {
    let group = &levels[depth].groups[group_index];
    let mut times = group.times.clone();
    let summary = stats::summarize(&mut times);

    let mut metrics = CallMetrics::from_summary(&group.fn_name, &summary);
    for &child_index in &group.children {
        metrics.calls.push(summarize(levels, depth + 1, child_index));
    }
    metrics
}
