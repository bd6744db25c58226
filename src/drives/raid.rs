// RAID guard - stops software RAID arrays that span disks about to be wiped
//
// Arrays are located in the topology tree, their mountpoints are released and
// the arrays are stopped with mdadm. Every array is processed even when an
// earlier unmount or stop fails, so the operator sees the full picture.

use super::topology::TopologyNode;
use crate::execution::CommandExecutor;
use crate::plan::shell_quote;
use crate::WipeResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io::Write;

/// lsblk reports active swap with this pseudo mountpoint
const SWAP_MOUNTPOINT: &str = "[SWAP]";

/// A software RAID array that contains at least one target disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidArrayMatch {
    pub array_path: String,
    pub member_disks: Vec<String>,
    /// Filesystem mountpoints on or below the array, deepest first
    pub mountpoints: Vec<String>,
    /// Swap areas on or below the array
    pub swap_devices: Vec<String>,
    /// Number of RAID layers between this array and its disks
    #[serde(skip)]
    nesting: usize,
}

/// Result of a stop attempt. Failures are collected, never short-circuited.
#[derive(Debug, Clone, Default)]
pub struct RaidStopOutcome {
    pub matches: Vec<RaidArrayMatch>,
    pub failures: Vec<String>,
}

impl RaidStopOutcome {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct Reach {
    disks: BTreeSet<String>,
    mountpoints: BTreeSet<String>,
    swaps: BTreeSet<String>,
}

impl Reach {
    fn absorb(&mut self, node: &TopologyNode) {
        if node.is_disk() {
            self.disks.insert(node.name.clone());
        }
        for mount in &node.mountpoints {
            if mount == SWAP_MOUNTPOINT {
                self.swaps.insert(node.device_path());
            } else {
                self.mountpoints.insert(mount.clone());
            }
        }
    }
}

pub struct RaidGuard;

impl RaidGuard {
    /// Find every RAID array whose member disks intersect `targets`.
    ///
    /// Works for both lsblk orientations: normally arrays sit below their
    /// member partitions, with `--inverse` the members sit below the array.
    /// So members and mountpoints are gathered from the node's subtree and
    /// from its ancestors on the walk path. An array reached along several
    /// paths is reported once with the union of what each path saw. Matches
    /// are ordered outermost array first.
    pub fn find_matches(targets: &[String], tree: &[TopologyNode]) -> Vec<RaidArrayMatch> {
        let targets: HashSet<&str> = targets.iter().map(String::as_str).collect();
        let mut arrays: Vec<RaidArrayMatch> = Vec::new();
        let mut ancestors: Vec<&TopologyNode> = Vec::new();

        for root in tree {
            Self::walk(root, &mut ancestors, &mut arrays);
        }

        arrays.retain(|a| a.member_disks.iter().any(|d| targets.contains(d.as_str())));
        // Stable sort: arrays built on other arrays are stopped first
        arrays.sort_by(|a, b| b.nesting.cmp(&a.nesting));
        arrays
    }

    fn walk<'a>(
        node: &'a TopologyNode,
        ancestors: &mut Vec<&'a TopologyNode>,
        arrays: &mut Vec<RaidArrayMatch>,
    ) {
        if node.is_raid() {
            let mut reach = Reach::default();
            node.iter().for_each(|n| reach.absorb(n));
            ancestors.iter().for_each(|n| reach.absorb(n));

            let nesting = Self::nesting(node, ancestors);
            Self::record(arrays, node.device_path(), reach, nesting);
        }

        // Keep descending: nested arrays must be found at every level
        ancestors.push(node);
        for child in &node.children {
            Self::walk(child, ancestors, arrays);
        }
        ancestors.pop();
    }

    /// RAID layers between `node` and the disks it is built on
    fn nesting(node: &TopologyNode, ancestors: &[&TopologyNode]) -> usize {
        fn raid_depth_to_disk(node: &TopologyNode) -> Option<usize> {
            if node.is_disk() {
                return Some(0);
            }
            node.children
                .iter()
                .filter_map(|c| raid_depth_to_disk(c).map(|d| d + usize::from(c.is_raid())))
                .max()
        }

        // Inverse orientation: disks are below the array
        if let Some(depth) = raid_depth_to_disk(node) {
            return depth;
        }

        // Normal orientation: count arrays between the nearest disk ancestor and here
        ancestors
            .iter()
            .rev()
            .take_while(|n| !n.is_disk())
            .filter(|n| n.is_raid())
            .count()
    }

    fn record(arrays: &mut Vec<RaidArrayMatch>, array_path: String, reach: Reach, nesting: usize) {
        if let Some(existing) = arrays.iter_mut().find(|m| m.array_path == array_path) {
            let mut members: BTreeSet<String> = existing.member_disks.drain(..).collect();
            members.extend(reach.disks);
            existing.member_disks = members.into_iter().collect();

            let mut mounts: BTreeSet<String> = existing.mountpoints.drain(..).collect();
            mounts.extend(reach.mountpoints);
            existing.mountpoints = deepest_first(mounts);

            let mut swaps: BTreeSet<String> = existing.swap_devices.drain(..).collect();
            swaps.extend(reach.swaps);
            existing.swap_devices = swaps.into_iter().collect();

            existing.nesting = existing.nesting.max(nesting);
            return;
        }

        arrays.push(RaidArrayMatch {
            array_path,
            member_disks: reach.disks.into_iter().collect(),
            mountpoints: deepest_first(reach.mountpoints),
            swap_devices: reach.swaps.into_iter().collect(),
            nesting,
        });
    }

    /// Unmount and stop every array spanning a target disk.
    ///
    /// Under dry-run the executor only previews, so every command counts as
    /// succeeding. Only a failure to write progress is returned as `Err`.
    pub fn stop_arrays_for(
        targets: &[String],
        tree: &[TopologyNode],
        executor: &mut CommandExecutor,
        out: &mut dyn Write,
    ) -> WipeResult<RaidStopOutcome> {
        let matches = Self::find_matches(targets, tree);
        let mut failures = Vec::new();

        if matches.is_empty() {
            tracing::info!("No software RAID arrays span the selected devices");
            return Ok(RaidStopOutcome { matches, failures });
        }

        // An outer array's mountpoints also show up under the arrays below it
        let mut released: HashSet<String> = HashSet::new();

        for array in &matches {
            writeln!(
                out,
                "Stopping RAID array {} (members: {})",
                array.array_path,
                array.member_disks.join(", ")
            )?;

            for mount in &array.mountpoints {
                if released.contains(mount) {
                    continue;
                }
                let command = format!("umount {}", shell_quote(mount));
                if executor.execute(out, &command, false)?.is_ok() {
                    released.insert(mount.clone());
                } else {
                    tracing::error!(array = %array.array_path, mountpoint = %mount, "Unmount failed");
                    failures.push(command);
                }
            }

            for swap in &array.swap_devices {
                if released.contains(swap) {
                    continue;
                }
                let command = format!("swapoff {}", shell_quote(swap));
                if executor.execute(out, &command, false)?.is_ok() {
                    released.insert(swap.clone());
                } else {
                    tracing::error!(array = %array.array_path, swap = %swap, "swapoff failed");
                    failures.push(command);
                }
            }

            let command = format!("mdadm --stop {}", shell_quote(&array.array_path));
            if executor.execute(out, &command, false)?.is_ok() {
                tracing::info!(array = %array.array_path, "RAID array stopped");
            } else {
                tracing::error!(array = %array.array_path, "Failed to stop RAID array");
                failures.push(command);
            }
        }

        Ok(RaidStopOutcome { matches, failures })
    }
}

/// Nested mountpoints must be released before their parents
fn deepest_first(mounts: BTreeSet<String>) -> Vec<String> {
    let mut mounts: Vec<String> = mounts.into_iter().collect();
    mounts.sort_by(|a, b| {
        let depth = |m: &str| m.trim_end_matches('/').matches('/').count();
        depth(b).cmp(&depth(a)).then_with(|| b.cmp(a))
    });
    mounts
}
