// Storage topology snapshot
//
// A read-only tree of block devices (disk -> partition / RAID member -> filesystem)
// as reported by lsblk. Used to find the disk backing "/" and the RAID arrays a
// disk belongs to. Nothing in this crate mutates a tree once parsed.

use super::catalog::run_lsblk;
use crate::{WipeError, WipeResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One block device in the topology tree
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TopologyNode {
    pub name: String,
    pub node_type: String,
    /// Non-empty mountpoints of this node only (lsblk may report several)
    pub mountpoints: Vec<String>,
    /// Parent kernel device name
    pub pkname: Option<String>,
    pub children: Vec<TopologyNode>,
}

impl TopologyNode {
    pub fn is_disk(&self) -> bool {
        self.node_type == "disk"
    }

    pub fn is_raid(&self) -> bool {
        self.node_type.starts_with("raid")
    }

    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.name)
    }

    pub fn is_mounted_at(&self, target: &str) -> bool {
        self.mountpoints.iter().any(|m| m == target)
    }

    /// Pre-order iterator over this node and every descendant
    pub fn iter(&self) -> impl Iterator<Item = &TopologyNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

#[derive(Deserialize)]
struct RawTree {
    #[serde(default)]
    blockdevices: Vec<RawNode>,
}

#[derive(Deserialize)]
struct RawNode {
    name: String,
    #[serde(rename = "type", default)]
    node_type: Option<String>,
    #[serde(default)]
    mountpoint: Option<String>,
    #[serde(default)]
    mountpoints: Option<Vec<Option<String>>>,
    #[serde(default)]
    pkname: Option<String>,
    #[serde(default)]
    children: Vec<RawNode>,
}

impl From<RawNode> for TopologyNode {
    fn from(raw: RawNode) -> Self {
        let mut mountpoints: Vec<String> = Vec::new();
        let listed = raw.mountpoints.unwrap_or_default().into_iter().flatten();
        for mount in raw.mountpoint.into_iter().chain(listed) {
            let mount = mount.trim().to_string();
            if !mount.is_empty() && !mountpoints.contains(&mount) {
                mountpoints.push(mount);
            }
        }

        TopologyNode {
            name: raw.name,
            node_type: raw.node_type.unwrap_or_default(),
            mountpoints,
            pkname: raw.pkname.filter(|p| !p.is_empty()),
            children: raw.children.into_iter().map(TopologyNode::from).collect(),
        }
    }
}

/// Parse `lsblk -J` output (either the `mountpoint` or the newer `mountpoints` form)
pub fn parse_topology(json: &str) -> WipeResult<Vec<TopologyNode>> {
    let raw: RawTree = serde_json::from_str(json)
        .map_err(|e| WipeError::Discovery(format!("unparseable topology snapshot: {}", e)))?;
    Ok(raw.blockdevices.into_iter().map(TopologyNode::from).collect())
}

/// Source of topology snapshots
pub trait TopologySource {
    fn snapshot(&self) -> WipeResult<Vec<TopologyNode>>;
}

/// Topology from the local `lsblk`
pub struct LsblkTopology;

impl TopologySource for LsblkTopology {
    fn snapshot(&self) -> WipeResult<Vec<TopologyNode>> {
        // MOUNTPOINTS only exists in util-linux >= 2.37
        let json = run_lsblk(&["-J", "-o", "NAME,TYPE,MOUNTPOINT,MOUNTPOINTS,PKNAME"])
            .or_else(|_| run_lsblk(&["-J", "-o", "NAME,TYPE,MOUNTPOINT,PKNAME"]))?;
        parse_topology(&json)
    }
}

/// Find every disk that backs "/".
///
/// A root filesystem on a RAID or LVM device spanning several disks is backed
/// by all of them. Three sources are merged: disks on every tree path leading
/// down to the node mounted at "/" (disk-first orientation), disks below that
/// node (inverse orientation), and the PKNAME chain for flat snapshots.
/// Returns an empty list when nothing is mounted at "/" or no disk is reachable.
pub fn find_root_disks(tree: &[TopologyNode]) -> Vec<String> {
    let Some(root) = tree
        .iter()
        .flat_map(|top| top.iter())
        .find(|node| node.is_mounted_at("/"))
    else {
        return Vec::new();
    };

    let mut disks: Vec<String> = Vec::new();
    let mut path: Vec<&TopologyNode> = Vec::new();
    for top in tree {
        collect_disks_around(top, &root.name, &mut path, &mut disks);
    }
    if let Some(disk) = walk_parent_links(tree, root) {
        push_unique(&mut disks, &disk);
    }
    disks
}

fn collect_disks_around<'a>(
    node: &'a TopologyNode,
    target: &str,
    path: &mut Vec<&'a TopologyNode>,
    disks: &mut Vec<String>,
) {
    if node.name == target {
        for disk in path.iter().copied().chain(node.iter()).filter(|n| n.is_disk()) {
            push_unique(disks, &disk.name);
        }
        return;
    }

    path.push(node);
    for child in &node.children {
        collect_disks_around(child, target, path, disks);
    }
    path.pop();
}

fn push_unique(disks: &mut Vec<String>, name: &str) {
    if !disks.iter().any(|d| d == name) {
        disks.push(name.to_string());
    }
}

/// Follow PKNAME (or the tree parent when PKNAME is absent) up to a disk
fn walk_parent_links<'a>(tree: &'a [TopologyNode], start: &'a TopologyNode) -> Option<String> {
    let mut by_name: HashMap<&str, &TopologyNode> = HashMap::new();
    let mut tree_parent: HashMap<&str, &str> = HashMap::new();
    for top in tree {
        for node in top.iter() {
            by_name.entry(node.name.as_str()).or_insert(node);
            for child in &node.children {
                tree_parent
                    .entry(child.name.as_str())
                    .or_insert(node.name.as_str());
            }
        }
    }

    let mut current = start;
    let mut visited: HashSet<&str> = HashSet::new();
    loop {
        if current.is_disk() {
            return Some(current.name.clone());
        }
        if !visited.insert(current.name.as_str()) {
            return None;
        }

        let parent = current
            .pkname
            .as_deref()
            .or_else(|| tree_parent.get(current.name.as_str()).copied())?;
        current = by_name.get(parent).copied()?;
    }
}
