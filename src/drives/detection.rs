use super::catalog::{CatalogEntry, CatalogSnapshot, DeviceCatalog};
use super::topology::{find_root_disks, TopologyNode, TopologySource};
use crate::{selector_matches, Bus, DeviceDescriptor, WipeError, WipeOptions, WipeResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

lazy_static! {
    // nvme0n1p2 -> nvme0n1, mmcblk0p1 -> mmcblk0
    static ref P_PARTITION: Regex = Regex::new(r"^((?:nvme\d+n\d+)|(?:mmcblk\d+)|(?:nbd\d+)|(?:loop\d+))p\d+$").unwrap();
    // sda3 -> sda, vdb1 -> vdb, xvda2 -> xvda
    static ref LETTER_PARTITION: Regex = Regex::new(r"^((?:[shv]d|xvd)[a-z]+)\d+$").unwrap();
}

/// How far a stacked device (dm on dm on partition) is followed
const MAX_SLAVE_DEPTH: usize = 8;

/// Everything discovery established for one run
#[derive(Debug, Clone)]
pub struct Discovery {
    pub devices: Vec<DeviceDescriptor>,
    /// `None` when the topology collaborator was unavailable
    pub topology: Option<Vec<TopologyNode>>,
    /// Every disk backing "/" (several when root sits on RAID or LVM); empty when unknown
    pub system_disks: Vec<String>,
}

pub struct DriveDetector;

impl DriveDetector {
    /// Take one catalog and one topology snapshot and build the ordered target list
    pub fn discover(
        catalog: &dyn DeviceCatalog,
        topology: &dyn TopologySource,
        options: &WipeOptions,
    ) -> WipeResult<Discovery> {
        let snapshot = catalog.snapshot()?;

        let topology = match topology.snapshot() {
            Ok(tree) => Some(tree),
            // RAID stopping cannot be done safely without the tree
            Err(e) if options.stop_md_arrays => return Err(e),
            Err(e) => {
                tracing::warn!("Topology unavailable, falling back to mount table: {}", e);
                None
            }
        };

        let system_disks = Self::resolve_system_disks(topology.as_deref());
        if system_disks.is_empty() {
            tracing::info!(
                "Could not determine the system disk; no device will be treated as the system disk"
            );
        } else {
            tracing::info!(disks = %system_disks.join(", "), "System disk resolved");
        }

        let devices = Self::select_devices(&snapshot, options, &system_disks)?;

        Ok(Discovery {
            devices,
            topology,
            system_disks,
        })
    }

    /// Check if device should be skipped
    pub(crate) fn should_skip_device(device_name: &str) -> bool {
        // Skip loop devices, ram disks, device mapper, etc.
        device_name.starts_with("loop") ||
            device_name.starts_with("ram") ||
            device_name.starts_with("dm-") ||
            device_name.starts_with("sr") ||    // CD/DVD drives
            device_name.starts_with("zram")
    }

    /// Apply eligibility, explicit selectors and system-disk protection.
    ///
    /// USB disks are only eligible when named explicitly. A selector that
    /// names nothing eligible is a discovery error, never silently ignored.
    pub fn select_devices(
        snapshot: &CatalogSnapshot,
        options: &WipeOptions,
        system_disks: &[String],
    ) -> WipeResult<Vec<DeviceDescriptor>> {
        let entries = snapshot.entries();
        let explicit = !options.devices.is_empty();

        for selector in &options.devices {
            let hit = entries
                .iter()
                .any(|e| Self::is_wipeable(e) && Self::entry_matches(e, selector));
            if !hit {
                return Err(WipeError::Discovery(format!(
                    "no eligible device matches '{}'",
                    selector
                )));
            }
        }

        let mut devices = Vec::new();
        for entry in entries {
            if !Self::is_wipeable(entry) {
                continue;
            }

            if explicit {
                if !options.devices.iter().any(|s| Self::entry_matches(entry, s)) {
                    continue;
                }
            } else if entry.bus == Bus::USB {
                tracing::debug!(device = %entry.path, "Skipping USB device not selected explicitly");
                continue;
            }

            let is_system = system_disks.contains(&entry.name);
            if is_system {
                if !options.include_system_device {
                    tracing::warn!(
                        device = %entry.path,
                        "Excluding system disk (use --include-system-device to override)"
                    );
                    continue;
                }
                tracing::warn!(device = %entry.path, "System disk included by explicit override");
            }

            devices.push(DeviceDescriptor {
                name: entry.name.clone(),
                path: entry.path.clone(),
                bus: entry.bus,
                size_bytes: entry.size_bytes,
                model: entry.model.clone(),
                // Unknown rotation is treated as spinning media
                is_ssd: snapshot.is_rotational(&entry.name) == Some(false),
                is_system,
            });
        }

        Ok(devices)
    }

    fn is_wipeable(entry: &CatalogEntry) -> bool {
        entry.node_type == "disk" && entry.bus != Bus::MD && !Self::should_skip_device(&entry.name)
    }

    fn entry_matches(entry: &CatalogEntry, selector: &str) -> bool {
        selector_matches(&entry.name, &entry.path, selector)
    }

    /// Find the disks backing "/": topology first, then the mount table
    pub fn resolve_system_disks(topology: Option<&[TopologyNode]>) -> Vec<String> {
        let disks = topology.map(find_root_disks).unwrap_or_default();
        if !disks.is_empty() {
            return disks;
        }

        match fs::read_to_string("/proc/self/mounts").or_else(|_| fs::read_to_string("/proc/mounts")) {
            Ok(mounts) => Self::root_disks_from_mounts(&mounts, Path::new("/sys/class/block")),
            Err(_) => Vec::new(),
        }
    }

    /// Map the source of the "/" mount to the disks beneath it
    pub fn root_disks_from_mounts(mounts: &str, sysfs_block: &Path) -> Vec<String> {
        let Some(source) = Self::root_source(mounts) else {
            return Vec::new();
        };
        let resolved = fs::canonicalize(&source).unwrap_or_else(|_| PathBuf::from(&source));
        match resolved.file_name().and_then(|n| n.to_str()) {
            Some(name) => Self::parent_disks(name, sysfs_block, 0),
            None => Vec::new(),
        }
    }

    /// Device the root filesystem is mounted from, if it is a device node
    pub(crate) fn root_source(mounts: &str) -> Option<String> {
        // Last entry wins: later mounts shadow earlier ones
        mounts
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                Some((fields.next()?, fields.next()?))
            })
            .filter(|(_, target)| *target == "/")
            .map(|(source, _)| source)
            .last()
            .filter(|source| source.starts_with("/dev/"))
            .map(str::to_string)
    }

    /// Walk from a partition or stacked device to the disks beneath it.
    ///
    /// Empty when `name` is neither a sysfs block device nor a recognised
    /// partition name, so an unresolvable source is never taken for a disk.
    pub(crate) fn parent_disks(name: &str, sysfs_block: &Path, depth: usize) -> Vec<String> {
        let node = sysfs_block.join(name);

        if node.join("partition").exists() {
            if let Some(parent) = fs::canonicalize(&node)
                .ok()
                .and_then(|p| p.parent().and_then(|p| p.file_name()).map(|n| n.to_string_lossy().into_owned()))
            {
                return vec![parent];
            }
        }

        // md and dm devices list every device they are built on
        if depth < MAX_SLAVE_DEPTH {
            if let Ok(slaves) = fs::read_dir(node.join("slaves")) {
                let mut names: Vec<String> = slaves
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                if !names.is_empty() {
                    let mut disks: Vec<String> = Vec::new();
                    for slave in &names {
                        for disk in Self::parent_disks(slave, sysfs_block, depth + 1) {
                            if !disks.contains(&disk) {
                                disks.push(disk);
                            }
                        }
                    }
                    return disks;
                }
            }
        }

        if let Some(caps) = P_PARTITION.captures(name) {
            return vec![caps[1].to_string()];
        }
        if let Some(caps) = LETTER_PARTITION.captures(name) {
            return vec![caps[1].to_string()];
        }

        if node.exists() {
            return vec![name.to_string()];
        }
        Vec::new()
    }
}
