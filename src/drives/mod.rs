// Drive discovery and RAID handling
//
// Organized structure:
// - catalog.rs: Device catalog snapshot (lsblk, bus groups, rotational flags)
// - topology.rs: Block-device topology tree and root-disk resolution
// - detection.rs: Eligibility, explicit selection and system-disk protection
// - raid.rs: Stopping software RAID arrays that span target disks

pub mod catalog;
pub mod detection;
pub mod raid;
pub mod topology;



pub use catalog::{CatalogEntry, CatalogSnapshot, DeviceCatalog, LsblkCatalog};
pub use detection::{Discovery, DriveDetector};
pub use raid::{RaidArrayMatch, RaidGuard, RaidStopOutcome};
pub use topology::{find_root_disks, parse_topology, LsblkTopology, TopologyNode, TopologySource};
