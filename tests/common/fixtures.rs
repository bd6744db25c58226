/// lsblk output for a small test host
///
/// sda   SATA HDD, holds "/"          (system disk)
/// sdb   SATA SSD  \ mirrored as md0, mounted at /srv
/// sdc   SATA HDD  /
/// nvme0n1 NVMe SSD
/// sdd   USB stick mounted at /media/usb
use bulkwipe::drives::{
    parse_topology, CatalogSnapshot, DeviceCatalog, TopologyNode, TopologySource,
};
use bulkwipe::{WipeError, WipeResult};

pub const CATALOG_JSON: &str = r#"{
   "blockdevices": [
      {"name": "sda", "path": "/dev/sda", "tran": "sata", "size": 2000398934016, "model": "ST2000DM008-2FR102", "rota": true, "type": "disk"},
      {"name": "sdb", "path": "/dev/sdb", "tran": "sata", "size": 500107862016, "model": "Samsung SSD 870 EVO 500GB", "rota": false, "type": "disk"},
      {"name": "sdc", "path": "/dev/sdc", "tran": "sata", "size": 500107862016, "model": "WDC WD5000AAKX", "rota": true, "type": "disk"},
      {"name": "sdd", "path": "/dev/sdd", "tran": "usb", "size": 15518924800, "model": "Cruzer Blade", "rota": true, "type": "disk"},
      {"name": "nvme0n1", "path": "/dev/nvme0n1", "tran": "nvme", "size": 1000204886016, "model": "WD_BLACK SN770 1TB", "rota": false, "type": "disk"},
      {"name": "md0", "path": "/dev/md0", "tran": null, "size": 499972571136, "model": null, "rota": false, "type": "raid1"}
   ]
}"#;

pub const TOPOLOGY_JSON: &str = r#"{
   "blockdevices": [
      {"name": "sda", "type": "disk", "mountpoints": [null], "pkname": null,
         "children": [
            {"name": "sda1", "type": "part", "mountpoints": ["/boot/efi"], "pkname": "sda"},
            {"name": "sda2", "type": "part", "mountpoints": ["/"], "pkname": "sda"}
         ]
      },
      {"name": "sdb", "type": "disk", "mountpoints": [null], "pkname": null,
         "children": [
            {"name": "sdb1", "type": "part", "mountpoints": [null], "pkname": "sdb",
               "children": [
                  {"name": "md0", "type": "raid1", "mountpoints": ["/srv"], "pkname": "sdb1"}
               ]
            }
         ]
      },
      {"name": "sdc", "type": "disk", "mountpoints": [null], "pkname": null,
         "children": [
            {"name": "sdc1", "type": "part", "mountpoints": [null], "pkname": "sdc",
               "children": [
                  {"name": "md0", "type": "raid1", "mountpoints": ["/srv"], "pkname": "sdc1"}
               ]
            }
         ]
      },
      {"name": "sdd", "type": "disk", "mountpoints": [null], "pkname": null,
         "children": [
            {"name": "sdd1", "type": "part", "mountpoints": ["/media/usb"], "pkname": "sdd"}
         ]
      },
      {"name": "nvme0n1", "type": "disk", "mountpoints": [null], "pkname": null}
   ]
}"#;

pub struct FixtureCatalog;

impl DeviceCatalog for FixtureCatalog {
    fn snapshot(&self) -> WipeResult<CatalogSnapshot> {
        CatalogSnapshot::from_lsblk_json(CATALOG_JSON)
    }
}

pub struct FixtureTopology;

impl TopologySource for FixtureTopology {
    fn snapshot(&self) -> WipeResult<Vec<TopologyNode>> {
        parse_topology(TOPOLOGY_JSON)
    }
}

/// Topology collaborator that is not available on this host
#[allow(dead_code)]
pub struct MissingTopology;

impl TopologySource for MissingTopology {
    fn snapshot(&self) -> WipeResult<Vec<TopologyNode>> {
        Err(WipeError::Discovery("failed to run lsblk: No such file or directory".to_string()))
    }
}
