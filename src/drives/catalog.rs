// Device catalog - normalized descriptors of every block device on the host
//
// The snapshot groups devices by bus and carries a separate rotational-flag
// lookup keyed by bare device name. Eligibility decisions live in detection.rs.

use crate::{Bus, WipeError, WipeResult};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::process::Command;

/// One row of the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub path: String,
    pub bus: Bus,
    pub node_type: String,
    pub size_bytes: u64,
    pub size_gib: f64,
    pub model: String,
}

/// Devices grouped by bus plus the rotational lookup
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub groups: BTreeMap<Bus, Vec<CatalogEntry>>,
    pub rotational: HashMap<String, bool>,
}

impl CatalogSnapshot {
    /// Parse `lsblk -J -b -d -o NAME,PATH,TRAN,SIZE,MODEL,ROTA,TYPE`
    pub fn from_lsblk_json(json: &str) -> WipeResult<Self> {
        #[derive(Deserialize)]
        struct RawCatalog {
            #[serde(default)]
            blockdevices: Vec<RawDevice>,
        }

        let raw: RawCatalog = serde_json::from_str(json)
            .map_err(|e| WipeError::Discovery(format!("unparseable device catalog: {}", e)))?;

        let mut snapshot = CatalogSnapshot::default();
        for dev in raw.blockdevices {
            let node_type = dev.node_type.unwrap_or_default();
            let bus = Bus::from_transport(dev.tran.as_deref(), &dev.name, &node_type);
            let size_bytes = dev.size.unwrap_or(0);
            let path = dev
                .path
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| format!("/dev/{}", dev.name));

            if let Some(rota) = dev.rota {
                snapshot.rotational.insert(dev.name.clone(), rota);
            }

            snapshot.push(CatalogEntry {
                name: dev.name,
                path,
                bus,
                node_type,
                size_bytes,
                size_gib: size_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
                model: dev
                    .model
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
            });
        }

        Ok(snapshot)
    }

    pub fn push(&mut self, entry: CatalogEntry) {
        self.groups.entry(entry.bus).or_default().push(entry);
    }

    /// Entries in processing order: bus group first, then device name
    pub fn entries(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<&CatalogEntry> = self.groups.values().flatten().collect();
        entries.sort_by(|a, b| {
            a.bus
                .group_rank()
                .cmp(&b.bus.group_rank())
                .then_with(|| a.name.cmp(&b.name))
        });
        entries
    }

    /// `Some(true)` for spinning media, `Some(false)` for solid state
    pub fn is_rotational(&self, name: &str) -> Option<bool> {
        self.rotational.get(name).copied()
    }
}

#[derive(Deserialize)]
struct RawDevice {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    tran: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    size: Option<u64>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    rota: Option<bool>,
    #[serde(rename = "type", default)]
    node_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
    Flag(bool),
}

// Older lsblk releases print every column as a string
fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<NumberOrString>::deserialize(d)? {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<NumberOrString>::deserialize(d)? {
        Some(NumberOrString::Flag(b)) => Some(b),
        Some(NumberOrString::Number(n)) => Some(n != 0),
        Some(NumberOrString::Text(s)) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        None => None,
    })
}

/// Source of catalog snapshots
pub trait DeviceCatalog {
    fn snapshot(&self) -> WipeResult<CatalogSnapshot>;
}

/// Catalog from the local `lsblk`, with rotational flags refreshed from sysfs
pub struct LsblkCatalog;

impl DeviceCatalog for LsblkCatalog {
    fn snapshot(&self) -> WipeResult<CatalogSnapshot> {
        let json = run_lsblk(&["-J", "-b", "-d", "-o", "NAME,PATH,TRAN,SIZE,MODEL,ROTA,TYPE"])?;
        let mut snapshot = CatalogSnapshot::from_lsblk_json(&json)?;

        let names: Vec<String> = snapshot
            .groups
            .values()
            .flatten()
            .map(|e| e.name.clone())
            .collect();
        for name in names {
            if let Some(rota) = read_sysfs_rotational(&name) {
                snapshot.rotational.insert(name, rota);
            }
        }

        Ok(snapshot)
    }
}

fn read_sysfs_rotational(name: &str) -> Option<bool> {
    let raw = fs::read_to_string(format!("/sys/block/{}/queue/rotational", name)).ok()?;
    match raw.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

/// Run lsblk and return its stdout
pub(crate) fn run_lsblk(args: &[&str]) -> WipeResult<String> {
    let output = Command::new("lsblk")
        .args(args)
        .output()
        .map_err(|e| WipeError::Discovery(format!("failed to run lsblk: {}", e)))?;

    if !output.status.success() {
        let error = String::from_utf8_lossy(&output.stderr);
        return Err(WipeError::Discovery(format!(
            "lsblk failed: {}",
            error.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
