// Allow uppercase acronyms for bus names like SATA, SAS, NVME
#![allow(clippy::upper_case_acronyms)]

pub mod drives;
pub mod execution;
pub mod plan;
pub mod report;
pub mod ui;
pub mod wipe_orchestrator;

// Re-export the main entry points for convenience
pub use plan::{StepKind, WipePlanBuilder, WipeStep};
pub use report::{DeviceRecord, DeviceStatus, RunSummary, StepRecord};
pub use wipe_orchestrator::WipeOrchestrator;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Seconds a random-write scrub runs when no duration is given
pub const DEFAULT_RANDOM_DURATION_SECS: u32 = 300;

/// Background writers per device when no worker count is given
pub const DEFAULT_RANDOM_WORKERS: u32 = 4;

/// Errors that abort a whole run before (or instead of) wiping anything.
///
/// Individual wipe command failures are not represented here: they are
/// accumulated per device and reported in the [`RunSummary`].
#[derive(Error, Debug)]
pub enum WipeError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Device discovery failed: {0}")]
    Discovery(String),

    #[error("Failed to stop RAID arrays: {}", failures.join("; "))]
    RaidStop { failures: Vec<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WipeResult<T> = Result<T, WipeError>;

/// Transport a block device is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bus {
    SATA,
    SAS,
    NVME,
    USB,
    MD,
    Other,
}

impl Bus {
    /// Map an lsblk transport column (plus name/type hints) onto a bus
    pub fn from_transport(transport: Option<&str>, name: &str, node_type: &str) -> Self {
        if node_type.starts_with("raid") || name.starts_with("md") {
            return Bus::MD;
        }

        match transport.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("sata") | Some("ata") => Bus::SATA,
            Some("sas") => Bus::SAS,
            Some("nvme") => Bus::NVME,
            Some("usb") => Bus::USB,
            _ if name.starts_with("nvme") => Bus::NVME,
            _ => Bus::Other,
        }
    }

    /// Whether the drive firmware on this bus can be asked for a secure erase
    pub fn supports_secure_erase(&self) -> bool {
        matches!(self, Bus::SATA | Bus::SAS | Bus::NVME)
    }

    /// Position of this bus in the processing order
    pub fn group_rank(&self) -> u8 {
        match self {
            Bus::NVME => 0,
            Bus::SATA => 1,
            Bus::SAS => 2,
            Bus::Other => 3,
            Bus::USB => 4,
            Bus::MD => 5,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Bus::SATA => "SATA",
            Bus::SAS => "SAS",
            Bus::NVME => "NVMe",
            Bus::USB => "USB",
            Bus::MD => "MD",
            Bus::Other => "other",
        };
        f.write_str(label)
    }
}

/// A wipe candidate, built once from a single catalog snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub path: String,
    pub bus: Bus,
    pub size_bytes: u64,
    pub model: String,
    pub is_ssd: bool,
    pub is_system: bool,
}

impl DeviceDescriptor {
    pub fn size_gib(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0 * 1024.0)
    }
}

/// A `--device` selector matches either the bare name (`sdb`) or the node path (`/dev/sdb`)
pub fn selector_matches(name: &str, path: &str, selector: &str) -> bool {
    let selector = selector.trim();
    selector == name || selector == path
}

/// Everything the operator asked for, validated once before any device is touched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipeOptions {
    pub dry_run: bool,
    pub confirm_all: bool,
    /// `None` means no full-device overwrite pass
    pub passes: Option<u32>,
    pub secure_erase: bool,
    pub auto_secure_erase: bool,
    pub random_data_write: bool,
    pub random_duration_seconds: Option<u32>,
    pub random_workers_per_device: Option<u32>,
    pub stop_md_arrays: bool,
    pub include_system_device: bool,
    pub devices: Vec<String>,
}

impl Default for WipeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            confirm_all: false,
            passes: None,
            secure_erase: false,
            auto_secure_erase: true,
            random_data_write: false,
            random_duration_seconds: None,
            random_workers_per_device: None,
            stop_md_arrays: false,
            include_system_device: false,
            devices: Vec::new(),
        }
    }
}

impl WipeOptions {
    /// Reject non-positive counts. Must run before discovery.
    pub fn validate(&self) -> WipeResult<()> {
        let checks = [
            ("--passes", self.passes),
            ("--random-duration", self.random_duration_seconds),
            ("--random-workers", self.random_workers_per_device),
        ];

        for (flag, value) in checks {
            if value == Some(0) {
                return Err(WipeError::Configuration(format!(
                    "{} must be a positive integer",
                    flag
                )));
            }
        }

        if self.devices.iter().any(|d| d.trim().is_empty()) {
            return Err(WipeError::Configuration(
                "--device must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn pass_count(&self) -> u32 {
        self.passes.unwrap_or(0)
    }

    pub fn random_duration(&self) -> u32 {
        self.random_duration_seconds
            .unwrap_or(DEFAULT_RANDOM_DURATION_SECS)
    }

    pub fn random_workers(&self) -> u32 {
        self.random_workers_per_device
            .unwrap_or(DEFAULT_RANDOM_WORKERS)
    }
}

#[cfg(test)]
mod lib_tests;
