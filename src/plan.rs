// Wipe Plan Builder - Maps a device and the operator's options to an ordered step list
//
// The builder is pure: it never touches the device. Execution of the resulting
// steps happens only in the orchestrator, through the command executor.

use crate::{Bus, DeviceDescriptor, WipeOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Leading region zeroed to destroy boot sectors and partition headers
pub const HEADER_ZERO_MIB: u64 = 20;

/// Throwaway password used only for the duration of an ATA security erase
pub const ATA_SECURITY_PASSWORD: &str = "bulkwipe";

/// Worker script for the random-offset scrub.
///
/// Positional arguments: `$1` device path, `$2` duration in seconds, `$3` worker count.
pub const RANDOM_SCRUB_SCRIPT: &str = r#"dev="$1"; duration="$2"; workers="$3"
size_mib=$(( $(blockdev --getsize64 "$dev") / 1048576 ))
[ "$size_mib" -gt 0 ] || exit 1
end=$(( $(date +%s) + duration ))
for w in $(seq 1 "$workers"); do
  (
    while [ "$(date +%s)" -lt "$end" ]; do
      count=$(( (RANDOM % 64) + 1 ))
      [ "$count" -gt "$size_mib" ] && count=$size_mib
      span=$(( size_mib - count + 1 ))
      seek=$(( ((RANDOM << 15) | RANDOM) % span ))
      left=$(( end - $(date +%s) ))
      [ "$left" -gt 0 ] || break
      timeout "$left" dd if=/dev/zero of="$dev" bs=1M count="$count" seek="$seek" oflag=direct conv=notrunc status=none || true
    done
  ) &
done
wait"#;

/// What a step does. Drives ordering checks and best-effort handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    SignatureWipe,
    Discard,
    HeaderZero,
    OverwritePass { pass: u32, total: u32 },
    NvmeIdentify,
    NvmeFormat,
    AtaIdentify,
    AtaSetPassword,
    AtaSecurityErase,
    RandomScrub,
}

/// Coarse plan phases. Steps never appear out of phase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Metadata,
    Capacity,
    SecureErase,
    RandomScrub,
}

impl StepKind {
    pub fn phase(&self) -> Phase {
        match self {
            StepKind::SignatureWipe | StepKind::Discard | StepKind::HeaderZero => Phase::Metadata,
            StepKind::OverwritePass { .. } => Phase::Capacity,
            StepKind::NvmeIdentify
            | StepKind::NvmeFormat
            | StepKind::AtaIdentify
            | StepKind::AtaSetPassword
            | StepKind::AtaSecurityErase => Phase::SecureErase,
            StepKind::RandomScrub => Phase::RandomScrub,
        }
    }

    /// Steps whose "unsupported" failure is expected on many devices
    pub fn is_best_effort(&self) -> bool {
        matches!(self, StepKind::Discard)
    }
}

/// One planned command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WipeStep {
    pub kind: StepKind,
    pub description: String,
    pub command: String,
    /// Success implies the whole addressable range was overwritten or erased
    pub covers_whole_device: bool,
}

impl WipeStep {
    fn new(kind: StepKind, description: impl Into<String>, command: String) -> Self {
        Self {
            kind,
            description: description.into(),
            command,
            covers_whole_device: false,
        }
    }

    fn covering(mut self) -> Self {
        self.covers_whole_device = true;
        self
    }
}

/// Why a secure erase was added to a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureEraseTrigger {
    Explicit,
    Automatic,
}

pub struct WipePlanBuilder;

impl WipePlanBuilder {
    /// Build the ordered step list for one device
    pub fn build(device: &DeviceDescriptor, options: &WipeOptions) -> Vec<WipeStep> {
        let dev = shell_quote(&device.path);
        let mut steps = vec![
            WipeStep::new(
                StepKind::SignatureWipe,
                "Destroy filesystem and RAID signatures",
                format!("wipefs --all --force {}", dev),
            ),
            WipeStep::new(
                StepKind::Discard,
                "Discard all blocks (best-effort)",
                format!("blkdiscard --force {}", dev),
            ),
            WipeStep::new(
                StepKind::HeaderZero,
                format!("Zero first {} MiB", HEADER_ZERO_MIB),
                format!(
                    "dd if=/dev/zero of={} bs=1M count={} oflag=direct conv=fsync status=none",
                    dev, HEADER_ZERO_MIB
                ),
            ),
        ];

        let passes = options.pass_count();
        let blocks = Self::block_count(device.size_bytes);
        for pass in 1..=passes {
            steps.push(
                WipeStep::new(
                    StepKind::OverwritePass {
                        pass,
                        total: passes,
                    },
                    format!("Zero pass {}/{} ({} MiB)", pass, passes, blocks),
                    format!(
                        "dd if=/dev/zero of={} bs=1M count={} oflag=direct conv=fsync status=progress",
                        dev, blocks
                    ),
                )
                .covering(),
            );
        }

        if Self::secure_erase_trigger(device, options).is_some() {
            steps.extend(Self::secure_erase_steps(device.bus, &dev));
        }

        if options.random_data_write {
            let duration = options.random_duration();
            let workers = options.random_workers();
            steps.push(WipeStep::new(
                StepKind::RandomScrub,
                format!(
                    "Random-offset zero writes for {} with {} worker(s)",
                    humantime::format_duration(Duration::from_secs(u64::from(duration))),
                    workers
                ),
                format!(
                    "bash -c {} random-scrub {} {} {}",
                    shell_quote(RANDOM_SCRUB_SCRIPT),
                    dev,
                    duration,
                    workers
                ),
            ));
        }

        steps
    }

    /// Decide whether (and why) a secure erase belongs in the plan
    pub fn secure_erase_trigger(
        device: &DeviceDescriptor,
        options: &WipeOptions,
    ) -> Option<SecureEraseTrigger> {
        if options.secure_erase {
            Some(SecureEraseTrigger::Explicit)
        } else if options.auto_secure_erase && device.is_ssd && device.bus.supports_secure_erase() {
            Some(SecureEraseTrigger::Automatic)
        } else {
            None
        }
    }

    /// 1 MiB blocks needed to cover `size_bytes`, never less than one
    pub fn block_count(size_bytes: u64) -> u64 {
        size_bytes.div_ceil(MIB).max(1)
    }

    fn secure_erase_steps(bus: Bus, dev: &str) -> Vec<WipeStep> {
        if bus == Bus::NVME {
            return vec![
                WipeStep::new(
                    StepKind::NvmeIdentify,
                    "Identify NVMe controller",
                    format!("nvme id-ctrl {}", dev),
                ),
                WipeStep::new(
                    StepKind::NvmeFormat,
                    "NVMe format with user-data secure erase",
                    format!("nvme format {} --ses=1 --force", dev),
                )
                .covering(),
            ];
        }

        vec![
            WipeStep::new(
                StepKind::AtaIdentify,
                "Identify ATA security state",
                format!("hdparm -I {}", dev),
            ),
            WipeStep::new(
                StepKind::AtaSetPassword,
                "Set temporary ATA security password",
                format!(
                    "hdparm --user-master u --security-set-pass {} {}",
                    ATA_SECURITY_PASSWORD, dev
                ),
            ),
            WipeStep::new(
                StepKind::AtaSecurityErase,
                "ATA security erase",
                format!(
                    "hdparm --user-master u --security-erase {} {}",
                    ATA_SECURITY_PASSWORD, dev
                ),
            )
            .covering(),
        ]
    }
}

/// Quote a string for safe embedding in a POSIX shell command line
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=,+@%".contains(c));

    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r#"'\''"#))
    }
}
