// Run report - one record per discovered device plus the session envelope
//
// Records are filled in by the orchestrator as steps finish and can be
// written out as JSON with `--report` for archiving alongside the log.

use crate::drives::RaidArrayMatch;
use crate::execution::CommandStatus;
use crate::{DeviceDescriptor, WipeOptions, WipeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Pending,
    Completed,
    Failed,
    Skipped,
}

/// One executed (or previewed) plan step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub description: String,
    pub command: String,
    pub covers_whole_device: bool,
    pub outcome: CommandStatus,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device: DeviceDescriptor,
    pub status: DeviceStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
    /// At least one whole-device step completed
    pub coverage_achieved: bool,
    pub skip_reason: Option<String>,
}

impl DeviceRecord {
    pub fn new(device: DeviceDescriptor) -> Self {
        Self {
            device,
            status: DeviceStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            steps: Vec::new(),
            coverage_achieved: false,
            skip_reason: None,
        }
    }

    pub fn record_step(&mut self, record: StepRecord) {
        if record.covers_whole_device && record.outcome.completed() {
            self.coverage_achieved = true;
        }
        self.steps.push(record);
    }

    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.outcome.is_ok()).count()
    }

    pub fn skip(&mut self, reason: &str) {
        self.status = DeviceStatus::Skipped;
        self.skip_reason = Some(reason.to_string());
        self.end_time = Some(Utc::now());
    }

    /// Close the record once every step has run
    pub fn finish(&mut self) {
        self.status = if self.failed_steps() == 0 {
            DeviceStatus::Completed
        } else {
            DeviceStatus::Failed
        };
        self.end_time = Some(Utc::now());
    }

    pub fn was_processed(&self) -> bool {
        matches!(self.status, DeviceStatus::Completed | DeviceStatus::Failed)
    }
}

/// Everything one invocation did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub options: WipeOptions,
    pub system_disks: Vec<String>,
    pub raid_arrays: Vec<RaidArrayMatch>,
    pub devices: Vec<DeviceRecord>,
}

impl RunSummary {
    pub fn new(options: &WipeOptions) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            options: options.clone(),
            system_disks: Vec::new(),
            raid_arrays: Vec::new(),
            devices: Vec::new(),
        }
    }

    pub fn processed_count(&self) -> usize {
        self.devices.iter().filter(|d| d.was_processed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| d.status == DeviceStatus::Failed)
            .count()
    }

    /// Ok only if something was processed and every command on it succeeded
    pub fn is_ok(&self) -> bool {
        self.processed_count() > 0 && self.failed_count() == 0
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> WipeResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(io::Error::from)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Closing console table: one line per device
    pub fn print(&self, out: &mut dyn Write) -> WipeResult<()> {
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out, "Session {}", self.session_id)?;
        for record in &self.devices {
            let detail = match (record.status, &record.skip_reason) {
                (DeviceStatus::Skipped, Some(reason)) => reason.clone(),
                _ => format!("{} failed step(s)", record.failed_steps()),
            };
            writeln!(
                out,
                "  {:<16} {:<10} {}",
                record.device.path,
                format!("{:?}", record.status),
                detail
            )?;
        }

        if self.is_ok() {
            writeln!(out, "✅ {} device(s) processed successfully", self.processed_count())?;
        } else if self.processed_count() == 0 {
            writeln!(out, "❌ No device was processed")?;
        } else {
            writeln!(
                out,
                "❌ {} of {} processed device(s) had failures",
                self.failed_count(),
                self.processed_count()
            )?;
        }
        Ok(())
    }
}
