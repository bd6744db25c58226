// Wipe Orchestrator - runs each device's plan behind the confirmation gate
//
// Devices are processed one at a time and plan steps strictly in order. A
// failing step never stops the run: failures are recorded per device and the
// run summary decides the final status.

use crate::drives::{DeviceCatalog, Discovery, DriveDetector, RaidGuard, TopologySource};
use crate::execution::{CommandExecutor, CommandStatus};
use crate::plan::{SecureEraseTrigger, WipePlanBuilder};
use crate::report::{DeviceRecord, RunSummary, StepRecord};
use crate::ui::Confirmer;
use crate::{DeviceDescriptor, WipeError, WipeOptions, WipeResult};
use chrono::Utc;
use std::io::Write;

/// Drives a batch of devices through their wipe plans
pub struct WipeOrchestrator<W: Write> {
    executor: CommandExecutor,
    confirmer: Box<dyn Confirmer>,
    out: W,
}

impl<W: Write> WipeOrchestrator<W> {
    pub fn new(executor: CommandExecutor, confirmer: Box<dyn Confirmer>, out: W) -> Self {
        Self {
            executor,
            confirmer,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Validate, discover, guard RAID arrays, then wipe.
    ///
    /// Returns `Err` only for run-level failures (bad options, no safe device
    /// list, RAID arrays that could not be stopped). Step failures end up in
    /// the summary.
    pub fn execute(
        &mut self,
        catalog: &dyn DeviceCatalog,
        topology: &dyn TopologySource,
        options: &WipeOptions,
    ) -> WipeResult<RunSummary> {
        options.validate()?;

        let discovery = DriveDetector::discover(catalog, topology, options)?;
        let mut summary = RunSummary::new(options);
        summary.system_disks = discovery.system_disks.clone();

        if discovery.devices.is_empty() {
            tracing::warn!("No eligible devices found");
        } else {
            tracing::info!(count = discovery.devices.len(), "Devices selected for wiping");
        }

        self.guard_raid(&discovery, options, &mut summary)?;
        self.process(&discovery.devices, options, &mut summary)?;
        summary.finish();
        Ok(summary)
    }

    /// Wipe an already selected device list
    pub fn run(
        &mut self,
        devices: &[DeviceDescriptor],
        options: &WipeOptions,
    ) -> WipeResult<RunSummary> {
        let mut summary = RunSummary::new(options);
        self.process(devices, options, &mut summary)?;
        summary.finish();
        Ok(summary)
    }

    fn guard_raid(
        &mut self,
        discovery: &Discovery,
        options: &WipeOptions,
        summary: &mut RunSummary,
    ) -> WipeResult<()> {
        let Some(tree) = discovery.topology.as_deref() else {
            return Ok(());
        };
        let targets: Vec<String> = discovery.devices.iter().map(|d| d.name.clone()).collect();

        if !options.stop_md_arrays {
            let matches = RaidGuard::find_matches(&targets, tree);
            for array in &matches {
                tracing::warn!(
                    array = %array.array_path,
                    members = %array.member_disks.join(", "),
                    "Target disk belongs to a software RAID array; pass --stop-md-arrays to stop it first"
                );
            }
            summary.raid_arrays = matches;
            return Ok(());
        }

        let outcome = RaidGuard::stop_arrays_for(&targets, tree, &mut self.executor, &mut self.out)?;
        summary.raid_arrays = outcome.matches.clone();
        if !outcome.success() {
            return Err(WipeError::RaidStop {
                failures: outcome.failures,
            });
        }
        if !outcome.matches.is_empty() {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn process(
        &mut self,
        devices: &[DeviceDescriptor],
        options: &WipeOptions,
        summary: &mut RunSummary,
    ) -> WipeResult<()> {
        for device in devices {
            let record = self.wipe_device(device, options)?;
            summary.devices.push(record);
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn wipe_device(
        &mut self,
        device: &DeviceDescriptor,
        options: &WipeOptions,
    ) -> WipeResult<DeviceRecord> {
        let mut record = DeviceRecord::new(device.clone());

        writeln!(
            self.out,
            "Device: {} | {:.2} GiB | {} | {} {}",
            device.path,
            device.size_gib(),
            device.model,
            device.bus,
            if device.is_ssd { "SSD" } else { "HDD" }
        )?;

        // Dry-run never touches the device, so there is nothing to confirm
        if !options.dry_run && !options.confirm_all && !self.confirmer.confirm(&device.path)? {
            writeln!(self.out, "Skipping {} (not confirmed)", device.path)?;
            tracing::info!(device = %device.path, "Wipe not confirmed, device skipped");
            record.skip("not confirmed");
            return Ok(record);
        }

        if device.is_ssd && (options.pass_count() > 1 || options.random_data_write) {
            tracing::warn!(
                device = %device.path,
                "Repeated overwrites add flash wear without reaching remapped blocks; secure erase is preferable on SSDs"
            );
        }

        if WipePlanBuilder::secure_erase_trigger(device, options)
            == Some(SecureEraseTrigger::Automatic)
        {
            tracing::info!(
                device = %device.path,
                bus = %device.bus,
                "Adding firmware secure erase automatically for solid-state device"
            );
        }

        let plan = WipePlanBuilder::build(device, options);
        let total = plan.len();

        for (index, step) in plan.iter().enumerate() {
            writeln!(self.out, "[{}/{}] {}", index + 1, total, step.description)?;

            let outcome = self
                .executor
                .execute(&mut self.out, &step.command, step.kind.is_best_effort())?;

            match &outcome {
                CommandStatus::Unsupported { detail } => tracing::warn!(
                    device = %device.path,
                    step = %step.description,
                    "Not supported by this device, continuing: {}",
                    detail
                ),
                CommandStatus::Failed { exit_code, detail } => tracing::error!(
                    device = %device.path,
                    step = %step.description,
                    exit_code = ?exit_code,
                    "Step failed: {}",
                    detail
                ),
                CommandStatus::Succeeded | CommandStatus::Previewed => {}
            }

            record.record_step(StepRecord {
                description: step.description.clone(),
                command: step.command.clone(),
                covers_whole_device: step.covers_whole_device,
                outcome,
                finished_at: Utc::now(),
            });
        }

        if !record.coverage_achieved {
            tracing::warn!(
                device = %device.path,
                "No whole-device overwrite or erase completed; residual data may remain"
            );
        }

        record.finish();
        tracing::info!(
            device = %device.path,
            status = ?record.status,
            failed_steps = record.failed_steps(),
            "Device finished"
        );
        Ok(record)
    }
}
