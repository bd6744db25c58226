use anyhow::{Context, Result};
use bulkwipe::drives::{DriveDetector, LsblkCatalog, LsblkTopology};
use bulkwipe::execution::CommandExecutor;
use bulkwipe::ui::{logging, AlwaysConfirm, Confirmer, LogSettings, PromptConfirmer, DEFAULT_LOG_FILE};
use bulkwipe::*;
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bulkwipe")]
#[command(about = "Destructive batch wipe of block devices with system-disk and RAID safeguards")]
#[command(version = "1.0.0")]
struct Cli {
    /// Print every command without running anything
    #[arg(long)]
    dry_run: bool,

    /// Do not ask for confirmation before each device
    #[arg(short = 'y', long = "yes", visible_alias = "confirm-all")]
    confirm_all: bool,

    /// Only consider this device, by name (sdb) or path (/dev/sdb). Repeatable.
    #[arg(short, long = "device", value_name = "DEVICE")]
    devices: Vec<String>,

    /// Allow the disk holding the root filesystem to be wiped
    #[arg(long)]
    include_system_device: bool,

    /// Number of full-device zero passes
    #[arg(long, value_name = "N")]
    passes: Option<u32>,

    /// Always run a firmware secure erase
    #[arg(long)]
    secure_erase: bool,

    /// Do not add a secure erase automatically for SSDs
    #[arg(long)]
    no_auto_secure_erase: bool,

    /// Unmount and stop software RAID arrays that span selected devices
    #[arg(long)]
    stop_md_arrays: bool,

    /// Finish with time-bounded writes at random offsets
    #[arg(long)]
    random_write: bool,

    /// How long the random writes run per device
    #[arg(long, value_name = "SECONDS")]
    random_duration: Option<u32>,

    /// Concurrent random writers per device
    #[arg(long, value_name = "N")]
    random_workers: Option<u32>,

    /// Append-only log file shared by every run
    #[arg(long, env = "BULKWIPE_LOG", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Write a JSON report of the run
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// List the devices that would be selected and exit
    #[arg(long)]
    list: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Skip the root privilege check
    #[arg(long)]
    allow_non_root: bool,
}

impl Cli {
    fn wipe_options(&self) -> WipeOptions {
        WipeOptions {
            dry_run: self.dry_run,
            confirm_all: self.confirm_all,
            passes: self.passes,
            secure_erase: self.secure_erase,
            auto_secure_erase: !self.no_auto_secure_erase,
            random_data_write: self.random_write,
            random_duration_seconds: self.random_duration,
            random_workers_per_device: self.random_workers,
            stop_md_arrays: self.stop_md_arrays,
            include_system_device: self.include_system_device,
            devices: self.devices.clone(),
        }
    }

    fn needs_root(&self) -> bool {
        !self.dry_run && !self.list && !self.allow_non_root
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = logging::init(&LogSettings {
        file: cli.log_file.clone(),
        debug: cli.debug,
    });

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` means the run completed but is not a success
fn run(cli: &Cli) -> Result<bool> {
    let options = cli.wipe_options();
    options.validate()?;

    if cli.needs_root() && !is_root() {
        return Err(WipeError::Configuration(
            "this program requires root privileges (use --dry-run to preview)".to_string(),
        )
        .into());
    }

    if cli.list {
        return list_devices(&options);
    }

    if options.dry_run {
        tracing::info!("Dry-run: commands are printed, nothing is executed");
    }

    let confirmer: Box<dyn Confirmer> = if options.confirm_all {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(PromptConfirmer::stdin())
    };
    let executor = CommandExecutor::system(options.dry_run);
    let mut orchestrator = WipeOrchestrator::new(executor, confirmer, io::stdout());

    let summary = orchestrator.execute(&LsblkCatalog, &LsblkTopology, &options)?;

    let mut stdout = io::stdout();
    summary.print(&mut stdout)?;
    stdout.flush()?;

    if let Some(path) = &cli.report {
        summary
            .write_json(path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!(report = %path.display(), "Run report written");
    }

    tracing::info!(
        session = %summary.session_id,
        processed = summary.processed_count(),
        failed = summary.failed_count(),
        "Run finished"
    );
    Ok(summary.is_ok())
}

fn list_devices(options: &WipeOptions) -> Result<bool> {
    let discovery = DriveDetector::discover(&LsblkCatalog, &LsblkTopology, options)?;

    println!("Selected devices:");
    for device in &discovery.devices {
        println!(
            "  {:<16} {:>10.2} GiB  {:<6} {}  {}{}",
            device.path,
            device.size_gib(),
            device.bus.to_string(),
            if device.is_ssd { "SSD" } else { "HDD" },
            device.model,
            if device.is_system { "  [SYSTEM]" } else { "" }
        );
    }
    if discovery.devices.is_empty() {
        println!("  (none)");
    }
    if discovery.system_disks.is_empty() {
        println!("System disk: unknown");
    } else {
        println!("System disk: {}", discovery.system_disks.join(", "));
    }

    Ok(true)
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_maps_to_options() {
        let cli = Cli::try_parse_from([
            "bulkwipe",
            "--yes",
            "--device",
            "sdb",
            "-d",
            "/dev/nvme0n1",
            "--passes",
            "2",
            "--no-auto-secure-erase",
            "--random-write",
            "--random-duration",
            "60",
        ])
        .unwrap();

        let options = cli.wipe_options();
        assert!(options.confirm_all);
        assert_eq!(options.devices, vec!["sdb", "/dev/nvme0n1"]);
        assert_eq!(options.passes, Some(2));
        assert!(!options.auto_secure_erase);
        assert!(options.random_data_write);
        assert_eq!(options.random_duration(), 60);
        assert_eq!(options.random_workers(), DEFAULT_RANDOM_WORKERS);
    }

    #[test]
    fn test_confirm_all_alias() {
        let cli = Cli::try_parse_from(["bulkwipe", "--confirm-all"]).unwrap();
        assert!(cli.confirm_all);
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["bulkwipe"]).unwrap();
        let options = cli.wipe_options();
        assert!(options.auto_secure_erase);
        assert_eq!(options.passes, None);
        assert!(cli.needs_root());
    }

    #[test]
    fn test_dry_run_does_not_need_root() {
        let cli = Cli::try_parse_from(["bulkwipe", "--dry-run"]).unwrap();
        assert!(!cli.needs_root());
    }

    #[test]
    fn test_zero_passes_rejected_before_anything_runs() {
        let cli = Cli::try_parse_from(["bulkwipe", "--dry-run", "--passes", "0"]).unwrap();
        let err = run(&cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WipeError>(),
            Some(WipeError::Configuration(_))
        ));
    }
}
