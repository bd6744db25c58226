/// Dry-run integration tests
///
/// A dry run must print the full command sequence for every selected device
/// and never hand a single command to the runner.

#[path = "common/mod.rs"]
mod common;

use bulkwipe::execution::CommandExecutor;
use bulkwipe::ui::{AlwaysConfirm, Confirmer};
use bulkwipe::{WipeOptions, WipeOrchestrator, WipeResult};
use common::fixtures::{FixtureCatalog, FixtureTopology};
use common::mock_commands::MockCommandRegistry;

/// Fails the test if a dry run ever asks for confirmation
struct NeverAsked;

impl Confirmer for NeverAsked {
    fn confirm(&mut self, device_path: &str) -> WipeResult<bool> {
        panic!("dry run asked to confirm {}", device_path);
    }
}

fn dry_run(options: &WipeOptions) -> (String, MockCommandRegistry, bulkwipe::RunSummary) {
    let registry = MockCommandRegistry::new();
    let executor = CommandExecutor::new(true, registry.runner());
    let mut orchestrator = WipeOrchestrator::new(executor, Box::new(NeverAsked), Vec::new());

    let summary = orchestrator
        .execute(&FixtureCatalog, &FixtureTopology, options)
        .expect("dry run should succeed");

    let out = String::from_utf8(orchestrator.into_output()).unwrap();
    (out, registry, summary)
}

fn dry_options() -> WipeOptions {
    WipeOptions {
        dry_run: true,
        passes: Some(1),
        stop_md_arrays: true,
        random_data_write: true,
        random_duration_seconds: Some(30),
        ..Default::default()
    }
}

#[test]
fn test_dry_run_invokes_nothing() {
    let (out, registry, summary) = dry_run(&dry_options());

    assert!(registry.calls().is_empty());
    assert!(summary.is_ok());
    assert!(!out.contains("[EXEC]"));
    assert!(out.contains("[DRY-RUN] umount /srv"));
    assert!(out.contains("[DRY-RUN] mdadm --stop /dev/md0"));
}

#[test]
fn test_dry_run_is_repeatable() {
    let (first, _, _) = dry_run(&dry_options());
    let (second, _, _) = dry_run(&dry_options());

    assert_eq!(first, second);
}

#[test]
fn test_dry_run_selects_safe_devices_in_bus_order() {
    let (out, _, summary) = dry_run(&dry_options());

    let paths: Vec<_> = summary
        .devices
        .iter()
        .map(|d| d.device.path.as_str())
        .collect();
    // sda holds "/", sdd is USB and was not named
    assert_eq!(paths, vec!["/dev/nvme0n1", "/dev/sdb", "/dev/sdc"]);
    assert_eq!(summary.system_disks, vec!["sda"]);
    assert!(!out.contains("/dev/sda "));
    assert!(!out.contains("/dev/sdd"));
}

#[test]
fn test_dry_run_plans_secure_erase_only_for_ssds() {
    let (out, _, summary) = dry_run(&dry_options());

    assert!(out.contains("[DRY-RUN] nvme format /dev/nvme0n1 --ses=1 --force"));
    assert!(out.contains("[DRY-RUN] hdparm --user-master u --security-erase bulkwipe /dev/sdb"));
    assert!(!out.contains("security-erase bulkwipe /dev/sdc"));

    let sdc = &summary.devices[2];
    // baseline + one pass + random scrub
    assert_eq!(sdc.steps.len(), 5);
    assert!(sdc.coverage_achieved);
}

#[test]
fn test_dry_run_with_confirm_all_behaves_the_same() {
    let options = WipeOptions {
        confirm_all: true,
        ..dry_options()
    };
    let registry = MockCommandRegistry::new();
    let executor = CommandExecutor::new(true, registry.runner());
    let mut orchestrator = WipeOrchestrator::new(executor, Box::new(AlwaysConfirm), Vec::new());

    let summary = orchestrator
        .execute(&FixtureCatalog, &FixtureTopology, &options)
        .unwrap();

    assert_eq!(summary.processed_count(), 3);
    assert!(registry.calls().is_empty());
}
