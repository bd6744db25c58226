// Tests for lib.rs core types: bus mapping, descriptors, option validation.

use super::*;
use test_case::test_case;

// ==================== BUS MAPPING TESTS ====================

#[test_case(Some("sata"), "sda", "disk", Bus::SATA ; "sata transport")]
#[test_case(Some("SAS"), "sdb", "disk", Bus::SAS ; "sas transport uppercase")]
#[test_case(Some("nvme"), "nvme0n1", "disk", Bus::NVME ; "nvme transport")]
#[test_case(None, "nvme1n1", "disk", Bus::NVME ; "nvme by name without transport")]
#[test_case(Some("usb"), "sdc", "disk", Bus::USB ; "usb transport")]
#[test_case(None, "md0", "raid1", Bus::MD ; "md array")]
#[test_case(None, "vda", "disk", Bus::Other ; "virtio disk")]
fn test_bus_from_transport(tran: Option<&str>, name: &str, node_type: &str, expected: Bus) {
    assert_eq!(Bus::from_transport(tran, name, node_type), expected);
}

#[test]
fn test_secure_erase_capable_buses() {
    assert!(Bus::SATA.supports_secure_erase());
    assert!(Bus::SAS.supports_secure_erase());
    assert!(Bus::NVME.supports_secure_erase());
    assert!(!Bus::USB.supports_secure_erase());
    assert!(!Bus::MD.supports_secure_erase());
    assert!(!Bus::Other.supports_secure_erase());
}

#[test]
fn test_bus_group_order() {
    let mut buses = vec![Bus::USB, Bus::SAS, Bus::Other, Bus::SATA, Bus::NVME];
    buses.sort_by_key(|b| b.group_rank());
    assert_eq!(
        buses,
        vec![Bus::NVME, Bus::SATA, Bus::SAS, Bus::Other, Bus::USB]
    );
}

// ==================== DESCRIPTOR TESTS ====================

fn descriptor() -> DeviceDescriptor {
    DeviceDescriptor {
        name: "sdb".to_string(),
        path: "/dev/sdb".to_string(),
        bus: Bus::SATA,
        size_bytes: 2 * 1024 * 1024 * 1024,
        model: "WDC WD20EFRX".to_string(),
        is_ssd: false,
        is_system: false,
    }
}

#[test]
fn test_selector_matches_name_and_path() {
    let dev = descriptor();
    let matches = |selector: &str| selector_matches(&dev.name, &dev.path, selector);
    assert!(matches("sdb"));
    assert!(matches("/dev/sdb"));
    assert!(matches(" sdb "));
    assert!(!matches("sdb1"));
    assert!(!matches("/dev/sda"));
}

#[test]
fn test_size_gib() {
    assert!((descriptor().size_gib() - 2.0).abs() < f64::EPSILON);
}

// ==================== OPTION VALIDATION TESTS ====================

#[test]
fn test_default_options_are_valid() {
    let options = WipeOptions::default();
    assert!(options.validate().is_ok());
    assert!(options.auto_secure_erase);
    assert_eq!(options.pass_count(), 0);
    assert_eq!(options.random_duration(), DEFAULT_RANDOM_DURATION_SECS);
    assert_eq!(options.random_workers(), DEFAULT_RANDOM_WORKERS);
}

#[test]
fn test_zero_passes_rejected() {
    let options = WipeOptions {
        passes: Some(0),
        ..Default::default()
    };
    let err = options.validate().unwrap_err();
    assert!(matches!(err, WipeError::Configuration(_)));
    assert!(err.to_string().contains("--passes"));
}

#[test]
fn test_zero_random_settings_rejected() {
    let duration = WipeOptions {
        random_duration_seconds: Some(0),
        ..Default::default()
    };
    assert!(duration.validate().is_err());

    let workers = WipeOptions {
        random_workers_per_device: Some(0),
        ..Default::default()
    };
    assert!(workers.validate().is_err());
}

#[test]
fn test_empty_device_selector_rejected() {
    let options = WipeOptions {
        devices: vec!["  ".to_string()],
        ..Default::default()
    };
    assert!(matches!(
        options.validate(),
        Err(WipeError::Configuration(_))
    ));
}

#[test]
fn test_raid_stop_error_lists_failures() {
    let err = WipeError::RaidStop {
        failures: vec!["umount /data".to_string(), "mdadm --stop /dev/md0".to_string()],
    };
    let msg = err.to_string();
    assert!(msg.contains("umount /data"));
    assert!(msg.contains("/dev/md0"));
}
