//! Checks against a real Vulkan loader and driver.
//!
//! These tests require a GPU and will be skipped in CI without GPU support.

use ignis_gpu::{CapabilityKind, GpuError, InstanceBuilder};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

#[test]
#[ignore = "Requires GPU hardware"]
fn instance_lists_adapters() {
    init_logging();
    let instance = InstanceBuilder::new().app_name("driver test").build().unwrap();
    let devices = instance.enumerate_physical_devices().unwrap();
    assert!(!devices.is_empty());
    unsafe { instance.destroy() };
}

#[test]
#[ignore = "Requires GPU hardware"]
fn missing_layer_is_reported_by_name() {
    init_logging();
    let err = InstanceBuilder::new()
        .add_layer("VK_LAYER_IGNIS_does_not_exist")
        .build()
        .err()
        .unwrap();
    match err {
        GpuError::UnsupportedCapability { kind, name } => {
            assert_eq!(kind, CapabilityKind::InstanceLayer);
            assert_eq!(name, "VK_LAYER_IGNIS_does_not_exist");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
#[ignore = "Requires GPU hardware"]
fn missing_extension_is_reported_by_name() {
    init_logging();
    let err = InstanceBuilder::new()
        .add_extension("VK_IGNIS_does_not_exist")
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        GpuError::UnsupportedCapability {
            kind: CapabilityKind::InstanceExtension,
            ..
        }
    ));
}

#[test]
#[ignore = "Requires GPU hardware"]
fn debug_messenger_is_installed() {
    init_logging();
    let instance = InstanceBuilder::new().with_debug_messenger().build().unwrap();
    assert!(instance.has_debug_messenger());
    assert!(instance
        .enabled_extensions()
        .iter()
        .any(|name| name == "VK_EXT_debug_utils"));
    unsafe { instance.destroy() };
}
