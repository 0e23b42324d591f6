//! Integration tests for parsing v3 VM documents.
//!
//! These tests validate that the typed overlays deserialize realistic documents
//! and that an update built from them keeps every server-side key except `status`,
//! including explicit nulls and empty device lists.

use prism_api::models::{Entity, ListResponse, Vm};
use prism_api::payload::{patch, to_body, VmPatch};
use prism_core::types::{EntityKind, PowerState};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load the VM list fixture as entities.
fn load_vms() -> Vec<Entity> {
    let fixture_path = fixtures_dir().join("vm_list.json");
    let json_data = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read VM list fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    let envelope: ListResponse = serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize VM list: {e}"));
    envelope
        .entities
        .into_iter()
        .map(|raw| Entity::from_raw(EntityKind::Vm, raw).unwrap())
        .collect()
}

/// Load the sparse single-VM fixture.
fn load_sparse_vm() -> Entity {
    let fixture_path = fixtures_dir().join("vm_sparse.json");
    let json_data = fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read sparse VM fixture at {}: {}",
            fixture_path.display(),
            e
        )
    });
    let raw: Value = serde_json::from_str(&json_data)
        .unwrap_or_else(|e| panic!("Failed to deserialize sparse VM: {e}"));
    Entity::from_raw(EntityKind::Vm, raw).unwrap()
}

#[test]
fn test_deserialize_vm_list() {
    let vms = load_vms();
    assert_eq!(vms.len(), 2, "Expected 2 VMs in test data");
    assert!(vms.iter().all(|vm| vm.uuid.is_some()));
}

#[test]
fn test_vm_view_fields() {
    let entities = load_vms();
    let web = Vm::from_entity(&entities[0]).unwrap();

    assert_eq!(web.name, "web01");
    assert_eq!(web.uuid.as_str(), "6f1c2d3e-4b5a-4c6d-8e7f-9a0b1c2d3e4f");
    assert_eq!(web.power(), Some(PowerState::On));
    assert_eq!(web.num_sockets, Some(2));
    assert_eq!(web.memory_size_mib, Some(2048));
    assert_eq!(web.num_vcpus_per_socket, Some(1));
    assert_eq!(web.hardware_clock_timezone.as_deref(), Some("UTC"));

    let disk = &web.document.spec.resources().unwrap().disks()[0];
    assert_eq!(
        disk.data_source_reference().and_then(|r| r.uuid.as_deref()),
        Some("b1d3f5a7-9c2e-4a6b-8d0f-2e4a6c8e0a2c")
    );
    assert_eq!(disk.extra["disk_size_mib"], 20480);
}

#[test]
fn test_vm_without_optional_fields() {
    let entities = load_vms();
    let agent = Vm::from_entity(&entities[1]).unwrap();
    assert_eq!(agent.name, "build-agent");
    assert_eq!(agent.power(), Some(PowerState::Off));
    assert!(agent.hardware_clock_timezone.is_none());
    assert!(agent.document.spec.cluster_reference().is_none());
    assert_eq!(agent.document.spec.description(), Some("CI runner"));
}

#[test]
fn test_update_preserves_server_keys() {
    let entities = load_vms();
    let web = Vm::from_entity(&entities[0]).unwrap();
    let original = entities[0].raw.clone();

    let changes = VmPatch {
        memory_size_mib: Some(4096),
        ..VmPatch::default()
    };
    let body = to_body(&patch(web.document, &changes)).unwrap();

    assert!(body.get("status").is_none());
    assert_eq!(body["api_version"], "3.1");
    assert_eq!(body["spec"]["resources"]["memory_size_mib"], 4096);

    let mut expected: Value = original;
    expected
        .as_object_mut()
        .unwrap()
        .remove("status");
    expected["api_version"] = Value::from("3.1");
    expected["spec"]["resources"]["memory_size_mib"] = Value::from(4096);
    assert_eq!(body, expected);
}

#[test]
fn test_sparse_vm_view() {
    let scratch = Vm::from_entity(&load_sparse_vm()).unwrap();
    assert_eq!(scratch.name, "scratch");
    assert_eq!(scratch.power(), Some(PowerState::Off));
    assert!(scratch.hardware_clock_timezone.is_none());

    let spec = &scratch.document.spec;
    assert!(spec.description().is_none());
    assert!(spec.cluster_reference().is_none());
    assert!(spec.resources().unwrap().disks().is_empty());
    assert!(spec.resources().unwrap().nics().is_empty());
}

#[test]
fn test_update_preserves_nulls_and_empty_lists() {
    let entity = load_sparse_vm();
    let scratch = Vm::from_entity(&entity).unwrap();

    let changes = VmPatch {
        memory_size_mib: Some(2048),
        ..VmPatch::default()
    };
    let body = to_body(&patch(scratch.document, &changes)).unwrap();

    assert_eq!(body["spec"].get("description"), Some(&Value::Null));
    assert_eq!(body["spec"].get("cluster_reference"), Some(&Value::Null));
    assert_eq!(body["spec"]["resources"]["disk_list"], Value::Array(Vec::new()));
    assert_eq!(body["spec"]["resources"]["nic_list"], Value::Array(Vec::new()));

    let mut expected = entity.raw;
    expected
        .as_object_mut()
        .unwrap()
        .remove("status");
    expected["spec"]["resources"]["memory_size_mib"] = Value::from(2048);
    assert_eq!(body, expected);
}
