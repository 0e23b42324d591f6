//! Typed overlays of v3 entity documents.
//!
//! Each struct names only the fields this crate reads or writes and collects every
//! other key into an `extra` map, so a document fetched from the server can be
//! modified and sent back without losing server-owned subtrees. Optional fields are
//! [`Nullable`]: an absent key, an explicit `null` and a value each serialize back
//! the way they arrived.

use prism_core::types::{EntityKind, PowerState, Reference};
use prism_core::uuid::EntityUuid;
use prism_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unmodelled keys, carried through unchanged.
pub type Extra = Map<String, Value>;

/// An optional field that remembers whether it was absent (`None`) or `null`
/// (`Some(None)`).
pub type Nullable<T> = Option<Option<T>>;

fn present<T>(field: &Nullable<T>) -> Option<&T> {
    field.as_ref().and_then(Option::as_ref)
}

fn present_or_default<T: Default>(field: &mut Nullable<T>) -> &mut T {
    field.get_or_insert(None).get_or_insert_with(T::default)
}

/// `{api_version, metadata, spec, status}` envelope shared by every entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument<S> {
    /// Schema version marker
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Kind tag, uuid and server bookkeeping
    pub metadata: Metadata,
    /// Client-owned desired state
    pub spec: S,
    /// Server-owned observed state; must not be echoed back on update
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub status: Nullable<Value>,
    /// Remaining top-level keys
    #[serde(flatten)]
    pub extra: Extra,
}

/// The `metadata` subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Kind tag, e.g. `vm`
    pub kind: String,
    /// Server-assigned uuid, absent before creation
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub uuid: Nullable<String>,
    /// `spec_version`, categories, owner and the like
    #[serde(flatten)]
    pub extra: Extra,
}

impl Metadata {
    /// Metadata for a document that has not been created yet.
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        Self {
            kind: kind.name().to_string(),
            ..Self::default()
        }
    }

    /// The uuid, when set.
    #[must_use]
    pub fn uuid(&self) -> Option<&str> {
        present(&self.uuid).map(String::as_str)
    }
}

/// Spec of a VM document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmSpec {
    /// VM name
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub name: Nullable<String>,
    /// Free-form description
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub description: Nullable<String>,
    /// Sizing, power and device lists
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub resources: Nullable<VmResources>,
    /// Cluster the VM is placed on
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub cluster_reference: Nullable<Reference>,
    /// Remaining spec keys
    #[serde(flatten)]
    pub extra: Extra,
}

impl VmSpec {
    /// The VM name, when set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        present(&self.name).map(String::as_str)
    }

    /// The description, when set.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        present(&self.description).map(String::as_str)
    }

    /// The resources subtree, when set.
    #[must_use]
    pub fn resources(&self) -> Option<&VmResources> {
        present(&self.resources)
    }

    /// The resources subtree, created empty if absent or `null`.
    pub fn resources_mut(&mut self) -> &mut VmResources {
        present_or_default(&mut self.resources)
    }

    /// The cluster placement, when set.
    #[must_use]
    pub fn cluster_reference(&self) -> Option<&Reference> {
        present(&self.cluster_reference)
    }
}

/// `spec.resources` of a VM document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmResources {
    /// Memory in MiB
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub memory_size_mib: Nullable<u64>,
    /// Socket count
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub num_sockets: Nullable<u32>,
    /// vCPUs per socket
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub num_vcpus_per_socket: Nullable<u32>,
    /// Power state, kept as the wire string
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub power_state: Nullable<String>,
    /// Hardware clock timezone
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub hardware_clock_timezone: Nullable<String>,
    /// Attached disks; an empty list is kept distinct from an absent one
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub disk_list: Nullable<Vec<Disk>>,
    /// Attached NICs
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub nic_list: Nullable<Vec<Nic>>,
    /// Remaining resource keys
    #[serde(flatten)]
    pub extra: Extra,
}

impl VmResources {
    /// Memory in MiB.
    #[must_use]
    pub fn memory_size_mib(&self) -> Option<u64> {
        present(&self.memory_size_mib).copied()
    }

    /// Socket count.
    #[must_use]
    pub fn num_sockets(&self) -> Option<u32> {
        present(&self.num_sockets).copied()
    }

    /// vCPUs per socket.
    #[must_use]
    pub fn num_vcpus_per_socket(&self) -> Option<u32> {
        present(&self.num_vcpus_per_socket).copied()
    }

    /// Power state wire string.
    #[must_use]
    pub fn power_state(&self) -> Option<&str> {
        present(&self.power_state).map(String::as_str)
    }

    /// Hardware clock timezone.
    #[must_use]
    pub fn hardware_clock_timezone(&self) -> Option<&str> {
        present(&self.hardware_clock_timezone).map(String::as_str)
    }

    /// Attached disks, empty when the list is absent or `null`.
    #[must_use]
    pub fn disks(&self) -> &[Disk] {
        present(&self.disk_list).map(Vec::as_slice).unwrap_or_default()
    }

    /// Attached NICs, empty when the list is absent or `null`.
    #[must_use]
    pub fn nics(&self) -> &[Nic] {
        present(&self.nic_list).map(Vec::as_slice).unwrap_or_default()
    }

    /// The disk list, created empty if absent or `null`.
    pub fn disks_mut(&mut self) -> &mut Vec<Disk> {
        present_or_default(&mut self.disk_list)
    }

    /// The NIC list, created empty if absent or `null`.
    pub fn nics_mut(&mut self) -> &mut Vec<Nic> {
        present_or_default(&mut self.nic_list)
    }
}

/// One entry of `disk_list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    /// Image the disk is cloned from
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub data_source_reference: Nullable<Reference>,
    /// Device type and adapter
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub device_properties: Nullable<DeviceProperties>,
    /// Remaining disk keys
    #[serde(flatten)]
    pub extra: Extra,
}

impl Disk {
    /// A disk backed by an unresolved image.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            data_source_reference: Some(Some(Reference::placeholder(EntityKind::Image))),
            device_properties: Some(Some(DeviceProperties::disk())),
            extra: Extra::new(),
        }
    }

    /// The image reference, when set.
    #[must_use]
    pub fn data_source_reference(&self) -> Option<&Reference> {
        present(&self.data_source_reference)
    }
}

/// `device_properties` of a disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceProperties {
    /// `DISK` or `CDROM`
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub device_type: Nullable<String>,
    /// Remaining keys
    #[serde(flatten)]
    pub extra: Extra,
}

impl DeviceProperties {
    /// Properties of a plain disk device.
    #[must_use]
    pub fn disk() -> Self {
        Self {
            device_type: Some(Some("DISK".to_string())),
            extra: Extra::new(),
        }
    }
}

/// One entry of `nic_list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nic {
    /// Subnet the NIC is attached to
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub subnet_reference: Nullable<Reference>,
    /// Remaining NIC keys
    #[serde(flatten)]
    pub extra: Extra,
}

impl Nic {
    /// A NIC attached to an unresolved subnet.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            subnet_reference: Some(Some(Reference::placeholder(EntityKind::Subnet))),
            extra: Extra::new(),
        }
    }

    /// The subnet reference, when set.
    #[must_use]
    pub fn subnet_reference(&self) -> Option<&Reference> {
        present(&self.subnet_reference)
    }
}

/// Spec of image, subnet and cluster documents: only the naming fields are modelled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericSpec {
    /// Entity name
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub name: Nullable<String>,
    /// Free-form description
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_with::rust::double_option"
    )]
    pub description: Nullable<String>,
    /// Remaining spec keys
    #[serde(flatten)]
    pub extra: Extra,
}

impl GenericSpec {
    /// The entity name, when set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        present(&self.name).map(String::as_str)
    }
}

/// A VM document.
pub type VmDocument = EntityDocument<VmSpec>;

/// A remote resource as returned by a get or list call.
///
/// `uuid` is present if and only if the entity exists on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Kind of the entity
    pub kind: EntityKind,
    /// Server-assigned identifier
    pub uuid: Option<EntityUuid>,
    /// Name from the spec, falling back to the status
    pub name: Option<String>,
    /// The full server document
    pub raw: Value,
}

impl Entity {
    /// Wrap a server document of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object.
    pub fn from_raw(kind: EntityKind, raw: Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::InvalidResponse(format!(
                "Expected a {kind} document, got {raw}"
            )));
        }
        let uuid = raw
            .pointer("/metadata/uuid")
            .and_then(Value::as_str)
            .filter(|uuid| !uuid.is_empty())
            .and_then(|uuid| uuid.parse().ok());
        let name = raw
            .pointer("/spec/name")
            .and_then(Value::as_str)
            .or_else(|| raw.pointer("/status/name").and_then(Value::as_str))
            .map(str::to_string);
        Ok(Self {
            kind,
            uuid,
            name,
            raw,
        })
    }

    /// Parse the raw document into a typed overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match `S`.
    pub fn document<S>(&self) -> Result<EntityDocument<S>>
    where
        S: DeserializeOwned,
    {
        serde_json::from_value(self.raw.clone()).map_err(|err| {
            Error::InvalidResponse(format!("Malformed {} document: {err}", self.kind))
        })
    }
}

/// Envelope of a list call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    /// Matching documents in server order
    #[serde(default)]
    pub entities: Vec<Value>,
    /// Paging and filter echo
    #[serde(default)]
    pub metadata: Option<ListMetadata>,
}

/// Paging echo of a list call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMetadata {
    /// Number of entities matching the filter across all pages
    #[serde(default)]
    pub total_matches: Option<u32>,
    /// Other keys
    #[serde(flatten)]
    pub extra: Extra,
}

/// A VM as seen by callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Vm {
    /// VM name
    pub name: String,
    /// Server-assigned identifier
    pub uuid: EntityUuid,
    /// Power state as reported by the spec
    pub power_state: Option<String>,
    /// Socket count
    pub num_sockets: Option<u32>,
    /// Memory in MiB
    pub memory_size_mib: Option<u64>,
    /// vCPUs per socket
    pub num_vcpus_per_socket: Option<u32>,
    /// Hardware clock timezone
    pub hardware_clock_timezone: Option<String>,
    /// The typed document, used as the base of updates
    pub document: VmDocument,
}

impl Vm {
    /// Build the view from a VM entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity has no uuid or is not a VM document.
    pub fn from_entity(entity: &Entity) -> Result<Self> {
        let uuid = entity.uuid.clone().ok_or_else(|| {
            Error::InvalidResponse("VM document has no metadata.uuid".to_string())
        })?;
        let document: VmDocument = entity.document()?;
        let resources = document.spec.resources();
        Ok(Self {
            name: entity.name.clone().unwrap_or_default(),
            uuid,
            power_state: resources
                .and_then(VmResources::power_state)
                .map(str::to_string),
            num_sockets: resources.and_then(VmResources::num_sockets),
            memory_size_mib: resources.and_then(VmResources::memory_size_mib),
            num_vcpus_per_socket: resources.and_then(VmResources::num_vcpus_per_socket),
            hardware_clock_timezone: resources
                .and_then(VmResources::hardware_clock_timezone)
                .map(str::to_string),
            document,
        })
    }

    /// Power state parsed into the known values.
    #[must_use]
    pub fn power(&self) -> Option<PowerState> {
        self.power_state.as_deref().and_then(|state| state.parse().ok())
    }
}
