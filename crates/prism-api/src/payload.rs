//! Creation and update payloads.
//!
//! [`build`] turns typed creation fields into the minimal creation document for a
//! kind; [`patch`] overlays caller-supplied changes on a server document. Neither
//! performs I/O. The only asynchronous operations here are the `attach_*_by_name`
//! mutators, which resolve the name first and leave the document untouched when
//! resolution fails.

use prism_core::types::{EntityKind, PowerState, Reference, CREATE_API_VERSION, MUTATION_API_VERSION};
use prism_core::uuid::EntityUuid;
use prism_core::Result;
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::models::{Disk, EntityDocument, Extra, GenericSpec, Metadata, Nic, VmDocument, VmResources, VmSpec};
use crate::resolver::EntityResolver;

/// Default memory of a new VM, in MiB.
pub const DEFAULT_MEMORY_MIB: u64 = 1024;
/// Default socket count of a new VM.
pub const DEFAULT_SOCKETS: u32 = 1;
/// Default vCPUs per socket of a new VM.
pub const DEFAULT_VCPUS_PER_SOCKET: u32 = 1;

/// A spec that can be created from typed fields.
pub trait CreatableSpec: Sized {
    /// Kind tag written to `metadata.kind`
    const KIND: EntityKind;
    /// Caller-supplied creation fields
    type Fields: Validate;

    /// Build the spec subtree from validated fields.
    fn from_fields(fields: Self::Fields) -> Self;
}

/// A spec that can be overlaid with caller-supplied changes.
pub trait SpecPatch {
    /// Changes to apply; `None` fields are left alone
    type Patch;

    /// Overwrite exactly the fields set in `patch`.
    fn apply(&mut self, patch: &Self::Patch);
}

/// Build the creation document for `S`.
///
/// # Errors
///
/// Returns `ValidationError` if the fields are out of range.
pub fn build<S>(fields: S::Fields) -> Result<EntityDocument<S>>
where
    S: CreatableSpec,
{
    fields.validate()?;
    Ok(EntityDocument {
        api_version: CREATE_API_VERSION.to_string(),
        metadata: Metadata::for_kind(S::KIND),
        spec: S::from_fields(fields),
        status: None,
        extra: Extra::new(),
    })
}

/// Prepare a server document for an update call.
///
/// Overwrites only what `changes` sets, advances `api_version` to the mutation
/// schema and strips the server-owned `status` subtree.
#[must_use]
pub fn patch<S>(mut document: EntityDocument<S>, changes: &S::Patch) -> EntityDocument<S>
where
    S: SpecPatch,
{
    document.spec.apply(changes);
    document.api_version = MUTATION_API_VERSION.to_string();
    document.status = None;
    document
}

/// Serialize a document as a request body.
///
/// # Errors
///
/// Returns an error if the document cannot be represented as JSON.
pub fn to_body<S>(document: &EntityDocument<S>) -> Result<Value>
where
    S: Serialize,
{
    Ok(serde_json::to_value(document)?)
}

/// Creation fields of a VM.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct VmFields {
    /// VM name
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Memory in MiB
    #[validate(range(min = 1))]
    pub memory_size_mib: u64,
    /// Socket count
    #[validate(range(min = 1))]
    pub num_sockets: u32,
    /// vCPUs per socket
    #[validate(range(min = 1))]
    pub num_vcpus_per_socket: u32,
    /// Initial power state
    pub power_state: PowerState,
}

impl VmFields {
    /// Fields for a VM named `name` with the default sizing, powered off.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            memory_size_mib: DEFAULT_MEMORY_MIB,
            num_sockets: DEFAULT_SOCKETS,
            num_vcpus_per_socket: DEFAULT_VCPUS_PER_SOCKET,
            power_state: PowerState::Off,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the memory size in MiB.
    #[must_use]
    pub const fn with_memory_mib(mut self, memory: u64) -> Self {
        self.memory_size_mib = memory;
        self
    }

    /// Set the socket count.
    #[must_use]
    pub const fn with_sockets(mut self, sockets: u32) -> Self {
        self.num_sockets = sockets;
        self
    }

    /// Set the vCPUs per socket.
    #[must_use]
    pub const fn with_vcpus_per_socket(mut self, vcpus: u32) -> Self {
        self.num_vcpus_per_socket = vcpus;
        self
    }

    /// Set the initial power state.
    #[must_use]
    pub const fn with_power_state(mut self, state: PowerState) -> Self {
        self.power_state = state;
        self
    }
}

impl CreatableSpec for VmSpec {
    const KIND: EntityKind = EntityKind::Vm;
    type Fields = VmFields;

    fn from_fields(fields: VmFields) -> Self {
        Self {
            name: Some(Some(fields.name)),
            description: fields.description.map(Some),
            resources: Some(Some(VmResources {
                memory_size_mib: Some(Some(fields.memory_size_mib)),
                num_sockets: Some(Some(fields.num_sockets)),
                num_vcpus_per_socket: Some(Some(fields.num_vcpus_per_socket)),
                power_state: Some(Some(fields.power_state.as_str().to_string())),
                disk_list: Some(Some(vec![Disk::placeholder()])),
                nic_list: Some(Some(vec![Nic::placeholder()])),
                ..VmResources::default()
            })),
            cluster_reference: None,
            extra: Extra::new(),
        }
    }
}

/// Changes applied to a VM by an update call.
///
/// Set fields are checked against the same ranges as [`VmFields`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct VmPatch {
    /// New name
    #[validate(length(min = 1, max = 80))]
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New memory size in MiB
    #[validate(range(min = 1))]
    pub memory_size_mib: Option<u64>,
    /// New socket count
    #[validate(range(min = 1))]
    pub num_sockets: Option<u32>,
    /// New vCPUs per socket
    #[validate(range(min = 1))]
    pub num_vcpus_per_socket: Option<u32>,
    /// New power state
    pub power_state: Option<PowerState>,
}

impl VmPatch {
    /// A patch changing only the power state.
    #[must_use]
    pub fn power(state: PowerState) -> Self {
        Self {
            power_state: Some(state),
            ..Self::default()
        }
    }

    /// Returns true if the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl SpecPatch for VmSpec {
    type Patch = VmPatch;

    fn apply(&mut self, patch: &VmPatch) {
        if let Some(name) = &patch.name {
            self.name = Some(Some(name.clone()));
        }
        if let Some(description) = &patch.description {
            self.description = Some(Some(description.clone()));
        }
        if let Some(memory) = patch.memory_size_mib {
            self.resources_mut().memory_size_mib = Some(Some(memory));
        }
        if let Some(sockets) = patch.num_sockets {
            self.resources_mut().num_sockets = Some(Some(sockets));
        }
        if let Some(vcpus) = patch.num_vcpus_per_socket {
            self.resources_mut().num_vcpus_per_socket = Some(Some(vcpus));
        }
        if let Some(state) = patch.power_state {
            self.resources_mut().power_state = Some(Some(state.as_str().to_string()));
        }
    }
}

/// Changes applied to an image, subnet or cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericPatch {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
}

impl SpecPatch for GenericSpec {
    type Patch = GenericPatch;

    fn apply(&mut self, patch: &GenericPatch) {
        if let Some(name) = &patch.name {
            self.name = Some(Some(name.clone()));
        }
        if let Some(description) = &patch.description {
            self.description = Some(Some(description.clone()));
        }
    }
}

/// Builds a VM creation document, attaching references one at a time.
///
/// Every mutator is idempotent: attaching the same reference twice yields the same
/// document.
#[derive(Debug, Clone, PartialEq)]
pub struct VmPayloadBuilder {
    document: VmDocument,
}

impl VmPayloadBuilder {
    /// Start from validated creation fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the fields are out of range.
    pub fn new(fields: VmFields) -> Result<Self> {
        Ok(Self {
            document: build::<VmSpec>(fields)?,
        })
    }

    /// Point the first disk at the image `uuid`.
    pub fn attach_image_by_uuid(&mut self, uuid: &EntityUuid) -> &mut Self {
        let disks = self.document.spec.resources_mut().disks_mut();
        if disks.is_empty() {
            disks.push(Disk::placeholder());
        }
        disks[0].data_source_reference =
            Some(Some(Reference::to_uuid(EntityKind::Image, uuid.as_str())));
        self
    }

    /// Resolve the image `name` and point the first disk at it.
    ///
    /// # Errors
    ///
    /// Returns the resolution error (`NotFound`, `Ambiguous`, ...) with the document
    /// unchanged; the caller must abandon the build.
    pub async fn attach_image_by_name(
        &mut self,
        resolver: &EntityResolver,
        name: &str,
    ) -> Result<&mut Self> {
        let uuid = resolver.resolve_by_name(EntityKind::Image, name).await?;
        Ok(self.attach_image_by_uuid(&uuid))
    }

    /// Attach the first NIC to the subnet `uuid`.
    pub fn attach_network_by_uuid(&mut self, uuid: &EntityUuid) -> &mut Self {
        let nics = self.document.spec.resources_mut().nics_mut();
        if nics.is_empty() {
            nics.push(Nic::placeholder());
        }
        nics[0].subnet_reference =
            Some(Some(Reference::to_uuid(EntityKind::Subnet, uuid.as_str())));
        self
    }

    /// Resolve the subnet `name` and attach the first NIC to it.
    ///
    /// # Errors
    ///
    /// Returns the resolution error with the document unchanged.
    pub async fn attach_network_by_name(
        &mut self,
        resolver: &EntityResolver,
        name: &str,
    ) -> Result<&mut Self> {
        let uuid = resolver.resolve_by_name(EntityKind::Subnet, name).await?;
        Ok(self.attach_network_by_uuid(&uuid))
    }

    /// Place the VM on `cluster`; `None` leaves `cluster_reference` absent.
    pub fn attach_cluster(&mut self, cluster: Option<Reference>) -> &mut Self {
        if let Some(cluster) = cluster {
            self.document.spec.cluster_reference = Some(Some(cluster));
        }
        self
    }

    /// Resolve the cluster `name` and place the VM on it.
    ///
    /// # Errors
    ///
    /// Returns the resolution error with the document unchanged.
    pub async fn attach_cluster_by_name(
        &mut self,
        resolver: &EntityResolver,
        name: &str,
    ) -> Result<&mut Self> {
        let uuid = resolver.resolve_by_name(EntityKind::Cluster, name).await?;
        let cluster = Reference::to_uuid(EntityKind::Cluster, uuid.into_string()).with_name(name);
        Ok(self.attach_cluster(Some(cluster)))
    }

    /// The document built so far.
    #[must_use]
    pub const fn document(&self) -> &VmDocument {
        &self.document
    }

    /// Finish the build.
    #[must_use]
    pub fn finish(self) -> VmDocument {
        self.document
    }
}
