//! VM operations.
//!
//! Each mutation is a submit: it returns the [`Task`] handle as soon as the server
//! accepts the call. Waiting is a separate, explicit step through
//! [`VmService::tasks`].

use prism_core::query::{FilterBuilder, ListQuery};
use prism_core::types::{EntityKind, PowerState};
use prism_core::uuid::{EntityUuid, UuidPolicy};
use prism_core::{Error, Result};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::models::{Entity, Vm, VmDocument};
use crate::payload::{self, VmPatch};
use crate::resolver::EntityResolver;
use crate::task::{Task, TaskTracker};
use crate::transport::{ApiRequest, Transport};

/// VM lifecycle operations over a [`Transport`].
#[derive(Clone)]
pub struct VmService {
    resolver: EntityResolver,
    tracker: TaskTracker,
    policy: UuidPolicy,
}

impl VmService {
    /// Create the service dispatching through `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            resolver: EntityResolver::new(Arc::clone(&transport)),
            tracker: TaskTracker::new(transport),
            policy: UuidPolicy::default(),
        }
    }

    /// Set the identifier checking policy.
    #[must_use]
    pub fn with_policy(mut self, policy: UuidPolicy) -> Self {
        self.resolver = self.resolver.with_policy(policy);
        self.policy = policy;
        self
    }

    /// The resolver used for name lookups.
    #[must_use]
    pub const fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// The tracker used to wait on returned tasks.
    #[must_use]
    pub const fn tasks(&self) -> &TaskTracker {
        &self.tracker
    }

    /// List every VM.
    ///
    /// # Errors
    ///
    /// Returns transport errors or `InvalidResponse` for a malformed VM document.
    pub async fn list_vms(&self) -> Result<Vec<Vm>> {
        let entities = self
            .resolver
            .list(EntityKind::Vm, &ListQuery::all(EntityKind::Vm))
            .await?;
        entities.iter().map(Vm::from_entity).collect()
    }

    /// Fetch a VM by uuid.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUuid` or the transport error.
    pub async fn get_vm(&self, uuid: &str) -> Result<Vm> {
        let entity = self.resolver.resolve_by_uuid(EntityKind::Vm, uuid).await?;
        Vm::from_entity(&entity)
    }

    /// Fetch the single VM named `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, or `Ambiguous` with every VM sharing the name.
    pub async fn get_vm_by_name(&self, name: &str) -> Result<Vm> {
        let entity = self
            .resolver
            .resolve_entity_by_name(EntityKind::Vm, name)
            .await?;
        Vm::from_entity(&entity)
    }

    /// Submit a creation document built by [`crate::payload::VmPayloadBuilder`].
    ///
    /// # Errors
    ///
    /// Returns the transport error or `InvalidResponse` without a task reference.
    pub async fn create_vm(&self, document: &VmDocument) -> Result<Task> {
        info!(name = document.spec.name().unwrap_or_default(), "creating VM");
        let body = payload::to_body(document)?;
        self.tracker
            .submit(ApiRequest::post(EntityKind::Vm.collection_path(), body))
            .await
    }

    /// Apply `changes` to `vm` and submit the update.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty patch or an out-of-range field, or the
    /// transport error.
    pub async fn update_vm(&self, vm: &Vm, changes: &VmPatch) -> Result<Task> {
        if changes.is_empty() {
            return Err(Error::ValidationError(format!(
                "No changes supplied for VM {}",
                vm.uuid
            )));
        }
        changes.validate()?;
        info!(vm = %vm.uuid, "updating VM");
        let document = payload::patch(vm.document.clone(), changes);
        let body = payload::to_body(&document)?;
        self.tracker
            .submit(ApiRequest::put(EntityKind::Vm.entity_path(vm.uuid.as_str()), body))
            .await
    }

    /// Power the VM on.
    ///
    /// # Errors
    ///
    /// See [`Self::update_vm`].
    pub async fn power_on(&self, vm: &Vm) -> Result<Task> {
        self.update_vm(vm, &VmPatch::power(PowerState::On)).await
    }

    /// Power the VM off.
    ///
    /// # Errors
    ///
    /// See [`Self::update_vm`].
    pub async fn power_off(&self, vm: &Vm) -> Result<Task> {
        self.update_vm(vm, &VmPatch::power(PowerState::Off)).await
    }

    /// Delete the VM `uuid`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUuid` or the transport error.
    pub async fn delete_vm(&self, uuid: &str) -> Result<Task> {
        let uuid = EntityUuid::parse_with(uuid, self.policy)?;
        info!(vm = %uuid, "deleting VM");
        self.tracker
            .submit(ApiRequest::delete(EntityKind::Vm.entity_path(uuid.as_str())))
            .await
    }

    /// Delete the single VM named `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `Ambiguous` without deleting anything.
    pub async fn delete_vm_by_name(&self, name: &str) -> Result<Task> {
        let uuid = self.resolver.resolve_by_name(EntityKind::Vm, name).await?;
        self.delete_vm(uuid.as_str()).await
    }

    /// List entities of any kind, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns transport errors.
    pub async fn list_entities(
        &self,
        kind: EntityKind,
        filter: Option<FilterBuilder>,
    ) -> Result<Vec<Entity>> {
        let mut query = ListQuery::all(kind);
        if let Some(filter) = filter {
            query = query.with_filter(filter);
        }
        self.resolver.list(kind, &query).await
    }
}
