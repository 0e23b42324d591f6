//! Core Prism domain types.
//!
//! This module provides the entity kinds addressed by the v3 API, the reference triple
//! used to link entities inside a payload, and the task and power state enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default Prism v3 port.
pub const DEFAULT_PRISM_PORT: u16 = 9440;
/// Path prefix of the v3 API.
pub const API_PATH_PREFIX: &str = "/api/nutanix/v3";
/// Schema version sent with creation payloads.
pub const CREATE_API_VERSION: &str = "3.0";
/// Schema version required by mutation (update) calls.
pub const MUTATION_API_VERSION: &str = "3.1";

/// Entity kinds managed through the v3 API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Virtual machine
    Vm,
    /// Disk image
    Image,
    /// Subnet (network)
    Subnet,
    /// Cluster
    Cluster,
}

impl EntityKind {
    /// Returns the kind tag used in `metadata.kind` and references.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Image => "image",
            Self::Subnet => "subnet",
            Self::Cluster => "cluster",
        }
    }

    /// Returns the collection path, e.g. `/vms`.
    #[must_use]
    pub const fn collection_path(&self) -> &'static str {
        match self {
            Self::Vm => "/vms",
            Self::Image => "/images",
            Self::Subnet => "/subnets",
            Self::Cluster => "/clusters",
        }
    }

    /// Returns the list endpoint path, e.g. `/vms/list`.
    #[must_use]
    pub const fn list_path(&self) -> &'static str {
        match self {
            Self::Vm => "/vms/list",
            Self::Image => "/images/list",
            Self::Subnet => "/subnets/list",
            Self::Cluster => "/clusters/list",
        }
    }

    /// Returns the path of a single entity.
    #[must_use]
    pub fn entity_path(&self, uuid: &str) -> String {
        format!("{}/{uuid}", self.collection_path())
    }

    /// Returns the filter attribute holding the entity name.
    #[must_use]
    pub const fn name_filter_field(&self) -> &'static str {
        match self {
            Self::Vm => "vm_name",
            Self::Image | Self::Subnet | Self::Cluster => "name",
        }
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vm" => Ok(Self::Vm),
            "image" => Ok(Self::Image),
            "subnet" => Ok(Self::Subnet),
            "cluster" => Ok(Self::Cluster),
            _ => Err(Error::ValidationError(format!("Unknown entity kind: {s}"))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Pointer from one entity's spec to another entity.
///
/// A lookup key only; it does not imply ownership. The kind is kept as the wire
/// string so server documents referencing kinds outside [`EntityKind`] still parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Kind tag of the referenced entity
    pub kind: String,
    /// Uuid of the referenced entity, absent in placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Name of the referenced entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Remaining keys, carried through unchanged
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Reference {
    /// A reference carrying only its kind.
    #[must_use]
    pub fn placeholder(kind: EntityKind) -> Self {
        Self {
            kind: kind.name().to_string(),
            uuid: None,
            name: None,
            extra: serde_json::Map::new(),
        }
    }

    /// A reference to a known uuid.
    #[must_use]
    pub fn to_uuid(kind: EntityKind, uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            ..Self::placeholder(kind)
        }
    }

    /// Attach the referenced entity's name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The referenced kind, if it is one this crate knows.
    #[must_use]
    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.kind.parse().ok()
    }
}

/// Status of an asynchronous task.
///
/// `Queued -> Running -> {Succeeded | Failed | Aborted}`; the last three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Accepted but not started
    Queued,
    /// In progress
    Running,
    /// Completed successfully
    Succeeded,
    /// Completed with an error
    Failed,
    /// Stopped before completion
    Aborted,
}

impl TaskStatus {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Aborted => "ABORTED",
        }
    }

    /// Returns true for `Succeeded`, `Failed` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Aborted)
    }

    /// Position in the state machine; terminal states share the highest rank.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Succeeded | Self::Failed | Self::Aborted => 2,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "QUEUED" | "PENDING" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "ABORTED" => Ok(Self::Aborted),
            _ => Err(Error::InvalidResponse(format!("Unknown task status: {s}"))),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired power state of a VM.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    /// Powered on
    On,
    /// Powered off
    #[default]
    Off,
}

impl PowerState {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl FromStr for PowerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            _ => Err(Error::ValidationError(format!("Unknown power state: {s}"))),
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
