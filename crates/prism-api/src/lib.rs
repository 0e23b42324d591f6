//! Request dispatch, payload building, name resolution and task tracking for the
//! Prism v3 API.
//!
//! A typical create flow resolves references, builds the payload, submits it and
//! waits on the returned task:
//!
//! ```no_run
//! use prism_api::{PrismClient, VmFields, VmPayloadBuilder};
//! use prism_core::client::PollPolicy;
//! use prism_core::config::{Credential, PrismConfig};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> prism_core::Result<()> {
//! let client = PrismClient::new(PrismConfig::new("prism.example.com")?, Credential::new("admin", "secret"))?;
//! let vms = client.vms();
//!
//! let mut builder = VmPayloadBuilder::new(VmFields::new("web01").with_memory_mib(2048))?;
//! builder.attach_image_by_name(vms.resolver(), "ubuntu-20.04").await?;
//!
//! let task = vms.create_vm(&builder.finish()).await?;
//! let policy = PollPolicy::new(Duration::from_secs(2)).with_timeout(Duration::from_secs(300));
//! vms.tasks().wait(&task, &policy, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

pub mod models;
pub mod payload;
pub mod resolver;
pub mod task;
pub mod transport;
pub mod vm;

pub use models::{Entity, EntityDocument, GenericSpec, Nullable, Vm, VmDocument, VmSpec};
pub use payload::{build, patch, GenericPatch, VmFields, VmPatch, VmPayloadBuilder};
pub use resolver::EntityResolver;
pub use task::{Task, TaskTracker};
pub use transport::{ApiRequest, PrismClient, PrismClientBuilder, Transport};
pub use vm::VmService;

/// Convenient result alias sharing the `prism-core` error type.
pub type Result<T> = prism_core::Result<T>;
