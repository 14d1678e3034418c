//! aoltd - abstract OLT chassis registry daemon
//!
//! Keeps one chassis record per site, serializes every mutation of a site
//! behind that site's lock, drives the external provisioning system through a
//! [`Provisioner`] and persists dirty records through a [`SnapshotSink`].
//!
//! - [`registry`]: the site map, the per-site gate and every operation
//! - [`provisioner`]: the provisioning collaborator and its dry-run form
//! - [`sink`]: snapshot sinks (backup directory, memory)
//! - [`flush`]: the periodic and on-demand flusher
//! - [`inventory`]: JSON-friendly inventory views
//! - [`config`]: TOML daemon configuration

pub mod config;
pub mod error;
pub mod flush;
pub mod inventory;
pub mod provisioner;
pub mod registry;
pub mod sink;

pub use config::{DaemonConfig, SinkKind};
pub use error::{ProvisionerError, RegistryError, RegistryResult, SinkError};
pub use flush::{FlushHandle, Flusher};
pub use inventory::ChassisInventory;
pub use provisioner::{DryRunProvisioner, Provisioner, ProvisionerCall, RecordingProvisioner};
pub use registry::{
    AttachLineCard, CreateChassis, FlushReport, ReflowReport, Registry, RestoreReport,
};
pub use sink::{DirectorySink, MemorySink, SnapshotSink};
