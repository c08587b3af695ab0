//! # lifecycle
//!
//! Host maintenance lifecycle engine.
//!
//! Every host of an inventory goes through the same sequence:
//!
//! 1. **Evacuate** - every configured service handler takes its workload
//!    off the host, in order, stopping at the first failure
//! 2. **Update** - only if evacuation fully succeeded, every update action
//!    runs in order; a failed action does not stop the following ones
//! 3. **Restore** - always, every service handler brings its workload back
//!
//! The outcome of each host is recorded in [`Results`]. A [`Strategy`]
//! decides whether hosts run one at a time or on a bounded worker pool.
//!
//! Collaborators are looked up by name in registries
//! ([`ServiceRegistry`], [`UpdaterRegistry`], [`DiscovererRegistry`]) and
//! built from declarations: a bare name (`"apt"`) or a single-key mapping
//! (`{"reboot": {"wait": true}}`).

#![warn(clippy::all)]

pub mod args;
pub mod context;
pub mod declaration;
pub mod error;
pub mod executor;
pub mod plugin;
pub mod registry;
pub mod result;
pub mod strategy;
pub mod wait;

pub use args::{PluginArgs, positive_int, truthy};
pub use context::{HostPhase, NoProgress, PhaseCallback};
pub use declaration::Declaration;
pub use error::{Error, ErrorCategory, Result};
pub use executor::Executor;
pub use plugin::{Discoverer, HostContext, Inventory, ServiceHandler, Updater};
pub use registry::{
    DiscovererFactory, DiscovererRegistry, PluginKind, Registry, ServiceFactory, ServiceRegistry,
    UpdaterFactory, UpdaterRegistry,
};
pub use result::{HostResult, HostStatus, Results, Tally};
pub use strategy::{DEFAULT_PARALLELISM, Strategy};
pub use wait::{WaitConfig, wait_until};
