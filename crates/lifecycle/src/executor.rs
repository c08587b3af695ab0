//! Host lifecycle executor - evacuate, update, restore one host

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info, warn};
use serde_json::Value;
use templating::TemplateEngine;

use crate::context::{HostPhase, NoProgress, PhaseCallback};
use crate::declaration::Declaration;
use crate::error::{Error, Result};
use crate::plugin::{HostContext, ServiceHandler};
use crate::registry::{ServiceRegistry, UpdaterRegistry};
use crate::result::{HostResult, Results};

/// Runs the maintenance lifecycle of single hosts.
///
/// The executor holds only shared, read-only state (registries, templates,
/// job defaults), so one instance serves every worker of a strategy.
pub struct Executor<'a> {
    services: &'a ServiceRegistry,
    updaters: &'a UpdaterRegistry,
    templates: &'a TemplateEngine,
    default_services: Vec<Value>,
    default_updates: Vec<Value>,
    progress: &'a dyn PhaseCallback,
}

impl<'a> Executor<'a> {
    /// Create an executor with empty default service and update lists.
    pub fn new(
        services: &'a ServiceRegistry,
        updaters: &'a UpdaterRegistry,
        templates: &'a TemplateEngine,
    ) -> Self {
        Self {
            services,
            updaters,
            templates,
            default_services: Vec::new(),
            default_updates: Vec::new(),
            progress: &NoProgress,
        }
    }

    /// Job-level service declarations, used unless a host overrides them.
    pub fn with_services(mut self, services: Vec<Value>) -> Self {
        self.default_services = services;
        self
    }

    /// Job-level update declarations, used unless a host overrides them.
    pub fn with_updates(mut self, updates: Vec<Value>) -> Self {
        self.default_updates = updates;
        self
    }

    /// Receive phase transitions.
    pub fn with_progress(mut self, progress: &'a dyn PhaseCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Run the full lifecycle of `host` and store its record in `results`.
    ///
    /// Never fails and never panics: configuration problems, operational
    /// failures and faults inside collaborators all end up in `failed`.
    pub fn run(&self, host: &str, args: &Value, results: &Results) -> HostResult {
        let mut result = HostResult::default();
        self.progress.on_phase(host, HostPhase::Pending);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.lifecycle(host, args, &mut result);
        }));
        if let Err(payload) = outcome {
            error!(
                "[{host}] An unhandled fault occurred: {}",
                panic_message(payload.as_ref())
            );
            result.failed += 1;
        }

        results.record(host, result);
        self.progress.on_phase(host, HostPhase::Done);
        self.progress.on_host_complete(host, &result);
        info!("[{host}] Done: {result}");

        result
    }

    fn lifecycle(&self, host: &str, args: &Value, result: &mut HostResult) {
        info!("[{host}] Starting, arguments: {args}");
        let ctx = HostContext::new(host, args, self.templates);

        let mut handlers = match self.resolve_services(&ctx) {
            Ok(handlers) => handlers,
            Err(e) => {
                error!("[{host}] Cannot set up services: {}", describe(&e));
                result.failed += 1;
                return;
            }
        };

        self.progress.on_phase(host, HostPhase::Evacuating);
        if evacuate(host, &mut handlers, result) {
            self.progress.on_phase(host, HostPhase::Updating);
            self.update(&ctx, result);
        } else {
            self.progress.on_phase(host, HostPhase::SkippedUpdate);
            warn!("[{host}] Skipping updates, evacuation failed");
        }

        self.progress.on_phase(host, HostPhase::Restoring);
        restore(host, &mut handlers, result);
    }

    /// Build one handler per service declaration (host list replaces job list).
    fn resolve_services(&self, ctx: &HostContext<'_>) -> Result<Vec<Box<dyn ServiceHandler>>> {
        let entries = effective_list(ctx, "services", &self.default_services)?;

        entries
            .iter()
            .map(|entry| {
                let decl = Declaration::parse(entry)?;
                shielded(|| self.services.build(ctx, &decl))
            })
            .collect()
    }

    /// Run every update action in order; failures do not stop the sequence.
    fn update(&self, ctx: &HostContext<'_>, result: &mut HostResult) {
        let host = ctx.host();
        let entries = match effective_list(ctx, "updates", &self.default_updates) {
            Ok(entries) => entries,
            Err(e) => {
                error!("[{host}] Cannot set up updates: {}", describe(&e));
                result.failed += 1;
                return;
            }
        };

        for entry in entries {
            info!("[{host}] Running update action: {entry}");

            let ok = match Declaration::parse(entry).and_then(|decl| {
                shielded(|| self.updaters.build(ctx, &decl))
            }) {
                Ok(mut updater) => {
                    debug!("[{host}] Updater {updater:?}");
                    let name = updater.name().to_string();
                    report(host, &format!("update action {name}"), guarded(|| updater.update()))
                }
                Err(e) => {
                    error!("[{host}] Invalid update action {entry}: {}", describe(&e));
                    false
                }
            };

            if ok {
                result.updated += 1;
            } else {
                result.failed += 1;
            }
        }
    }
}

/// Evacuate handlers in order, stopping at the first failure.
fn evacuate(host: &str, handlers: &mut [Box<dyn ServiceHandler>], result: &mut HostResult) -> bool {
    for handler in handlers.iter_mut() {
        info!("[{host}] Evacuating {} {handler:?}", handler.name());
        let name = handler.name().to_string();
        if !report(host, &format!("evacuate service {name}"), guarded(|| handler.evacuate())) {
            result.failed += 1;
            return false;
        }
    }

    result.evacuated = true;
    true
}

/// Restore every handler; failures are counted but do not stop the sequence.
fn restore(host: &str, handlers: &mut [Box<dyn ServiceHandler>], result: &mut HostResult) {
    for handler in handlers.iter_mut() {
        info!("[{host}] Restoring {} {handler:?}", handler.name());
        let name = handler.name().to_string();
        if !report(host, &format!("restore service {name}"), guarded(|| handler.restore())) {
            result.failed += 1;
        }
    }

    result.restored = true;
}

/// The host's own declaration list for `key`, or the job default.
fn effective_list<'v>(ctx: &HostContext<'v>, key: &str, default: &'v [Value]) -> Result<&'v [Value]> {
    match ctx.arg(key) {
        None => Ok(default),
        Some(Value::Array(entries)) => Ok(entries.as_slice()),
        Some(_) => Err(Error::InvalidHostList {
            host: ctx.host().to_string(),
            key: key.to_string(),
        }),
    }
}

/// Log the outcome of one collaborator call and reduce it to success/failure.
fn report(host: &str, what: &str, outcome: anyhow::Result<bool>) -> bool {
    match outcome {
        Ok(true) => true,
        Ok(false) => {
            error!("[{host}] Failed to {what}");
            false
        }
        Err(e) => {
            error!("[{host}] Failed to {what}: {e:#}");
            false
        }
    }
}

/// Run a collaborator operation, turning a panic into an error.
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(anyhow::anyhow!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))
    })
}

/// Run a factory, turning a panic into [`Error::Fault`].
fn shielded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(Error::Fault(panic_message(payload.as_ref())))
    })
}

/// Error text prefixed with its category, e.g. `Configuration error: ...`.
fn describe(error: &Error) -> String {
    format!("{}: {error}", error.category())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
