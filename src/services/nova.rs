use anyhow::{Context, Result};
use lifecycle::{HostContext, PluginArgs, PluginKind, ServiceHandler, WaitConfig, wait_until};
use log::{debug, error, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::openstack::{OpenStack, Row};
use crate::runner::quote;

/// Seconds allowed per server for migrations to drain
const DEFAULT_TIMEOUT_PER_SERVER: u64 = 20;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The compute API operations the handler needs.
pub trait ComputeApi: Send + fmt::Debug {
    /// Enable or disable the nova-compute service; `false` if refused.
    fn set_service(&self, host: &str, enabled: bool) -> Result<bool>;

    /// Servers currently on the hypervisor.
    fn hypervisor_servers(&self, host: &str) -> Result<Vec<Row>>;

    /// Request live migration of every server.
    fn evacuate_live(&self, host: &str) -> Result<Vec<Row>>;

    /// Request cold migration of every server.
    fn migrate_servers(&self, host: &str) -> Result<Vec<Row>>;
}

impl ComputeApi for OpenStack {
    fn set_service(&self, host: &str, enabled: bool) -> Result<bool> {
        let flag = if enabled { "--enable" } else { "--disable" };
        let output = self.run(&format!(
            "openstack compute service set {} nova-compute {flag}",
            quote(host)
        ))?;
        if !output.success() {
            error!("[{host}] {}", output.stderr.trim());
        }
        Ok(output.success())
    }

    fn hypervisor_servers(&self, host: &str) -> Result<Vec<Row>> {
        self.table(&format!("nova hypervisor-servers {}", quote(host)))
    }

    fn evacuate_live(&self, host: &str) -> Result<Vec<Row>> {
        self.table(&format!("nova host-evacuate-live {}", quote(host)))
    }

    fn migrate_servers(&self, host: &str) -> Result<Vec<Row>> {
        self.table(&format!("nova host-servers-migrate {}", quote(host)))
    }
}

/// Drains a nova-compute hypervisor by migrating its servers away.
#[derive(Debug)]
pub struct NovaCompute<A = OpenStack> {
    host: String,
    api: A,
    skip_evacuate: bool,
    skip_restore: bool,
    timeout_per_server: Duration,
    interval: Duration,
}

pub fn build(
    ctx: &HostContext<'_>,
    args: &Value,
    openstack: OpenStack,
) -> lifecycle::Result<Box<dyn ServiceHandler>> {
    Ok(Box::new(NovaCompute::new(ctx, args, openstack)?))
}

/// Whether a migration request was accepted for one server.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Migration {
    Accepted,
    Rejected(String),
}

fn cell<'r>(row: &'r Row, column: &str) -> Result<&'r str> {
    row.get(column)
        .map(String::as_str)
        .with_context(|| format!("missing column \"{column}\" in {row:?}"))
}

impl<A: ComputeApi> NovaCompute<A> {
    pub fn new(ctx: &HostContext<'_>, args: &Value, api: A) -> lifecycle::Result<Self> {
        let plugin = PluginArgs::new(PluginKind::Service, "nova-compute", args);
        Ok(Self {
            host: ctx.fix_hostname(args)?,
            api,
            skip_evacuate: plugin.flag("skip_evacuate", false),
            skip_restore: plugin.flag("skip_restore", false),
            timeout_per_server: Duration::from_secs(
                plugin.positive_int_or("timeout", DEFAULT_TIMEOUT_PER_SERVER),
            ),
            interval: POLL_INTERVAL,
        })
    }

    /// Ask for every server to be moved: live first, cold for the rest.
    fn schedule_migrations(&self, servers: &[Row]) -> Result<BTreeMap<String, Migration>> {
        let mut migrations = BTreeMap::new();
        for server in servers {
            migrations.insert(
                cell(server, "ID")?.to_string(),
                Migration::Rejected("no migration scheduled".to_string()),
            );
        }

        for row in self.api.evacuate_live(&self.host)? {
            let id = cell(&row, "Server UUID")?.to_string();
            let outcome = if cell(&row, "Live Migration Accepted")? == "True" {
                Migration::Accepted
            } else {
                Migration::Rejected(cell(&row, "Error Message")?.to_string())
            };
            migrations.insert(id, outcome);
        }

        // Stopped servers cannot live-migrate; move them cold
        for row in self.api.migrate_servers(&self.host)? {
            let id = cell(&row, "Server UUID")?.to_string();
            if cell(&row, "Migration Accepted")? == "True" {
                migrations.insert(id, Migration::Accepted);
            } else if migrations.get(&id) != Some(&Migration::Accepted) {
                migrations.insert(id, Migration::Rejected(cell(&row, "Error Message")?.to_string()));
            }
        }

        Ok(migrations)
    }
}

impl<A: ComputeApi> ServiceHandler for NovaCompute<A> {
    fn name(&self) -> &str {
        "nova-compute"
    }

    fn evacuate(&mut self) -> Result<bool> {
        if self.skip_evacuate {
            return Ok(true);
        }
        let host = self.host.as_str();

        if !self.api.set_service(host, false)? {
            error!("[{host}] Could not disable nova-compute");
            return Ok(false);
        }

        let servers = self.api.hypervisor_servers(host)?;
        info!("[{host}] Migrating {} server(s)", servers.len());

        let rejected: BTreeMap<String, String> = self
            .schedule_migrations(&servers)?
            .into_iter()
            .filter_map(|(id, outcome)| match outcome {
                Migration::Accepted => None,
                Migration::Rejected(reason) => Some((id, reason)),
            })
            .collect();
        if !rejected.is_empty() {
            error!("[{host}] Migrations not accepted: {rejected:?}");
            return Ok(false);
        }

        let config = WaitConfig::scaled(self.timeout_per_server, servers.len(), self.interval);
        let waited = wait_until(&config, &format!("migrations off {host}"), || {
            let remaining = self.api.hypervisor_servers(host)?;
            debug!("[{host}] Waiting for migrations, {} remaining", remaining.len());
            Ok(remaining.is_empty())
        });

        match waited {
            Ok(elapsed) => {
                debug!("[{host}] All servers migrated in {}s", elapsed.as_secs());
                Ok(true)
            }
            Err(e) => {
                error!("[{host}] Some migrations did not finish: {e}");
                Ok(false)
            }
        }
    }

    fn restore(&mut self) -> Result<bool> {
        if self.skip_restore {
            return Ok(true);
        }
        self.api.set_service(&self.host, true)
    }
}
