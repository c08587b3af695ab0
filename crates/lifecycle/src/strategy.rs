//! Scheduling strategies - how hosts of an inventory are processed.

use log::{error, info, warn};
use rayon::prelude::*;
use serde_json::Value;

use crate::args::PluginArgs;
use crate::declaration::Declaration;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::plugin::Inventory;
use crate::registry::PluginKind;
use crate::result::Results;

/// Number of hosts processed concurrently when `nparallel` is unusable.
pub const DEFAULT_PARALLELISM: usize = 2;

/// How hosts are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One host at a time, in inventory order
    Serial {
        /// Stop after the first host that did not finish cleanly
        quit_on_error: bool,
    },
    /// Up to `nparallel` hosts at a time
    Parallel {
        /// Worker count
        nparallel: usize,
    },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Serial {
            quit_on_error: false,
        }
    }
}

impl Strategy {
    /// Names accepted by [`Strategy::from_declaration`].
    pub const NAMES: [&'static str; 2] = ["serial", "parallel"];

    /// Build a strategy from a declaration such as `serial` or
    /// `{"parallel": {"nparallel": 4}}`.
    pub fn from_declaration(decl: &Declaration) -> Result<Self> {
        let args = PluginArgs::new(PluginKind::Strategy, &decl.name, &decl.args);
        match decl.name.as_str() {
            "serial" => Ok(Strategy::Serial {
                quit_on_error: args.flag("quit_on_error", args.flag("quit-on-error", false)),
            }),
            "parallel" => {
                let n = args.positive_int_or("nparallel", DEFAULT_PARALLELISM as u64);
                Ok(Strategy::Parallel {
                    nparallel: usize::try_from(n).unwrap_or(DEFAULT_PARALLELISM),
                })
            }
            other => Err(Error::UnknownPlugin {
                kind: PluginKind::Strategy,
                name: other.to_string(),
            }),
        }
    }

    /// Parse a raw strategy entry.
    pub fn parse(entry: &Value) -> Result<Self> {
        Self::from_declaration(&Declaration::parse(entry)?)
    }

    /// Human-readable name, e.g. `Serial` or `Parallel-4`.
    pub fn name(&self) -> String {
        match self {
            Strategy::Serial { .. } => "Serial".to_string(),
            Strategy::Parallel { nparallel } => format!("Parallel-{nparallel}"),
        }
    }

    /// Run the lifecycle of every host in `inventory`.
    ///
    /// Returns once every scheduled host has a record in `results`. Only
    /// failure to set up the worker pool is an error; host outcomes are
    /// reported through `results`.
    pub fn execute(&self, executor: &Executor<'_>, inventory: &Inventory, results: &Results) -> Result<()> {
        info!("Running {} strategy on {} host(s)", self.name(), inventory.len());

        match *self {
            Strategy::Serial { quit_on_error } => {
                for (host, args) in inventory {
                    let result = executor.run(host, args, results);
                    if quit_on_error && !result.is_ok() {
                        warn!("[{host}] Failed, not processing remaining hosts");
                        break;
                    }
                }
            }
            Strategy::Parallel { nparallel } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(nparallel.max(1))
                    .thread_name(|i| format!("host-worker-{i}"))
                    .build()
                    .map_err(|e| Error::Pool(e.to_string()))?;

                let hosts: Vec<(&String, &Value)> = inventory.iter().collect();
                pool.install(|| {
                    hosts.par_iter().with_max_len(1).for_each(|&(host, args)| {
                        let result = executor.run(host, args, results);
                        if !result.is_ok() {
                            error!("[{host}] Finished with errors: {result}");
                        }
                    });
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HostPhase, PhaseCallback};
    use crate::executor::tests::{CallLog, registries};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use templating::TemplateEngine;

    #[test]
    fn test_parse_strategies() {
        assert_eq!(
            Strategy::parse(&json!("serial")).unwrap(),
            Strategy::Serial {
                quit_on_error: false
            }
        );
        assert_eq!(
            Strategy::parse(&json!({"serial": {"quit_on_error": true}})).unwrap(),
            Strategy::Serial {
                quit_on_error: true
            }
        );
        assert_eq!(
            Strategy::parse(&json!({"serial": {"quit-on-error": "yes"}})).unwrap(),
            Strategy::Serial {
                quit_on_error: true
            }
        );
        assert_eq!(
            Strategy::parse(&json!({"serial": {"quit_on_error": false}})).unwrap(),
            Strategy::default()
        );
        assert_eq!(
            Strategy::parse(&json!({"parallel": {"nparallel": 4}})).unwrap(),
            Strategy::Parallel { nparallel: 4 }
        );
        assert_eq!(Strategy::parse(&json!({"parallel": {"nparallel": 4}})).unwrap().name(), "Parallel-4");
    }

    #[test]
    fn test_parallel_falls_back_to_default() {
        for n in [json!(0), json!(-1), json!("lots"), json!(null)] {
            assert_eq!(
                Strategy::parse(&json!({"parallel": {"nparallel": n}})).unwrap(),
                Strategy::Parallel {
                    nparallel: DEFAULT_PARALLELISM
                }
            );
        }
        assert_eq!(
            Strategy::parse(&json!("parallel")).unwrap(),
            Strategy::Parallel {
                nparallel: DEFAULT_PARALLELISM
            }
        );
    }

    #[test]
    fn test_unknown_strategy_is_configuration_error() {
        let err = Strategy::parse(&json!("random")).unwrap_err();
        assert!(matches!(err, Error::UnknownPlugin { kind: PluginKind::Strategy, .. }));
    }

    fn inventory(hosts: &[&str]) -> Inventory {
        hosts
            .iter()
            .map(|h| ((*h).to_string(), json!({})))
            .collect()
    }

    /// Tracks how many hosts are inside the lifecycle at once
    #[derive(Default)]
    struct Concurrency {
        active: AtomicUsize,
        peak: AtomicUsize,
        order: Mutex<Vec<String>>,
    }

    impl PhaseCallback for Concurrency {
        fn on_phase(&self, host: &str, phase: HostPhase) {
            match phase {
                HostPhase::Pending => {
                    let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak.fetch_max(now, Ordering::SeqCst);
                    self.order.lock().unwrap().push(host.to_string());
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                HostPhase::Done => {
                    self.active.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_parallel_runs_every_host_with_bounded_concurrency() {
        let log = CallLog::default();
        let (services, updaters) = registries(&log);
        let templates = TemplateEngine::new();
        let results = Results::new();
        let tracker = Concurrency::default();

        let executor = Executor::new(&services, &updaters, &templates)
            .with_services(vec![json!({"fake": {"evacuate": "fail-on:h3"}})])
            .with_updates(vec![json!("fake")])
            .with_progress(&tracker);

        let strategy = Strategy::Parallel { nparallel: 2 };
        strategy
            .execute(&executor, &inventory(&["h1", "h2", "h3", "h4", "h5"]), &results)
            .unwrap();

        assert_eq!(results.len(), 5);
        assert!(tracker.peak.load(Ordering::SeqCst) <= 2);
        for host in ["h1", "h2", "h4", "h5"] {
            assert!(results.get(host).unwrap().is_ok(), "{host}");
        }
        let h3 = results.get("h3").unwrap();
        assert!(!h3.evacuated);
        assert_eq!(h3.failed, 1);
        assert!(h3.restored);
        assert_eq!(results.tally().ok, 4);
        assert_eq!(results.tally().error, 1);
    }

    #[test]
    fn test_serial_keeps_inventory_order() {
        let log = CallLog::default();
        let (services, updaters) = registries(&log);
        let templates = TemplateEngine::new();
        let results = Results::new();
        let tracker = Concurrency::default();

        let executor = Executor::new(&services, &updaters, &templates)
            .with_services(vec![json!({"fake": {"evacuate": "fail-on:b"}})])
            .with_progress(&tracker);

        Strategy::default()
            .execute(&executor, &inventory(&["c", "b", "a"]), &results)
            .unwrap();

        assert_eq!(*tracker.order.lock().unwrap(), vec!["c", "b", "a"]);
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_serial_quit_on_error_stops_after_failure() {
        let log = CallLog::default();
        let (services, updaters) = registries(&log);
        let templates = TemplateEngine::new();
        let results = Results::new();

        let executor = Executor::new(&services, &updaters, &templates)
            .with_services(vec![json!({"fake": {"evacuate": "fail-on:h2"}})]);

        Strategy::Serial {
            quit_on_error: true,
        }
        .execute(&executor, &inventory(&["h1", "h2", "h3"]), &results)
        .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.get("h1").unwrap().is_ok());
        assert!(!results.get("h2").unwrap().is_ok());
        assert!(results.get("h3").is_none());
    }

    #[test]
    fn test_parsed_serial_declaration_stops_after_failure() {
        let log = CallLog::default();
        let (services, updaters) = registries(&log);
        let templates = TemplateEngine::new();
        let results = Results::new();

        let executor = Executor::new(&services, &updaters, &templates)
            .with_services(vec![json!({"fake": {"evacuate": "fail-on:h2"}})]);

        let strategy = Strategy::parse(&json!({"serial": {"quit_on_error": true}})).unwrap();
        strategy
            .execute(&executor, &inventory(&["h1", "h2", "h3"]), &results)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.get("h3").is_none());
    }

    #[test]
    fn test_empty_inventory() {
        let log = CallLog::default();
        let (services, updaters) = registries(&log);
        let templates = TemplateEngine::new();
        let results = Results::new();
        let executor = Executor::new(&services, &updaters, &templates);

        Strategy::Parallel { nparallel: 3 }
            .execute(&executor, &Inventory::new(), &results)
            .unwrap();
        assert!(results.is_empty());
    }
}
