mod cli;
mod config;
mod discoverers;
mod http;
mod job;
mod openstack;
mod progress;
mod report;
mod runner;
mod services;
mod ssh;
mod ui;
mod updaters;

use anyhow::{Result, bail};
use clap::Parser;
use cli::Cli;
use config::Settings;
use job::JobSpec;
use lifecycle::{Declaration, Executor, Registry, Results, Strategy};
use progress::HostProgress;
use std::process::ExitCode;
use templating::TemplateEngine;

/// Exit status when at least one host ended in ERROR
const EXIT_HOST_ERRORS: u8 = 1;
/// Exit status for a bad job or configuration, before any host work
const EXIT_CONFIG_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = Settings::load(&cli);
    init_logging(&cli, settings.as_ref().ok().and_then(|s| s.log_level));

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    if !settings.color {
        colored::control::set_override(false);
    }

    match run(&cli, &settings) {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn init_logging(cli: &Cli, configured: Option<log::LevelFilter>) {
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        configured.unwrap_or(log_level)
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
}

/// Load the job, discover hosts and run the lifecycle on each of them.
///
/// Errors returned from here are configuration errors: nothing has been done
/// to any host yet.
fn run(cli: &Cli, settings: &Settings) -> Result<ExitCode> {
    let job = JobSpec::load(&cli.job, &cli.sets)?;
    let templates = TemplateEngine::with_defaults(settings.variables.clone());
    let client = http::Client::new();

    let mut inventory =
        discoverers::discover_all(&discoverers::registry(&client), &templates, &job.hosts)?;
    job.apply_host_overrides(&mut inventory)?;

    if settings.list_hosts {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(ExitCode::SUCCESS);
    }

    let strategy = job.strategy()?;
    if inventory.is_empty() {
        ui::warn("No hosts discovered, nothing to do");
        return Ok(ExitCode::SUCCESS);
    }

    let services = services::registry(settings, &client);
    let updaters = updaters::registry(settings);
    validate(&services, &job.services)?;
    validate(&updaters, &job.updates)?;

    ui::header(&format!("drydock: {} host(s)", inventory.len()));
    ui::kv("strategy", &strategy.name());
    ui::kv("services", &names(&job.services));
    ui::kv("updates", &names(&job.updates));

    let progress = match strategy {
        Strategy::Parallel { .. } => HostProgress::new(inventory.len()),
        Strategy::Serial { .. } => HostProgress::hidden(),
    };
    let results = Results::new();
    let executor = Executor::new(&services, &updaters, &templates)
        .with_services(job.services.clone())
        .with_updates(job.updates.clone())
        .with_progress(&progress);

    strategy.execute(&executor, &inventory, &results)?;
    progress.finish();

    let tally = report::print(&results);
    if tally.is_success() {
        ui::success(&format!("{} host(s) done", tally.total()));
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_HOST_ERRORS))
    }
}

/// Job-level declarations must parse and name a registered plugin.
fn validate<F: ?Sized>(registry: &Registry<F>, declarations: &[serde_json::Value]) -> Result<()> {
    for entry in declarations {
        let decl = Declaration::parse(entry)?;
        if !registry.contains(&decl.name) {
            let known = registry.names().collect::<Vec<_>>().join(", ");
            bail!("unknown {} \"{}\" (known: {known})", registry.kind(), decl.name);
        }
    }
    Ok(())
}

fn names(declarations: &[serde_json::Value]) -> String {
    if declarations.is_empty() {
        return "-".to_string();
    }
    declarations
        .iter()
        .map(|entry| {
            Declaration::parse(entry).map_or_else(|_| entry.to_string(), |decl| decl.name)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_job_declarations() {
        let updaters = updaters::registry(&Settings::default());
        assert!(validate(&updaters, &[json!("apt"), json!({"reboot": {"wait": false}})]).is_ok());

        let err = validate(&updaters, &[json!("yum")]).unwrap_err();
        assert!(err.to_string().contains("unknown updater \"yum\""));
        assert!(validate(&updaters, &[json!({"a": 1, "b": 2})]).is_err());
    }

    #[test]
    fn test_list_hosts_ignores_strategy() {
        let dir = tempfile::TempDir::new().unwrap();
        let job = dir.path().join("job.json");
        std::fs::write(
            &job,
            r#"{"hosts": [{"static": ["node1", "node2"]}], "strategy": "rolling"}"#,
        )
        .unwrap();
        let cli = Cli::parse_from(["drydock", job.to_str().unwrap()]);

        let listing = Settings {
            list_hosts: true,
            ..Settings::default()
        };
        assert!(run(&cli, &listing).is_ok());

        let err = run(&cli, &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("unknown strategy \"rolling\""), "{err:#}");
    }

    #[test]
    fn test_names() {
        assert_eq!(names(&[]), "-");
        assert_eq!(names(&[json!("apt"), json!({"reboot": null})]), "apt, reboot");
    }
}
