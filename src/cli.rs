use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "drydock")]
#[command(version)]
#[command(about = "Scheduled fleet maintenance: evacuate, update, restore", long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Process configuration file (TOML or JSON)
    #[arg(short, long, value_name = "PATH", env = "DRYDOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the discovered hosts and exit
    #[arg(long)]
    pub list_hosts: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Default template variable (VALUE is parsed as JSON, else taken as a string)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub vars: Vec<(String, Value)>,

    /// Override a value in the job file, e.g. `strategy.parallel.nparallel=4`
    #[arg(long = "set", value_name = "PATH=VALUE", value_parser = parse_assignment)]
    pub sets: Vec<(String, Value)>,

    /// Job description (TOML or JSON)
    #[arg(value_name = "JOB")]
    pub job: PathBuf,
}

/// Parse `KEY=VALUE`, reading VALUE as JSON when possible.
fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("a=1").unwrap(), ("a".to_string(), json!(1)));
        assert_eq!(
            parse_assignment("a.b[0]=[1, 2]").unwrap(),
            ("a.b[0]".to_string(), json!([1, 2]))
        );
        assert_eq!(
            parse_assignment("name=node=1").unwrap(),
            ("name".to_string(), json!("node=1"))
        );
        assert_eq!(parse_assignment("flag=true").unwrap().1, json!(true));
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::parse_from(["drydock", "-vv", "--set", "strategy=\"parallel\"", "job.json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.sets, vec![("strategy".to_string(), json!("parallel"))]);
        assert_eq!(cli.job, PathBuf::from("job.json"));
    }
}
