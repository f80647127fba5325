use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "deskagent",
    version,
    about = "Validate desk trades and pricing marks from scenario files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one scenario and print its report as JSON.
    Run(RunArgs),
    /// Run every scenario in a directory and print one status line each.
    Smoke(SmokeArgs),
    /// Schema-check every scenario file in a directory.
    Validate(ValidateArgs),
    /// Resolve identifiers against the reference master.
    Normalize(NormalizeArgs),
}

/// Settings shared by commands that build an orchestrator.
#[derive(Debug, Args)]
pub struct RuntimeArgs {
    /// JSON or YAML configuration file.
    #[arg(long, env = "DESK_AGENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override a configuration value, e.g. `--set orchestrator.max_retries=3`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Static prices file (`[{ticker, date, price}]`), used when no API key is set.
    #[arg(long)]
    pub prices: Option<PathBuf>,

    /// Date used as "today" for mark staleness.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub run_date: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario file, or a name under the configured scenarios directory.
    #[arg(long)]
    pub scenario: String,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

#[derive(Debug, Args)]
pub struct SmokeArgs {
    /// Directory of scenario files; defaults to the configured scenarios path.
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Write `<scenario>.report.json` files here.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[arg(long, default_value = "scenarios")]
    pub dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Free-form identifiers (ticker, ISIN, CUSIP, CIK, company name).
    pub identifiers: Vec<String>,

    /// File with one identifier per line.
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long, env = "DESK_AGENT_CONFIG")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "deskagent",
            "run",
            "--scenario",
            "clean_day.json",
            "--set",
            "orchestrator.max_retries=3",
            "--run-date",
            "2024-06-17",
            "--pretty",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.scenario, "clean_day.json");
        assert!(args.pretty);
        assert_eq!(args.runtime.overrides, vec!["orchestrator.max_retries=3"]);
        assert_eq!(args.runtime.run_date, NaiveDate::from_ymd_opt(2024, 6, 17));
    }

    #[test]
    fn test_parse_normalize() {
        let cli = Cli::parse_from(["deskagent", "normalize", "AAPL US", "US5949181045", "--top-k", "3"]);
        let Command::Normalize(args) = cli.command else {
            panic!("expected normalize");
        };
        assert_eq!(args.identifiers, vec!["AAPL US", "US5949181045"]);
        assert_eq!(args.top_k, Some(3));
    }
}
