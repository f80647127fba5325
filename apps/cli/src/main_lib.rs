use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use deskagent_core::config::parse_override;
use deskagent_core::orchestrator::{resolve_scenario_path, validate_scenario_files, Report};
use deskagent_core::refmaster::{load_reference_table, EquityNormalizer, Normalizer};
use deskagent_core::{DeskConfig, DeskOrchestrator};
use deskagent_market_data::{FinancialDatasetsProvider, MarketDataSource, StaticMarketData};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::{NormalizeArgs, RunArgs, RuntimeArgs, SmokeArgs, ValidateArgs};

const API_KEY_ENV: &str = "FINANCIAL_DATASETS_API_KEY";

pub fn init_tracing() {
    let log_format = std::env::var("DESK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so reports on stdout stay machine-readable.
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(file: Option<&Path>, overrides: &[String]) -> anyhow::Result<DeskConfig> {
    let overrides = overrides
        .iter()
        .map(|o| parse_override(o))
        .collect::<Result<Vec<_>, _>>()?;
    let config = DeskConfig::load(file, |key| std::env::var(key).ok(), &overrides)?;
    tracing::debug!("Configuration: {:?}", config);
    Ok(config)
}

fn load_normalizer(config: &DeskConfig) -> anyhow::Result<Arc<dyn EquityNormalizer>> {
    let table = load_reference_table(&config.refmaster_path).with_context(|| {
        format!(
            "loading reference master {}",
            config.refmaster_path.display()
        )
    })?;
    Ok(Arc::new(Normalizer::new(
        table.equities,
        config.normalizer.clone(),
    )))
}

fn build_market(prices: Option<&Path>) -> anyhow::Result<Arc<dyn MarketDataSource>> {
    if let Ok(api_key) = std::env::var(API_KEY_ENV) {
        if !api_key.trim().is_empty() {
            tracing::info!("Using FinancialDatasets market data");
            return Ok(Arc::new(FinancialDatasetsProvider::new(api_key)));
        }
    }
    match prices {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading prices {}", path.display()))?;
            tracing::info!("Using static prices from {}", path.display());
            Ok(Arc::new(StaticMarketData::from_json_str(&text)?))
        }
        None => {
            tracing::warn!(
                "{} is not set and no --prices file was given; every lookup will miss",
                API_KEY_ENV
            );
            Ok(Arc::new(StaticMarketData::new()))
        }
    }
}

fn build_orchestrator(runtime: &RuntimeArgs) -> anyhow::Result<DeskOrchestrator> {
    let config = load_config(runtime.config.as_deref(), &runtime.overrides)?;
    let normalizer = load_normalizer(&config)?;
    let market = build_market(runtime.prices.as_deref())?;
    let orchestrator = DeskOrchestrator::new(config, normalizer, market);
    Ok(match runtime.run_date {
        Some(date) => orchestrator.with_run_date(date),
        None => orchestrator,
    })
}

fn to_json(report: &Report, pretty: bool) -> anyhow::Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    })
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&args.runtime)?;
    let path = resolve_scenario_path(&args.scenario, &orchestrator.config().scenarios_path)?;
    let report = orchestrator
        .run_path(&path)
        .await
        .with_context(|| format!("running {}", path.display()))?;
    let json = to_json(&report, args.pretty)?;

    match args.output {
        Some(output) => {
            std::fs::write(&output, json)
                .with_context(|| format!("writing {}", output.display()))?;
            tracing::info!("Report written to {}", output.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn scenario_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("json") | Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();
    Ok(paths)
}

pub async fn smoke(args: SmokeArgs) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(&args.runtime)?;
    let dir = args
        .dir
        .unwrap_or_else(|| orchestrator.config().scenarios_path.clone());
    if let Some(output_dir) = &args.output_dir {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;
    }

    let mut failures = 0;
    for path in scenario_files(&dir)? {
        let started = Instant::now();
        match orchestrator.run_path(&path).await {
            Ok(report) => {
                let summary = &report.summary;
                println!(
                    "{:<32} {:<8} trades {}/{} marks {}/{} {:>8.1} ms{}",
                    report.scenario.name,
                    summary.overall_status.as_str(),
                    summary.trades_with_issues,
                    summary.total_trades,
                    summary.marks_flagged,
                    summary.total_marks,
                    started.elapsed().as_secs_f64() * 1000.0,
                    if summary.within_budget { "" } else { " (over budget)" }
                );
                if let Some(output_dir) = &args.output_dir {
                    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("scenario");
                    let output = output_dir.join(format!("{}.report.json", stem));
                    std::fs::write(&output, to_json(&report, true)?)
                        .with_context(|| format!("writing {}", output.display()))?;
                }
            }
            Err(e) => {
                failures += 1;
                println!("{:<32} FAILED   {}", path.display(), e);
            }
        }
    }
    if failures > 0 {
        bail!("{} scenario(s) failed to load", failures);
    }
    Ok(())
}

pub fn validate(args: ValidateArgs) -> anyhow::Result<()> {
    let checks = validate_scenario_files(&args.dir)?;
    let invalid = checks.iter().filter(|c| !c.is_valid()).count();
    for check in &checks {
        match &check.error {
            None => println!(
                "ok       {} ({})",
                check.path.display(),
                check.name.as_deref().unwrap_or("")
            ),
            Some(error) => println!("invalid  {}: {}", check.path.display(), error),
        }
    }
    println!("{} file(s) checked, {} invalid", checks.len(), invalid);
    if invalid > 0 {
        bail!("{} invalid scenario file(s)", invalid);
    }
    Ok(())
}

pub fn normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref(), &[])?;
    let table = load_reference_table(&config.refmaster_path)?;
    let normalizer = Normalizer::new(table.equities, config.normalizer.clone());

    let mut inputs = args.identifiers;
    if let Some(file) = &args.file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        inputs.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    if inputs.is_empty() {
        bail!("no identifiers given");
    }

    let top_k = args.top_k.unwrap_or(config.normalizer.top_k);
    let results: Vec<serde_json::Value> = normalizer
        .normalize_batch(&inputs, top_k)
        .into_iter()
        .map(|(input, results)| serde_json::json!({ "input": input, "results": results }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.yaml", "a.json", "notes.md", "c.yml"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let names: Vec<String> = scenario_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.yaml", "c.yml"]);
    }

    #[test]
    fn test_load_config_applies_overrides() {
        let config = load_config(None, &["oms.settlement_days=1".to_string()]).unwrap();
        assert_eq!(config.oms.settlement_days, 1);
        assert!(load_config(None, &["nonsense".to_string()]).is_err());
    }
}
