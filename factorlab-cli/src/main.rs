//! FactorLab CLI — factor exploration and strategy discovery commands.
//!
//! Commands:
//! - `explore`: evaluate every factor on every timeframe and store the results
//! - `combine`: search combinations of previously stored factor results
//! - `discover`: explore and combine in one run
//! - `init-config`: print (or write) the default TOML configuration

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use factorlab_core::domain::{FactorResult, StrategyResult, Timeframe};
use factorlab_core::factors::{BuiltinFactors, FactorRegistry};
use factorlab_runner::{
    build_engine, discover_strategies, explore_factors, provider_for, resolve_factors,
    run_discovery, CombinationBacktester, DiscoveryConfig, JsonlStore, MetricsValidator,
    ResultRepository,
};

#[derive(Parser)]
#[command(
    name = "factorlab",
    about = "FactorLab CLI — factor evaluation and multi-timeframe combination search"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate single factors across timeframes.
    Explore {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Combine stored factor results into 2- and 3-factor strategies.
    Combine {
        /// Run id whose factor results to use. Defaults to the latest stored run.
        #[arg(long)]
        run_id: Option<String>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Explore, then combine, in one run.
    Discover {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the default configuration as TOML.
    InitConfig {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

/// Command-line overrides applied on top of the loaded configuration.
#[derive(clap::Args)]
struct Overrides {
    /// Symbol to evaluate (e.g., 0700.HK).
    #[arg(long)]
    symbol: Option<String>,

    /// Comma-separated timeframes (e.g., 1m,5m,1h).
    #[arg(long, value_delimiter = ',')]
    timeframes: Vec<String>,

    /// Comma-separated factor names. Defaults to every registered factor.
    #[arg(long, value_delimiter = ',')]
    factors: Vec<String>,

    /// Output directory for JSONL and CSV results.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of rows to print.
    #[arg(long, default_value_t = 10)]
    show: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Explore { overrides } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            run_explore(&config, overrides.show)
        }
        Commands::Combine { run_id, overrides } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            run_combine(&config, run_id, overrides.show)
        }
        Commands::Discover { overrides } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            run_discover(&config, overrides.show)
        }
        Commands::InitConfig { out, force } => run_init_config(out, force),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<DiscoveryConfig> {
    let mut config = match path {
        Some(path) => DiscoveryConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DiscoveryConfig::default(),
    };
    if let Some(symbol) = &overrides.symbol {
        config.symbol = symbol.clone();
    }
    if !overrides.timeframes.is_empty() {
        config.timeframes = overrides
            .timeframes
            .iter()
            .map(|s| s.parse::<Timeframe>())
            .collect::<Result<_, _>>()
            .context("parsing --timeframes")?;
    }
    if !overrides.factors.is_empty() {
        config.factors = overrides.factors.clone();
    }
    if let Some(dir) = &overrides.output_dir {
        config.output.dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn store_for(config: &DiscoveryConfig) -> Result<JsonlStore> {
    let run_id = config.run_id().context("fingerprinting configuration")?;
    Ok(JsonlStore::new(config.output.dir.clone(), run_id))
}

fn run_explore(config: &DiscoveryConfig, show: usize) -> Result<()> {
    let registry = BuiltinFactors::new();
    let factors = resolve_factors(config, &registry)?;
    let provider = provider_for(&config.data);
    let engine = build_engine(config);
    let validator = MetricsValidator::new(config.validator.clone());

    let report = explore_factors(
        &config.symbol,
        &config.timeframes,
        &factors,
        provider.as_ref(),
        &registry,
        &engine,
        &validator,
    );

    let store = store_for(config)?;
    store
        .save_factor_results(&report.results)
        .context("saving factor results")?;

    print_factor_table(&report.results, show);
    for failure in &report.failures {
        eprintln!(
            "failed: {} {}: {}",
            failure.timeframe,
            failure.factor.as_deref().unwrap_or("(load)"),
            failure.error
        );
    }
    println!(
        "Run {}: {} results saved to {}",
        store.run_id().short(),
        report.results.len(),
        store.factor_results_path().display()
    );
    Ok(())
}

fn run_combine(config: &DiscoveryConfig, run_id: Option<String>, show: usize) -> Result<()> {
    let store = store_for(config)?;
    let records = store
        .load_factor_results()
        .context("reading stored factor results")?;
    let Some(run_id) = run_id.or_else(|| records.last().map(|r| r.run_id.clone())) else {
        bail!(
            "no factor results in {}; run `factorlab explore` first",
            store.factor_results_path().display()
        );
    };
    let results: Vec<FactorResult> = records
        .into_iter()
        .filter(|r| r.run_id == run_id && r.result.symbol == config.symbol)
        .map(|r| r.result)
        .collect();
    if results.is_empty() {
        bail!("no factor results for run {run_id} and symbol {}", config.symbol);
    }

    let provider = provider_for(&config.data);
    let timeframes: BTreeSet<Timeframe> = results.iter().map(|r| r.timeframe).collect();
    let mut prices = BTreeMap::new();
    for tf in timeframes {
        let series = provider
            .load(&config.symbol, tf)
            .with_context(|| format!("loading {} {tf} prices", config.symbol))?;
        prices.insert(tf, series);
    }

    let registry: Arc<dyn FactorRegistry> = Arc::new(BuiltinFactors::new());
    let backtester = CombinationBacktester::new(
        build_engine(config),
        registry,
        config.combiner.composite_rule.build(),
    );
    let validator = MetricsValidator::new(config.validator.clone());
    let report = discover_strategies(&results, &prices, &config.combiner, &backtester, &validator)?;

    store
        .save_strategy_results(&report.strategies)
        .context("saving strategy results")?;
    finish_strategies(config, &store, &report.strategies, show)?;
    for failure in &report.failures {
        eprintln!("failed: {}: {}", failure.strategy_name, failure.error);
    }
    Ok(())
}

fn run_discover(config: &DiscoveryConfig, show: usize) -> Result<()> {
    let store = store_for(config)?;
    let provider = provider_for(&config.data);
    let outcome = run_discovery(
        config,
        provider.as_ref(),
        Arc::new(BuiltinFactors::new()),
        Some(&store as &dyn ResultRepository),
    )?;

    print_factor_table(&outcome.discovery.selected, show);
    println!();
    finish_strategies(config, &store, &outcome.discovery.strategies, show)?;
    println!(
        "Run {}: {} factor results, {} combinations tested, {} failures",
        outcome.run_id.short(),
        outcome.exploration.results.len(),
        outcome.discovery.combinations_tested,
        outcome.unit_failures().len() + outcome.discovery.failures.len()
    );
    Ok(())
}

fn finish_strategies(
    config: &DiscoveryConfig,
    store: &JsonlStore,
    strategies: &[StrategyResult],
    show: usize,
) -> Result<()> {
    print_strategy_table(strategies, show);
    if config.output.export_csv {
        let path = store
            .export_strategy_ranking(strategies)
            .context("exporting strategy ranking")?;
        println!("Ranking written to {}", path.display());
    }
    Ok(())
}

fn run_init_config(out: Option<PathBuf>, force: bool) -> Result<()> {
    let text = DiscoveryConfig::default().to_toml_string()?;
    match out {
        Some(path) => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::write(&path, text)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Default config written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────

fn print_factor_table(results: &[FactorResult], show: usize) {
    let mut sorted: Vec<&FactorResult> = results.iter().collect();
    sorted.sort_by(|a, b| b.sharpe_ratio.total_cmp(&a.sharpe_ratio));

    println!(
        "{:<22} {:>5} {:>8} {:>7} {:>7} {:>7} {:>8} {:>8}  {}",
        "Factor", "TF", "Sharpe", "Trades", "Win%", "PF", "MaxDD%", "IC", "Status"
    );
    println!("{}", "-".repeat(92));
    for r in sorted.into_iter().take(show) {
        println!(
            "{:<22} {:>5} {:>8.2} {:>7} {:>6.1}% {:>7.2} {:>7.2}% {:>8.4}  {:?}",
            r.factor_name,
            r.timeframe.to_string(),
            r.sharpe_ratio,
            r.trades_count,
            r.win_rate * 100.0,
            r.profit_factor,
            r.max_drawdown * 100.0,
            r.information_coefficient,
            r.validation_status,
        );
    }
}

fn print_strategy_table(strategies: &[StrategyResult], show: usize) {
    println!(
        "{:<4} {:<44} {:>8} {:>7} {:>7} {:>8} {:>8}",
        "#", "Strategy", "Sharpe", "Trades", "Win%", "MaxDD%", "AvgIC"
    );
    println!("{}", "-".repeat(92));
    for (i, s) in strategies.iter().take(show).enumerate() {
        println!(
            "{:<4} {:<44} {:>8.2} {:>7} {:>6.1}% {:>7.2}% {:>8.4}",
            i + 1,
            s.strategy_name,
            s.sharpe_ratio,
            s.trades_count,
            s.win_rate * 100.0,
            s.max_drawdown * 100.0,
            s.average_information_coefficient,
        );
    }
    if strategies.is_empty() {
        println!("(no strategies cleared the thresholds)");
    }
}
