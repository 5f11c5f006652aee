//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_model_store::JsonModelStore;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::config::AppConfig;
use crate::domain::config_validation::validate_config;
use crate::domain::engine::Evaluation;
use crate::domain::error::FusetraderError;
use crate::domain::scheduler::{Scheduler, SchedulerPorts, StopSignal};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::model_port::ModelStore;

#[derive(Parser, Debug)]
#[command(name = "fusetrader", about = "Signal-fusion trading engine")]
pub struct Cli {
    /// Log filter (e.g. `debug`, `fusetrader=trace`); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the paper-trading loop
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Evaluate each symbol once and print the decisions
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.log_level.as_deref());
    match cli.command {
        Command::Run { config, cycles } => run_loop(&config, cycles),
        Command::Analyze { config, symbol } => run_analyze(&config, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Installs the fmt subscriber. `--log-level` wins over `RUST_LOG`, which
/// wins over the `info` default.
pub fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // a second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = FusetraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn load_app_config(path: &Path) -> Result<(FileConfigAdapter, AppConfig), ExitCode> {
    let adapter = load_config(path)?;
    match AppConfig::from_port(&adapter) {
        Ok(config) => Ok((adapter, config)),
        Err(e) => {
            eprintln!("error: {e}");
            Err((&e).into())
        }
    }
}

/// Wires the concrete adapters named in the config file.
pub fn build_ports(
    adapter: &dyn ConfigPort,
    config: &AppConfig,
) -> Result<SchedulerPorts, FusetraderError> {
    let data_path = adapter
        .get_string("data", "path")
        .ok_or_else(|| FusetraderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    let market: Arc<dyn MarketDataPort> = Arc::new(CsvAdapter::new(PathBuf::from(data_path)));
    let broker = Arc::new(PaperBroker::from_config(
        adapter,
        Arc::clone(&market),
        config.timeframes.short,
    )?);
    let model_store = config
        .model_path
        .clone()
        .map(|path| Arc::new(JsonModelStore::new(path)) as Arc<dyn ModelStore>);

    let mut ports = SchedulerPorts {
        market,
        broker: broker.clone(),
        execution: broker,
        performance: None,
        journal: None,
        model_store,
    };
    attach_journal(adapter, &mut ports)?;
    Ok(ports)
}

#[cfg(feature = "sqlite")]
fn attach_journal(
    adapter: &dyn ConfigPort,
    ports: &mut SchedulerPorts,
) -> Result<(), FusetraderError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::ports::performance_port::{PerformancePort, TradeJournal};

    if adapter.get_string("sqlite", "path").is_none() {
        return Ok(());
    }
    let sqlite = Arc::new(SqliteAdapter::from_config(adapter)?);
    sqlite.initialize_schema()?;
    ports.performance = Some(sqlite.clone() as Arc<dyn PerformancePort>);
    ports.journal = Some(sqlite as Arc<dyn TradeJournal>);
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn attach_journal(
    adapter: &dyn ConfigPort,
    _ports: &mut SchedulerPorts,
) -> Result<(), FusetraderError> {
    if adapter.get_string("sqlite", "path").is_some() {
        warn!("[sqlite] configured but built without the sqlite feature, journal disabled");
    }
    Ok(())
}

fn build_scheduler(config_path: &Path) -> Result<Scheduler, ExitCode> {
    let (adapter, config) = load_app_config(config_path)?;
    let ports = build_ports(&adapter, &config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(Scheduler::new(config, ports, Utc::now()))
}

fn run_loop(config_path: &Path, cycles: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let scheduler = match build_scheduler(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    if !scheduler.classifier().is_ready() {
        warn!("running without a classifier model");
    }

    let stop = StopSignal::new();
    let completed = match scheduler.run(&stop, cycles) {
        Ok(completed) => completed,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let status = scheduler.status();
    info!(cycles = completed, open_positions = status.active_symbols.len(), "scheduler stopped");

    eprintln!("\n=== Session Summary ===");
    eprintln!("Cycles:           {}", completed);
    eprintln!("Trades Opened:    {}", status.totals.trades_opened);
    eprintln!("Trades Closed:    {}", status.totals.trades_closed);
    eprintln!(
        "Win Rate:         {:.1}%",
        status.totals.win_rate().unwrap_or(0.0) * 100.0
    );
    eprintln!("Realized P&L:     {:.2}", status.totals.realized_pnl);
    if !status.active_symbols.is_empty() {
        eprintln!("Open Positions:   {}", status.active_symbols.join(", "));
    }
    ExitCode::SUCCESS
}

pub fn format_evaluation(evaluation: &Evaluation) -> String {
    let d = &evaluation.decision;
    let mut line = format!(
        "{:<8} {:<4} confidence {:>5.1}  score {:>+.3}",
        d.symbol, d.signal, d.confidence, d.combined_score
    );
    match (&evaluation.levels, evaluation.price) {
        (Some(levels), Some(_)) if levels.is_actionable() => {
            line.push_str(&format!(
                "  entry {:.5} stop {:.5} target {:.5} rr {:.2}",
                levels.entry, levels.stop_loss, levels.take_profit, levels.risk_reward_ratio
            ));
        }
        (_, Some(price)) => line.push_str(&format!("  price {:.5}", price)),
        (_, None) => line.push_str("  (no data)"),
    }
    if evaluation.prediction.is_fallback() {
        line.push_str("  [classifier fallback]");
    }
    line
}

fn run_analyze(config_path: &Path, symbol: Option<&str>) -> ExitCode {
    let (adapter, config) = match load_app_config(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let symbols: Vec<String> = match symbol {
        Some(s) => vec![s.trim().to_uppercase()],
        None => config.engine.symbols.clone(),
    };
    let ports = match build_ports(&adapter, &config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let now = Utc::now();
    let scheduler = Scheduler::new(config, ports, now);
    for symbol in &symbols {
        let evaluation = scheduler.engine().evaluate(symbol, now);
        println!("{}", format_evaluation(&evaluation));
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    eprintln!("Config validated successfully");
    ExitCode::SUCCESS
}
