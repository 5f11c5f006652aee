//! CLI wiring tests against real INI and CSV files on disk.

mod common;

use clap::Parser;
use common::monday;
use fusetrader::adapters::file_config_adapter::FileConfigAdapter;
use fusetrader::cli::{self, Cli};
use fusetrader::domain::config::AppConfig;
use fusetrader::domain::error::FusetraderError;
use fusetrader::domain::signal::Signal;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

fn write_bars(dir: &Path, name: &str, count: usize, growth: f64) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    let start = monday() - chrono::Duration::minutes(15 * count as i64);
    let mut close = 2000.0_f64;
    for i in 0..count {
        let open = close;
        close *= 1.0 + growth;
        let ts = start + chrono::Duration::minutes(15 * i as i64);
        content.push_str(&format!(
            "{},{:.4},{:.4},{:.4},{:.4},1000\n",
            ts.format("%Y-%m-%d %H:%M:%S"),
            open,
            open.max(close) + 0.5,
            open.min(close) - 0.5,
            close
        ));
    }
    fs::write(dir.join(name), content).unwrap();
}

fn write_history(dir: &Path) {
    for tf in ["M15", "H1", "H4"] {
        write_bars(dir, &format!("XAUUSD_{tf}.csv"), 300, 0.0);
    }
}

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    let ini = format!(
        "[engine]\n\
         symbols = XAUUSD\n\
         interval_seconds = 1\n\
         min_confidence = 75\n\
         \n\
         [data]\n\
         path = {}\n\
         \n\
         [paper]\n\
         balance = 10000\n\
         leverage = 100\n\
         {}",
        dir.display(),
        extra
    );
    let path = dir.join("fusetrader.ini");
    fs::write(&path, ini).unwrap();
    path
}

fn run(args: &[&str]) -> ExitCode {
    let mut argv = vec!["fusetrader"];
    argv.extend_from_slice(args);
    cli::run(Cli::parse_from(argv))
}

#[test]
fn validate_accepts_good_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "");
    assert_eq!(
        run(&["validate", "--config", path.to_str().unwrap()]),
        ExitCode::SUCCESS
    );
}

#[test]
fn validate_rejects_bad_confidence_with_config_exit_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.ini");
    fs::write(&path, "[engine]\nsymbols = XAUUSD\nmin_confidence = 140\n").unwrap();
    assert_eq!(
        run(&["validate", "--config", path.to_str().unwrap()]),
        ExitCode::from(2)
    );
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.ini");
    assert_ne!(
        run(&["validate", "--config", path.to_str().unwrap()]),
        ExitCode::SUCCESS
    );
}

#[test]
fn build_ports_requires_data_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nodata.ini");
    fs::write(&path, "[engine]\nsymbols = XAUUSD\n").unwrap();
    let adapter = FileConfigAdapter::from_file(&path).unwrap();
    let config = AppConfig::from_port(&adapter).unwrap();

    match cli::build_ports(&adapter, &config) {
        Err(FusetraderError::ConfigMissing { section, key }) => {
            assert_eq!(section, "data");
            assert_eq!(key, "path");
        }
        Err(other) => panic!("expected ConfigMissing, got {other}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn build_ports_rejects_negative_balance() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path(), "");
    let ini = fs::read_to_string(&path)
        .unwrap()
        .replace("balance = 10000", "balance = -5");
    fs::write(&path, ini).unwrap();
    let adapter = FileConfigAdapter::from_file(&path).unwrap();
    let config = AppConfig::from_port(&adapter).unwrap();

    assert!(matches!(
        cli::build_ports(&adapter, &config),
        Err(FusetraderError::ConfigInvalid { .. })
    ));
}

#[test]
fn wired_ports_read_csv_history() {
    let dir = TempDir::new().unwrap();
    write_bars(dir.path(), "XAUUSD_M15.csv", 300, 0.0);
    let path = write_config(dir.path(), "");
    let adapter = FileConfigAdapter::from_file(&path).unwrap();
    let config = AppConfig::from_port(&adapter).unwrap();

    let ports = cli::build_ports(&adapter, &config).unwrap();
    assert!(ports.model_store.is_none());
    let series = ports
        .market
        .get_series("XAUUSD", config.timeframes.short, 1000)
        .unwrap();
    assert_eq!(series.len(), 300);

    let account = ports.broker.account().unwrap();
    assert!((account.balance - 10_000.0).abs() < 1e-9);
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_section_attaches_journal() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("journal.db");
    let path = write_config(
        dir.path(),
        &format!("\n[sqlite]\npath = {}\n", db.display()),
    );
    let adapter = FileConfigAdapter::from_file(&path).unwrap();
    let config = AppConfig::from_port(&adapter).unwrap();

    let ports = cli::build_ports(&adapter, &config).unwrap();
    assert!(ports.journal.is_some());
    assert!(ports.performance.is_some());
    assert!(db.exists());
}

#[test]
fn run_completes_requested_cycles() {
    let dir = TempDir::new().unwrap();
    write_bars(dir.path(), "XAUUSD_M15.csv", 300, 0.0);
    let path = write_config(dir.path(), "");
    assert_eq!(
        run(&["run", "--config", path.to_str().unwrap(), "--cycles", "1"]),
        ExitCode::SUCCESS
    );
}

#[test]
fn analyze_runs_for_single_symbol() {
    let dir = TempDir::new().unwrap();
    write_bars(dir.path(), "XAUUSD_M15.csv", 300, 0.0);
    let path = write_config(dir.path(), "");
    assert_eq!(
        run(&["analyze", "--config", path.to_str().unwrap(), "--symbol", "xauusd"]),
        ExitCode::SUCCESS
    );
}

#[test]
fn formatted_evaluation_mentions_symbol_and_fallback() {
    let dir = TempDir::new().unwrap();
    write_history(dir.path());
    let path = write_config(dir.path(), "");
    let adapter = FileConfigAdapter::from_file(&path).unwrap();
    let config = AppConfig::from_port(&adapter).unwrap();
    let ports = cli::build_ports(&adapter, &config).unwrap();
    let scheduler = fusetrader::domain::scheduler::Scheduler::new(config, ports, monday());

    let evaluation = scheduler.engine().evaluate("XAUUSD", monday());
    assert_eq!(evaluation.decision.signal, Signal::Hold);
    assert!(evaluation.price.is_some());
    let line = cli::format_evaluation(&evaluation);
    assert!(line.starts_with("XAUUSD"));
    assert!(line.contains("HOLD"));
    assert!(line.contains("[classifier fallback]"));
}
