use clap::Parser;
use fusetrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
