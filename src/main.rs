use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_tabular::config::{create_output_dir, load_user_config};
use osm_tabular::etl::audit_streets::StreetAuditEtl;
use osm_tabular::etl::census::CensusEtl;
use osm_tabular::etl::convert::ConvertEtl;
use osm_tabular::{Etl, Result, UserConfig};

/// Convert an OpenStreetMap XML export into CSV tables.
#[derive(Parser, Debug)]
#[command(name = "osm_tabular", version, about)]
struct Cli {
    /// JSON configuration file
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Discard cached outputs and run again
    #[arg(long)]
    force: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Write nodes, ways, tags and way nodes as CSV
    Convert,
    /// Tabulate street name suffixes
    AuditStreets,
    /// Count element names in the document
    Census,
    /// Census, street audit and conversion, in that order
    All,
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn run_etl<E: Etl>(mut etl: E, dir: &Path, force: bool) -> Result<()> {
    if force {
        etl.clean(dir)?;
    }
    etl.process(dir)
}

fn run(cli: &Cli, config: &UserConfig) -> Result<()> {
    let output_dir = create_output_dir(config)?;
    if matches!(cli.command, Command::Census | Command::All) {
        run_etl(CensusEtl::new(config), &output_dir, cli.force)?;
    }
    if matches!(cli.command, Command::AuditStreets | Command::All) {
        run_etl(StreetAuditEtl::new(config), &output_dir, cli.force)?;
    }
    if matches!(cli.command, Command::Convert | Command::All) {
        run_etl(ConvertEtl::new(config), &output_dir, cli.force)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let result = load_user_config(&cli.config).and_then(|config| run(&cli, &config));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(err = err.to_string().as_str(); "Run aborted");
            ExitCode::FAILURE
        },
    }
}
