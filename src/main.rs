use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::{error, info, warn};

use load_profile_reader::audit::init_audit_trail;
use load_profile_reader::config::MediaConfig;
use load_profile_reader::transport::TcpTransport;
use load_profile_reader::{ClientError, DlmsMeterSession, MeterSession, ProfileRangeExtractor, ReaderConfig, ReaderError};

const DEFAULT_CONFIG_PATH: &str = "reader.toml";

/// Reads yesterday's load profile from a DLMS/COSEM meter and writes the hourly report.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file. Defaults apply when omitted and `reader.toml` does not exist.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run date (YYYY-MM-DD); the day before it is read. Defaults to today.
    #[arg(short, long)]
    date: Option<NaiveDate>,

    /// Log protocol details.
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<ReaderConfig, ReaderError> {
    match &args.config {
        Some(path) => ReaderConfig::load(path),
        None if PathBuf::from(DEFAULT_CONFIG_PATH).exists() => ReaderConfig::load(DEFAULT_CONFIG_PATH),
        None => {
            let config = ReaderConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn open_session(config: &ReaderConfig) -> Result<DlmsMeterSession<TcpTransport>, ReaderError> {
    match &config.media {
        MediaConfig::Tcp { host, port } => {
            let transport = TcpTransport::connect((host.as_str(), *port), config.client_address, config.server_address)
                .map_err(|e| ReaderError::Transport(ClientError::transport(e)))?;
            DlmsMeterSession::open(transport, config.client_settings()).map_err(ReaderError::Transport)
        }
        MediaConfig::Serial { .. } => Err(ReaderError::Transport(ClientError::Unsupported(format!(
            "serial media {}",
            config.media.describe()
        )))),
    }
}

fn run(config: &ReaderConfig, today: NaiveDate) -> Result<(), ReaderError> {
    info!("Reading {} meter at {}", config.manufacturer, config.media.describe());
    let mut session = open_session(config)?;

    let result = ProfileRangeExtractor::new(config).run(&mut session, today);
    if let Err(e) = session.close() {
        warn!("Failed to release the association: {e}");
    }

    let extraction = result?;
    if let Some(path) = extraction.report_path {
        info!("Report: {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_audit_trail(&config.log_file, args.verbose) {
        eprintln!("cannot open run log {}: {e}", config.log_file.display());
        return ExitCode::FAILURE;
    }

    let today = args.date.unwrap_or_else(|| Local::now().date_naive());
    match run(&config, today) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
