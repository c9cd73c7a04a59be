pub mod ammeter;
pub mod channels;
pub mod config;
pub mod coordinator;
pub mod datalog_writer;
pub mod fault;
pub mod line;
pub mod notification;
pub mod options;
pub mod power;
pub mod prelude;
pub mod samil;
pub mod status;
pub mod storage;
pub mod tester;
pub mod utils;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;

use crate::coordinator::Coordinator;
use crate::datalog_writer::DatalogWriter;
use crate::line::TcpLine;
use crate::notification::LogNotifier;
use crate::storage::MemoryTimeSeries;
use crate::tester::Tester;

use std::sync::Arc;
use std::time::Duration;

/// Wires the configured components together and runs the selected behavior:
/// the continuous logger loop, or the interactive tester when asked for.
pub async fn app(channels: Channels, config: Arc<ConfigWrapper>, tester_mode: bool) -> Result<()> {
    let inverter = config.inverter();
    let line = TcpLine::new(
        inverter.host().to_string(),
        inverter.port(),
        Duration::from_secs(inverter.read_timeout()),
    );

    if tester_mode {
        let mut tester = Tester::new((*config).clone(), channels, Box::new(line));
        return tester.start().await;
    }

    let datalog = match config.datalog_file() {
        Some(path) => Some(DatalogWriter::new(&path)?),
        None => None,
    };

    let mut coordinator = Coordinator::new(
        (*config).clone(),
        channels,
        Box::new(line),
        Box::new(MemoryTimeSeries::new()),
        Box::new(LogNotifier::new()),
        None,
        datalog,
    );
    coordinator.start().await
}

/// Main entry point: parse options, set up logging and the shutdown signal,
/// then hand over to [`app`].
pub async fn run() -> Result<()> {
    let options = Options::new();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();

    info!("Starting samil-bridge {} with config file: {}", CARGO_PKG_VERSION, options.config_file);

    let config = ConfigWrapper::new(options.config_file.clone()).unwrap_or_else(|err| {
        error!("Failed to load config: {:?}", err);
        std::process::exit(255);
    });

    // Re-apply the configured log level; RUST_LOG still wins when set.
    if env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.loglevel()),
    )
    .try_init()
    .is_err()
    {
        debug!("log level already initialized, config loglevel ignored");
    }

    let channels = Channels::new();

    let shutdown_channels = channels.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
        }
        shutdown_channels.request_shutdown();
    });

    app(channels, Arc::new(config), options.tester).await?;
    info!("Shutdown complete");
    Ok(())
}
