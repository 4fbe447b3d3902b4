use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use poker::{
    CycleDriver, Registry,
    config::{
        DEFAULT_MEASUREMENT, DEFAULT_TIMEOUT_SECS, EncoderOptions, PokerConfig, ProbeConfig,
        TransportFailureStatus, read_targets_file,
    },
    util::{get_endpoints_file, get_influxdb_endpoint},
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Pokes HTTP endpoints and posts the results to InfluxDB
#[derive(Debug, Clone, Parser)]
struct Args {
    /// Which InfluxDB endpoint to post the results to
    #[arg(long)]
    influxdb_endpoint: Option<String>,

    /// JSON file containing your endpoints
    #[arg(short, long)]
    file: Option<String>,

    /// At what interval (seconds) the pokes are performed, run once if 0
    #[arg(long, default_value_t = 0)]
    interval: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Measurement name of the written records
    #[arg(long, default_value = DEFAULT_MEASUREMENT)]
    measurement: String,

    /// Validate TLS certificates of probed endpoints
    #[arg(long)]
    verify_tls: bool,

    /// Status recorded when an endpoint cannot be reached
    #[arg(long, value_enum, default_value_t = TransportFailureStatus::Unknown)]
    transport_failure: TransportFailureStatus,

    /// Maximum number of concurrent probes (one per endpoint if omitted)
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Add the cycle counter to every record
    #[arg(long)]
    emit_counter: bool,

    /// Add the error detail to failed records
    #[arg(long)]
    emit_error: bool,

    /// Print payloads and trace output
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<(PokerConfig, String)> {
        let influxdb_endpoint = self
            .influxdb_endpoint
            .or_else(get_influxdb_endpoint)
            .context("no InfluxDB endpoint given (--influxdb-endpoint or POKER_INFLUXDB_ENDPOINT)")?;
        let file = self
            .file
            .or_else(get_endpoints_file)
            .context("no endpoints file given (--file or POKER_FILE)")?;

        let config = PokerConfig {
            influxdb_endpoint,
            interval: PokerConfig::interval_from_secs(self.interval),
            measurement: self.measurement,
            probe: ProbeConfig {
                timeout: Duration::from_secs(self.timeout),
                accept_invalid_certs: !self.verify_tls,
                transport_failure: self.transport_failure,
            },
            encoder: EncoderOptions {
                emit_counter: self.emit_counter,
                emit_error: self.emit_error,
            },
            max_concurrency: self.max_concurrency,
            debug: self.debug,
        };
        config.validate()?;

        Ok((config, file))
    }
}

fn init(debug: bool) {
    let level = if debug {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    };
    let filter = filter::Targets::new().with_targets(vec![("poker", level)]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.debug);
    trace!("started with args: {args:?}");

    let (config, file) = args.into_config()?;

    let registry = Registry::new(read_targets_file(&file)?);
    info!("loaded {} endpoints from {file}", registry.len());

    let driver = CycleDriver::from_config(&config, registry)?;

    driver
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
