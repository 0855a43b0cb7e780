use clap::Parser;
use dingz_bridge::Accessory;
use dingz_bridge::config::{Config, load_dotenv};
use dingz_bridge::device::HttpDeviceClient;
use dingz_bridge::events::EventBus;
use dingz_bridge::instance_lock::InstanceLock;
use dingz_bridge::services::LoggingHost;
use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "dingz-bridge", version, about = "Bridge a dingz wall device to a smart-home host")]
struct Args {
    /// Device address (host, IP or URL)
    #[arg(long, env = "DINGZ_ADDRESS")]
    address: Option<String>,

    /// API bearer token
    #[arg(long, env = "DINGZ_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Accessory display name
    #[arg(long, env = "DINGZ_NAME")]
    name: Option<String>,

    /// Log filter, e.g. "debug" or "dingz_bridge=trace"
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logger(level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    // --log-level wins over RUST_LOG
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.format_timestamp_millis().init();
}

fn main() -> ExitCode {
    // Environment is only written here, while the process is single threaded
    load_dotenv();
    let args = Args::parse();
    init_logger(args.log_level.as_deref());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(args))
}

async fn run(args: Args) -> ExitCode {
    info!("Starting dingz bridge");

    let mut config = Config::from_env();
    if let Some(address) = args.address {
        config.device.address = address;
    }
    if let Some(token) = args.token.filter(|t| !t.is_empty()) {
        config.device.token = Some(token);
    }
    if let Some(name) = args.name {
        config.device.name = name;
    }
    if let Err(e) = config.validate() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    info!("Configuration loaded:");
    info!("  Device: {}", config.device.address);
    info!("  Name: {}", config.device.name);
    info!("  State poll: {:?}", config.polling.state_interval());
    info!("  Motion poll: {:?}", config.polling.motion_interval());
    info!("  Reconcile: {:?}", config.reconcile.interval());

    let _lock = match InstanceLock::acquire(&config.device.address) {
        Ok(lock) => lock,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = match HttpDeviceClient::new(
        &config.device.address,
        config.device.token.clone(),
        config.polling.request_timeout(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = Arc::new(LoggingHost::new(config.device.name.clone()));
    let bus = EventBus::new();
    let accessory = match Accessory::connect(&config, Arc::new(client), host, bus).await {
        Ok(accessory) => accessory,
        Err(e) => {
            error!("Failed to connect to {}: {}", config.device.address, e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let reconcile_task = tokio::spawn(accessory.clone().run_reconciliation(cancel.clone()));

    info!("dingz bridge is running for {}", accessory.identity());
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    cancel.cancel();
    if let Err(e) = reconcile_task.await {
        error!("Reconciliation task failed: {}", e);
    }
    accessory.shutdown();

    info!("dingz bridge stopped");
    ExitCode::SUCCESS
}
