use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "msgbridge")]
#[command(about = "Relay chat messages to an HTTP webhook and send its replies back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Pair (first run) or resume the messaging session and relay inbound messages until Ctrl+C.
    Run {
        /// Config file path (default: MSGBRIDGE_CONFIG_PATH or ~/.msgbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Session store file (overrides config and MSGBRIDGE_STORE_PATH)
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,

        /// Webhook URL (overrides config and MSGBRIDGE_WEBHOOK_URL)
        #[arg(long, value_name = "URL")]
        webhook_url: Option<String>,
    },

    /// Show whether a device is paired.
    Status {
        /// Config file path (default: MSGBRIDGE_CONFIG_PATH or ~/.msgbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Delete the stored session so the next run pairs again.
    Logout {
        /// Config file path (default: MSGBRIDGE_CONFIG_PATH or ~/.msgbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Version) => {
            println!("msgbridge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Commands::Run {
            config,
            store,
            webhook_url,
        }) => run(config, store, webhook_url).await,
        Some(Commands::Status { config }) => status(config).await,
        Some(Commands::Logout { config }) => logout(config).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };
    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Load config and initialize logging with its level (RUST_LOG still wins).
/// Logging is initialized even when loading fails so the error gets reported.
fn load_config(path: Option<PathBuf>) -> anyhow::Result<bridge::config::Config> {
    match bridge::config::load_config(path) {
        Ok((config, path)) => {
            init_logging(&config.log.level);
            log::debug!("config loaded from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            init_logging("info");
            Err(e)
        }
    }
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn run(
    config_path: Option<PathBuf>,
    store: Option<PathBuf>,
    webhook_url: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(path) = store {
        config.session.store_path = path;
    }
    if let Some(url) = webhook_url {
        config.webhook.url = Some(url);
    }
    bridge::bridge::run_bridge(config).await?;
    log::info!("msgbridge stopped");
    Ok(())
}

async fn status(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = bridge::store::SessionStore::open(&config.session.store_path).await?;
    match (store.has_identity().await, store.device_id().await) {
        (true, Some(id)) => println!("paired as device {} ({})", id, store.path().display()),
        (false, Some(id)) => println!(
            "pairing started for device {} but never confirmed ({})",
            id,
            store.path().display()
        ),
        _ => println!("not paired ({})", store.path().display()),
    }
    Ok(())
}

async fn logout(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = bridge::store::SessionStore::open(&config.session.store_path).await?;
    store.clear().await?;
    println!("removed session at {}", store.path().display());
    Ok(())
}
