//! Sealed relay server
//!
//! `serve` runs the submission endpoint and the relay worker in one
//! process; `keygen` writes the RSA key pair browsers encrypt against.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sealed_relay::api::create_api_server;
use sealed_relay::config::RelayConfig;
use sealed_relay::crypto::{write_keypair, AtRestCipher, SubmissionDecryptor};
use sealed_relay::delivery::{DeliveryChannel, TelegramTransport};
use sealed_relay::metrics;
use sealed_relay::queue::{QueueStore, RedisQueue};
use sealed_relay::relay::{RelayWorker, SubmissionIntake};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sealed-relay")]
#[command(version, about = "Encrypted form submission relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP endpoint and the relay worker
    Serve(ServeArgs),

    /// Generate an RSA key pair for submissions
    Keygen {
        /// Directory receiving private_key.pem and public_key.pem
        #[arg(long, default_value = "keys")]
        out_dir: PathBuf,

        /// RSA modulus size
        #[arg(long, default_value = "2048")]
        bits: usize,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// JSON config file; flags below override its values
    #[arg(short, long, env = "SEALED_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long, env = "SEALED_RELAY_LISTEN_ADDR")]
    listen_addr: Option<SocketAddr>,

    /// PKCS#8 PEM private key
    #[arg(long, env = "SEALED_RELAY_PRIVATE_KEY")]
    private_key: Option<PathBuf>,

    /// At-rest key file, created on first run
    #[arg(long, env = "SEALED_RELAY_AT_REST_KEY")]
    at_rest_key: Option<PathBuf>,

    /// Redis URL of the queue store
    #[arg(long, env = "SEALED_RELAY_REDIS_URL")]
    redis_url: Option<String>,

    /// Redis list holding queued submissions
    #[arg(long, env = "SEALED_RELAY_QUEUE_KEY")]
    queue_key: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Recipient chat ids (comma-separated)
    #[arg(long, env = "SEALED_RELAY_RECIPIENTS", value_delimiter = ',')]
    recipients: Vec<String>,

    /// Per-recipient delivery timeout in milliseconds
    #[arg(long, env = "SEALED_RELAY_DELIVERY_TIMEOUT_MS")]
    delivery_timeout_ms: Option<u64>,

    /// Prometheus exporter address
    #[arg(long, env = "SEALED_RELAY_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

impl ServeArgs {
    fn into_config(self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(path) = self.private_key {
            config.private_key_path = path;
        }
        if let Some(path) = self.at_rest_key {
            config.at_rest_key_path = path;
        }
        if let Some(url) = self.redis_url {
            config.queue.url = url;
        }
        if let Some(key) = self.queue_key {
            config.queue.key = key;
        }
        if let Some(token) = self.bot_token {
            config.telegram.bot_token = token;
        }
        if !self.recipients.is_empty() {
            config.recipients = self.recipients;
        }
        if let Some(ms) = self.delivery_timeout_ms {
            config.delivery_timeout_ms = ms;
        }
        if self.metrics_addr.is_some() {
            config.metrics_addr = self.metrics_addr;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    match Cli::parse().command {
        Command::Serve(args) => serve(args.into_config()?).await,
        Command::Keygen { out_dir, bits } => keygen(out_dir, bits).await,
    }
}

async fn keygen(out_dir: PathBuf, bits: usize) -> Result<()> {
    let dir = out_dir.clone();
    let (private_path, public_path) = tokio::task::spawn_blocking(move || write_keypair(dir, bits))
        .await?
        .with_context(|| format!("Failed to write key pair to {}", out_dir.display()))?;

    info!(
        private_key = %private_path.display(),
        public_key = %public_path.display(),
        bits,
        "Generated key pair"
    );
    Ok(())
}

async fn serve(config: RelayConfig) -> Result<()> {
    let config = Arc::new(config);

    // Descriptions must be registered after the recorder is installed
    if let Some(addr) = config.metrics_addr {
        metrics::start_metrics_server(addr).context("Failed to start metrics exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::init_metrics();

    let decryptor = SubmissionDecryptor::from_pem_file(&config.private_key_path)
        .with_context(|| {
            format!(
                "Failed to load private key from {}",
                config.private_key_path.display()
            )
        })?;
    let cipher = Arc::new(
        AtRestCipher::load_or_generate(&config.at_rest_key_path).with_context(|| {
            format!(
                "Failed to load at-rest key from {}",
                config.at_rest_key_path.display()
            )
        })?,
    );

    let queue_config = config.queue.clone();
    let queue: Arc<dyn QueueStore> = Arc::new(
        tokio::task::spawn_blocking(move || RedisQueue::connect(&queue_config))
            .await?
            .context("Failed to connect to queue store")?,
    );

    let transport =
        TelegramTransport::new(&config.telegram).context("Failed to build delivery transport")?;
    let channel = DeliveryChannel::new(Handle::current(), Arc::new(transport))
        .with_timeout(config.delivery_timeout());

    let worker = RelayWorker::new(queue.clone(), cipher.clone(), channel, config.clone())
        .spawn()
        .context("Failed to start relay worker")?;

    let intake = Arc::new(SubmissionIntake::new(decryptor, cipher, queue));
    let app = create_api_server(intake);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(
        addr = %config.listen_addr,
        recipients = config.recipient_set().len(),
        "Sealed relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Stopping relay worker");
    let stats = tokio::task::spawn_blocking(move || worker.shutdown())
        .await?
        .context("Relay worker did not stop cleanly")?;
    info!("{}", stats);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
