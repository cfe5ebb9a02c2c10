use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use urlconnect::config::Config;
use urlconnect::Dispatcher;

#[derive(Parser)]
#[command(name = "urlconnect")]
#[command(about = "Resolve a service URL and open a TCP connection to it")]
struct Args {
    /// Target URL, e.g. tcp://[::1]:8080 or etcd:///services/api
    url: String,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overall timeout in seconds, overrides the configured value
    #[arg(short, long)]
    timeout: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("urlconnect={}", level))
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file_with_env(path).await?,
        None => Config::default(),
    };

    let registry = config.build_registry().await?;
    info!(schemes = ?registry.schemes(), "Registry ready");
    let dispatcher = Dispatcher::new(Arc::new(registry));

    let timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => config.connect_timeout(),
    };

    let stream = match timeout {
        Some(timeout) => dispatcher.connect_timeout(&args.url, timeout).await?,
        None => dispatcher.connect(&args.url).await?,
    };

    println!("{}", stream.peer_addr()?);
    info!(
        peer = %stream.peer_addr()?,
        local = %stream.local_addr()?,
        "Connected to {}",
        args.url
    );
    Ok(())
}
