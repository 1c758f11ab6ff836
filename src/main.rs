use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use terraform_provider_woodpecker::{
    init_logging_with_default, serve_on_with_options, serve_with_options, ServeOptions,
    WoodpeckerProvider,
};

/// Woodpecker CI infrastructure provider plugin
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-woodpecker")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen on this address instead of an ephemeral loopback port
    #[arg(long, env = "WOODPECKER_PROVIDER_ADDRESS")]
    address: Option<SocketAddr>,

    /// Seconds in-flight requests may run after a shutdown signal
    #[arg(long, default_value_t = 30)]
    shutdown_timeout: u64,

    /// Log level used when neither RUST_LOG nor TF_LOG is set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging_with_default(&cli.log_level);

    let options =
        ServeOptions::new().with_shutdown_timeout(Duration::from_secs(cli.shutdown_timeout));
    let provider = WoodpeckerProvider::new();

    match cli.address {
        Some(addr) => serve_on_with_options(provider, addr, options).await,
        None => serve_with_options(provider, options).await,
    }
}
