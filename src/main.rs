use anyhow::Result;
use clap::Parser;
use fxgate::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long)]
    config_path: Option<String>,

    /// Address to listen on, overrides LISTEN_ADDR and the config file
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = fxgate::run(cli.config_path.as_deref(), cli.listen.as_deref()).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Server failed");
    }
    result
}
