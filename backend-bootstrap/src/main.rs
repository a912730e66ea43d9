use anyhow::Result;
use clap::Parser;

use backend_bootstrap::{logging, run_standalone, AppContext};
use backend_infrastructure::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "burnroom-relay")]
#[command(about = "Burnroom realtime relay", long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(config) = args.config {
        std::env::set_var("BURNROOM_CONFIG", config);
    }

    let config = AppConfig::load().await?;
    let _log_guard = logging::init_tracing(&config)?;

    let context = AppContext::new(config).await?;
    run_standalone(context).await
}
