//! Relay server entry point
//!
//! ```bash
//! ripple-relay -c relay -cPath /etc/ripple,.
//! ```

use ripple_common::{try_init_tracing, AppConfig, CliArgs};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("warning: failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "relay failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::from_env();
    args.load_dotenv()?;

    let config = AppConfig::from_env()?;
    info!(
        env = ?config.app.env,
        port = config.relay.port,
        "configuration loaded"
    );

    ripple_relay::run(config).await?;
    Ok(())
}
