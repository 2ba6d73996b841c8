//! Directory server entry point
//!
//! ```bash
//! ripple-directory -c directory -cPath /etc/ripple,.
//! ripple-directory -migrate   # bootstrap the schema, then exit
//! ```

use ripple_common::{try_init_tracing, AppConfig, CliArgs};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing() {
        eprintln!("warning: failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "directory failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::from_env();
    args.load_dotenv()?;

    let config = AppConfig::from_env()?;
    info!(
        env = ?config.app.env,
        port = config.directory.port,
        "configuration loaded"
    );

    if args.migrate {
        let pool = ripple_directory::server::create_pool(&config).await?;
        ripple_directory::run_migrations(&pool).await?;
        info!("migration complete");
        return Ok(());
    }

    ripple_directory::run(config).await?;
    Ok(())
}
