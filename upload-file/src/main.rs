use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use upload_file::cli::{run, Cli};
use upload_file_core::ci::CiEnvironment;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = Cli::parse();
    let ci = CiEnvironment::from_vars(std::env::vars());
    tracing::info!("CLI arguments parsed, invoking run");

    match run(cli, ci).await {
        Ok(_) => {
            println!("Upload completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "CLI exited with error");
            Err(e)
        }
    }
}
