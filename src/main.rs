mod cli;

use clap::Parser;
use cli::{Cli, Commands};

use lectoria::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => server::run(args.address).await?,
    }

    Ok(())
}
