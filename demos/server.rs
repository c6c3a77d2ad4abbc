use anyhow::Context;
use clap::Parser;
use log::{info, LevelFilter};
use remotefs::{config::ServerConfig, server::Server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "remotefs-server")]
#[command(about = "Serves the local file system to remotefs clients", long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the configuration file
    #[arg(short, long, env = "REMOTEFS_LISTEN")]
    listen: Option<String>,

    /// Path to the users file, overrides the configuration file
    #[arg(short, long)]
    users: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }

    if let Some(users) = args.users {
        config.users_file = users;
    }

    let server = Server::from_config(&config);
    let addr = server.start_listening(&config.listen_addr).await?;
    info!("listening on {} with users from {}", addr, config.users_file.display());

    tokio::signal::ctrl_c().await?;

    info!("stopping");
    server.stop_listening();
    server.shutdown().await;

    Ok(())
}
