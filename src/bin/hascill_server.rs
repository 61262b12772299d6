use std::net::{IpAddr, SocketAddr};

use anyhow::Context;
use clap::Parser;

use hascill::config::ServerConfig;
use hascill::logging::init_tracing;
use hascill::turn::RotatePolicy;

const LOG_TARGET: &str = "bin::hascill_server";

#[derive(Debug, Parser)]
#[command(name = "hascill_server")]
#[command(about = "Launch the HASCILL Crypto Race multiplayer coordinator", long_about = None)]
struct Args {
    /// Address to bind the TCP listener to
    #[arg(long, env = "HASCILL_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to bind the TCP listener to
    #[arg(long, env = "HASCILL_PORT", default_value_t = 5050)]
    port: u16,

    /// Challenge password (4 ASCII characters in the base game)
    #[arg(long, env = "HASCILL_PASSWORD", default_value = "PAZ9")]
    password: String,

    /// Challenge message (4 ASCII characters in the base game)
    #[arg(long, env = "HASCILL_MESSAGE", default_value = "Hils")]
    message: String,

    /// Turn rotation policy
    #[arg(long, value_enum, env = "HASCILL_ROTATE", default_value = "phase")]
    rotate: RotatePolicy,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "HASCILL_LOG_JSON", default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = build_config(args).context("failed to build server config")?;
    tracing::info!(target: LOG_TARGET, addr = %config.bind, "starting hascill_server");
    hascill::server::run(config).await
}

fn build_config(args: Args) -> anyhow::Result<ServerConfig> {
    if args.password.len() != 4 || !args.password.is_ascii() {
        anyhow::bail!("--password requires exactly 4 ASCII characters, got {:?}", args.password);
    }
    if args.message.len() != 4 || !args.message.is_ascii() {
        anyhow::bail!("--message requires exactly 4 ASCII characters, got {:?}", args.message);
    }

    let bind = SocketAddr::new(args.host, args.port);
    Ok(ServerConfig::new(bind, args.password, args.message, args.rotate))
}
