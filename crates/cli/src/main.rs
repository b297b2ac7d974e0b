//! `skyrelay`: run the signalling relay
//!
//! Settings come from built-in defaults, then an optional TOML file, then
//! `SKYRELAY__*` environment variables, then the flags below.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use skyrelay_call_engine::{RelayConfig, RelayServer};
use skyrelay_infra_common::{LoggingConfig, log_welcome, parse_log_level, setup_logging};

#[derive(Parser, Debug)]
#[command(name = "skyrelay")]
#[command(version, about = "WebRTC signalling relay with REST polling and WebSocket transports")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "SKYRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:5000
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Directory of static client files served at `/`
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Flags win over every other configuration source
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(dir) = &self.static_dir {
            config.server.static_dir = Some(dir.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = RelayConfig::load(args.config.as_deref()).context("loading configuration")?;
    args.apply(&mut config);

    let mut logging = LoggingConfig::new(parse_log_level(&config.logging.level)?, "skyrelay");
    if config.logging.json {
        logging = logging.with_json();
    }
    setup_logging(&logging)?;
    log_welcome("SkyRelay", env!("CARGO_PKG_VERSION"));

    let mut server = RelayServer::new(config).await.context("starting relay")?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::try_parse_from([
            "skyrelay",
            "--bind",
            "127.0.0.1:8080",
            "--log-level",
            "debug",
            "--static-dir",
            "public",
            "--json-logs",
        ])
        .unwrap();

        let mut config = RelayConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server.bind_address, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.static_dir, Some(PathBuf::from("public")));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::try_parse_from(["skyrelay"]).unwrap();
        let mut config = RelayConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server.bind_address.port(), 5000);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_bad_bind_address_is_rejected() {
        assert!(Args::try_parse_from(["skyrelay", "--bind", "not-an-address"]).is_err());
    }
}
