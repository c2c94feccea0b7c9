//! `tcs` command-line subscriber.

mod run;

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tcs", version, about = "Subscribe to a pushed chat event stream")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Settings for the default command, taken from the environment only.
#[derive(Debug, Parser)]
#[command(name = "tcs")]
struct EnvDefaults {
    #[command(flatten)]
    subscribe: SubscribeArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the callback listener and subscribe (default).
    Subscribe(SubscribeArgs),
    /// Load a config file and report the resolved target URL.
    CheckConfig { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Raw,
    Structured,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SubscribeArgs {
    /// Subscription endpoint of the remote service. `--config` wins when both are set.
    #[arg(long, env = "TCS_TARGET_URL")]
    pub target_url: Option<String>,
    /// JSON (or .toml) file holding `targetURL`.
    #[arg(long, env = "TCS_CONFIG")]
    pub config: Option<PathBuf>,
    /// Regular expression forwarded to the remote; not evaluated locally.
    #[arg(long, env = "TCS_FILTER", default_value = ".*")]
    pub filter: String,
    #[arg(long, env = "TCS_LISTEN", default_value_t = tcs_client::DEFAULT_LISTEN_ADDR)]
    pub listen: SocketAddr,
    /// Address the remote should call back on. Defaults to the bound listener.
    #[arg(long, env = "TCS_CALLBACK_URL")]
    pub callback_url: Option<String>,
    #[arg(long, default_value = tcs_client::DEFAULT_CALLBACK_PATH)]
    pub callback_path: String,
    #[arg(long, value_enum, default_value_t = Mode::Raw)]
    pub mode: Mode,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(anyhow::anyhow!("load .env: {e}"));
        }
    }
    init_tracing()?;

    let command = match Cli::parse().command {
        Some(command) => command,
        None => Command::Subscribe(EnvDefaults::try_parse_from(["tcs"])?.subscribe),
    };

    match command {
        Command::Subscribe(args) => run::subscribe(args).await,
        Command::CheckConfig { path } => {
            let cfg = tcs_client::Config::load(&path).await?;
            tracing::info!(config_path = %path.display(), target_url = %cfg.target_url, "config ok");
            println!("{}", cfg.target_url);
            Ok(())
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("info,tcs=debug,tcs_app=debug,tcs_client=debug,tower_http=info"),
    };
    let log_format = std::env::var("TCS_LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .to_ascii_lowercase();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    match log_format.as_str() {
        "json" => builder.json().flatten_event(true).init(),
        "pretty" => builder.pretty().init(),
        "compact" => builder.compact().init(),
        other => {
            return Err(anyhow::anyhow!(
                "unsupported TCS_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }

    tracing::info!(
        log_format = %log_format,
        env_filter = ?std::env::var("RUST_LOG").ok(),
        "tracing initialized"
    );
    Ok(())
}
