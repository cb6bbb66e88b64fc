use std::time::Duration;

use chain_socks5::{Config, Credentials, Socks5, SocksError, Upstream};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Run as the exit server instead of the local chaining client
    #[arg(long)]
    server: bool,

    /// Listen host (default 127.0.0.1 for the client, 0.0.0.0 for the server)
    #[arg(long)]
    host: Option<String>,

    /// Listen port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Username: required from clients on the server, presented upstream on the client
    #[arg(short, long, default_value = "")]
    username: String,

    /// Password matching --username
    #[arg(long, default_value = "")]
    passwd: String,

    /// Upstream exit server host (client only)
    #[arg(long, default_value = "127.0.0.1")]
    remote_addr: String,

    /// Upstream exit server port (client only)
    #[arg(long, default_value_t = 10808)]
    remote_port: u16,

    /// Outbound connect timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Client only: rewrite authentication but relay requests unparsed
    #[arg(long)]
    passthrough: bool,

    /// DEBUG, INFO, WARN or ERROR; RUST_LOG takes precedence
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), SocksError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_level.to_lowercase())),
        )
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    let config = build_config(&args)?.with_connect_timeout(Duration::from_secs(args.timeout));

    let host = args.host.as_deref().unwrap_or(if args.server {
        "0.0.0.0"
    } else {
        "127.0.0.1"
    });

    let server = match Socks5::bind((host, args.port), config).await {
        Ok(server) => server,
        Err(e) => {
            error!(%host, port = args.port, error = %e, "failed to bind");
            return Err(e);
        }
    };

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C");
            on_signal.cancel();
        }
    });

    server.run_until(shutdown).await
}

fn build_config(args: &Args) -> Result<Config, SocksError> {
    let credentials = if args.username.is_empty() {
        None
    } else {
        Some(Credentials::new(&args.username, &args.passwd)?)
    };

    if args.server {
        return Ok(match credentials {
            Some(credentials) => {
                info!(user = credentials.username(), "username/password required");
                Config::exit_with_authenticator(credentials)
            }
            None => {
                info!("running without authentication");
                Config::exit()
            }
        });
    }

    let mut upstream = Upstream::new(upstream_addr(&args.remote_addr, args.remote_port));
    if let Some(credentials) = credentials {
        upstream = upstream.with_credentials(credentials);
    }

    Ok(if args.passthrough {
        Config::passthrough(upstream)
    } else {
        Config::chain(upstream)
    })
}

/// `host:port`, bracketing IPv6 literals.
fn upstream_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
