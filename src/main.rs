mod aggregator;
mod collectors;
mod config;
mod http;
mod metrics;
mod report;

use aggregator::HealthAggregator;
use axum::serve;
use clap::Parser;
use config::Config;
use metrics::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "botwatch")]
#[command(version)]
struct Cli {
    /// YAML config; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    listen: Option<String>,
    /// Compute one report, print it as JSON and exit (1 when unhealthy).
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load config");
            std::process::exit(1);
        }
    };

    let aggregator = Arc::new(HealthAggregator::from_config(Arc::new(cfg)));

    if cli.once {
        let report = aggregator.compute_report().await;
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                error!(error = %err, "failed to serialize report");
                std::process::exit(2);
            }
        }
        std::process::exit(if report.is_healthy() { 0 } else { 1 });
    }

    let cfg = aggregator.config();
    info!(
        listen = %cfg.listen,
        root = %cfg.root.display(),
        pattern = %cfg.process.pattern,
        backend = ?cfg.process.backend,
        "starting botwatch"
    );

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "invalid listen address");
            std::process::exit(1);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, listen = %addr, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    let app = http::build_router(metrics, aggregator.clone());
    let server = serve(listener, app).with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to wait for Ctrl+C");
        }
        info!("received Ctrl+C, shutting down");
    });

    if let Err(err) = server.await {
        error!(error = %err, "HTTP server error");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(listen) = &cli.listen {
        cfg.listen = listen.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_listen_overrides_config() {
        let cli = Cli::parse_from(["botwatch", "--listen", "127.0.0.1:9999"]);
        let cfg = load_config(&cli).unwrap();
        assert_eq!(cfg.listen, "127.0.0.1:9999");
    }

    #[test]
    fn cli_rejects_bad_listen_override() {
        let cli = Cli::parse_from(["botwatch", "--listen", "nowhere"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn cli_loads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botwatch.yaml");
        std::fs::write(
            &path,
            "listen: \"127.0.0.1:7000\"\nprocess:\n  pattern: \"main.py\"\n  backend: sysinfo\n",
        )
        .unwrap();
        let cli = Cli::parse_from(["botwatch", "--config", path.to_str().unwrap()]);
        let cfg = load_config(&cli).unwrap();
        assert_eq!(cfg.process.pattern, "main.py");
        assert_eq!(cfg.process.backend, config::ProcessBackend::Sysinfo);
    }

    #[test]
    fn cli_missing_config_file_errors() {
        let cli = Cli::parse_from(["botwatch", "--config", "/definitely/missing.yaml"]);
        assert!(matches!(
            load_config(&cli),
            Err(config::ConfigError::Read { .. })
        ));
    }
}
