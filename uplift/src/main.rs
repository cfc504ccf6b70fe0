use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use args::Args;
use clap::Parser;
use config::Config;
use server::ServeConfig;
use tokio_util::sync::CancellationToken;

mod args;
mod logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args);

    let config = args.config()?;

    if args.probe {
        return probe(&config).await;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    if let Err(e) = server::serve(serve_config(&args, config, shutdown)).await {
        log::error!("Server failed to start: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn serve_config(args: &Args, config: Config, shutdown: CancellationToken) -> ServeConfig {
    let listen_address = args
        .listen_address
        .or(config.server.listen_address)
        .unwrap_or(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 3000)));

    ServeConfig {
        listen_address,
        config,
        shutdown,
    }
}

async fn probe(config: &Config) -> anyhow::Result<()> {
    let probes = rewrite::probe(&config.upstream).await?;

    for probe in &probes {
        println!("{probe}");
    }

    match probes.iter().find(|probe| probe.result.is_ok()) {
        Some(probe) => {
            println!("\nFirst working endpoint: {}", probe.endpoint);
            Ok(())
        }
        None => {
            println!("\nNo working endpoint found");
            std::process::exit(1);
        }
    }
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    cancel_on_signal(tokio::signal::ctrl_c(), shutdown).await;
}

/// Cancel `shutdown` once `signal` fires. Without a signal handler the server keeps
/// running until the process is killed.
async fn cancel_on_signal(signal: impl Future<Output = std::io::Result<()>>, shutdown: CancellationToken) {
    match signal.await {
        Ok(()) => {
            log::info!("Shutdown requested, waiting for in-flight requests");
            shutdown.cancel();
        }
        Err(e) => log::error!("Failed to listen for the shutdown signal, graceful shutdown is unavailable: {e}"),
    }
}
