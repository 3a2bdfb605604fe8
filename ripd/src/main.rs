//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

mod config;
mod dump;
mod transport;

use std::net::{Ipv4Addr, SocketAddr};

use clap::{App, Arg};
use config::Config;
use ripd_core::instance::{Instance, InstanceConfig};
use ripd_core::neighbor::{NeighborConfig, NeighborTable};
use ripd_core::route::Metric;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive("ripd=info".parse().unwrap())
        .with_env_var("RIPD_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn build_neighbor_table(config: &Config) -> NeighborTable {
    let mut neighbors = NeighborTable::new();
    for entry in &config.output_ports {
        neighbors.insert(NeighborConfig {
            router_id: entry.neighbor_router_id,
            dest_addr: SocketAddr::from((
                Ipv4Addr::LOCALHOST,
                entry.local_port,
            )),
            link_metric: Metric::from(entry.link_metric),
        });
    }
    neighbors
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn async_main(config: Config) {
    let sockets = match transport::bind_sockets(&config.input_ports).await {
        Ok(sockets) => sockets,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    info!(
        router_id = config.router_id,
        input_ports = ?config.input_ports,
        neighbors = config.output_ports.len(),
        "starting up"
    );

    let neighbors = build_neighbor_table(&config);
    let instance_config = InstanceConfig {
        router_id: config.router_id,
        neighbors,
        timers: config.timers.to_timer_config(),
        sockets,
        on_periodic: Some(Box::new(dump::print_table)),
    };
    let instance = Instance::new(instance_config);

    tokio::select! {
        _ = instance.run() => {}
        _ = shutdown_signal() => {
            info!("shutting down");
        }
    }
}

fn main() {
    let matches = App::new("ripd")
        .version(clap::crate_version!())
        .about("distance-vector routing daemon over UDP on loopback")
        .arg(
            Arg::with_name("config")
                .help("path to the configuration file")
                .required(true)
                .index(1),
        )
        .get_matches();

    init_tracing();

    let config_path = matches.value_of("config").unwrap();
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(error) => {
            error.print();
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to create async runtime: {error}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async_main(config));
}
