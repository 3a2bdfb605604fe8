//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

//! Binds the UDP sockets named by the configuration file. Binding is kept
//! out of `ripd-core` entirely: the engine operates on already-bound
//! sockets handed to it, same as it operates on an already-parsed
//! configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;

#[derive(Debug)]
pub struct PortBindError {
    pub port: u16,
    pub source: std::io::Error,
}

impl std::fmt::Display for PortBindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to bind UDP port {}: {}",
            self.port, self.source
        )
    }
}

impl std::error::Error for PortBindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Binds one non-blocking UDP socket per configured input port, all on the
/// loopback address.
pub async fn bind_sockets(
    ports: &[u16],
) -> Result<Vec<Arc<UdpSocket>>, PortBindError> {
    let mut sockets = Vec::with_capacity(ports.len());
    for &port in ports {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let socket =
            UdpSocket::bind(addr).await.map_err(|source| PortBindError {
                port,
                source,
            })?;
        sockets.push(Arc::new(socket));
    }
    Ok(sockets)
}
