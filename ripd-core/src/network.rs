//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug_span, Instrument};

use crate::error::IoError;
use crate::tasks::Task;

/// A datagram handed from the receive loop to the update processor, tagged
/// with the instant it arrived so timeout/gc deadlines are computed off a
/// single consistent clock reading.
#[derive(Debug)]
pub struct InboundDatagram {
    pub bytes: Vec<u8>,
    pub arrival_time: Instant,
}

// ===== global functions =====

/// Sends one datagram on the given socket without blocking. A would-block
/// condition is reported to the caller, not retried: the datagram is
/// dropped and convergence recovers via a later update.
pub(crate) fn send_packet(
    socket: &UdpSocket,
    bytes: &[u8],
    dest: SocketAddr,
) -> Result<(), IoError> {
    match socket.try_send_to(bytes, dest) {
        Ok(_) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
            Err(IoError::SendWouldBlock(dest))
        }
        Err(error) => Err(IoError::SendError(error)),
    }
}

pub(crate) async fn read_loop(
    socket: Arc<UdpSocket>,
    inboundp: UnboundedSender<InboundDatagram>,
) -> Result<(), SendError<InboundDatagram>> {
    let mut buf = [0; 16384];

    loop {
        let num_bytes = match socket.recv(&mut buf).await {
            Ok(num_bytes) => num_bytes,
            Err(error) => {
                IoError::RecvError(error).log();
                continue;
            }
        };

        let msg = InboundDatagram {
            bytes: buf[0..num_bytes].to_vec(),
            arrival_time: Instant::now(),
        };
        inboundp.send(msg)?;
    }
}

// ===== task spawn helpers =====

/// Spawns the receive task for one bound socket. Supervised so a single
/// malformed datagram, or a panic deep in decoding, never silences the
/// whole instance.
pub(crate) fn udp_rx(
    socket: &Arc<UdpSocket>,
    inboundp: &UnboundedSender<InboundDatagram>,
) -> Task<()> {
    let span1 = debug_span!("network");
    let _span1_guard = span1.enter();
    let span2 = debug_span!("input");
    let _span2_guard = span2.enter();

    let socket = socket.clone();
    let inboundp = inboundp.clone();

    Task::spawn_supervised(move || {
        let socket = socket.clone();
        let inboundp = inboundp.clone();
        async move {
            let _ = read_loop(socket, inboundp).await;
        }
        .in_current_span()
    })
}
