//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::SocketAddr;

use tracing::{debug, warn};

use crate::route::RouterId;

// Routing engine errors.
#[derive(Debug)]
pub enum Error {
    Io(IoError),
    Decode(DecodeError),
    UnknownSource(RouterId),
}

// I/O errors.
#[derive(Debug)]
pub enum IoError {
    SocketError(std::io::Error),
    RecvError(std::io::Error),
    SendError(std::io::Error),
    SendWouldBlock(SocketAddr),
}

// Packet decode/validation errors (see packet module).
#[derive(Debug)]
pub enum DecodeError {
    MalformedPacket(String),
    InvalidCommand(u8),
    InvalidVersion(u8),
    LengthOutOfRange(usize),
    InvalidMetric(u8),
    InvalidDestination(u32),
}

// Route metric errors.
#[derive(Debug)]
pub enum MetricError {
    InvalidValue(u8),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Io(error) => {
                error.log();
            }
            Error::Decode(error) => {
                error.log();
            }
            Error::UnknownSource(router_id) => {
                warn!(%router_id, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(error) => error.fmt(f),
            Error::Decode(error) => error.fmt(f),
            Error::UnknownSource(..) => {
                write!(f, "packet from unknown source discarded")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            Error::Decode(error) => Some(error),
            Error::UnknownSource(..) => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::Io(error)
    }
}

impl From<DecodeError> for Error {
    fn from(error: DecodeError) -> Error {
        Error::Decode(error)
    }
}

// ===== impl IoError =====

impl IoError {
    pub fn log(&self) {
        match self {
            IoError::SocketError(error)
            | IoError::RecvError(error)
            | IoError::SendError(error) => {
                warn!(error = %with_source(error), "{}", self);
            }
            IoError::SendWouldBlock(dest) => {
                // Not fatal: the datagram is dropped and a later update
                // cycle will carry the same information.
                debug!(%dest, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::SocketError(..) => {
                write!(f, "failed to create UDP socket")
            }
            IoError::RecvError(..) => {
                write!(f, "failed to receive UDP datagram")
            }
            IoError::SendError(..) => {
                write!(f, "failed to send UDP datagram")
            }
            IoError::SendWouldBlock(dest) => {
                write!(f, "send to {dest} would block, datagram dropped")
            }
        }
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IoError::SocketError(error)
            | IoError::RecvError(error)
            | IoError::SendError(error) => Some(error),
            IoError::SendWouldBlock(..) => None,
        }
    }
}

// ===== impl DecodeError =====

impl DecodeError {
    pub fn log(&self) {
        warn!(error = %self, "failed to process packet");
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::MalformedPacket(reason) => {
                write!(f, "malformed packet: {reason}")
            }
            DecodeError::InvalidCommand(value) => {
                write!(f, "invalid command value {value}")
            }
            DecodeError::InvalidVersion(value) => {
                write!(f, "invalid version value {value}")
            }
            DecodeError::LengthOutOfRange(count) => {
                write!(f, "entry count {count} out of range [0, 25]")
            }
            DecodeError::InvalidMetric(value) => {
                write!(f, "invalid metric value {value}")
            }
            DecodeError::InvalidDestination(value) => {
                write!(f, "invalid destination router id {value}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

// ===== impl MetricError =====

impl std::fmt::Display for MetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricError::InvalidValue(value) => {
                write!(f, "invalid RIP metric {value}")
            }
        }
    }
}

impl std::error::Error for MetricError {}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
