//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{debug, debug_span};

use crate::route::{Metric, NextHop, RouterId};

// Routing engine debug messages.
#[derive(Debug)]
pub enum Debug {
    InstanceCreate,
    InstanceStart,
    InstanceStop,
    PacketRx(RouterId, usize),
    PacketTx(RouterId, usize),
    PeriodicUpdate,
    TriggeredUpdate,
    RouteCreate(RouterId, NextHop, Metric),
    RouteUpdate(RouterId, NextHop, Metric),
    RouteTimeout(RouterId),
    RouteGcTimeout(RouterId),
    RouteInvalidate(RouterId),
}

// ===== impl Debug =====

impl Debug {
    // Log debug message using the tracing API.
    pub fn log(&self) {
        match self {
            Debug::InstanceCreate
            | Debug::InstanceStart
            | Debug::InstanceStop => {
                // Parent span(s): rip-instance
                debug!("{}", self);
            }
            Debug::PacketRx(source, entries) => {
                // Parent span(s): rip-instance
                debug_span!("network").in_scope(|| {
                    debug_span!("input", router_id = %source).in_scope(
                        || {
                            debug!(entries, "{}", self);
                        },
                    );
                });
            }
            Debug::PacketTx(destination, entries) => {
                // Parent span(s): rip-instance
                debug_span!("network").in_scope(|| {
                    debug_span!("output", router_id = %destination)
                        .in_scope(|| {
                            debug!(entries, "{}", self);
                        });
                });
            }
            Debug::PeriodicUpdate | Debug::TriggeredUpdate => {
                // Parent span(s): rip-instance
                debug!("{}", self);
            }
            Debug::RouteCreate(destination, next_hop, metric)
            | Debug::RouteUpdate(destination, next_hop, metric) => {
                let next_hop = match next_hop {
                    NextHop::Myself => "self".to_owned(),
                    NextHop::Neighbor(id) => id.to_string(),
                };
                // Parent span(s): rip-instance
                debug!(
                    %destination,
                    next_hop,
                    metric = %metric.get(),
                    "{}",
                    self
                );
            }
            Debug::RouteTimeout(destination)
            | Debug::RouteGcTimeout(destination)
            | Debug::RouteInvalidate(destination) => {
                // Parent span(s): rip-instance
                debug!(%destination, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InstanceStart => {
                write!(f, "starting instance")
            }
            Debug::InstanceStop => {
                write!(f, "stopping instance")
            }
            Debug::PacketRx(..) => {
                write!(f, "packet received")
            }
            Debug::PacketTx(..) => {
                write!(f, "packet sent")
            }
            Debug::PeriodicUpdate => {
                write!(f, "periodic update")
            }
            Debug::TriggeredUpdate => {
                write!(f, "triggered update")
            }
            Debug::RouteCreate(..) => {
                write!(f, "route created")
            }
            Debug::RouteUpdate(..) => {
                write!(f, "route updated")
            }
            Debug::RouteTimeout(..) => {
                write!(f, "route timed out")
            }
            Debug::RouteGcTimeout(..) => {
                write!(f, "route deleted")
            }
            Debug::RouteInvalidate(..) => {
                write!(f, "route invalidated")
            }
        }
    }
}
