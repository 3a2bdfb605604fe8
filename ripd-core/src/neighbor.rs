//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::route::{Metric, RouterId};

/// A statically configured neighbor descriptor (an `output_ports` entry).
/// Immutable once the instance is built — unlike most other distance-vector
/// protocols, this one has no hello/session concept of its own; everything
/// dynamic about a neighbor relationship lives in the route table entry
/// whose next hop is that neighbor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NeighborConfig {
    pub router_id: RouterId,
    /// The UDP port on the loopback address that this neighbor listens on;
    /// the destination used for `sendto` when advertising to it.
    pub dest_addr: SocketAddr,
    pub link_metric: Metric,
}

/// The set of configured neighbors, looked up by router ID both when a
/// datagram's source router ID needs to be recognized and when a message
/// is being built for a specific destination.
#[derive(Clone, Debug, Default)]
pub struct NeighborTable {
    neighbors: BTreeMap<RouterId, NeighborConfig>,
}

impl NeighborTable {
    pub fn new() -> Self {
        NeighborTable::default()
    }

    pub fn insert(&mut self, neighbor: NeighborConfig) {
        self.neighbors.insert(neighbor.router_id, neighbor);
    }

    pub fn get(&self, router_id: RouterId) -> Option<&NeighborConfig> {
        self.neighbors.get(&router_id)
    }

    pub fn contains(&self, router_id: RouterId) -> bool {
        self.neighbors.contains_key(&router_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborConfig> {
        self.neighbors.values()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
