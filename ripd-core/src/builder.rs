//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use itertools::Itertools;

use crate::packet::{Message, RouteEntry, MAX_ENTRIES_PER_MESSAGE};
use crate::route::{Metric, NextHop, RouteFlags, RouteTable, RouterId};

/// Builds the sequence of response messages to send to one neighbor, under
/// split-horizon-with-poisoned-reverse.
///
/// When `only_changed` is set (triggered updates) only routes with
/// [`RouteFlags::CHANGED`] are considered; periodic updates pass `false` and
/// advertise the whole table.
pub fn build(
    table: &RouteTable,
    own_router_id: RouterId,
    neighbor_id: RouterId,
    only_changed: bool,
) -> Vec<Message> {
    if table.is_empty() {
        return vec![Message::new(own_router_id, Vec::new())];
    }

    let entries: Vec<RouteEntry> = table
        .iter()
        .filter(|route| route.destination != neighbor_id)
        .filter(|route| {
            !only_changed || route.flags.contains(RouteFlags::CHANGED)
        })
        .map(|route| {
            let poisoned = route.next_hop == NextHop::Neighbor(neighbor_id);
            RouteEntry {
                destination: route.destination,
                metric: if poisoned { Metric::infinite() } else { route.metric },
            }
        })
        .collect();

    if entries.is_empty() {
        return Vec::new();
    }

    entries
        .into_iter()
        .chunks(MAX_ENTRIES_PER_MESSAGE)
        .into_iter()
        .map(|chunk| Message::new(own_router_id, chunk.collect()))
        .collect()
}
