//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::debug::Debug;
use crate::error::Error;
use crate::neighbor::NeighborTable;
use crate::packet::Message;
use crate::route::{Metric, NextHop, Route, RouteTable};
use crate::tasks::Event;

/// Instant-scoped timer constants the processor needs but does not own.
#[derive(Clone, Copy, Debug)]
pub struct Timers {
    pub timeout: Duration,
    pub garbage_collect: Duration,
}

/// Whether processing this message requires a triggered update to be
/// scheduled afterwards. Emission is deferred until the whole packet has
/// been processed (never interleaved with this packet's own entry
/// updates).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProcessOutcome {
    pub triggered_update: bool,
}

/// Applies one decoded, already-validated response message to the route
/// table, per the distance-vector update rules.
pub fn process(
    table: &mut RouteTable,
    neighbors: &NeighborTable,
    own_router_id: u16,
    timers: Timers,
    eventp: &UnboundedSender<Event>,
    message: Message,
    arrival_time: Instant,
) -> Result<ProcessOutcome, Error> {
    let source = message.source_router_id;

    Debug::PacketRx(source, message.entries.len()).log();

    // Identify the neighbor: a route whose destination is the source, or a
    // fresh directly connected route if the source is a configured
    // neighbor. Anything else is discarded.
    let link_cost = identify_neighbor(
        table, neighbors, source, timers, eventp, arrival_time,
    )?;

    let mut outcome = ProcessOutcome::default();

    for entry in message.entries {
        if entry.destination == own_router_id {
            // Self-advertisement: drop the single entry, keep the packet.
            continue;
        }

        let new_metric = entry.metric.saturating_add(link_cost);
        apply_entry(
            table,
            entry.destination,
            new_metric,
            source,
            timers,
            eventp,
            arrival_time,
            &mut outcome,
        );
    }

    Ok(outcome)
}

/// Looks up or creates the direct-neighbor route for `source`, refreshes
/// its timeout, and returns the link cost to use for entries in this
/// message.
fn identify_neighbor(
    table: &mut RouteTable,
    neighbors: &NeighborTable,
    source: u16,
    timers: Timers,
    eventp: &UnboundedSender<Event>,
    arrival_time: Instant,
) -> Result<Metric, Error> {
    if table.get(source).is_none() {
        let config = neighbors
            .get(source)
            .ok_or(Error::UnknownSource(source))?;

        let mut route = Route::new(source, config.link_metric, NextHop::Myself);
        route.timeout_reset(arrival_time + timers.timeout, eventp);
        table.insert(route);
        return Ok(config.link_metric);
    }

    let route = table.get_mut(source).unwrap();
    let link_cost = if route.garbage {
        // A packet from a neighbor we'd given up on proves it's back;
        // revive the direct route at its configured cost.
        let config = neighbors
            .get(source)
            .ok_or(Error::UnknownSource(source))?;
        route.metric = config.link_metric;
        route.garbage = false;
        route.garbage_collect_stop();
        route.flags.insert(crate::route::RouteFlags::CHANGED);
        config.link_metric
    } else {
        route.metric
    };

    // The bootstrap hello (zero entries) still refreshes the direct
    // neighbor's liveness.
    route.timeout_reset(arrival_time + timers.timeout, eventp);

    Ok(link_cost)
}

#[allow(clippy::too_many_arguments)]
fn apply_entry(
    table: &mut RouteTable,
    destination: u16,
    new_metric: Metric,
    source: u16,
    timers: Timers,
    eventp: &UnboundedSender<Event>,
    arrival_time: Instant,
    outcome: &mut ProcessOutcome,
) {
    match table.get_mut(destination) {
        None => {
            if new_metric.is_infinite() {
                return;
            }
            let mut route =
                Route::new(destination, new_metric, NextHop::Neighbor(source));
            route.timeout_reset(arrival_time + timers.timeout, eventp);
            table.insert(route);
        }
        Some(route) if route.next_hop == NextHop::Neighbor(source) => {
            let old_metric = route.metric;
            route.metric = new_metric;

            if new_metric.is_infinite() && !old_metric.is_infinite() {
                route.invalidate(arrival_time + timers.garbage_collect, eventp);
                outcome.triggered_update = true;
            } else if !new_metric.is_infinite() {
                route.garbage = false;
                route.garbage_collect_stop();
                route.timeout_reset(arrival_time + timers.timeout, eventp);
                if new_metric != old_metric {
                    route.flags.insert(crate::route::RouteFlags::CHANGED);
                }
            }
        }
        Some(route) if new_metric.get() < route.metric.get() => {
            Debug::RouteUpdate(destination, NextHop::Neighbor(source), new_metric)
                .log();
            route.metric = new_metric;
            route.next_hop = NextHop::Neighbor(source);
            route.garbage = false;
            route.garbage_collect_stop();
            route.flags.insert(crate::route::RouteFlags::CHANGED);
            route.timeout_reset(arrival_time + timers.timeout, eventp);
        }
        Some(_) => {
            // Equal or worse metric from a non-owning neighbor: ignored,
            // timers untouched (freshness is tied to the owning next hop).
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbor::NeighborConfig;
    use crate::packet::RouteEntry;

    fn timers() -> Timers {
        Timers {
            timeout: Duration::from_secs(30),
            garbage_collect: Duration::from_secs(20),
        }
    }

    fn neighbor(router_id: u16, link_metric: u8) -> NeighborConfig {
        NeighborConfig {
            router_id,
            dest_addr: "127.0.0.1:5000".parse().unwrap(),
            link_metric: Metric::from(link_metric),
        }
    }

    #[tokio::test]
    async fn s1_bootstrap_hello() {
        let mut table = RouteTable::new();
        let mut neighbors = NeighborTable::new();
        neighbors.insert(neighbor(2, 3));
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        let message = Message::new(2, Vec::new());
        let outcome = process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            message,
            Instant::now(),
        )
        .unwrap();

        assert!(!outcome.triggered_update);
        let route = table.get(2).unwrap();
        assert_eq!(route.metric.get(), 3);
        assert_eq!(route.next_hop, NextHop::Myself);
    }

    #[tokio::test]
    async fn s2_learn_via_neighbor() {
        let mut table = RouteTable::new();
        let mut neighbors = NeighborTable::new();
        neighbors.insert(neighbor(2, 3));
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(2, Vec::new()),
            Instant::now(),
        )
        .unwrap();

        let outcome = process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(4),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        assert!(outcome.triggered_update == false);
        let route = table.get(3).unwrap();
        assert_eq!(route.metric.get(), 7);
        assert_eq!(route.next_hop, NextHop::Neighbor(2));
    }

    #[tokio::test]
    async fn s3_better_path_wins() {
        let mut table = RouteTable::new();
        let mut neighbors = NeighborTable::new();
        neighbors.insert(neighbor(2, 3));
        neighbors.insert(neighbor(4, 2));
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(2, Vec::new()),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(4),
                }],
            ),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(4, Vec::new()),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                4,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(2),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        let route = table.get(3).unwrap();
        assert_eq!(route.metric.get(), 4);
        assert_eq!(route.next_hop, NextHop::Neighbor(4));
    }

    #[tokio::test]
    async fn equal_metric_from_non_owner_does_not_replace() {
        let mut table = RouteTable::new();
        let mut neighbors = NeighborTable::new();
        neighbors.insert(neighbor(2, 1));
        neighbors.insert(neighbor(4, 1));
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(2, Vec::new()),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(3),
                }],
            ),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(4, Vec::new()),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                4,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(3),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        let route = table.get(3).unwrap();
        assert_eq!(route.next_hop, NextHop::Neighbor(2));
    }

    #[tokio::test]
    async fn unknown_source_is_discarded() {
        let mut table = RouteTable::new();
        let neighbors = NeighborTable::new();
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        let result = process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(2, Vec::new()),
            Instant::now(),
        );

        assert!(matches!(result, Err(Error::UnknownSource(2))));
    }

    #[tokio::test]
    async fn self_advertisement_drops_entry_keeps_packet() {
        let mut table = RouteTable::new();
        let mut neighbors = NeighborTable::new();
        neighbors.insert(neighbor(2, 1));
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(2, Vec::new()),
            Instant::now(),
        )
        .unwrap();

        let outcome = process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 1,
                    metric: Metric::from(5),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        assert!(!outcome.triggered_update);
        assert!(table.get(1).is_none());
    }

    #[tokio::test]
    async fn owner_infinity_transition_raises_triggered_update() {
        let mut table = RouteTable::new();
        let mut neighbors = NeighborTable::new();
        neighbors.insert(neighbor(2, 1));
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(2, Vec::new()),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(4),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        let outcome = process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(16),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        assert!(outcome.triggered_update);
        let route = table.get(3).unwrap();
        assert!(route.garbage);
        assert!(route.metric.is_infinite());
    }

    #[tokio::test]
    async fn non_owner_strictly_smaller_metric_revives_a_garbage_route() {
        let mut table = RouteTable::new();
        let mut neighbors = NeighborTable::new();
        neighbors.insert(neighbor(2, 1));
        neighbors.insert(neighbor(4, 2));
        let (eventp, _rx) = tokio::sync::mpsc::unbounded_channel();

        // Learn a route to 3 via owner 2, then drive it to infinity from
        // that same owner so it enters GARBAGE with a gc task armed.
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(2, Vec::new()),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(4),
                }],
            ),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                2,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(16),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        let route = table.get(3).unwrap();
        assert!(route.garbage);
        assert!(route.gc_remaining().is_some());

        // A different neighbor (not the owner) now offers a strictly
        // smaller metric than the route's current (infinite) one. Per
        // spec.md §4.5, any strictly-smaller-metric source revives a
        // GARBAGE route, not just the one that invalidated it.
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(4, Vec::new()),
            Instant::now(),
        )
        .unwrap();
        process(
            &mut table,
            &neighbors,
            1,
            timers(),
            &eventp,
            Message::new(
                4,
                vec![RouteEntry {
                    destination: 3,
                    metric: Metric::from(1),
                }],
            ),
            Instant::now(),
        )
        .unwrap();

        let route = table.get(3).unwrap();
        assert!(!route.garbage);
        assert_eq!(route.metric.get(), 3);
        assert_eq!(route.next_hop, NextHop::Neighbor(4));
        assert!(
            route.gc_remaining().is_none(),
            "reviving the route must cancel its stale garbage-collection task"
        );
    }
}
