//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

//! The textual routing-table dump. A debug surface, not a protocol
//! interface: formatting lives entirely outside `ripd-core`, which only
//! hands over a read-only snapshot of the table.

use ripd_core::route::{NextHop, RouteTable};

/// Renders one snapshot of the table to stdout with columns
/// {destination, metric, next_hop, flag, timeout_remaining, gc_remaining}.
pub fn print_table(table: &RouteTable) {
    println!(
        "{:<12}{:<8}{:<10}{:<7}{:<18}{:<12}",
        "destination", "metric", "next_hop", "flag", "timeout_remaining", "gc_remaining"
    );

    for route in table.iter() {
        let next_hop = match route.next_hop {
            NextHop::Myself => "self".to_owned(),
            NextHop::Neighbor(id) => id.to_string(),
        };
        let flag = if route.flags.is_empty() { "-" } else { "C" };
        let timeout = route
            .timeout_remaining()
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "-".to_owned());
        let gc = route
            .gc_remaining()
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "-".to_owned());

        println!(
            "{:<12}{:<8}{:<10}{:<7}{:<18}{:<12}",
            route.destination,
            route.metric.get(),
            next_hop,
            flag,
            timeout,
            gc,
        );
    }
}
