//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use bitflags::bitflags;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;

use crate::debug::Debug;
use crate::error::MetricError;
use crate::tasks;
use crate::tasks::messages::Event;

/// Destination identifier. Router IDs, not IP prefixes, are the routing key.
pub type RouterId = u16;

pub const MIN_ROUTER_ID: RouterId = 1;
pub const MAX_ROUTER_ID: RouterId = 64000;

/// The next hop a route was learned from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NextHop {
    /// Directly connected: the destination is itself a configured neighbor.
    Myself,
    Neighbor(RouterId),
}

impl NextHop {
    pub fn router_id(&self) -> Option<RouterId> {
        match self {
            NextHop::Myself => None,
            NextHop::Neighbor(id) => Some(*id),
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct RouteFlags: u8 {
        const CHANGED = 0x01;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Metric(u8);

impl Metric {
    pub const INFINITE: u8 = 16;

    pub fn new(metric: u8) -> Result<Self, MetricError> {
        if metric == 0 || metric > Self::INFINITE {
            return Err(MetricError::InvalidValue(metric));
        }
        Ok(Metric(metric))
    }

    pub fn infinite() -> Metric {
        Metric(Self::INFINITE)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn is_infinite(&self) -> bool {
        self.0 == Self::INFINITE
    }

    /// Adds a link cost to a received metric, saturating at infinity.
    pub fn saturating_add(self, cost: Metric) -> Metric {
        Metric(std::cmp::min(self.0.saturating_add(cost.0), Self::INFINITE))
    }
}

impl From<u8> for Metric {
    // Panics on an out-of-range value. Only meant for values that have
    // already been validated (configuration, or a decoded wire entry).
    fn from(metric: u8) -> Metric {
        Metric::new(metric).expect("invalid RIP metric")
    }
}

/// A route table entry.
///
/// Per-route timers are modeled as cancellable/resettable tasks rather than
/// fields scanned on every event-loop tick: each one fires by sending a
/// tagged message back into the instance's own event channel (see
/// `crate::tasks`), keeping table mutation confined to the owning task.
#[derive(Debug)]
pub struct Route {
    pub destination: RouterId,
    pub metric: Metric,
    pub next_hop: NextHop,
    pub flags: RouteFlags,
    pub garbage: bool,
    timeout_task: Option<tasks::TimeoutTask>,
    gc_task: Option<tasks::TimeoutTask>,
}

impl Route {
    pub(crate) fn new(
        destination: RouterId,
        metric: Metric,
        next_hop: NextHop,
    ) -> Self {
        Debug::RouteCreate(destination, next_hop, metric).log();

        Route {
            destination,
            metric,
            next_hop,
            flags: RouteFlags::CHANGED,
            garbage: false,
            timeout_task: None,
            gc_task: None,
        }
    }

    /// Refreshes the timeout deadline to `deadline`, an instant computed by
    /// the caller from whatever clock reading is authoritative for this
    /// refresh (a packet's arrival time, or the current instant for a
    /// timer-driven refresh) rather than read internally here.
    pub(crate) fn timeout_reset(
        &mut self,
        deadline: Instant,
        eventp: &UnboundedSender<Event>,
    ) {
        if let Some(task) = &self.timeout_task {
            task.reset(deadline);
        } else {
            self.timeout_task =
                Some(tasks::route_timeout(self.destination, deadline, eventp));
        }
    }

    pub(crate) fn timeout_stop(&mut self) {
        self.timeout_task = None;
    }

    pub fn timeout_remaining(&self) -> Option<Duration> {
        self.timeout_task.as_ref().map(tasks::TimeoutTask::remaining)
    }

    pub(crate) fn garbage_collect_start(
        &mut self,
        deadline: Instant,
        eventp: &UnboundedSender<Event>,
    ) {
        self.gc_task =
            Some(tasks::route_gc(self.destination, deadline, eventp));
    }

    pub(crate) fn garbage_collect_stop(&mut self) {
        self.gc_task = None;
    }

    pub fn gc_remaining(&self) -> Option<Duration> {
        self.gc_task.as_ref().map(tasks::TimeoutTask::remaining)
    }

    /// Transitions the route to the GARBAGE state: metric set to infinity,
    /// the timeout replaced by a garbage-collection deadline, change
    /// flagged.
    pub(crate) fn invalidate(
        &mut self,
        gc_deadline: Instant,
        eventp: &UnboundedSender<Event>,
    ) {
        Debug::RouteInvalidate(self.destination).log();

        self.metric = Metric::infinite();
        self.garbage = true;
        self.flags.insert(RouteFlags::CHANGED);
        self.timeout_stop();
        self.garbage_collect_start(gc_deadline, eventp);
    }
}

/// The routing table: an associative map keyed by destination router ID.
/// Outbound message indexing ("entry1".."entryN") is purely a codec-level
/// presentation concern and never leaks into this type.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: BTreeMap<RouterId, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        RouteTable::default()
    }

    pub fn get(&self, destination: RouterId) -> Option<&Route> {
        self.routes.get(&destination)
    }

    pub fn get_mut(&mut self, destination: RouterId) -> Option<&mut Route> {
        self.routes.get_mut(&destination)
    }

    pub fn insert(&mut self, route: Route) {
        self.routes.insert(route.destination, route);
    }

    pub fn remove(&mut self, destination: RouterId) -> Option<Route> {
        self.routes.remove(&destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Route> {
        self.routes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Clears the CHANGED flag on every route, e.g. after a periodic update
    /// has carried the full table.
    pub fn clear_changed_flags(&mut self) {
        for route in self.routes.values_mut() {
            route.flags.remove(RouteFlags::CHANGED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_rejects_zero_and_above_infinite() {
        assert!(Metric::new(0).is_err());
        assert!(Metric::new(17).is_err());
        assert!(Metric::new(16).is_ok());
        assert!(Metric::new(1).is_ok());
    }

    #[test]
    fn metric_saturating_add_caps_at_infinity() {
        let m = Metric::from(10).saturating_add(Metric::from(10));
        assert!(m.is_infinite());
        assert_eq!(m.get(), 16);
    }

    #[test]
    fn metric_saturating_add_below_infinity() {
        let m = Metric::from(4).saturating_add(Metric::from(3));
        assert_eq!(m.get(), 7);
        assert!(!m.is_infinite());
    }

    #[test]
    fn table_insert_get_remove() {
        let mut table = RouteTable::new();
        table.insert(Route::new(2, Metric::from(3), NextHop::Myself));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(2).unwrap().metric.get(), 3);
        table.remove(2);
        assert!(table.get(2).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn clear_changed_flags() {
        let mut table = RouteTable::new();
        table.insert(Route::new(2, Metric::from(3), NextHop::Myself));
        assert!(table.get(2).unwrap().flags.contains(RouteFlags::CHANGED));
        table.clear_changed_flags();
        assert!(!table.get(2).unwrap().flags.contains(RouteFlags::CHANGED));
    }
}
