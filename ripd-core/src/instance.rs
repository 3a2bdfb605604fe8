//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

//! The event loop: one owning value per process, composing the packet
//! codec, route table, update processor and timer engine described
//! elsewhere in this crate. Nothing outside this module ever mutates the
//! route table.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::builder;
use crate::debug::Debug;
use crate::neighbor::NeighborTable;
use crate::network::{self, InboundDatagram};
use crate::packet::Message;
use crate::processor::{self, Timers};
use crate::route::{RouteTable, RouterId};
use crate::tasks::{self, Event, IntervalTask, Task, TimeoutTask};

/// Timer durations the instance is configured with. Distinct from
/// [`Timers`], which is the narrower view the update processor needs.
#[derive(Clone, Copy, Debug)]
pub struct TimerConfig {
    pub periodic_base: Duration,
    pub timeout: Duration,
    pub garbage_collect: Duration,
}

impl Default for TimerConfig {
    fn default() -> TimerConfig {
        TimerConfig {
            periodic_base: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
            garbage_collect: Duration::from_secs(20),
        }
    }
}

/// Everything the instance needs to start: identity, neighbors, timers, and
/// the already-bound sockets handed to it by its caller. Binding a socket,
/// like parsing a configuration file, is an external collaborator's job.
pub struct InstanceConfig {
    pub router_id: RouterId,
    pub neighbors: NeighborTable,
    pub timers: TimerConfig,
    pub sockets: Vec<Arc<UdpSocket>>,
    /// Invoked once per periodic-update cycle with a read-only view of the
    /// route table, so the binary can render the debug-surface textual
    /// dump on the same cadence without any external writer ever touching
    /// the table itself.
    pub on_periodic: Option<Box<dyn Fn(&RouteTable) + Send>>,
}

/// The single owning agent for the routing engine's state. All table
/// mutation happens inside [`Instance::run`]; per-route and periodic timers
/// are independent tasks that report back through `eventc` rather than
/// touching the table from another task (see `crate::tasks`).
pub struct Instance {
    router_id: RouterId,
    neighbors: NeighborTable,
    table: RouteTable,
    timers: TimerConfig,
    sockets: Vec<Arc<UdpSocket>>,
    on_periodic: Option<Box<dyn Fn(&RouteTable) + Send>>,

    eventp: UnboundedSender<Event>,
    eventc: UnboundedReceiver<Event>,
    inboundc: UnboundedReceiver<InboundDatagram>,

    _periodic_task: IntervalTask,
    triggered_task: Option<TimeoutTask>,
    pending_trigger: bool,

    // Held only to keep the per-socket receive tasks alive for the
    // lifetime of the instance; never polled directly.
    _rx_tasks: Vec<Task<()>>,
}

impl Instance {
    pub fn new(config: InstanceConfig) -> Instance {
        Debug::InstanceCreate.log();

        let (eventp, eventc) = mpsc::unbounded_channel();
        let (inboundp, inboundc) = mpsc::unbounded_channel();

        let rx_tasks = config
            .sockets
            .iter()
            .map(|socket| network::udp_rx(socket, &inboundp))
            .collect();

        let periodic_base = config.timers.periodic_base;
        let periodic_task =
            tasks::periodic_update(move || jittered(periodic_base), &eventp);

        Debug::InstanceStart.log();

        Instance {
            router_id: config.router_id,
            neighbors: config.neighbors,
            table: RouteTable::new(),
            timers: config.timers,
            sockets: config.sockets,
            on_periodic: config.on_periodic,
            eventp,
            eventc,
            inboundc,
            _periodic_task: periodic_task,
            triggered_task: None,
            pending_trigger: false,
            _rx_tasks: rx_tasks,
        }
    }

    /// Drives the event loop until the process is asked to stop. The
    /// caller (the `ripd` binary) races this future against a signal
    /// future; dropping the instance closes every bound socket.
    pub async fn run(mut self) {
        // An immediate bootstrap update lets neighbors discover this
        // instance without waiting out the first jittered interval.
        self.send_periodic_update();

        loop {
            tokio::select! {
                Some(event) = self.eventc.recv() => {
                    self.process_event(event);
                }
                Some(datagram) = self.inboundc.recv() => {
                    self.process_datagram(datagram);
                }
                else => break,
            }
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::PeriodicUpdate => {
                Debug::PeriodicUpdate.log();
                self.send_periodic_update();
            }
            Event::RouteTimeout(destination) => {
                self.process_route_timeout(destination);
            }
            Event::RouteGc(destination) => {
                self.process_route_gc(destination);
            }
            Event::TriggeredUpdateRelease => {
                self.process_triggered_release();
            }
        }
    }

    fn process_datagram(&mut self, datagram: InboundDatagram) {
        match Message::decode(&datagram.bytes) {
            Ok(message) => {
                let timers = Timers {
                    timeout: self.timers.timeout,
                    garbage_collect: self.timers.garbage_collect,
                };
                match processor::process(
                    &mut self.table,
                    &self.neighbors,
                    self.router_id,
                    timers,
                    &self.eventp,
                    message,
                    datagram.arrival_time,
                ) {
                    Ok(outcome) => {
                        if outcome.triggered_update {
                            self.raise_triggered_update();
                        }
                    }
                    Err(error) => error.log(),
                }
            }
            Err(error) => error.log(),
        }
    }

    fn process_route_timeout(&mut self, destination: RouterId) {
        let Some(route) = self.table.get_mut(destination) else {
            return;
        };
        if route.garbage {
            return;
        }

        Debug::RouteTimeout(destination).log();
        route.invalidate(
            tokio::time::Instant::now() + self.timers.garbage_collect,
            &self.eventp,
        );
        self.raise_triggered_update();
    }

    fn process_route_gc(&mut self, destination: RouterId) {
        if let Some(route) = self.table.get(destination)
            && route.garbage
        {
            Debug::RouteGcTimeout(destination).log();
            self.table.remove(destination);
        }
    }

    /// Raises the triggered-update flag: send immediately the first time,
    /// then coalesce further raises behind a 1-5s rate-limit window so a
    /// burst of route changes doesn't storm every neighbor.
    fn raise_triggered_update(&mut self) {
        if self.triggered_task.is_some() {
            self.pending_trigger = true;
            return;
        }

        self.send_triggered_update();

        let delay = Duration::from_secs(rand::rng().random_range(1..=5));
        let deadline = tokio::time::Instant::now() + delay;
        self.triggered_task =
            Some(tasks::triggered_update_timeout(deadline, &self.eventp));
    }

    fn process_triggered_release(&mut self) {
        if self.pending_trigger {
            self.send_triggered_update();
        }
        self.triggered_task = None;
        self.pending_trigger = false;
    }

    fn send_periodic_update(&mut self) {
        self.send_to_all_neighbors(false);

        // A regular update about to go out makes any pending triggered
        // update redundant.
        self.triggered_task = None;
        self.pending_trigger = false;

        self.table.clear_changed_flags();

        if let Some(on_periodic) = &self.on_periodic {
            on_periodic(&self.table);
        }
    }

    fn send_triggered_update(&mut self) {
        Debug::TriggeredUpdate.log();
        self.send_to_all_neighbors(true);
        self.table.clear_changed_flags();
    }

    fn send_to_all_neighbors(&self, only_changed: bool) {
        let Some(socket) = self.sockets.first() else {
            return;
        };

        for neighbor in self.neighbors.iter() {
            let messages = builder::build(
                &self.table,
                self.router_id,
                neighbor.router_id,
                only_changed,
            );
            for message in messages {
                Debug::PacketTx(neighbor.router_id, message.entries.len())
                    .log();
                let bytes = message.encode();
                if let Err(error) =
                    network::send_packet(socket, &bytes, neighbor.dest_addr)
                {
                    error.log();
                }
            }
        }
    }

    /// A read-only view of the route table, for tests and diagnostics only.
    #[cfg(test)]
    pub(crate) fn table(&self) -> &RouteTable {
        &self.table
    }
}

/// An interval drawn uniformly from `[0.8, 1.2] * base`, redrawn every
/// cycle so jitter cannot accumulate a drift pattern.
fn jittered(base: Duration) -> Duration {
    let factor = rand::rng().random_range(0.8..1.2_f64);
    base.mul_f64(factor)
}
