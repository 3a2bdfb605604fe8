//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio::{task, time};
use tracing::{Instrument, error};

use crate::route::RouterId;

//
// Event flow, all funneled through the instance's single owning task:
//
//                                 +--------------+
//                  udp_rx (Nx) -> |              |
//            periodic_upd (1x) -> |              |
//           route_timeout (Nx) -> |   instance   | -> (Nx) udp_tx
//        route_gc_timeout (Nx) -> |              |
//  triggered_upd_timeout (0/1x) -> |              |
//                                 +--------------+
//
// Every per-route and periodic timer is a task spawned independently of the
// table; it reports back through the event channel below rather than
// mutating the table itself, so table access stays confined to the task
// that owns it.

pub mod messages {
    use crate::route::RouterId;

    /// Everything that can wake the event loop besides socket readiness.
    #[derive(Debug)]
    pub enum Event {
        /// A periodic update cycle has fired; rebuild and send to every
        /// neighbor.
        PeriodicUpdate,
        /// A route's timeout deadline has elapsed.
        RouteTimeout(RouterId),
        /// A route's garbage-collection deadline has elapsed.
        RouteGc(RouterId),
        /// The triggered-update coalescing window has elapsed; flush
        /// change-flagged routes to every neighbor.
        TriggeredUpdateRelease,
    }
}

pub use messages::Event;

/// A handle to a spawned task. Dropping it cancels the task unless
/// [`Task::detach`] has been called.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
    detached: bool,
}

impl<T> Task<T> {
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: task::spawn(future),
            detached: false,
        }
    }

    /// Spawns a supervised task that restarts on panic, so a single
    /// malformed datagram can never take down the receive loop.
    pub fn spawn_supervised<F, Fut>(spawn_fn: F) -> Task<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let join_handle = tokio::spawn(
            async move {
                loop {
                    let worker = Task::spawn(spawn_fn());
                    match worker.await {
                        Ok(()) => break,
                        Err(error) if error.is_panic() => {
                            error!("task panicked, restarting...");
                            continue;
                        }
                        Err(error) => {
                            error!(%error, "task failed");
                            break;
                        }
                    }
                }
            }
            .in_current_span(),
        );
        Task {
            join_handle,
            detached: false,
        }
    }

    pub fn detach(&mut self) {
        self.detached = true;
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, task::JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if !self.detached {
            self.join_handle.abort();
        }
    }
}

#[derive(Debug)]
enum ControlMsg {
    Reset(Instant),
}

/// A resettable, cancellable single-shot deadline. Dropping the handle
/// cancels it.
#[derive(Debug)]
pub struct TimeoutTask {
    _task: Task<()>,
    control: UnboundedSender<ControlMsg>,
    deadline: Arc<Mutex<Instant>>,
}

impl TimeoutTask {
    /// Spawns a task that fires at the given `deadline`. The deadline is
    /// taken as an explicit instant rather than computed internally from
    /// `Instant::now()`, so callers driven by a packet's arrival time can
    /// schedule relative to that instant instead of the moment the task
    /// happens to get spawned.
    pub fn new<F, Fut>(deadline: Instant, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();

        let deadline_cell = Arc::new(Mutex::new(deadline));
        let deadline_child = deadline_cell.clone();

        let task = Task::spawn(
            async move {
                let sleep = time::sleep_until(deadline);
                tokio::pin!(sleep);

                loop {
                    tokio::select! {
                        _ = &mut sleep => {
                            (cb)().await;
                            break;
                        }
                        message = control_rx.recv() => {
                            match message {
                                Some(ControlMsg::Reset(deadline)) => {
                                    sleep.as_mut().reset(deadline);
                                    *deadline_child.lock().unwrap() = deadline;
                                }
                                None => break,
                            }
                        }
                    }
                }
            }
            .in_current_span(),
        );

        TimeoutTask {
            _task: task,
            control: control_tx,
            deadline: deadline_cell,
        }
    }

    /// Reschedules the deadline, regardless of whether it already fired.
    pub fn reset(&self, deadline: Instant) {
        if self.control.send(ControlMsg::Reset(deadline)).is_err() {
            error!("failed to reset timeout task");
        }
    }

    pub fn remaining(&self) -> Duration {
        let deadline = self.deadline.lock().unwrap();
        deadline.saturating_duration_since(Instant::now())
    }
}

/// A recurring timer whose interval is recomputed (with jitter) on every
/// tick via the supplied closure.
#[derive(Debug)]
pub struct IntervalTask {
    _task: Task<()>,
}

impl IntervalTask {
    pub fn new<N, F, Fut>(mut next_interval: N, mut cb: F) -> IntervalTask
    where
        N: FnMut() -> Duration + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let task = Task::spawn(
            async move {
                loop {
                    let interval = next_interval();
                    time::sleep(interval).await;
                    (cb)().await;
                }
            }
            .in_current_span(),
        );

        IntervalTask { _task: task }
    }
}

// ===== route timer helpers =====

/// Spawns the timeout task for a route, reporting back via the event
/// channel instead of touching the table itself.
pub(crate) fn route_timeout(
    destination: RouterId,
    deadline: Instant,
    eventp: &UnboundedSender<Event>,
) -> TimeoutTask {
    let eventp = eventp.clone();
    TimeoutTask::new(deadline, move || async move {
        let _ = eventp.send(Event::RouteTimeout(destination));
    })
}

/// Spawns the garbage-collection task for a route.
pub(crate) fn route_gc(
    destination: RouterId,
    deadline: Instant,
    eventp: &UnboundedSender<Event>,
) -> TimeoutTask {
    let eventp = eventp.clone();
    TimeoutTask::new(deadline, move || async move {
        let _ = eventp.send(Event::RouteGc(destination));
    })
}

/// Spawns the periodic update task. The interval is redrawn independently
/// on every cycle so jitter cannot accumulate a drift pattern.
pub(crate) fn periodic_update<N>(
    mut next_interval: N,
    eventp: &UnboundedSender<Event>,
) -> IntervalTask
where
    N: FnMut() -> Duration + Send + 'static,
{
    let eventp = eventp.clone();
    IntervalTask::new(
        move || next_interval(),
        move || {
            let eventp = eventp.clone();
            async move {
                let _ = eventp.send(Event::PeriodicUpdate);
            }
        },
    )
}

/// Spawns the triggered-update coalescing timer.
pub(crate) fn triggered_update_timeout(
    deadline: Instant,
    eventp: &UnboundedSender<Event>,
) -> TimeoutTask {
    let eventp = eventp.clone();
    TimeoutTask::new(deadline, move || async move {
        let _ = eventp.send(Event::TriggeredUpdateRelease);
    })
}
