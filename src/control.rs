//! Control-thread event loop
//!
//! All state owned by the application (the session poller, installed results,
//! UI handles) lives in a single value `S` that only the [`ControlLoop`] touches.
//! Everything else talks to it by posting closures through a [`ControlHandle`]:
//! task callbacks from the executor, progress reports and repeating timer ticks.
//!
//! The queue is a single-consumer unbounded channel, so closures posted from one
//! producer are applied in the order they were posted.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A unit of work applied to the control state
pub(crate) type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

type TickFn<S> = Box<dyn FnMut(&mut S) + Send + 'static>;

enum ControlMessage<S> {
    Run(Job<S>),
    Quit,
}

/// Cloneable sender side of the control queue
pub struct ControlHandle<S> {
    tx: mpsc::UnboundedSender<ControlMessage<S>>,
}

impl<S> Clone for ControlHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> ControlHandle<S> {
    /// Queue a closure to run on the control loop
    ///
    /// Returns false if the loop has been dropped.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.tx.send(ControlMessage::Run(Box::new(job))).is_ok()
    }

    /// Ask [`ControlLoop::run`] to return after the messages already queued
    pub fn quit(&self) {
        let _ = self.tx.send(ControlMessage::Quit);
    }

    /// Start a repeating timer whose ticks run on the control loop
    ///
    /// The first tick fires one `interval` after the call. Ticks missed while
    /// the loop was busy are skipped rather than bunched up. A tick that is
    /// already queued when the timer is stopped is discarded on delivery.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_timer<F>(&self, interval: Duration, tick: F) -> TimerHandle
    where
        F: FnMut(&mut S) + Send + 'static,
    {
        let token = CancellationToken::new();
        let tick: Arc<Mutex<TickFn<S>>> = Arc::new(Mutex::new(Box::new(tick)));
        let handle = self.clone();
        let timer_token = token.clone();

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = timer_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let tick = Arc::clone(&tick);
                        let delivery_token = timer_token.clone();
                        let posted = handle.post(move |state| {
                            if delivery_token.is_cancelled() {
                                return;
                            }
                            if let Ok(mut f) = tick.lock() {
                                (&mut *f)(state);
                            }
                        });
                        if !posted {
                            debug!("control loop gone, stopping timer");
                            break;
                        }
                    }
                }
            }
            trace!("timer stopped");
        });

        TimerHandle { token }
    }
}

/// Stops a repeating timer; dropping the handle stops it too
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Stop the timer; no further ticks are delivered
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Returns true once the timer has been stopped
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Single consumer of the control queue
///
/// Whoever drives `run`/`run_until` is the control thread: it is the only place
/// where `&mut S` exists, so state mutated here needs no locks.
pub struct ControlLoop<S> {
    rx: mpsc::UnboundedReceiver<ControlMessage<S>>,
    tx: mpsc::UnboundedSender<ControlMessage<S>>,
}

impl<S: 'static> Default for ControlLoop<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static> ControlLoop<S> {
    /// Create an empty control loop
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Handle for posting work to this loop
    pub fn handle(&self) -> ControlHandle<S> {
        ControlHandle {
            tx: self.tx.clone(),
        }
    }

    /// Apply queued closures to `state` until [`ControlHandle::quit`] is called
    pub async fn run(&mut self, state: &mut S) {
        while let Some(message) = self.rx.recv().await {
            match message {
                ControlMessage::Run(job) => job(state),
                ControlMessage::Quit => {
                    debug!("control loop quit requested");
                    return;
                }
            }
        }
    }

    /// Apply queued closures until `done(state)` holds
    ///
    /// The predicate is checked before waiting and after every closure.
    /// Returns false if a quit request arrived first.
    pub async fn run_until<P>(&mut self, state: &mut S, mut done: P) -> bool
    where
        P: FnMut(&S) -> bool,
    {
        if done(state) {
            return true;
        }
        while let Some(message) = self.rx.recv().await {
            match message {
                ControlMessage::Run(job) => {
                    job(state);
                    if done(state) {
                        return true;
                    }
                }
                ControlMessage::Quit => return false,
            }
        }
        false
    }

    /// Apply every closure that is already queued without waiting
    ///
    /// Returns the number of closures applied.
    pub fn process_pending(&mut self, state: &mut S) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.rx.try_recv() {
            match message {
                ControlMessage::Run(job) => {
                    job(state);
                    applied += 1;
                }
                ControlMessage::Quit => break,
            }
        }
        applied
    }
}
