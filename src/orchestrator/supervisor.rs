//! Session supervisor loop.
//!
//! The [`Supervisor`] owns the process table and the startup sequencer and
//! is the only code that mutates them. Everything else (IPC connections,
//! signal handlers) talks to it through a cloneable [`SessionHandle`] that
//! forwards requests over a channel.
//!
//! The loop interleaves two event sources: incoming requests, and the
//! deadline of the next startup step. While a step runs (for example the
//! bounded compositor wait) requests queue up and are served before the
//! following step.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::shutdown::{self, ShutdownReport};
use crate::orchestrator::startup::{StartupPhase, StartupPlan, StartupSequencer};
use crate::process::handle::ProcessSnapshot;
use crate::process::launcher::Launcher;
use crate::process::table::ProcessTable;
use crate::{AppError, Result};

/// Capacity of the request channel.
const REQUEST_QUEUE: usize = 16;

/// Requests accepted by the supervisor loop.
#[derive(Debug)]
pub enum SessionRequest {
    /// Run the shutdown sequencer and end the loop.
    Logout {
        /// Completed once every process is resolved.
        ack: oneshot::Sender<ShutdownReport>,
    },
    /// Report the current phase and process table.
    Status {
        /// Receives the snapshot.
        reply: oneshot::Sender<SessionStatus>,
    },
}

/// Snapshot of the session for the control surface.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current startup phase.
    pub phase: StartupPhase,
    /// Whether the compositor wait ended without readiness.
    pub degraded: bool,
    /// Every managed process in registration order.
    pub processes: Vec<ProcessSnapshot>,
}

/// Cloneable client of the supervisor loop.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
    ready: CancellationToken,
}

impl SessionHandle {
    /// Ask the supervisor to log out and wait until it has finished.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the supervisor loop has already
    /// ended, which means a logout already ran.
    pub async fn logout(&self) -> Result<ShutdownReport> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(SessionRequest::Logout { ack })
            .await
            .map_err(|_| AppError::NotFound("session already logged out".into()))?;
        done.await
            .map_err(|_| AppError::NotFound("session already logged out".into()))
    }

    /// Fetch a status snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the supervisor loop has ended.
    pub async fn status(&self) -> Result<SessionStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionRequest::Status { reply })
            .await
            .map_err(|_| AppError::NotFound("session supervisor stopped".into()))?;
        rx.await
            .map_err(|_| AppError::NotFound("session supervisor stopped".into()))
    }

    /// Report compositor readiness, ending the readiness wait early.
    pub fn signal_ready(&self) {
        self.ready.cancel();
    }
}

enum Event {
    Request(Option<SessionRequest>),
    Step,
}

/// Owner of the process table and driver of the startup sequence.
pub struct Supervisor {
    sequencer: StartupSequencer,
    table: ProcessTable,
    rx: mpsc::Receiver<SessionRequest>,
    grace: Duration,
}

impl Supervisor {
    /// Build a supervisor and the handle used to reach it.
    #[must_use]
    pub fn new(plan: StartupPlan, launcher: Arc<dyn Launcher>) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let ready = CancellationToken::new();
        let grace = plan.timeouts.shutdown_grace();
        let supervisor = Self {
            sequencer: StartupSequencer::new(plan, launcher, ready.clone()),
            table: ProcessTable::new(),
            rx,
            grace,
        };
        (supervisor, SessionHandle { tx, ready })
    }

    /// Run startup, serve requests, and return once logout completes.
    ///
    /// Logout is triggered by a [`SessionRequest::Logout`] or by every
    /// handle being dropped.
    pub async fn run(mut self) -> ShutdownReport {
        let mut next_step = Some(Instant::now());

        loop {
            // Queued requests win over the next step, so a logout that
            // arrived during a bounded wait stops the sequence there.
            let event = tokio::select! {
                biased;
                request = self.rx.recv() => Event::Request(request),
                () = tokio::time::sleep_until(next_step.unwrap_or_else(Instant::now)),
                    if next_step.is_some() => Event::Step,
            };

            match event {
                Event::Step => {
                    next_step = self
                        .sequencer
                        .advance(&mut self.table)
                        .await
                        .map(|delay| Instant::now() + delay);
                }
                Event::Request(Some(SessionRequest::Status { reply })) => {
                    if reply.send(self.status()).is_err() {
                        warn!("status requester went away");
                    }
                }
                Event::Request(Some(SessionRequest::Logout { ack })) => {
                    info!("logout requested");
                    let report = self.logout().await;
                    if ack.send(report.clone()).is_err() {
                        warn!("logout requester went away");
                    }
                    return report;
                }
                Event::Request(None) => {
                    info!("all session handles dropped, logging out");
                    return self.logout().await;
                }
            }
        }
    }

    fn status(&mut self) -> SessionStatus {
        SessionStatus {
            phase: self.sequencer.phase(),
            degraded: self.sequencer.is_degraded(),
            processes: self.table.snapshot(),
        }
    }

    async fn logout(&mut self) -> ShutdownReport {
        self.rx.close();
        let report = shutdown::logout(&mut self.table, self.grace).await;

        // Answer requests that raced with the logout.
        while let Ok(request) = self.rx.try_recv() {
            match request {
                SessionRequest::Logout { ack } => {
                    if ack.send(ShutdownReport::default()).is_err() {
                        warn!("logout requester went away");
                    }
                }
                SessionRequest::Status { reply } => {
                    if reply.send(self.status()).is_err() {
                        warn!("status requester went away");
                    }
                }
            }
        }

        report
    }
}
