//! # Invocation Channel
//!
//! The caller-side end of one streaming exchange with a component operation.
//!
//! ## Protocol
//!
//! - Output packets are relayed in emission order through a bounded queue;
//!   a slow caller blocks the guest's `send` instead of growing a buffer.
//! - The invocation completes when the guest returns. A `Done` on a port only
//!   closes that port.
//! - The first error packet is terminal: the invocation fails, the guest is
//!   told to stop and anything still queued is discarded.
//! - A `Done` on a port discards later data and duplicate `Done`s on it.
//! - Guest failures, timeouts and termination surface as a terminal error
//!   packet on [`SYSTEM_PORT`].
//!
//! ## Cancellation
//!
//! `cancel` and drop stop relaying at once and signal the guest. A guest that
//! has not returned after the cancel grace period has its worker aborted,
//! which makes the owning handle unusable.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use flowport::Packet;
use flowport::PacketKind;
use flowport::SYSTEM_PORT;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::ports::Signal;
use crate::worker::Outcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationState {
    Active,
    /// The guest returned normally.
    Completed,
    /// A terminal error packet was delivered.
    Failed,
    Cancelled,
}

enum Event {
    Packet(Packet),
    OutputClosed,
    Returned(Option<Outcome>),
    Deadline,
    Terminated,
}

pub struct Invocation {
    operation: String,
    state: InvocationState,
    output: mpsc::Receiver<Packet>,
    output_open: bool,
    outcome: Option<oneshot::Receiver<Outcome>>,
    signal: Arc<watch::Sender<Signal>>,
    signals: watch::Receiver<Signal>,
    feeder: JoinHandle<()>,
    worker: AbortHandle,
    timeout: Option<(Instant, Duration)>,
    cancel_timeout: Duration,
    closed_ports: HashSet<String>,
}

pub(crate) struct Parts {
    pub operation: String,
    pub output: mpsc::Receiver<Packet>,
    pub outcome: oneshot::Receiver<Outcome>,
    pub signal: Arc<watch::Sender<Signal>>,
    pub feeder: JoinHandle<()>,
    pub worker: AbortHandle,
    pub timeout: Option<Duration>,
    pub cancel_timeout: Duration,
}

impl Invocation {
    pub(crate) fn new(parts: Parts) -> Self {
        let signals = parts.signal.subscribe();
        Self {
            operation: parts.operation,
            state: InvocationState::Active,
            output: parts.output,
            output_open: true,
            outcome: Some(parts.outcome),
            signal: parts.signal,
            signals,
            feeder: parts.feeder,
            worker: parts.worker,
            timeout: parts.timeout.map(|t| (Instant::now() + t, t)),
            cancel_timeout: parts.cancel_timeout,
            closed_ports: HashSet::new(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Waits for the next output packet.
    ///
    /// Returns `None` once the invocation has completed, failed or been
    /// cancelled. A failed invocation yields its terminal error packet first.
    pub async fn next(&mut self) -> Option<Packet> {
        while self.state == InvocationState::Active {
            let event = self.wait().await;
            if let Some(packet) = self.apply(event) {
                return Some(packet);
            }
        }
        None
    }

    /// Stops relaying output and tells the guest to stop.
    ///
    /// No packets are delivered afterwards. No-op unless active.
    pub fn cancel(&mut self) {
        if self.state != InvocationState::Active {
            return;
        }
        info!(operation = %self.operation, "invocation cancelled");
        self.state = InvocationState::Cancelled;
        self.shutdown(false);
    }

    /// Adapts the invocation into a stream of output packets.
    ///
    /// Dropping the stream cancels the invocation.
    pub fn into_stream(self) -> impl Stream<Item = Packet> + Send {
        futures::stream::unfold(self, |mut invocation| async move {
            invocation.next().await.map(|packet| (packet, invocation))
        })
    }

    async fn wait(&mut self) -> Event {
        let Self { output, output_open, outcome, signals, timeout, .. } = self;
        let deadline = timeout.map(|(at, _)| at);

        tokio::select! {
            biased;
            _ = signals.wait_for(|s| *s == Signal::Terminate) => Event::Terminated,
            _ = sleep_until(deadline) => Event::Deadline,
            packet = output.recv(), if *output_open => match packet {
                Some(packet) => Event::Packet(packet),
                None => Event::OutputClosed,
            },
            result = returned(outcome), if !*output_open => Event::Returned(result),
        }
    }

    fn apply(&mut self, event: Event) -> Option<Packet> {
        match event {
            Event::Packet(packet) => self.admit(packet),
            Event::OutputClosed => {
                self.output_open = false;
                None
            }
            Event::Returned(Some(Ok(()))) => {
                debug!(operation = %self.operation, "invocation completed");
                self.state = InvocationState::Completed;
                self.feeder.abort();
                None
            }
            Event::Returned(Some(Err(e))) => {
                warn!(operation = %self.operation, error = %e, "component failed");
                Some(self.fail(e.to_string()))
            }
            Event::Returned(None) => {
                warn!(operation = %self.operation, "component worker stopped");
                Some(self.fail("component worker stopped"))
            }
            Event::Deadline => {
                let limit = self.timeout.map(|(_, t)| t).unwrap_or_default();
                warn!(operation = %self.operation, ?limit, "invocation timed out");
                Some(self.fail(format!("operation timed out after {}ms", limit.as_millis())))
            }
            Event::Terminated => {
                info!(operation = %self.operation, "component terminated during invocation");
                Some(self.fail("component terminated"))
            }
        }
    }

    /// Applies the terminal and per-port ordering rules to a guest packet.
    fn admit(&mut self, packet: Packet) -> Option<Packet> {
        match packet.kind() {
            PacketKind::Error(message) => {
                debug!(port = packet.port(), %message, "component signalled error");
                self.state = InvocationState::Failed;
                self.shutdown(true);
                Some(packet)
            }
            PacketKind::Done => {
                if self.closed_ports.insert(packet.port().to_string()) {
                    Some(packet)
                } else {
                    warn!(port = packet.port(), "discarding duplicate done");
                    None
                }
            }
            PacketKind::Data(_) => {
                if self.closed_ports.contains(packet.port()) {
                    warn!(port = packet.port(), "discarding data after done");
                    None
                } else {
                    Some(packet)
                }
            }
        }
    }

    fn fail(&mut self, message: impl Into<String>) -> Packet {
        self.state = InvocationState::Failed;
        self.shutdown(true);
        Packet::error(SYSTEM_PORT, message)
    }

    /// Signals the guest, stops the feeder and drops queued output.
    fn shutdown(&mut self, report_discards: bool) {
        self.signal.send_if_modified(|s| {
            if *s == Signal::Run {
                *s = Signal::Cancel;
                true
            } else {
                false
            }
        });
        self.feeder.abort();

        self.output.close();
        let mut discarded = 0usize;
        while self.output.try_recv().is_ok() {
            discarded += 1;
        }
        if report_discards && discarded > 0 {
            warn!(operation = %self.operation, discarded, "discarding packets after terminal signal");
        }

        self.reap();
    }

    /// Aborts the worker if the guest outlives the cancel grace period.
    fn reap(&mut self) {
        let Some(outcome) = self.outcome.take() else {
            return;
        };
        let worker = self.worker.clone();
        let grace = self.cancel_timeout;
        let operation = self.operation.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if tokio::time::timeout(grace, outcome).await.is_err() {
                        warn!(%operation, ?grace, "component ignored cancellation, aborting worker");
                        worker.abort();
                    }
                });
            }
            Err(_) => worker.abort(),
        }
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn returned(outcome: &mut Option<oneshot::Receiver<Outcome>>) -> Option<Outcome> {
    let rx = outcome.as_mut()?;
    let result = rx.await.ok();
    *outcome = None;
    result
}
