//! # Component-side Endpoint
//!
//! [`Ports`] is everything a running guest sees of an invocation: a bounded
//! input queue, a bounded output queue and a stop signal. The guest never
//! shares memory with the caller; packets cross by message passing only.

use flowport::Packet;
use tokio::sync::mpsc;
use tokio::sync::watch;

/// Control signal broadcast from the caller side to a running guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Run,
    /// The caller cancelled, timed out or saw a terminal error.
    Cancel,
    /// The owning handle is being torn down.
    Terminate,
}

/// The caller stopped relaying output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

impl std::fmt::Display for Closed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Output closed")
    }
}

impl std::error::Error for Closed {}

pub struct Ports {
    input: mpsc::Receiver<Packet>,
    output: mpsc::Sender<Packet>,
    signal: watch::Receiver<Signal>,
}

impl Ports {
    pub(crate) fn new(
        input: mpsc::Receiver<Packet>,
        output: mpsc::Sender<Packet>,
        signal: watch::Receiver<Signal>,
    ) -> Self {
        Self { input, output, signal }
    }

    /// Builds a detached endpoint plus the caller-side ends, for driving a
    /// guest directly.
    pub fn channel(
        input_capacity: usize,
        output_capacity: usize,
    ) -> (Self, mpsc::Sender<Packet>, mpsc::Receiver<Packet>, watch::Sender<Signal>) {
        let (input_tx, input_rx) = mpsc::channel(input_capacity.max(1));
        let (output_tx, output_rx) = mpsc::channel(output_capacity.max(1));
        let (signal_tx, signal_rx) = watch::channel(Signal::Run);
        (Self::new(input_rx, output_tx, signal_rx), input_tx, output_rx, signal_tx)
    }

    /// Next input packet in arrival order.
    ///
    /// Returns `None` once the input stream is exhausted or the invocation
    /// has been told to stop.
    pub async fn recv(&mut self) -> Option<Packet> {
        if self.is_stopped() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.signal.wait_for(|s| *s != Signal::Run) => None,
            packet = self.input.recv() => packet,
        }
    }

    /// Emits one output packet, waiting while the output queue is full.
    pub async fn send(&mut self, packet: Packet) -> Result<(), Closed> {
        if self.is_stopped() {
            return Err(Closed);
        }
        tokio::select! {
            biased;
            _ = self.signal.wait_for(|s| *s != Signal::Run) => Err(Closed),
            sent = self.output.send(packet) => sent.map_err(|_| Closed),
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.signal.borrow() != Signal::Run || self.output.is_closed()
    }
}
