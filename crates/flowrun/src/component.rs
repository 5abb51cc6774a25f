//! # Component Handle
//!
//! Lifecycle of one loaded component: `Uninstantiated` until `instantiate`
//! spawns its worker, `Instantiated` while the worker runs, and `Terminated`
//! once torn down. The handle talks to the worker only through its job queue;
//! the guest itself never leaves the worker task.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use flowport::Packet;
use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::InstanceConfig;
use crate::config::OperationConfig;
use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::error::Result;
use crate::guest::Module;
use crate::invocation::Invocation;
use crate::invocation::Parts;
use crate::ports::Ports;
use crate::ports::Signal;
use crate::worker;
use crate::worker::Job;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    Uninstantiated,
    Instantiated,
    Terminated,
}

struct Worker {
    jobs: mpsc::Sender<Job>,
    join: JoinHandle<()>,
}

pub struct ComponentHandle {
    module: Arc<dyn Module>,
    config: RuntimeConfig,
    state: HandleState,
    worker: Option<Worker>,
    busy: Arc<AtomicBool>,
    /// Stop signal of the most recent invocation.
    signal: Option<Arc<watch::Sender<Signal>>>,
}

impl ComponentHandle {
    /// Wraps any module, wasm or native, in an uninstantiated handle.
    pub fn from_module(module: impl Module, config: RuntimeConfig) -> Self {
        Self {
            module: Arc::new(module),
            config,
            state: HandleState::Uninstantiated,
            worker: None,
            busy: Arc::new(AtomicBool::new(false)),
            signal: None,
        }
    }

    /// Current lifecycle state. A handle whose worker was aborted reports
    /// `Terminated`.
    pub fn state(&self) -> HandleState {
        match (&self.state, &self.worker) {
            (HandleState::Instantiated, Some(worker)) if worker.join.is_finished() => {
                HandleState::Terminated
            }
            (state, _) => *state,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Spawns the worker and waits for the guest to come up.
    ///
    /// # Errors
    /// - `AlreadyInstantiated` / `AlreadyTerminated` on lifecycle misuse.
    /// - `Instantiation` if the module is invalid, its setup fails or it does
    ///   not come up within the instantiate timeout. The handle stays
    ///   `Uninstantiated`.
    pub async fn instantiate(&mut self, config: InstanceConfig) -> Result<()> {
        match self.state {
            HandleState::Uninstantiated => {}
            HandleState::Instantiated => return Err(Error::AlreadyInstantiated),
            HandleState::Terminated => return Err(Error::AlreadyTerminated),
        }

        let (jobs_tx, jobs_rx) = mpsc::channel(1);
        let (ready_tx, ready_rx) = oneshot::channel();
        let join = tokio::spawn(worker::run(
            Arc::clone(&self.module),
            config,
            ready_tx,
            jobs_rx,
            Arc::clone(&self.busy),
        ));

        let limit = self.config.instantiate_timeout;
        match tokio::time::timeout(limit, ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(Error::Instantiation(e.to_string())),
            Ok(Err(_)) => {
                return Err(Error::Instantiation("worker stopped during instantiation".into()));
            }
            Err(_) => {
                join.abort();
                return Err(Error::Instantiation(format!(
                    "timed out after {}ms",
                    limit.as_millis()
                )));
            }
        }

        self.worker = Some(Worker { jobs: jobs_tx, join });
        self.state = HandleState::Instantiated;
        info!("component instantiated");
        Ok(())
    }

    /// Starts `operation`, feeding it `inputs` in order.
    ///
    /// # Errors
    /// - `NotInstantiated` unless the handle has a live worker.
    /// - `InvocationActive` while an earlier invocation's guest is running.
    pub fn invoke<S>(
        &mut self,
        operation: impl Into<String>,
        inputs: S,
        config: OperationConfig,
    ) -> Result<Invocation>
    where
        S: Stream<Item = Packet> + Send + 'static,
    {
        let operation = operation.into();
        let worker = match (self.state(), &self.worker) {
            (HandleState::Instantiated, Some(worker)) => worker,
            _ => return Err(Error::NotInstantiated),
        };
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(Error::InvocationActive);
        }

        let output_capacity = config.output_capacity.unwrap_or(self.config.output_capacity);
        let (input_tx, input_rx) = mpsc::channel(self.config.input_capacity.max(1));
        let (output_tx, output_rx) = mpsc::channel(output_capacity.max(1));
        let (signal_tx, signal_rx) = watch::channel(Signal::Run);
        let signal = Arc::new(signal_tx);
        let (reply_tx, reply_rx) = oneshot::channel();

        let timeout = config.timeout;
        let job = Job {
            operation: operation.clone(),
            config,
            ports: Ports::new(input_rx, output_tx, signal_rx),
            reply: reply_tx,
        };
        if let Err(e) = worker.jobs.try_send(job) {
            self.busy.store(false, Ordering::Release);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => Error::InvocationActive,
                mpsc::error::TrySendError::Closed(_) => Error::NotInstantiated,
            });
        }

        let feeder = tokio::spawn(feed(inputs, input_tx));
        debug!(%operation, ?timeout, output_capacity, "invocation started");

        let invocation = Invocation::new(Parts {
            operation,
            output: output_rx,
            outcome: reply_rx,
            signal: Arc::clone(&signal),
            feeder,
            worker: worker.join.abort_handle(),
            timeout,
            cancel_timeout: self.config.cancel_timeout,
        });
        self.signal = Some(signal);
        Ok(invocation)
    }

    /// Tears down the execution context.
    ///
    /// Idempotent: terminating a terminated handle is a no-op. A pending
    /// invocation ends with an error packet. The worker gets the terminate
    /// timeout to wind down before it is aborted.
    pub async fn terminate(&mut self) -> Result<()> {
        match self.state {
            HandleState::Terminated => {
                debug!("component already terminated");
                return Ok(());
            }
            HandleState::Uninstantiated => {
                self.state = HandleState::Terminated;
                debug!("terminated uninstantiated component");
                return Ok(());
            }
            HandleState::Instantiated => {}
        }
        self.state = HandleState::Terminated;

        if let Some(signal) = self.signal.take() {
            signal.send_replace(Signal::Terminate);
        }

        if let Some(Worker { jobs, mut join }) = self.worker.take() {
            drop(jobs);
            let limit = self.config.terminate_timeout;
            if tokio::time::timeout(limit, &mut join).await.is_err() {
                warn!(?limit, "worker did not stop in time, aborting");
                join.abort();
            }
        }

        info!("component terminated");
        Ok(())
    }
}

impl Drop for ComponentHandle {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.send_replace(Signal::Terminate);
        }
        if let Some(worker) = self.worker.take() {
            worker.join.abort();
        }
    }
}

/// Drains `inputs` into the guest's bounded input queue.
async fn feed<S>(inputs: S, tx: mpsc::Sender<Packet>)
where
    S: Stream<Item = Packet> + Send + 'static,
{
    let mut inputs = std::pin::pin!(inputs);
    while let Some(packet) = inputs.next().await {
        if tx.send(packet).await.is_err() {
            break;
        }
    }
}
