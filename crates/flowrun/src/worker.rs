//! The task that owns a guest for the life of its handle.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::config::InstanceConfig;
use crate::config::OperationConfig;
use crate::guest::GuestError;
use crate::guest::Module;
use crate::ports::Ports;

pub(crate) type Outcome = Result<(), GuestError>;

/// One invocation handed to the worker.
pub(crate) struct Job {
    pub operation: String,
    pub config: OperationConfig,
    pub ports: Ports,
    pub reply: oneshot::Sender<Outcome>,
}

/// Instantiates the guest, reports readiness, then runs jobs one at a time
/// until the job queue closes.
pub(crate) async fn run(
    module: Arc<dyn Module>,
    config: InstanceConfig,
    ready: oneshot::Sender<Outcome>,
    mut jobs: mpsc::Receiver<Job>,
    busy: Arc<AtomicBool>,
) {
    let mut guest = match module.instantiate(&config).await {
        Ok(guest) => guest,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Some(job) = jobs.recv().await {
        debug!(operation = %job.operation, "worker running job");
        let outcome = guest.invoke(&job.operation, &job.config, job.ports).await;
        busy.store(false, Ordering::Release);
        let _ = job.reply.send(outcome);
    }

    debug!("worker stopped");
}
