//! # Driver
//!
//! Runs one end-to-end invocation: load, instantiate, stream the request's
//! packets in, decode what comes out, and terminate on every exit path after
//! a successful instantiate.

use flowpack::Value;
use flowport::Packet;
use flowport::PacketKind;
use tracing::debug;
use tracing::warn;

use crate::component::ComponentHandle;
use crate::config::InstanceConfig;
use crate::config::OperationConfig;
use crate::error::Error;
use crate::error::Result;
use crate::runtime::Runtime;

/// What to do with a data packet whose payload fails to decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Hand the error to the sink and keep consuming.
    #[default]
    Report,
    /// Cancel the invocation and fail with `Error::Decode`.
    Abort,
}

#[derive(Clone, Debug)]
pub struct Request {
    pub operation: String,
    pub inputs: Vec<Packet>,
    pub config: OperationConfig,
    pub instance: InstanceConfig,
    pub decode_policy: DecodePolicy,
}

impl Request {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            inputs: Vec::new(),
            config: OperationConfig::default(),
            instance: InstanceConfig::default(),
            decode_policy: DecodePolicy::default(),
        }
    }

    /// Appends an encoded data packet.
    pub fn input(mut self, port: impl Into<String>, value: &Value) -> Result<Self> {
        self.inputs.push(Packet::encode(port, value)?);
        Ok(self)
    }

    pub fn packet(mut self, packet: Packet) -> Self {
        self.inputs.push(packet);
        self
    }

    /// Appends a done signal.
    ///
    /// Rejects an empty port, which a component could never have produced.
    pub fn done(mut self, port: impl Into<String>) -> Result<Self> {
        let port = port.into();
        if port.is_empty() {
            return Err(flowport::Error::InvalidPort(port).into());
        }
        self.inputs.push(Packet::done(port));
        Ok(self)
    }

    pub fn config(mut self, config: OperationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn instance(mut self, instance: InstanceConfig) -> Self {
        self.instance = instance;
        self
    }

    pub fn decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }
}

/// One event handed to the driver's sink, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    Value { port: String, value: Value },
    Done { port: String },
    DecodeFailed { port: String, error: flowpack::Error },
}

/// Summary of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub values: usize,
    pub decode_errors: usize,
    pub done_ports: Vec<String>,
}

pub struct Driver {
    runtime: Runtime,
}

impl Driver {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Loads `bytes` and drives `request` against it.
    pub async fn run(
        &self,
        bytes: impl Into<Vec<u8>>,
        request: Request,
        sink: impl FnMut(Delivery) + Send,
    ) -> Result<Report> {
        let mut handle = self.runtime.load(bytes)?;
        Self::drive(&mut handle, request, sink).await
    }

    /// Instantiates `handle`, runs `request` and terminates the handle.
    #[tracing::instrument(skip_all, fields(operation = %request.operation))]
    pub async fn drive(
        handle: &mut ComponentHandle,
        request: Request,
        sink: impl FnMut(Delivery) + Send,
    ) -> Result<Report> {
        let Request { operation, inputs, config, instance, decode_policy } = request;

        handle.instantiate(instance).await?;
        let result = consume(handle, operation, inputs, config, decode_policy, sink).await;

        if let Err(e) = handle.terminate().await {
            warn!(error = %e, "terminate failed");
        }
        result
    }
}

async fn consume(
    handle: &mut ComponentHandle,
    operation: String,
    inputs: Vec<Packet>,
    config: OperationConfig,
    policy: DecodePolicy,
    mut sink: impl FnMut(Delivery) + Send,
) -> Result<Report> {
    let mut invocation = handle.invoke(operation, futures::stream::iter(inputs), config)?;
    let mut report = Report::default();

    while let Some(packet) = invocation.next().await {
        let port = packet.port().to_string();
        match packet.kind() {
            PacketKind::Data(bytes) => match flowpack::decode(bytes) {
                Ok(value) => {
                    report.values += 1;
                    sink(Delivery::Value { port, value });
                }
                Err(error) => {
                    report.decode_errors += 1;
                    warn!(%port, %error, "failed to decode payload");
                    if policy == DecodePolicy::Abort {
                        invocation.cancel();
                        return Err(Error::Decode { port, error });
                    }
                    sink(Delivery::DecodeFailed { port, error });
                }
            },
            PacketKind::Done => {
                report.done_ports.push(port.clone());
                sink(Delivery::Done { port });
            }
            PacketKind::Error(message) => {
                return Err(Error::Component { port, message: message.clone() });
            }
        }
    }

    debug!(values = report.values, decode_errors = report.decode_errors, "invocation drained");
    Ok(report)
}
