//! # Execution Seams
//!
//! The runtime drives components through two traits. A [`Module`] is a loaded,
//! not yet running component; instantiating it yields a [`Guest`] that lives
//! on a dedicated worker task for the rest of the handle's life.
//!
//! [`crate::wasm::WasmModule`] implements both over wasmtime. Native
//! implementations let an embedder host Rust components behind the same
//! lifecycle and invocation protocol.

use async_trait::async_trait;

use crate::config::InstanceConfig;
use crate::config::OperationConfig;
use crate::ports::Closed;
use crate::ports::Ports;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestError {
    /// The module is malformed or does not satisfy the component contract.
    Invalid(String),
    /// The guest trapped.
    Trap(String),
    /// The guest reported a failure of its own.
    Failed(String),
    /// The guest broke the packet protocol.
    Protocol(String),
}

impl std::fmt::Display for GuestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "Invalid component: {}", msg),
            Self::Trap(msg) => write!(f, "Component trapped: {}", msg),
            Self::Failed(msg) => write!(f, "{}", msg),
            Self::Protocol(msg) => write!(f, "Protocol violation: {}", msg),
        }
    }
}

impl std::error::Error for GuestError {}

impl From<Closed> for GuestError {
    fn from(_: Closed) -> Self {
        Self::Failed("output closed".into())
    }
}

impl From<flowport::Error> for GuestError {
    fn from(e: flowport::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Allocates a running instance configured by `config`.
    async fn instantiate(&self, config: &InstanceConfig) -> Result<Box<dyn Guest>, GuestError>;
}

#[async_trait]
pub trait Guest: Send + 'static {
    /// Runs `operation` to completion.
    ///
    /// Returning is the end of output; `ports` is dropped with the call.
    async fn invoke(
        &mut self,
        operation: &str,
        config: &OperationConfig,
        ports: Ports,
    ) -> Result<(), GuestError>;
}
