//! # Flowrun
//!
//! A streaming invocation runtime for WebAssembly components.
//!
//! ## Architecture
//!
//! - [`Runtime`] owns the wasmtime engine and loads component buffers into
//!   [`ComponentHandle`]s.
//! - A handle is instantiated onto its own worker task. The caller and the
//!   guest exchange [`flowport::Packet`]s over bounded queues only.
//! - [`ComponentHandle::invoke`] returns an [`Invocation`]: the caller pulls
//!   output with [`Invocation::next`] or adapts it into a `Stream`.
//! - [`Driver`] strings load, instantiate, invoke, decode and terminate
//!   together for one request.
//!
//! Components are anything implementing [`Module`]: wasm components linked
//! against the `flowrun:component` world, or native Rust guests.

mod component;
mod context;
mod driver;
mod error;
mod guest;
mod invocation;
mod linker;
mod ports;
mod runtime;
mod wasm;
mod worker;

pub mod config;

#[cfg(test)]
mod tests;

pub use component::ComponentHandle;
pub use component::HandleState;
pub use config::InstanceConfig;
pub use config::OperationConfig;
pub use config::RuntimeConfig;
pub use context::FlowCtx;
pub use driver::DecodePolicy;
pub use driver::Delivery;
pub use driver::Driver;
pub use driver::Report;
pub use driver::Request;
pub use error::Error;
pub use error::Result;
pub use guest::Guest;
pub use guest::GuestError;
pub use guest::Module;
pub use invocation::Invocation;
pub use invocation::InvocationState;
pub use linker::OPERATIONS_INTERFACE;
pub use linker::PORTS_INTERFACE;
pub use ports::Closed;
pub use ports::Ports;
pub use ports::Signal;
pub use runtime::Runtime;
pub use wasm::WasmGuest;
pub use wasm::WasmModule;

pub use flowpack;
pub use flowport;
