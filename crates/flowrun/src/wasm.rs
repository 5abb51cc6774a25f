//! # Wasm Components
//!
//! [`WasmModule`] compiles and instantiates a component against the
//! `flowrun:component` world; [`WasmGuest`] drives its `operations` export.
//!
//! ## Contract
//! - `invoke` is required; `configure` is optional and receives the instance
//!   settings once, right after instantiation.
//! - Configuration maps cross as flowpack-encoded `list<u8>`.
//! - Returning from `invoke` ends the output; `err(msg)` fails the invocation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use wasmtime::Store;
use wasmtime::component::Component;
use wasmtime::component::Func;
use wasmtime::component::Linker;
use wasmtime::component::Val;

use flowport::wire;

use crate::config;
use crate::config::InstanceConfig;
use crate::config::OperationConfig;
use crate::context::FlowCtx;
use crate::guest::Guest;
use crate::guest::GuestError;
use crate::guest::Module;
use crate::linker::OPERATIONS_INTERFACE;
use crate::ports::Ports;
use crate::runtime::Runtime;

pub struct WasmModule {
    runtime: Runtime,
    bytes: Arc<[u8]>,
}

impl WasmModule {
    pub fn new(runtime: Runtime, bytes: Arc<[u8]>) -> Self {
        Self { runtime, bytes }
    }

    async fn compile(&self) -> Result<Component, GuestError> {
        let engine = self.runtime.engine().clone();
        let bytes = Arc::clone(&self.bytes);
        tokio::task::spawn_blocking(move || Component::new(&engine, &*bytes))
            .await
            .map_err(|e| GuestError::Invalid(e.to_string()))?
            .map_err(|e| GuestError::Invalid(format!("{:#}", e)))
    }
}

#[async_trait]
impl Module for WasmModule {
    async fn instantiate(&self, config: &InstanceConfig) -> Result<Box<dyn Guest>, GuestError> {
        let component = self.compile().await?;
        let engine = self.runtime.engine();
        self.runtime.ensure_ticker();

        let mut linker = Linker::new(engine);
        crate::linker::link(&mut linker).map_err(|e| GuestError::Invalid(format!("{:#}", e)))?;

        let ctx = FlowCtx::new(config).map_err(|e| GuestError::Invalid(format!("{:#}", e)))?;
        let mut store = Store::new(engine, ctx);
        store.set_epoch_deadline(1);
        store.epoch_deadline_async_yield_and_update(1);

        let instance = linker
            .instantiate_async(&mut store, &component)
            .await
            .map_err(|e| GuestError::Invalid(format!("{:#}", e)))?;

        let exports = component
            .get_export_index(None, OPERATIONS_INTERFACE)
            .ok_or_else(|| GuestError::Invalid(format!("missing export {}", OPERATIONS_INTERFACE)))?;

        let invoke = component
            .get_export_index(Some(&exports), "invoke")
            .and_then(|idx| instance.get_func(&mut store, &idx))
            .ok_or_else(|| GuestError::Invalid(format!("{} has no invoke", OPERATIONS_INTERFACE)))?;

        let configure = component
            .get_export_index(Some(&exports), "configure")
            .and_then(|idx| instance.get_func(&mut store, &idx));

        let mut guest = WasmGuest { store, invoke };

        if let Some(configure) = configure {
            let settings = config::encode_settings(&config.settings)
                .map_err(|e| GuestError::Invalid(e.to_string()))?;
            debug!(len = settings.len(), "configuring component");
            guest.call(configure, &[wire::bytes_to_val(&settings)]).await?;
        }

        Ok(Box::new(guest))
    }
}

pub struct WasmGuest {
    store: Store<FlowCtx>,
    invoke: Func,
}

impl WasmGuest {
    /// Calls a `func(..) -> result<_, string>` export.
    async fn call(&mut self, func: Func, args: &[Val]) -> Result<(), GuestError> {
        let mut results = [Val::Bool(false)];
        func.call_async(&mut self.store, args, &mut results)
            .await
            .map_err(|e| GuestError::Trap(format!("{:#}", e)))?;
        func.post_return_async(&mut self.store)
            .await
            .map_err(|e| GuestError::Trap(format!("{:#}", e)))?;

        match &results[0] {
            Val::Result(Ok(_)) => Ok(()),
            Val::Result(Err(Some(err))) => match err.as_ref() {
                Val::String(msg) => Err(GuestError::Failed(msg.clone())),
                other => Err(GuestError::Protocol(format!("unexpected error value {:?}", other))),
            },
            Val::Result(Err(None)) => Err(GuestError::Failed("operation failed".into())),
            other => Err(GuestError::Protocol(format!("unexpected return value {:?}", other))),
        }
    }
}

#[async_trait]
impl Guest for WasmGuest {
    async fn invoke(
        &mut self,
        operation: &str,
        config: &OperationConfig,
        ports: Ports,
    ) -> Result<(), GuestError> {
        let settings = config
            .encode_settings()
            .map_err(|e| GuestError::Protocol(e.to_string()))?;
        let args = [Val::String(operation.to_string()), wire::bytes_to_val(&settings)];

        let invoke = self.invoke;
        self.store.data_mut().ports = Some(ports);
        let result = self.call(invoke, &args).await;
        self.store.data_mut().ports = None;
        result
    }
}
