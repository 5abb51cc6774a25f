//! # Host Imports
//!
//! Wires the `flowrun:component/ports` interface and WASI preview 2 into a
//! linker. Port functions resolve the active [`crate::ports::Ports`] from the
//! store at call time, so one linked instance serves every invocation.

use wasmtime::component::Linker;
use wasmtime::component::LinkerInstance;
use wasmtime::component::Val;

use flowport::wire;

use crate::context::FlowCtx;

pub const PORTS_INTERFACE: &str = "flowrun:component/ports";
pub const OPERATIONS_INTERFACE: &str = "flowrun:component/operations";

/// Links every import a flowrun component may use.
pub fn link(linker: &mut Linker<FlowCtx>) -> wasmtime::Result<()> {
    wasmtime_wasi::p2::add_to_linker_async(linker)?;
    let mut ports = linker.instance(PORTS_INTERFACE)?;
    link_next_input(&mut ports)?;
    link_emit(&mut ports)?;
    Ok(())
}

/// `next-input: func() -> option<packet>`
fn link_next_input(instance: &mut LinkerInstance<'_, FlowCtx>) -> wasmtime::Result<()> {
    instance.func_new_async("next-input", |mut store, _func_ty, _args, results| {
        Box::new(async move {
            let packet = match store.data_mut().ports.as_mut() {
                Some(ports) => ports.recv().await,
                None => None,
            };
            results[0] = Val::Option(packet.map(|p| Box::new(wire::to_val(&p))));
            Ok(())
        })
    })
}

/// `emit: func(packet: packet) -> bool`
///
/// A malformed packet traps the guest.
fn link_emit(instance: &mut LinkerInstance<'_, FlowCtx>) -> wasmtime::Result<()> {
    instance.func_new_async("emit", |mut store, _func_ty, args, results| {
        Box::new(async move {
            let val = args
                .first()
                .ok_or_else(|| wasmtime::Error::msg("emit called without a packet"))?;
            let packet = wire::from_val(val).map_err(|e| wasmtime::Error::msg(e.to_string()))?;

            let sent = match store.data_mut().ports.as_mut() {
                Some(ports) => ports.send(packet).await.is_ok(),
                None => false,
            };
            results[0] = Val::Bool(sent);
            Ok(())
        })
    })
}
