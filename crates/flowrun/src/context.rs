//! Store context for wasm component instances.

use wasmtime::component::ResourceTable;
use wasmtime_wasi::DirPerms;
use wasmtime_wasi::FilePerms;
use wasmtime_wasi::WasiCtx;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::WasiCtxView;
use wasmtime_wasi::WasiView;

use crate::config::InstanceConfig;
use crate::ports::Ports;

/// Per-instance state held in the wasmtime `Store`.
///
/// `ports` is only populated while an invocation is running; host functions
/// called outside of one see an exhausted input and a closed output.
pub struct FlowCtx {
    wasi: WasiCtx,
    table: ResourceTable,
    pub(crate) ports: Option<Ports>,
}

impl FlowCtx {
    /// Fails when a preopened directory cannot be opened.
    pub fn new(config: &InstanceConfig) -> wasmtime::Result<Self> {
        let mut builder = WasiCtxBuilder::new();
        builder.args(config.args.as_slice());
        builder.envs(config.env.as_slice());
        if config.inherit_stdio {
            builder.inherit_stdio();
        }
        for (host, guest) in &config.preopens {
            builder
                .preopened_dir(host, guest, DirPerms::all(), FilePerms::all())
                .map_err(|e| e.context(format!("failed to preopen {}", host.display())))?;
        }

        Ok(Self {
            wasi: builder.build(),
            table: ResourceTable::new(),
            ports: None,
        })
    }
}

impl WasiView for FlowCtx {
    fn ctx(&mut self) -> WasiCtxView<'_> {
        WasiCtxView {
            ctx: &mut self.wasi,
            table: &mut self.table,
        }
    }
}
