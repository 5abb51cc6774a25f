//! # Runtime
//!
//! Owns the wasmtime [`Engine`] shared by every component loaded through it,
//! and the epoch ticker that keeps running guests preemptible.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;
use wasmtime::Engine;

use crate::component::ComponentHandle;
use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::error::Result;
use crate::wasm::WasmModule;

/// Floor for `RuntimeConfig::epoch_tick`; a zero interval is not a timer.
const MIN_EPOCH_TICK: Duration = Duration::from_millis(1);

/// Cheap to clone; clones share one engine and one ticker.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Engine,
    config: RuntimeConfig,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let mut engine_config = wasmtime::Config::new();
        engine_config.async_support(true);
        engine_config.wasm_component_model(true);
        engine_config.epoch_interruption(true);

        let engine = Engine::new(&engine_config).map_err(Error::Engine)?;

        Ok(Self {
            inner: Arc::new(Inner {
                engine,
                config,
                ticker: Mutex::new(None),
            }),
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Wraps a component buffer in an uninstantiated handle.
    ///
    /// Only rejects empty buffers; compilation happens on `instantiate`.
    pub fn load(&self, bytes: impl Into<Vec<u8>>) -> Result<ComponentHandle> {
        let bytes: Vec<u8> = bytes.into();
        if bytes.is_empty() {
            return Err(Error::Load("component buffer is empty".into()));
        }
        debug!(len = bytes.len(), "component loaded");
        let module = WasmModule::new(self.clone(), bytes.into());
        Ok(ComponentHandle::from_module(module, self.inner.config.clone()))
    }

    /// Reads a component from disk and loads it.
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<ComponentHandle> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|error| Error::Io {
            path: path.to_path_buf(),
            error,
        })?;
        self.load(bytes)
    }

    /// Starts the epoch ticker unless it is already running.
    ///
    /// A ticker whose tokio runtime has shut down reports finished and is
    /// replaced on the current one. Must be called from within a tokio runtime.
    pub(crate) fn ensure_ticker(&self) {
        let Ok(mut ticker) = self.inner.ticker.lock() else {
            return;
        };
        if ticker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let engine = self.inner.engine.clone();
        let tick = self.inner.config.epoch_tick.max(MIN_EPOCH_TICK);
        debug!(?tick, "starting epoch ticker");
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                engine.increment_epoch();
            }
        }));
    }
}

#[cfg(test)]
impl Runtime {
    pub(crate) fn ticker_running(&self) -> bool {
        self.inner
            .ticker
            .lock()
            .map(|ticker| ticker.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(handle) = ticker.take() {
                handle.abort();
            }
        }
    }
}
