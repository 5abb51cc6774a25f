//! # Configuration
//!
//! Typed configuration for the three scopes a caller controls:
//!
//! - [`RuntimeConfig`]: engine-wide buffer sizes and safety-net timeouts.
//! - [`InstanceConfig`]: the WASI environment of one instance plus free-form
//!   settings delivered to the component once, after instantiation.
//! - [`OperationConfig`]: per-invocation keys the runtime understands, plus
//!   free-form settings forwarded to the component's operation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use flowpack::Value;
use tracing::warn;

/// Operation config key for the invocation deadline, in milliseconds.
pub const TIMEOUT_KEY: &str = "timeout";
/// Operation config key overriding the output buffer size.
pub const OUTPUT_CAPACITY_KEY: &str = "output_capacity";

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Packets buffered between the input feeder and the component.
    pub input_capacity: usize,
    /// Packets buffered between the component and the caller.
    pub output_capacity: usize,
    pub instantiate_timeout: Duration,
    /// How long `terminate` waits for the worker before aborting it.
    pub terminate_timeout: Duration,
    /// How long a cancelled guest may keep running before its worker is aborted.
    pub cancel_timeout: Duration,
    /// Epoch interval at which running guests yield to the scheduler.
    pub epoch_tick: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            input_capacity: 16,
            output_capacity: 16,
            instantiate_timeout: Duration::from_secs(30),
            terminate_timeout: Duration::from_secs(5),
            cancel_timeout: Duration::from_secs(1),
            epoch_tick: Duration::from_millis(10),
        }
    }
}

/// Environment of one component instance.
#[derive(Clone, Debug, Default)]
pub struct InstanceConfig {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub inherit_stdio: bool,
    /// Host directories mounted into the guest as `(host, guest)` pairs.
    pub preopens: Vec<(PathBuf, String)>,
    pub settings: BTreeMap<String, Value>,
}

impl InstanceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn inherit_stdio(mut self, inherit: bool) -> Self {
        self.inherit_stdio = inherit;
        self
    }

    /// Mounts `host` at `guest` with full read and write access.
    pub fn preopen(mut self, host: impl Into<PathBuf>, guest: impl Into<String>) -> Self {
        self.preopens.push((host.into(), guest.into()));
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Configuration of one invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperationConfig {
    pub timeout: Option<Duration>,
    pub output_capacity: Option<usize>,
    /// Forwarded verbatim to the component.
    pub settings: BTreeMap<String, Value>,
}

impl OperationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = Some(capacity);
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Splits a free-form map into recognized keys and settings.
    ///
    /// A recognized key with an unusable value is dropped with a warning
    /// rather than forwarded.
    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        let mut config = Self::default();
        for (key, value) in map {
            match key.as_str() {
                TIMEOUT_KEY => match value.as_i64().and_then(|ms| u64::try_from(ms).ok()) {
                    Some(ms) => config.timeout = Some(Duration::from_millis(ms)),
                    None => warn!(?value, "ignoring non-numeric timeout"),
                },
                OUTPUT_CAPACITY_KEY => {
                    match value.as_i64().and_then(|n| usize::try_from(n).ok()).filter(|n| *n > 0) {
                        Some(n) => config.output_capacity = Some(n),
                        None => warn!(?value, "ignoring invalid output capacity"),
                    }
                }
                _ => {
                    config.settings.insert(key, value);
                }
            }
        }
        config
    }

    /// The settings as the component receives them.
    pub fn encode_settings(&self) -> flowpack::Result<Vec<u8>> {
        encode_settings(&self.settings)
    }
}

pub(crate) fn encode_settings(settings: &BTreeMap<String, Value>) -> flowpack::Result<Vec<u8>> {
    flowpack::encode(&Value::Map(settings.clone()))
}
