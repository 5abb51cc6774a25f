//! Native guests exercising the invocation protocol without a wasm engine.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;

use flowrun::ComponentHandle;
use flowrun::Guest;
use flowrun::GuestError;
use flowrun::InstanceConfig;
use flowrun::Invocation;
use flowrun::Module;
use flowrun::OperationConfig;
use flowrun::Ports;
use flowrun::RuntimeConfig;
use flowrun::flowpack::Value;
use flowrun::flowport::Packet;

pub const DEFAULT_TEMPLATE: &str = "Hello, {{name}}!";

/// Short safety nets so misbehaving guests are reaped quickly.
pub fn test_config() -> RuntimeConfig {
    RuntimeConfig {
        instantiate_timeout: Duration::from_millis(500),
        terminate_timeout: Duration::from_millis(200),
        cancel_timeout: Duration::from_millis(100),
        ..RuntimeConfig::default()
    }
}

/// Instantiates a clone of `guest` for every handle.
pub struct Native<G> {
    guest: G,
}

#[async_trait]
impl<G: Guest + Clone + Sync> Module for Native<G> {
    async fn instantiate(&self, _config: &InstanceConfig) -> Result<Box<dyn Guest>, GuestError> {
        Ok(Box::new(self.guest.clone()))
    }
}

pub fn handle<G: Guest + Clone + Sync>(guest: G) -> ComponentHandle {
    ComponentHandle::from_module(Native { guest }, test_config())
}

pub async fn ready<G: Guest + Clone + Sync>(guest: G) -> ComponentHandle {
    let mut handle = handle(guest);
    handle.instantiate(InstanceConfig::default()).await.unwrap();
    handle
}

pub fn data(port: &str, value: impl Into<Value>) -> Packet {
    Packet::encode(port, &value.into()).unwrap()
}

pub async fn collect(invocation: &mut Invocation) -> Vec<Packet> {
    let mut packets = Vec::new();
    while let Some(packet) = invocation.next().await {
        packets.push(packet);
    }
    packets
}

pub fn render_template(template: &str, value: &Value) -> String {
    let mut out = template.to_string();
    if let Some(map) = value.as_map() {
        for (key, field) in map {
            if let Some(text) = field.as_str() {
                out = out.replace(&format!("{{{{{}}}}}", key), text);
            }
        }
    }
    out
}

// ----------------------------------------------------------------------------
//  Guests
// ----------------------------------------------------------------------------

/// Renders every value on `data` through a template onto `output`.
///
/// The template comes from the operation's `template` setting, then the
/// instance's, then [`DEFAULT_TEMPLATE`].
#[derive(Clone, Default)]
pub struct Render {
    template: Option<String>,
}

pub struct RenderModule;

#[async_trait]
impl Module for RenderModule {
    async fn instantiate(&self, config: &InstanceConfig) -> Result<Box<dyn Guest>, GuestError> {
        let template = config.settings.get("template").and_then(Value::as_str).map(String::from);
        Ok(Box::new(Render { template }))
    }
}

#[async_trait]
impl Guest for Render {
    async fn invoke(
        &mut self,
        operation: &str,
        config: &OperationConfig,
        mut ports: Ports,
    ) -> Result<(), GuestError> {
        if operation != "render" {
            return Err(GuestError::Failed(format!("unknown operation {}", operation)));
        }
        let template = config
            .get("template")
            .and_then(Value::as_str)
            .or(self.template.as_deref())
            .unwrap_or(DEFAULT_TEMPLATE)
            .to_string();

        while let Some(packet) = ports.recv().await {
            if packet.port() != "data" {
                continue;
            }
            if packet.is_done() {
                break;
            }
            let Some(Ok(value)) = packet.decode() else {
                return Err(GuestError::Failed("undecodable input".into()));
            };
            let rendered = Value::from(render_template(&template, &value));
            ports.send(Packet::encode("output", &rendered)?).await?;
        }
        ports.send(Packet::done("output")).await?;
        Ok(())
    }
}

/// Echoes every input packet back unchanged.
#[derive(Clone, Default)]
pub struct Echo;

#[async_trait]
impl Guest for Echo {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, mut ports: Ports) -> Result<(), GuestError> {
        while let Some(packet) = ports.recv().await {
            ports.send(packet).await?;
        }
        Ok(())
    }
}

/// Emits `count` values on `output`, counting each accepted send.
#[derive(Clone)]
pub struct Chatty {
    pub count: u64,
    pub sent: Arc<AtomicUsize>,
}

#[async_trait]
impl Guest for Chatty {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, mut ports: Ports) -> Result<(), GuestError> {
        for i in 0..self.count {
            if ports.send(data("output", i)).await.is_err() {
                return Ok(());
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Waits for input until told to stop.
#[derive(Clone, Default)]
pub struct Patient;

#[async_trait]
impl Guest for Patient {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, mut ports: Ports) -> Result<(), GuestError> {
        while ports.recv().await.is_some() {}
        Ok(())
    }
}

/// Never returns and never looks at its ports.
#[derive(Clone, Default)]
pub struct Stubborn;

#[async_trait]
impl Guest for Stubborn {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, _ports: Ports) -> Result<(), GuestError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Emits a value, an error, then keeps talking.
#[derive(Clone, Default)]
pub struct Failing;

#[async_trait]
impl Guest for Failing {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, mut ports: Ports) -> Result<(), GuestError> {
        ports.send(data("output", "first")).await?;
        ports.send(Packet::error("output", "bad input")).await?;
        let _ = ports.send(data("output", "late")).await;
        let _ = ports.send(Packet::error("output", "second error")).await;
        Ok(())
    }
}

/// Sends data after `Done` and repeats `Done`.
#[derive(Clone, Default)]
pub struct Sloppy;

#[async_trait]
impl Guest for Sloppy {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, mut ports: Ports) -> Result<(), GuestError> {
        ports.send(data("output", 1)).await?;
        ports.send(Packet::done("output")).await?;
        ports.send(data("output", 2)).await?;
        ports.send(Packet::done("output")).await?;
        ports.send(data("other", 3)).await?;
        ports.send(Packet::done("other")).await?;
        Ok(())
    }
}

/// Emits one malformed payload between two valid ones.
#[derive(Clone, Default)]
pub struct Garbled;

#[async_trait]
impl Guest for Garbled {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, mut ports: Ports) -> Result<(), GuestError> {
        ports.send(data("output", "before")).await?;
        ports.send(Packet::data("output", vec![0xFF, 0x00])?).await?;
        ports.send(data("output", "after")).await?;
        ports.send(Packet::done("output")).await?;
        Ok(())
    }
}

/// Returns an error without emitting anything.
#[derive(Clone, Default)]
pub struct Broken;

#[async_trait]
impl Guest for Broken {
    async fn invoke(&mut self, _: &str, _: &OperationConfig, _ports: Ports) -> Result<(), GuestError> {
        Err(GuestError::Failed("boom".into()))
    }
}

/// Fails or stalls during instantiation.
pub enum Unstartable {
    Rejects,
    Hangs,
}

#[async_trait]
impl Module for Unstartable {
    async fn instantiate(&self, _config: &InstanceConfig) -> Result<Box<dyn Guest>, GuestError> {
        match self {
            Self::Rejects => Err(GuestError::Invalid("missing exports".into())),
            Self::Hangs => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Box::new(Echo))
            }
        }
    }
}
