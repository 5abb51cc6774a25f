use std::sync::Mutex;

use flowpack::Value;
use wit_bindgen::generate;

generate!({
    world: "component",
    path: "../../wit/world.wit",
});

use flowrun::component::ports;
use flowrun::component::ports::Packet;

const DEFAULT_TEMPLATE: &str = "Hello, {{name}}!";

/// Template set through instance settings.
static TEMPLATE: Mutex<Option<String>> = Mutex::new(None);

struct Component;

fn template_of(config: &[u8]) -> Result<Option<String>, String> {
    if config.is_empty() {
        return Ok(None);
    }
    let settings = flowpack::decode(config).map_err(|e| e.to_string())?;
    Ok(settings.get("template").and_then(Value::as_str).map(String::from))
}

fn render(template: &str, value: &Value) -> String {
    let mut out = template.to_string();
    if let Some(fields) = value.as_map() {
        for (key, field) in fields {
            if let Some(text) = field.as_str() {
                out = out.replace(&format!("{{{{{}}}}}", key), text);
            }
        }
    }
    out
}

impl exports::flowrun::component::operations::Guest for Component {
    fn configure(config: Vec<u8>) -> Result<(), String> {
        let template = template_of(&config)?;
        if let Ok(mut slot) = TEMPLATE.lock() {
            *slot = template;
        }
        Ok(())
    }

    fn invoke(operation: String, config: Vec<u8>) -> Result<(), String> {
        if operation != "render" {
            return Err(format!("unknown operation: {}", operation));
        }

        let configured = TEMPLATE.lock().ok().and_then(|slot| slot.clone());
        let template = template_of(&config)?
            .or(configured)
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());

        while let Some(packet) = ports::next_input() {
            if packet.port != "data" {
                continue;
            }
            if let Some(error) = packet.error {
                return Err(format!("upstream error: {}", error));
            }
            if packet.done {
                break;
            }
            let Some(payload) = packet.payload else {
                continue;
            };
            let value = flowpack::decode(&payload).map_err(|e| e.to_string())?;
            let rendered = flowpack::encode(&Value::from(render(&template, &value)))
                .map_err(|e| e.to_string())?;

            let sent = ports::emit(&Packet {
                port: "output".to_string(),
                payload: Some(rendered),
                done: false,
                error: None,
            });
            if !sent {
                return Ok(());
            }
        }

        ports::emit(&Packet {
            port: "output".to_string(),
            payload: None,
            done: true,
            error: None,
        });
        Ok(())
    }
}

export!(Component);
