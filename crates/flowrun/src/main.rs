//! flowrun - invoke one operation of a WebAssembly component from the shell.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowrun::DecodePolicy;
use flowrun::Delivery;
use flowrun::Driver;
use flowrun::InstanceConfig;
use flowrun::OperationConfig;
use flowrun::Request;
use flowrun::Runtime;
use flowrun::RuntimeConfig;
use flowrun::flowpack::Value;

/// Sends one value to a component operation and prints what comes back.
#[derive(Debug, Parser)]
#[command(name = "flowrun", version, about)]
struct Cli {
    /// Path to the component binary.
    component: PathBuf,

    /// Operation to invoke.
    #[arg(short, long, default_value = "render")]
    operation: String,

    /// Port the input value is sent on.
    #[arg(short, long, default_value = "data")]
    port: String,

    /// Input value as JSON.
    #[arg(short, long, default_value = "{}")]
    input: String,

    /// Operation config as a JSON object.
    #[arg(short, long, default_value = "{}")]
    config: String,

    /// Invocation deadline in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Grace period for teardown before the worker is aborted.
    #[arg(long)]
    terminate_timeout_ms: Option<u64>,

    /// Argument passed to the component's WASI environment (repeatable).
    #[arg(long = "arg")]
    args: Vec<String>,

    /// KEY=VALUE pair for the component's WASI environment (repeatable).
    #[arg(long = "env", value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// HOST[::GUEST] directory to mount into the component (repeatable).
    #[arg(long = "dir", value_parser = parse_preopen)]
    dirs: Vec<(PathBuf, String)>,

    /// Let the component write to this process's stdio.
    #[arg(long)]
    inherit_stdio: bool,

    /// Stop at the first payload that fails to decode.
    #[arg(long)]
    abort_on_decode_error: bool,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

fn parse_preopen(raw: &str) -> Result<(PathBuf, String), String> {
    let (host, guest) = raw.split_once("::").unwrap_or((raw, raw));
    if host.is_empty() || guest.is_empty() {
        return Err(format!("expected HOST[::GUEST], got {:?}", raw));
    }
    Ok((PathBuf::from(host), guest.to_string()))
}

fn parse_json(flag: &str, raw: &str) -> anyhow::Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("--{} is not valid JSON", flag))?;
    Ok(Value::from(json))
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let input = parse_json("input", &cli.input)?;
    let Value::Map(settings) = parse_json("config", &cli.config)? else {
        bail!("--config must be a JSON object");
    };

    let mut config = OperationConfig::from_map(settings);
    if let Some(ms) = cli.timeout_ms {
        config.timeout = Some(Duration::from_millis(ms));
    }

    let mut runtime_config = RuntimeConfig::default();
    if let Some(ms) = cli.terminate_timeout_ms {
        runtime_config.terminate_timeout = Duration::from_millis(ms);
    }

    let instance = InstanceConfig {
        args: cli.args,
        env: cli.env,
        inherit_stdio: cli.inherit_stdio,
        preopens: cli.dirs,
        ..InstanceConfig::default()
    };

    let policy = if cli.abort_on_decode_error {
        DecodePolicy::Abort
    } else {
        DecodePolicy::Report
    };

    let request = Request::new(cli.operation)
        .input(cli.port.clone(), &input)?
        .done(cli.port)?
        .config(config)
        .instance(instance)
        .decode_policy(policy);

    let runtime = Runtime::new(runtime_config)?;
    let mut handle = runtime.load_file(&cli.component).await?;

    Driver::drive(&mut handle, request, |delivery| match delivery {
        Delivery::Value { value, .. } => {
            println!("{}", serde_json::Value::from(&value));
        }
        Delivery::Done { port } => tracing::debug!(%port, "port done"),
        Delivery::DecodeFailed { port, error } => {
            eprintln!("Failed to decode packet on port {}: {}", port, error);
        }
    })
    .await?;

    println!("<Done>");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
