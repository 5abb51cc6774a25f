use std::time::Duration;

use flowport::Packet;

use crate::config::RuntimeConfig;
use crate::ports::Closed;
use crate::ports::Ports;
use crate::ports::Signal;
use crate::runtime::Runtime;

fn data(port: &str, byte: u8) -> Packet {
    Packet::data(port, vec![byte]).unwrap()
}

#[tokio::test]
async fn test_ports_relay_in_order() {
    let (mut ports, input, mut output, _signal) = Ports::channel(4, 4);

    input.send(data("data", 1)).await.unwrap();
    input.send(Packet::done("data")).await.unwrap();
    drop(input);

    assert_eq!(ports.recv().await, Some(data("data", 1)));
    assert_eq!(ports.recv().await, Some(Packet::done("data")));
    assert_eq!(ports.recv().await, None);

    ports.send(data("output", 2)).await.unwrap();
    ports.send(data("output", 3)).await.unwrap();
    assert_eq!(output.recv().await, Some(data("output", 2)));
    assert_eq!(output.recv().await, Some(data("output", 3)));
}

#[tokio::test]
async fn test_send_blocks_when_output_full() {
    let (mut ports, _input, mut output, _signal) = Ports::channel(1, 1);

    ports.send(data("output", 1)).await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(50), ports.send(data("output", 2))).await;
    assert!(blocked.is_err(), "second send should wait for capacity");

    assert_eq!(output.recv().await, Some(data("output", 1)));
    ports.send(data("output", 3)).await.unwrap();
    assert_eq!(output.recv().await, Some(data("output", 3)));
}

#[tokio::test]
async fn test_stop_signal_releases_blocked_guest() {
    let (mut ports, _input, _output, signal) = Ports::channel(1, 1);
    ports.send(data("output", 1)).await.unwrap();

    let blocked = tokio::spawn(async move {
        let sent = ports.send(data("output", 2)).await;
        let received = ports.recv().await;
        (sent, received)
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    signal.send_replace(Signal::Cancel);

    let (sent, received) = blocked.await.unwrap();
    assert_eq!(sent, Err(Closed));
    assert_eq!(received, None);
}

#[tokio::test]
async fn test_closed_output_is_reported() {
    let (mut ports, _input, output, _signal) = Ports::channel(1, 1);
    drop(output);
    assert!(ports.is_stopped());
    assert_eq!(ports.send(data("output", 1)).await, Err(Closed));
}

fn current_thread() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

/// The ticker survives a zero tick and follows the caller onto a new tokio runtime.
#[test]
fn test_epoch_ticker_restarts_after_runtime_shutdown() {
    let config = RuntimeConfig { epoch_tick: Duration::ZERO, ..RuntimeConfig::default() };
    let runtime = Runtime::new(config).unwrap();

    let first = current_thread();
    first.block_on(async {
        runtime.ensure_ticker();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(runtime.ticker_running());
    });
    drop(first);
    assert!(!runtime.ticker_running());

    let second = current_thread();
    second.block_on(async {
        runtime.ensure_ticker();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(runtime.ticker_running());
    });
}
