//! End-to-end runs through the driver.

mod common;

use flowrun::ComponentHandle;
use flowrun::DecodePolicy;
use flowrun::Delivery;
use flowrun::Driver;
use flowrun::Error;
use flowrun::HandleState;
use flowrun::OperationConfig;
use flowrun::Request;
use flowrun::Runtime;
use flowrun::flowpack::Value;

use common::*;

fn render_request(name: &str) -> Request {
    Request::new("render")
        .input("data", &Value::map([("name", name)]))
        .unwrap()
        .done("data")
        .unwrap()
}

#[tokio::test]
async fn test_drive_render() {
    let mut handle = handle(Render::default());
    let mut deliveries = Vec::new();

    let report = Driver::drive(&mut handle, render_request("World"), |d| deliveries.push(d))
        .await
        .unwrap();

    assert_eq!(
        deliveries,
        vec![
            Delivery::Value { port: "output".into(), value: Value::from("Hello, World!") },
            Delivery::Done { port: "output".into() },
        ]
    );
    assert_eq!(report.values, 1);
    assert_eq!(report.decode_errors, 0);
    assert_eq!(report.done_ports, vec!["output".to_string()]);
    assert_eq!(handle.state(), HandleState::Terminated);
}

#[tokio::test]
async fn test_drive_passes_operation_config() {
    let mut handle = handle(Render::default());
    let request = render_request("Ada").config(OperationConfig::new().with("template", "<{{name}}>"));
    let mut values = Vec::new();

    Driver::drive(&mut handle, request, |d| {
        if let Delivery::Value { value, .. } = d {
            values.push(value);
        }
    })
    .await
    .unwrap();

    assert_eq!(values, vec![Value::from("<Ada>")]);
}

#[tokio::test]
async fn test_malformed_payload_is_reported() {
    let mut handle = handle(Garbled);
    let mut deliveries = Vec::new();

    let report = Driver::drive(&mut handle, Request::new("garble"), |d| deliveries.push(d))
        .await
        .unwrap();

    assert_eq!(deliveries.len(), 4);
    assert_eq!(deliveries[0], Delivery::Value { port: "output".into(), value: Value::from("before") });
    assert!(matches!(&deliveries[1], Delivery::DecodeFailed { port, .. } if port == "output"));
    assert_eq!(deliveries[2], Delivery::Value { port: "output".into(), value: Value::from("after") });
    assert_eq!(deliveries[3], Delivery::Done { port: "output".into() });
    assert_eq!(report.values, 2);
    assert_eq!(report.decode_errors, 1);
}

#[tokio::test]
async fn test_malformed_payload_aborts_on_request() {
    let mut handle = handle(Garbled);
    let request = Request::new("garble").decode_policy(DecodePolicy::Abort);
    let mut deliveries = Vec::new();

    let err = Driver::drive(&mut handle, request, |d| deliveries.push(d)).await.unwrap_err();

    assert!(matches!(err, Error::Decode { ref port, .. } if port == "output"));
    assert_eq!(deliveries.len(), 1);
    assert_eq!(handle.state(), HandleState::Terminated);
}

#[tokio::test]
async fn test_component_error_fails_run() {
    let mut handle = handle(Failing);
    let err = Driver::drive(&mut handle, Request::new("fail"), |_| {}).await.unwrap_err();

    match err {
        Error::Component { port, message } => {
            assert_eq!(port, "output");
            assert_eq!(message, "bad input");
        }
        other => panic!("expected component error, got {}", other),
    }
    assert_eq!(handle.state(), HandleState::Terminated);
}

#[tokio::test]
async fn test_instantiation_failure_skips_invocation() {
    let mut handle = ComponentHandle::from_module(Unstartable::Rejects, test_config());
    let mut called = false;

    let err = Driver::drive(&mut handle, render_request("x"), |_| called = true)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Instantiation(_)));
    assert!(!called);
}

#[tokio::test]
async fn test_terminated_handle_yields_nothing() {
    let mut handle = ready(Render::default()).await;
    handle.terminate().await.unwrap();
    let mut called = false;

    let err = Driver::drive(&mut handle, render_request("x"), |_| called = true)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AlreadyTerminated));
    assert!(!called);
}

#[tokio::test]
async fn test_run_rejects_empty_component() {
    let driver = Driver::new(Runtime::new(test_config()).unwrap());
    let err = driver.run(Vec::new(), render_request("x"), |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Load(_)));
}

#[tokio::test]
async fn test_run_rejects_invalid_component() {
    let driver = Driver::new(Runtime::new(test_config()).unwrap());
    let err = driver.run(b"\0asm garbage".to_vec(), render_request("x"), |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::Instantiation(_)));
}

#[test]
fn test_request_rejects_empty_done_port() {
    let err = Request::new("render").done("").unwrap_err();
    assert!(matches!(err, Error::Port(flowrun::flowport::Error::InvalidPort(_))));

    let err = Request::new("render").input("", &Value::Nil).unwrap_err();
    assert!(matches!(err, Error::Port(flowrun::flowport::Error::InvalidPort(_))));
}
