use flowpack::Value;
use wasmtime::component::Val;

use crate::*;

// ============================================================================
//  1. CONSTRUCTION
// ============================================================================

#[test]
fn test_data_packet() {
    let packet = Packet::encode("data", &Value::map([("name", "World")])).unwrap();
    assert_eq!(packet.port(), "data");
    assert!(!packet.is_done());
    assert!(!packet.is_error());
    let decoded = packet.decode().unwrap().unwrap();
    assert_eq!(decoded.get("name").and_then(Value::as_str), Some("World"));
}

#[test]
fn test_empty_port_rejected() {
    assert_eq!(Packet::data("", vec![1]), Err(Error::InvalidPort(String::new())));
    assert!(matches!(Packet::encode("", &Value::Nil), Err(Error::InvalidPort(_))));
}

#[test]
fn test_signals_carry_no_payload() {
    for port in ["data", "output", SYSTEM_PORT] {
        let done = Packet::done(port);
        assert!(done.is_done());
        assert_eq!(done.payload(), None);
        assert!(done.decode().is_none());

        let err = Packet::error(port, "boom");
        assert!(err.is_error());
        assert_eq!(err.payload(), None);
        assert_eq!(err.error_message(), Some("boom"));
    }
}

#[test]
fn test_malformed_payload_decode_fails() {
    let packet = Packet::data("data", vec![0xFF, 0x00]).unwrap();
    assert_eq!(packet.decode(), Some(Err(flowpack::Error::InvalidTag(0xFF))));
}

// ============================================================================
//  2. BOUNDARY
// ============================================================================

fn record(port: &str, payload: Option<&[u8]>, done: bool, error: Option<&str>) -> Val {
    Val::Record(vec![
        ("port".into(), Val::String(port.into())),
        ("payload".into(), Val::Option(payload.map(|b| Box::new(wire::bytes_to_val(b))))),
        ("done".into(), Val::Bool(done)),
        ("error".into(), Val::Option(error.map(|e| Box::new(Val::String(e.into()))))),
    ])
}

#[test]
fn test_lower_then_lift() {
    let packets = [
        Packet::data("data", vec![1, 2, 3]).unwrap(),
        Packet::done("data"),
        Packet::error("output", "failed"),
    ];
    for packet in packets {
        assert_eq!(wire::from_val(&wire::to_val(&packet)).unwrap(), packet);
    }
}

#[test]
fn test_lift_rejects_done_with_payload() {
    let val = record("data", Some(&[1]), true, None);
    assert!(matches!(wire::from_val(&val), Err(Error::ProtocolViolation(_))));
}

#[test]
fn test_lift_rejects_error_with_payload() {
    let val = record("data", Some(&[1]), false, Some("x"));
    assert!(matches!(wire::from_val(&val), Err(Error::ProtocolViolation(_))));
}

#[test]
fn test_lift_rejects_empty_record() {
    let val = record("data", None, false, None);
    assert!(matches!(wire::from_val(&val), Err(Error::ProtocolViolation(_))));
}

#[test]
fn test_lift_rejects_empty_port() {
    let val = record("", None, true, None);
    assert_eq!(wire::from_val(&val), Err(Error::InvalidPort(String::new())));
}

#[test]
fn test_lift_missing_field() {
    let val = Val::Record(vec![("port".into(), Val::String("data".into()))]);
    assert_eq!(wire::from_val(&val), Err(Error::MissingField("payload".into())));
}

#[test]
fn test_lift_type_mismatch() {
    assert!(matches!(
        wire::from_val(&Val::String("nope".into())),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(
        wire::val_to_bytes(&Val::List(vec![Val::U32(1)])),
        Err(Error::TypeMismatch { .. })
    ));
}
