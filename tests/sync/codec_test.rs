// Codec Tests
// Tests for datagram encoding and tolerant decoding

use serde_json::{json, Map, Value};
use sudoku_mesh::sync::codec::{decode, encode, encode_batch, encode_envelope};
use sudoku_mesh::sync::{Bye, Envelope, PeerAddress, Ping};

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

// ============================================================================
// ENCODING
// ============================================================================

#[test]
fn test_encode_includes_kind() {
    let bytes = encode("ping", fields(json!({"addr": "10.0.0.1", "port": 5000, "timestamp": 1.5})));
    let value: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(value["kind"], "ping");
    assert_eq!(value["port"], 5000);
}

#[test]
fn test_encode_is_single_line() {
    let sender = PeerAddress::new("10.0.0.1", 5000);
    let envelope = Envelope::from_payload(&Bye::new(&sender)).unwrap();
    let bytes = encode_envelope(&envelope);

    assert!(!bytes.contains(&b'\n'));
}

#[test]
fn test_batch_decodes_in_order() {
    let sender = PeerAddress::new("10.0.0.1", 5000);
    let first = Envelope::from_payload(&Ping::new(&sender, 1.0)).unwrap();
    let second = Envelope::from_payload(&Bye::new(&sender)).unwrap();

    let decoded = decode(&encode_batch(&[first.clone(), second.clone()]));
    assert_eq!(decoded, vec![first, second]);
}

// ============================================================================
// DECODING
// ============================================================================

#[test]
fn test_decode_skips_garbage_lines() {
    let datagram = concat!(
        "{\"kind\":\"bye\",\"addr\":\"10.0.0.1\",\"port\":1}\n",
        "this is not json\n",
        "{\"addr\":\"10.0.0.2\",\"port\":2}\n",
        "[1,2,3]\n",
        "\n",
        "  {\"kind\":\"ping\",\"addr\":\"10.0.0.3\",\"port\":3,\"timestamp\":0.5}  \r\n",
    );
    let decoded = decode(datagram.as_bytes());

    let kinds: Vec<&str> = decoded.iter().map(Envelope::kind).collect();
    assert_eq!(kinds, vec!["bye", "ping"]);
}

#[test]
fn test_decode_non_utf8_yields_nothing() {
    assert!(decode(&[0xff, 0xfe, 0x00]).is_empty());
}

#[test]
fn test_decode_empty_datagram() {
    assert!(decode(b"").is_empty());
}

#[test]
fn test_decode_keeps_unknown_kinds() {
    let decoded = decode(br#"{"kind":"chat","text":"hi"}"#);

    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].kind(), "chat");
    assert_eq!(decoded[0].field("text"), Some(&json!("hi")));
}

#[test]
fn test_decode_rejects_non_string_kind() {
    assert!(decode(br#"{"kind":42}"#).is_empty());
}
