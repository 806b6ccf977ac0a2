// Codec - Envelopes to datagram bytes and back
//
// One datagram carries one or more envelopes, each a single line of JSON.
// Decoding never fails: lines that are not JSON objects with a string
// `kind` are logged and skipped.

use crate::sync::protocol::{Envelope, ProtocolError};
use serde_json::{Map, Value};
use tracing::warn;

/// Encode a kind and its fields as one line of UTF-8 JSON
pub fn encode(kind: &str, fields: Map<String, Value>) -> Vec<u8> {
    encode_envelope(&Envelope::new(kind, fields))
}

/// Encode one envelope
pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    serde_json::to_vec(&envelope.to_value()).unwrap_or_default()
}

/// Pack several envelopes into one newline-separated datagram
pub fn encode_batch(envelopes: &[Envelope]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, envelope) in envelopes.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.extend(encode_envelope(envelope));
    }
    out
}

/// Decode every well-formed envelope in a datagram, in order
pub fn decode(bytes: &[u8]) -> Vec<Envelope> {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => {
            warn!(%error, len = bytes.len(), "dropping datagram that is not UTF-8");
            return Vec::new();
        }
    };

    let mut envelopes = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<Value>(line)
            .map_err(ProtocolError::from)
            .and_then(Envelope::from_value);
        match parsed {
            Ok(envelope) => envelopes.push(envelope),
            Err(error) => warn!(%error, line, "dropping malformed envelope"),
        }
    }
    envelopes
}
