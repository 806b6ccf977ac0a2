// Protocol - Message types for peer communication
//
// Defines the wire format for every message exchanged between nodes:
// - Hello/Bye: membership push and cooperative departure
// - Ping/Pong: liveness probing
// - AskGamedata/Gamedata: snapshot request and response
// - Move: single-cell edit broadcast
//
// An envelope is a JSON object with a mandatory `kind` field. The envelope
// itself is untyped so that handlers for kinds unknown to this crate can be
// plugged in at runtime; the typed payloads below are views over it.

use crate::game::Grid;
use crate::sync::peer::{ip_literal, port_from_any, PeerAddress};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the discriminator field
pub const KIND_FIELD: &str = "kind";

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Envelope is not a JSON object")]
    NotAnObject,

    #[error("Envelope has no string `kind` field")]
    MissingKind,

    #[error("Expected kind `{expected}`, got `{actual}`")]
    KindMismatch { expected: &'static str, actual: String },

    #[error("Invalid fields: {0}")]
    InvalidFields(#[from] serde_json::Error),
}

/// A typed message body that maps onto one envelope kind
pub trait Payload: Serialize + DeserializeOwned {
    /// Value of the `kind` field for this payload
    const KIND: &'static str;
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// One decoded protocol message: a kind plus kind-specific fields
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    kind: String,
    fields: Map<String, Value>,
}

impl Envelope {
    /// Create an envelope from raw parts; a `kind` entry in `fields` is ignored
    pub fn new(kind: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove(KIND_FIELD);
        Self {
            kind: kind.into(),
            fields,
        }
    }

    /// Wrap a typed payload
    pub fn from_payload<P: Payload>(payload: &P) -> Result<Self, ProtocolError> {
        match serde_json::to_value(payload)? {
            Value::Object(fields) => Ok(Self::new(P::KIND, fields)),
            _ => Err(ProtocolError::NotAnObject),
        }
    }

    /// Parse an envelope out of a JSON value
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut fields) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        match fields.remove(KIND_FIELD) {
            Some(Value::String(kind)) => Ok(Self { kind, fields }),
            _ => Err(ProtocolError::MissingKind),
        }
    }

    /// Render as a JSON object with the `kind` field included
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert(KIND_FIELD.to_string(), Value::String(self.kind.clone()));
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Get the kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Get all fields except `kind`
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Get one field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Interpret the fields as a typed payload
    pub fn decode<P: Payload>(&self) -> Result<P, ProtocolError> {
        if self.kind != P::KIND {
            return Err(ProtocolError::KindMismatch {
                expected: P::KIND,
                actual: self.kind.clone(),
            });
        }
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

// ============================================================================
// MEMBERSHIP
// ============================================================================

/// Join announcement, optionally carrying the sender's full peer list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hello {
    #[serde(deserialize_with = "ip_literal")]
    pub addr: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<PeerAddress>>,
}

impl Hello {
    /// Hello without a peer list
    pub fn new(sender: &PeerAddress) -> Self {
        Self {
            addr: sender.host().to_string(),
            port: sender.port(),
            peers: None,
        }
    }

    /// Attach a peer list
    pub fn with_peers(mut self, peers: Vec<PeerAddress>) -> Self {
        self.peers = Some(peers);
        self
    }

    /// Address of the sender
    pub fn sender(&self) -> PeerAddress {
        PeerAddress::new(self.addr.clone(), self.port)
    }
}

impl Payload for Hello {
    const KIND: &'static str = "hello";
}

/// Cooperative departure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bye {
    #[serde(deserialize_with = "ip_literal")]
    pub addr: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
}

impl Bye {
    pub fn new(sender: &PeerAddress) -> Self {
        Self {
            addr: sender.host().to_string(),
            port: sender.port(),
        }
    }

    pub fn sender(&self) -> PeerAddress {
        PeerAddress::new(self.addr.clone(), self.port)
    }
}

impl Payload for Bye {
    const KIND: &'static str = "bye";
}

// ============================================================================
// HEARTBEAT
// ============================================================================

/// Liveness probe carrying the send time in epoch seconds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    #[serde(deserialize_with = "ip_literal")]
    pub addr: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
    pub timestamp: f64,
}

impl Ping {
    pub fn new(sender: &PeerAddress, timestamp: f64) -> Self {
        Self {
            addr: sender.host().to_string(),
            port: sender.port(),
            timestamp,
        }
    }

    pub fn sender(&self) -> PeerAddress {
        PeerAddress::new(self.addr.clone(), self.port)
    }
}

impl Payload for Ping {
    const KIND: &'static str = "ping";
}

/// Liveness reply echoing the ping's timestamp
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    #[serde(deserialize_with = "ip_literal")]
    pub addr: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
    pub timestamp: f64,
}

impl Pong {
    pub fn new(sender: &PeerAddress, timestamp: f64) -> Self {
        Self {
            addr: sender.host().to_string(),
            port: sender.port(),
            timestamp,
        }
    }

    pub fn sender(&self) -> PeerAddress {
        PeerAddress::new(self.addr.clone(), self.port)
    }
}

impl Payload for Pong {
    const KIND: &'static str = "pong";
}

// ============================================================================
// STATE SYNC
// ============================================================================

/// Snapshot request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AskGamedata {
    #[serde(deserialize_with = "ip_literal")]
    pub addr: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
}

impl AskGamedata {
    pub fn new(sender: &PeerAddress) -> Self {
        Self {
            addr: sender.host().to_string(),
            port: sender.port(),
        }
    }

    pub fn sender(&self) -> PeerAddress {
        PeerAddress::new(self.addr.clone(), self.port)
    }
}

impl Payload for AskGamedata {
    const KIND: &'static str = "ask_gamedata";
}

/// Snapshot response: the pre-increment generator seed and the working grid
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gamedata {
    pub seed: u64,
    pub puzzle: Grid,
}

impl Payload for Gamedata {
    const KIND: &'static str = "gamedata";
}

/// Single-cell edit; `number` 0 clears the cell
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub row: usize,
    pub col: usize,
    pub number: u8,
    #[serde(deserialize_with = "ip_literal")]
    pub addr: String,
    #[serde(deserialize_with = "port_from_any")]
    pub port: u16,
}

impl Move {
    pub fn new(row: usize, col: usize, number: u8, sender: &PeerAddress) -> Self {
        Self {
            row,
            col,
            number,
            addr: sender.host().to_string(),
            port: sender.port(),
        }
    }

    pub fn sender(&self) -> PeerAddress {
        PeerAddress::new(self.addr.clone(), self.port)
    }
}

impl Payload for Move {
    const KIND: &'static str = "move";
}
