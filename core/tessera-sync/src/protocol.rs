//! Wire messages and the broker line codec.
//!
//! Server → client frames are JSON objects whose `method` field is `add`,
//! `mod`, or `rem`. Client → server frames are JSON objects with a `method`
//! string; the only method the fabric itself handles is
//! `updateSubscription`, everything else passes through to application hooks
//! as an opaque [`CustomMessage`].
//!
//! On broker channels a payload may carry a routing header in front of the
//! JSON: `from <chunk> ` tells recipients already subscribed to `<chunk>` to
//! suppress the message. This is what keeps a cross-chunk move down to
//! exactly one client-visible event per subscriber.

use crate::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_types::{ChunkKey, ObjectId};
use tracing::warn;

/// Header prefix for conditional deliveries.
const FROM_HEADER: &str = "from ";

// ── Server → client ──────────────────────────────────────────────

/// Full-state delivery: sent on subscription snapshot, on create, and to the
/// destination chunk of a cross-chunk move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMessage {
    pub state: Value,
    pub id: ObjectId,
    /// The chunk this object is added to.
    #[serde(rename = "sKey")]
    pub s_key: ChunkKey,
    /// Present iff the object is arriving from another chunk.
    #[serde(rename = "psKey", skip_serializing_if = "Option::is_none", default)]
    pub ps_key: Option<ChunkKey>,
    pub v: u64,
    pub t: String,
}

/// Incremental diff delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModMessage {
    pub diff: Value,
    pub id: ObjectId,
    pub v: u64,
    /// The chunk the object occupied before this mutation.
    #[serde(rename = "sKey")]
    pub s_key: ChunkKey,
    /// Present iff the object is moving to another chunk.
    #[serde(rename = "nsKey", skip_serializing_if = "Option::is_none", default)]
    pub ns_key: Option<ChunkKey>,
}

/// Tombstone delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemMessage {
    #[serde(rename = "sKey")]
    pub s_key: ChunkKey,
    pub t: String,
    pub id: ObjectId,
}

/// A frame the fabric sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ServerMessage {
    #[serde(rename = "add")]
    Add(AddMessage),
    #[serde(rename = "mod")]
    Mod(ModMessage),
    #[serde(rename = "rem")]
    Rem(RemMessage),
}

impl ServerMessage {
    /// Serializes the frame to its wire bytes.
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

// ── Client → server ──────────────────────────────────────────────

/// A request to change the session's chunk subscription set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSubscriptionMessage {
    #[serde(rename = "mapID", default)]
    pub map_id: String,
    #[serde(default)]
    pub add: Vec<ChunkKey>,
    #[serde(default)]
    pub remove: Vec<ChunkKey>,
}

/// A client frame whose method the fabric does not handle itself. Passed
/// through to application hooks untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomMessage {
    pub method: String,
    pub data: Vec<u8>,
}

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    UpdateSubscription(UpdateSubscriptionMessage),
    Custom(CustomMessage),
}

#[derive(Deserialize)]
struct MethodProbe {
    method: String,
}

/// Decodes a client frame. Frames without a JSON `method` string are
/// protocol errors; unknown methods are not.
pub fn decode_client(bytes: &[u8]) -> SyncResult<ClientMessage> {
    let probe: MethodProbe = serde_json::from_slice(bytes)
        .map_err(|e| SyncError::Protocol(format!("client frame has no method: {e}")))?;

    match probe.method.as_str() {
        "updateSubscription" => {
            let msg: UpdateSubscriptionMessage = serde_json::from_slice(bytes)?;
            Ok(ClientMessage::UpdateSubscription(msg))
        }
        _ => Ok(ClientMessage::Custom(CustomMessage {
            method: probe.method,
            data: bytes.to_vec(),
        })),
    }
}

// ── Broker line codec ────────────────────────────────────────────

/// A payload received on a broker channel, with its routing header parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryLine {
    /// Deliver unconditionally.
    Plain(Vec<u8>),
    /// Deliver iff the recipient is not subscribed to `chunk`.
    From { chunk: ChunkKey, payload: Vec<u8> },
}

/// Prefixes `payload` with the `from <chunk> ` header.
pub fn encode_from(chunk: &ChunkKey, payload: &[u8]) -> Vec<u8> {
    let mut line = Vec::with_capacity(FROM_HEADER.len() + chunk.as_str().len() + 1 + payload.len());
    line.extend_from_slice(FROM_HEADER.as_bytes());
    line.extend_from_slice(chunk.as_str().as_bytes());
    line.push(b' ');
    line.extend_from_slice(payload);
    line
}

/// Splits a broker line into its optional header and JSON payload.
///
/// A line starting with `{` is a plain payload. A recognized `from` header
/// makes the delivery conditional. Any other prefix is logged and the JSON
/// forwarded as a plain payload. Lines with no JSON at all are errors.
pub fn decode_line(bytes: &[u8]) -> SyncResult<DeliveryLine> {
    let Some(split) = bytes.iter().position(|b| *b == b'{') else {
        return Err(SyncError::Protocol(format!(
            "broker line has no JSON payload: {}",
            String::from_utf8_lossy(bytes)
        )));
    };
    if split == 0 {
        return Ok(DeliveryLine::Plain(bytes.to_vec()));
    }

    let payload = bytes[split..].to_vec();
    let header = String::from_utf8_lossy(&bytes[..split]);

    if let Some(rest) = header.strip_prefix(FROM_HEADER) {
        if let Ok(chunk) = ChunkKey::parse(rest.trim_end()) {
            return Ok(DeliveryLine::From { chunk, payload });
        }
    }

    warn!(header = %header, "unrecognized broker line header, forwarding payload");
    Ok(DeliveryLine::Plain(payload))
}
