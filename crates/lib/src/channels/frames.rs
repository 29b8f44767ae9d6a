//! Network session frames: `req` / `res` / `event`, JSON over WebSocket.

use serde::{Deserialize, Serialize};

/// One wire frame, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// `{ "type": "req", "id", "method", "params" }`
    Req {
        id: String,
        method: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// `{ "type": "res", "id", "ok", "payload" or "error" }`
    Res {
        id: String,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// `{ "type": "event", "event", "payload" }`
    Event {
        event: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl Frame {
    /// New request with a fresh id. Returns the id alongside the frame.
    pub fn request(method: &str, params: serde_json::Value) -> (String, Self) {
        let id = uuid::Uuid::new_v4().to_string();
        let frame = Self::Req {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        (id, frame)
    }

    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Res {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Res {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn event(name: &str, payload: serde_json::Value) -> Self {
        Self::Event {
            event: name.to_string(),
            payload,
        }
    }
}

/// Payload of the `connect.challenge` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub nonce: String,
}

/// Params for `connect`: a device token to resume, or a signed device to start pairing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<ConnectAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<ConnectDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectAuth {
    pub device_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectDevice {
    pub id: String,
    pub public_key: String,
    pub signature: String,
    /// Unix ms
    pub signed_at: u64,
    pub nonce: String,
}

/// Payload of the `message` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub sender: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from_me: bool,
}

/// Params for `send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendParams {
    pub to: String,
    pub text: String,
}

/// Payload of `pair.code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairCode {
    pub code: String,
}

/// Payload of `pair.success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairSuccess {
    pub device_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_frame_parses_without_payload() {
        let f: Frame = serde_json::from_str(r#"{"type":"event","event":"pair.timeout"}"#).unwrap();
        match f {
            Frame::Event { event, payload } => {
                assert_eq!(event, "pair.timeout");
                assert!(payload.is_null());
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn error_response_omits_payload() {
        let json = serde_json::to_value(Frame::err("7", "unknown device token")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "res", "id": "7", "ok": false, "error": "unknown device token"})
        );
    }

    #[test]
    fn message_payload_defaults_from_me_to_false() {
        let p: MessagePayload =
            serde_json::from_str(r#"{"sender":"+1555@x","text":"hello"}"#).unwrap();
        assert!(!p.from_me);
    }
}
