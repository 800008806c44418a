//! Wire schema for the bidirectional message channel.
//!
//! Client→server envelopes carry a `seq`; server→client ones omit it, so the
//! two directions get distinct envelope types rather than one with an
//! `Option<u64>` threaded through every handler.

use serde::{Deserialize, Serialize};

use crate::overlay::EdgeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dir4 {
    N,
    E,
    S,
    W,
}

/// The six directions a `move` payload may carry: the four cardinals plus
/// facing-relative forward/back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoveDir {
    N,
    E,
    S,
    W,
    F,
    B,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    pub seq: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthPayload {
    pub session_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovePayload {
    pub dir: MoveDir,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TurnPayload {
    pub face: Dir4,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinWorldPayload {
    pub world_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractPayload {
    pub action: String,
    #[serde(default)]
    pub target: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct YouView {
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub face: Dir4,
    pub hp: i32,
    pub status: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubView {
    pub level: i32,
    pub x: i32,
    pub y: i32,
    #[serde(rename = "distFeet")]
    pub dist_feet: i64,
    pub direction: Option<Dir4>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellEdges {
    pub n: EdgeKind,
    pub e: EdgeKind,
    pub s: EdgeKind,
    pub w: EdgeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellView {
    pub x: i32,
    pub y: i32,
    pub edges: CellEdges,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cooldowns {
    pub move_ready_at_ms: u64,
    pub turn_ready_at_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldState {
    pub now: Option<u64>,
    pub you: YouView,
    pub hub: HubView,
    pub cooldowns: Cooldowns,
    pub world_hash: String,
    pub visible_cells: Vec<CellView>,
    pub minimap_cells: Vec<CellView>,
    pub nearby_entities: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResultReason {
    MoveCooldown,
    TurnCooldown,
    Blocked,
    BadDir,
    NotImplemented,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ActionResultReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthOk {
    pub user_id: String,
    pub character_id: String,
    pub world_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthErr {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    pub kind: String,
    pub data: serde_json::Value,
}

/// Server→client envelope. Serialized with an explicit `type` discriminant
/// and no `seq` field, matching the envelope asymmetry the protocol defines.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthOk(AuthOk),
    AuthErr(AuthErr),
    WorldState(WorldState),
    ActionResult(ActionResult),
    Error(ErrorMessage),
    Event(EventMessage),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_envelope_parses_move_payload() {
        let raw = r#"{"seq": 3, "type": "move", "payload": {"dir": "N"}}"#;
        let env: ClientEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.seq, 3);
        assert_eq!(env.kind, "move");
        let payload: MovePayload = serde_json::from_value(env.payload).unwrap();
        assert_eq!(payload.dir, MoveDir::N);
    }

    #[test]
    fn move_payload_rejects_unknown_fields() {
        let payload: serde_json::Value = serde_json::json!({"dir": "N", "speed": 9000});
        let err = serde_json::from_value::<MovePayload>(payload).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn server_message_tag_matches_snake_case_type_name() {
        let msg = ServerMessage::ActionResult(ActionResult {
            ok: true,
            reason: None,
            seq: None,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "action_result");
        assert_eq!(json["payload"]["ok"], true);
    }
}
