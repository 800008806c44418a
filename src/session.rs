//! Per-connection session state machine and action dispatcher.
//!
//! One [`Session`] per connection. Handlers run synchronously with respect
//! to the connection: the gateway task owns its `Session` exclusively
//! and feeds it messages in receive order.

use std::sync::Arc;

use crate::chunkgen::Dir;
use crate::discovery::DiscoveryStore;
use crate::protocol::{
    ActionResult, ActionResultReason, AuthErr, AuthOk, ClientEnvelope, Cooldowns, Dir4,
    ErrorMessage, MoveDir, ServerMessage, WorldState,
};
use crate::snapshot::{build_snapshot, dir4_as_dir, SnapshotPose};
use crate::storage::{CharacterStore, SessionStore, WorldRecordStore};
use crate::time::Clock;
use crate::world::WorldModel;

#[derive(Debug, Clone, Default)]
pub struct Cooldown {
    pub move_ready_at_ms: u64,
    pub turn_ready_at_ms: u64,
}

struct Authenticated {
    user_id: String,
    character_id: String,
    world_id: String,
    level: i32,
    x: i32,
    y: i32,
    face: Dir4,
    hp: i32,
}

/// Mutable per-connection state. `last_seq` starts at -1 so the first
/// accepted message may carry `seq = 0`.
pub struct Session {
    last_seq: i64,
    authed: Option<Authenticated>,
    cooldown: Cooldown,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            last_seq: -1,
            authed: None,
            cooldown: Cooldown::default(),
        }
    }
}

/// Shared, cross-connection collaborators a session dispatcher consults.
/// Bundled so `Session::handle` takes one argument instead of five.
pub struct SessionDeps {
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<dyn SessionStore>,
    pub characters: Arc<dyn CharacterStore>,
    pub worlds: Arc<dyn WorldRecordStore>,
    pub discovery: Arc<dyn DiscoveryStore>,
    pub world_seed_override: Option<u32>,
    pub move_cooldown_ms: u64,
    pub turn_cooldown_ms: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The character's current world, once authenticated. The gateway uses
    /// this to pick which [`WorldModel`] to consult for subsequent messages.
    pub fn world_id(&self) -> Option<&str> {
        self.authed.as_ref().map(|a| a.world_id.as_str())
    }

    /// Validate the envelope and dispatch it, returning every reply message
    /// the gateway should send back (in order). A protocol violation that
    /// should close the connection is signaled by returning `Err`.
    pub fn handle(
        &mut self,
        deps: &SessionDeps,
        world: &WorldModel,
        raw: ClientEnvelope,
    ) -> Result<Vec<ServerMessage>, String> {
        if raw.seq <= self.last_seq {
            return Ok(vec![ServerMessage::Error(ErrorMessage {
                code: "bad_seq".to_string(),
                message: format!("seq {} is not greater than last seq {}", raw.seq, self.last_seq),
                seq: Some(raw.seq),
            })]);
        }

        let known = matches!(
            raw.kind.as_str(),
            "auth" | "join_world" | "turn" | "move" | "interact" | "use_egg"
        );
        if !known {
            self.last_seq = raw.seq;
            return Ok(vec![ServerMessage::Error(ErrorMessage {
                code: "bad_schema".to_string(),
                message: format!("unknown message type '{}'", raw.kind),
                seq: Some(raw.seq),
            })]);
        }

        if self.authed.is_none() && raw.kind != "auth" {
            self.last_seq = raw.seq;
            return Ok(vec![ServerMessage::AuthErr(AuthErr {
                reason: "unauthenticated".to_string(),
            })]);
        }

        let reply = match raw.kind.as_str() {
            "auth" => self.handle_auth(deps, world, raw.seq, raw.payload),
            "join_world" => Ok(vec![not_implemented(raw.seq)]),
            "turn" => self.handle_turn(deps, world, raw.seq, raw.payload),
            "move" => self.handle_move(deps, world, raw.seq, raw.payload),
            "interact" | "use_egg" => Ok(vec![not_implemented(raw.seq)]),
            _ => unreachable!("classified as known above"),
        };

        self.last_seq = raw.seq;
        reply
    }

    fn handle_auth(
        &mut self,
        deps: &SessionDeps,
        world: &WorldModel,
        _seq: i64,
        payload: serde_json::Value,
    ) -> Result<Vec<ServerMessage>, String> {
        let payload: crate::protocol::AuthPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Ok(vec![bad_schema(e.to_string())]),
        };

        let loaded = deps
            .sessions
            .load_session(&payload.session_token)
            .map_err(|e| e.to_string())?;
        let Some(loaded) = loaded else {
            return Ok(vec![ServerMessage::AuthErr(AuthErr {
                reason: "invalid session".to_string(),
            })]);
        };

        let character = deps
            .characters
            .load_active_character(&loaded.user_id)
            .map_err(|e| e.to_string())?;
        let Some(character) = character else {
            return Ok(vec![ServerMessage::AuthErr(AuthErr {
                reason: "no active character".to_string(),
            })]);
        };

        let now = deps.clock.now_ms();
        self.authed = Some(Authenticated {
            user_id: loaded.user_id.clone(),
            character_id: character.character_id.clone(),
            world_id: character.world_id.clone(),
            level: character.level,
            x: character.x,
            y: character.y,
            face: character.face,
            hp: character.hp,
        });
        self.cooldown = Cooldown {
            move_ready_at_ms: now,
            turn_ready_at_ms: now,
        };

        let auth_ok = ServerMessage::AuthOk(AuthOk {
            user_id: loaded.user_id,
            character_id: character.character_id,
            world_id: character.world_id,
        });

        let mut out = vec![auth_ok];
        if let Some(state) = self.build_world_state(deps, world) {
            out.push(state);
        }
        Ok(out)
    }

    /// Build the `world_state` reply for the currently authenticated
    /// character; call sites append this after auth_ok and every successful
    /// action.
    pub fn build_world_state(&self, deps: &SessionDeps, world: &WorldModel) -> Option<ServerMessage> {
        let auth = self.authed.as_ref()?;
        let pose = SnapshotPose {
            level: auth.level,
            x: auth.x,
            y: auth.y,
            face: auth.face,
            hp: auth.hp,
            status: vec![],
        };
        let cooldowns = Cooldowns {
            move_ready_at_ms: self.cooldown.move_ready_at_ms,
            turn_ready_at_ms: self.cooldown.turn_ready_at_ms,
        };
        let snapshot: WorldState = build_snapshot(
            world,
            deps.discovery.as_ref(),
            &pose,
            cooldowns,
            deps.clock.now_ms(),
        );
        Some(ServerMessage::WorldState(snapshot))
    }

    fn handle_turn(
        &mut self,
        deps: &SessionDeps,
        world: &WorldModel,
        seq: i64,
        payload: serde_json::Value,
    ) -> Result<Vec<ServerMessage>, String> {
        let payload: crate::protocol::TurnPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Ok(vec![bad_schema(e.to_string())]),
        };

        let now = deps.clock.now_ms();
        if now < self.cooldown.turn_ready_at_ms {
            return Ok(vec![action_result(false, Some(ActionResultReason::TurnCooldown), seq)]);
        }

        let auth = self.authed.as_mut().ok_or("turn without authentication")?;
        auth.face = payload.face;
        self.cooldown.turn_ready_at_ms = now + deps.turn_cooldown_ms;

        deps.characters
            .save_position(&auth.character_id, &auth.world_id, auth.level, auth.x, auth.y, auth.face)
            .map_err(|e| e.to_string())?;

        let mut out = vec![action_result(true, None, seq)];
        if let Some(state) = self.build_world_state(deps, world) {
            out.push(state);
        }
        Ok(out)
    }

    fn handle_move(
        &mut self,
        deps: &SessionDeps,
        world: &WorldModel,
        seq: i64,
        payload: serde_json::Value,
    ) -> Result<Vec<ServerMessage>, String> {
        let payload: crate::protocol::MovePayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Ok(vec![bad_schema(e.to_string())]),
        };

        let now = deps.clock.now_ms();
        if now < self.cooldown.move_ready_at_ms {
            return Ok(vec![action_result(false, Some(ActionResultReason::MoveCooldown), seq)]);
        }

        let auth = self.authed.as_mut().ok_or("move without authentication")?;
        let abs_dir = resolve_absolute_direction(payload.dir, auth.face);
        let dir = dir4_as_dir(abs_dir);

        if !world.can_traverse(auth.level, auth.x, auth.y, dir) {
            self.cooldown.move_ready_at_ms = now + deps.move_cooldown_ms;
            return Ok(vec![action_result(false, Some(ActionResultReason::Blocked), seq)]);
        }

        let (dx, dy) = dir.delta();
        auth.x += dx;
        auth.y += dy;
        if payload.dir != MoveDir::F && payload.dir != MoveDir::B {
            auth.face = abs_dir;
        }
        self.cooldown.move_ready_at_ms = now + deps.move_cooldown_ms;

        deps.discovery.mark_discovered(auth.level, auth.x, auth.y, now);
        deps.characters
            .save_position(&auth.character_id, &auth.world_id, auth.level, auth.x, auth.y, auth.face)
            .map_err(|e| e.to_string())?;

        let mut out = vec![action_result(true, None, seq)];
        if let Some(state) = self.build_world_state(deps, world) {
            out.push(state);
        }
        Ok(out)
    }
}

/// Translate a move payload to an absolute cardinal using current facing.
/// `F` keeps facing, `B` is its opposite; cardinals set facing directly.
fn resolve_absolute_direction(dir: MoveDir, facing: Dir4) -> Dir4 {
    match dir {
        MoveDir::N => Dir4::N,
        MoveDir::E => Dir4::E,
        MoveDir::S => Dir4::S,
        MoveDir::W => Dir4::W,
        MoveDir::F => facing,
        MoveDir::B => opposite_dir4(facing),
    }
}

fn opposite_dir4(d: Dir4) -> Dir4 {
    match d {
        Dir4::N => Dir4::S,
        Dir4::E => Dir4::W,
        Dir4::S => Dir4::N,
        Dir4::W => Dir4::E,
    }
}

fn action_result(ok: bool, reason: Option<ActionResultReason>, seq: i64) -> ServerMessage {
    ServerMessage::ActionResult(ActionResult {
        ok,
        reason,
        seq: Some(seq),
    })
}

fn not_implemented(seq: i64) -> ServerMessage {
    action_result(false, Some(ActionResultReason::NotImplemented), seq)
}

fn bad_schema(detail: String) -> ServerMessage {
    ServerMessage::Error(ErrorMessage {
        code: "bad_schema".to_string(),
        message: detail,
        seq: None,
    })
}
