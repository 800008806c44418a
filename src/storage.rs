//! Storage interfaces consumed by the core.
//!
//! The durable row store, identity provider, and session minting are all
//! external collaborators; these traits are the seam the core
//! calls through. In-memory implementations are provided for the binary and
//! for tests — a real deployment supplies its own.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::chunkgen::GeneratorVersion;
use crate::error::{Result, WorldError};
use crate::protocol::Dir4;

#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub user_id: String,
}

pub trait SessionStore: Send + Sync {
    /// Look up a session by its opaque token, honoring expiry. Returns
    /// `None` rather than erroring when the token is absent or stale.
    fn load_session(&self, token: &str) -> Result<Option<LoadedSession>>;
}

#[derive(Debug, Clone)]
pub struct CharacterRecord {
    pub character_id: String,
    pub world_id: String,
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub face: Dir4,
    pub hp: i32,
}

pub trait CharacterStore: Send + Sync {
    fn load_active_character(&self, user_id: &str) -> Result<Option<CharacterRecord>>;

    fn save_position(
        &self,
        character_id: &str,
        world_id: &str,
        level: i32,
        x: i32,
        y: i32,
        face: Dir4,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct WorldRecord {
    pub seed: u32,
    pub generator_version: GeneratorVersion,
}

pub trait WorldRecordStore: Send + Sync {
    fn get_world(&self, world_id: &str) -> Result<WorldRecord>;
}

// ---------------------------------------------------------------------------
// In-memory reference implementations
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, LoadedSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, user_id: impl Into<String>) {
        self.sessions.write().insert(
            token.into(),
            LoadedSession {
                user_id: user_id.into(),
            },
        );
    }
}

impl SessionStore for InMemorySessionStore {
    fn load_session(&self, token: &str) -> Result<Option<LoadedSession>> {
        Ok(self.sessions.read().get(token).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryCharacterStore {
    characters: RwLock<HashMap<String, CharacterRecord>>,
}

impl InMemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_character(&self, user_id: impl Into<String>, record: CharacterRecord) {
        self.characters.write().insert(user_id.into(), record);
    }
}

impl CharacterStore for InMemoryCharacterStore {
    fn load_active_character(&self, user_id: &str) -> Result<Option<CharacterRecord>> {
        Ok(self.characters.read().get(user_id).cloned())
    }

    fn save_position(
        &self,
        character_id: &str,
        world_id: &str,
        level: i32,
        x: i32,
        y: i32,
        face: Dir4,
    ) -> Result<()> {
        let mut characters = self.characters.write();
        let record = characters
            .values_mut()
            .find(|c| c.character_id == character_id && c.world_id == world_id)
            .ok_or_else(|| WorldError::Storage(format!("unknown character {character_id}")))?;
        record.level = level;
        record.x = x;
        record.y = y;
        record.face = face;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryWorldRecordStore {
    worlds: RwLock<HashMap<String, WorldRecord>>,
}

impl InMemoryWorldRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, world_id: impl Into<String>, record: WorldRecord) {
        self.worlds.write().insert(world_id.into(), record);
    }
}

impl WorldRecordStore for InMemoryWorldRecordStore {
    fn get_world(&self, world_id: &str) -> Result<WorldRecord> {
        self.worlds
            .read()
            .get(world_id)
            .cloned()
            .ok_or_else(|| WorldError::WorldNotFound(world_id.to_string()))
    }
}
