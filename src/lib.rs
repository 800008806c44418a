//! Server-authoritative gameplay kernel for a grid-based multi-user dungeon
//! crawler.
//!
//! ## Architecture
//!
//! ```text
//! gateway (WebSocket)          [server feature]
//!   └── session (state machine, action dispatch)
//!         ├── world (edge oracle)
//!         │     ├── chunkgen (deterministic generator, pure)
//!         │     └── overlay (sparse overrides + frontier expansion)
//!         ├── discovery (minimap memory)
//!         ├── snapshot (observable view + digest)
//!         └── storage (session/character/world record interfaces)
//! ```
//!
//! `rng` and `digest` are pure, dependency-free building blocks the rest of
//! the crate is built on. Everything below `gateway` is usable as a library
//! with no async runtime; `gateway`, `config`, and the server binary are
//! gated behind the `server` feature.

pub mod chunkgen;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod overlay;
pub mod protocol;
pub mod rng;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod time;
pub mod world;

#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod gateway;

pub use chunkgen::GeneratorVersion;
pub use error::{Result, WorldError};
pub use world::WorldModel;
