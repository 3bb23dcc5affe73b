//! Blaster Sync Server Library
//!
//! Authoritative replicated state for a multiplayer shooter: weapons with
//! ammo and lifecycle state, ownership-driven HUD binding, and the match
//! phase machine with eliminations and respawns.
//!
//! The authority changes state through `WeaponAuthority` and
//! `MatchCoordinator`; observers hold `WeaponView` and `MatchView` mirrors
//! that change only when replicated packets are applied.

pub mod config;
pub mod game;
pub mod metrics;
pub mod replication;
pub mod util;
