//! Replication packet definitions
//!
//! What the authority sends to observers each tick: reliable spawn and despawn
//! records plus the latest value of every attribute that changed.

use serde::{Deserialize, Serialize};

use crate::game::actor::{ActorId, ControllerId, EntityId};
use crate::game::match_coordinator::{MatchPhase, MatchTimings};
use crate::game::weapon::{WeaponConfig, WeaponState};
use crate::replication::attribute::Version;
use crate::util::vec3::Vec3;

/// Which attribute of an entity a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKind {
    WeaponState,
    Ammo,
    OwnerCharacter,
    OwnerController,
    MatchPhase,
    LevelStartTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    WeaponState(WeaponState),
    Ammo(u32),
    OwnerCharacter(Option<ActorId>),
    OwnerController(Option<ControllerId>),
    MatchPhase(MatchPhase),
    LevelStartTime(f32),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::WeaponState(_) => FieldKind::WeaponState,
            FieldValue::Ammo(_) => FieldKind::Ammo,
            FieldValue::OwnerCharacter(_) => FieldKind::OwnerCharacter,
            FieldValue::OwnerController(_) => FieldKind::OwnerController,
            FieldValue::MatchPhase(_) => FieldKind::MatchPhase,
            FieldValue::LevelStartTime(_) => FieldKind::LevelStartTime,
        }
    }
}

/// Identity of one replicated attribute; ordering is per key only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldKey {
    pub entity: EntityId,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub entity: EntityId,
    pub version: Version,
    pub value: FieldValue,
}

impl FieldUpdate {
    pub fn new(entity: EntityId, version: Version, value: FieldValue) -> Self {
        Self {
            entity,
            version,
            value,
        }
    }

    pub fn key(&self) -> FieldKey {
        FieldKey {
            entity: self.entity,
            kind: self.value.kind(),
        }
    }
}

/// Full weapon state for observers that have not seen the weapon yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponSnapshot {
    pub entity: EntityId,
    pub config: WeaponConfig,
    pub position: Vec3,
    pub state: (Version, WeaponState),
    pub ammo: (Version, u32),
    pub owner_character: (Version, Option<ActorId>),
    pub owner_controller: (Version, Option<ControllerId>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub entity: EntityId,
    pub timings: MatchTimings,
    pub phase: (Version, MatchPhase),
    pub level_start_time: (Version, f32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpawnRecord {
    Weapon(WeaponSnapshot),
    Match(MatchSnapshot),
}

impl SpawnRecord {
    pub fn entity(&self) -> EntityId {
        match self {
            SpawnRecord::Weapon(snapshot) => snapshot.entity,
            SpawnRecord::Match(snapshot) => snapshot.entity,
        }
    }
}

/// Everything collected on the authority in one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicationPacket {
    pub tick: u64,
    pub spawns: Vec<SpawnRecord>,
    pub despawns: Vec<EntityId>,
    pub updates: Vec<FieldUpdate>,
}

impl ReplicationPacket {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spawns.is_empty() && self.despawns.is_empty() && self.updates.is_empty()
    }

    /// Encode using bincode (legacy config, fixed-size integers)
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::legacy())
            .map_err(|e| EncodeError(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        bincode::serde::decode_from_slice(data, bincode::config::legacy())
            .map(|(packet, _)| packet)
            .map_err(|e| DecodeError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_update_key() {
        let update = FieldUpdate::new(9, 3, FieldValue::Ammo(12));
        assert_eq!(
            update.key(),
            FieldKey {
                entity: 9,
                kind: FieldKind::Ammo
            }
        );
    }

    #[test]
    fn test_packet_codec() {
        let controller = Uuid::new_v4();
        let mut packet = ReplicationPacket::new(42);
        packet.spawns.push(SpawnRecord::Weapon(WeaponSnapshot {
            entity: 5,
            config: WeaponConfig::default(),
            position: Vec3::new(1.0, 2.0, 3.0),
            state: (0, WeaponState::Initial),
            ammo: (0, 30),
            owner_character: (0, None),
            owner_controller: (0, None),
        }));
        packet.updates.push(FieldUpdate::new(5, 1, FieldValue::WeaponState(WeaponState::Equipped)));
        packet.updates.push(FieldUpdate::new(5, 1, FieldValue::OwnerController(Some(controller))));
        packet.despawns.push(2);

        let encoded = packet.encode().unwrap();
        let decoded = ReplicationPacket::decode(&encoded).unwrap();

        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(ReplicationPacket::decode(&[0xff, 0x01]).is_err());
    }

    #[test]
    fn test_empty_packet() {
        assert!(ReplicationPacket::new(1).is_empty());
    }
}
