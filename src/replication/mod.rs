//! Replication plumbing between the authority and observers

pub mod attribute;
pub mod link;
pub mod packet;

pub use attribute::{MirroredAttribute, ReplicatedAttribute, Version};
pub use link::{LinkConditions, LinkStats, SimulatedLink};
pub use packet::{
    DecodeError, EncodeError, FieldKey, FieldKind, FieldUpdate, FieldValue, MatchSnapshot,
    ReplicationPacket, SpawnRecord, WeaponSnapshot,
};
