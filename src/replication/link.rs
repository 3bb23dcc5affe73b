//! In-process stand-in for the replication transport
//!
//! Spawns and despawns are reliable and ordered. Attribute updates behave
//! like unreliable state sync: they are coalesced per field, may be held back
//! for a few ticks and reordered, but every field's newest value is
//! eventually delivered.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::game::actor::EntityId;
use crate::replication::packet::{FieldKey, FieldUpdate, ReplicationPacket, SpawnRecord};

/// Upper bound on how many ticks a single field can be held back
pub const MAX_HOLD_TICKS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConditions {
    /// Chance per tick that a pending update is held back (0.0 - 1.0)
    pub hold_probability: f64,
    /// Shuffle released updates across fields
    pub reorder: bool,
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self {
            hold_probability: 0.0,
            reorder: false,
        }
    }
}

impl LinkConditions {
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn lossy(hold_probability: f64) -> Self {
        Self {
            hold_probability: hold_probability.clamp(0.0, 1.0),
            reorder: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingField {
    update: FieldUpdate,
    holds: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub sent: u64,
    pub delivered: u64,
    pub coalesced: u64,
    pub held: u64,
}

pub struct SimulatedLink {
    conditions: LinkConditions,
    rng: StdRng,
    spawns: Vec<SpawnRecord>,
    despawns: Vec<EntityId>,
    pending: BTreeMap<FieldKey, PendingField>,
    stats: LinkStats,
}

impl SimulatedLink {
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            conditions,
            rng: StdRng::seed_from_u64(seed),
            spawns: Vec::new(),
            despawns: Vec::new(),
            pending: BTreeMap::new(),
            stats: LinkStats::default(),
        }
    }

    /// Queue an outgoing packet
    pub fn send(&mut self, packet: &ReplicationPacket) {
        self.spawns.extend(packet.spawns.iter().cloned());

        for update in &packet.updates {
            self.stats.sent += 1;
            let key = update.key();
            match self.pending.get_mut(&key) {
                Some(existing) => {
                    self.stats.coalesced += 1;
                    if update.version > existing.update.version {
                        existing.update = *update;
                    }
                }
                None => {
                    self.pending.insert(
                        key,
                        PendingField {
                            update: *update,
                            holds: 0,
                        },
                    );
                }
            }
        }

        for &entity in &packet.despawns {
            self.pending.retain(|key, _| key.entity != entity);
            self.despawns.push(entity);
        }
    }

    /// Produce what arrives at the observer this tick
    pub fn deliver(&mut self, tick: u64) -> ReplicationPacket {
        let mut packet = ReplicationPacket::new(tick);
        packet.spawns = std::mem::take(&mut self.spawns);
        packet.despawns = std::mem::take(&mut self.despawns);

        let hold_probability = self.conditions.hold_probability.clamp(0.0, 1.0);
        let mut held = BTreeMap::new();
        for (key, mut field) in std::mem::take(&mut self.pending) {
            let hold = field.holds < MAX_HOLD_TICKS
                && hold_probability > 0.0
                && self.rng.gen_bool(hold_probability);
            if hold {
                field.holds += 1;
                self.stats.held += 1;
                held.insert(key, field);
            } else {
                packet.updates.push(field.update);
            }
        }
        self.pending = held;

        if self.conditions.reorder {
            packet.updates.shuffle(&mut self.rng);
        }
        self.stats.delivered += packet.updates.len() as u64;

        if !packet.is_empty() {
            trace!(
                tick,
                spawns = packet.spawns.len(),
                despawns = packet.despawns.len(),
                updates = packet.updates.len(),
                held = self.pending.len(),
                "Link delivery"
            );
        }
        packet
    }

    /// Deliver everything still queued, ignoring hold-back
    pub fn flush(&mut self, tick: u64) -> ReplicationPacket {
        let mut packet = ReplicationPacket::new(tick);
        packet.spawns = std::mem::take(&mut self.spawns);
        packet.despawns = std::mem::take(&mut self.despawns);
        packet.updates = std::mem::take(&mut self.pending)
            .into_values()
            .map(|field| field.update)
            .collect();
        self.stats.delivered += packet.updates.len() as u64;
        packet
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len() + self.spawns.len() + self.despawns.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn conditions(&self) -> LinkConditions {
        self.conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::packet::FieldValue;

    fn packet_with(updates: Vec<FieldUpdate>) -> ReplicationPacket {
        ReplicationPacket {
            tick: 0,
            updates,
            ..ReplicationPacket::default()
        }
    }

    #[test]
    fn test_perfect_link_delivers_next_tick() {
        let mut link = SimulatedLink::new(LinkConditions::perfect(), 1);
        link.send(&packet_with(vec![FieldUpdate::new(1, 1, FieldValue::Ammo(29))]));

        let packet = link.deliver(1);
        assert_eq!(packet.updates.len(), 1);
        assert!(link.is_idle());
    }

    #[test]
    fn test_coalesces_per_field() {
        let mut link = SimulatedLink::new(LinkConditions::perfect(), 1);
        link.send(&packet_with(vec![FieldUpdate::new(1, 1, FieldValue::Ammo(29))]));
        link.send(&packet_with(vec![FieldUpdate::new(1, 2, FieldValue::Ammo(28))]));

        let packet = link.deliver(1);
        assert_eq!(packet.updates, vec![FieldUpdate::new(1, 2, FieldValue::Ammo(28))]);
        assert_eq!(link.stats().coalesced, 1);
    }

    #[test]
    fn test_coalesce_keeps_newest_version() {
        let mut link = SimulatedLink::new(LinkConditions::perfect(), 1);
        link.send(&packet_with(vec![FieldUpdate::new(1, 5, FieldValue::Ammo(20))]));
        link.send(&packet_with(vec![FieldUpdate::new(1, 3, FieldValue::Ammo(22))]));

        let packet = link.deliver(1);
        assert_eq!(packet.updates[0].version, 5);
    }

    #[test]
    fn test_held_updates_eventually_delivered() {
        let mut link = SimulatedLink::new(LinkConditions::lossy(1.0), 9);
        link.send(&packet_with(vec![FieldUpdate::new(1, 1, FieldValue::Ammo(29))]));

        let mut delivered = 0;
        for tick in 0..=MAX_HOLD_TICKS as u64 {
            delivered += link.deliver(tick).updates.len();
        }
        assert_eq!(delivered, 1);
        assert!(link.is_idle());
    }

    #[test]
    fn test_reliable_records_not_held() {
        let mut link = SimulatedLink::new(LinkConditions::lossy(1.0), 9);
        let mut packet = ReplicationPacket::new(0);
        packet.despawns.push(4);
        link.send(&packet);

        assert_eq!(link.deliver(1).despawns, vec![4]);
    }

    #[test]
    fn test_despawn_drops_pending_updates() {
        let mut link = SimulatedLink::new(LinkConditions::lossy(1.0), 2);
        link.send(&packet_with(vec![FieldUpdate::new(1, 1, FieldValue::Ammo(29))]));
        link.deliver(0);

        let mut packet = ReplicationPacket::new(1);
        packet.despawns.push(1);
        link.send(&packet);

        let flushed = link.flush(2);
        assert!(flushed.updates.is_empty());
        assert_eq!(flushed.despawns, vec![1]);
    }

    #[test]
    fn test_seeded_link_is_deterministic() {
        let updates: Vec<_> = (0..20)
            .map(|i| FieldUpdate::new(i, 1, FieldValue::Ammo(i as u32)))
            .collect();
        let mut a = SimulatedLink::new(LinkConditions::lossy(0.5), 77);
        let mut b = SimulatedLink::new(LinkConditions::lossy(0.5), 77);
        a.send(&packet_with(updates.clone()));
        b.send(&packet_with(updates));

        for tick in 0..4 {
            assert_eq!(a.deliver(tick), b.deliver(tick));
        }
    }
}
