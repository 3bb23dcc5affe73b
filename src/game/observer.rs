//! Observer world
//!
//! Mirrors of everything the authority replicates, fed only by delivered
//! packets. There is no way to change a mirrored value other than `apply`.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::game::actor::{ControllerId, EntityId};
use crate::game::match_coordinator::{MatchPhase, MatchView};
use crate::game::session::SessionEvent;
use crate::game::weapon::WeaponView;
use crate::replication::packet::{ReplicationPacket, SpawnRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStats {
    pub packets: u64,
    pub applied_updates: u64,
    /// Updates for entities this observer does not know (already despawned)
    pub orphan_updates: u64,
}

pub struct ObserverWorld {
    local_controller: Option<ControllerId>,
    match_view: Option<MatchView>,
    weapons: BTreeMap<EntityId, WeaponView>,
    stats: ObserverStats,
}

impl ObserverWorld {
    /// `local_controller` is the controller this machine plays as, if any
    pub fn new(local_controller: Option<ControllerId>) -> Self {
        Self {
            local_controller,
            match_view: None,
            weapons: BTreeMap::new(),
            stats: ObserverStats::default(),
        }
    }

    /// Apply a delivered packet: spawns, then attribute updates, then despawns
    pub fn apply(&mut self, packet: &ReplicationPacket) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        self.stats.packets += 1;

        for record in &packet.spawns {
            self.spawn(record, &mut events);
        }

        for update in &packet.updates {
            if let Some(view) = self.weapons.get_mut(&update.entity) {
                let weapon = update.entity;
                events.extend(
                    view.apply(update)
                        .into_iter()
                        .map(|effect| SessionEvent::Weapon { weapon, effect }),
                );
            } else if let Some(view) = self
                .match_view
                .as_mut()
                .filter(|v| v.entity() == update.entity)
            {
                events.extend(view.apply(update).map(SessionEvent::Match));
            } else {
                self.stats.orphan_updates += 1;
                debug!(entity = update.entity, "Update for unknown entity");
                continue;
            }
            self.stats.applied_updates += 1;
        }

        for entity in &packet.despawns {
            if self.weapons.remove(entity).is_some() {
                trace!(entity, "Weapon view removed");
            } else if self.match_view.as_ref().is_some_and(|v| v.entity() == *entity) {
                self.match_view = None;
            }
        }

        events
    }

    fn spawn(&mut self, record: &SpawnRecord, events: &mut Vec<SessionEvent>) {
        match record {
            SpawnRecord::Weapon(snapshot) => {
                if self.weapons.contains_key(&snapshot.entity) {
                    debug!(entity = snapshot.entity, "Duplicate weapon spawn ignored");
                    return;
                }
                let (view, effects) = WeaponView::from_snapshot(snapshot, self.local_controller);
                let weapon = snapshot.entity;
                events.extend(
                    effects
                        .into_iter()
                        .map(|effect| SessionEvent::Weapon { weapon, effect }),
                );
                self.weapons.insert(weapon, view);
            }
            SpawnRecord::Match(snapshot) => {
                if self
                    .match_view
                    .as_ref()
                    .is_some_and(|v| v.entity() == snapshot.entity)
                {
                    return;
                }
                self.match_view = Some(MatchView::from_snapshot(snapshot));
            }
        }
    }

    pub fn local_controller(&self) -> Option<ControllerId> {
        self.local_controller
    }

    pub fn match_view(&self) -> Option<&MatchView> {
        self.match_view.as_ref()
    }

    pub fn phase(&self) -> Option<MatchPhase> {
        self.match_view.as_ref().map(MatchView::phase)
    }

    pub fn countdown_time(&self, now: f32) -> Option<f32> {
        self.match_view.as_ref().map(|v| v.countdown_time(now))
    }

    pub fn weapon(&self, id: EntityId) -> Option<&WeaponView> {
        self.weapons.get(&id)
    }

    pub fn weapons(&self) -> impl Iterator<Item = &WeaponView> {
        self.weapons.values()
    }

    pub fn weapon_count(&self) -> usize {
        self.weapons.len()
    }

    /// Stale deliveries discarded across all weapon views
    pub fn stale_discarded(&self) -> u64 {
        self.weapons.values().map(WeaponView::stale_discarded).sum()
    }

    pub fn stats(&self) -> ObserverStats {
        self.stats
    }
}
