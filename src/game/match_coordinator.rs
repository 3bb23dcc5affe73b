//! Match phase state machine, elimination bookkeeping and respawns
//!
//! `MatchCoordinator` exists only on the authority. Phase transitions are
//! derived every tick from `now - level_start_time`; the countdown is never
//! stored, it is recomputed from the same inputs so a missed tick cannot make
//! it drift. Observers hold a `MatchView` with the replicated phase and level
//! start time and derive the same countdown locally.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::game::actor::{ActorId, ActorRegistry, ControllerId, EntityId};
use crate::game::constants::match_timing;
use crate::game::spawn::SpawnSelector;
use crate::replication::attribute::{MirroredAttribute, ReplicatedAttribute};
use crate::replication::packet::{FieldUpdate, FieldValue, MatchSnapshot};
use crate::util::vec3::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Warm-up before the match starts
    #[default]
    WaitingToStart,
    InProgress,
    /// Post-match results, then travel
    Cooldown,
}

impl MatchPhase {
    pub fn next(self) -> Option<MatchPhase> {
        match self {
            MatchPhase::WaitingToStart => Some(MatchPhase::InProgress),
            MatchPhase::InProgress => Some(MatchPhase::Cooldown),
            MatchPhase::Cooldown => None,
        }
    }
}

/// Phase durations in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchTimings {
    pub warm_up: f32,
    pub match_duration: f32,
    pub cooldown: f32,
}

impl Default for MatchTimings {
    fn default() -> Self {
        Self {
            warm_up: match_timing::WARM_UP,
            match_duration: match_timing::MATCH,
            cooldown: match_timing::COOLDOWN,
        }
    }
}

impl MatchTimings {
    /// Time since level start at which `phase` is over
    pub fn phase_end(&self, phase: MatchPhase) -> f32 {
        match phase {
            MatchPhase::WaitingToStart => self.warm_up,
            MatchPhase::InProgress => self.warm_up + self.match_duration,
            MatchPhase::Cooldown => self.warm_up + self.match_duration + self.cooldown,
        }
    }
}

/// Seconds left in `phase`, floored at zero
pub fn countdown_time(
    timings: &MatchTimings,
    phase: MatchPhase,
    level_start_time: f32,
    now: f32,
) -> f32 {
    (level_start_time + timings.phase_end(phase) - now).max(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub kills: u32,
    pub defeats: u32,
}

/// Hooks for the outer layers (announcements, input locks, scoreboard)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchEvent {
    PhaseChanged {
        from: MatchPhase,
        to: MatchPhase,
    },
    Eliminated {
        victim: ActorId,
        victim_controller: ControllerId,
        attacker_controller: Option<ControllerId>,
    },
    ScoreChanged {
        controller: ControllerId,
        score: Score,
    },
    RespawnDue {
        character: ActorId,
        controller: ControllerId,
    },
    Respawned {
        controller: ControllerId,
        replaced: ActorId,
        character: ActorId,
        position: Vec3,
    },
    /// Cooldown is over; restart or travel to the next level
    TravelRequested,
}

#[derive(Debug, Clone, Copy)]
struct PendingRespawn {
    character: ActorId,
    controller: ControllerId,
    due_at: f32,
}

pub struct MatchCoordinator {
    entity: EntityId,
    timings: MatchTimings,
    respawn_delay: f32,
    phase: ReplicatedAttribute<MatchPhase>,
    level_start_time: ReplicatedAttribute<f32>,
    scores: HashMap<ControllerId, Score>,
    eliminated: HashSet<ActorId>,
    pending_respawns: Vec<PendingRespawn>,
    travel_requested: bool,
}

impl MatchCoordinator {
    /// Created when the level becomes active; `level_start_time` is captured
    /// once here.
    pub fn new(
        entity: EntityId,
        timings: MatchTimings,
        respawn_delay: f32,
        level_start_time: f32,
    ) -> Self {
        Self {
            entity,
            timings,
            respawn_delay,
            phase: ReplicatedAttribute::new(MatchPhase::WaitingToStart),
            level_start_time: ReplicatedAttribute::new(level_start_time),
            scores: HashMap::new(),
            eliminated: HashSet::new(),
            pending_respawns: Vec::new(),
            travel_requested: false,
        }
    }

    /// Advance phases and release due respawns. Each phase hook fires once,
    /// even when several thresholds were crossed since the last tick.
    pub fn tick(&mut self, now: f32) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        let elapsed = now - *self.level_start_time.get();

        loop {
            let phase = *self.phase.get();
            if elapsed < self.timings.phase_end(phase) {
                break;
            }
            match phase.next() {
                Some(next) => {
                    self.phase.set(next);
                    info!(?phase, ?next, elapsed, "Match phase changed");
                    events.push(MatchEvent::PhaseChanged {
                        from: phase,
                        to: next,
                    });
                }
                None => {
                    if !self.travel_requested {
                        self.travel_requested = true;
                        info!("Cooldown finished, requesting travel");
                        events.push(MatchEvent::TravelRequested);
                    }
                    break;
                }
            }
        }

        let (due, waiting): (Vec<_>, Vec<_>) = self
            .pending_respawns
            .drain(..)
            .partition(|p| p.due_at <= now);
        self.pending_respawns = waiting;
        events.extend(due.into_iter().map(|p| MatchEvent::RespawnDue {
            character: p.character,
            controller: p.controller,
        }));

        events
    }

    /// Record an elimination, update both scores and schedule the respawn.
    /// A repeated report for the same victim is ignored.
    pub fn player_eliminated(
        &mut self,
        victim: ActorId,
        victim_controller: ControllerId,
        attacker_controller: Option<ControllerId>,
        now: f32,
    ) -> Vec<MatchEvent> {
        if !self.eliminated.insert(victim) {
            debug!(%victim, "Duplicate elimination ignored");
            return Vec::new();
        }
        info!(%victim, %victim_controller, ?attacker_controller, "Player eliminated");

        let mut events = vec![MatchEvent::Eliminated {
            victim,
            victim_controller,
            attacker_controller,
        }];

        if let Some(attacker) = attacker_controller.filter(|a| *a != victim_controller) {
            let score = self.scores.entry(attacker).or_default();
            score.kills += 1;
            events.push(MatchEvent::ScoreChanged {
                controller: attacker,
                score: *score,
            });
        }

        let score = self.scores.entry(victim_controller).or_default();
        score.defeats += 1;
        events.push(MatchEvent::ScoreChanged {
            controller: victim_controller,
            score: *score,
        });

        self.pending_respawns.push(PendingRespawn {
            character: victim,
            controller: victim_controller,
            due_at: now + self.respawn_delay,
        });

        events
    }

    /// Replace `character` with a fresh one for `controller`. No-op unless
    /// `character` is still the controller's pawn, which makes repeated or
    /// racing requests harmless.
    pub fn request_respawn(
        &mut self,
        character: ActorId,
        controller: ControllerId,
        registry: &mut ActorRegistry,
        selector: &mut dyn SpawnSelector,
    ) -> Option<MatchEvent> {
        self.pending_respawns.retain(|p| p.character != character);

        if registry.pawn_of(controller) != Some(character) {
            if registry.character(character).is_none() {
                self.eliminated.remove(&character);
            }
            debug!(%character, %controller, "Respawn request without a pawn to replace");
            return None;
        }

        registry.destroy_character(character);
        self.eliminated.remove(&character);
        let position = selector
            .select(&registry.live_positions())
            .unwrap_or(Vec3::ZERO);
        let replacement = registry.spawn_character(controller, position)?;

        info!(%controller, old = %character, new = %replacement, "Respawned");
        Some(MatchEvent::Respawned {
            controller,
            replaced: character,
            character: replacement,
            position,
        })
    }

    pub fn countdown_time(&self, now: f32) -> f32 {
        countdown_time(
            &self.timings,
            self.phase(),
            *self.level_start_time.get(),
            now,
        )
    }

    pub fn collect_updates(&mut self, out: &mut Vec<FieldUpdate>) {
        if let Some((version, phase)) = self.phase.take_dirty() {
            out.push(FieldUpdate::new(self.entity, version, FieldValue::MatchPhase(phase)));
        }
        if let Some((version, start)) = self.level_start_time.take_dirty() {
            out.push(FieldUpdate::new(
                self.entity,
                version,
                FieldValue::LevelStartTime(start),
            ));
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            entity: self.entity,
            timings: self.timings,
            phase: self.phase.snapshot(),
            level_start_time: self.level_start_time.snapshot(),
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn phase(&self) -> MatchPhase {
        *self.phase.get()
    }

    pub fn level_start_time(&self) -> f32 {
        *self.level_start_time.get()
    }

    pub fn timings(&self) -> &MatchTimings {
        &self.timings
    }

    pub fn score(&self, controller: ControllerId) -> Score {
        self.scores.get(&controller).copied().unwrap_or_default()
    }

    pub fn pending_respawn_count(&self) -> usize {
        self.pending_respawns.len()
    }

    pub fn travel_requested(&self) -> bool {
        self.travel_requested
    }
}

/// Observer copy of the match entity
#[derive(Debug, Clone)]
pub struct MatchView {
    entity: EntityId,
    timings: MatchTimings,
    phase: MirroredAttribute<MatchPhase>,
    level_start_time: MirroredAttribute<f32>,
}

impl MatchView {
    pub fn from_snapshot(snapshot: &MatchSnapshot) -> Self {
        Self {
            entity: snapshot.entity,
            timings: snapshot.timings,
            phase: MirroredAttribute::new(snapshot.phase.0, snapshot.phase.1),
            level_start_time: MirroredAttribute::new(
                snapshot.level_start_time.0,
                snapshot.level_start_time.1,
            ),
        }
    }

    /// Apply a delivery; a newly accepted phase yields the phase-change hook
    pub fn apply(&mut self, update: &FieldUpdate) -> Option<MatchEvent> {
        if update.entity != self.entity {
            return None;
        }
        match update.value {
            FieldValue::MatchPhase(phase) => {
                let from = *self.phase.get();
                self.phase
                    .receive(update.version, phase)
                    .map(|&to| MatchEvent::PhaseChanged { from, to })
            }
            FieldValue::LevelStartTime(start) => {
                self.level_start_time.receive(update.version, start);
                None
            }
            _ => None,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn phase(&self) -> MatchPhase {
        *self.phase.get()
    }

    pub fn level_start_time(&self) -> f32 {
        *self.level_start_time.get()
    }

    pub fn countdown_time(&self, now: f32) -> f32 {
        countdown_time(&self.timings, self.phase(), self.level_start_time(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::spawn::{default_points, RandomSpawnSelector};

    fn timings() -> MatchTimings {
        MatchTimings {
            warm_up: 10.0,
            match_duration: 60.0,
            cooldown: 5.0,
        }
    }

    fn coordinator(level_start: f32) -> MatchCoordinator {
        MatchCoordinator::new(1, timings(), 3.0, level_start)
    }

    fn phase_changes(events: &[MatchEvent]) -> Vec<(MatchPhase, MatchPhase)> {
        events
            .iter()
            .filter_map(|e| match e {
                MatchEvent::PhaseChanged { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_phase_default() {
        assert_eq!(MatchPhase::default(), MatchPhase::WaitingToStart);
    }

    #[test]
    fn test_no_start_before_warm_up() {
        let mut coordinator = coordinator(2.0);
        for i in 0..100 {
            let now = 2.0 + i as f32 * 0.099;
            assert!(phase_changes(&coordinator.tick(now)).is_empty());
        }
        assert_eq!(coordinator.phase(), MatchPhase::WaitingToStart);
    }

    #[test]
    fn test_start_hook_fires_once() {
        let mut coordinator = coordinator(0.0);
        let mut starts = 0;
        for i in 0..600 {
            let now = i as f32 * 0.1;
            starts += phase_changes(&coordinator.tick(now))
                .iter()
                .filter(|(_, to)| *to == MatchPhase::InProgress)
                .count();
        }
        assert_eq!(starts, 1);
        assert_eq!(coordinator.phase(), MatchPhase::InProgress);
    }

    #[test]
    fn test_full_cycle_and_travel_once() {
        let mut coordinator = coordinator(0.0);
        assert_eq!(
            phase_changes(&coordinator.tick(10.0)),
            vec![(MatchPhase::WaitingToStart, MatchPhase::InProgress)]
        );
        assert_eq!(
            phase_changes(&coordinator.tick(70.0)),
            vec![(MatchPhase::InProgress, MatchPhase::Cooldown)]
        );
        assert!(coordinator.tick(74.0).is_empty());

        let events = coordinator.tick(75.0);
        assert_eq!(events, vec![MatchEvent::TravelRequested]);
        assert!(coordinator.tick(80.0).is_empty());
        assert!(coordinator.travel_requested());
    }

    #[test]
    fn test_missed_ticks_fire_each_hook_once() {
        let mut coordinator = coordinator(0.0);
        let events = coordinator.tick(100.0);
        assert_eq!(
            phase_changes(&events),
            vec![
                (MatchPhase::WaitingToStart, MatchPhase::InProgress),
                (MatchPhase::InProgress, MatchPhase::Cooldown),
            ]
        );
        assert!(events.contains(&MatchEvent::TravelRequested));
    }

    #[test]
    fn test_countdown_is_derived() {
        let coordinator = coordinator(5.0);
        assert_eq!(coordinator.countdown_time(5.0), 10.0);
        assert_eq!(coordinator.countdown_time(12.0), 3.0);
        assert_eq!(coordinator.countdown_time(50.0), 0.0);
    }

    #[test]
    fn test_countdown_per_phase() {
        let t = timings();
        assert_eq!(countdown_time(&t, MatchPhase::InProgress, 0.0, 10.0), 60.0);
        assert_eq!(countdown_time(&t, MatchPhase::Cooldown, 0.0, 70.0), 5.0);
    }

    #[test]
    fn test_elimination_scores() {
        let mut coordinator = coordinator(0.0);
        let victim = uuid::Uuid::new_v4();
        let attacker = uuid::Uuid::new_v4();

        let events = coordinator.player_eliminated(ActorId(1), victim, Some(attacker), 20.0);

        assert_eq!(events.len(), 3);
        assert_eq!(coordinator.score(attacker).kills, 1);
        assert_eq!(coordinator.score(victim).defeats, 1);
        assert_eq!(coordinator.pending_respawn_count(), 1);
    }

    #[test]
    fn test_self_elimination_no_kill() {
        let mut coordinator = coordinator(0.0);
        let victim = uuid::Uuid::new_v4();

        coordinator.player_eliminated(ActorId(1), victim, Some(victim), 20.0);

        assert_eq!(coordinator.score(victim).kills, 0);
        assert_eq!(coordinator.score(victim).defeats, 1);
    }

    #[test]
    fn test_duplicate_elimination_ignored() {
        let mut coordinator = coordinator(0.0);
        let victim = uuid::Uuid::new_v4();
        coordinator.player_eliminated(ActorId(1), victim, None, 20.0);

        assert!(coordinator
            .player_eliminated(ActorId(1), victim, None, 20.5)
            .is_empty());
        assert_eq!(coordinator.score(victim).defeats, 1);
        assert_eq!(coordinator.pending_respawn_count(), 1);
    }

    #[test]
    fn test_respawn_due_after_delay() {
        let mut coordinator = coordinator(0.0);
        let victim = uuid::Uuid::new_v4();
        coordinator.player_eliminated(ActorId(1), victim, None, 20.0);

        assert!(!coordinator
            .tick(22.0)
            .iter()
            .any(|e| matches!(e, MatchEvent::RespawnDue { .. })));
        let events = coordinator.tick(23.0);
        assert!(events.contains(&MatchEvent::RespawnDue {
            character: ActorId(1),
            controller: victim
        }));
        assert_eq!(coordinator.pending_respawn_count(), 0);
    }

    #[test]
    fn test_duplicate_respawn_is_noop() {
        let mut coordinator = coordinator(0.0);
        let mut registry = ActorRegistry::new();
        let mut selector = RandomSpawnSelector::new(default_points(), 3);
        let controller = registry.add_controller("P1".to_string(), false);
        let pawn = registry.spawn_character(controller, Vec3::ZERO).unwrap();

        coordinator.player_eliminated(pawn, controller, None, 20.0);
        let first = coordinator.request_respawn(pawn, controller, &mut registry, &mut selector);
        let second = coordinator.request_respawn(pawn, controller, &mut registry, &mut selector);

        assert!(matches!(first, Some(MatchEvent::Respawned { .. })));
        assert!(second.is_none());
        assert_eq!(registry.character_count(), 1);
        assert_ne!(registry.pawn_of(controller), Some(pawn));
        assert_eq!(coordinator.pending_respawn_count(), 0);
    }

    #[test]
    fn test_respawn_forgets_replaced_character() {
        let mut coordinator = coordinator(0.0);
        let mut registry = ActorRegistry::new();
        let mut selector = RandomSpawnSelector::new(default_points(), 3);
        let controller = registry.add_controller("P1".to_string(), false);

        for round in 0..5 {
            let pawn = registry.pawn_of(controller).unwrap_or_else(|| {
                registry.spawn_character(controller, Vec3::ZERO).unwrap()
            });
            coordinator.player_eliminated(pawn, controller, None, round as f32);
            assert_eq!(coordinator.eliminated.len(), 1);
            coordinator.request_respawn(pawn, controller, &mut registry, &mut selector);
            assert!(coordinator.eliminated.is_empty());
        }
        assert_eq!(coordinator.score(controller).defeats, 5);
    }

    #[test]
    fn test_respawn_without_pawn_is_noop() {
        let mut coordinator = coordinator(0.0);
        let mut registry = ActorRegistry::new();
        let mut selector = RandomSpawnSelector::new(default_points(), 3);
        let controller = registry.add_controller("P1".to_string(), false);

        let result =
            coordinator.request_respawn(ActorId(99), controller, &mut registry, &mut selector);

        assert!(result.is_none());
        assert_eq!(registry.character_count(), 0);
    }

    #[test]
    fn test_view_follows_phase() {
        let mut coordinator = coordinator(0.0);
        let mut view = MatchView::from_snapshot(&coordinator.snapshot());
        coordinator.tick(10.0);

        let mut updates = Vec::new();
        coordinator.collect_updates(&mut updates);
        let events: Vec<_> = updates.iter().filter_map(|u| view.apply(u)).collect();

        assert_eq!(
            events,
            vec![MatchEvent::PhaseChanged {
                from: MatchPhase::WaitingToStart,
                to: MatchPhase::InProgress
            }]
        );
        assert_eq!(view.phase(), MatchPhase::InProgress);
        assert_eq!(view.countdown_time(40.0), coordinator.countdown_time(40.0));
        // re-delivery does not re-fire the hook
        assert!(updates.iter().all(|u| view.apply(u).is_none()));
    }
}
