//! Authority world: actors, weapons and the match coordinator
//!
//! One `MatchSession` runs per level. Player commands arrive through the
//! command buffer and are applied at the start of each tick; everything the
//! tick changed is gathered by `collect_packet` for the replication link.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::game::actor::{ActorId, ActorRegistry, ControllerId, EntityId};
use crate::game::command_buffer::{CommandBuffer, CommandMessage, CommandSender, PlayerCommand};
use crate::game::constants::{match_timing, spawn, weapon};
use crate::game::match_coordinator::{MatchCoordinator, MatchEvent, MatchPhase, MatchTimings};
use crate::game::spawn::{ring_points, SpawnSelector};
use crate::game::weapon::{WeaponAuthority, WeaponConfig, WeaponEffect, WeaponEffects, WeaponState, WeaponType};
use crate::replication::packet::{ReplicationPacket, SpawnRecord};
use crate::util::vec3::Vec3;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub timings: MatchTimings,
    pub respawn_delay: f32,
    /// Weapons laid out when the level starts
    pub weapon_count: usize,
    pub pickup_radius: f32,
    pub command_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timings: MatchTimings::default(),
            respawn_delay: match_timing::RESPAWN_DELAY,
            weapon_count: WeaponType::ALL.len(),
            pickup_radius: weapon::PICKUP_RADIUS,
            command_buffer_size: crate::game::constants::net::COMMAND_BUFFER_SIZE,
        }
    }
}

/// Everything a tick produced for the outer layers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Match(MatchEvent),
    Weapon { weapon: EntityId, effect: WeaponEffect },
}

pub struct MatchSession {
    config: SessionConfig,
    tick: u64,
    registry: ActorRegistry,
    coordinator: MatchCoordinator,
    weapons: BTreeMap<EntityId, WeaponAuthority>,
    held: HashMap<ControllerId, EntityId>,
    commands: CommandBuffer,
    selector: Box<dyn SpawnSelector>,
    spawns: Vec<SpawnRecord>,
    despawns: Vec<EntityId>,
    rejected_commands: u64,
}

impl MatchSession {
    /// Start a level at `now`; the match entity and the initial weapon
    /// layout are queued as spawns for the first packet.
    pub fn new(config: SessionConfig, now: f32, selector: Box<dyn SpawnSelector>) -> Self {
        let mut registry = ActorRegistry::new();
        let match_entity = registry.next_entity_id();
        let coordinator =
            MatchCoordinator::new(match_entity, config.timings, config.respawn_delay, now);
        let commands = CommandBuffer::new(config.command_buffer_size);

        let mut session = Self {
            config,
            tick: 0,
            registry,
            spawns: vec![SpawnRecord::Match(coordinator.snapshot())],
            coordinator,
            weapons: BTreeMap::new(),
            held: HashMap::new(),
            commands,
            selector,
            despawns: Vec::new(),
            rejected_commands: 0,
        };

        let layout = ring_points(session.config.weapon_count, spawn::WEAPON_RING_RADIUS, 0.0);
        for (i, position) in layout.into_iter().enumerate() {
            let weapon_type = WeaponType::ALL[i % WeaponType::ALL.len()];
            session.spawn_weapon(WeaponConfig::for_type(weapon_type), position);
        }

        info!(
            level_start = now,
            weapons = session.weapons.len(),
            "Match session started"
        );
        session
    }

    pub fn add_player(&mut self, name: String, is_bot: bool) -> ControllerId {
        let controller = self.registry.add_controller(name.clone(), is_bot);
        let position = self
            .selector
            .select(&self.registry.live_positions())
            .unwrap_or(Vec3::ZERO);
        self.registry.spawn_character(controller, position);
        info!(%controller, %name, is_bot, "Player joined");
        controller
    }

    pub fn remove_player(&mut self, controller: ControllerId) -> Vec<SessionEvent> {
        let events = self.drop_weapon(controller);
        if let Some(pawn) = self.registry.pawn_of(controller) {
            self.end_overlaps(pawn);
        }
        if self.registry.remove_controller(controller).is_some() {
            info!(%controller, "Player left");
        }
        events
    }

    pub fn spawn_weapon(&mut self, config: WeaponConfig, position: Vec3) -> EntityId {
        let id = self.registry.next_entity_id();
        let weapon = WeaponAuthority::spawn(id, config, position, None);
        self.spawns.push(SpawnRecord::Weapon(weapon.snapshot()));
        self.weapons.insert(id, weapon);
        debug!(weapon = id, weapon_type = ?config.weapon_type, "Weapon spawned");
        id
    }

    pub fn despawn_weapon(&mut self, id: EntityId) -> bool {
        let Some(weapon) = self.weapons.remove(&id) else {
            return false;
        };
        if let Some(controller) = weapon.owner_controller() {
            self.held.remove(&controller);
        }
        self.despawns.push(id);
        debug!(weapon = id, "Weapon despawned");
        true
    }

    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    pub fn submit(&self, controller: ControllerId, command: PlayerCommand) -> bool {
        self.commands.try_submit(controller, command)
    }

    /// Overlap ingestion from an external physics layer
    pub fn on_sphere_overlap(&mut self, weapon: EntityId, character: ActorId) {
        if let Some(weapon) = self.weapons.get_mut(&weapon) {
            weapon.on_sphere_overlap(character);
        }
    }

    pub fn on_sphere_end_overlap(&mut self, weapon: EntityId, character: ActorId) {
        if let Some(weapon) = self.weapons.get_mut(&weapon) {
            weapon.on_sphere_end_overlap(character);
        }
    }

    /// Elimination reported by the damage layer. The victim's weapon is
    /// dropped where they stood.
    pub fn report_elimination(
        &mut self,
        victim: ActorId,
        attacker: Option<ControllerId>,
        now: f32,
    ) -> Vec<SessionEvent> {
        let Some(victim_controller) = self.registry.controller_of(victim) else {
            debug!(%victim, "Elimination for unknown or unpossessed character");
            return Vec::new();
        };
        if !self.registry.mark_eliminated(victim) {
            return Vec::new();
        }

        let mut events = self.drop_weapon(victim_controller);
        self.end_overlaps(victim);
        events.extend(
            self.coordinator
                .player_eliminated(victim, victim_controller, attacker, now)
                .into_iter()
                .map(SessionEvent::Match),
        );
        events
    }

    /// Replace `character` for `controller`; repeated calls are no-ops
    pub fn request_respawn(
        &mut self,
        character: ActorId,
        controller: ControllerId,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if self.registry.pawn_of(controller) == Some(character) {
            events.extend(self.drop_weapon(controller));
            self.end_overlaps(character);
        }
        if let Some(event) = self.coordinator.request_respawn(
            character,
            controller,
            &mut self.registry,
            self.selector.as_mut(),
        ) {
            events.push(SessionEvent::Match(event));
        }
        events
    }

    /// Run one authority tick
    pub fn tick(&mut self, now: f32) -> Vec<SessionEvent> {
        let mut events = Vec::new();

        for message in self.commands.drain() {
            events.extend(self.apply_command(message, now));
        }

        if self.coordinator.phase() != MatchPhase::Cooldown {
            for (&id, weapon) in self.weapons.iter_mut() {
                if weapon.state() == WeaponState::Equipped {
                    push_weapon_effects(&mut events, id, weapon.hold_trigger(now));
                }
            }
        }

        self.update_overlaps();
        for (&id, weapon) in self.weapons.iter_mut() {
            push_weapon_effects(&mut events, id, weapon.flush_pickup_prompts());
        }

        let match_events = self.coordinator.tick(now);
        for event in match_events {
            events.push(SessionEvent::Match(event));
            match event {
                MatchEvent::RespawnDue {
                    character,
                    controller,
                } => events.extend(self.request_respawn(character, controller)),
                MatchEvent::PhaseChanged {
                    to: MatchPhase::Cooldown,
                    ..
                } => self.release_all_triggers(),
                _ => {}
            }
        }

        self.tick += 1;
        events
    }

    /// Gather spawns, despawns and changed attributes since the last call
    pub fn collect_packet(&mut self) -> ReplicationPacket {
        let mut packet = ReplicationPacket::new(self.tick);
        packet.spawns = std::mem::take(&mut self.spawns);
        packet.despawns = std::mem::take(&mut self.despawns);
        self.coordinator.collect_updates(&mut packet.updates);
        for weapon in self.weapons.values_mut() {
            weapon.collect_updates(&mut packet.updates);
        }
        packet
    }

    /// Spawn records describing the current world (late-joining observers)
    pub fn full_snapshot(&self) -> Vec<SpawnRecord> {
        std::iter::once(SpawnRecord::Match(self.coordinator.snapshot()))
            .chain(
                self.weapons
                    .values()
                    .map(|w| SpawnRecord::Weapon(w.snapshot())),
            )
            .collect()
    }

    fn apply_command(&mut self, message: CommandMessage, now: f32) -> Vec<SessionEvent> {
        let CommandMessage {
            controller,
            command,
        } = message;
        let mut events = Vec::new();

        let Some(pawn) = self.live_pawn(controller) else {
            self.reject(controller, &command, "no live character");
            return events;
        };

        match command {
            PlayerCommand::Move { position } => {
                self.registry.move_character(pawn, position);
                if let Some(weapon) = self.held_weapon_mut(controller) {
                    weapon.set_position(position);
                }
            }
            PlayerCommand::Equip { weapon: id } => {
                if self.held.contains_key(&controller) {
                    self.reject(controller, &command, "already holding a weapon");
                    return events;
                }
                let Some(weapon) = self.weapons.get_mut(&id) else {
                    self.reject(controller, &command, "unknown weapon");
                    return events;
                };
                if weapon.state() == WeaponState::Equipped || !weapon.is_overlapping(pawn) {
                    self.reject(controller, &command, "weapon not available");
                    return events;
                }
                push_weapon_effects(&mut events, id, weapon.equip(pawn, controller));
                self.held.insert(controller, id);
                debug!(%controller, weapon = id, "Weapon equipped");
            }
            PlayerCommand::TriggerPressed { target } => {
                if self.coordinator.phase() == MatchPhase::Cooldown {
                    self.reject(controller, &command, "input locked during cooldown");
                    return events;
                }
                if let Some(&id) = self.held.get(&controller) {
                    if let Some(weapon) = self.weapons.get_mut(&id) {
                        push_weapon_effects(&mut events, id, weapon.press_trigger(now, target));
                    }
                }
            }
            PlayerCommand::TriggerReleased => {
                if let Some(weapon) = self.held_weapon_mut(controller) {
                    weapon.release_trigger();
                }
            }
            PlayerCommand::Reload { amount } => {
                if let Some(&id) = self.held.get(&controller) {
                    if let Some(weapon) = self.weapons.get_mut(&id) {
                        push_weapon_effects(&mut events, id, weapon.add_ammo(amount));
                    }
                }
            }
            PlayerCommand::Drop => {
                events.extend(self.drop_weapon(controller));
            }
        }
        events
    }

    /// Input lock: held triggers do not carry over into cooldown
    fn release_all_triggers(&mut self) {
        for weapon in self.weapons.values_mut() {
            weapon.release_trigger();
        }
    }

    fn reject(&mut self, controller: ControllerId, command: &PlayerCommand, reason: &str) {
        self.rejected_commands += 1;
        debug!(%controller, ?command, reason, "Command rejected");
    }

    fn live_pawn(&self, controller: ControllerId) -> Option<ActorId> {
        let pawn = self.registry.pawn_of(controller)?;
        let character = self.registry.character(pawn)?;
        (!character.eliminated).then_some(pawn)
    }

    fn held_weapon_mut(&mut self, controller: ControllerId) -> Option<&mut WeaponAuthority> {
        let id = self.held.get(&controller)?;
        self.weapons.get_mut(id)
    }

    fn drop_weapon(&mut self, controller: ControllerId) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let Some(id) = self.held.remove(&controller) else {
            return events;
        };
        let position = self
            .registry
            .pawn_of(controller)
            .and_then(|pawn| self.registry.character(pawn))
            .map(|c| c.position);
        match self.weapons.get_mut(&id) {
            Some(weapon) => {
                if let Some(position) = position {
                    weapon.set_position(position);
                }
                push_weapon_effects(&mut events, id, weapon.dropped());
                debug!(%controller, weapon = id, "Weapon dropped");
            }
            None => warn!(%controller, weapon = id, "Held weapon missing from world"),
        }
        events
    }

    /// Derive sphere overlaps from character positions
    fn update_overlaps(&mut self) {
        let radius_sq = self.config.pickup_radius * self.config.pickup_radius;
        for weapon in self.weapons.values_mut() {
            if weapon.state() == WeaponState::Equipped {
                continue;
            }
            for character in self.registry.characters() {
                let inside =
                    !character.eliminated && character.position.distance_sq_to(weapon.position()) <= radius_sq;
                match (inside, weapon.is_overlapping(character.id)) {
                    (true, false) => weapon.on_sphere_overlap(character.id),
                    (false, true) => weapon.on_sphere_end_overlap(character.id),
                    _ => {}
                }
            }
        }
    }

    fn end_overlaps(&mut self, character: ActorId) {
        for weapon in self.weapons.values_mut() {
            if weapon.is_overlapping(character) {
                weapon.on_sphere_end_overlap(character);
            }
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &MatchCoordinator {
        &self.coordinator
    }

    pub fn weapon(&self, id: EntityId) -> Option<&WeaponAuthority> {
        self.weapons.get(&id)
    }

    pub fn weapons(&self) -> impl Iterator<Item = &WeaponAuthority> {
        self.weapons.values()
    }

    pub fn held_weapon(&self, controller: ControllerId) -> Option<EntityId> {
        self.held.get(&controller).copied()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.pending_count()
    }

    pub fn rejected_commands(&self) -> u64 {
        self.rejected_commands
    }

    pub fn travel_requested(&self) -> bool {
        self.coordinator.travel_requested()
    }
}

fn push_weapon_effects(events: &mut Vec<SessionEvent>, weapon: EntityId, effects: WeaponEffects) {
    events.extend(
        effects
            .into_iter()
            .map(|effect| SessionEvent::Weapon { weapon, effect }),
    );
}
