//! Authoritative weapon handle
//!
//! Only the authority ever constructs this type, so weapon mutators are not
//! reachable from observer code at all.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::game::actor::{ActorId, ControllerId, EntityId};
use crate::game::weapon::presentation::{WeaponEffect, WeaponEffects, WeaponPresentation};
use crate::game::weapon::state::{WeaponConfig, WeaponState, WeaponType};
use crate::game::weapon::trigger::Trigger;
use crate::replication::attribute::ReplicatedAttribute;
use crate::replication::packet::{FieldUpdate, FieldValue, WeaponSnapshot};
use crate::util::vec3::Vec3;

/// Pickup prompt bookkeeping for characters inside the overlap sphere
///
/// Overlap events are recorded as they arrive and resolved once per tick:
/// the last event per character wins, and only net visibility changes
/// produce effects.
#[derive(Debug, Clone, Default)]
struct PickupPrompts {
    visible: BTreeSet<ActorId>,
    pending: BTreeMap<ActorId, bool>,
}

impl PickupPrompts {
    fn record(&mut self, character: ActorId, overlapping: bool) {
        self.pending.insert(character, overlapping);
    }

    fn flush(&mut self) -> WeaponEffects {
        let mut effects = WeaponEffects::new();
        for (character, overlapping) in std::mem::take(&mut self.pending) {
            let changed = if overlapping {
                self.visible.insert(character)
            } else {
                self.visible.remove(&character)
            };
            if changed {
                effects.push(WeaponEffect::PickupPrompt {
                    character,
                    visible: overlapping,
                });
            }
        }
        effects
    }

    fn hide_all(&mut self) -> WeaponEffects {
        self.pending.clear();
        std::mem::take(&mut self.visible)
            .into_iter()
            .map(|character| WeaponEffect::PickupPrompt {
                character,
                visible: false,
            })
            .collect()
    }

    fn is_overlapping(&self, character: ActorId) -> bool {
        self.pending
            .get(&character)
            .copied()
            .unwrap_or_else(|| self.visible.contains(&character))
    }

    fn is_visible(&self, character: ActorId) -> bool {
        self.visible.contains(&character)
    }
}

#[derive(Debug, Clone)]
pub struct WeaponAuthority {
    id: EntityId,
    config: WeaponConfig,
    position: Vec3,
    state: ReplicatedAttribute<WeaponState>,
    ammo: ReplicatedAttribute<u32>,
    owner_character: ReplicatedAttribute<Option<ActorId>>,
    owner_controller: ReplicatedAttribute<Option<ControllerId>>,
    presentation: WeaponPresentation,
    prompts: PickupPrompts,
    trigger: Trigger,
    aim: Vec3,
}

impl WeaponAuthority {
    /// Spawn a weapon with a full magazine
    pub fn spawn(
        id: EntityId,
        config: WeaponConfig,
        position: Vec3,
        local_controller: Option<ControllerId>,
    ) -> Self {
        Self {
            id,
            config,
            position,
            state: ReplicatedAttribute::new(WeaponState::Initial),
            ammo: ReplicatedAttribute::new(config.mag_capacity),
            owner_character: ReplicatedAttribute::new(None),
            owner_controller: ReplicatedAttribute::new(None),
            presentation: WeaponPresentation::new(config.mag_capacity, local_controller),
            prompts: PickupPrompts::default(),
            trigger: Trigger::new(),
            aim: Vec3::ZERO,
        }
    }

    /// Spawn with a partially filled magazine (drop-spawns)
    pub fn with_ammo(mut self, ammo: u32) -> Self {
        self.ammo = ReplicatedAttribute::new(ammo.min(self.config.mag_capacity));
        self
    }

    pub fn set_weapon_state(&mut self, state: WeaponState) -> WeaponEffects {
        let current = *self.state.get();
        if !current.can_transition_to(state) {
            debug!(weapon = self.id, ?current, ?state, "Ignoring weapon state transition");
            return WeaponEffects::new();
        }
        self.state.set(state);

        let mut effects = WeaponEffects::new();
        if state == WeaponState::Equipped {
            effects.extend(self.prompts.hide_all());
            self.trigger.release();
        }
        effects.extend(self.presentation.on_weapon_state(state));
        effects
    }

    /// Set both owner references at once
    pub fn bind_owner(
        &mut self,
        character: Option<ActorId>,
        controller: Option<ControllerId>,
    ) -> WeaponEffects {
        let changed_character = self.owner_character.set(character);
        let changed_controller = self.owner_controller.set(controller);
        if !changed_character && !changed_controller {
            return WeaponEffects::new();
        }
        self.presentation
            .on_owner(character, controller, *self.ammo.get())
    }

    /// Pick the weapon up: Equipped plus owner binding
    pub fn equip(&mut self, character: ActorId, controller: ControllerId) -> WeaponEffects {
        if self.state() == WeaponState::Equipped {
            debug!(weapon = self.id, "Weapon already equipped");
            return WeaponEffects::new();
        }
        let mut effects = self.set_weapon_state(WeaponState::Equipped);
        effects.extend(self.bind_owner(Some(character), Some(controller)));
        effects
    }

    /// Drop into the world: Dropped, owner cleared, pickup trigger re-enabled
    pub fn dropped(&mut self) -> WeaponEffects {
        let mut effects = self.set_weapon_state(WeaponState::Dropped);
        effects.extend(self.bind_owner(None, None));
        self.trigger.release();
        effects
    }

    pub fn fire(&mut self, hit_target: Vec3) -> WeaponEffects {
        if self.state() != WeaponState::Equipped || self.is_empty() {
            return WeaponEffects::new();
        }
        let mut effects = WeaponEffects::new();
        effects.push(WeaponEffect::Fired { hit_target });
        effects.extend(self.spend_round());
        effects
    }

    /// Consume one round, floored at zero. Running dry changes no state.
    pub fn spend_round(&mut self) -> WeaponEffects {
        let next = self.ammo.get().saturating_sub(1);
        if !self.ammo.set(next) {
            return WeaponEffects::new();
        }
        self.presentation.on_ammo(next)
    }

    pub fn add_ammo(&mut self, amount: u32) -> WeaponEffects {
        let next = self
            .ammo
            .get()
            .saturating_add(amount)
            .min(self.config.mag_capacity);
        if !self.ammo.set(next) {
            return WeaponEffects::new();
        }
        self.presentation.on_ammo(next)
    }

    pub fn press_trigger(&mut self, now: f32, hit_target: Vec3) -> WeaponEffects {
        self.aim = hit_target;
        if self.state() != WeaponState::Equipped {
            return WeaponEffects::new();
        }
        if self.trigger.press(now, self.config.fire_delay) {
            self.fire(hit_target)
        } else {
            WeaponEffects::new()
        }
    }

    pub fn release_trigger(&mut self) {
        self.trigger.release();
    }

    pub fn is_trigger_held(&self) -> bool {
        self.trigger.is_held()
    }

    /// Automatic re-fire while the trigger stays held
    pub fn hold_trigger(&mut self, now: f32) -> WeaponEffects {
        if self
            .trigger
            .poll(now, self.config.fire_delay, self.config.automatic)
        {
            self.fire(self.aim)
        } else {
            WeaponEffects::new()
        }
    }

    pub fn on_sphere_overlap(&mut self, character: ActorId) {
        if self.state() == WeaponState::Equipped {
            return;
        }
        self.prompts.record(character, true);
    }

    pub fn on_sphere_end_overlap(&mut self, character: ActorId) {
        if self.state() == WeaponState::Equipped {
            return;
        }
        self.prompts.record(character, false);
    }

    /// Resolve overlap events recorded this tick
    pub fn flush_pickup_prompts(&mut self) -> WeaponEffects {
        self.prompts.flush()
    }

    /// Collect changed attributes for replication
    pub fn collect_updates(&mut self, out: &mut Vec<FieldUpdate>) {
        if let Some((version, state)) = self.state.take_dirty() {
            out.push(FieldUpdate::new(self.id, version, FieldValue::WeaponState(state)));
        }
        if let Some((version, ammo)) = self.ammo.take_dirty() {
            out.push(FieldUpdate::new(self.id, version, FieldValue::Ammo(ammo)));
        }
        if let Some((version, character)) = self.owner_character.take_dirty() {
            out.push(FieldUpdate::new(
                self.id,
                version,
                FieldValue::OwnerCharacter(character),
            ));
        }
        if let Some((version, controller)) = self.owner_controller.take_dirty() {
            out.push(FieldUpdate::new(
                self.id,
                version,
                FieldValue::OwnerController(controller),
            ));
        }
    }

    pub fn snapshot(&self) -> WeaponSnapshot {
        WeaponSnapshot {
            entity: self.id,
            config: self.config,
            position: self.position,
            state: self.state.snapshot(),
            ammo: self.ammo.snapshot(),
            owner_character: self.owner_character.snapshot(),
            owner_controller: self.owner_controller.snapshot(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn config(&self) -> &WeaponConfig {
        &self.config
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn state(&self) -> WeaponState {
        *self.state.get()
    }

    pub fn ammo(&self) -> u32 {
        *self.ammo.get()
    }

    pub fn is_empty(&self) -> bool {
        self.ammo() == 0
    }

    pub fn mag_capacity(&self) -> u32 {
        self.config.mag_capacity
    }

    pub fn weapon_type(&self) -> WeaponType {
        self.config.weapon_type
    }

    pub fn zoomed_fov(&self) -> f32 {
        self.config.zoomed_fov
    }

    pub fn zoom_interp_speed(&self) -> f32 {
        self.config.zoom_interp_speed
    }

    pub fn owner_character(&self) -> Option<ActorId> {
        *self.owner_character.get()
    }

    pub fn owner_controller(&self) -> Option<ControllerId> {
        *self.owner_controller.get()
    }

    pub fn is_overlapping(&self, character: ActorId) -> bool {
        self.prompts.is_overlapping(character)
    }

    pub fn is_prompt_visible(&self, character: ActorId) -> bool {
        self.prompts.is_visible(character)
    }

    pub fn presentation(&self) -> &WeaponPresentation {
        &self.presentation
    }
}
