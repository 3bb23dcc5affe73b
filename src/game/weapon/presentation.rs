//! Notification callbacks and derived local state
//!
//! These callbacks are the single source of observer-visible weapon effects.
//! The authority runs them right after it writes an attribute; observers run
//! them when a delivery is accepted. All derived state is computed from the
//! current value only, so skipped intermediate values are harmless.

use smallvec::SmallVec;

use crate::game::actor::{ActorId, ControllerId};
use crate::game::ownership::{BindingChange, OwnershipBinding};
use crate::game::weapon::state::WeaponState;
use crate::util::vec3::Vec3;

/// Fire-and-forget request for the presentation layer (HUD, audio, mesh)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeaponEffect {
    /// Pickup widget for the player controlling `character`
    PickupPrompt { character: ActorId, visible: bool },
    /// Overlap sphere collision
    PickupTrigger { enabled: bool },
    /// Mesh physics, gravity and world collision
    WorldPhysics { enabled: bool },
    HudBound { controller: ControllerId },
    HudUnbound { controller: ControllerId },
    HudAmmo {
        controller: ControllerId,
        ammo: u32,
        capacity: u32,
    },
    /// Fire animation and casing ejection
    Fired { hit_target: Vec3 },
}

pub type WeaponEffects = SmallVec<[WeaponEffect; 4]>;

#[derive(Debug, Clone)]
pub struct WeaponPresentation {
    mag_capacity: u32,
    pickup_trigger: bool,
    world_physics: bool,
    binding: OwnershipBinding,
}

impl WeaponPresentation {
    pub fn new(mag_capacity: u32, local_controller: Option<ControllerId>) -> Self {
        Self {
            mag_capacity,
            pickup_trigger: true,
            world_physics: false,
            binding: OwnershipBinding::new(local_controller),
        }
    }

    pub fn on_weapon_state(&mut self, state: WeaponState) -> WeaponEffects {
        let mut effects = WeaponEffects::new();
        let (trigger, physics) = match state {
            WeaponState::Initial => (true, false),
            WeaponState::Equipped => (false, false),
            WeaponState::Dropped => (true, true),
        };
        if self.pickup_trigger != trigger {
            self.pickup_trigger = trigger;
            effects.push(WeaponEffect::PickupTrigger { enabled: trigger });
        }
        if self.world_physics != physics {
            self.world_physics = physics;
            effects.push(WeaponEffect::WorldPhysics { enabled: physics });
        }
        effects
    }

    pub fn on_ammo(&mut self, ammo: u32) -> WeaponEffects {
        let mut effects = WeaponEffects::new();
        if let Some(hud) = self.binding.hud() {
            effects.push(WeaponEffect::HudAmmo {
                controller: hud.controller,
                ammo,
                capacity: self.mag_capacity,
            });
        }
        effects
    }

    pub fn on_owner_character(&mut self, character: Option<ActorId>, ammo: u32) -> WeaponEffects {
        let change = self.binding.set_character(character);
        self.binding_effects(change, ammo)
    }

    pub fn on_owner_controller(
        &mut self,
        controller: Option<ControllerId>,
        ammo: u32,
    ) -> WeaponEffects {
        let change = self.binding.set_controller(controller);
        self.binding_effects(change, ammo)
    }

    pub fn on_owner(
        &mut self,
        character: Option<ActorId>,
        controller: Option<ControllerId>,
        ammo: u32,
    ) -> WeaponEffects {
        let change = self.binding.set_owner(character, controller);
        self.binding_effects(change, ammo)
    }

    fn binding_effects(&mut self, change: BindingChange, ammo: u32) -> WeaponEffects {
        let mut effects = WeaponEffects::new();
        match change {
            BindingChange::Unchanged => {}
            BindingChange::Unbound(from) => {
                effects.push(WeaponEffect::HudUnbound {
                    controller: from.controller,
                });
            }
            BindingChange::Bound(_) => {
                effects.extend(self.bound_effects(ammo));
            }
            BindingChange::Rebound { from, to } if from.controller == to.controller => {
                // Same HUD, new character: refresh ammo only
                effects.extend(self.on_ammo(ammo));
            }
            BindingChange::Rebound { from, .. } => {
                effects.push(WeaponEffect::HudUnbound {
                    controller: from.controller,
                });
                effects.extend(self.bound_effects(ammo));
            }
        }
        effects
    }

    fn bound_effects(&mut self, ammo: u32) -> WeaponEffects {
        let mut effects = WeaponEffects::new();
        if let Some(hud) = self.binding.hud() {
            effects.push(WeaponEffect::HudBound {
                controller: hud.controller,
            });
        }
        effects.extend(self.on_ammo(ammo));
        effects
    }

    pub fn pickup_trigger_enabled(&self) -> bool {
        self.pickup_trigger
    }

    pub fn world_physics_enabled(&self) -> bool {
        self.world_physics
    }

    pub fn binding(&self) -> &OwnershipBinding {
        &self.binding
    }

    pub fn mag_capacity(&self) -> u32 {
        self.mag_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_equipped_disables_trigger() {
        let mut presentation = WeaponPresentation::new(30, None);
        let effects = presentation.on_weapon_state(WeaponState::Equipped);

        assert!(effects.contains(&WeaponEffect::PickupTrigger { enabled: false }));
        assert!(!presentation.pickup_trigger_enabled());
    }

    #[test]
    fn test_dropped_enables_trigger_and_physics() {
        let mut presentation = WeaponPresentation::new(30, None);
        presentation.on_weapon_state(WeaponState::Equipped);
        let effects = presentation.on_weapon_state(WeaponState::Dropped);

        assert!(effects.contains(&WeaponEffect::PickupTrigger { enabled: true }));
        assert!(effects.contains(&WeaponEffect::WorldPhysics { enabled: true }));
    }

    #[test]
    fn test_same_state_twice_no_effects() {
        let mut presentation = WeaponPresentation::new(30, None);
        presentation.on_weapon_state(WeaponState::Dropped);
        assert!(presentation.on_weapon_state(WeaponState::Dropped).is_empty());
    }

    #[test]
    fn test_ammo_without_binding_is_silent() {
        let mut presentation = WeaponPresentation::new(30, None);
        assert!(presentation.on_ammo(10).is_empty());
    }

    #[test]
    fn test_bind_pushes_current_ammo() {
        let local = Uuid::new_v4();
        let mut presentation = WeaponPresentation::new(30, Some(local));

        assert!(presentation.on_owner_controller(Some(local), 17).is_empty());
        let effects = presentation.on_owner_character(Some(ActorId(4)), 17);

        assert_eq!(
            effects.as_slice(),
            &[
                WeaponEffect::HudBound { controller: local },
                WeaponEffect::HudAmmo {
                    controller: local,
                    ammo: 17,
                    capacity: 30
                },
            ]
        );
    }

    #[test]
    fn test_new_character_same_controller_refreshes_ammo_only() {
        let local = Uuid::new_v4();
        let mut presentation = WeaponPresentation::new(30, Some(local));
        presentation.on_owner(Some(ActorId(4)), Some(local), 30);

        let effects = presentation.on_owner_character(Some(ActorId(9)), 12);
        assert_eq!(
            effects.as_slice(),
            &[WeaponEffect::HudAmmo {
                controller: local,
                ammo: 12,
                capacity: 30
            }]
        );
    }

    #[test]
    fn test_unbind_on_clear() {
        let local = Uuid::new_v4();
        let mut presentation = WeaponPresentation::new(30, Some(local));
        presentation.on_owner(Some(ActorId(4)), Some(local), 30);

        let effects = presentation.on_owner(None, None, 30);
        assert_eq!(
            effects.as_slice(),
            &[WeaponEffect::HudUnbound { controller: local }]
        );
    }
}
