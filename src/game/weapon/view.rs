//! Observer-side weapon
//!
//! Read-only mirror of a weapon. The only way to change it is `apply`, which
//! feeds a replicated delivery through the notification callbacks.

use tracing::debug;

use crate::game::actor::{ActorId, ControllerId, EntityId};
use crate::game::weapon::presentation::{WeaponEffects, WeaponPresentation};
use crate::game::weapon::state::{WeaponConfig, WeaponState, WeaponType};
use crate::replication::attribute::MirroredAttribute;
use crate::replication::packet::{FieldUpdate, FieldValue, WeaponSnapshot};
use crate::util::vec3::Vec3;

#[derive(Debug, Clone)]
pub struct WeaponView {
    id: EntityId,
    config: WeaponConfig,
    position: Vec3,
    state: MirroredAttribute<WeaponState>,
    ammo: MirroredAttribute<u32>,
    owner_character: MirroredAttribute<Option<ActorId>>,
    owner_controller: MirroredAttribute<Option<ControllerId>>,
    presentation: WeaponPresentation,
    stale_discarded: u64,
}

impl WeaponView {
    /// Create from a spawn snapshot. The returned effects bring local
    /// presentation in line with the snapshot (e.g. a late joiner that
    /// already owns the weapon gets its HUD bound).
    pub fn from_snapshot(
        snapshot: &WeaponSnapshot,
        local_controller: Option<ControllerId>,
    ) -> (Self, WeaponEffects) {
        let mut view = Self {
            id: snapshot.entity,
            config: snapshot.config,
            position: snapshot.position,
            state: MirroredAttribute::new(snapshot.state.0, snapshot.state.1),
            ammo: MirroredAttribute::new(snapshot.ammo.0, snapshot.ammo.1),
            owner_character: MirroredAttribute::new(
                snapshot.owner_character.0,
                snapshot.owner_character.1,
            ),
            owner_controller: MirroredAttribute::new(
                snapshot.owner_controller.0,
                snapshot.owner_controller.1,
            ),
            presentation: WeaponPresentation::new(snapshot.config.mag_capacity, local_controller),
            stale_discarded: 0,
        };

        let mut effects = view.presentation.on_weapon_state(snapshot.state.1);
        effects.extend(view.presentation.on_owner(
            snapshot.owner_character.1,
            snapshot.owner_controller.1,
            snapshot.ammo.1,
        ));
        (view, effects)
    }

    /// Apply one delivered attribute value and run its notification
    pub fn apply(&mut self, update: &FieldUpdate) -> WeaponEffects {
        if update.entity != self.id {
            return WeaponEffects::new();
        }
        let effects = match update.value {
            FieldValue::WeaponState(state) => {
                match self.state.receive(update.version, state) {
                    Some(&state) => Some(self.presentation.on_weapon_state(state)),
                    None => None,
                }
            }
            FieldValue::Ammo(ammo) => match self.ammo.receive(update.version, ammo) {
                Some(&ammo) => Some(self.presentation.on_ammo(ammo)),
                None => None,
            },
            FieldValue::OwnerCharacter(character) => {
                match self.owner_character.receive(update.version, character) {
                    Some(&character) => {
                        let ammo = *self.ammo.get();
                        Some(self.presentation.on_owner_character(character, ammo))
                    }
                    None => None,
                }
            }
            FieldValue::OwnerController(controller) => {
                match self.owner_controller.receive(update.version, controller) {
                    Some(&controller) => {
                        let ammo = *self.ammo.get();
                        Some(self.presentation.on_owner_controller(controller, ammo))
                    }
                    None => None,
                }
            }
            FieldValue::MatchPhase(_) | FieldValue::LevelStartTime(_) => {
                debug!(weapon = self.id, "Match field routed to weapon view");
                return WeaponEffects::new();
            }
        };

        effects.unwrap_or_else(|| {
            self.stale_discarded += 1;
            debug!(
                weapon = self.id,
                version = update.version,
                kind = ?update.value.kind(),
                "Discarding stale delivery"
            );
            WeaponEffects::new()
        })
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

    pub fn owner_character(&self) -> Option<ActorId> {
        *self.owner_character.get()
    }

    pub fn owner_controller(&self) -> Option<ControllerId> {
        *self.owner_controller.get()
    }

    pub fn presentation(&self) -> &WeaponPresentation {
        &self.presentation
    }

    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }
}
