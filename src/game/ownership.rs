//! Weapon ownership binding
//!
//! Owner character and owner controller replicate as two separate attributes,
//! so an observer can learn them in either order. The HUD binding is therefore
//! never updated incrementally: every setter stores its reference and then
//! re-derives the binding from whatever references are currently known.

use crate::game::actor::{ActorId, ControllerId};

/// Local-only HUD subscription for an owned weapon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HudBinding {
    pub character: ActorId,
    pub controller: ControllerId,
}

/// Outcome of re-deriving the binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingChange {
    Unchanged,
    Bound(HudBinding),
    Unbound(HudBinding),
    Rebound { from: HudBinding, to: HudBinding },
}

#[derive(Debug, Clone)]
pub struct OwnershipBinding {
    /// Controller whose HUD this process renders (None on a dedicated server)
    local_controller: Option<ControllerId>,
    character: Option<ActorId>,
    controller: Option<ControllerId>,
    hud: Option<HudBinding>,
}

impl OwnershipBinding {
    pub fn new(local_controller: Option<ControllerId>) -> Self {
        Self {
            local_controller,
            character: None,
            controller: None,
            hud: None,
        }
    }

    pub fn set_character(&mut self, character: Option<ActorId>) -> BindingChange {
        self.character = character;
        self.reevaluate()
    }

    pub fn set_controller(&mut self, controller: Option<ControllerId>) -> BindingChange {
        self.controller = controller;
        self.reevaluate()
    }

    /// Combined update, as performed by the authority
    pub fn set_owner(
        &mut self,
        character: Option<ActorId>,
        controller: Option<ControllerId>,
    ) -> BindingChange {
        self.character = character;
        self.controller = controller;
        self.reevaluate()
    }

    /// Bring the HUD binding in line with the currently known references
    pub fn reevaluate(&mut self) -> BindingChange {
        let desired = self.derive();
        if desired == self.hud {
            return BindingChange::Unchanged;
        }
        let previous = std::mem::replace(&mut self.hud, desired);
        match (previous, desired) {
            (None, Some(to)) => BindingChange::Bound(to),
            (Some(from), None) => BindingChange::Unbound(from),
            (Some(from), Some(to)) => BindingChange::Rebound { from, to },
            (None, None) => BindingChange::Unchanged,
        }
    }

    fn derive(&self) -> Option<HudBinding> {
        match (self.character, self.controller) {
            (Some(character), Some(controller)) if self.local_controller == Some(controller) => {
                Some(HudBinding {
                    character,
                    controller,
                })
            }
            _ => None,
        }
    }

    /// Both references known: the weapon is fully usable by an owner
    pub fn owner(&self) -> Option<(ActorId, ControllerId)> {
        self.character.zip(self.controller)
    }

    pub fn character(&self) -> Option<ActorId> {
        self.character
    }

    pub fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    pub fn hud(&self) -> Option<HudBinding> {
        self.hud
    }

    pub fn local_controller(&self) -> Option<ControllerId> {
        self.local_controller
    }
}
