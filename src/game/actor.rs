//! Actor registry and lookup handles
//!
//! Characters and controllers are owned here and nowhere else. Everything
//! outside the registry refers to them through copyable handles, so a
//! destroyed character simply stops resolving.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::vec3::Vec3;

/// Identifier for replicated entities (weapons, the match)
pub type EntityId = u64;

/// Controlling actor (a player or bot); stable for the whole session
pub type ControllerId = Uuid;

/// Handle to a character in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Pawn controlled by a controller
#[derive(Debug, Clone)]
pub struct Character {
    pub id: ActorId,
    pub controller: Option<ControllerId>,
    pub position: Vec3,
    pub eliminated: bool,
}

#[derive(Debug, Clone)]
pub struct Controller {
    pub id: ControllerId,
    pub name: String,
    pub pawn: Option<ActorId>,
    pub is_bot: bool,
}

#[derive(Debug, Default)]
pub struct ActorRegistry {
    characters: HashMap<ActorId, Character>,
    controllers: HashMap<ControllerId, Controller>,
    next_id: u64,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self {
            characters: HashMap::new(),
            controllers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate an id from the shared id space. Ids are never reused.
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn add_controller(&mut self, name: String, is_bot: bool) -> ControllerId {
        let id = Uuid::new_v4();
        self.controllers.insert(
            id,
            Controller {
                id,
                name,
                pawn: None,
                is_bot,
            },
        );
        id
    }

    /// Remove a controller along with its pawn
    pub fn remove_controller(&mut self, id: ControllerId) -> Option<Controller> {
        let controller = self.controllers.remove(&id)?;
        if let Some(pawn) = controller.pawn {
            self.characters.remove(&pawn);
        }
        Some(controller)
    }

    /// Spawn a character and let `controller` possess it. Any previous pawn
    /// of that controller is released (not destroyed).
    pub fn spawn_character(&mut self, controller: ControllerId, position: Vec3) -> Option<ActorId> {
        if !self.controllers.contains_key(&controller) {
            return None;
        }
        let id = ActorId(self.next_entity_id());
        self.characters.insert(
            id,
            Character {
                id,
                controller: Some(controller),
                position,
                eliminated: false,
            },
        );
        let previous = self
            .controllers
            .get_mut(&controller)
            .and_then(|c| c.pawn.replace(id));
        if let Some(previous) = previous {
            if let Some(old) = self.characters.get_mut(&previous) {
                old.controller = None;
            }
        }
        Some(id)
    }

    /// Destroy a character, clearing its controller's pawn if it still points here
    pub fn destroy_character(&mut self, id: ActorId) -> Option<Character> {
        let character = self.characters.remove(&id)?;
        if let Some(controller) = character.controller.and_then(|c| self.controllers.get_mut(&c)) {
            if controller.pawn == Some(id) {
                controller.pawn = None;
            }
        }
        Some(character)
    }

    /// Flag a character as eliminated. Returns false if it is unknown or was
    /// already eliminated.
    pub fn mark_eliminated(&mut self, id: ActorId) -> bool {
        match self.characters.get_mut(&id) {
            Some(character) if !character.eliminated => {
                character.eliminated = true;
                true
            }
            _ => false,
        }
    }

    /// Returns false for unknown or eliminated characters
    pub fn move_character(&mut self, id: ActorId, position: Vec3) -> bool {
        match self.characters.get_mut(&id) {
            Some(character) if !character.eliminated => {
                character.position = position;
                true
            }
            _ => false,
        }
    }

    pub fn character(&self, id: ActorId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn controller(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.get(&id)
    }

    pub fn pawn_of(&self, controller: ControllerId) -> Option<ActorId> {
        self.controllers.get(&controller).and_then(|c| c.pawn)
    }

    pub fn controller_of(&self, character: ActorId) -> Option<ControllerId> {
        self.characters.get(&character).and_then(|c| c.controller)
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers.values()
    }

    /// Positions of characters still in play (spawn contention)
    pub fn live_positions(&self) -> Vec<Vec3> {
        self.characters
            .values()
            .filter(|c| !c.eliminated)
            .map(|c| c.position)
            .collect()
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }
}
