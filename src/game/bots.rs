//! Server-side bots
//!
//! Bots read the authority world and answer with the same commands a player
//! would send. They also stand in for the damage layer: a bot that keeps
//! shooting at a target eventually reports it eliminated.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::game::actor::{ActorId, ControllerId, EntityId};
use crate::game::command_buffer::PlayerCommand;
use crate::game::match_coordinator::MatchPhase;
use crate::game::session::MatchSession;
use crate::game::weapon::WeaponState;
use crate::util::vec3::Vec3;

/// Walking speed in units per second
const MOVE_SPEED: f32 = 600.0;
/// Seconds between decisions
const DECISION_INTERVAL: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotBehavior {
    /// Walk to the nearest free weapon and pick it up
    Seek,
    /// Shoot at the nearest character
    Fight,
    Idle,
}

#[derive(Debug, Clone)]
pub struct BotPersonality {
    /// Chance per second that sustained fire eliminates the target
    pub lethality: f32,
    /// Chance per decision to drop the weapon and look for another
    pub fickleness: f32,
}

impl BotPersonality {
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            lethality: rng.gen_range(0.05..0.3),
            fickleness: rng.gen_range(0.0..0.05),
        }
    }
}

#[derive(Debug, Clone)]
struct BotState {
    behavior: BotBehavior,
    decision_timer: f32,
    firing: bool,
    personality: BotPersonality,
}

/// What the bots want to happen this tick
#[derive(Debug, Default)]
pub struct BotOutput {
    pub commands: Vec<(ControllerId, PlayerCommand)>,
    /// (victim, attacker)
    pub eliminations: Vec<(ActorId, ControllerId)>,
}

pub struct BotDriver {
    bots: HashMap<ControllerId, BotState>,
    rng: StdRng,
}

impl BotDriver {
    pub fn new(seed: u64) -> Self {
        Self {
            bots: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn add_bot(&mut self, controller: ControllerId) {
        let personality = BotPersonality::random(&mut self.rng);
        self.bots.insert(
            controller,
            BotState {
                behavior: BotBehavior::Seek,
                decision_timer: 0.0,
                firing: false,
                personality,
            },
        );
    }

    pub fn remove_bot(&mut self, controller: ControllerId) {
        self.bots.remove(&controller);
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    pub fn behavior(&self, controller: ControllerId) -> Option<BotBehavior> {
        self.bots.get(&controller).map(|b| b.behavior)
    }

    pub fn update(&mut self, session: &MatchSession, dt: f32) -> BotOutput {
        let mut output = BotOutput::default();
        let registry = session.registry();
        let locked = session.coordinator().phase() == MatchPhase::Cooldown;

        for (&controller, bot) in self.bots.iter_mut() {
            let Some(character) = registry
                .pawn_of(controller)
                .and_then(|pawn| registry.character(pawn))
                .filter(|c| !c.eliminated)
            else {
                bot.firing = false;
                continue;
            };
            let (pawn, position) = (character.id, character.position);

            bot.decision_timer -= dt;
            let held = session.held_weapon(controller);
            bot.behavior = match (held, locked) {
                (_, true) => BotBehavior::Idle,
                (Some(_), false) => BotBehavior::Fight,
                (None, false) => BotBehavior::Seek,
            };

            match bot.behavior {
                BotBehavior::Idle => {
                    if bot.firing {
                        bot.firing = false;
                        output
                            .commands
                            .push((controller, PlayerCommand::TriggerReleased));
                    }
                }
                BotBehavior::Seek => {
                    let Some((weapon, target)) = nearest_free_weapon(session, position) else {
                        continue;
                    };
                    let step = MOVE_SPEED * dt;
                    let offset = target - position;
                    let next = if offset.length() <= step {
                        target
                    } else {
                        position + offset.normalize() * step
                    };
                    output
                        .commands
                        .push((controller, PlayerCommand::Move { position: next }));
                    if session
                        .weapon(weapon)
                        .is_some_and(|w| w.is_prompt_visible(pawn))
                    {
                        output
                            .commands
                            .push((controller, PlayerCommand::Equip { weapon }));
                    }
                }
                BotBehavior::Fight => {
                    let Some(weapon) = held.and_then(|id| session.weapon(id)) else {
                        continue;
                    };
                    if weapon.is_empty() {
                        bot.firing = false;
                        output.commands.push((controller, PlayerCommand::TriggerReleased));
                        output.commands.push((
                            controller,
                            PlayerCommand::Reload {
                                amount: weapon.mag_capacity(),
                            },
                        ));
                        continue;
                    }

                    let target = registry
                        .characters()
                        .filter(|c| c.id != pawn && !c.eliminated)
                        .min_by(|a, b| {
                            a.position
                                .distance_sq_to(position)
                                .partial_cmp(&b.position.distance_sq_to(position))
                                .unwrap_or(std::cmp::Ordering::Equal)
                        });

                    let Some(target) = target else {
                        if bot.firing {
                            bot.firing = false;
                            output.commands.push((controller, PlayerCommand::TriggerReleased));
                        }
                        continue;
                    };

                    if !bot.firing || !weapon.config().automatic {
                        bot.firing = true;
                        output.commands.push((
                            controller,
                            PlayerCommand::TriggerPressed {
                                target: target.position,
                            },
                        ));
                    }

                    if self.rng.gen_bool((bot.personality.lethality * dt).clamp(0.0, 1.0) as f64) {
                        output.eliminations.push((target.id, controller));
                    }

                    if bot.decision_timer <= 0.0 {
                        bot.decision_timer = DECISION_INTERVAL;
                        if self.rng.gen_bool(bot.personality.fickleness as f64) {
                            bot.firing = false;
                            output.commands.push((controller, PlayerCommand::TriggerReleased));
                            output.commands.push((controller, PlayerCommand::Drop));
                        } else if !weapon.config().automatic {
                            // semi-auto needs a release between shots
                            output.commands.push((controller, PlayerCommand::TriggerReleased));
                            bot.firing = false;
                        }
                    }
                }
            }
        }

        output
    }
}

fn nearest_free_weapon(session: &MatchSession, from: Vec3) -> Option<(EntityId, Vec3)> {
    session
        .weapons()
        .filter(|w| w.state() != WeaponState::Equipped)
        .map(|w| (w.id(), w.position()))
        .min_by(|(_, a), (_, b)| {
            a.distance_sq_to(from)
                .partial_cmp(&b.distance_sq_to(from))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}
