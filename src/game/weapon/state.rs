use serde::{Deserialize, Serialize};

use crate::game::constants::weapon;

/// Weapon lifecycle state
///
/// Initial -> Equipped <-> Dropped. Initial is never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeaponState {
    /// Placed in the level, never picked up
    #[default]
    Initial,
    /// Held by a character
    Equipped,
    /// Lying in the world after being held
    Dropped,
}

impl WeaponState {
    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: WeaponState) -> bool {
        self != next && next != WeaponState::Initial
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeaponType {
    #[default]
    AssaultRifle,
    Pistol,
    SubmachineGun,
    Shotgun,
    SniperRifle,
    RocketLauncher,
}

impl WeaponType {
    pub const ALL: [WeaponType; 6] = [
        WeaponType::AssaultRifle,
        WeaponType::Pistol,
        WeaponType::SubmachineGun,
        WeaponType::Shotgun,
        WeaponType::SniperRifle,
        WeaponType::RocketLauncher,
    ];
}

/// Per-instance weapon configuration, fixed at spawn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeaponConfig {
    pub weapon_type: WeaponType,
    pub mag_capacity: u32,
    /// Seconds between shots
    pub fire_delay: f32,
    pub automatic: bool,
    pub zoomed_fov: f32,
    pub zoom_interp_speed: f32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            weapon_type: WeaponType::AssaultRifle,
            mag_capacity: weapon::MAG_CAPACITY,
            fire_delay: weapon::FIRE_DELAY,
            automatic: weapon::AUTOMATIC,
            zoomed_fov: weapon::ZOOMED_FOV,
            zoom_interp_speed: weapon::ZOOM_INTERP_SPEED,
        }
    }
}

impl WeaponConfig {
    /// Reasonable per-type configuration
    pub fn for_type(weapon_type: WeaponType) -> Self {
        let base = Self {
            weapon_type,
            ..Self::default()
        };
        match weapon_type {
            WeaponType::AssaultRifle => base,
            WeaponType::Pistol => Self {
                mag_capacity: 12,
                fire_delay: 0.25,
                automatic: false,
                zoomed_fov: 60.0,
                ..base
            },
            WeaponType::SubmachineGun => Self {
                mag_capacity: 40,
                fire_delay: 0.08,
                zoomed_fov: 45.0,
                ..base
            },
            WeaponType::Shotgun => Self {
                mag_capacity: 8,
                fire_delay: 0.9,
                automatic: false,
                zoomed_fov: 55.0,
                ..base
            },
            WeaponType::SniperRifle => Self {
                mag_capacity: 5,
                fire_delay: 1.5,
                automatic: false,
                zoomed_fov: 15.0,
                zoom_interp_speed: 25.0,
                ..base
            },
            WeaponType::RocketLauncher => Self {
                mag_capacity: 4,
                fire_delay: 1.2,
                automatic: false,
                ..base
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default() {
        assert_eq!(WeaponState::default(), WeaponState::Initial);
    }

    #[test]
    fn test_initial_never_reentered() {
        for from in [WeaponState::Initial, WeaponState::Equipped, WeaponState::Dropped] {
            assert!(!from.can_transition_to(WeaponState::Initial));
        }
    }

    #[test]
    fn test_equipped_dropped_reversible() {
        assert!(WeaponState::Initial.can_transition_to(WeaponState::Equipped));
        assert!(WeaponState::Initial.can_transition_to(WeaponState::Dropped));
        assert!(WeaponState::Equipped.can_transition_to(WeaponState::Dropped));
        assert!(WeaponState::Dropped.can_transition_to(WeaponState::Equipped));
        assert!(!WeaponState::Equipped.can_transition_to(WeaponState::Equipped));
    }

    #[test]
    fn test_config_defaults() {
        let config = WeaponConfig::default();
        assert_eq!(config.mag_capacity, 30);
        assert!(config.automatic);
        assert_eq!(config.fire_delay, 0.15);
    }

    #[test]
    fn test_config_for_type_nonzero_capacity() {
        for weapon_type in WeaponType::ALL {
            let config = WeaponConfig::for_type(weapon_type);
            assert_eq!(config.weapon_type, weapon_type);
            assert!(config.mag_capacity > 0);
            assert!(config.fire_delay > 0.0);
        }
    }
}
