//! Weapon entity
//!
//! `WeaponAuthority` is the only type that can change weapon state, ammo or
//! owner references. Observers hold a `WeaponView`, which has no mutators and
//! changes only when replicated deliveries are applied. Both route every
//! change through the same `WeaponPresentation` callbacks, so local side
//! effects look the same on every machine.

pub mod authority;
pub mod presentation;
pub mod state;
pub mod trigger;
pub mod view;

pub use authority::WeaponAuthority;
pub use presentation::{WeaponEffect, WeaponEffects, WeaponPresentation};
pub use state::{WeaponConfig, WeaponState, WeaponType};
pub use trigger::Trigger;
pub use view::WeaponView;
