//! Fire cadence
//!
//! Automatic weapons fire again every `fire_delay` while the trigger is held.
//! Semi-automatic weapons fire once per press. A press that lands inside the
//! delay window is swallowed.

/// Trigger state for one weapon
#[derive(Debug, Clone, Default)]
pub struct Trigger {
    held: bool,
    /// Earliest time the next shot may happen
    ready_at: f32,
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger pressed. Returns true if a shot should happen now.
    pub fn press(&mut self, now: f32, fire_delay: f32) -> bool {
        self.held = true;
        self.try_shoot(now, fire_delay)
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    /// Per-tick check while held. Returns true when an automatic weapon is due
    /// for another shot.
    pub fn poll(&mut self, now: f32, fire_delay: f32, automatic: bool) -> bool {
        if !self.held || !automatic {
            return false;
        }
        self.try_shoot(now, fire_delay)
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    fn try_shoot(&mut self, now: f32, fire_delay: f32) -> bool {
        if now < self.ready_at {
            return false;
        }
        self.ready_at = now + fire_delay;
        true
    }
}
