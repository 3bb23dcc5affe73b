/// Weapon defaults (per-instance values override these at spawn)
pub mod weapon {
    /// Rounds per magazine
    pub const MAG_CAPACITY: u32 = 30;
    /// Seconds between automatic shots
    pub const FIRE_DELAY: f32 = 0.15;
    pub const AUTOMATIC: bool = true;
    /// Field of view while aiming down sights
    pub const ZOOMED_FOV: f32 = 30.0;
    pub const ZOOM_INTERP_SPEED: f32 = 20.0;
    /// Radius of the pickup overlap sphere
    pub const PICKUP_RADIUS: f32 = 150.0;
}

/// Match phase durations in seconds
pub mod match_timing {
    pub const WARM_UP: f32 = 10.0;
    pub const MATCH: f32 = 120.0;
    pub const COOLDOWN: f32 = 10.0;
    /// Delay between elimination and respawn
    pub const RESPAWN_DELAY: f32 = 3.0;
}

/// Spawn point layout used when a level does not provide its own
pub mod spawn {
    /// Number of generated spawn points
    pub const POINT_COUNT: usize = 8;
    /// Radius of the generated spawn ring
    pub const RING_RADIUS: f32 = 1500.0;
    /// Height above the floor
    pub const HEIGHT: f32 = 100.0;
    /// Radius of the ring weapons are laid out on
    pub const WEAPON_RING_RADIUS: f32 = 600.0;
}

/// Replication constants
pub mod net {
    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 30;
    /// Capacity of the player command buffer
    pub const COMMAND_BUFFER_SIZE: usize = 1024;
}
