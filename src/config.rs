use std::str::FromStr;

use crate::game::constants::{match_timing, net, weapon};
use crate::game::match_coordinator::MatchTimings;
use crate::game::session::SessionConfig;
use crate::game::weapon::WeaponType;
use crate::replication::link::LinkConditions;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Authority ticks per second
    pub tick_rate: u32,
    pub warm_up_time: f32,
    pub match_time: f32,
    pub cooldown_time: f32,
    pub respawn_delay: f32,
    pub bot_count: usize,
    /// Observers connected through simulated links
    pub observer_count: usize,
    pub weapon_count: usize,
    /// Chance per tick that the link holds an update back
    pub link_hold_probability: f64,
    pub link_reorder: bool,
    /// Seed for bots, spawn selection and links
    pub sim_seed: u64,
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: net::TICK_RATE,
            warm_up_time: match_timing::WARM_UP,
            match_time: match_timing::MATCH,
            cooldown_time: match_timing::COOLDOWN,
            respawn_delay: match_timing::RESPAWN_DELAY,
            bot_count: 4,
            observer_count: 2,
            weapon_count: WeaponType::ALL.len(),
            link_hold_probability: 0.2,
            link_reorder: true,
            sim_seed: 7,
            metrics_port: 9090,
        }
    }
}

/// Read and parse an env var; invalid values are logged and ignored
fn env_value<T: FromStr>(name: &str, valid: impl Fn(&T) -> bool, expected: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(parsed) if valid(&parsed) => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be {}, using default", name, expected);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_value("TICK_RATE", |v: &u32| (1..=240).contains(v), "1-240") {
            config.tick_rate = v;
        }
        if let Some(v) = env_value("WARMUP_TIME", |v: &f32| *v >= 0.0, ">= 0") {
            config.warm_up_time = v;
        }
        if let Some(v) = env_value("MATCH_TIME", |v: &f32| *v > 0.0, "> 0") {
            config.match_time = v;
        }
        if let Some(v) = env_value("COOLDOWN_TIME", |v: &f32| *v >= 0.0, ">= 0") {
            config.cooldown_time = v;
        }
        if let Some(v) = env_value("RESPAWN_DELAY", |v: &f32| *v >= 0.0, ">= 0") {
            config.respawn_delay = v;
        }
        if let Some(v) = env_value("BOT_COUNT", |v: &usize| *v <= 64, "0-64") {
            config.bot_count = v;
        }
        if let Some(v) = env_value("OBSERVER_COUNT", |v: &usize| *v <= 64, "0-64") {
            config.observer_count = v;
        }
        if let Some(v) = env_value("WEAPON_COUNT", |v: &usize| *v <= 256, "0-256") {
            config.weapon_count = v;
        }
        if let Some(v) = env_value(
            "LINK_HOLD_PROBABILITY",
            |v: &f64| (0.0..=1.0).contains(v),
            "0.0-1.0",
        ) {
            config.link_hold_probability = v;
        }
        if let Some(v) = env_value("LINK_REORDER", |_: &bool| true, "true or false") {
            config.link_reorder = v;
        }
        if let Some(v) = env_value("SIM_SEED", |_: &u64| true, "an integer") {
            config.sim_seed = v;
        }
        if let Some(v) = env_value("METRICS_PORT", |v: &u16| *v > 0, "> 0") {
            config.metrics_port = v;
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        if self.match_time <= 0.0 {
            return Err("match_time must be positive".to_string());
        }
        if self.warm_up_time < 0.0 || self.cooldown_time < 0.0 || self.respawn_delay < 0.0 {
            return Err("durations cannot be negative".to_string());
        }
        if !(0.0..=1.0).contains(&self.link_hold_probability) {
            return Err("link_hold_probability must be within 0.0-1.0".to_string());
        }
        if self.metrics_port == 0 {
            return Err("metrics_port cannot be 0".to_string());
        }
        Ok(())
    }

    pub fn tick_interval_secs(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timings: MatchTimings {
                warm_up: self.warm_up_time,
                match_duration: self.match_time,
                cooldown: self.cooldown_time,
            },
            respawn_delay: self.respawn_delay,
            weapon_count: self.weapon_count,
            pickup_radius: weapon::PICKUP_RADIUS,
            command_buffer_size: net::COMMAND_BUFFER_SIZE,
        }
    }

    pub fn link_conditions(&self) -> LinkConditions {
        LinkConditions {
            hold_probability: self.link_hold_probability,
            reorder: self.link_reorder,
        }
    }
}
