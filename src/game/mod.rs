pub mod actor;
pub mod bots;
pub mod command_buffer;
pub mod constants;
pub mod match_coordinator;
pub mod observer;
pub mod ownership;
pub mod session;
pub mod spawn;
pub mod weapon;
