//! Commands issued by players and bots
//!
//! Commands validate, then commit through a single atomic store call. A
//! failed insert after the atomic step is compensated so nothing leaks.

pub mod attack;
pub mod build;

pub use attack::{launch_attack, travel_time_ms, AttackOrder};
pub use build::build_structure;
