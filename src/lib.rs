//! Star Conquest - tick-driven simulation core for a territory-conquest game

pub mod bot;
pub mod combat;
pub mod command;
pub mod core;
pub mod scenario;
pub mod simulation;
pub mod spatial;
pub mod store;
pub mod world;

pub use crate::core::{Clock, ConquestError, EngineConfig, ManualClock, Result, SystemClock};
pub use crate::simulation::{Engine, TickDriver, TickReport};
pub use crate::store::{InMemoryStore, Store};
