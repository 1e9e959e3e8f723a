//! Persistent data model of a game session

pub mod attack;
pub mod bot;
pub mod economy;
pub mod node;
pub mod record;
pub mod sector;
pub mod session;
pub mod structure;

pub use attack::{Attack, AttackStatus};
pub use bot::{BotProfile, Difficulty};
pub use economy::{PlayerEconomy, ResourceCaps, Resources};
pub use node::{Terrain, TerritoryNode};
pub use record::{CombatOutcome, CombatRecord, TacticalFlags};
pub use sector::TerritorySector;
pub use session::{GameSession, SessionStatus};
pub use structure::{Structure, StructureIndex, StructureType};
