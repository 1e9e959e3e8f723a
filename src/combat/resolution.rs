//! Combat resolution between an arriving attack and a defending garrison
//!
//! Modifiers are multiplicative on each side. Losses are a fixed fraction of
//! the opposing effective strength, and the attacker wins only by strictly
//! exceeding the effective defense.

use serde::{Deserialize, Serialize};

use crate::core::config::CombatConfig;
use crate::world::node::Terrain;

/// Everything the resolver needs to know about one engagement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatInput {
    pub attacker_force: u32,
    pub defender_force: u32,
    pub terrain: Terrain,
    pub defense_structure: bool,
    pub flanking: bool,
    pub elevation: bool,
}

impl CombatInput {
    /// Open terrain, no structures, no tactical bonuses
    pub fn plain(attacker_force: u32, defender_force: u32) -> Self {
        Self {
            attacker_force,
            defender_force,
            terrain: Terrain::Open,
            defense_structure: false,
            flanking: false,
            elevation: false,
        }
    }
}

/// Results of a combat resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatResult {
    pub effective_attack: f64,
    pub effective_defense: f64,
    pub attacker_losses: u32,
    pub defender_losses: u32,
    pub attacker_survivors: u32,
    pub defender_survivors: u32,
    pub attacker_wins: bool,
}

/// Defense multiplier from terrain and structures
pub fn defense_multiplier(terrain: Terrain, defense_structure: bool, config: &CombatConfig) -> f64 {
    let mut mult = match terrain {
        Terrain::Open => 1.0,
        Terrain::Nebula => config.nebula_defense,
        Terrain::Asteroid => config.asteroid_defense,
    };
    if defense_structure {
        mult *= config.defense_structure;
    }
    mult
}

/// Attack multiplier from tactical position
pub fn attack_multiplier(flanking: bool, elevation: bool, config: &CombatConfig) -> f64 {
    let mut mult = 1.0;
    if flanking {
        mult *= config.flanking_attack;
    }
    if elevation {
        mult *= config.elevation_attack;
    }
    mult
}

// Products like 70 * 0.3 land a hair below the integer in binary floating
// point; the nudge keeps floor() on the mathematically exact side.
#[inline]
fn floor_count(value: f64) -> u32 {
    (value + 1e-9).floor().max(0.0) as u32
}

/// Resolve a single engagement. Total and deterministic.
pub fn resolve_combat(input: &CombatInput, config: &CombatConfig) -> CombatResult {
    let attack_mult = attack_multiplier(input.flanking, input.elevation, config);
    let defense_mult = defense_multiplier(input.terrain, input.defense_structure, config);

    let effective_attack = input.attacker_force as f64 * attack_mult;
    let effective_defense = input.defender_force as f64 * defense_mult;

    let attacker_losses = floor_count(effective_defense * config.attacker_loss_rate);
    let defender_losses = floor_count(effective_attack * config.defender_loss_rate);

    CombatResult {
        effective_attack,
        effective_defense,
        attacker_losses,
        defender_losses,
        attacker_survivors: input.attacker_force.saturating_sub(attacker_losses),
        defender_survivors: input.defender_force.saturating_sub(defender_losses),
        attacker_wins: effective_attack > effective_defense,
    }
}

/// Attackers this heavily outnumbered withdraw instead of fighting
pub fn should_retreat(attacker_troops: u32, defender_garrison: u32, config: &CombatConfig) -> bool {
    (attacker_troops as f64) < defender_garrison as f64 * config.retreat_threshold
}

/// Troops that make it home from a retreat
pub fn retreat_survivors(attacker_troops: u32, config: &CombatConfig) -> u32 {
    floor_count(attacker_troops as f64 * config.retreat_return)
}
