//! Combat resolution and tactical analysis

pub mod resolution;
pub mod tactics;

pub use resolution::{
    attack_multiplier, defense_multiplier, resolve_combat, retreat_survivors, should_retreat,
    CombatInput, CombatResult,
};
pub use tactics::{
    analyze, encirclement_coverage, has_elevation_advantage, is_encircled, is_flanking,
    TacticalAnalysis,
};
