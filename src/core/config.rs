//! Engine configuration with documented constants
//!
//! All magic numbers are collected here. Every section deserializes with
//! `#[serde(default)]`, so a TOML file only needs to name the values it
//! overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{ConquestError, Result};

/// Configuration for every simulation phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub growth: GrowthConfig,
    pub combat: CombatConfig,
    pub tactics: TacticsConfig,
    pub expansion: ExpansionConfig,
    pub economy: EconomyConfig,
    pub attacks: AttackConfig,
    pub bots: BotConfig,
    pub driver: DriverConfig,
}

// === TROOP GROWTH ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Capacity of a node before structure bonuses
    pub base_capacity: u32,
    /// Extra capacity granted per level of an active colony structure
    pub colony_bonus_per_level: u32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            base_capacity: 500,
            colony_bonus_per_level: 250,
        }
    }
}

// === COMBAT ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Defense multiplier for nebula terrain
    pub nebula_defense: f64,
    /// Defense multiplier for asteroid terrain
    pub asteroid_defense: f64,
    /// Defense multiplier when a defense structure covers the target
    pub defense_structure: f64,
    /// Attack multiplier when the attack is flanking
    pub flanking_attack: f64,
    /// Attack multiplier with elevation advantage
    pub elevation_attack: f64,
    /// Fraction of effective defense inflicted on the attacker
    pub attacker_loss_rate: f64,
    /// Fraction of effective attack inflicted on the defender
    pub defender_loss_rate: f64,
    /// Attackers retreat when troops < defender garrison * this
    pub retreat_threshold: f64,
    /// Fraction of a retreating force that makes it home
    pub retreat_return: f64,
    /// Radius around the target within which a defender's defense structure
    /// still counts. Zero means only structures on the target itself.
    pub defense_range: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            nebula_defense: 1.5,
            asteroid_defense: 1.25,
            defense_structure: 5.0,
            flanking_attack: 1.2,
            elevation_attack: 1.1,
            attacker_loss_rate: 0.3,
            defender_loss_rate: 0.4,
            retreat_threshold: 0.3,
            retreat_return: 0.8,
            defense_range: 0.0,
        }
    }
}

// === TACTICS ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Radius around a target searched for encircling attacker nodes
    pub encirclement_radius: f32,
    /// Height difference (Y axis) that grants elevation advantage
    pub elevation_threshold: f32,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            encirclement_radius: 300.0,
            elevation_threshold: 50.0,
        }
    }
}

// === TERRITORY EXPANSION ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Expansion runs on ticks divisible by this
    pub interval_ticks: u64,
    /// Spacing between sectors; also the dedup distance
    pub sector_size: f32,
    /// Nodes stop expanding once the next shell would exceed this radius
    pub max_radius: f32,
    /// A node whose oldest sector is younger than this does not expand
    pub guard_window_ms: u64,
    /// Upper bound on sectors created for one node in one wave
    pub max_sectors_per_wave: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 10,
            sector_size: 20.0,
            max_radius: 200.0,
            guard_window_ms: 30_000,
            max_sectors_per_wave: 24,
        }
    }
}

// === ECONOMY ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub energy_base: f64,
    /// Scales planet_count^0.6
    pub energy_per_planet: f64,
    pub energy_exponent: f64,
    /// Fill ratio of peak energy efficiency
    pub efficiency_peak: f64,
    /// Efficiency at an empty (and full) store
    pub efficiency_floor: f64,
    pub credits_per_planet: u64,
    /// Owned nodes within this range of a trade structure add `trade_bonus`
    pub trade_range: f32,
    pub trade_bonus: u64,
    /// Minerals per mining structure on a resource-rich node
    pub mining_yield: u64,
    pub max_credits: u64,
    pub max_energy: u64,
    pub max_minerals: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            energy_base: 100.0,
            energy_per_planet: 100.0,
            energy_exponent: 0.6,
            efficiency_peak: 0.42,
            efficiency_floor: 0.5,
            credits_per_planet: 10,
            trade_range: 250.0,
            trade_bonus: 10,
            mining_yield: 50,
            max_credits: 1_000_000,
            max_energy: 10_000,
            max_minerals: 100_000,
        }
    }
}

// === ATTACKS ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Travel speed in world units per second
    pub travel_speed: f32,
    /// Shortest possible travel time
    pub min_travel_ms: u64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            travel_speed: 50.0,
            min_travel_ms: 1_000,
        }
    }
}

// === BOTS ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Each bot acts once every this many ticks
    pub interval_ticks: u64,
    /// How far from its own nodes a bot looks for targets
    pub range: f32,
    /// Fraction of a source garrison committed at full efficiency
    pub commit_fraction: f64,
    /// Chance of building per decision at full efficiency
    pub build_chance: f64,
    /// Strength/target ratio needed to attack at full efficiency
    pub attack_ratio_threshold: f64,
    /// Directional buckets that make a target "nearly encircled"
    pub nearly_encircled_buckets: usize,
    /// Reinforce when strongest garrison exceeds weakest by this factor
    pub reinforce_ratio: f64,
    /// Colony is built once a node is this full
    pub colony_fill_ratio: f64,
    pub easy_multiplier: f64,
    pub normal_multiplier: f64,
    pub hard_multiplier: f64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 30,
            range: 600.0,
            commit_fraction: 0.6,
            build_chance: 0.5,
            attack_ratio_threshold: 1.5,
            nearly_encircled_buckets: 4,
            reinforce_ratio: 2.0,
            colony_fill_ratio: 0.9,
            easy_multiplier: 0.5,
            normal_multiplier: 0.75,
            hard_multiplier: 1.0,
        }
    }
}

// === DRIVER ===
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Interval between tick invocations for one session
    pub tick_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string and validate
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let e = &self.expansion;
        if e.sector_size <= 0.0 {
            return Err(ConquestError::Config("expansion.sector_size must be positive".into()));
        }
        if e.max_radius < e.sector_size {
            return Err(ConquestError::Config(format!(
                "expansion.max_radius ({}) must be >= sector_size ({})",
                e.max_radius, e.sector_size
            )));
        }
        if e.interval_ticks == 0 || self.bots.interval_ticks == 0 {
            return Err(ConquestError::Config("tick intervals must be non-zero".into()));
        }
        if self.driver.tick_interval_ms == 0 {
            return Err(ConquestError::Config("driver.tick_interval_ms must be non-zero".into()));
        }

        let peak = self.economy.efficiency_peak;
        if !(peak > 0.0 && peak < 1.0) {
            return Err(ConquestError::Config(format!(
                "economy.efficiency_peak ({}) must lie in (0, 1)",
                peak
            )));
        }
        if !(0.0..=1.0).contains(&self.economy.efficiency_floor) {
            return Err(ConquestError::Config("economy.efficiency_floor must lie in [0, 1]".into()));
        }

        let b = &self.bots;
        for (name, m) in [
            ("easy", b.easy_multiplier),
            ("normal", b.normal_multiplier),
            ("hard", b.hard_multiplier),
        ] {
            if !(m > 0.0 && m <= 1.0) {
                return Err(ConquestError::Config(format!(
                    "bots.{}_multiplier ({}) must lie in (0, 1]",
                    name, m
                )));
            }
        }

        if self.attacks.travel_speed <= 0.0 {
            return Err(ConquestError::Config("attacks.travel_speed must be positive".into()));
        }

        Ok(())
    }
}
