//! Non-human player profiles

use serde::{Deserialize, Serialize};

use crate::core::config::BotConfig;
use crate::core::types::{PlayerId, SessionId};

/// Difficulty tier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Efficiency multiplier applied to troop commitment and build chance
    pub fn multiplier(&self, config: &BotConfig) -> f64 {
        match self {
            Difficulty::Easy => config.easy_multiplier,
            Difficulty::Normal => config.normal_multiplier,
            Difficulty::Hard => config.hard_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotProfile {
    pub session: SessionId,
    pub player: PlayerId,
    pub difficulty: Difficulty,
}
