//! Player economy - per-player resource balances

use serde::{Deserialize, Serialize};

use crate::core::config::EconomyConfig;
use crate::core::types::{PlayerId, SessionId};

/// A bundle of the three resources, used for balances, deltas and costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resources {
    pub credits: u64,
    pub energy: u64,
    pub minerals: u64,
}

impl Resources {
    pub fn new(credits: u64, energy: u64, minerals: u64) -> Self {
        Self {
            credits,
            energy,
            minerals,
        }
    }

    pub fn credits(credits: u64) -> Self {
        Self {
            credits,
            ..Self::default()
        }
    }

    /// True if every component covers the corresponding component of `cost`
    pub fn covers(&self, cost: &Resources) -> bool {
        self.credits >= cost.credits && self.energy >= cost.energy && self.minerals >= cost.minerals
    }

    pub fn is_zero(&self) -> bool {
        self.credits == 0 && self.energy == 0 && self.minerals == 0
    }
}

/// Upper bounds on balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCaps {
    pub credits: u64,
    pub energy: u64,
    pub minerals: u64,
}

impl ResourceCaps {
    pub fn from_config(config: &EconomyConfig) -> Self {
        Self {
            credits: config.max_credits,
            energy: config.max_energy,
            minerals: config.max_minerals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEconomy {
    pub session: SessionId,
    pub player: PlayerId,
    pub balance: Resources,
}

impl PlayerEconomy {
    pub fn new(session: SessionId, player: PlayerId, balance: Resources) -> Self {
        Self {
            session,
            player,
            balance,
        }
    }

    /// Add a delta, clamping each balance to its cap
    pub fn credit(&mut self, delta: &Resources, caps: &ResourceCaps) {
        let b = &mut self.balance;
        b.credits = b.credits.saturating_add(delta.credits).min(caps.credits);
        b.energy = b.energy.saturating_add(delta.energy).min(caps.energy);
        b.minerals = b.minerals.saturating_add(delta.minerals).min(caps.minerals);
    }

    /// Spend `cost` if affordable. Returns false and changes nothing otherwise.
    pub fn try_spend(&mut self, cost: &Resources) -> bool {
        if !self.balance.covers(cost) {
            return false;
        }
        self.balance.credits -= cost.credits;
        self.balance.energy -= cost.energy;
        self.balance.minerals -= cost.minerals;
        true
    }
}
