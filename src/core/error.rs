use thiserror::Error;

use crate::core::types::{NodeId, PlayerId};

#[derive(Error, Debug)]
pub enum ConquestError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient troops on node {node}: requested {requested}, available {available}")]
    InsufficientTroops {
        node: NodeId,
        requested: u32,
        available: u32,
    },

    #[error("Insufficient resources for player {player}: {detail}")]
    InsufficientResources { player: PlayerId, detail: String },

    #[error("Access denied: player {player} does not control node {node}")]
    AccessDenied { player: PlayerId, node: NodeId },

    #[error("Invalid attack transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl ConquestError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Transient failures are retried on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Missing references are no-ops for the affected entity
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConquestError>;
