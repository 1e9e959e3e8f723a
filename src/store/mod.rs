//! Repository interface over the persistent store
//!
//! The simulation never read-modify-writes a contended value itself. Garrison
//! decrements, resource spending, ownership transfer, tick advance and attack
//! status changes are each a single store call that verifies its precondition
//! and mutates under the same lock, so two concurrent callers can never drive
//! a balance negative or double-apply a transition.
//!
//! Every method may block or fail; callers await them and treat
//! [`ConquestError::Store`](crate::core::error::ConquestError::Store) as
//! transient.

pub mod memory;

use std::future::Future;

use crate::core::error::Result;
use crate::core::types::{
    AttackId, NodeId, PlayerId, Position, SessionId, Tick, Timestamp,
};
use crate::world::{
    Attack, AttackStatus, BotProfile, CombatRecord, GameSession, PlayerEconomy, ResourceCaps,
    Resources, SessionStatus, Structure, TerritoryNode, TerritorySector,
};

pub use memory::InMemoryStore;

/// A guarded change to one node made when an attack resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEffect {
    /// Add troops capped at `cap`, only while `owner` still holds the node
    AddCapped {
        node: NodeId,
        owner: PlayerId,
        amount: u32,
        cap: u32,
    },
    /// Set the garrison iff it still equals `expected`
    SetGarrison { node: NodeId, expected: u32, new: u32 },
    /// Transfer ownership iff the node is still held by `expected_owner`
    Capture {
        node: NodeId,
        expected_owner: Option<PlayerId>,
        new_owner: PlayerId,
        garrison: u32,
    },
}

impl NodeEffect {
    pub fn node(&self) -> NodeId {
        match self {
            NodeEffect::AddCapped { node, .. }
            | NodeEffect::SetGarrison { node, .. }
            | NodeEffect::Capture { node, .. } => *node,
        }
    }

    /// Whether the guard still holds against the current node
    pub fn holds(&self, current: &TerritoryNode) -> bool {
        match self {
            NodeEffect::AddCapped { owner, .. } => current.owner == Some(*owner),
            NodeEffect::SetGarrison { expected, .. } => current.garrison == *expected,
            NodeEffect::Capture { expected_owner, .. } => current.owner == *expected_owner,
        }
    }

    /// Apply to a node the guard was checked against
    pub fn apply(&self, node: &mut TerritoryNode) {
        match *self {
            NodeEffect::AddCapped { amount, cap, .. } => {
                node.garrison = node.garrison.saturating_add(amount).min(cap.max(node.garrison));
            }
            NodeEffect::SetGarrison { new, .. } => node.garrison = new,
            NodeEffect::Capture {
                new_owner,
                garrison,
                ..
            } => {
                node.owner = Some(new_owner);
                node.garrison = garrison;
            }
        }
    }
}

/// Everything one attack resolution writes: the node effect, the audit
/// record and the status change. Committed as a unit or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackCommit {
    pub attack: AttackId,
    pub from: AttackStatus,
    pub to: AttackStatus,
    pub effect: Option<NodeEffect>,
    pub record: Option<CombatRecord>,
}

/// Result of [`Store::commit_attack`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The attack is no longer in `from`; nothing was written
    AttackMoved,
    /// The node effect's guard failed; nothing was written
    NodeChanged,
}

/// Ownership filter for node queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter {
    Any,
    /// Owned by this player
    Player(PlayerId),
    /// Owned by nobody
    Neutral,
    /// Owned by somebody other than this player
    Hostile(PlayerId),
}

impl OwnerFilter {
    pub fn matches(&self, owner: Option<PlayerId>) -> bool {
        match self {
            OwnerFilter::Any => true,
            OwnerFilter::Player(p) => owner == Some(*p),
            OwnerFilter::Neutral => owner.is_none(),
            OwnerFilter::Hostile(p) => matches!(owner, Some(o) if o != *p),
        }
    }
}

pub trait Store: Send + Sync + 'static {
    // === SESSIONS ===
    fn insert_session(&self, session: GameSession) -> impl Future<Output = Result<()>> + Send;

    fn session(&self, id: SessionId) -> impl Future<Output = Result<Option<GameSession>>> + Send;

    /// Advance the tick counter iff it still equals `expected`.
    ///
    /// Returns the new tick, or `None` when another invocation got there first
    /// or the session is not active.
    fn advance_session_tick(
        &self,
        id: SessionId,
        expected: Tick,
        now: Timestamp,
    ) -> impl Future<Output = Result<Option<Tick>>> + Send;

    fn set_session_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        winner: Option<PlayerId>,
    ) -> impl Future<Output = Result<()>> + Send;

    // === NODES ===
    fn insert_node(&self, node: TerritoryNode) -> impl Future<Output = Result<()>> + Send;

    fn node(&self, id: NodeId) -> impl Future<Output = Result<Option<TerritoryNode>>> + Send;

    fn nodes(&self, session: SessionId) -> impl Future<Output = Result<Vec<TerritoryNode>>> + Send;

    /// Nodes of a session within `radius` of `center` (inclusive)
    fn nodes_within_radius(
        &self,
        session: SessionId,
        center: Position,
        radius: f32,
        owner: OwnerFilter,
    ) -> impl Future<Output = Result<Vec<TerritoryNode>>> + Send;

    /// Lock the node, verify `owner` holds it with at least `amount` troops,
    /// subtract, release. Returns the remaining garrison.
    ///
    /// Fails with `NotFound`, `AccessDenied` or `InsufficientTroops` and never
    /// partially applies.
    fn decrement_garrison(
        &self,
        node: NodeId,
        owner: PlayerId,
        amount: u32,
    ) -> impl Future<Output = Result<u32>> + Send;

    /// Add troops capped at `cap`, only while `owner` still holds the node.
    /// Returns the new garrison, or `None` if the owner changed.
    fn add_garrison_capped(
        &self,
        node: NodeId,
        owner: PlayerId,
        amount: u32,
        cap: u32,
    ) -> impl Future<Output = Result<Option<u32>>> + Send;

    /// Set the garrison iff it still equals `expected`
    fn compare_and_set_garrison(
        &self,
        node: NodeId,
        expected: u32,
        new: u32,
    ) -> impl Future<Output = Result<bool>> + Send;

    // === SECTORS ===
    fn insert_sectors(
        &self,
        sectors: Vec<TerritorySector>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn sectors(&self, session: SessionId)
        -> impl Future<Output = Result<Vec<TerritorySector>>> + Send;

    fn sectors_for_node(
        &self,
        node: NodeId,
    ) -> impl Future<Output = Result<Vec<TerritorySector>>> + Send;

    fn sectors_within_radius(
        &self,
        session: SessionId,
        center: Position,
        radius: f32,
    ) -> impl Future<Output = Result<Vec<TerritorySector>>> + Send;

    /// Re-own every sector controlled by `node`, restamping capture time
    fn reassign_sectors(
        &self,
        node: NodeId,
        owner: Option<PlayerId>,
        at: Timestamp,
    ) -> impl Future<Output = Result<usize>> + Send;

    // === ATTACKS ===
    fn insert_attack(&self, attack: Attack) -> impl Future<Output = Result<()>> + Send;

    fn attack(&self, id: AttackId) -> impl Future<Output = Result<Option<Attack>>> + Send;

    /// Non-terminal attacks of a session
    fn open_attacks(&self, session: SessionId) -> impl Future<Output = Result<Vec<Attack>>> + Send;

    /// Move an attack from `from` to `to` iff it is still in `from`.
    ///
    /// Returns `false` when the attack moved on already; errors with
    /// `InvalidTransition` when `from -> to` is not a lifecycle edge.
    fn transition_attack(
        &self,
        id: AttackId,
        from: AttackStatus,
        to: AttackStatus,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Apply an attack's node effect, write its record and move its status
    /// under one lock. A failure at any step leaves all three untouched, so
    /// the attack can be resolved again from scratch.
    fn commit_attack(&self, commit: AttackCommit)
        -> impl Future<Output = Result<CommitOutcome>> + Send;

    // === STRUCTURES ===
    fn insert_structure(&self, structure: Structure) -> impl Future<Output = Result<()>> + Send;

    fn structures(&self, session: SessionId)
        -> impl Future<Output = Result<Vec<Structure>>> + Send;

    fn structures_on(&self, node: NodeId) -> impl Future<Output = Result<Vec<Structure>>> + Send;

    // === ECONOMY ===
    fn insert_economy(&self, economy: PlayerEconomy) -> impl Future<Output = Result<()>> + Send;

    fn economy(
        &self,
        session: SessionId,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerEconomy>>> + Send;

    fn economies(&self, session: SessionId)
        -> impl Future<Output = Result<Vec<PlayerEconomy>>> + Send;

    /// Add a delta, clamping each balance to `caps`. Returns the new balance.
    fn apply_resource_delta(
        &self,
        session: SessionId,
        player: PlayerId,
        delta: Resources,
        caps: ResourceCaps,
    ) -> impl Future<Output = Result<Resources>> + Send;

    /// Atomically spend `cost`; `InsufficientResources` if not covered
    fn spend_resources(
        &self,
        session: SessionId,
        player: PlayerId,
        cost: Resources,
    ) -> impl Future<Output = Result<Resources>> + Send;

    // === BOTS ===
    fn insert_bot_profile(&self, profile: BotProfile) -> impl Future<Output = Result<()>> + Send;

    fn bot_profiles(&self, session: SessionId)
        -> impl Future<Output = Result<Vec<BotProfile>>> + Send;

    // === COMBAT RECORDS ===
    fn combat_records(&self, session: SessionId)
        -> impl Future<Output = Result<Vec<CombatRecord>>> + Send;

    /// The record committed when `attack` was resolved, if any
    fn combat_record_for_attack(
        &self,
        attack: AttackId,
    ) -> impl Future<Output = Result<Option<CombatRecord>>> + Send;
}
