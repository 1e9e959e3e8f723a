//! In-process store backed by `ahash` tables behind a single async lock
//!
//! Each method takes the lock once for its whole verify-and-mutate step,
//! which is what makes the contended operations atomic.

use ahash::AHashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;

use crate::core::error::{ConquestError, Result};
use crate::core::types::{
    AttackId, NodeId, PlayerId, Position, RecordId, SectorId, SessionId, StructureId, Tick,
    Timestamp,
};
use crate::spatial::within_radius;
use crate::store::{AttackCommit, CommitOutcome, NodeEffect, OwnerFilter, Store};
use crate::world::{
    Attack, AttackStatus, BotProfile, CombatRecord, GameSession, PlayerEconomy, ResourceCaps,
    Resources, SessionStatus, Structure, TerritoryNode, TerritorySector,
};

#[derive(Default)]
struct Tables {
    sessions: AHashMap<SessionId, GameSession>,
    nodes: AHashMap<NodeId, TerritoryNode>,
    sectors: AHashMap<SectorId, TerritorySector>,
    attacks: AHashMap<AttackId, Attack>,
    structures: AHashMap<StructureId, Structure>,
    economies: AHashMap<(SessionId, PlayerId), PlayerEconomy>,
    bots: AHashMap<(SessionId, PlayerId), BotProfile>,
    records: AHashMap<RecordId, CombatRecord>,
    record_order: Vec<RecordId>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    faults: Mutex<Vec<&'static str>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of the named operation fail with a transient error
    pub fn fail_next(&self, op: &'static str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(op);
        }
    }

    fn check_fault(&self, op: &'static str) -> Result<()> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| ConquestError::Store("fault table poisoned".into()))?;
        if let Some(idx) = faults.iter().position(|f| *f == op) {
            faults.remove(idx);
            return Err(ConquestError::Store(format!("injected failure in {}", op)));
        }
        Ok(())
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

impl Store for InMemoryStore {
    // === SESSIONS ===

    async fn insert_session(&self, session: GameSession) -> Result<()> {
        self.check_fault("insert_session")?;
        self.tables.write().await.sessions.insert(session.id, session);
        Ok(())
    }

    async fn session(&self, id: SessionId) -> Result<Option<GameSession>> {
        self.check_fault("session")?;
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn advance_session_tick(
        &self,
        id: SessionId,
        expected: Tick,
        now: Timestamp,
    ) -> Result<Option<Tick>> {
        self.check_fault("advance_session_tick")?;
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ConquestError::not_found("session", id))?;

        if session.status != SessionStatus::Active || session.tick != expected {
            return Ok(None);
        }
        session.tick += 1;
        session.last_tick_at = Some(now);
        Ok(Some(session.tick))
    }

    async fn set_session_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        winner: Option<PlayerId>,
    ) -> Result<()> {
        self.check_fault("set_session_status")?;
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ConquestError::not_found("session", id))?;
        session.status = status;
        session.winner = winner;
        Ok(())
    }

    // === NODES ===

    async fn insert_node(&self, node: TerritoryNode) -> Result<()> {
        self.check_fault("insert_node")?;
        self.tables.write().await.nodes.insert(node.id, node);
        Ok(())
    }

    async fn node(&self, id: NodeId) -> Result<Option<TerritoryNode>> {
        self.check_fault("node")?;
        Ok(self.tables.read().await.nodes.get(&id).cloned())
    }

    async fn nodes(&self, session: SessionId) -> Result<Vec<TerritoryNode>> {
        self.check_fault("nodes")?;
        let tables = self.tables.read().await;
        let nodes = tables
            .nodes
            .values()
            .filter(|n| n.session == session)
            .cloned()
            .collect();
        Ok(sorted_by(nodes, |n: &TerritoryNode| n.id))
    }

    async fn nodes_within_radius(
        &self,
        session: SessionId,
        center: Position,
        radius: f32,
        owner: OwnerFilter,
    ) -> Result<Vec<TerritoryNode>> {
        self.check_fault("nodes_within_radius")?;
        let tables = self.tables.read().await;
        let nodes = tables
            .nodes
            .values()
            .filter(|n| n.session == session)
            .filter(|n| owner.matches(n.owner))
            .filter(|n| within_radius(center, n.position, radius))
            .cloned()
            .collect();
        Ok(sorted_by(nodes, |n: &TerritoryNode| n.id))
    }

    async fn decrement_garrison(&self, node: NodeId, owner: PlayerId, amount: u32) -> Result<u32> {
        self.check_fault("decrement_garrison")?;
        let mut tables = self.tables.write().await;
        let n = tables
            .nodes
            .get_mut(&node)
            .ok_or_else(|| ConquestError::not_found("node", node))?;

        if n.owner != Some(owner) {
            return Err(ConquestError::AccessDenied {
                player: owner,
                node,
            });
        }
        if n.garrison < amount {
            return Err(ConquestError::InsufficientTroops {
                node,
                requested: amount,
                available: n.garrison,
            });
        }
        n.garrison -= amount;
        Ok(n.garrison)
    }

    async fn add_garrison_capped(
        &self,
        node: NodeId,
        owner: PlayerId,
        amount: u32,
        cap: u32,
    ) -> Result<Option<u32>> {
        self.check_fault("add_garrison_capped")?;
        let mut tables = self.tables.write().await;
        let n = tables
            .nodes
            .get_mut(&node)
            .ok_or_else(|| ConquestError::not_found("node", node))?;

        if n.owner != Some(owner) {
            return Ok(None);
        }
        n.garrison = n.garrison.saturating_add(amount).min(cap.max(n.garrison));
        Ok(Some(n.garrison))
    }

    async fn compare_and_set_garrison(&self, node: NodeId, expected: u32, new: u32) -> Result<bool> {
        self.check_fault("compare_and_set_garrison")?;
        let mut tables = self.tables.write().await;
        let n = tables
            .nodes
            .get_mut(&node)
            .ok_or_else(|| ConquestError::not_found("node", node))?;

        if n.garrison != expected {
            return Ok(false);
        }
        n.garrison = new;
        Ok(true)
    }

    // === SECTORS ===

    async fn insert_sectors(&self, sectors: Vec<TerritorySector>) -> Result<()> {
        self.check_fault("insert_sectors")?;
        let mut tables = self.tables.write().await;
        for sector in sectors {
            tables.sectors.insert(sector.id, sector);
        }
        Ok(())
    }

    async fn sectors(&self, session: SessionId) -> Result<Vec<TerritorySector>> {
        self.check_fault("sectors")?;
        let tables = self.tables.read().await;
        let sectors = tables
            .sectors
            .values()
            .filter(|s| s.session == session)
            .cloned()
            .collect();
        Ok(sorted_by(sectors, |s: &TerritorySector| s.id))
    }

    async fn sectors_for_node(&self, node: NodeId) -> Result<Vec<TerritorySector>> {
        self.check_fault("sectors_for_node")?;
        let tables = self.tables.read().await;
        let sectors = tables
            .sectors
            .values()
            .filter(|s| s.node == node)
            .cloned()
            .collect();
        Ok(sorted_by(sectors, |s: &TerritorySector| s.id))
    }

    async fn sectors_within_radius(
        &self,
        session: SessionId,
        center: Position,
        radius: f32,
    ) -> Result<Vec<TerritorySector>> {
        self.check_fault("sectors_within_radius")?;
        let tables = self.tables.read().await;
        let sectors = tables
            .sectors
            .values()
            .filter(|s| s.session == session)
            .filter(|s| within_radius(center, s.position, radius))
            .cloned()
            .collect();
        Ok(sorted_by(sectors, |s: &TerritorySector| s.id))
    }

    async fn reassign_sectors(
        &self,
        node: NodeId,
        owner: Option<PlayerId>,
        at: Timestamp,
    ) -> Result<usize> {
        self.check_fault("reassign_sectors")?;
        let mut tables = self.tables.write().await;
        let mut count = 0;
        for sector in tables.sectors.values_mut().filter(|s| s.node == node) {
            sector.owner = owner;
            sector.captured_at = at;
            count += 1;
        }
        Ok(count)
    }

    // === ATTACKS ===

    async fn insert_attack(&self, attack: Attack) -> Result<()> {
        self.check_fault("insert_attack")?;
        self.tables.write().await.attacks.insert(attack.id, attack);
        Ok(())
    }

    async fn attack(&self, id: AttackId) -> Result<Option<Attack>> {
        self.check_fault("attack")?;
        Ok(self.tables.read().await.attacks.get(&id).cloned())
    }

    async fn open_attacks(&self, session: SessionId) -> Result<Vec<Attack>> {
        self.check_fault("open_attacks")?;
        let tables = self.tables.read().await;
        let attacks = tables
            .attacks
            .values()
            .filter(|a| a.session == session && !a.status.is_terminal())
            .cloned()
            .collect();
        Ok(sorted_by(attacks, |a: &Attack| (a.arrives_at, a.id)))
    }

    async fn transition_attack(
        &self,
        id: AttackId,
        from: AttackStatus,
        to: AttackStatus,
    ) -> Result<bool> {
        self.check_fault("transition_attack")?;
        let next = from.transition(to)?;
        let mut tables = self.tables.write().await;
        let attack = tables
            .attacks
            .get_mut(&id)
            .ok_or_else(|| ConquestError::not_found("attack", id))?;

        if attack.status != from {
            return Ok(false);
        }
        attack.status = next;
        Ok(true)
    }

    async fn commit_attack(&self, commit: AttackCommit) -> Result<CommitOutcome> {
        self.check_fault("commit_attack")?;
        let next = commit.from.transition(commit.to)?;
        let mut tables = self.tables.write().await;

        let attack = tables
            .attacks
            .get(&commit.attack)
            .ok_or_else(|| ConquestError::not_found("attack", commit.attack))?;
        if attack.status != commit.from {
            return Ok(CommitOutcome::AttackMoved);
        }
        if let Some(effect) = &commit.effect {
            let node = tables
                .nodes
                .get(&effect.node())
                .ok_or_else(|| ConquestError::not_found("node", effect.node()))?;
            if !effect.holds(node) {
                return Ok(CommitOutcome::NodeChanged);
            }
        }

        // Each write can still fail; any failure here drops the whole commit
        if let Some(effect) = &commit.effect {
            self.check_fault(match effect {
                NodeEffect::AddCapped { .. } => "add_garrison_capped",
                NodeEffect::SetGarrison { .. } => "compare_and_set_garrison",
                NodeEffect::Capture { .. } => "capture_node",
            })?;
        }
        if commit.record.is_some() {
            self.check_fault("insert_combat_record")?;
        }
        self.check_fault("transition_attack")?;

        if let Some(effect) = &commit.effect {
            if let Some(node) = tables.nodes.get_mut(&effect.node()) {
                effect.apply(node);
            }
        }
        if let Some(record) = commit.record {
            let id = record.id;
            if tables.records.insert(id, record).is_none() {
                tables.record_order.push(id);
            }
        }
        if let Some(attack) = tables.attacks.get_mut(&commit.attack) {
            attack.status = next;
        }
        Ok(CommitOutcome::Committed)
    }

    // === STRUCTURES ===

    async fn insert_structure(&self, structure: Structure) -> Result<()> {
        self.check_fault("insert_structure")?;
        self.tables
            .write()
            .await
            .structures
            .insert(structure.id, structure);
        Ok(())
    }

    async fn structures(&self, session: SessionId) -> Result<Vec<Structure>> {
        self.check_fault("structures")?;
        let tables = self.tables.read().await;
        let structures = tables
            .structures
            .values()
            .filter(|s| {
                tables
                    .nodes
                    .get(&s.node)
                    .map(|n| n.session == session)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(sorted_by(structures, |s: &Structure| s.id))
    }

    async fn structures_on(&self, node: NodeId) -> Result<Vec<Structure>> {
        self.check_fault("structures_on")?;
        let tables = self.tables.read().await;
        let structures = tables
            .structures
            .values()
            .filter(|s| s.node == node)
            .cloned()
            .collect();
        Ok(sorted_by(structures, |s: &Structure| s.id))
    }

    // === ECONOMY ===

    async fn insert_economy(&self, economy: PlayerEconomy) -> Result<()> {
        self.check_fault("insert_economy")?;
        self.tables
            .write()
            .await
            .economies
            .insert((economy.session, economy.player), economy);
        Ok(())
    }

    async fn economy(&self, session: SessionId, player: PlayerId) -> Result<Option<PlayerEconomy>> {
        self.check_fault("economy")?;
        Ok(self
            .tables
            .read()
            .await
            .economies
            .get(&(session, player))
            .cloned())
    }

    async fn economies(&self, session: SessionId) -> Result<Vec<PlayerEconomy>> {
        self.check_fault("economies")?;
        let tables = self.tables.read().await;
        let economies = tables
            .economies
            .values()
            .filter(|e| e.session == session)
            .cloned()
            .collect();
        Ok(sorted_by(economies, |e: &PlayerEconomy| e.player))
    }

    async fn apply_resource_delta(
        &self,
        session: SessionId,
        player: PlayerId,
        delta: Resources,
        caps: ResourceCaps,
    ) -> Result<Resources> {
        self.check_fault("apply_resource_delta")?;
        let mut tables = self.tables.write().await;
        let economy = tables
            .economies
            .get_mut(&(session, player))
            .ok_or_else(|| ConquestError::not_found("economy", player))?;
        economy.credit(&delta, &caps);
        Ok(economy.balance)
    }

    async fn spend_resources(
        &self,
        session: SessionId,
        player: PlayerId,
        cost: Resources,
    ) -> Result<Resources> {
        self.check_fault("spend_resources")?;
        let mut tables = self.tables.write().await;
        let economy = tables
            .economies
            .get_mut(&(session, player))
            .ok_or_else(|| ConquestError::not_found("economy", player))?;

        if !economy.try_spend(&cost) {
            return Err(ConquestError::InsufficientResources {
                player,
                detail: format!("need {:?}, have {:?}", cost, economy.balance),
            });
        }
        Ok(economy.balance)
    }

    // === BOTS ===

    async fn insert_bot_profile(&self, profile: BotProfile) -> Result<()> {
        self.check_fault("insert_bot_profile")?;
        self.tables
            .write()
            .await
            .bots
            .insert((profile.session, profile.player), profile);
        Ok(())
    }

    async fn bot_profiles(&self, session: SessionId) -> Result<Vec<BotProfile>> {
        self.check_fault("bot_profiles")?;
        let tables = self.tables.read().await;
        let bots = tables
            .bots
            .values()
            .filter(|b| b.session == session)
            .cloned()
            .collect();
        Ok(sorted_by(bots, |b: &BotProfile| b.player))
    }

    // === COMBAT RECORDS ===

    async fn combat_records(&self, session: SessionId) -> Result<Vec<CombatRecord>> {
        self.check_fault("combat_records")?;
        let tables = self.tables.read().await;
        Ok(tables
            .record_order
            .iter()
            .filter_map(|id| tables.records.get(id))
            .filter(|r| r.session == session)
            .cloned()
            .collect())
    }

    async fn combat_record_for_attack(&self, attack: AttackId) -> Result<Option<CombatRecord>> {
        self.check_fault("combat_record_for_attack")?;
        let tables = self.tables.read().await;
        Ok(tables.records.values().find(|r| r.attack == attack).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    async fn store_with_node(garrison: u32) -> (InMemoryStore, PlayerId, NodeId) {
        let store = InMemoryStore::new();
        let session = SessionId::new();
        let player = PlayerId::new();
        let node = TerritoryNode::new(session, "home", Vec3::ZERO).with_owner(player, garrison);
        let id = node.id;
        store.insert_node(node).await.unwrap();
        (store, player, id)
    }

    #[tokio::test]
    async fn test_decrement_rejects_overdraw() {
        let (store, player, node) = store_with_node(10).await;

        assert_eq!(store.decrement_garrison(node, player, 6).await.unwrap(), 4);
        let err = store.decrement_garrison(node, player, 6).await.unwrap_err();
        assert!(matches!(
            err,
            ConquestError::InsufficientTroops {
                requested: 6,
                available: 4,
                ..
            }
        ));
        assert_eq!(store.node(node).await.unwrap().unwrap().garrison, 4);
    }

    #[tokio::test]
    async fn test_decrement_requires_ownership() {
        let (store, _player, node) = store_with_node(10).await;
        let err = store
            .decrement_garrison(node, PlayerId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ConquestError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_decrement_missing_node() {
        let store = InMemoryStore::new();
        let err = store
            .decrement_garrison(NodeId::new(), PlayerId::new(), 1)
            .await
            .unwrap_err();
        assert!(err.is_missing());
    }

    #[tokio::test]
    async fn test_add_garrison_caps_and_checks_owner() {
        let (store, player, node) = store_with_node(450).await;
        assert_eq!(
            store.add_garrison_capped(node, player, 100, 500).await.unwrap(),
            Some(500)
        );
        assert_eq!(
            store
                .add_garrison_capped(node, PlayerId::new(), 100, 500)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_transition_attack_is_conditional() {
        let store = InMemoryStore::new();
        let attack = Attack {
            id: AttackId::new(),
            session: SessionId::new(),
            attacker: PlayerId::new(),
            source: NodeId::new(),
            target: NodeId::new(),
            troops: 5,
            launched_at: Timestamp(0),
            arrives_at: Timestamp(10),
            status: AttackStatus::InTransit,
        };
        let id = attack.id;
        store.insert_attack(attack).await.unwrap();

        assert!(store
            .transition_attack(id, AttackStatus::InTransit, AttackStatus::Arrived)
            .await
            .unwrap());
        // Second caller loses the race
        assert!(!store
            .transition_attack(id, AttackStatus::InTransit, AttackStatus::Arrived)
            .await
            .unwrap());
        // Not a lifecycle edge
        assert!(store
            .transition_attack(id, AttackStatus::Arrived, AttackStatus::InTransit)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_commit_attack_is_all_or_nothing() {
        use crate::world::{CombatOutcome, TacticalFlags, Terrain};

        let store = InMemoryStore::new();
        let session = SessionId::new();
        let attacker = PlayerId::new();
        let mut target = TerritoryNode::new(session, "Rigel", Vec3::ZERO);
        target.garrison = 40;
        let target_id = target.id;
        store.insert_node(target).await.unwrap();
        let attack = Attack {
            id: AttackId::new(),
            session,
            attacker,
            source: NodeId::new(),
            target: target_id,
            troops: 100,
            launched_at: Timestamp(0),
            arrives_at: Timestamp(10),
            status: AttackStatus::InTransit,
        };
        let attack_id = attack.id;
        store.insert_attack(attack).await.unwrap();

        let commit = AttackCommit {
            attack: attack_id,
            from: AttackStatus::InTransit,
            to: AttackStatus::Arrived,
            effect: Some(NodeEffect::Capture {
                node: target_id,
                expected_owner: None,
                new_owner: attacker,
                garrison: 88,
            }),
            record: Some(CombatRecord {
                id: RecordId::new(),
                session,
                attack: attack_id,
                tick: 1,
                at: Timestamp(10),
                attacker,
                defender: None,
                source: NodeId::new(),
                target: target_id,
                attacker_force: 100,
                defender_force: 40,
                attacker_losses: 12,
                defender_losses: 40,
                attacker_survivors: 88,
                defender_survivors: 0,
                outcome: CombatOutcome::AttackerVictory,
                terrain: Terrain::Open,
                flags: TacticalFlags::default(),
            }),
        };

        store.fail_next("insert_combat_record");
        assert!(store.commit_attack(commit.clone()).await.unwrap_err().is_transient());
        let node = store.node(target_id).await.unwrap().unwrap();
        assert_eq!((node.owner, node.garrison), (None, 40));
        assert!(store.combat_record_for_attack(attack_id).await.unwrap().is_none());
        assert_eq!(
            store.attack(attack_id).await.unwrap().unwrap().status,
            AttackStatus::InTransit
        );

        assert_eq!(
            store.commit_attack(commit.clone()).await.unwrap(),
            CommitOutcome::Committed
        );
        let node = store.node(target_id).await.unwrap().unwrap();
        assert_eq!((node.owner, node.garrison), (Some(attacker), 88));
        assert!(store.combat_record_for_attack(attack_id).await.unwrap().is_some());

        // Replaying the same commit finds the attack already moved on
        assert_eq!(
            store.commit_attack(commit).await.unwrap(),
            CommitOutcome::AttackMoved
        );
        assert_eq!(store.combat_records(session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advance_tick_is_compare_and_swap() {
        let store = InMemoryStore::new();
        let mut session = GameSession::new(SessionId::new());
        session.status = SessionStatus::Active;
        let id = session.id;
        store.insert_session(session).await.unwrap();

        assert_eq!(store.advance_session_tick(id, 0, Timestamp(5)).await.unwrap(), Some(1));
        assert_eq!(store.advance_session_tick(id, 0, Timestamp(6)).await.unwrap(), None);

        let s = store.session(id).await.unwrap().unwrap();
        assert_eq!(s.tick, 1);
        assert_eq!(s.last_tick_at, Some(Timestamp(5)));
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let store = InMemoryStore::new();
        store.fail_next("nodes");
        let session = SessionId::new();
        assert!(store.nodes(session).await.unwrap_err().is_transient());
        assert!(store.nodes(session).await.is_ok());
    }

    #[tokio::test]
    async fn test_spend_resources_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let session = SessionId::new();
        let player = PlayerId::new();
        store
            .insert_economy(PlayerEconomy::new(session, player, Resources::new(100, 0, 0)))
            .await
            .unwrap();

        let err = store
            .spend_resources(session, player, Resources::new(50, 10, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConquestError::InsufficientResources { .. }));
        assert_eq!(
            store.spend_resources(session, player, Resources::credits(60)).await.unwrap(),
            Resources::credits(40)
        );
    }
}
