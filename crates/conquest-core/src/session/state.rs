use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use conquest_protocol::{
    BuildingKind, Buildings, PlayerId, PlayerView, RegionId, RegionView, SessionId,
    SessionSnapshot, SessionStatus,
};

use super::{ActionError, Player};
use crate::combat::{self, BattleOdds, BattleOutcome};
use crate::economy;
use crate::map::MapGraph;
use crate::rng::{shuffle, RandomSource};
use crate::rules::GameRules;

/// Mutable half of a region. Static attributes stay in the shared [`MapGraph`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionState {
    pub owner: Option<PlayerId>,
    pub soldiers: u32,
    pub buildings: Buildings,
}

/// Outcome of an accepted attack.
#[derive(Clone, Debug, PartialEq)]
pub struct AttackReport {
    pub captured: bool,
    /// Previous owner of the target region.
    pub defender: Option<PlayerId>,
    pub message: String,
    pub battle: BattleOutcome,
}

/// Outcome of an accepted build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildReport {
    pub kind: BuildingKind,
    pub cost: u32,
    pub coins_left: u32,
    pub message: String,
}

/// Authoritative state of one match.
///
/// Every method runs to completion without suspending; callers serialize access (one lock per
/// session). A method that returns `Err` has not changed anything.
pub struct SessionState {
    id: SessionId,
    status: SessionStatus,
    map: Arc<MapGraph>,
    rules: GameRules,
    rng: Box<dyn RandomSource>,
    players: BTreeMap<PlayerId, Player>,
    regions: BTreeMap<RegionId, RegionState>,
    turn_order: Vec<PlayerId>,
    /// Turn hand-offs since start; the current player is `turn_order[current_turn % len]`.
    current_turn: u32,
    winner: Option<PlayerId>,
    created_at: Instant,
    last_activity: Instant,
    last_decay: Instant,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("players", &self.players.len())
            .field("current_turn", &self.current_turn)
            .field("winner", &self.winner)
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// New waiting session with the host as player 0.
    pub fn new(
        id: SessionId,
        host_name: impl Into<String>,
        map: Arc<MapGraph>,
        rules: GameRules,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let now = Instant::now();
        let regions = map
            .region_ids()
            .map(|id| (id.clone(), RegionState::default()))
            .collect();
        let host_id = PlayerId(0);
        let host = Player::new(host_id, host_name, rules.starting_coins(), true);

        Self {
            id,
            status: SessionStatus::Waiting,
            map,
            rules,
            rng,
            players: BTreeMap::from([(host_id, host)]),
            regions,
            turn_order: Vec::new(),
            current_turn: 0,
            winner: None,
            created_at: now,
            last_activity: now,
            last_decay: now,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn map(&self) -> &MapGraph {
        &self.map
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn region(&self, id: &RegionId) -> Option<&RegionState> {
        self.regions.get(id)
    }

    pub fn turn_order(&self) -> &[PlayerId] {
        &self.turn_order
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// No action for longer than `timeout` as of `now`.
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    /// Whose turn it is. `None` unless the match is being played.
    pub fn current_player(&self) -> Option<PlayerId> {
        if self.status != SessionStatus::Playing || self.turn_order.is_empty() {
            return None;
        }
        let index = self.current_turn as usize % self.turn_order.len();
        Some(self.turn_order[index])
    }

    pub fn join(&mut self, name: impl Into<String>) -> Result<PlayerId, ActionError> {
        let max = self.rules.max_players.min(GameRules::MAX_PLAYERS_LIMIT);
        if self.players.len() >= usize::from(max) {
            return Err(ActionError::Full { max });
        }
        if self.status != SessionStatus::Waiting {
            return Err(ActionError::AlreadyStarted);
        }

        let id = PlayerId(self.players.len() as u8);
        let player = Player::new(id, name, self.rules.starting_coins(), false);
        self.players.insert(id, player);
        self.last_activity = Instant::now();
        Ok(id)
    }

    /// Shuffle the turn order, deal every region out and begin play.
    pub fn start(&mut self, requester: PlayerId) -> Result<(), ActionError> {
        if self.status != SessionStatus::Waiting {
            return Err(ActionError::AlreadyStarted);
        }
        if !self.players.get(&requester).is_some_and(|p| p.is_host) {
            return Err(ActionError::NotHost);
        }
        if self.players.len() < usize::from(self.rules.min_players) {
            return Err(ActionError::TooFewPlayers {
                have: self.players.len(),
                need: self.rules.min_players,
            });
        }

        let mut order: Vec<PlayerId> = self.players.keys().copied().collect();
        shuffle(self.rng.as_mut(), &mut order);
        let deal = self.map.partition(order.len(), self.rng.as_mut());

        for (player_id, share) in order.iter().zip(deal) {
            for region_id in share {
                if let Some(region) = self.regions.get_mut(&region_id) {
                    region.owner = Some(*player_id);
                    region.soldiers = self.rules.initial_garrison;
                }
                if let Some(player) = self.players.get_mut(player_id) {
                    player.gain_region(region_id);
                }
            }
        }

        let now = Instant::now();
        self.turn_order = order;
        self.current_turn = 0;
        self.status = SessionStatus::Playing;
        self.last_decay = now;
        self.last_activity = now;
        // the opening player's turn starts here, not in advance_turn
        if self.rules.turn_income {
            if let Some(first) = self.current_player() {
                self.pay_turn_economy(first);
            }
        }
        Ok(())
    }

    fn ensure_turn(&self, player: PlayerId) -> Result<(), ActionError> {
        if self.status != SessionStatus::Playing {
            return Err(ActionError::NotPlaying);
        }
        if self.current_player() != Some(player) {
            return Err(ActionError::NotYourTurn);
        }
        Ok(())
    }

    fn region_name(&self, id: &RegionId) -> String {
        self.map
            .region(id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Send `soldiers` from `from` into neighboring `to`, resolve the battle and pass the turn.
    ///
    /// The attacking soldiers leave `from` whatever the outcome; at least one soldier must stay
    /// behind.
    pub fn attack(
        &mut self,
        player: PlayerId,
        from: &RegionId,
        to: &RegionId,
        soldiers: u32,
    ) -> Result<AttackReport, ActionError> {
        self.ensure_turn(player)?;

        let source = self
            .regions
            .get(from)
            .ok_or_else(|| ActionError::InvalidRegion(from.clone()))?;
        let target = self
            .regions
            .get(to)
            .ok_or_else(|| ActionError::InvalidRegion(to.clone()))?;

        if source.owner != Some(player) {
            return Err(ActionError::NotOwner(from.clone()));
        }
        if soldiers == 0 {
            return Err(ActionError::InvalidSoldierCount);
        }
        if source.soldiers <= soldiers {
            return Err(ActionError::InsufficientSoldiers {
                available: source.soldiers,
                requested: soldiers,
            });
        }
        if !self.map.are_neighbors(from, to) {
            return Err(ActionError::NotNeighbors {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if target.owner == Some(player) {
            return Err(ActionError::OwnTerritory(to.clone()));
        }

        let attacker_buildings = source.buildings;
        let defender_buildings = target.buildings;
        let defending = target.soldiers;
        let defender = target.owner;

        let battle = combat::resolve(
            soldiers,
            defending,
            &attacker_buildings,
            &defender_buildings,
            self.rules.battle_randomness,
            self.rng.as_mut(),
        );

        if let Some(source) = self.regions.get_mut(from) {
            source.soldiers -= soldiers;
        }

        let target_name = self.region_name(to);
        let message = if battle.attacker_wins {
            if let Some(target) = self.regions.get_mut(to) {
                target.owner = Some(player);
                target.soldiers = battle.remaining_attackers;
            }
            if let Some(previous) = defender.and_then(|id| self.players.get_mut(&id)) {
                previous.lose_region(to);
            }
            if let Some(attacker) = self.players.get_mut(&player) {
                attacker.gain_region(to.clone());
            }
            format!(
                "{target_name} captured, {} soldiers hold it",
                battle.remaining_attackers
            )
        } else {
            if let Some(target) = self.regions.get_mut(to) {
                target.soldiers = battle.remaining_defenders;
            }
            format!(
                "attack on {target_name} repelled, {} defenders remain",
                battle.remaining_defenders
            )
        };

        self.advance_turn();

        Ok(AttackReport {
            captured: battle.attacker_wins,
            defender,
            message,
            battle,
        })
    }

    /// Buy one building in an owned region. Passes the turn only if the rules say so.
    pub fn build(
        &mut self,
        player: PlayerId,
        region_id: &RegionId,
        kind: BuildingKind,
    ) -> Result<BuildReport, ActionError> {
        self.ensure_turn(player)?;

        let region = self
            .regions
            .get(region_id)
            .ok_or_else(|| ActionError::InvalidRegion(region_id.clone()))?;
        if region.owner != Some(player) {
            return Err(ActionError::NotOwner(region_id.clone()));
        }
        let cost = economy::building_cost(kind, self.rules.cost_profile);
        let have = self.players.get(&player).map_or(0, |p| p.coins);
        if have < cost {
            return Err(ActionError::InsufficientCoins { have, need: cost });
        }

        let coins_left = have - cost;
        if let Some(p) = self.players.get_mut(&player) {
            p.coins = coins_left;
        }
        if let Some(region) = self.regions.get_mut(region_id) {
            region.buildings.add(kind);
        }
        let message = format!("{kind} built in {}", self.region_name(region_id));

        if self.rules.build_ends_turn {
            self.advance_turn();
        } else {
            self.last_activity = Instant::now();
        }

        Ok(BuildReport {
            kind,
            cost,
            coins_left,
            message,
        })
    }

    /// Current player passes without attacking.
    pub fn end_turn(&mut self, player: PlayerId) -> Result<(), ActionError> {
        self.ensure_turn(player)?;
        self.advance_turn();
        Ok(())
    }

    /// Hand the turn to the next player who can still act, then pay their turn income.
    ///
    /// Players who are disconnected or hold no regions are skipped, at most one full cycle.
    pub fn advance_turn(&mut self) {
        self.last_activity = Instant::now();
        if self.turn_order.is_empty() {
            return;
        }

        self.current_turn += 1;
        let any_active = self
            .turn_order
            .iter()
            .any(|id| self.players.get(id).is_some_and(Player::is_active));
        if any_active {
            for _ in 0..self.turn_order.len() {
                let active = self
                    .current_player()
                    .and_then(|id| self.players.get(&id))
                    .is_some_and(Player::is_active);
                if active {
                    break;
                }
                self.current_turn += 1;
            }
        }

        if self.rules.turn_income {
            if let Some(id) = self.current_player() {
                self.pay_turn_economy(id);
            }
        }
    }

    fn pay_turn_economy(&mut self, id: PlayerId) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let owned: Vec<&mut RegionState> = self
            .regions
            .iter_mut()
            .filter(|(rid, _)| player.owns(rid))
            .map(|(_, region)| region)
            .collect();

        let buildings: Buildings = owned.iter().map(|r| r.buildings).sum();
        player.coins = player
            .coins
            .saturating_add(economy::income(owned.len(), &buildings));
        for region in owned {
            region.soldiers = region
                .soldiers
                .saturating_add(economy::soldier_production(&region.buildings));
        }
    }

    /// Shrink every garrison if a full decay interval has passed since the last tick.
    ///
    /// Returns whether decay was applied. No-op outside of play.
    pub fn decay_tick(&mut self, now: Instant) -> bool {
        if self.status != SessionStatus::Playing {
            return false;
        }
        if now.saturating_duration_since(self.last_decay) < self.rules.decay_interval() {
            return false;
        }
        for region in self.regions.values_mut() {
            region.soldiers = economy::apply_decay(region.soldiers);
        }
        self.last_decay = now;
        true
    }

    /// Winner of the match as it stands, if any. Does not end the match.
    ///
    /// The last connected player wins; otherwise anyone holding more than
    /// `rules.victory_share` of all regions.
    pub fn check_victory(&self) -> Option<PlayerId> {
        if self.status != SessionStatus::Playing {
            return None;
        }
        let mut connected = self.players.values().filter(|p| p.connected);
        if let (Some(only), None) = (connected.next(), connected.next()) {
            return Some(only.id);
        }

        let threshold = self.regions.len() as f64 * self.rules.victory_share;
        self.players
            .values()
            .find(|p| p.regions.len() as f64 > threshold)
            .map(|p| p.id)
    }

    /// End the match. Only a match in play can finish.
    pub fn finish(&mut self, winner: Option<PlayerId>) {
        if self.status == SessionStatus::Playing {
            self.status = SessionStatus::Finished;
            self.winner = winner;
            self.last_activity = Instant::now();
        }
    }

    /// Mark a player as gone. Their regions stay; their turns are skipped until they return.
    pub fn disconnect(&mut self, id: PlayerId) -> Result<(), ActionError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(ActionError::PlayerNotFound(id))?;
        player.connected = false;

        if self.current_player() == Some(id) {
            self.advance_turn();
        } else {
            self.last_activity = Instant::now();
        }
        Ok(())
    }

    pub fn reconnect(&mut self, id: PlayerId) -> Result<(), ActionError> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(ActionError::PlayerNotFound(id))?;
        player.connected = true;
        self.last_activity = Instant::now();
        Ok(())
    }

    /// Regions bordering `player`'s territory that someone else holds, most valuable first.
    pub fn suggest_targets(
        &self,
        player: PlayerId,
        limit: usize,
    ) -> Result<Vec<RegionId>, ActionError> {
        let owner = self
            .players
            .get(&player)
            .ok_or(ActionError::PlayerNotFound(player))?;

        let mut candidates: Vec<(&RegionId, u32)> = Vec::new();
        for owned in &owner.regions {
            for neighbor in self.map.neighbors(owned) {
                if owner.owns(neighbor) || candidates.iter().any(|(id, _)| *id == neighbor) {
                    continue;
                }
                if let Some(region) = self.regions.get(neighbor) {
                    let value = economy::region_value(region.soldiers, &region.buildings);
                    candidates.push((neighbor, value));
                }
            }
        }

        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    /// Estimate sending `attacking` soldiers against `target`'s current garrison.
    pub fn battle_odds(
        &mut self,
        attacking: u32,
        target: &RegionId,
        simulations: u32,
    ) -> Result<BattleOdds, ActionError> {
        let defending = self
            .regions
            .get(target)
            .ok_or_else(|| ActionError::InvalidRegion(target.clone()))?
            .soldiers;
        Ok(combat::simulate(
            attacking,
            defending,
            simulations,
            self.rules.battle_randomness,
            self.rng.as_mut(),
        ))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let players = self
            .players
            .values()
            .map(|p| {
                let soldiers = p
                    .regions
                    .iter()
                    .filter_map(|id| self.regions.get(id))
                    .fold(0u32, |total, r| total.saturating_add(r.soldiers));
                let view = PlayerView {
                    name: p.name.clone(),
                    color: p.color.clone(),
                    coins: p.coins,
                    soldiers,
                    regions: p.regions.clone(),
                    connected: p.connected,
                    is_host: p.is_host,
                };
                (p.id, view)
            })
            .collect();

        let regions = self
            .regions
            .iter()
            .map(|(id, r)| {
                let def = self.map.region(id);
                let view = RegionView {
                    name: def.map(|d| d.name.clone()).unwrap_or_else(|| id.to_string()),
                    position: def.map(|d| d.position).unwrap_or_default(),
                    owner: r.owner,
                    soldiers: r.soldiers,
                    buildings: r.buildings,
                };
                (id.clone(), view)
            })
            .collect();

        SessionSnapshot {
            session_id: self.id.clone(),
            status: self.status,
            players,
            regions,
            current_player: self.current_player(),
            turn_number: self.current_turn + 1,
            turn_order: self.turn_order.clone(),
            winner: self.winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::tests::line_map;
    use crate::rng::ScriptedRng;

    const AVA: PlayerId = PlayerId(0);
    const BEN: PlayerId = PlayerId(1);

    fn rid(id: &str) -> RegionId {
        RegionId::from(id)
    }

    fn session_with(rules: GameRules) -> SessionState {
        SessionState::new(
            SessionId::new("000001"),
            "Ava",
            Arc::new(line_map()),
            rules,
            Box::new(ScriptedRng::constant(0.0)),
        )
    }

    fn calm_rules() -> GameRules {
        GameRules {
            battle_randomness: 0.0,
            ..GameRules::default()
        }
    }

    fn started() -> SessionState {
        let mut s = session_with(calm_rules());
        s.join("Ben").unwrap();
        s.start(AVA).unwrap();
        s
    }

    /// Replace the dealt map with a fixed layout; Ava moves first and nobody has been paid yet.
    fn arrange(s: &mut SessionState, layout: &[(&str, PlayerId, u32)]) {
        for region in s.regions.values_mut() {
            *region = RegionState::default();
        }
        let coins = s.rules.starting_coins();
        for player in s.players.values_mut() {
            player.regions.clear();
            player.coins = coins;
        }
        for (id, owner, soldiers) in layout {
            let region = s.regions.get_mut(&rid(id)).unwrap();
            region.owner = Some(*owner);
            region.soldiers = *soldiers;
            s.players.get_mut(owner).unwrap().gain_region(rid(id));
        }
        s.turn_order = vec![AVA, BEN];
        s.current_turn = 0;
    }

    /// a(Ava 12) - b(Ben 3) - c(Ben 10) - d(Ava 10), e(Ava 10) isolated.
    fn duel() -> SessionState {
        let mut s = started();
        arrange(
            &mut s,
            &[
                ("a", AVA, 12),
                ("b", BEN, 3),
                ("c", BEN, 10),
                ("d", AVA, 10),
                ("e", AVA, 10),
            ],
        );
        s
    }

    #[test]
    fn new_session_waits_with_host() {
        let s = session_with(GameRules::default());
        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::Waiting);
        assert_eq!(snap.players.len(), 1);
        assert!(snap.players[&AVA].is_host);
        assert_eq!(snap.players[&AVA].coins, 1000);
        assert_eq!(snap.regions.len(), 5);
        assert!(snap.regions.values().all(|r| r.owner.is_none()));
        assert_eq!(snap.current_player, None);
        assert_eq!(snap.turn_number, 1);
    }

    #[test]
    fn join_respects_capacity_and_status() {
        let mut s = session_with(GameRules {
            max_players: 2,
            ..GameRules::default()
        });
        assert_eq!(s.join("Ben").unwrap(), BEN);
        assert_eq!(s.player(BEN).unwrap().color, "#00FF00");
        assert_eq!(s.join("Cy"), Err(ActionError::Full { max: 2 }));

        let mut s = started();
        assert_eq!(s.join("Cy"), Err(ActionError::AlreadyStarted));
    }

    #[test]
    fn start_checks_host_and_headcount() {
        let mut s = session_with(GameRules::default());
        assert_eq!(
            s.start(AVA),
            Err(ActionError::TooFewPlayers { have: 1, need: 2 })
        );
        s.join("Ben").unwrap();
        assert_eq!(s.start(BEN), Err(ActionError::NotHost));
        assert_eq!(s.status(), SessionStatus::Waiting);

        s.start(AVA).unwrap();
        assert_eq!(s.start(AVA), Err(ActionError::AlreadyStarted));
    }

    #[test]
    fn start_deals_every_region_once() {
        let s = started();
        let snap = s.snapshot();
        assert_eq!(snap.status, SessionStatus::Playing);
        assert_eq!(snap.turn_order.len(), 2);
        assert!(snap.current_player.is_some());

        let total: usize = snap.players.values().map(|p| p.regions.len()).sum();
        assert_eq!(total, 5);
        assert_eq!(snap.owned_count(AVA) + snap.owned_count(BEN), 5);
        for (id, region) in &snap.regions {
            assert_eq!(region.soldiers, 10);
            let owner = region.owner.unwrap();
            assert!(snap.players[&owner].regions.contains(id));
        }
        // 5 regions over 2 players: 2 and 3
        let mut sizes: Vec<usize> = snap.players.values().map(|p| p.regions.len()).collect();
        sizes.sort();
        assert_eq!(sizes, vec![2, 3]);
    }

    #[test]
    fn attack_captures_weak_neighbor() {
        let mut s = duel();
        let report = s.attack(AVA, &rid("a"), &rid("b"), 10).unwrap();

        assert!(report.captured);
        assert_eq!(report.defender, Some(BEN));
        let a = s.region(&rid("a")).unwrap();
        let b = s.region(&rid("b")).unwrap();
        assert_eq!(a.soldiers, 2);
        assert_eq!(b.owner, Some(AVA));
        // 10 vs 3 at r = 0: no attacker casualties, survivors halved
        assert_eq!(b.soldiers, 5);
        assert!(s.player(AVA).unwrap().owns(&rid("b")));
        assert!(!s.player(BEN).unwrap().owns(&rid("b")));

        // turn passed to Ben, who collected income for one region
        assert_eq!(s.current_player(), Some(BEN));
        assert_eq!(s.player(BEN).unwrap().coins, 1010);
        assert_eq!(s.check_victory(), Some(AVA));
    }

    #[test]
    fn repelled_attack_still_costs_soldiers() {
        let mut s = duel();
        arrange(&mut s, &[("a", AVA, 5), ("b", BEN, 10), ("c", BEN, 10)]);
        let report = s.attack(AVA, &rid("a"), &rid("b"), 4).unwrap();

        assert!(!report.captured);
        assert!(report.message.contains("repelled"));
        assert_eq!(s.region(&rid("a")).unwrap().soldiers, 1);
        let b = s.region(&rid("b")).unwrap();
        assert_eq!(b.owner, Some(BEN));
        assert_eq!(b.soldiers, 9);
        assert_eq!(s.current_player(), Some(BEN));
    }

    #[test]
    fn rejected_attacks_change_nothing() {
        let mut s = duel();
        let before = s.snapshot();

        let cases = [
            (BEN, "b", "a", 1, ActionError::NotYourTurn),
            (AVA, "zzz", "b", 1, ActionError::InvalidRegion(rid("zzz"))),
            (AVA, "a", "zzz", 1, ActionError::InvalidRegion(rid("zzz"))),
            (AVA, "c", "b", 1, ActionError::NotOwner(rid("c"))),
            (AVA, "a", "b", 0, ActionError::InvalidSoldierCount),
            (
                AVA,
                "a",
                "b",
                12,
                ActionError::InsufficientSoldiers {
                    available: 12,
                    requested: 12,
                },
            ),
            (
                AVA,
                "a",
                "c",
                11,
                ActionError::NotNeighbors {
                    from: rid("a"),
                    to: rid("c"),
                },
            ),
        ];
        for (player, from, to, soldiers, expected) in cases {
            assert_eq!(s.attack(player, &rid(from), &rid(to), soldiers), Err(expected));
            assert_eq!(s.snapshot(), before);
        }
    }

    #[test]
    fn cannot_attack_own_region() {
        let mut s = duel();
        s.attack(AVA, &rid("a"), &rid("b"), 10).unwrap();
        s.end_turn(BEN).unwrap();
        assert_eq!(
            s.attack(AVA, &rid("b"), &rid("a"), 1),
            Err(ActionError::OwnTerritory(rid("a")))
        );
    }

    #[test]
    fn actions_require_play() {
        let mut s = session_with(GameRules::default());
        assert_eq!(
            s.attack(AVA, &rid("a"), &rid("b"), 1),
            Err(ActionError::NotPlaying)
        );
        assert_eq!(
            s.build(AVA, &rid("a"), BuildingKind::Bank),
            Err(ActionError::NotPlaying)
        );
        assert_eq!(s.end_turn(AVA), Err(ActionError::NotPlaying));
    }

    #[test]
    fn build_spends_coins_without_passing_turn() {
        let mut s = duel();
        let report = s.build(AVA, &rid("a"), BuildingKind::Barracks).unwrap();
        assert_eq!(report.cost, 200);
        assert_eq!(report.coins_left, 800);
        assert_eq!(s.region(&rid("a")).unwrap().buildings.barracks, 1);
        assert_eq!(s.current_player(), Some(AVA));

        s.build(AVA, &rid("d"), BuildingKind::Factory).unwrap();
        assert_eq!(
            s.build(AVA, &rid("d"), BuildingKind::Factory),
            Err(ActionError::InsufficientCoins {
                have: 300,
                need: 500
            })
        );
        assert_eq!(
            s.build(AVA, &rid("b"), BuildingKind::Bank),
            Err(ActionError::NotOwner(rid("b")))
        );
        assert_eq!(
            s.build(BEN, &rid("b"), BuildingKind::Bank),
            Err(ActionError::NotYourTurn)
        );
    }

    #[test]
    fn build_can_be_configured_to_end_turn() {
        let mut s = duel();
        s.rules.build_ends_turn = true;
        s.build(AVA, &rid("a"), BuildingKind::Bank).unwrap();
        assert_eq!(s.current_player(), Some(BEN));
    }

    #[test]
    fn turn_start_pays_income_and_barracks() {
        let mut s = duel();
        s.build(AVA, &rid("a"), BuildingKind::Barracks).unwrap();
        s.end_turn(AVA).unwrap();
        s.end_turn(BEN).unwrap();

        // three regions plus one barracks: 30 coins, +5 soldiers in a
        assert_eq!(s.player(AVA).unwrap().coins, 800 + 30);
        assert_eq!(s.region(&rid("a")).unwrap().soldiers, 17);
        assert_eq!(s.region(&rid("d")).unwrap().soldiers, 10);
        assert_eq!(s.snapshot().turn_number, 3);
    }

    #[test]
    fn opening_player_is_paid_at_start() {
        let s = started();
        let first = s.current_player().unwrap();
        let other = if first == AVA { BEN } else { AVA };
        let owned = s.player(first).unwrap().regions.len() as u32;
        assert_eq!(s.player(first).unwrap().coins, 1000 + 10 * owned);
        assert_eq!(s.player(other).unwrap().coins, 1000);

        let mut s = session_with(GameRules {
            turn_income: false,
            ..calm_rules()
        });
        s.join("Ben").unwrap();
        s.start(AVA).unwrap();
        assert_eq!(s.player(AVA).unwrap().coins, 1000);
        assert_eq!(s.player(BEN).unwrap().coins, 1000);
    }

    #[test]
    fn barracks_production_saturates() {
        let mut s = duel();
        let a = s.regions.get_mut(&rid("a")).unwrap();
        a.soldiers = u32::MAX - 1;
        a.buildings.barracks = 1;
        s.end_turn(AVA).unwrap();
        s.end_turn(BEN).unwrap();

        assert_eq!(s.region(&rid("a")).unwrap().soldiers, u32::MAX);
        assert_eq!(s.snapshot().players[&AVA].soldiers, u32::MAX);
    }

    #[test]
    fn turn_income_can_be_disabled() {
        let mut s = duel();
        s.rules.turn_income = false;
        s.end_turn(AVA).unwrap();
        assert_eq!(s.player(BEN).unwrap().coins, 1000);
    }

    #[test]
    fn disconnected_players_are_skipped() {
        let mut s = duel();
        s.disconnect(BEN).unwrap();
        assert_eq!(s.current_player(), Some(AVA));
        s.end_turn(AVA).unwrap();
        assert_eq!(s.current_player(), Some(AVA));
        assert_eq!(s.snapshot().turn_number, 3);

        s.reconnect(BEN).unwrap();
        s.end_turn(AVA).unwrap();
        assert_eq!(s.current_player(), Some(BEN));
    }

    #[test]
    fn disconnecting_current_player_passes_turn() {
        let mut s = duel();
        s.disconnect(AVA).unwrap();
        assert_eq!(s.current_player(), Some(BEN));
        assert!(!s.snapshot().players[&AVA].connected);
        // regions are kept
        assert_eq!(s.player(AVA).unwrap().regions.len(), 3);
        assert_eq!(s.disconnect(PlayerId(9)), Err(ActionError::PlayerNotFound(PlayerId(9))));
    }

    #[test]
    fn players_without_regions_are_skipped() {
        let mut s = duel();
        arrange(&mut s, &[("a", AVA, 12), ("b", AVA, 3)]);
        s.end_turn(AVA).unwrap();
        assert_eq!(s.current_player(), Some(AVA));
    }

    #[test]
    fn decay_waits_for_full_interval() {
        let mut s = started();
        let now = Instant::now();
        assert!(!s.decay_tick(now));

        let later = now + Duration::from_secs(600);
        assert!(s.decay_tick(later));
        assert!(s.regions.values().all(|r| r.soldiers == 9));

        assert!(!s.decay_tick(later + Duration::from_secs(599)));
        assert!(s.regions.values().all(|r| r.soldiers == 9));
        assert!(s.decay_tick(later + Duration::from_secs(600)));
        assert!(s.regions.values().all(|r| r.soldiers == 8));
    }

    #[test]
    fn decay_only_while_playing() {
        let mut s = session_with(GameRules::default());
        assert!(!s.decay_tick(Instant::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn victory_by_share_or_last_connected() {
        let mut s = duel();
        assert_eq!(s.check_victory(), None);

        s.disconnect(BEN).unwrap();
        assert_eq!(s.check_victory(), Some(AVA));
        s.reconnect(BEN).unwrap();

        // 3 of 5 is exactly 60%, not more
        assert_eq!(s.check_victory(), None);
        arrange(&mut s, &[("a", AVA, 1), ("b", AVA, 1), ("c", AVA, 1), ("d", AVA, 1), ("e", BEN, 1)]);
        assert_eq!(s.check_victory(), Some(AVA));

        s.finish(Some(AVA));
        assert_eq!(s.status(), SessionStatus::Finished);
        assert_eq!(s.snapshot().winner, Some(AVA));
        assert_eq!(s.check_victory(), None);
        assert_eq!(s.end_turn(AVA), Err(ActionError::NotPlaying));
    }

    #[test]
    fn finish_needs_a_running_match() {
        let mut s = session_with(GameRules::default());
        s.finish(Some(AVA));
        assert_eq!(s.status(), SessionStatus::Waiting);
    }

    #[test]
    fn targets_ranked_by_value() {
        let s = duel();
        assert_eq!(s.suggest_targets(AVA, 3).unwrap(), vec![rid("c"), rid("b")]);
        assert_eq!(s.suggest_targets(AVA, 1).unwrap(), vec![rid("c")]);
        assert_eq!(s.suggest_targets(BEN, 3).unwrap(), vec![rid("a"), rid("d")]);
        assert!(s.suggest_targets(PlayerId(7), 3).is_err());
    }

    #[test]
    fn odds_use_target_garrison() {
        let mut s = duel();
        let odds = s.battle_odds(11, &rid("b"), 50).unwrap();
        assert_eq!(odds.win_probability, 1.0);
        assert!(s.battle_odds(5, &rid("nowhere"), 10).is_err());
    }

    #[test]
    fn snapshot_is_stable_and_aggregates_soldiers() {
        let s = duel();
        let first = s.snapshot();
        assert_eq!(first, s.snapshot());
        assert_eq!(first.players[&AVA].soldiers, 32);
        assert_eq!(first.players[&BEN].soldiers, 13);
        assert_eq!(first.current_player, Some(AVA));
        assert_eq!(first.regions[&rid("a")].name, "A");
    }

    #[test]
    fn idle_after_timeout() {
        let s = started();
        let timeout = Duration::from_secs(7200);
        assert!(!s.is_idle(Instant::now(), timeout));
        assert!(s.is_idle(Instant::now() + Duration::from_secs(7201), timeout));
    }
}
