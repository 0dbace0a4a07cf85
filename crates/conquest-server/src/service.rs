//! The operations transports call into.
//!
//! Each call resolves its session handle, locks it with a timeout, runs one state transition,
//! snapshots, unlocks and only then notifies observers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use conquest_core::{
    ActionError, BattleOdds, GameRng, GameRules, MapGraph, RandomSource, SessionState,
};
use conquest_protocol::{
    BuildingKind, PlayerId, RegionId, SessionId, SessionSnapshot, SessionStatus,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::protocol::SessionEvent;
use crate::registry::{SessionHandle, SessionRegistry};

/// Default number of targets returned by [`GameService::suggest_targets`].
pub const DEFAULT_TARGET_LIMIT: usize = 3;
/// Default and maximum battle simulations per odds query.
pub const DEFAULT_SIMULATIONS: u32 = 100;
pub const MAX_SIMULATIONS: u32 = 10_000;

type RngFactory = Box<dyn Fn() -> Box<dyn RandomSource> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Created {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub snapshot: SessionSnapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Joined {
    pub player_id: PlayerId,
    pub snapshot: SessionSnapshot,
}

/// Result of an accepted attack or build. Rejections come back as [`ServiceError`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub snapshot: SessionSnapshot,
}

/// What one maintenance pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub decayed: usize,
    pub reaped: usize,
    pub busy: usize,
}

enum Upkeep {
    Reap,
    Decayed(SessionSnapshot),
    Nothing,
}

pub struct GameService {
    registry: SessionRegistry,
    map: Arc<MapGraph>,
    rules: GameRules,
    lock_timeout: Duration,
    idle_timeout: Duration,
    rng_factory: RngFactory,
}

impl GameService {
    pub fn new(config: &ServerConfig, map: Arc<MapGraph>) -> Self {
        Self {
            registry: SessionRegistry::new(config.observer_buffer),
            map,
            rules: config.rules.clone(),
            lock_timeout: config.lock_timeout(),
            idle_timeout: config.idle_timeout(),
            rng_factory: Box::new(|| -> Box<dyn RandomSource> {
                Box::new(GameRng::seed_from_u64(rand::random()))
            }),
        }
    }

    /// Replace the randomness given to each new session.
    pub fn with_rng<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn RandomSource> + Send + Sync + 'static,
    {
        self.rng_factory = Box::new(factory);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    fn handle(&self, id: &SessionId) -> Result<Arc<SessionHandle>, ServiceError> {
        self.registry
            .get(id)
            .ok_or_else(|| ServiceError::SessionNotFound(id.clone()))
    }

    /// Finish the match if someone has won. Returns the winner when it just ended.
    fn settle(state: &mut SessionState) -> Option<PlayerId> {
        let winner = state.check_victory()?;
        state.finish(Some(winner));
        Some(winner)
    }

    fn announce(handle: &SessionHandle, finished: Option<PlayerId>, snapshot: &SessionSnapshot) {
        if let Some(winner) = finished {
            info!(session = %handle.id(), winner = %winner, "game over");
            handle.publish(SessionEvent::GameOver {
                winner: Some(winner),
            });
        }
        handle.publish(SessionEvent::State {
            snapshot: snapshot.clone(),
        });
    }

    pub fn create_session(&self, host_name: &str) -> Result<Created, ServiceError> {
        let (handle, snapshot) = self
            .registry
            .create(|id| {
                let state = SessionState::new(
                    id,
                    host_name,
                    Arc::clone(&self.map),
                    self.rules.clone(),
                    (self.rng_factory)(),
                );
                let snapshot = state.snapshot();
                (state, snapshot)
            })
            .ok_or(ServiceError::NoFreeCodes)?;

        info!(session = %handle.id(), host = host_name, "session created");
        Ok(Created {
            session_id: handle.id().clone(),
            player_id: PlayerId(0),
            snapshot,
        })
    }

    pub async fn join_session(
        &self,
        session_id: &SessionId,
        player_name: &str,
    ) -> Result<Joined, ServiceError> {
        let handle = self.handle(session_id)?;
        let (player_id, snapshot) = {
            let mut state = handle.lock(self.lock_timeout).await?;
            let player_id = state.join(player_name)?;
            (player_id, state.snapshot())
        };

        info!(session = %session_id, player = %player_id, name = player_name, "player joined");
        handle.publish(SessionEvent::State {
            snapshot: snapshot.clone(),
        });
        Ok(Joined {
            player_id,
            snapshot,
        })
    }

    pub async fn start_session(
        &self,
        session_id: &SessionId,
        requester: PlayerId,
    ) -> Result<SessionSnapshot, ServiceError> {
        let handle = self.handle(session_id)?;
        let snapshot = {
            let mut state = handle.lock(self.lock_timeout).await?;
            state.start(requester)?;
            state.snapshot()
        };

        info!(
            session = %session_id,
            players = snapshot.players.len(),
            first = ?snapshot.current_player,
            "game started"
        );
        handle.publish(SessionEvent::State {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Attack with a client-supplied soldier count. Counts below one are rejected before the
    /// session is touched.
    pub async fn attack(
        &self,
        session_id: &SessionId,
        player: PlayerId,
        from: &RegionId,
        to: &RegionId,
        soldiers: i64,
    ) -> Result<ActionResult, ServiceError> {
        let handle = self.handle(session_id)?;
        if soldiers < 1 {
            return Err(ActionError::InvalidSoldierCount.into());
        }
        let soldiers = u32::try_from(soldiers).unwrap_or(u32::MAX);

        let (report, finished, snapshot) = {
            let mut state = handle.lock(self.lock_timeout).await?;
            let report = state.attack(player, from, to, soldiers)?;
            let finished = Self::settle(&mut state);
            (report, finished, state.snapshot())
        };

        debug!(
            session = %session_id,
            player = %player,
            from = %from,
            to = %to,
            soldiers,
            captured = report.captured,
            "attack resolved"
        );
        handle.publish(SessionEvent::Battle {
            attacker: player,
            defender: report.defender,
            from: from.clone(),
            to: to.clone(),
            captured: report.captured,
            message: report.message.clone(),
        });
        Self::announce(&handle, finished, &snapshot);

        Ok(ActionResult {
            success: true,
            message: report.message,
            snapshot,
        })
    }

    pub async fn build(
        &self,
        session_id: &SessionId,
        player: PlayerId,
        region: &RegionId,
        building_type: &str,
    ) -> Result<ActionResult, ServiceError> {
        let handle = self.handle(session_id)?;
        let kind: BuildingKind = building_type
            .parse()
            .map_err(|_| ActionError::UnknownBuildingType(building_type.to_string()))?;

        let (report, snapshot) = {
            let mut state = handle.lock(self.lock_timeout).await?;
            let report = state.build(player, region, kind)?;
            (report, state.snapshot())
        };

        debug!(
            session = %session_id,
            player = %player,
            region = %region,
            kind = %kind,
            coins_left = report.coins_left,
            "building bought"
        );
        handle.publish(SessionEvent::State {
            snapshot: snapshot.clone(),
        });

        Ok(ActionResult {
            success: true,
            message: report.message,
            snapshot,
        })
    }

    pub async fn end_turn(
        &self,
        session_id: &SessionId,
        player: PlayerId,
    ) -> Result<SessionSnapshot, ServiceError> {
        let handle = self.handle(session_id)?;
        let (finished, snapshot) = {
            let mut state = handle.lock(self.lock_timeout).await?;
            state.end_turn(player)?;
            let finished = Self::settle(&mut state);
            (finished, state.snapshot())
        };

        debug!(session = %session_id, player = %player, next = ?snapshot.current_player, "turn ended");
        Self::announce(&handle, finished, &snapshot);
        Ok(snapshot)
    }

    /// Read-only view. Still takes the lock so it never sees a half-applied action.
    pub async fn get_state(&self, session_id: &SessionId) -> Result<SessionSnapshot, ServiceError> {
        let handle = self.handle(session_id)?;
        let state = handle.lock(self.lock_timeout).await?;
        Ok(state.snapshot())
    }

    pub async fn disconnect(
        &self,
        session_id: &SessionId,
        player: PlayerId,
    ) -> Result<SessionSnapshot, ServiceError> {
        let handle = self.handle(session_id)?;
        let (finished, snapshot) = {
            let mut state = handle.lock(self.lock_timeout).await?;
            state.disconnect(player)?;
            let finished = Self::settle(&mut state);
            (finished, state.snapshot())
        };

        info!(session = %session_id, player = %player, "player disconnected");
        Self::announce(&handle, finished, &snapshot);
        Ok(snapshot)
    }

    pub async fn reconnect(
        &self,
        session_id: &SessionId,
        player: PlayerId,
    ) -> Result<SessionSnapshot, ServiceError> {
        let handle = self.handle(session_id)?;
        let snapshot = {
            let mut state = handle.lock(self.lock_timeout).await?;
            state.reconnect(player)?;
            state.snapshot()
        };

        info!(session = %session_id, player = %player, "player reconnected");
        Self::announce(&handle, None, &snapshot);
        Ok(snapshot)
    }

    pub async fn battle_odds(
        &self,
        session_id: &SessionId,
        attacking: i64,
        target: &RegionId,
        simulations: Option<u32>,
    ) -> Result<BattleOdds, ServiceError> {
        let handle = self.handle(session_id)?;
        if attacking < 1 {
            return Err(ActionError::InvalidSoldierCount.into());
        }
        let attacking = u32::try_from(attacking).unwrap_or(u32::MAX);
        let simulations = simulations
            .unwrap_or(DEFAULT_SIMULATIONS)
            .clamp(1, MAX_SIMULATIONS);

        let mut state = handle.lock(self.lock_timeout).await?;
        Ok(state.battle_odds(attacking, target, simulations)?)
    }

    pub async fn suggest_targets(
        &self,
        session_id: &SessionId,
        player: PlayerId,
        limit: Option<usize>,
    ) -> Result<Vec<RegionId>, ServiceError> {
        let handle = self.handle(session_id)?;
        let state = handle.lock(self.lock_timeout).await?;
        Ok(state.suggest_targets(player, limit.unwrap_or(DEFAULT_TARGET_LIMIT))?)
    }

    /// Observe every later event of a session.
    pub fn subscribe(
        &self,
        session_id: &SessionId,
    ) -> Result<broadcast::Receiver<SessionEvent>, ServiceError> {
        Ok(self.handle(session_id)?.subscribe())
    }

    /// One ticker pass: decay every session that is due, drop idle or finished ones.
    ///
    /// Sessions whose lock cannot be taken in time are left for the next pass.
    pub async fn maintain(&self, now: Instant) -> TickSummary {
        let mut summary = TickSummary::default();

        for handle in self.registry.handles() {
            let upkeep = match handle.lock(self.lock_timeout).await {
                Ok(mut state) => {
                    if state.status() == SessionStatus::Finished
                        || state.is_idle(now, self.idle_timeout)
                    {
                        Upkeep::Reap
                    } else if state.decay_tick(now) {
                        Upkeep::Decayed(state.snapshot())
                    } else {
                        Upkeep::Nothing
                    }
                }
                Err(err) => {
                    warn!(session = %handle.id(), error = %err, "skipping busy session this tick");
                    summary.busy += 1;
                    continue;
                }
            };

            match upkeep {
                Upkeep::Reap => {
                    self.registry.remove(handle.id());
                    summary.reaped += 1;
                    info!(session = %handle.id(), "session reaped");
                }
                Upkeep::Decayed(snapshot) => {
                    summary.decayed += 1;
                    debug!(session = %handle.id(), "garrisons decayed");
                    handle.publish(SessionEvent::Decayed);
                    handle.publish(SessionEvent::State { snapshot });
                }
                Upkeep::Nothing => {}
            }
        }

        summary
    }
}
