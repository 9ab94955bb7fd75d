//! The task that owns one agent from connection to exit.
//!
//! An [`Agent`] is spawned by the fleet for an empty slot. It connects, waits
//! for the join confirmation, then either sits out its lifetime
//! ([`AgentMode::Timed`]) or runs the decision loop ([`AgentMode::Learning`]).
//! However it ends, it disconnects, hands its brain back and reports exactly
//! one [`AgentReport::Exited`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{AgentConfig, AgentExit, AgentMode, LifecycleError, LifecycleState, Trigger};
use crate::actions::{ActionContext, ActionError, ActionRegistry};
use crate::client::{ClientError, ConnectRequest, Connection, GameClient, GameDataCell, GameDataTable, SessionEvent};
use crate::config::ServerConfig;
use crate::identity::AgentIdentity;
use crate::metrics::EpisodeStats;
use crate::persistence::Persistence;
use crate::rl::{Brain, LearningConfig, Milestones, Observation, RewardShaper, Transition};

/// Collaborators shared by every agent of a fleet.
#[derive(Clone)]
pub struct AgentRuntime {
    pub client: Arc<dyn GameClient>,
    pub registry: Arc<ActionRegistry>,
    pub store: Arc<dyn Persistence>,
    pub game_data: GameDataCell,
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub learning: LearningConfig,
    /// Session lifetime in timed mode.
    pub lifetime: Duration,
    pub reports: mpsc::UnboundedSender<AgentReport>,
}

/// Messages from agent tasks to the fleet loop.
#[derive(Debug)]
pub enum AgentReport {
    Joined {
        slot: usize,
        agent_id: Uuid,
        identity: AgentIdentity,
        game_version: String,
    },
    Exited(AgentExitReport),
}

/// Final report of an agent task.
pub struct AgentExitReport {
    pub slot: usize,
    pub agent_id: Uuid,
    pub identity: AgentIdentity,
    pub exit: AgentExit,
    /// The learner, handed back so it survives into the next session.
    pub brain: Option<Box<Brain>>,
    /// Set when a learning episode ran.
    pub episode: Option<EpisodeStats>,
}

impl fmt::Debug for AgentExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentExitReport")
            .field("slot", &self.slot)
            .field("agent_id", &self.agent_id)
            .field("identity", &self.identity)
            .field("exit", &self.exit)
            .field("has_brain", &self.brain.is_some())
            .field("episode", &self.episode)
            .finish()
    }
}

/// Resolves once shutdown is requested or the fleet is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub struct Agent {
    slot: usize,
    agent_id: Uuid,
    identity: AgentIdentity,
    brain: Option<Box<Brain>>,
    runtime: AgentRuntime,
    state: LifecycleState,
}

impl Agent {
    pub fn new(
        slot: usize,
        agent_id: Uuid,
        identity: AgentIdentity,
        brain: Option<Box<Brain>>,
        runtime: AgentRuntime,
    ) -> Self {
        Self {
            slot,
            agent_id,
            identity,
            brain,
            runtime,
            state: LifecycleState::Disconnected,
        }
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Runs the agent to completion inside an `agent` span.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let span = info_span!("agent", name = %self.identity, slot = self.slot);
        self.run_inner(shutdown).instrument(span).await
    }

    fn advance(&mut self, trigger: Trigger) {
        match self.state.on(trigger) {
            Ok(next) => {
                debug!(from = %self.state, to = %next, "lifecycle transition");
                self.state = next;
            }
            Err(e) => warn!(error = %e, "ignoring lifecycle trigger"),
        }
    }

    async fn run_inner(mut self, mut shutdown: watch::Receiver<bool>) {
        self.advance(Trigger::Wake);
        let (exit, episode) = match self.connect(&mut shutdown).await {
            Ok(mut conn) => {
                let result = self.live(&mut conn, &mut shutdown).await;
                conn.session.disconnect().await;
                result
            }
            Err(exit) => (exit, None),
        };
        self.advance(exit.trigger());

        match &exit {
            AgentExit::Failed(_) => warn!(%exit, "agent exited"),
            _ => info!(%exit, "agent exited"),
        }
        let save = match (&self.brain, &episode) {
            (Some(brain), Some(_)) => Some(brain.estimator().persist(&self.identity, &self.runtime.store)),
            _ => None,
        };
        if let Some(save) = save {
            save.await;
        }

        self.advance(Trigger::Reset);
        let report = AgentExitReport {
            slot: self.slot,
            agent_id: self.agent_id,
            identity: self.identity.clone(),
            exit,
            brain: self.brain.take(),
            episode,
        };
        let _ = self.runtime.reports.send(AgentReport::Exited(report));
    }

    /// Opens a session and waits for the join confirmation.
    async fn connect(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<Connection, AgentExit> {
        let server = &self.runtime.server;
        let request = ConnectRequest {
            host: server.host.clone(),
            port: server.port,
            identity: self.identity.clone(),
            version_hint: server.version_hint.clone(),
        };
        info!(host = %request.host, port = request.port, "connecting");

        let client = Arc::clone(&self.runtime.client);
        let result = tokio::select! {
            biased;
            _ = stopped(shutdown) => None,
            result = client.connect(request) => Some(result),
        };
        let mut conn = match result {
            None => return Err(AgentExit::Shutdown),
            Some(Ok(conn)) => conn,
            Some(Err(e)) => {
                warn!(error = %e, "connection failed");
                return Err(AgentExit::from_client_error(&e));
            }
        };

        let deadline = sleep(Duration::from_secs(self.runtime.agent.join_timeout_secs));
        tokio::pin!(deadline);
        let joined = loop {
            tokio::select! {
                biased;
                _ = stopped(shutdown) => break Err(AgentExit::Shutdown),
                _ = &mut deadline => break Err(AgentExit::Ended("join timed out".to_string())),
                event = conn.events.recv() => match event {
                    Some(SessionEvent::Joined) => break Ok(()),
                    Some(event) => {
                        if let Some(exit) = AgentExit::from_session_event(event) {
                            break Err(exit);
                        }
                    }
                    None => break Err(AgentExit::Ended("session closed before join".to_string())),
                },
            }
        };
        if let Err(exit) = joined {
            conn.session.disconnect().await;
            return Err(exit);
        }

        self.advance(Trigger::Joined);
        let game_version = conn.session.game_version();
        info!(version = %game_version, "joined");
        let _ = self.runtime.reports.send(AgentReport::Joined {
            slot: self.slot,
            agent_id: self.agent_id,
            identity: self.identity.clone(),
            game_version,
        });
        Ok(conn)
    }

    async fn live(
        &mut self,
        conn: &mut Connection,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (AgentExit, Option<EpisodeStats>) {
        let table = self.runtime.game_data.get_or_init(&conn.session.game_version());
        match self.runtime.agent.mode {
            AgentMode::Timed => (self.live_timed(conn, shutdown).await, None),
            AgentMode::Learning => self.live_learning(conn, &table, shutdown).await,
        }
    }

    async fn live_timed(&mut self, conn: &mut Connection, shutdown: &mut watch::Receiver<bool>) -> AgentExit {
        let lifetime = sleep(self.runtime.lifetime);
        tokio::pin!(lifetime);
        loop {
            tokio::select! {
                biased;
                _ = stopped(shutdown) => return AgentExit::Shutdown,
                _ = &mut lifetime => return AgentExit::Expired,
                event = conn.events.recv() => match event {
                    Some(SessionEvent::ChatReceived { sender, text }) => debug!(%sender, %text, "chat"),
                    Some(event) => {
                        if let Some(exit) = AgentExit::from_session_event(event) {
                            return exit;
                        }
                    }
                    None => return AgentExit::Ended("session closed".to_string()),
                },
            }
        }
    }

    async fn live_learning(
        &mut self,
        conn: &mut Connection,
        table: &GameDataTable,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (AgentExit, Option<EpisodeStats>) {
        let mut brain = match self.brain.take() {
            Some(brain) => brain,
            None => {
                let cfg = &self.runtime.agent;
                match Brain::new(&self.runtime.learning, cfg.stall_ticks, cfg.stall_epsilon) {
                    Ok(brain) => Box::new(brain),
                    Err(e) => {
                        error!(error = %e, "cannot build a learner");
                        return (AgentExit::Ended(e.to_string()), None);
                    }
                }
            }
        };
        let (exit, stats) = self.episode(&mut brain, conn, table, shutdown).await;
        self.brain = Some(brain);
        (exit, Some(stats))
    }

    /// Decision ticks until the session ends. The tick timer is re-armed only
    /// after the previous tick has fully completed.
    async fn episode(
        &mut self,
        brain: &mut Brain,
        conn: &mut Connection,
        table: &GameDataTable,
        shutdown: &mut watch::Receiver<bool>,
    ) -> (AgentExit, EpisodeStats) {
        let mut stats = EpisodeStats::default();
        let mut milestones = Milestones::default();
        let mut observation = match conn.session.snapshot().await {
            Ok(snapshot) => {
                milestones.update(&snapshot);
                Observation::from_snapshot(&snapshot, &milestones)
            }
            Err(e) => return (AgentExit::from_client_error(&e), stats),
        };

        let period = Duration::from_millis(self.runtime.agent.tick_interval_ms);
        let timer = sleep(period);
        tokio::pin!(timer);
        let exit = loop {
            tokio::select! {
                biased;
                _ = stopped(shutdown) => break AgentExit::Shutdown,
                event = conn.events.recv() => {
                    match event {
                        Some(SessionEvent::ChatReceived { sender, text }) => debug!(%sender, %text, "chat"),
                        Some(event) => {
                            if let Some(exit) = AgentExit::from_session_event(event) {
                                break exit;
                            }
                        }
                        None => break AgentExit::Ended("session closed".to_string()),
                    }
                    continue;
                }
                _ = &mut timer => {}
            }

            let step = self
                .tick(brain, conn, table, &mut observation, &mut milestones, &mut stats)
                .await;
            match step {
                Ok(true) => timer.as_mut().reset(Instant::now() + period),
                Ok(false) => break AgentExit::Died,
                Err(LifecycleError::Client(e)) => break AgentExit::from_client_error(&e),
                Err(e) => {
                    error!(error = %e, "decision loop aborted");
                    break AgentExit::Ended(e.to_string());
                }
            }
        };

        stats.final_epsilon = brain.estimator().epsilon();
        info!(%stats, "episode finished");
        (exit, stats)
    }

    /// One decide, act, observe, learn step. Returns false once the agent died.
    async fn tick(
        &mut self,
        brain: &mut Brain,
        conn: &mut Connection,
        table: &GameDataTable,
        observation: &mut Observation,
        milestones: &mut Milestones,
        stats: &mut EpisodeStats,
    ) -> Result<bool, LifecycleError> {
        let action = brain.decide(observation)?;
        let outcome = {
            let mut ctx = ActionContext {
                session: conn.session.as_mut(),
                game_data: table,
                observation: &*observation,
            };
            self.runtime.registry.dispatch(action, &mut ctx).await
        };
        if let Some(class) = outcome.error().and_then(ActionError::client_class) {
            if class.is_connection() {
                return Err(ClientError::new(class, format!("connection lost during {action}")).into());
            }
        }

        let snapshot = conn.session.snapshot().await?;
        milestones.update(&snapshot);
        let next = Observation::from_snapshot(&snapshot, milestones);

        let weights = &self.runtime.learning.reward;
        let reward = if outcome.is_fault() {
            weights.action_faulted
        } else {
            RewardShaper::compute(observation, &next, outcome.succeeded(), weights)
        };
        let terminal = next.is_dead();
        let trained = brain.learn(Transition {
            state: observation.to_vec(),
            action: action.id(),
            reward,
            next_state: next.to_vec(),
            terminal,
        })?;
        stats.record(reward, &outcome, trained.trained());
        debug!(%action, reward, epsilon = brain.estimator().epsilon(), "tick");

        *observation = next;
        Ok(!terminal)
    }
}
