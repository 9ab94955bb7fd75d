//! Top-level orchestration: one event loop owning the slot scheduler, the
//! identity pool and the learners, spawning an agent task per occupied slot.
//!
//! All scheduler mutations happen on this loop, in the handler that observes
//! the triggering event. Agent tasks only talk back through [`AgentReport`]s,
//! except a task that panics: the loop notices it when reaping and frees its
//! slot itself.

pub mod error;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use error::FleetError;

use crate::actions::ActionRegistry;
use crate::client::{GameClient, GameDataCell};
use crate::config::FleetConfig;
use crate::identity::{complete_roster, AgentIdentity, IdentityPool};
use crate::lifecycle::{Agent, AgentExit, AgentExitReport, AgentMode, AgentReport, AgentRuntime};
use crate::metrics::FleetStats;
use crate::persistence::{run_blocking, Persistence};
use crate::rl::Brain;
use crate::scheduler::{Occupant, SchedulerState, WakeDecision, WakePlan, WakeReason};
use crate::units::to_duration;

/// How long shutdown waits for agents to disconnect before aborting them.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

enum FleetEvent {
    Stop,
    Report(AgentReport),
    Wake(WakePlan),
    Reaped(Result<(Id, ()), JoinError>),
}

/// What the loop remembers about a running agent task.
struct AgentTask {
    slot: usize,
    agent_id: Uuid,
    identity: AgentIdentity,
}

pub struct FleetManager {
    config: FleetConfig,
    scheduler: SchedulerState,
    identities: IdentityPool,
    /// Slot-ordered persistent identities; empty in timed mode.
    roster: Vec<AgentIdentity>,
    /// Learners of agents not currently connected, by slot.
    brains: Vec<Option<Box<Brain>>>,
    runtime: AgentRuntime,
    store: Arc<dyn Persistence>,
    reports: mpsc::UnboundedReceiver<AgentReport>,
    wake_tx: mpsc::UnboundedSender<WakePlan>,
    wake_rx: mpsc::UnboundedReceiver<WakePlan>,
    shutdown_tx: watch::Sender<bool>,
    agents: JoinSet<()>,
    tasks: HashMap<Id, AgentTask>,
    timers: JoinSet<()>,
    rng: StdRng,
    stats: FleetStats,
    stopping: bool,
}

impl FleetManager {
    /// Validates `config` and prepares every slot.
    ///
    /// In learning mode this loads the roster, completes it with generated
    /// names, saves it back, and restores each agent's weights.
    pub fn new(
        config: FleetConfig,
        client: Arc<dyn GameClient>,
        store: Arc<dyn Persistence>,
    ) -> Result<Self, FleetError> {
        config.validate()?;
        let scheduler = SchedulerState::new(config.schedule.clone())?;
        let mut rng = match config.learning.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (roster, brains) = match config.agent.mode {
            AgentMode::Timed => (Vec::new(), Vec::new()),
            AgentMode::Learning => {
                let stored = store.load_fleet_config()?;
                let loaded = stored.len();
                let roster = complete_roster(stored, scheduler.slot_count(), &mut rng)?;
                store.save_fleet_config(&roster)?;
                info!(loaded, total = roster.len(), "agent roster ready");

                let brains = roster
                    .iter()
                    .enumerate()
                    .map(|(slot, identity)| Self::build_brain(&config, slot, identity, store.as_ref()).map(Some))
                    .collect::<Result<Vec<_>, _>>()?;
                (roster, brains)
            }
        };

        let (report_tx, reports) = mpsc::unbounded_channel();
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let runtime = AgentRuntime {
            client,
            registry: Arc::new(ActionRegistry::standard()),
            store: Arc::clone(&store),
            game_data: GameDataCell::new(),
            server: config.server.clone(),
            agent: config.agent.clone(),
            learning: config.learning.clone(),
            lifetime: to_duration(config.schedule.lifetime()),
            reports: report_tx,
        };

        Ok(Self {
            config,
            scheduler,
            identities: IdentityPool::new(),
            roster,
            brains,
            runtime,
            store,
            reports,
            wake_tx,
            wake_rx,
            shutdown_tx,
            agents: JoinSet::new(),
            tasks: HashMap::new(),
            timers: JoinSet::new(),
            rng,
            stats: FleetStats::default(),
            stopping: false,
        })
    }

    fn build_brain(
        config: &FleetConfig,
        slot: usize,
        identity: &AgentIdentity,
        store: &dyn Persistence,
    ) -> Result<Box<Brain>, FleetError> {
        let mut learning = config.learning.clone();
        learning.seed = learning.seed.map(|s| s.wrapping_add(1_000 * slot as u64));
        let mut brain = Brain::new(&learning, config.agent.stall_ticks, config.agent.stall_epsilon)?;
        if brain.estimator_mut().restore(identity, store) {
            info!(agent = %identity, slot, "restored saved model");
        }
        Ok(Box::new(brain))
    }

    pub fn scheduler(&self) -> &SchedulerState {
        &self.scheduler
    }

    /// Persistent identities in slot order; empty in timed mode.
    pub fn roster(&self) -> &[AgentIdentity] {
        &self.roster
    }

    /// Runs the fleet until `shutdown` resolves, then stops every agent and
    /// persists what was learned.
    ///
    /// Nothing after construction stops the fleet early: failed wake-ups are
    /// retried and crashed agents are rotated.
    pub async fn run<F>(mut self, shutdown: F) -> FleetStats
    where
        F: Future<Output = ()>,
    {
        info!(
            agents = self.scheduler.slot_count(),
            mode = ?self.config.agent.mode,
            window = %self.scheduler.config().window(),
            server = %format!("{}:{}", self.config.server.host, self.config.server.port),
            "fleet starting"
        );
        for plan in self.scheduler.initial_plans() {
            self.arm(plan);
        }

        tokio::pin!(shutdown);
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut shutdown => FleetEvent::Stop,
                Some(report) = self.reports.recv() => FleetEvent::Report(report),
                Some(plan) = self.wake_rx.recv() => FleetEvent::Wake(plan),
                Some(joined) = self.agents.join_next_with_id() => FleetEvent::Reaped(joined),
                Some(_) = self.timers.join_next() => continue,
            };
            match event {
                FleetEvent::Stop => break,
                FleetEvent::Report(report) => self.handle_report(report),
                FleetEvent::Wake(plan) => {
                    let slot = plan.slot;
                    if let Err(e) = self.on_wake(plan) {
                        self.on_spawn_failure(slot, &e);
                    }
                }
                FleetEvent::Reaped(joined) => self.on_reaped(joined),
            }
        }

        self.shutdown().await
    }

    fn arm(&mut self, plan: WakePlan) {
        if self.stopping {
            return;
        }
        debug!(
            slot = plan.slot,
            delay_secs = plan.delay.value(),
            reason = ?plan.reason,
            "wake-up armed"
        );
        let wake_tx = self.wake_tx.clone();
        self.timers.spawn(async move {
            sleep(plan.duration()).await;
            let _ = wake_tx.send(plan);
        });
    }

    fn on_wake(&mut self, plan: WakePlan) -> Result<(), FleetError> {
        match self.scheduler.on_wake(plan.slot)? {
            WakeDecision::Occupied(occupant) => {
                self.stats.occupied_wakes += 1;
                debug!(slot = plan.slot, %occupant, "slot still occupied, wake-up ignored");
                Ok(())
            }
            WakeDecision::Spawn => self.spawn(plan.slot),
        }
    }

    /// A wake-up that could not spawn leaves the slot empty, so it is
    /// retried after the cooldown instead of stopping the fleet.
    fn on_spawn_failure(&mut self, slot: usize, e: &FleetError) {
        self.stats.spawn_failures += 1;
        error!(slot, error = %e, "wake-up failed, retrying after cooldown");
        match self.scheduler.plan_retry(slot) {
            Ok(plan) => self.arm(plan),
            Err(e) => error!(slot, error = %e, "cannot plan a retry, slot left idle"),
        }
    }

    /// Claims an identity, occupies `slot` and starts its agent task.
    fn spawn(&mut self, slot: usize) -> Result<(), FleetError> {
        let identity = match self.config.agent.mode {
            AgentMode::Timed => self.identities.claim_generated(&mut self.rng)?,
            AgentMode::Learning => {
                let identity = self.roster[slot].clone();
                self.identities.claim(&identity)?;
                identity
            }
        };
        let agent_id = Uuid::new_v4();
        if let Err(e) = self
            .scheduler
            .occupy(slot, Occupant::connecting(agent_id, identity.clone()))
        {
            self.identities.release(&identity);
            return Err(e.into());
        }

        let brain = self.brains.get_mut(slot).and_then(Option::take);
        let agent = Agent::new(slot, agent_id, identity.clone(), brain, self.runtime.clone());
        self.stats.connect_attempts += 1;
        self.stats.peak_active = self.stats.peak_active.max(self.scheduler.occupied_count());
        let task = self.agents.spawn(agent.run(self.shutdown_tx.subscribe()));
        self.tasks.insert(
            task.id(),
            AgentTask {
                slot,
                agent_id,
                identity,
            },
        );
        Ok(())
    }

    fn handle_report(&mut self, report: AgentReport) {
        if let Err(e) = self.on_report(report) {
            error!(error = %e, "agent report could not be applied");
        }
    }

    fn on_report(&mut self, report: AgentReport) -> Result<(), FleetError> {
        match report {
            AgentReport::Joined {
                slot,
                agent_id,
                identity,
                game_version,
            } => {
                if self.scheduler.mark_active(slot, agent_id)? {
                    self.stats.joins += 1;
                    info!(agent = %identity, slot, version = %game_version, "agent active");
                }
                Ok(())
            }
            AgentReport::Exited(report) => self.on_exit(report),
        }
    }

    /// Vacates the slot and plans its next wake-up according to the exit.
    fn on_exit(&mut self, report: AgentExitReport) -> Result<(), FleetError> {
        let AgentExitReport {
            slot,
            agent_id,
            identity,
            exit,
            brain,
            episode,
        } = report;

        self.stats.record_exit(&exit);
        self.identities.release(&identity);
        if let (Some(brain), Some(cell)) = (brain, self.brains.get_mut(slot)) {
            *cell = Some(brain);
        }
        if let Some(episode) = &episode {
            debug!(agent = %identity, slot, %episode, "episode stats");
        }
        if self.scheduler.vacate(slot, agent_id)?.is_none() {
            warn!(agent = %identity, slot, "exit from an agent that no longer holds its slot");
            return Ok(());
        }

        match exit {
            AgentExit::Expired | AgentExit::Died => {
                let plan = self.scheduler.plan_wake(slot, WakeReason::Rotation)?;
                self.arm(plan);
            }
            AgentExit::Failed(class) => {
                self.scheduler.record_global_failure();
                warn!(
                    agent = %identity,
                    slot,
                    %class,
                    failures = self.scheduler.global_failures(),
                    "connection failure, backing off every slot"
                );
                let plan = self.scheduler.plan_retry(slot)?;
                self.arm(plan);
            }
            AgentExit::Ended(reason) => match self.config.agent.mode {
                AgentMode::Learning => {
                    let plan = self.scheduler.plan_wake(slot, WakeReason::Rotation)?;
                    self.arm(plan);
                }
                AgentMode::Timed => info!(slot, %reason, "session ended, slot left idle"),
            },
            AgentExit::Shutdown => {}
        }
        Ok(())
    }

    /// Forgets a finished task. A panicked one never reported its exit, so
    /// its slot and identity are freed here and the slot rotates as usual.
    fn on_reaped(&mut self, joined: Result<(Id, ()), JoinError>) {
        let e = match joined {
            Ok((id, ())) => {
                self.tasks.remove(&id);
                return;
            }
            Err(e) => e,
        };
        let task = self.tasks.remove(&e.id());
        if e.is_cancelled() {
            debug!("agent task aborted");
            return;
        }
        self.stats.crashes += 1;
        let Some(AgentTask {
            slot,
            agent_id,
            identity,
        }) = task
        else {
            error!(error = %e, "untracked agent task panicked");
            return;
        };
        error!(agent = %identity, slot, error = %e, "agent task panicked");

        self.identities.release(&identity);
        match self.scheduler.vacate(slot, agent_id) {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => {
                error!(slot, error = %e, "cannot vacate crashed agent's slot");
                return;
            }
        }

        // The learner went down with the task; start again from the last save.
        if self.config.agent.mode == AgentMode::Learning && matches!(self.brains.get(slot), Some(None)) {
            match Self::build_brain(&self.config, slot, &identity, self.store.as_ref()) {
                Ok(brain) => self.brains[slot] = Some(brain),
                Err(e) => error!(agent = %identity, slot, error = %e, "cannot rebuild learner"),
            }
        }
        match self.scheduler.plan_wake(slot, WakeReason::Rotation) {
            Ok(plan) => self.arm(plan),
            Err(e) => error!(slot, error = %e, "cannot plan a rotation, slot left idle"),
        }
    }

    /// Stops every agent, waits up to [`SHUTDOWN_GRACE`] for their reports,
    /// then persists weights and the roster.
    async fn shutdown(mut self) -> FleetStats {
        self.stopping = true;
        self.timers.abort_all();
        let _ = self.shutdown_tx.send(true);
        info!(active = self.scheduler.occupied_count(), "fleet shutting down");

        let grace = sleep(SHUTDOWN_GRACE);
        tokio::pin!(grace);
        while self.scheduler.occupied_count() > 0 {
            let next = tokio::select! {
                biased;
                Some(report) = self.reports.recv() => Some(FleetEvent::Report(report)),
                Some(joined) = self.agents.join_next_with_id() => Some(FleetEvent::Reaped(joined)),
                _ = &mut grace => None,
            };
            match next {
                Some(FleetEvent::Report(report)) => self.handle_report(report),
                Some(FleetEvent::Reaped(joined)) => self.on_reaped(joined),
                Some(FleetEvent::Stop | FleetEvent::Wake(_)) => {}
                None => {
                    warn!(
                        remaining = self.scheduler.occupied_count(),
                        "agents did not stop in time, aborting"
                    );
                    self.agents.abort_all();
                    break;
                }
            }
        }
        while let Some(joined) = self.agents.join_next_with_id().await {
            self.on_reaped(joined);
        }

        let saves: Vec<_> = self
            .brains
            .iter()
            .zip(&self.roster)
            .filter_map(|(brain, identity)| {
                brain
                    .as_ref()
                    .map(|brain| brain.estimator().persist(identity, &self.store))
            })
            .collect();
        for save in saves {
            save.await;
        }
        if self.config.agent.mode == AgentMode::Learning {
            let roster = self.roster.clone();
            let saved = run_blocking(Arc::clone(&self.store), move |s| s.save_fleet_config(&roster)).await;
            if let Err(e) = saved {
                warn!(error = %e, "failed to save agent roster");
            }
        }

        info!(stats = %self.stats, "fleet stopped");
        self.stats
    }
}
