//! The tick orchestrator: agent registry, run loop, and per-tick
//! concurrent agent execution.
//!
//! One [`Simulation`] owns the lifecycle. `run` drives a fixed-cadence
//! tick loop; each tick every registered agent runs its full
//! think/decide/act cycle as its own task, and the step completes only
//! when every agent task has finished. A failing agent never prevents
//! the other agents from completing their tick; all failures from one
//! step are aggregated into a single error that ends the run.
//!
//! Control flows through three channels: a stop flag with a
//! [`Notify`] wakeup, a pause command on a watch channel, and an
//! external cancellation watch passed into `run`. Pause and resume are
//! acknowledged: the async `pause`/`resume` methods return only after
//! the loop has actually entered the requested state.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lockstep_types::{Event, EventKind};
use tokio::sync::{Notify, RwLock, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentError};
use crate::bus::EventBus;
use crate::clock::SimClock;
use crate::world::{World, WorldError};

/// Errors returned by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// An agent with the same id is already registered.
    #[error("agent {id} is already registered")]
    DuplicateAgent {
        /// The conflicting agent id.
        id: String,
    },

    /// No agent with the given id is registered.
    #[error("agent {id} is not registered")]
    UnknownAgent {
        /// The unknown agent id.
        id: String,
    },

    /// The run was cancelled from outside.
    #[error("simulation run cancelled")]
    Cancelled,

    /// A step failed; the run has ended.
    #[error("simulation step failed")]
    Step {
        /// The aggregated per-agent failures.
        #[from]
        source: AggregateStepError,
    },
}

/// Every failure collected from one step.
///
/// A step runs all agents to completion before reporting, so this can
/// carry one fault per agent plus any task-level aborts.
#[derive(Debug, thiserror::Error)]
#[error("{} failure(s) during step", faults.len())]
pub struct AggregateStepError {
    /// The individual failures, in completion order.
    pub faults: Vec<StepFault>,
}

/// One failure from one agent's tick within a step.
#[derive(Debug, thiserror::Error)]
pub enum StepFault {
    /// The agent itself failed at some stage of its cycle.
    #[error("agent {agent_id} failed during {stage}")]
    Agent {
        /// The failing agent.
        agent_id: String,
        /// Which stage of the cycle failed.
        stage: StepStage,
        /// The underlying agent error.
        #[source]
        source: AgentError,
    },

    /// The world rejected or failed to resolve the agent's action.
    #[error("world failed resolving action from agent {agent_id}")]
    World {
        /// The acting agent.
        agent_id: String,
        /// The underlying world error.
        #[source]
        source: WorldError,
    },

    /// The agent's task aborted before producing a result.
    #[error("agent task aborted: {message}")]
    Task {
        /// The join error, rendered.
        message: String,
    },
}

/// The stage of an agent's tick cycle a fault occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStage {
    /// The cognition pass.
    Think,
    /// The action decision.
    Decide,
    /// Outcome delivery back to the agent.
    Outcome,
}

impl core::fmt::Display for StepStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Think => "think",
            Self::Decide => "decide",
            Self::Outcome => "outcome",
        };
        f.write_str(name)
    }
}

/// Where the run loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// `run` has not been called.
    Idle,
    /// The loop is ticking.
    Running,
    /// The loop is parked, waiting for resume, stop, or cancel.
    Paused,
    /// The loop has exited.
    Stopped,
}

/// The tick orchestrator.
///
/// Shareable: controllers hold it behind an [`Arc`] and call `pause`,
/// `resume`, and `stop` from other tasks while `run` drives the loop.
pub struct Simulation {
    world: Arc<dyn World>,
    bus: Arc<EventBus>,
    clock: Arc<SimClock>,
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    step_interval: Duration,
    stop_requested: AtomicBool,
    stop_notify: Notify,
    pause_cmd: watch::Sender<bool>,
    loop_state: watch::Sender<LoopState>,
}

impl Simulation {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        world: Arc<dyn World>,
        bus: Arc<EventBus>,
        clock: Arc<SimClock>,
        step_interval: Duration,
    ) -> Self {
        let (pause_cmd, _) = watch::channel(false);
        let (loop_state, _) = watch::channel(LoopState::Idle);
        Self {
            world,
            bus,
            clock,
            agents: RwLock::new(HashMap::new()),
            step_interval,
            stop_requested: AtomicBool::new(false),
            stop_notify: Notify::new(),
            pause_cmd,
            loop_state,
        }
    }

    /// The shared event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The shared simulated clock.
    pub fn clock(&self) -> &Arc<SimClock> {
        &self.clock
    }

    /// Where the run loop currently is.
    pub fn loop_state(&self) -> LoopState {
        *self.loop_state.borrow()
    }

    /// Number of registered agents.
    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Ids of the registered agents, in no particular order.
    pub async fn agent_ids(&self) -> Vec<String> {
        self.agents.read().await.keys().cloned().collect()
    }

    /// Register an agent and publish an `agent_joined` event.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::DuplicateAgent`] if an agent with the
    /// same id is registered; the registry is unchanged and no event is
    /// published.
    pub async fn add_agent(&self, agent: Arc<dyn Agent>) -> Result<(), SimulationError> {
        let id = agent.id().to_owned();
        {
            let mut agents = self.agents.write().await;
            if agents.contains_key(&id) {
                return Err(SimulationError::DuplicateAgent { id });
            }
            agents.insert(id.clone(), agent);
        }
        info!(agent_id = id, "agent joined");

        let event = Event::at(self.clock.simulation_time(), EventKind::AgentJoined, "simulation")
            .with_target(id.clone());
        if let Err(error) = self.bus.publish(&event) {
            warn!(agent_id = id, %error, "agent_joined handlers failed");
        }
        Ok(())
    }

    /// Remove an agent and publish an `agent_left` event.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::UnknownAgent`] if no agent with the
    /// given id is registered.
    pub async fn remove_agent(&self, id: &str) -> Result<(), SimulationError> {
        {
            let mut agents = self.agents.write().await;
            if agents.remove(id).is_none() {
                return Err(SimulationError::UnknownAgent { id: id.to_owned() });
            }
        }
        info!(agent_id = id, "agent left");

        let event = Event::at(self.clock.simulation_time(), EventKind::AgentLeft, "simulation")
            .with_target(id);
        if let Err(error) = self.bus.publish(&event) {
            warn!(agent_id = id, %error, "agent_left handlers failed");
        }
        Ok(())
    }

    /// Request the loop to stop after the current step. Idempotent.
    pub fn stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            info!("stop requested");
            self.stop_notify.notify_one();
        }
    }

    /// Pause the loop and freeze the clock.
    ///
    /// Returns once the loop has acknowledged the pause (or has already
    /// exited). A no-op if already paused or not yet running.
    pub async fn pause(&self) {
        let was_paused = self.pause_cmd.send_replace(true);
        if was_paused {
            return;
        }
        let mut state = self.loop_state.subscribe();
        let _ = state
            .wait_for(|s| matches!(s, LoopState::Paused | LoopState::Stopped | LoopState::Idle))
            .await;
    }

    /// Resume a paused loop and unfreeze the clock.
    ///
    /// Returns once the loop has acknowledged the resume. A no-op if the
    /// loop was not paused.
    pub async fn resume(&self) {
        let was_paused = self.pause_cmd.send_replace(false);
        if !was_paused {
            return;
        }
        let mut state = self.loop_state.subscribe();
        let _ = state
            .wait_for(|s| matches!(s, LoopState::Running | LoopState::Stopped | LoopState::Idle))
            .await;
    }

    /// Drive the tick loop until stopped, cancelled, or a step fails.
    ///
    /// The first tick fires one interval after the call; ticks missed
    /// while paused or while a slow step runs are skipped, not bursted.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Cancelled`] if the cancellation flag
    /// turned true, or [`SimulationError::Step`] if a step failed. A
    /// requested stop returns `Ok(())`.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) -> Result<(), SimulationError> {
        let mut pause_rx = self.pause_cmd.subscribe();
        let mut interval = tokio::time::interval_at(
            tokio::time::Instant::now() + self.step_interval,
            self.step_interval,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cancel_closed = false;

        self.loop_state.send_replace(LoopState::Running);
        info!(step_interval = ?self.step_interval, "run loop started");

        let result = loop {
            if !cancel_closed && *cancel.borrow() {
                break Err(SimulationError::Cancelled);
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                break Ok(());
            }
            if *pause_rx.borrow() {
                self.clock.pause();
                self.loop_state.send_replace(LoopState::Paused);
                info!("run loop paused");

                // Park until resumed, stopped, or cancelled.
                loop {
                    if self.stop_requested.load(Ordering::SeqCst)
                        || (!cancel_closed && *cancel.borrow())
                        || !*pause_rx.borrow()
                    {
                        break;
                    }
                    tokio::select! {
                        _ = pause_rx.changed() => {}
                        () = self.stop_notify.notified() => {}
                        changed = cancel.changed(), if !cancel_closed => {
                            if changed.is_err() {
                                cancel_closed = true;
                            }
                        }
                    }
                }

                if !*pause_rx.borrow() {
                    self.clock.resume();
                    interval.reset();
                    self.loop_state.send_replace(LoopState::Running);
                    info!("run loop resumed");
                }
                continue;
            }

            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = self.step().await {
                        break Err(error);
                    }
                }
                () = self.stop_notify.notified() => {}
                _ = pause_rx.changed() => {}
                changed = cancel.changed(), if !cancel_closed => {
                    if changed.is_err() {
                        cancel_closed = true;
                    }
                }
            }
        };

        self.loop_state.send_replace(LoopState::Stopped);
        match &result {
            Ok(()) => info!("run loop stopped"),
            Err(error) => warn!(%error, "run loop ended with error"),
        }
        result
    }

    /// Run one step: every registered agent completes its full tick
    /// cycle, concurrently, before the step returns.
    ///
    /// The registry is locked for the whole step, so membership changes
    /// queue up behind it and take effect between steps.
    async fn step(&self) -> Result<(), SimulationError> {
        let agents = self.agents.write().await;
        let tick_time = self.clock.simulation_time();
        debug!(agent_count = agents.len(), %tick_time, "step started");

        let mut tasks = JoinSet::new();
        for agent in agents.values() {
            let agent = Arc::clone(agent);
            let world = Arc::clone(&self.world);
            let bus = Arc::clone(&self.bus);
            tasks.spawn(async move { run_agent_tick(agent, world, bus, tick_time).await });
        }

        let mut faults = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(fault)) => faults.push(fault),
                Err(join_error) => faults.push(StepFault::Task {
                    message: join_error.to_string(),
                }),
            }
        }
        drop(agents);

        if faults.is_empty() {
            Ok(())
        } else {
            Err(SimulationError::Step {
                source: AggregateStepError { faults },
            })
        }
    }
}

impl core::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulation")
            .field("step_interval", &self.step_interval)
            .field("loop_state", &self.loop_state())
            .finish()
    }
}

/// One agent's full tick cycle: think, decide, resolve against the
/// world, deliver the outcome, publish the `agent_action` event.
async fn run_agent_tick(
    agent: Arc<dyn Agent>,
    world: Arc<dyn World>,
    bus: Arc<EventBus>,
    tick_time: DateTime<Utc>,
) -> Result<(), StepFault> {
    let agent_id = agent.id().to_owned();

    agent.think().await.map_err(|source| StepFault::Agent {
        agent_id: agent_id.clone(),
        stage: StepStage::Think,
        source,
    })?;

    let action = agent
        .decide_action()
        .await
        .map_err(|source| StepFault::Agent {
            agent_id: agent_id.clone(),
            stage: StepStage::Decide,
            source,
        })?;

    let outcome = world
        .apply_action(&action)
        .map_err(|source| StepFault::World {
            agent_id: agent_id.clone(),
            source,
        })?;

    agent
        .receive_outcome(&action, &outcome)
        .await
        .map_err(|source| StepFault::Agent {
            agent_id: agent_id.clone(),
            stage: StepStage::Outcome,
            source,
        })?;

    let mut event = Event::at(tick_time, EventKind::AgentAction, agent_id.clone())
        .with_payload(
            "action",
            serde_json::to_value(&action).unwrap_or(serde_json::Value::Null),
        )
        .with_payload("outcome", serde_json::Value::String(outcome));
    if let Some(target) = &action.target {
        event = event.with_target(target.clone());
    }
    if let Err(error) = bus.publish(&event) {
        warn!(agent_id, %error, "agent_action handlers failed");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use lockstep_types::{Action, PluginKind};

    use super::*;
    use crate::plugin::{AgentPlugin, PluginError};

    struct TestAgent {
        id: String,
        thinks: AtomicUsize,
        decides: AtomicUsize,
        outcomes: AtomicUsize,
        fail_think: bool,
    }

    impl TestAgent {
        fn build(id: &str, fail_think: bool) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_owned(),
                thinks: AtomicUsize::new(0),
                decides: AtomicUsize::new(0),
                outcomes: AtomicUsize::new(0),
                fail_think,
            })
        }

        fn new(id: &str) -> Arc<Self> {
            Self::build(id, false)
        }

        fn failing(id: &str) -> Arc<Self> {
            Self::build(id, true)
        }
    }

    #[async_trait]
    impl Agent for TestAgent {
        fn id(&self) -> &str {
            &self.id
        }
        fn name(&self) -> &str {
            &self.id
        }
        async fn think(&self) -> Result<(), AgentError> {
            self.thinks.fetch_add(1, Ordering::SeqCst);
            if self.fail_think {
                return Err(AgentError::Internal {
                    message: String::from("induced think failure"),
                });
            }
            Ok(())
        }
        async fn decide_action(&self) -> Result<Action, AgentError> {
            self.decides.fetch_add(1, Ordering::SeqCst);
            Ok(Action::noop(&self.id))
        }
        async fn receive_outcome(&self, _action: &Action, _outcome: &str) -> Result<(), AgentError> {
            self.outcomes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn register_plugin(&self, _plugin: Box<dyn AgentPlugin>) -> Result<(), PluginError> {
            Ok(())
        }
        fn plugin_kinds(&self) -> Vec<PluginKind> {
            Vec::new()
        }
    }

    struct TestWorld {
        applied: AtomicUsize,
    }

    impl TestWorld {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                applied: AtomicUsize::new(0),
            })
        }
    }

    impl World for TestWorld {
        fn state(&self) -> std::collections::BTreeMap<String, serde_json::Value> {
            std::collections::BTreeMap::new()
        }
        fn set_state(
            &self,
            _state: std::collections::BTreeMap<String, serde_json::Value>,
        ) -> Result<(), WorldError> {
            Ok(())
        }
        fn is_valid_action(&self, _action: &Action) -> bool {
            true
        }
        fn apply_action(&self, _action: &Action) -> Result<String, WorldError> {
            self.applied.fetch_add(1, Ordering::SeqCst);
            Ok(String::from("ok"))
        }
    }

    fn simulation(world: Arc<dyn World>, interval: Duration) -> Arc<Simulation> {
        Arc::new(Simulation::new(
            world,
            Arc::new(EventBus::new()),
            Arc::new(SimClock::new()),
            interval,
        ))
    }

    fn event_counter(bus: &EventBus, kind: EventKind) -> Arc<AtomicUsize> {
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&counter);
        bus.subscribe(kind, move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        counter
    }

    #[tokio::test]
    async fn duplicate_agent_is_rejected_without_an_event() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        let joins = event_counter(sim.bus(), EventKind::AgentJoined);

        sim.add_agent(TestAgent::new("a")).await.unwrap();
        let result = sim.add_agent(TestAgent::new("a")).await;

        assert!(matches!(
            result,
            Err(SimulationError::DuplicateAgent { id }) if id == "a"
        ));
        assert_eq!(sim.agent_count().await, 1);
        assert_eq!(joins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn join_event_targets_the_new_agent() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        let target = Arc::new(std::sync::Mutex::new(None));
        let seen = Arc::clone(&target);
        sim.bus().subscribe(EventKind::AgentJoined, move |event| {
            *seen.lock().unwrap() = event.target.clone();
            Ok(())
        });

        sim.add_agent(TestAgent::new("a")).await.unwrap();
        assert_eq!(target.lock().unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn remove_agent_publishes_agent_left() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        let lefts = event_counter(sim.bus(), EventKind::AgentLeft);

        sim.add_agent(TestAgent::new("a")).await.unwrap();
        sim.remove_agent("a").await.unwrap();
        assert_eq!(sim.agent_count().await, 0);
        assert_eq!(lefts.load(Ordering::SeqCst), 1);

        assert!(matches!(
            sim.remove_agent("a").await,
            Err(SimulationError::UnknownAgent { id }) if id == "a"
        ));
        assert_eq!(lefts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn step_runs_every_agent_through_the_full_cycle() {
        let world = TestWorld::new();
        let sim = simulation(Arc::clone(&world) as Arc<dyn World>, Duration::from_millis(20));
        let actions = event_counter(sim.bus(), EventKind::AgentAction);

        let a = TestAgent::new("a");
        let b = TestAgent::new("b");
        sim.add_agent(Arc::clone(&a) as Arc<dyn Agent>).await.unwrap();
        sim.add_agent(Arc::clone(&b) as Arc<dyn Agent>).await.unwrap();

        sim.step().await.unwrap();
        sim.step().await.unwrap();

        for agent in [&a, &b] {
            assert_eq!(agent.thinks.load(Ordering::SeqCst), 2);
            assert_eq!(agent.decides.load(Ordering::SeqCst), 2);
            assert_eq!(agent.outcomes.load(Ordering::SeqCst), 2);
        }
        assert_eq!(world.applied.load(Ordering::SeqCst), 4);
        assert_eq!(actions.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn one_failing_agent_does_not_starve_the_others() {
        let world = TestWorld::new();
        let sim = simulation(Arc::clone(&world) as Arc<dyn World>, Duration::from_millis(20));

        let bad = TestAgent::failing("bad");
        let good = TestAgent::new("good");
        sim.add_agent(Arc::clone(&bad) as Arc<dyn Agent>).await.unwrap();
        sim.add_agent(Arc::clone(&good) as Arc<dyn Agent>).await.unwrap();

        let result = sim.step().await;
        let Err(SimulationError::Step { source }) = result else {
            unreachable!("expected an aggregated step failure");
        };
        assert_eq!(source.faults.len(), 1);
        assert!(matches!(
            source.faults.first(),
            Some(StepFault::Agent {
                agent_id,
                stage: StepStage::Think,
                ..
            }) if agent_id == "bad"
        ));

        // The healthy agent completed its whole cycle.
        assert_eq!(good.outcomes.load(Ordering::SeqCst), 1);
        assert_eq!(world.applied.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_until_stopped() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        let agent = TestAgent::new("a");
        sim.add_agent(Arc::clone(&agent) as Arc<dyn Agent>).await.unwrap();

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let runner = tokio::spawn({
            let sim = Arc::clone(&sim);
            async move { sim.run(cancel_rx).await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        sim.stop();
        runner.await.unwrap().unwrap();

        assert!(agent.thinks.load(Ordering::SeqCst) >= 1);
        assert_eq!(sim.loop_state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_halts_ticks_and_resume_restarts_them() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        let agent = TestAgent::new("a");
        sim.add_agent(Arc::clone(&agent) as Arc<dyn Agent>).await.unwrap();

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let runner = tokio::spawn({
            let sim = Arc::clone(&sim);
            async move { sim.run(cancel_rx).await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        sim.pause().await;
        assert_eq!(sim.loop_state(), LoopState::Paused);
        assert!(sim.clock().is_paused());

        let ticks_at_pause = agent.thinks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(agent.thinks.load(Ordering::SeqCst), ticks_at_pause);

        sim.resume().await;
        assert_eq!(sim.loop_state(), LoopState::Running);
        assert!(!sim.clock().is_paused());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(agent.thinks.load(Ordering::SeqCst) > ticks_at_pause);

        sim.stop();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn resume_without_pause_is_a_noop() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        sim.resume().await;
        assert_eq!(sim.loop_state(), LoopState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_the_run_with_an_error() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let runner = tokio::spawn({
            let sim = Arc::clone(&sim);
            async move { sim.run(cancel_rx).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send_replace(true);

        let result = runner.await.unwrap();
        assert!(matches!(result, Err(SimulationError::Cancelled)));
        assert_eq!(sim.loop_state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_preempts_run() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        let agent = TestAgent::new("a");
        sim.add_agent(Arc::clone(&agent) as Arc<dyn Agent>).await.unwrap();

        sim.stop();
        sim.stop();

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        sim.run(cancel_rx).await.unwrap();

        // The loop saw the stop before its first tick.
        assert_eq!(agent.thinks.load(Ordering::SeqCst), 0);
        assert_eq!(sim.loop_state(), LoopState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn step_failure_ends_the_run() {
        let sim = simulation(TestWorld::new(), Duration::from_millis(20));
        sim.add_agent(TestAgent::failing("bad")).await.unwrap();

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let result = sim.run(cancel_rx).await;
        assert!(matches!(result, Err(SimulationError::Step { .. })));
        assert_eq!(sim.loop_state(), LoopState::Stopped);
    }
}
