//! Simulation engine binary for Lockstep.
//!
//! This is the main entry point that wires together the simulated
//! clock, event bus, world, agents, and the tick loop. It loads
//! configuration, initializes all subsystems, and runs the simulation
//! until interrupted or a step fails.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lockstep-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulated clock from clock config
//! 4. Create the event bus and attach log subscribers
//! 5. Create the world with its plugins
//! 6. Create the LLM provider
//! 7. Create and register the configured agents
//! 8. Install the interrupt handler
//! 9. Run the tick loop
//! 10. Log the result

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lockstep_core::agent::{Agent, AgentConfig, DefaultAgent};
use lockstep_core::bus::EventBus;
use lockstep_core::clock::SimClock;
use lockstep_core::config::{AgentSpec, SimulationConfig};
use lockstep_core::simulation::Simulation;
use lockstep_core::world::SimpleWorld;
use lockstep_llm::LlmProvider;
use lockstep_plugins::{MemoryPlugin, TraceAgentPlugin, TraceWorldPlugin};
use lockstep_types::EventKind;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "lockstep-config.yaml";

/// Application entry point for the Lockstep engine.
///
/// # Errors
///
/// Returns an error if any initialization step fails or the run ends
/// with a step failure.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config
    //    level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("lockstep-engine starting");
    info!(
        step_interval_ms = config.simulation.step_interval_ms,
        clock_speed = config.clock.speed,
        llm_backend = config.llm.backend,
        agent_count = config.agents.len(),
        "Configuration loaded"
    );

    // 3. Create the simulated clock.
    let clock = Arc::new(SimClock::new());
    clock.set_speed(config.clock.speed)?;
    info!(speed = clock.speed(), "Simulated clock initialized");

    // 4. Create the event bus and attach log subscribers.
    let bus = Arc::new(EventBus::new());
    attach_log_subscribers(&bus);
    info!("Event bus initialized");

    // 5. Create the world.
    let world = Arc::new(SimpleWorld::new());
    world.register_plugin(Box::new(TraceWorldPlugin::new()))?;
    info!("World created");

    // 6. Create the LLM provider, shared by every agent.
    let provider = Arc::new(LlmProvider::from_config(&config.llm)?);
    info!(provider = provider.name(), model = config.llm.model, "LLM provider ready");

    // 7. Create the orchestrator and register the configured agents.
    let simulation = Arc::new(Simulation::new(
        Arc::clone(&world) as Arc<dyn lockstep_core::world::World>,
        Arc::clone(&bus),
        Arc::clone(&clock),
        Duration::from_millis(config.simulation.step_interval_ms),
    ));

    let specs = if config.agents.is_empty() {
        info!("No agents configured, seeding defaults");
        default_agent_specs()
    } else {
        config.agents.clone()
    };

    for spec in &specs {
        let agent = build_agent(spec, &config, Arc::clone(&provider))?;
        simulation.add_agent(agent).await?;
        world.notify_agent_added(&spec.id)?;
    }
    info!(
        agent_count = simulation.agent_count().await,
        "Agents registered"
    );

    // 8. Install the interrupt handler: first interrupt requests a
    //    graceful stop, a second one cancels outright.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    {
        let simulation = Arc::clone(&simulation);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping after the current step");
                simulation.stop();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("second interrupt received, cancelling");
                cancel_tx.send_replace(true);
            }
        });
    }

    // 9. Run the tick loop.
    let result = simulation.run(cancel_rx).await;

    // 10. Log the result.
    match result {
        Ok(()) => {
            info!("lockstep-engine shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "lockstep-engine ended with an error");
            Err(e.into())
        }
    }
}

/// Load the simulation configuration from `lockstep-config.yaml`,
/// falling back to defaults when the file does not exist.
fn load_config() -> anyhow::Result<SimulationConfig> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}

/// Build one agent from its spec, with the stock plugin pipeline.
fn build_agent(
    spec: &AgentSpec,
    config: &SimulationConfig,
    provider: Arc<LlmProvider>,
) -> anyhow::Result<Arc<dyn Agent>> {
    let persona = if spec.persona.is_empty() {
        format!("You are {}, an agent in a shared simulated world.", spec.name)
    } else {
        spec.persona.clone()
    };

    let agent = DefaultAgent::new(
        AgentConfig {
            id: spec.id.clone(),
            name: spec.name.clone(),
            persona,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: (config.llm.max_tokens > 0).then_some(config.llm.max_tokens),
        },
        provider,
    )?;
    agent.register_plugin(Box::new(MemoryPlugin::default()))?;
    agent.register_plugin(Box::new(TraceAgentPlugin::new()))?;
    Ok(Arc::new(agent))
}

/// A small default cast so the engine does something out of the box.
fn default_agent_specs() -> Vec<AgentSpec> {
    vec![
        AgentSpec {
            id: String::from("wanderer"),
            name: String::from("Wanderer"),
            persona: String::from("You are a restless explorer who keeps moving."),
        },
        AgentSpec {
            id: String::from("keeper"),
            name: String::from("Keeper"),
            persona: String::from("You are a cautious record-keeper who watches and notes."),
        },
    ]
}

/// Log every event kind as it crosses the bus.
fn attach_log_subscribers(bus: &EventBus) {
    for kind in [
        EventKind::AgentJoined,
        EventKind::AgentLeft,
        EventKind::AgentAction,
        EventKind::WorldStateChange,
        EventKind::AgentInteraction,
    ] {
        bus.subscribe(kind, move |event| {
            info!(
                kind = %event.kind,
                source = event.source,
                target = event.target.as_deref(),
                timestamp = %event.timestamp,
                "event"
            );
            Ok(())
        });
    }
}
