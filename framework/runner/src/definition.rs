use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use stacklift_instruments::Thresholds;

use crate::cli::ScenarioCli;
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::ramp::RampProfile;

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: ScenarioCli,
    /// Used when the command line does not provide a connection string.
    default_connection_string: Option<String>,
    /// Used when the command line does not provide `--stage` flags.
    default_ramp: Option<RampProfile>,
    /// Pass/fail conditions evaluated against the aggregate stats when the run completes.
    thresholds: Thresholds,
    /// Global setup hook. Runs once, before any agents are started; an error here aborts the run.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for an agent, run once as the agent starts. An error stops that agent only.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The agent behaviours for this scenario, keyed by name. Most scenarios register a single
    /// `default` behaviour via [ScenarioDefinitionBuilder::use_agent_behaviour].
    agent_behaviour: HashMap<String, AgentHookMut<RV, V>>,
    /// Teardown hook for an agent, run as the agent stops. Best effort.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run after every agent has stopped. Best effort.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub(crate) struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub name: String,
    pub connection_string: String,
    pub ramp: RampProfile,
    pub thresholds: Thresholds,
    pub soak: bool,
    pub no_progress: bool,
    /// Behaviour name for each agent slot up to the ramp's peak target.
    pub assigned_behaviours: Vec<String>,
    pub setup_fn: Option<GlobalHookMut<RV>>,
    pub setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub agent_behaviour: HashMap<String, AgentHookMut<RV, V>>,
    pub teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and parsed command line
    /// arguments. See [ScenarioDefinitionBuilder::name] for more about the name.
    pub fn new(name: &str, cli: ScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_connection_string: None,
            default_ramp: None,
            thresholds: Thresholds::new(),
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: HashMap::new(),
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Set the connection string to use when the command line does not provide one.
    pub fn with_default_connection_string(mut self, connection_string: &str) -> Self {
        self.default_connection_string = Some(connection_string.to_string());
        self
    }

    /// Set the ramp profile to use when the command line does not provide `--stage` flags.
    pub fn with_default_ramp(mut self, ramp: RampProfile) -> Self {
        self.default_ramp = Some(ramp);
        self
    }

    /// Set the thresholds that decide whether the completed run passes.
    ///
    /// Command line threshold flags replace these for the run.
    pub fn use_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the agent setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the default agent behaviour hook for this scenario.
    pub fn use_agent_behaviour(self, behaviour: AgentHookMut<RV, V>) -> Self {
        self.use_named_agent_behaviour("default", behaviour)
    }

    /// Set a named agent behaviour hook for this scenario.
    pub fn use_named_agent_behaviour(
        mut self,
        name: &str,
        behaviour: AgentHookMut<RV, V>,
    ) -> Self {
        let previous = self.agent_behaviour.insert(name.to_string(), behaviour);

        if previous.is_some() {
            panic!("Behaviour [{}] is already defined", name);
        }

        self
    }

    /// Set the agent teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn].
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn].
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let connection_string = self
            .cli
            .connection_string
            .clone()
            .or(self.default_connection_string)
            .context("No connection string provided and the scenario does not define a default")?;

        let ramp = if self.cli.stage.is_empty() {
            self.default_ramp
                .context("No ramp profile provided and the scenario does not define a default")?
        } else {
            RampProfile::new(self.cli.stage.clone())?
        };

        let thresholds = resolve_thresholds(&self.cli, self.thresholds);
        let assigned_behaviours =
            assign_behaviours(&self.cli.behaviour, &self.agent_behaviour, ramp.peak_target())?;

        Ok(ScenarioDefinition {
            name: self.name,
            connection_string,
            ramp,
            thresholds,
            soak: self.cli.soak,
            no_progress: self.cli.no_progress,
            assigned_behaviours,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            agent_behaviour: self.agent_behaviour,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

fn resolve_thresholds(cli: &ScenarioCli, scenario_thresholds: Thresholds) -> Thresholds {
    if cli.threshold_error_rate.is_none() && cli.threshold_p95_ms.is_none() {
        return scenario_thresholds;
    }

    let mut thresholds = Thresholds::new();
    if let Some(rate) = cli.threshold_error_rate {
        thresholds = thresholds.error_rate_below(rate);
    }
    if let Some(limit_ms) = cli.threshold_p95_ms {
        thresholds = thresholds.latency_quantile_below_ms(0.95, limit_ms);
    }

    thresholds
}

/// Expand `behaviour:count` assignments into one behaviour name per agent slot, filling the
/// remainder with `default`. Agents beyond the peak (spawned after a ramp down and back up)
/// reuse these slots round-robin.
fn assign_behaviours<RV: UserValuesConstraint, V: UserValuesConstraint>(
    requested: &[(String, usize)],
    registered: &HashMap<String, AgentHookMut<RV, V>>,
    peak_target: usize,
) -> anyhow::Result<Vec<String>> {
    let mut assigned = Vec::with_capacity(peak_target);

    for (name, count) in requested {
        anyhow::ensure!(
            registered.contains_key(name),
            "Behaviour [{name}] is not defined by this scenario"
        );
        for _ in 0..*count {
            assigned.push(name.clone());
        }
    }

    anyhow::ensure!(
        assigned.len() <= peak_target,
        "Assigned {} agents to behaviours but the ramp profile peaks at {}",
        assigned.len(),
        peak_target
    );

    while assigned.len() < peak_target {
        assigned.push("default".to_string());
    }

    Ok(assigned)
}
