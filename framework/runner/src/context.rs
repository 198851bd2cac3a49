use std::{fmt::Debug, sync::Arc};

use stacklift_core::prelude::{ShutdownHandle, ShutdownListener};
use stacklift_instruments::Reporter;

use crate::executor::Executor;

/// Values stored in the runner and agent contexts must satisfy this constraint so that contexts
/// can be created up front and shared across agent threads.
pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// Run-scoped context, created before setup and shared read-only with every agent.
///
/// The scenario's setup hook is the only place that sees this context mutably; once agents are
/// running, values placed here are frozen for the rest of the run.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: String,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: String,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    pub fn get_connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Stop the whole scenario early. In-flight work is cancelled and the run proceeds to
    /// reporting as if the configured duration had elapsed.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// Per-agent context handed to the agent setup, behaviour and teardown hooks.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_id: String,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: ShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        agent_id: String,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: ShutdownListener,
    ) -> Self {
        Self {
            agent_id,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// Listener for the run-level stop signal, for behaviours that want to react to shutdown
    /// themselves rather than rely on [crate::executor::Executor::execute_in_place] cancellation.
    pub fn shutdown_listener(&mut self) -> &mut ShutdownListener {
        &mut self.shutdown_listener
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
