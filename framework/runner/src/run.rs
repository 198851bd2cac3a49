use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use stacklift_core::prelude::{
    AgentBailError, ShutdownHandle, ShutdownListener, ShutdownSignalError,
};
use stacklift_instruments::{ReportConfig, RunStats, ThresholdReport};

use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::definition::{AgentHookMut, ScenarioDefinitionBuilder};
use crate::executor::Executor;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::shutdown::start_shutdown_listener;

/// How often the scheduler re-reads the ramp profile and adjusts the agent population.
const SCHEDULER_TICK: Duration = Duration::from_millis(100);

/// Final outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStats,
    pub thresholds: ThresholdReport,
}

impl RunReport {
    /// Whether every configured threshold held. A failed report should fail the process, the
    /// same way a breached threshold fails a CI load test.
    pub fn passed(&self) -> bool {
        self.thresholds.passed()
    }
}

struct AgentHandle {
    stop: ShutdownHandle,
    thread: std::thread::JoinHandle<()>,
}

pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunReport> {
    let definition = definition.build()?;

    log::info!("Running scenario: {}", definition.name);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(ReportConfig::default().enable_summary().init());

    let mut runner_context = RunnerContext::new(
        executor,
        reporter.clone(),
        shutdown_handle.clone(),
        definition.connection_string.clone(),
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    // After setup, a time-bounded run gets a progress bar and an end-of-run timer. Soak runs
    // have neither; they continue until stopped.
    let planned_runtime = definition.ramp.total_duration();
    if !definition.soak {
        if !definition.no_progress {
            start_progress(planned_runtime, shutdown_handle.new_listener());
        }

        let timer_handle = shutdown_handle.clone();
        runner_context.executor().spawn(async move {
            tokio::time::sleep(planned_runtime).await;
            timer_handle.shutdown();
        });
    }

    let runner_context = Arc::new(runner_context);
    let runner_context_for_teardown = runner_context.clone();

    // Agents are about to start; watch for the harness itself hogging the CPU, which would make
    // the reported latencies misleading.
    start_monitor(shutdown_handle.new_listener());

    let mut scheduler_shutdown = shutdown_handle.new_listener();
    let started_at = Instant::now();
    let mut running: Vec<AgentHandle> = Vec::new();
    let mut stopping: Vec<AgentHandle> = Vec::new();
    let mut next_agent_index = 0;

    loop {
        if scheduler_shutdown.should_shutdown() {
            break;
        }

        let desired = if definition.soak {
            definition.ramp.peak_target()
        } else {
            definition.ramp.target_at(started_at.elapsed())
        };

        while running.len() < desired {
            let behaviour_name =
                assigned_behaviour(&definition.assigned_behaviours, next_agent_index);
            let behaviour_fn = definition.agent_behaviour.get(&behaviour_name).copied();

            running.push(spawn_agent(
                next_agent_index,
                runner_context.clone(),
                shutdown_handle.new_listener(),
                shutdown_handle.new_listener(),
                definition.setup_agent_fn,
                behaviour_fn,
                definition.teardown_agent_fn,
            )?);
            next_agent_index += 1;
        }

        // The newest agents stop first. A stopped agent finishes its current iteration
        // naturally rather than being interrupted.
        while running.len() > desired {
            if let Some(agent) = running.pop() {
                agent.stop.shutdown();
                stopping.push(agent);
            }
        }

        std::thread::sleep(SCHEDULER_TICK);
    }

    // An agent spawned in the same tick the shutdown fired subscribes too late to see the global
    // signal, so stop every remaining agent through its own handle before joining.
    for agent in running.into_iter().chain(stopping) {
        agent.stop.shutdown();
        agent
            .thread
            .join()
            .map_err(|e| anyhow::anyhow!("Error joining thread for test agent: {:?}", e))?;
    }

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'.
        if let Err(e) = teardown_fn(runner_context_for_teardown) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    let stats = reporter.finalize();
    let thresholds = definition.thresholds.evaluate(&stats);

    if !definition.thresholds.is_empty() {
        print_thresholds(&thresholds);
    }

    Ok(RunReport { stats, thresholds })
}

fn print_thresholds(report: &ThresholdReport) {
    println!("\nThresholds");
    for result in report.results() {
        let mark = if result.passed { "✓" } else { "✗" };
        println!("  {mark} {} (observed {})", result.name, result.observed);
    }
}

fn assigned_behaviour(assigned: &[String], agent_index: usize) -> String {
    if assigned.is_empty() {
        "default".to_string()
    } else {
        assigned[agent_index % assigned.len()].clone()
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_agent<RV: UserValuesConstraint, V: UserValuesConstraint>(
    agent_index: usize,
    runner_context: Arc<RunnerContext<RV>>,
    mut cycle_listener: ShutdownListener,
    delegated_listener: ShutdownListener,
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    behaviour_fn: Option<AgentHookMut<RV, V>>,
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
) -> anyhow::Result<AgentHandle> {
    let stop = ShutdownHandle::new();
    let mut personal_stop = stop.new_listener();

    let agent_id = format!("agent-{}", agent_index);

    let thread = std::thread::Builder::new()
        .name(agent_id.clone())
        .spawn(move || {
            let mut context =
                AgentContext::new(agent_id.clone(), runner_context, delegated_listener);

            if let Some(setup_agent_fn) = setup_agent_fn {
                if let Err(e) = setup_agent_fn(&mut context) {
                    log::error!("Agent setup failed for agent {}: {:?}", agent_id, e);
                    return;
                }
            }

            if let Some(behaviour) = behaviour_fn {
                loop {
                    if cycle_listener.should_shutdown() || personal_stop.should_shutdown() {
                        log::debug!("Stopping agent {}", agent_id);
                        break;
                    }

                    match behaviour(&mut context) {
                        Ok(()) => {}
                        Err(e) if e.is::<ShutdownSignalError>() => {
                            // Expected when the run shuts down mid-iteration; the check at the
                            // top of the loop will break out.
                        }
                        Err(e) if e.is::<AgentBailError>() => {
                            log::warn!("Agent {} is bailing", agent_id);
                            break;
                        }
                        Err(e) => {
                            log::error!("Agent behaviour failed: {:?}", e);
                        }
                    }
                }
            }

            if let Some(teardown_agent_fn) = teardown_agent_fn {
                if let Err(e) = teardown_agent_fn(&mut context) {
                    log::error!("Agent teardown failed for agent {}: {:?}", agent_id, e);
                }
            }
        })
        .context("Failed to spawn thread for test agent")?;

    Ok(AgentHandle { stop, thread })
}
