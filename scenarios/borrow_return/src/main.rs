use std::time::Duration;

use library_client_instrumented::prelude::{LibraryClient, SessionToken};
use stacklift_runner::prelude::*;

mod workflow;

/// Credentials for the load-test user. The account must exist before the run starts.
const USERNAME: &str = "1";
const PASSWORD: &str = "1";

/// Think-time between iterations, also applied when an iteration ends early.
const THINK_TIME: Duration = Duration::from_secs(1);

#[derive(Default, Debug)]
struct LibraryRunnerContext {
    token: Option<SessionToken>,
}

impl UserValuesConstraint for LibraryRunnerContext {}

#[derive(Default, Debug)]
struct LibraryAgentContext {
    client: Option<LibraryClient>,
}

impl UserValuesConstraint for LibraryAgentContext {}

fn setup(ctx: &mut RunnerContext<LibraryRunnerContext>) -> HookResult {
    let client = LibraryClient::new(ctx.get_connection_string(), ctx.reporter())?;

    let response = ctx
        .executor()
        .execute_in_place(async { Ok(client.login(USERNAME, PASSWORD).await?) })?;

    // Anything short of a usable token is fatal: every iteration depends on it.
    let token = workflow::extract_token(response)?;

    log::info!("Authenticated as user [{USERNAME}]");
    ctx.get_mut().token = Some(token);

    Ok(())
}

fn agent_setup(ctx: &mut AgentContext<LibraryRunnerContext, LibraryAgentContext>) -> HookResult {
    let client = LibraryClient::new(
        ctx.runner_context().get_connection_string(),
        ctx.runner_context().reporter(),
    )?;
    ctx.get_mut().client = Some(client);

    Ok(())
}

fn agent_behaviour(
    ctx: &mut AgentContext<LibraryRunnerContext, LibraryAgentContext>,
) -> HookResult {
    let client = ctx.get().client.clone().unwrap();
    let token = ctx.runner_context().get().token.clone().unwrap();

    let outcome = ctx
        .runner_context()
        .executor()
        .execute_in_place(async move {
            Ok(workflow::borrow_return_cycle(&client, &token, THINK_TIME).await)
        })?;

    log::debug!("Iteration finished: {outcome:?}");

    Ok(())
}

fn main() -> StackliftResult<()> {
    let cli = init();

    let builder = ScenarioDefinitionBuilder::<LibraryRunnerContext, LibraryAgentContext>::new(
        env!("CARGO_PKG_NAME"),
        cli,
    )
    .with_default_connection_string("http://127.0.0.1:5000")
    .with_default_ramp(RampProfile::new(vec![
        RampStage::new(Duration::from_secs(10), 5),
        RampStage::new(Duration::from_secs(30), 5),
        RampStage::new(Duration::from_secs(10), 0),
    ])?)
    .use_thresholds(
        Thresholds::new()
            .error_rate_below(0.02)
            .latency_quantile_below_ms(0.95, 1000.0),
    )
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(agent_behaviour);

    let report = run(builder)?;

    anyhow::ensure!(report.passed(), "One or more thresholds were breached");

    Ok(())
}
