use clap::Parser;

use crate::ramp::{parse_stage, RampStage};

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct ScenarioCli {
    /// Base URL for the service to test.
    ///
    /// Falls back to the scenario's default when not provided.
    #[clap(short, long)]
    pub connection_string: Option<String>,

    /// Override the scenario's ramp profile with a stage in the format `<duration>:<target>`,
    /// for example `--stage 10s:5`.
    ///
    /// Repeat the flag to build a multi-stage profile; stages apply in the order given and the
    /// agent count interpolates linearly between their targets, starting from zero.
    #[clap(long, value_parser = parse_stage)]
    pub stage: Vec<RampStage>,

    /// Assign a behaviour to a number of agents. Specify the behaviour and the number of agents
    /// to assign it to in the format `behaviour:count`, for example `--behaviour=borrow:5`.
    ///
    /// The count is optional and defaults to 1. You can specify multiple behaviours by using the
    /// flag multiple times. The total assigned count must not exceed the ramp's peak target;
    /// any remaining agents run the default behaviour.
    #[clap(long, short, value_parser = parse_agent_behaviour)]
    pub behaviour: Vec<(String, usize)>,

    /// Run this test as a soak test: hold the ramp's peak agent count and keep running until
    /// stopped, ignoring the configured end of the profile.
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// Recommended for CI/CD environments where the bar just adds noise to captured logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Replace the scenario's thresholds with a failed-check rate limit, e.g. `0.02` for 2%.
    ///
    /// When either threshold flag is given, only the flagged thresholds apply to the run.
    #[clap(long)]
    pub threshold_error_rate: Option<f64>,

    /// Replace the scenario's thresholds with a 95th-percentile latency limit in milliseconds.
    ///
    /// When either threshold flag is given, only the flagged thresholds apply to the run.
    #[clap(long)]
    pub threshold_p95_ms: Option<f64>,
}

fn parse_agent_behaviour(s: &str) -> anyhow::Result<(String, usize)> {
    let mut parts = s.split(':');
    let name = parts
        .next()
        .map(|s| s.to_string())
        .ok_or(anyhow::anyhow!("No name specified for behaviour"))?;

    let count = parts.next().and_then(|s| s.parse::<usize>().ok()).unwrap_or(1);

    Ok((name, count))
}
