use std::time::Duration;

use anyhow::Context;

/// One stage of a ramp: over `duration`, the concurrent agent count moves linearly from the
/// previous stage's target (initially zero) to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampStage {
    pub duration: Duration,
    pub target: usize,
}

impl RampStage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// The schedule for concurrent agents over the life of a run.
///
/// The profile starts from zero agents and interpolates linearly between stage targets, so
/// `[10s:5, 30s:5, 10s:0]` ramps up to 5 agents over ten seconds, holds for thirty, then ramps
/// back down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampProfile {
    stages: Vec<RampStage>,
}

impl RampProfile {
    pub fn new(stages: Vec<RampStage>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !stages.is_empty(),
            "A ramp profile requires at least one stage"
        );

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[RampStage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|stage| stage.duration).sum()
    }

    pub fn peak_target(&self) -> usize {
        self.stages
            .iter()
            .map(|stage| stage.target)
            .max()
            .unwrap_or(0)
    }

    /// The interpolated agent target at `elapsed` since the start of the run, rounded to the
    /// nearest whole agent. Past the end of the profile this holds the final stage's target.
    pub fn target_at(&self, elapsed: Duration) -> usize {
        let mut from = 0usize;
        let mut offset = Duration::ZERO;

        for stage in &self.stages {
            let end = offset + stage.duration;
            if elapsed < end {
                if stage.duration.is_zero() {
                    return stage.target;
                }

                let fraction =
                    (elapsed - offset).as_secs_f64() / stage.duration.as_secs_f64();
                let value = from as f64 + (stage.target as f64 - from as f64) * fraction;
                return value.round() as usize;
            }

            from = stage.target;
            offset = end;
        }

        from
    }
}

/// Parse a stage given as `<duration>:<target>`, for example `10s:5` or `500ms:2`.
pub fn parse_stage(s: &str) -> anyhow::Result<RampStage> {
    let (duration, target) = s
        .split_once(':')
        .context("Stage must be in the form <duration>:<target>")?;

    let target = target
        .trim()
        .parse::<usize>()
        .with_context(|| format!("Invalid stage target [{target}]"))?;

    Ok(RampStage::new(parse_duration(duration.trim())?, target))
}

fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    if let Some(millis) = s.strip_suffix("ms") {
        millis
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("Invalid duration [{s}]"))
    } else if let Some(minutes) = s.strip_suffix('m') {
        minutes
            .parse::<u64>()
            .map(|m| Duration::from_secs(m * 60))
            .with_context(|| format!("Invalid duration [{s}]"))
    } else {
        // Seconds, with or without the suffix.
        s.strip_suffix('s')
            .unwrap_or(s)
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("Invalid duration [{s}]"))
    }
}
