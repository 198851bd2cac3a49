/// Return this error from an agent's behaviour function to indicate that the agent is bailing.
///
/// Use this when an agent hits a problem that is fatal to that agent but not to the run as a
/// whole. The runner stops scheduling iterations for the bailing agent and the remaining agents
/// carry on.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct AgentBailError {
    msg: String,
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self {
            msg: "Agent is bailing".to_string(),
        }
    }
}
