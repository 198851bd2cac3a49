mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod ramp;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::cli::ScenarioCli;
    pub use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::ramp::{RampProfile, RampStage};
    pub use crate::run::{run, RunReport};
    pub use crate::types::StackliftResult;

    pub use stacklift_core::prelude::{AgentBailError, ShutdownListener, ShutdownSignalError};
    pub use stacklift_instruments::{OperationRecord, Reporter, Thresholds};
}
