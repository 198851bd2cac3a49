use std::future::Future;

use stacklift_core::prelude::{ShutdownHandle, ShutdownSignalError};

/// Bridges the synchronous hook functions and the async runtime that network calls run on.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking the calling agent until it completes.
    ///
    /// The future is cancelled if the run shuts down; the resulting error carries a
    /// [ShutdownSignalError] which the runner recognises and handles. Submitting a future that
    /// cannot be cancelled may prevent the runner from shutting down.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Submit async code to run in the background.
    ///
    /// The future is not cancelled on shutdown and the runner does not wait for it. In behaviour
    /// hooks, prefer [Executor::execute_in_place] so the iteration finishes before the next one
    /// is scheduled.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}
