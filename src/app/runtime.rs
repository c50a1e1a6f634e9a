use super::{OnvifcamOrchestrator, ShutdownReason, ShutdownTrigger};
use crate::error::{OnvifcamError, Result, ServerError};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

impl OnvifcamOrchestrator {
    /// Run until a signal or a shutdown request arrives, then tear down.
    /// Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("onvifcam is running in {} mode", self.mode);

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| OnvifcamError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers();

        let shutdown_reason = tokio::select! {
            reason = shutdown_receiver => reason.map_err(|_| {
                OnvifcamError::system("Shutdown channel closed unexpectedly")
            })?,
            message = server_exit(&mut self.server_task) => {
                error!("Event server stopped: {}", message);
                ShutdownReason::Error(message)
            }
        };

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let failures = self.shutdown().await?;
        if failures > 0 {
            warn!("{} teardown step(s) did not complete cleanly", failures);
        }

        let exit_code = match shutdown_reason {
            ShutdownReason::Error(_) => 1,
            ShutdownReason::Signal(_) | ShutdownReason::UserRequest => 0,
        };

        info!("onvifcam shutdown complete");
        Ok(exit_code)
    }

    fn setup_signal_handlers(&self) {
        #[cfg(unix)]
        {
            let trigger = self.shutdown_trigger();
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            trigger
                                .trigger(ShutdownReason::Signal("SIGTERM".to_string()))
                                .await;
                        }
                    }
                    Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        let trigger: ShutdownTrigger = self.shutdown_trigger();
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                trigger
                    .trigger(ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}

/// Resolves when the event server task ends on its own; pending forever when
/// there is no server
async fn server_exit(task: &mut Option<JoinHandle<std::result::Result<(), ServerError>>>) -> String {
    let Some(handle) = task.as_mut() else {
        return std::future::pending().await;
    };

    let message = match handle.await {
        Ok(Ok(())) => "stopped without a shutdown request".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    *task = None;
    message
}
