use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// `0` restarts forever.
    pub max_restarts: u32,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_restarts: 10,
        }
    }
}

/// Run `run_component` on `tracker`, restarting it with exponential backoff
/// whenever it fails or returns before `cancel` fires.
pub fn spawn_supervised<F, Fut>(
    tracker: &TaskTracker,
    cancel: CancellationToken,
    name: &'static str,
    policy: RestartPolicy,
    mut run_component: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    tracker.spawn(async move {
        let initial = policy.initial_backoff.max(Duration::from_millis(1));
        let max_backoff = policy.max_backoff.max(initial);
        let mut backoff = initial;
        let mut consecutive_failures: u32 = 0;

        loop {
            tracing::info!(component = name, "Component starting");
            match run_component().await {
                Ok(()) if cancel.is_cancelled() => {
                    tracing::info!(component = name, "Component stopped");
                    return;
                }
                Ok(()) => {
                    tracing::warn!(component = name, "Component exited unexpectedly");
                    backoff = initial;
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
                Err(error) => {
                    tracing::error!(component = name, "Component failed: {error:#}");
                    consecutive_failures = consecutive_failures.saturating_add(1);
                }
            }

            if policy.max_restarts > 0 && consecutive_failures > policy.max_restarts {
                tracing::error!(
                    component = name,
                    max_restarts = policy.max_restarts,
                    "Component exceeded max restarts, giving up"
                );
                return;
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!(component = name, "Component stopped during backoff");
                    return;
                }
                () = tokio::time::sleep(backoff) => {}
            }
            backoff = backoff.saturating_mul(2).min(max_backoff);
        }
    });
}
