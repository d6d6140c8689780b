use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, error, warn};

use super::{ProcessSupervisorClient, SupervisorDaemon, SupervisorError};

/// Connect, run one operation, disconnect.
#[derive(Debug)]
pub struct SupervisorSession;

impl SupervisorSession {
    /// Runs `op` inside a daemon session.
    ///
    /// Once `connect` succeeds, `disconnect` runs exactly once whether `op`
    /// returns, fails or panics. A panic comes back as
    /// [`SupervisorError::Panicked`]. A failed disconnect is logged and does
    /// not replace the operation's result.
    pub async fn scoped<T, E, F, Fut>(daemon: Arc<dyn SupervisorDaemon>, op: F) -> Result<T, E>
    where
        F: FnOnce(ProcessSupervisorClient) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SupervisorError>,
    {
        daemon.connect().await.map_err(E::from)?;
        debug!("Supervisor session opened");

        let client = ProcessSupervisorClient::new(Arc::clone(&daemon));
        let result = AssertUnwindSafe(async move { op(client).await })
            .catch_unwind()
            .await;

        match daemon.disconnect().await {
            Ok(()) => debug!("Supervisor session closed"),
            Err(err) => warn!(error = %err, "Supervisor disconnect failed"),
        }

        match result {
            Ok(result) => result,
            Err(_) => {
                error!("Supervisor operation panicked");
                Err(E::from(SupervisorError::Panicked))
            }
        }
    }
}
