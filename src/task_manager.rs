//! Owns the background tasks of the binary and stops them together.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Spawns named tasks, broadcasts shutdown to them and waits for them.
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl TaskManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Spawns `future` and remembers it under `name`.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.lock_handles().push((name, handle));
    }

    /// A receiver that flips to `true` when shutdown begins.
    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Signals shutdown and waits for every spawned task to finish.
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);

        let handles: Vec<_> = self.lock_handles().drain(..).collect();
        info!("Waiting for {} tasks to stop...", handles.len());

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut failed = 0;
        for (task_name, result) in names.into_iter().zip(results) {
            match result {
                Ok(()) => debug!(task_name, "Task stopped."),
                Err(e) => {
                    error!(task_name, error = %e, "Task panicked or was cancelled.");
                    failed += 1;
                }
            }
        }

        if failed == 0 {
            info!("All tasks stopped.");
        } else {
            error!("{} tasks did not stop cleanly.", failed);
        }
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<(&'static str, JoinHandle<()>)>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
