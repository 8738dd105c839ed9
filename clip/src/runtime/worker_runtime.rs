//! Runtime helper for spawning background consume loops.
//!
//! Each loop owns a named OS thread driving a current-thread Tokio runtime. The
//! spawner waits for the loop to signal readiness (connection established, queue
//! declared, subscription registered) and stops it through a one-shot shutdown
//! signal.

use crate::error::{ClipError, ClipResult};
use crate::observability::{events, fields};
use std::future::Future;
use std::thread;
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub(crate) const DEFAULT_CONSUME_LOOP_THREAD_NAME: &str = "clip-consume";
const CONSUME_LOOP_THREAD_NAME_MAX_LEN: usize = 15;
const COMPONENT: &str = "worker_runtime";

/// Deadline for a consume loop to become ready.
pub(crate) const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Sent once by the loop when it is ready (or failed to get ready).
pub(crate) type ReadySignal<T> = oneshot::Sender<ClipResult<T>>;
/// Resolves when the owner asks the loop to stop, or drops its handle.
pub(crate) type ShutdownSignal = oneshot::Receiver<()>;

/// Owner side of a running consume loop.
pub(crate) struct ConsumeLoopHandle {
    worker_thread: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl ConsumeLoopHandle {
    pub(crate) fn worker_thread(&self) -> &str {
        &self.worker_thread
    }

    pub(crate) fn is_running(&self) -> bool {
        self.join
            .as_ref()
            .is_some_and(|join| !join.is_finished())
    }

    /// Signals the loop and waits for its thread to exit. Idempotent.
    pub(crate) async fn shutdown(&mut self) -> ClipResult<()> {
        let Some(join) = self.join.take() else {
            return Ok(());
        };
        if let Some(shutdown) = self.shutdown.take() {
            // The loop may already be gone; the join below reports how it ended.
            let _ = shutdown.send(());
        }

        let worker_thread = self.worker_thread.clone();
        match tokio::task::spawn_blocking(move || join.join()).await {
            Ok(Ok(())) => {
                debug!(
                    event = events::CONSUME_LOOP_STOPPED,
                    component = COMPONENT,
                    worker_thread = worker_thread.as_str(),
                    "consume loop stopped"
                );
                Ok(())
            }
            Ok(Err(_)) => Err(ClipError::transport(format!(
                "consume loop thread {worker_thread} panicked"
            ))),
            Err(err) => Err(ClipError::transport(format!(
                "unable to join consume loop thread {worker_thread}: {err}"
            ))),
        }
    }

    /// Signals the loop without waiting for it.
    fn detach(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.join.take();
    }
}

/// Builds a thread name of at most 15 bytes (the Linux limit) from a prefix and an id.
pub(crate) fn build_runtime_thread_name(prefix: &str, id: &str) -> String {
    let suffix_len = CONSUME_LOOP_THREAD_NAME_MAX_LEN.saturating_sub(prefix.len());
    let suffix: String = id
        .chars()
        .filter(|ch| ch.is_ascii_hexdigit())
        .take(suffix_len)
        .collect();

    if suffix_len > 0 && suffix.len() == suffix_len {
        format!("{prefix}{suffix}")
    } else {
        debug!(
            event = events::RUNTIME_THREAD_NAME_FALLBACK,
            component = COMPONENT,
            reason = fields::REASON_INVALID_THREAD_NAME,
            prefix,
            "falling back to default consume loop thread name"
        );
        DEFAULT_CONSUME_LOOP_THREAD_NAME.to_string()
    }
}

/// Spawns `run_loop` on a dedicated runtime thread and waits until it reports ready.
///
/// On readiness the value the loop sent is returned with the handle. If the loop fails
/// to start, exits early or misses `start_timeout`, it is told to shut down and the
/// error is returned.
pub(crate) async fn spawn_consume_loop<T, F, Fut>(
    thread_name: String,
    start_timeout: Duration,
    run_loop: F,
) -> ClipResult<(ConsumeLoopHandle, T)>
where
    T: Send + 'static,
    F: FnOnce(ReadySignal<T>, ShutdownSignal) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let (ready_tx, ready_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    debug!(
        event = events::RUNTIME_SPAWN_START,
        component = COMPONENT,
        worker_thread = thread_name.as_str(),
        "spawning consume loop"
    );

    let join = thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = ready_tx.send(Err(ClipError::transport(format!(
                        "unable to build consume loop runtime: {err}"
                    ))));
                    return;
                }
            };

            runtime.block_on(run_loop(ready_tx, shutdown_rx));
        })
        .map_err(|err| {
            warn!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                worker_thread = thread_name.as_str(),
                err = %err,
                "unable to spawn consume loop thread"
            );
            ClipError::transport(format!("unable to spawn thread {thread_name}: {err}"))
        })?;

    let mut handle = ConsumeLoopHandle {
        worker_thread: thread_name,
        shutdown: Some(shutdown_tx),
        join: Some(join),
    };

    match tokio::time::timeout(start_timeout, ready_rx).await {
        Ok(Ok(Ok(value))) => {
            debug!(
                event = events::RUNTIME_SPAWN_OK,
                component = COMPONENT,
                worker_thread = handle.worker_thread(),
                "consume loop ready"
            );
            Ok((handle, value))
        }
        Ok(Ok(Err(err))) => {
            handle.shutdown().await?;
            Err(err)
        }
        Ok(Err(_)) => {
            handle.shutdown().await?;
            Err(ClipError::transport(format!(
                "consume loop {} exited before becoming ready",
                handle.worker_thread()
            )))
        }
        Err(_) => {
            warn!(
                event = events::RUNTIME_SPAWN_FAILED,
                component = COMPONENT,
                worker_thread = handle.worker_thread(),
                "consume loop missed its start deadline"
            );
            handle.detach();
            Err(ClipError::Timeout(start_timeout))
        }
    }
}
