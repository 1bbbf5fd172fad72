//! Periodic task thread with early trigger and idempotent stop

use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct WakeState {
    triggered: bool,
    stopped: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<WakeState>,
    wake: Condvar,
}

/// Runs a task on its own thread once per period, or sooner when triggered
///
/// The task runs once right after start. After that the thread waits for
/// the period to elapse, a [`trigger`](Self::trigger) or a
/// [`stop`](Self::stop), whichever comes first.
#[derive(Debug)]
pub struct CyclicWorker {
    name: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl CyclicWorker {
    /// Spawn the worker thread
    pub fn start<F>(name: &str, period: Duration, mut task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    task();

                    let mut state = thread_shared.state.lock();
                    if !state.triggered && !state.stopped {
                        thread_shared.wake.wait_while_for(
                            &mut state,
                            |s| !s.triggered && !s.stopped,
                            period,
                        );
                    }
                    if state.stopped {
                        break;
                    }
                    state.triggered = false;
                }
            })?;

        debug!(worker = name, ?period, "cyclic worker started");
        Ok(Self {
            name: name.to_string(),
            shared,
            handle: Some(handle),
        })
    }

    /// Run the task as soon as possible instead of waiting for the period
    pub fn trigger(&self) {
        self.shared.state.lock().triggered = true;
        self.shared.wake.notify_one();
    }

    /// True until [`stop`](Self::stop) completes
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the thread and wait for it; further calls do nothing
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.state.lock().stopped = true;
        self.shared.wake.notify_one();
        if handle.join().is_err() {
            tracing::error!(worker = %self.name, "cyclic worker panicked");
        }
        debug!(worker = %self.name, "cyclic worker stopped");
    }
}

impl Drop for CyclicWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
