//! Background sweeper that deletes expired sessions.
//!
//! Runs on a plain thread: the work is a single short SQLite statement and
//! holds the connection mutex only for its duration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core_state::CoreState;

/// Sweep every hour.
const SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY_SECS: u64 = 1;

/// Handle for the sweeper thread. Dropping it stops and joins the thread.
pub struct SessionSweeperHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl SessionSweeperHandle {
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for SessionSweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

pub fn start_session_sweeper(core: Arc<CoreState>) -> SessionSweeperHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();

    let handle = std::thread::spawn(move || {
        tracing::info!("Session sweeper started (every {}s)", SWEEP_INTERVAL_SECS);
        sweeper_loop(&core, &flag);
    });

    SessionSweeperHandle {
        shutdown,
        handle: Some(handle),
    }
}

fn sweeper_loop(core: &CoreState, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        sweep_once(core);

        for _ in 0..(SWEEP_INTERVAL_SECS / SLEEP_GRANULARITY_SECS) {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            std::thread::sleep(Duration::from_secs(SLEEP_GRANULARITY_SECS));
        }
    }
    tracing::info!("Session sweeper shutting down");
}

/// One sweep pass. Returns the number of sessions removed.
pub fn sweep_once(core: &CoreState) -> usize {
    let result = core
        .db()
        .map_err(|e| e.to_string())
        .and_then(|conn| super::purge_expired_sessions(&conn).map_err(|e| e.to_string()));
    match result {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(removed, "Purged expired sessions");
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session sweep failed");
            0
        }
    }
}
