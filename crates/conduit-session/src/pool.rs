//! Session Pool (spec.md §4.4): checkout/checkin of Session Transports
//! across providers, with capacity caps, idle reaping and caller-death
//! auto-checkin.
//!
//! "Caller death" is modeled the idiomatic Rust way rather than via an
//! Erlang-style process monitor: `checkout` returns a `SessionGuard` whose
//! `Drop` impl performs the checkin. If the calling task panics, is
//! cancelled, or simply forgets to call `checkin`, the guard's drop glue
//! still runs and releases the session back to the pool within the same
//! tick (spec.md §8 scenario S4).

use crate::protocol::SpawnOpts;
use crate::transport::{spawn_transport, TransportEvent, TransportHandle};
use conduit_core::session::SessionRef;
use conduit_core::{ConduitError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Idle,
    CheckedOut,
}

struct PoolEntry {
    provider: String,
    handle: TransportHandle,
    status: EntryStatus,
    last_active: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderCapacity {
    pub max: usize,
    pub idle_timeout: Duration,
}

impl Default for ProviderCapacity {
    fn default() -> Self {
        Self { max: 4, idle_timeout: Duration::from_secs(300) }
    }
}

struct PoolState {
    entries: HashMap<SessionRef, PoolEntry>,
    capacity: HashMap<String, ProviderCapacity>,
    next_ref: u64,
}

impl PoolState {
    fn capacity_for(&self, provider: &str) -> ProviderCapacity {
        self.capacity.get(provider).copied().unwrap_or_default()
    }

    fn count_for_provider(&self, provider: &str) -> usize {
        self.entries.values().filter(|e| e.provider == provider).count()
    }

    fn find_idle(&self, provider: &str) -> Option<SessionRef> {
        self.entries
            .iter()
            .find(|(_, e)| e.provider == provider && e.status == EntryStatus::Idle)
            .map(|(r, _)| *r)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub idle: usize,
    pub checked_out: usize,
    pub total: usize,
    pub max: usize,
}

#[derive(Clone)]
pub struct SessionPool {
    state: Arc<Mutex<PoolState>>,
}

impl SessionPool {
    pub fn new() -> Self {
        let pool = Self {
            state: Arc::new(Mutex::new(PoolState {
                entries: HashMap::new(),
                capacity: HashMap::new(),
                next_ref: 0,
            })),
        };
        pool.spawn_reaper(Duration::from_secs(30));
        pool
    }

    pub fn set_capacity(&self, provider: impl Into<String>, capacity: ProviderCapacity) {
        self.state.lock().capacity.insert(provider.into(), capacity);
    }

    /// `checkout(provider, opts)` (spec.md §4.4). Prefers an idle session,
    /// else spawns a new one under the provider's capacity cap, else fails
    /// immediately with `pool_exhausted` — no queueing (spec.md §9 open
    /// question 1, resolved: fail-without-queue).
    pub fn checkout(&self, provider: &str, opts: SpawnOpts) -> Result<SessionGuard> {
        let mut state = self.state.lock();
        if let Some(session_ref) = state.find_idle(provider) {
            let entry = state.entries.get_mut(&session_ref).expect("found idle entry must exist");
            entry.status = EntryStatus::CheckedOut;
            entry.last_active = Instant::now();
            return Ok(SessionGuard {
                session_ref,
                pool: self.state.clone(),
                released: false,
            });
        }

        let capacity = state.capacity_for(provider);
        if state.count_for_provider(provider) >= capacity.max {
            return Err(ConduitError::PoolExhausted { provider: provider.to_string() });
        }

        let (handle, mut events) = spawn_transport(opts);
        // Drain transport lifecycle events in the background; a crashed
        // worker is removed from the pool with no automatic respawn
        // (spec.md §4.4 "Worker death" semantics).
        let session_ref = SessionRef(state.next_ref);
        state.next_ref += 1;
        let state_for_monitor = self.state.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let TransportEvent::TransportClosed { .. } | TransportEvent::ReconnectFailed { .. } = event {
                    state_for_monitor.lock().entries.remove(&session_ref);
                    break;
                }
            }
        });

        state.entries.insert(
            session_ref,
            PoolEntry {
                provider: provider.to_string(),
                handle,
                status: EntryStatus::CheckedOut,
                last_active: Instant::now(),
            },
        );

        Ok(SessionGuard { session_ref, pool: self.state.clone(), released: false })
    }

    pub fn status(&self) -> HashMap<String, ProviderStatus> {
        let state = self.state.lock();
        let mut out: HashMap<String, ProviderStatus> = HashMap::new();
        for entry in state.entries.values() {
            let cap = state.capacity_for(&entry.provider);
            let status = out.entry(entry.provider.clone()).or_insert(ProviderStatus {
                idle: 0,
                checked_out: 0,
                total: 0,
                max: cap.max,
            });
            status.total += 1;
            match entry.status {
                EntryStatus::Idle => status.idle += 1,
                EntryStatus::CheckedOut => status.checked_out += 1,
            }
        }
        out
    }

    fn spawn_reaper(&self, cleanup_interval: Duration) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            loop {
                ticker.tick().await;
                let stale: Vec<(SessionRef, TransportHandle)> = {
                    let guard = state.lock();
                    guard
                        .entries
                        .iter()
                        .filter(|(_, e)| {
                            e.status == EntryStatus::Idle
                                && e.last_active.elapsed() > guard.capacity_for(&e.provider).idle_timeout
                        })
                        .map(|(r, e)| (*r, e.handle.clone()))
                        .collect()
                };
                for (session_ref, handle) in stale {
                    handle.close().await;
                    state.lock().entries.remove(&session_ref);
                }
            }
        });
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII checkout guard (GLOSSARY: Pool checkout). Dropping it checks the
/// session back in; calling `checkin` explicitly does the same without
/// waiting for drop.
pub struct SessionGuard {
    session_ref: SessionRef,
    pool: Arc<Mutex<PoolState>>,
    released: bool,
}

impl SessionGuard {
    pub fn handle(&self) -> TransportHandle {
        self.pool
            .lock()
            .entries
            .get(&self.session_ref)
            .map(|e| e.handle.clone())
            .expect("checked-out entry must still exist while guard is alive")
    }

    pub fn checkin(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = self.pool.lock();
        if let Some(entry) = state.entries.get_mut(&self.session_ref) {
            entry.status = EntryStatus::Idle;
            entry.last_active = Instant::now();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}
