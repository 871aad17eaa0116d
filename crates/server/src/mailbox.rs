//! In-memory hand-off between the OAuth callback and the polling front end.
//!
//! The login popup lands on `/callback`, which deposits the profile here.
//! The original page polls `/check-status`, which drains it. Only one login
//! is expected in flight at a time: a poll returns the most recent deposit
//! and clears everything, so two racing logins lose the older profile.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use wxlogin_api::LoginProfile;

struct Entry {
    profile: LoginProfile,
    deposited_at: Instant,
    seq: u64,
}

#[derive(Default)]
struct Slots {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Single-slot, last-write-wins login mailbox.
#[derive(Clone)]
pub struct Mailbox {
    slots: Arc<Mutex<Slots>>,
    ttl: Duration,
}

impl Mailbox {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            ttl,
        }
    }

    // Entries are plain data, so a panic mid-update cannot leave them torn.
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a profile under its user key, replacing any previous entry.
    pub fn deposit(&self, user_key: impl Into<String>, profile: LoginProfile) {
        self.deposit_at(user_key.into(), profile, Instant::now());
    }

    fn deposit_at(&self, user_key: String, profile: LoginProfile, now: Instant) {
        let mut slots = self.slots();
        let seq = slots.next_seq;
        slots.next_seq += 1;
        if !slots.entries.is_empty() && !slots.entries.contains_key(&user_key) {
            tracing::warn!("login mailbox already holds an unclaimed profile; newest deposit wins");
        }
        slots.entries.insert(
            user_key,
            Entry {
                profile,
                deposited_at: now,
                seq,
            },
        );
    }

    /// Take the most recently deposited live profile and empty the mailbox.
    pub fn poll_and_clear(&self) -> Option<LoginProfile> {
        self.poll_and_clear_at(Instant::now())
    }

    fn poll_and_clear_at(&self, now: Instant) -> Option<LoginProfile> {
        let mut slots = self.slots();
        let ttl = self.ttl;
        let newest = slots
            .entries
            .drain()
            .map(|(_, entry)| entry)
            .filter(|entry| now.saturating_duration_since(entry.deposited_at) < ttl)
            .max_by_key(|entry| entry.seq);
        newest.map(|entry| entry.profile)
    }

    /// Drop entries older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    fn sweep_expired_at(&self, now: Instant) -> usize {
        let mut slots = self.slots();
        let before = slots.entries.len();
        let ttl = self.ttl;
        slots
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.deposited_at) < ttl);
        before - slots.entries.len()
    }

    pub fn len(&self) -> usize {
        self.slots().entries.len()
    }
}

/// Periodically sweep expired logins and states in the background.
pub fn spawn_sweeper(mailbox: Mailbox, states: StateStore) -> JoinHandle<()> {
    let period = (mailbox.ttl / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = mailbox.sweep_expired();
            if removed > 0 {
                tracing::info!("login mailbox: dropped {removed} unclaimed profile(s)");
            }
            let stale = states.sweep_expired();
            if stale > 0 {
                tracing::debug!("dropped {stale} expired OAuth state(s)");
            }
        }
    })
}

/// Upper bound on outstanding states; `/qrcode` is unauthenticated.
pub const MAX_PENDING_STATES: usize = 4096;

/// Issued OAuth `state` tokens awaiting their callback.
#[derive(Clone)]
pub struct StateStore {
    issued: Arc<Mutex<HashMap<String, Instant>>>,
    ttl: Duration,
    capacity: usize,
}

impl StateStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_PENDING_STATES)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            issued: Arc::new(Mutex::new(HashMap::new())),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn issued(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.issued.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remember a freshly issued state. Expired states are pruned on the way,
    /// and the oldest ones are evicted once the store is full.
    pub fn issue(&self, state: impl Into<String>) {
        let now = Instant::now();
        let mut issued = self.issued();
        issued.retain(|_, expires_at| *expires_at > now);
        while issued.len() >= self.capacity {
            let Some(oldest) = issued
                .iter()
                .min_by_key(|(_, expires_at)| **expires_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            issued.remove(&oldest);
            tracing::debug!("{} OAuth states pending, evicted the oldest", self.capacity);
        }
        issued.insert(state.into(), now + self.ttl);
    }

    /// Drop expired states. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut issued = self.issued();
        let before = issued.len();
        issued.retain(|_, expires_at| *expires_at > now);
        before - issued.len()
    }

    /// Consume a state. Returns `true` only for a known, unexpired state; a
    /// state can be consumed once.
    pub fn consume(&self, state: &str) -> bool {
        self.consume_at(state, Instant::now())
    }

    fn consume_at(&self, state: &str, now: Instant) -> bool {
        match self.issued().remove(state) {
            Some(expires_at) => expires_at > now,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.issued().len()
    }
}
