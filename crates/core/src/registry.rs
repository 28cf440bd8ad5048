//! Correlates call-setup webhooks with the media streams they open.
//!
//! Twilio does not always deliver the call identifier on the stream
//! handshake, so the call-setup handler registers each call under a fresh
//! correlation token that travels in the stream URL. Entries expire after a
//! TTL and the map is bounded, so a burst of abandoned calls cannot grow it
//! without limit.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    call_sid: String,
    registered_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    last: Option<Entry>,
}

#[derive(Debug)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl SessionRegistry {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Registers a call and returns the token that identifies it.
    pub fn register(&self, call_sid: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Instant::now();
        let entry = Entry {
            call_sid: call_sid.to_string(),
            registered_at: now,
        };

        let mut inner = self.lock();
        let ttl = self.ttl;
        inner
            .entries
            .retain(|_, e| now.saturating_duration_since(e.registered_at) <= ttl);
        while inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.registered_at)
                .map(|(oldest_token, _)| oldest_token.clone());
            match oldest {
                Some(oldest_token) => {
                    inner.entries.remove(&oldest_token);
                }
                None => break,
            }
        }
        inner.entries.insert(token.clone(), entry.clone());
        inner.last = Some(entry);
        token
    }

    /// Looks up the call registered under `token`, ignoring expired entries.
    pub fn lookup(&self, token: &str) -> Option<String> {
        let inner = self.lock();
        inner
            .entries
            .get(token)
            .filter(|e| self.is_fresh(e))
            .map(|e| e.call_sid.clone())
    }

    /// The most recently registered call, if it has not expired.
    pub fn last_known(&self) -> Option<String> {
        let inner = self.lock();
        inner
            .last
            .as_ref()
            .filter(|e| self.is_fresh(e))
            .map(|e| e.call_sid.clone())
    }

    /// Resolves a call from an explicit identifier or its token only.
    pub fn resolve_exact(&self, call_sid: Option<&str>, token: Option<&str>) -> Option<String> {
        if let Some(sid) = call_sid.filter(|s| !s.is_empty()) {
            return Some(sid.to_string());
        }
        token.filter(|t| !t.is_empty()).and_then(|t| self.lookup(t))
    }

    /// Picks the call identifier for a new stream.
    ///
    /// An explicit identifier wins, then the token, then the most recent
    /// registration. The last step can name another caller's call when
    /// several arrive together, so it is only used once nothing better is
    /// available.
    pub fn resolve(&self, call_sid: Option<&str>, token: Option<&str>) -> Option<String> {
        self.resolve_exact(call_sid, token)
            .or_else(|| self.last_known())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        Instant::now().saturating_duration_since(entry.registered_at) <= self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // The map holds no invariants a panicking writer could break.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
