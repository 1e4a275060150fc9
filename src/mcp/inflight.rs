//! Cancellation tokens for requests that are still running
//!
//! A client cancels a request with `notifications/cancelled` naming its id.
//! One table belongs to one client session, since ids are only unique within
//! a session. Each running request holds an [`InFlightGuard`]; the entry
//! disappears when the last guard for that id is dropped.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde_json::Value;

use crate::engine::CancellationToken;

#[derive(Default)]
struct Entry {
    token: CancellationToken,
    holders: usize,
}

#[derive(Clone, Default)]
pub struct InFlightRequests {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InFlightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a new request. Returns `None` when a request with the
    /// same id is still running in this session.
    pub fn register(&self, id: &Value) -> Option<InFlightGuard> {
        let key = id.to_string();
        let token = {
            let mut entries = self.lock();
            if entries.contains_key(&key) {
                return None;
            }
            let entry = entries.entry(key.clone()).or_default();
            entry.holders = 1;
            entry.token.clone()
        };
        Some(InFlightGuard {
            requests: self.clone(),
            key,
            token,
        })
    }

    /// Joins the running request with this id, or starts tracking it.
    pub fn track(&self, id: &Value) -> InFlightGuard {
        let key = id.to_string();
        let token = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_default();
            entry.holders += 1;
            entry.token.clone()
        };
        InFlightGuard {
            requests: self.clone(),
            key,
            token,
        }
    }

    /// Returns whether a running request with that id was found.
    pub fn cancel(&self, id: &Value) -> bool {
        match self.lock().get(&id.to_string()) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, key: &str) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.holders = entry.holders.saturating_sub(1);
            if entry.holders == 0 {
                entries.remove(key);
            }
        }
    }
}

pub struct InFlightGuard {
    requests: InFlightRequests,
    key: String,
    token: CancellationToken,
}

impl InFlightGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.requests.release(&self.key);
    }
}
