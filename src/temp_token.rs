//! In-process cache of temporary tokens bridging the password step to the
//! second-factor step of a 2FA login.
//!
//! Entries are never persisted; a restart drops them all, which is
//! acceptable because a key only has to survive the short window between
//! two requests. Expiry is lazy: checked on read, no timer task.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default validity window for a temporary token: 5 minutes.
pub const DEFAULT_TEMP_TOKEN_TTL_SECS: u64 = 300;

struct Entry {
    user_uuid: String,
    deadline: Instant,
}

/// Short-TTL map from opaque temporary-token key to user UUID.
pub struct TempTokenCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl TempTokenCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The configured TTL in seconds, reported to clients alongside the key.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Mint a fresh random key for a user and store it. Returns the key.
    pub fn issue(&self, user_uuid: &str) -> String {
        let key = uuid::Uuid::new_v4().to_string();
        self.put(&key, user_uuid);
        key
    }

    /// Store a key for a user with the configured TTL.
    pub fn put(&self, key: &str, user_uuid: &str) {
        let mut entries = self.entries.lock().expect("temp token cache poisoned");
        entries.insert(
            key.to_string(),
            Entry {
                user_uuid: user_uuid.to_string(),
                deadline: Instant::now() + self.ttl,
            },
        );
    }

    /// Look up the user for a key. Non-consuming; the entry stays valid
    /// until its deadline. Expired entries are removed on read.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("temp token cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.deadline > Instant::now() => Some(entry.user_uuid.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}
