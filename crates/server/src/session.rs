use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Duration, Utc};

/// Operator sessions keyed by external user id: explicit records with a
/// TTL, created on successful login and cleared on logout or expiry.
pub struct OperatorSessions {
    ttl: Duration,
    active: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl OperatorSessions {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(&self, external_id: i64) {
        let mut active = self.lock();
        active.insert(external_id, Utc::now() + self.ttl);
    }

    pub fn is_active(&self, external_id: i64) -> bool {
        let mut active = self.lock();
        match active.get(&external_id) {
            Some(expires_at) if *expires_at > Utc::now() => true,
            Some(_) => {
                active.remove(&external_id);
                false
            }
            None => false,
        }
    }

    pub fn close(&self, external_id: i64) {
        self.lock().remove(&external_id);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, DateTime<Utc>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
