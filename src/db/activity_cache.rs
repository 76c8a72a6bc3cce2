// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived per-account cache of the recent activity list.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ActivitySummary;

#[derive(Clone)]
struct CachedActivities {
    fetched_at: Instant,
    activities: Arc<Vec<ActivitySummary>>,
}

/// Activity lists keyed by credential ID, valid for a fixed TTL.
#[derive(Clone)]
pub struct ActivityCache {
    entries: Arc<DashMap<String, CachedActivities>>,
    ttl: Duration,
}

impl ActivityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn key(credential_id: &str) -> String {
        format!("activities:{}", credential_id)
    }

    /// Fresh cached activities for the credential, if any.
    pub fn get(&self, credential_id: &str) -> Option<Arc<Vec<ActivitySummary>>> {
        let key = Self::key(credential_id);
        let entry = self.entries.get(&key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            return Some(entry.activities.clone());
        }
        drop(entry);
        self.entries.remove(&key);
        None
    }

    pub fn insert(
        &self,
        credential_id: &str,
        activities: Vec<ActivitySummary>,
    ) -> Arc<Vec<ActivitySummary>> {
        let activities = Arc::new(activities);
        self.entries.insert(
            Self::key(credential_id),
            CachedActivities {
                fetched_at: Instant::now(),
                activities: activities.clone(),
            },
        );
        activities
    }

    pub fn invalidate(&self, credential_id: &str) {
        self.entries.remove(&Self::key(credential_id));
    }
}
