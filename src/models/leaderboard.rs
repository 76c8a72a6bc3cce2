// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Segment leaderboard model.

use serde::{Deserialize, Serialize};

/// A ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub athlete_name: String,
    /// Elapsed time in seconds
    pub elapsed_time: u64,
}

/// Leaderboard for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    /// Best (KOM/QOM) time in seconds, if any entries exist
    pub kom_time: Option<u64>,
    /// Total number of efforts on the segment
    pub effort_count: u64,
}

impl Leaderboard {
    /// Build a leaderboard; the KOM time is the rank-1 time, or the
    /// fastest entry when no entry is ranked first.
    pub fn new(entries: Vec<LeaderboardEntry>, effort_count: u64) -> Self {
        let kom_time = entries
            .iter()
            .find(|e| e.rank == 1)
            .or_else(|| entries.iter().min_by_key(|e| e.elapsed_time))
            .map(|e| e.elapsed_time);

        Self {
            entries,
            kom_time,
            effort_count,
        }
    }
}
