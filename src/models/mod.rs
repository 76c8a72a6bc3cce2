// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod credential;
pub mod leaderboard;
pub mod segment;

pub use activity::{ActivitySummary, DetailedActivity};
pub use credential::{ActiveCredential, Credential, CredentialView, TokenPatch};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use segment::{Segment, SegmentEffort, SegmentId, SegmentMap};
