// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Segment table ordering and the beatable filter.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Leaderboard, SegmentEffort, SegmentId};
use crate::services::aggregator::{derive_elevation_gain, SegmentCounts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SortField {
    Name,
    Distance,
    Grade,
    Time,
    Count,
    Elevation,
    Kom,
}

impl SortField {
    /// Direction a field sorts in when first selected.
    pub fn default_direction(self) -> SortDirection {
        match self {
            SortField::Name => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Current table ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            field: SortField::Time,
            direction: SortDirection::Desc,
        }
    }
}

impl SortState {
    /// Selecting the active field flips its direction; any other field
    /// starts in its default direction.
    pub fn toggle(self, field: SortField) -> Self {
        if field == self.field {
            Self {
                field,
                direction: self.direction.flipped(),
            }
        } else {
            Self {
                field,
                direction: field.default_direction(),
            }
        }
    }
}

/// Per-segment values that are not part of the effort itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct SortContext<'a> {
    pub counts: Option<&'a SegmentCounts>,
    pub leaderboards: Option<&'a HashMap<SegmentId, Leaderboard>>,
}

impl SortContext<'_> {
    fn count(&self, id: SegmentId) -> u32 {
        self.counts.and_then(|c| c.get(&id)).copied().unwrap_or(0)
    }

    fn kom_time(&self, id: SegmentId) -> Option<u64> {
        self.leaderboards
            .and_then(|l| l.get(&id))
            .and_then(|board| board.kom_time)
    }
}

/// Stable sort of efforts by `state`.
///
/// For [`SortField::Kom`], segments without a known KOM time sort last in
/// either direction.
pub fn sort_efforts(efforts: &mut [SegmentEffort], state: SortState, ctx: &SortContext<'_>) {
    let directed = |ordering: Ordering| match state.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    };

    match state.field {
        SortField::Name => efforts.sort_by(|a, b| {
            directed(
                a.display_name()
                    .to_lowercase()
                    .cmp(&b.display_name().to_lowercase()),
            )
        }),
        SortField::Distance => {
            efforts.sort_by(|a, b| directed(a.segment.distance.total_cmp(&b.segment.distance)))
        }
        SortField::Grade => efforts.sort_by(|a, b| {
            directed(a.segment.average_grade.total_cmp(&b.segment.average_grade))
        }),
        SortField::Time => efforts.sort_by(|a, b| directed(a.moving_time.cmp(&b.moving_time))),
        SortField::Count => efforts.sort_by(|a, b| {
            directed(ctx.count(a.segment.id).cmp(&ctx.count(b.segment.id)))
        }),
        SortField::Elevation => efforts.sort_by(|a, b| {
            let ea = derive_elevation_gain(&a.segment).unwrap_or(0.0);
            let eb = derive_elevation_gain(&b.segment).unwrap_or(0.0);
            directed(ea.total_cmp(&eb))
        }),
        SortField::Kom => efforts.sort_by(|a, b| {
            match (ctx.kom_time(a.segment.id), ctx.kom_time(b.segment.id)) {
                (Some(ka), Some(kb)) => directed(ka.cmp(&kb)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }),
    }
}

/// Anything with an optional leaderboard size.
pub trait HasEffortCount {
    fn effort_count(&self) -> Option<u64>;
}

/// Keep segments whose leaderboard is unknown or no larger than `ceiling`,
/// preserving order.
pub fn filter_beatable<T: HasEffortCount>(segments: Vec<T>, ceiling: u64) -> Vec<T> {
    segments
        .into_iter()
        .filter(|s| s.effort_count().map_or(true, |count| count <= ceiling))
        .collect()
}
