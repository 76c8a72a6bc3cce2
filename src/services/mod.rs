// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregator;
pub mod geocode;
pub mod nearby;
pub mod ranking;
pub mod scan;
pub mod session;
pub mod strava;

pub use aggregator::SegmentSource;
pub use geocode::Geocoder;
pub use scan::ScanSnapshot;
pub use session::SessionService;
pub use strava::{AuthorizedClient, StravaClient};
