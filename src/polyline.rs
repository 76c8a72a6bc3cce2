// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encoded polyline codec (precision 5, the format Strava uses for
//! segment and activity maps), backed by the `polyline` crate.
//!
//! Truncated input is rejected: a value whose last chunk still carries the
//! continuation bit, or a latitude with no matching longitude, is an error.
//! Decoding never yields a partial point.

use geo::{Centroid, Coord, MultiPoint, Point};
use serde::{Deserialize, Serialize};

/// Digits of precision Strava encodes with.
const PRECISION: u32 = 5;

/// Valid chunk characters; each carries 5 bits offset by 63.
const CHUNK_RANGE: std::ops::RangeInclusive<u8> = b'?'..=b'~';

/// Chunks at or above this byte have the continuation bit set.
const CONTINUATION: u8 = 63 + 0x20;

/// A decoded coordinate pair. Serializes as `[lat, lng]`, the order map
/// widgets expect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(p: LatLng) -> Self {
        [p.lat, p.lng]
    }
}

impl From<LatLng> for Coord<f64> {
    fn from(p: LatLng) -> Self {
        Coord { x: p.lng, y: p.lat }
    }
}

/// Errors from polyline decoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolylineError {
    #[error("Polyline truncated at byte {position}")]
    Truncated { position: usize },

    #[error("Invalid polyline character {character:?} at byte {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("Polyline coordinate out of range at byte {position}")]
    OutOfRange { position: usize },
}

impl PolylineError {
    fn from_decoder(err: ::polyline::errors::PolylineError, encoded: &str) -> Self {
        use ::polyline::errors::PolylineError as Decoder;

        match err {
            Decoder::NoLongError { .. } => Self::Truncated {
                position: encoded.len(),
            },
            Decoder::DecodeError { idx } => Self::InvalidCharacter {
                character: char_at(encoded, idx),
                position: idx,
            },
            Decoder::LatitudeCoordError { idx, .. }
            | Decoder::LongitudeCoordError { idx, .. }
            | Decoder::CoordEncodingError { idx, .. } => Self::OutOfRange { position: idx },
            _ => Self::OutOfRange { position: 0 },
        }
    }
}

fn char_at(encoded: &str, position: usize) -> char {
    encoded
        .get(position..)
        .and_then(|rest| rest.chars().next())
        .unwrap_or('\u{fffd}')
}

/// Decode an encoded polyline into an ordered list of coordinates.
pub fn decode(encoded: &str) -> Result<Vec<LatLng>, PolylineError> {
    let bytes = encoded.as_bytes();

    if let Some(position) = bytes.iter().position(|b| !CHUNK_RANGE.contains(b)) {
        return Err(PolylineError::InvalidCharacter {
            character: char_at(encoded, position),
            position,
        });
    }
    match bytes.last() {
        None => return Ok(Vec::new()),
        Some(&last) if last >= CONTINUATION => {
            return Err(PolylineError::Truncated {
                position: bytes.len(),
            })
        }
        Some(_) => {}
    }

    let line = ::polyline::decode_polyline(encoded, PRECISION)
        .map_err(|e| PolylineError::from_decoder(e, encoded))?;

    Ok(line.coords().map(|c| LatLng::new(c.y, c.x)).collect())
}

/// Encode coordinates as a polyline. Coordinates are rounded to the
/// 1e-5 grid of the format.
///
/// Points outside the valid latitude/longitude range cannot be encoded;
/// the result is then empty, which decodes to no geometry.
pub fn encode(points: &[LatLng]) -> String {
    ::polyline::encode_coordinates(points.iter().copied().map(Coord::from), PRECISION)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Cannot encode polyline");
            String::new()
        })
}

/// Decode a polyline for drawing as route geometry.
///
/// Returns `None` when decoding fails or yields fewer than two points.
pub fn route_geometry(encoded: &str) -> Option<Vec<LatLng>> {
    match decode(encoded) {
        Ok(points) if points.len() > 1 => Some(points),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Discarding undecodable polyline");
            None
        }
    }
}

/// Mean position of every point across the given routes (map centre).
pub fn centre<'a, I>(routes: I) -> Option<LatLng>
where
    I: IntoIterator<Item = &'a [LatLng]>,
{
    let points: Vec<Point<f64>> = routes
        .into_iter()
        .flatten()
        .map(|p| Point::new(p.lng, p.lat))
        .collect();

    MultiPoint::from(points)
        .centroid()
        .map(|c| LatLng::new(c.y(), c.x()))
}
