//! Grid cells and their keys.
//!
//! A cell is addressed by a pair of integer grid indices derived from a
//! latitude/longitude by dividing by the grid step and flooring. On the wire and
//! in storage the pair is rendered as `"<latIndex>,<lngIndex>"`.
//!
//! ```
//! use pixelwar::types::CellKey;
//!
//! let key = CellKey::from_coords(48.8566, 2.3522, 0.05).unwrap();
//! assert_eq!(key.as_str(), "977,47");
//! assert_eq!(key.indices(), Some((977, 47)));
//! assert_eq!(CellKey::from_coords(f64::NAN, 2.3522, 0.05), None);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of one grid cell.
///
/// The key is kept as the raw string the client sent so that permissive mode
/// can carry malformed keys through unchanged. Use [`CellKey::parse`] for the
/// strict form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellKey(String);

impl CellKey {
    /// Wrap a key without validating it.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse a key of the form `"<int>,<int>"`.
    pub fn parse(raw: &str) -> Result<Self, CellKeyError> {
        let (lat, lng) = raw
            .split_once(',')
            .ok_or_else(|| CellKeyError::MissingSeparator(raw.to_string()))?;
        lat.parse::<i64>()
            .map_err(|_| CellKeyError::InvalidIndex(lat.to_string()))?;
        lng.parse::<i64>()
            .map_err(|_| CellKeyError::InvalidIndex(lng.to_string()))?;
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn from_indices(lat_index: i64, lng_index: i64) -> Self {
        Self(format!("{},{}", lat_index, lng_index))
    }

    /// Derive the key of the cell containing a coordinate.
    ///
    /// `None` if either index is not finite or does not fit an `i64`.
    #[must_use]
    pub fn from_coords(lat: f64, lng: f64, step: f64) -> Option<Self> {
        Some(Self::from_indices(grid_index(lat, step)?, grid_index(lng, step)?))
    }

    /// Grid indices, or `None` if the key is malformed.
    #[must_use]
    pub fn indices(&self) -> Option<(i64, i64)> {
        let (lat, lng) = self.0.split_once(',')?;
        Some((lat.parse().ok()?, lng.parse().ok()?))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for CellKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for CellKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

fn grid_index(degrees: f64, step: f64) -> Option<i64> {
    let index = (degrees / step).floor();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    (index.is_finite() && index >= i64::MIN as f64 && index < i64::MAX as f64)
        .then_some(index as i64)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellKeyError {
    #[error("cell key '{0}' is missing the ',' separator")]
    MissingSeparator(String),
    #[error("'{0}' is not an integer grid index")]
    InvalidIndex(String),
}

/// A persisted cell record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub key: CellKey,
    pub color: String,
    pub owner: Option<String>,
    pub alliance_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Cell {
    #[must_use]
    pub fn new(key: CellKey, color: impl Into<String>) -> Self {
        Self {
            key,
            color: color.into(),
            owner: None,
            alliance_id: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn with_alliance(mut self, alliance_id: Option<String>) -> Self {
        self.alliance_id = alliance_id;
        self
    }
}

/// One `{key, color}` entry of a paint delta or a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDelta {
    pub key: CellKey,
    pub color: String,
}

impl CellDelta {
    #[must_use]
    pub fn new(key: impl Into<CellKey>, color: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            color: color.into(),
        }
    }
}
