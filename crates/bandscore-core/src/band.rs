//! IELTS band values.
//!
//! Every band the engine reports is a multiple of 0.5 in `[0, 9]`. The
//! [`Band`] newtype can only be built through [`Band::from_score`], which
//! clamps and rounds, so the invariant holds by construction.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lowest reportable band.
pub const MIN_BAND: f64 = 0.0;
/// Highest reportable band.
pub const MAX_BAND: f64 = 9.0;

/// Round a continuous score to the nearest half point.
///
/// Ties round away from zero, matching the IELTS convention where an
/// average ending in .25 becomes .5 and one ending in .75 becomes the next
/// whole band.
pub fn round_to_band(x: f64) -> f64 {
    (x * 2.0).round() / 2.0
}

/// Clamp a score into `[0, 9]`. NaN maps to 0.
pub fn clamp_score(x: f64) -> f64 {
    if x.is_nan() {
        return MIN_BAND;
    }
    x.clamp(MIN_BAND, MAX_BAND)
}

/// A final IELTS band: a multiple of 0.5 in `[0, 9]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Band(f64);

impl Band {
    pub const ZERO: Band = Band(0.0);
    pub const MAX: Band = Band(MAX_BAND);

    /// Clamp `score` into range and round it to the nearest half band.
    pub fn from_score(score: f64) -> Self {
        Band(round_to_band(clamp_score(score)))
    }

    /// Mean of several bands, re-rounded. An empty input yields band 0.
    pub fn mean(bands: impl IntoIterator<Item = Band>) -> Self {
        let (sum, count) = bands
            .into_iter()
            .fold((0.0, 0usize), |(s, n), b| (s + b.0, n + 1));
        if count == 0 {
            return Band::ZERO;
        }
        Band::from_score(sum / count as f64)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Index of the half-point bucket this band falls in (0 for band 0,
    /// 18 for band 9).
    pub fn bucket(self) -> usize {
        (self.0 * 2.0) as usize
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

impl From<Band> for f64 {
    fn from(band: Band) -> Self {
        band.0
    }
}

impl Serialize for Band {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> Deserialize<'de> for Band {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(Band::from_score(raw))
    }
}

/// Step function shared by long pauses and every disfluency category:
/// fewer occurrences keep a higher band.
pub fn occurrence_band(count: usize) -> f64 {
    match count {
        0 => 9.0,
        1 => 8.0,
        2 => 7.0,
        3 => 6.0,
        4..=5 => 5.0,
        6..=7 => 4.0,
        8..=9 => 3.0,
        10..=11 => 2.0,
        12..=14 => 1.0,
        _ => 0.0,
    }
}
