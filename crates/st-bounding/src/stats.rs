// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use serde::{Deserialize, Serialize};

use crate::error::{BoundingError, BoundingResult};
use crate::index::{IndexSpace, NameToStatIndex, StatIndex};

/// Per-variable normalisation statistics produced by the dataset pipeline.
///
/// The four arrays are parallel and addressed by [`StatIndex`]. Their lengths
/// are validated on construction and on deserialisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStatistics", into = "RawStatistics")]
pub struct Statistics {
    mean: Vec<f64>,
    stdev: Vec<f64>,
    min: Vec<f64>,
    max: Vec<f64>,
}

/// One row of [`Statistics`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatEntry {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

impl Statistics {
    pub fn new(
        mean: Vec<f64>,
        stdev: Vec<f64>,
        min: Vec<f64>,
        max: Vec<f64>,
    ) -> BoundingResult<Self> {
        let len = mean.len();
        if stdev.len() != len || min.len() != len || max.len() != len {
            return Err(BoundingError::MalformedStatistics {
                mean: mean.len(),
                stdev: stdev.len(),
                min: min.len(),
                max: max.len(),
            });
        }
        Ok(Self {
            mean,
            stdev,
            min,
            max,
        })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn get(&self, index: StatIndex) -> Option<StatEntry> {
        let i = index.get();
        if i >= self.len() {
            return None;
        }
        Some(StatEntry {
            mean: self.mean[i],
            stdev: self.stdev[i],
            min: self.min[i],
            max: self.max[i],
        })
    }

    /// Looks up the statistics row of `name`.
    pub fn entry_for(
        &self,
        name: &str,
        name_to_index_stats: &NameToStatIndex,
    ) -> BoundingResult<StatEntry> {
        let index = name_to_index_stats.resolve(name)?;
        self.get(index)
            .ok_or_else(|| BoundingError::StatIndexOutOfRange {
                name: name.to_string(),
                index: index.get(),
                len: self.len(),
            })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawStatistics {
    mean: Vec<f64>,
    stdev: Vec<f64>,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl TryFrom<RawStatistics> for Statistics {
    type Error = BoundingError;

    fn try_from(raw: RawStatistics) -> BoundingResult<Self> {
        Statistics::new(raw.mean, raw.stdev, raw.min, raw.max)
    }
}

impl From<Statistics> for RawStatistics {
    fn from(stats: Statistics) -> Self {
        RawStatistics {
            mean: stats.mean,
            stdev: stats.stdev,
            min: stats.min,
            max: stats.max,
        }
    }
}
