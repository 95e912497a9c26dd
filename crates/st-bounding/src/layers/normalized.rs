// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Lower bounds specified in physical units for a tensor that lives in
//! normalised space.
//!
//! The model emits normalised values, but a physical floor such as "specific
//! humidity is at least 0 kg/kg" is naturally expressed in physical units. At
//! construction every configured `min_val` is pushed through the variable's
//! normaliser, producing a floor in the tensor's own space:
//!
//! | normaliser | floor |
//! |---|---|
//! | `mean-std` | `(min_val - mean) / stdev` |
//! | `min-max`  | `(min_val - min) / (max - min)` |

use std::fmt;
use std::str::FromStr;

use st_tensor::Tensor;

use super::{for_each_row, log_constructed, Saturation};
use crate::error::{BoundingError, BoundingResult};
use crate::index::{ColumnSelection, IndexSpace, NameToIndex, NameToStatIndex};
use crate::module::Bounding;
use crate::registry::BoundingKind;
use crate::stats::{StatEntry, Statistics};

/// Normalisation convention used by the data pipeline for one variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Normalizer {
    MeanStd,
    MinMax,
}

impl Normalizer {
    pub fn as_str(self) -> &'static str {
        match self {
            Normalizer::MeanStd => "mean-std",
            Normalizer::MinMax => "min-max",
        }
    }

    /// Maps a physical value into normalised space. Returns `None` when the
    /// spread of `entry` is zero or the result is not finite.
    pub fn normalize(self, value: f64, entry: &StatEntry) -> Option<f64> {
        let (offset, spread) = match self {
            Normalizer::MeanStd => (entry.mean, entry.stdev),
            Normalizer::MinMax => (entry.min, entry.max - entry.min),
        };
        if spread == 0.0 {
            return None;
        }
        let normalized = (value - offset) / spread;
        normalized.is_finite().then_some(normalized)
    }
}

impl fmt::Display for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Normalizer {
    type Err = BoundingError;

    fn from_str(s: &str) -> BoundingResult<Self> {
        match s {
            "mean-std" => Ok(Normalizer::MeanStd),
            "min-max" => Ok(Normalizer::MinMax),
            other => Err(BoundingError::UnsupportedNormalizer {
                variable: String::new(),
                normalizer: other.to_string(),
            }),
        }
    }
}

// Per-variable floor parameters, aligned with the selected variables.
struct Floors<'a, N> {
    min_val: &'a [f32],
    normalizer: &'a [N],
    statistics: &'a Statistics,
    name_to_index_stats: &'a NameToStatIndex,
}

/// Applies a per-variable floor derived from physical minima and the dataset
/// statistics.
#[derive(Debug, Clone)]
pub struct NormalizedReluBounding {
    selection: ColumnSelection,
    normalizers: Vec<Normalizer>,
    bounds: Vec<f32>,
    saturation: Saturation,
}

impl NormalizedReluBounding {
    /// `min_val` and `normalizer` are aligned with `variables`. Statistics are
    /// looked up through `name_to_index_stats`, never through the output index.
    pub fn new<S, N>(
        variables: &[S],
        name_to_index: &NameToIndex,
        min_val: &[f32],
        normalizer: &[N],
        statistics: &Statistics,
        name_to_index_stats: &NameToStatIndex,
    ) -> BoundingResult<Self>
    where
        S: AsRef<str>,
        N: AsRef<str>,
    {
        let floors = Floors {
            min_val,
            normalizer,
            statistics,
            name_to_index_stats,
        };
        Self::build(variables, name_to_index, floors, Saturation::Hard)
    }

    /// Leaky form: values below a floor keep `negative_slope` of their
    /// distance to it.
    pub fn leaky<S, N>(
        variables: &[S],
        name_to_index: &NameToIndex,
        min_val: &[f32],
        normalizer: &[N],
        statistics: &Statistics,
        name_to_index_stats: &NameToStatIndex,
        negative_slope: f32,
    ) -> BoundingResult<Self>
    where
        S: AsRef<str>,
        N: AsRef<str>,
    {
        let saturation = Saturation::leaky(negative_slope)?;
        let floors = Floors {
            min_val,
            normalizer,
            statistics,
            name_to_index_stats,
        };
        Self::build(variables, name_to_index, floors, saturation)
    }

    fn build<S, N>(
        variables: &[S],
        name_to_index: &NameToIndex,
        floors: Floors<'_, N>,
        saturation: Saturation,
    ) -> BoundingResult<Self>
    where
        S: AsRef<str>,
        N: AsRef<str>,
    {
        let Floors {
            min_val,
            normalizer,
            statistics,
            name_to_index_stats,
        } = floors;
        if min_val.len() != variables.len() {
            return Err(BoundingError::LengthMismatch {
                parameter: "min_val",
                expected: variables.len(),
                got: min_val.len(),
            });
        }
        if normalizer.len() != variables.len() {
            return Err(BoundingError::LengthMismatch {
                parameter: "normalizer",
                expected: variables.len(),
                got: normalizer.len(),
            });
        }
        let selection = ColumnSelection::resolve(variables, name_to_index)?;

        let mut normalizers = Vec::with_capacity(selection.len());
        let mut bounds = Vec::with_capacity(selection.len());
        for ((variable, &minimum), tag) in selection
            .variables()
            .iter()
            .zip(min_val)
            .zip(normalizer)
        {
            let norm = tag.as_ref().parse::<Normalizer>().map_err(|_| {
                BoundingError::UnsupportedNormalizer {
                    variable: variable.clone(),
                    normalizer: tag.as_ref().to_string(),
                }
            })?;
            let entry = statistics.entry_for(variable, name_to_index_stats)?;
            let bound = norm
                .normalize(f64::from(minimum), &entry)
                .map(|bound| bound as f32)
                .filter(|bound| bound.is_finite())
                .ok_or_else(|| BoundingError::DegenerateStatistics {
                    variable: variable.clone(),
                    normalizer: norm.as_str(),
                })?;
            normalizers.push(norm);
            bounds.push(bound);
        }

        let bounding = Self {
            selection,
            normalizers,
            bounds,
            saturation,
        };
        log_constructed(&bounding);
        Ok(bounding)
    }

    /// Floors in normalised space, aligned with the selected variables.
    pub fn bounds(&self) -> &[f32] {
        &self.bounds
    }

    pub fn normalizers(&self) -> &[Normalizer] {
        &self.normalizers
    }

    pub fn saturation(&self) -> Saturation {
        self.saturation
    }
}

impl Bounding for NormalizedReluBounding {
    fn kind(&self) -> BoundingKind {
        if self.saturation.is_leaky() {
            BoundingKind::LeakyNormalizedRelu
        } else {
            BoundingKind::NormalizedRelu
        }
    }

    fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    fn apply_in_place(&self, tensor: &mut Tensor) -> BoundingResult<()> {
        self.check_columns(tensor)?;
        let indices = self.selection.indices();
        let bounds = self.bounds.as_slice();
        let saturation = self.saturation;
        for_each_row(tensor, |row| {
            for (idx, &bound) in indices.iter().zip(bounds) {
                let c = idx.get();
                row[c] = saturation.floor(row[c], bound);
            }
        });
        Ok(())
    }
}
