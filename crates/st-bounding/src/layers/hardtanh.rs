// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use st_tensor::Tensor;

use super::{for_each_row, log_constructed, Saturation};
use crate::error::{BoundingError, BoundingResult};
use crate::index::{ColumnSelection, IndexSpace, NameToIndex};
use crate::module::Bounding;
use crate::registry::BoundingKind;

/// Clamps the selected variables to `[min_val, max_val]`.
#[derive(Debug, Clone)]
pub struct HardtanhBounding {
    selection: ColumnSelection,
    min_val: f32,
    max_val: f32,
    saturation: Saturation,
}

/// Rejects empty, inverted and NaN intervals.
pub(crate) fn check_interval(min_val: f32, max_val: f32) -> BoundingResult<()> {
    if !(min_val < max_val) {
        return Err(BoundingError::InvalidInterval {
            min: min_val,
            max: max_val,
        });
    }
    Ok(())
}

impl HardtanhBounding {
    pub fn new<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        min_val: f32,
        max_val: f32,
    ) -> BoundingResult<Self> {
        Self::build(variables, name_to_index, min_val, max_val, Saturation::Hard)
    }

    /// Leaky form: values past either bound keep `negative_slope` of their
    /// overshoot.
    pub fn leaky<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        min_val: f32,
        max_val: f32,
        negative_slope: f32,
    ) -> BoundingResult<Self> {
        let saturation = Saturation::leaky(negative_slope)?;
        Self::build(variables, name_to_index, min_val, max_val, saturation)
    }

    fn build<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        min_val: f32,
        max_val: f32,
        saturation: Saturation,
    ) -> BoundingResult<Self> {
        check_interval(min_val, max_val)?;
        let bounding = Self {
            selection: ColumnSelection::resolve(variables, name_to_index)?,
            min_val,
            max_val,
            saturation,
        };
        log_constructed(&bounding);
        Ok(bounding)
    }

    pub fn min_val(&self) -> f32 {
        self.min_val
    }

    pub fn max_val(&self) -> f32 {
        self.max_val
    }

    pub fn saturation(&self) -> Saturation {
        self.saturation
    }
}

impl Bounding for HardtanhBounding {
    fn kind(&self) -> BoundingKind {
        if self.saturation.is_leaky() {
            BoundingKind::LeakyHardtanh
        } else {
            BoundingKind::Hardtanh
        }
    }

    fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    fn apply_in_place(&self, tensor: &mut Tensor) -> BoundingResult<()> {
        self.check_columns(tensor)?;
        let indices = self.selection.indices();
        let (lower, upper, saturation) = (self.min_val, self.max_val, self.saturation);
        for_each_row(tensor, |row| {
            for idx in indices {
                let c = idx.get();
                row[c] = saturation.clamp(row[c], lower, upper);
            }
        });
        Ok(())
    }
}
