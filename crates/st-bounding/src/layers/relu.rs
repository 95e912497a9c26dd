// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use st_tensor::Tensor;

use super::{for_each_row, log_constructed, Saturation};
use crate::error::BoundingResult;
use crate::index::{ColumnSelection, IndexSpace, NameToIndex};
use crate::module::Bounding;
use crate::registry::BoundingKind;

/// Keeps the selected variables non-negative.
#[derive(Debug, Clone)]
pub struct ReluBounding {
    selection: ColumnSelection,
    saturation: Saturation,
}

impl ReluBounding {
    /// Creates a new ReLU bounding over `variables`.
    pub fn new<S: AsRef<str>>(variables: &[S], name_to_index: &NameToIndex) -> BoundingResult<Self> {
        Self::build(variables, name_to_index, Saturation::Hard)
    }

    /// Leaky form: negative values are scaled by `negative_slope` instead of
    /// being zeroed.
    pub fn leaky<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        negative_slope: f32,
    ) -> BoundingResult<Self> {
        Self::build(variables, name_to_index, Saturation::leaky(negative_slope)?)
    }

    fn build<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        saturation: Saturation,
    ) -> BoundingResult<Self> {
        let bounding = Self {
            selection: ColumnSelection::resolve(variables, name_to_index)?,
            saturation,
        };
        log_constructed(&bounding);
        Ok(bounding)
    }

    pub fn saturation(&self) -> Saturation {
        self.saturation
    }
}

impl Bounding for ReluBounding {
    fn kind(&self) -> BoundingKind {
        if self.saturation.is_leaky() {
            BoundingKind::LeakyRelu
        } else {
            BoundingKind::Relu
        }
    }

    fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    fn apply_in_place(&self, tensor: &mut Tensor) -> BoundingResult<()> {
        self.check_columns(tensor)?;
        let indices = self.selection.indices();
        let saturation = self.saturation;
        for_each_row(tensor, |row| {
            for idx in indices {
                let c = idx.get();
                row[c] = saturation.floor(row[c], 0.0);
            }
        });
        Ok(())
    }
}
