// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use st_tensor::Tensor;
use tracing::warn;

use super::hardtanh::check_interval;
use super::{for_each_row, log_constructed, Saturation};
use crate::error::BoundingResult;
use crate::index::{ColumnSelection, IndexSpace, NameToIndex, OutputIndex};
use crate::module::Bounding;
use crate::registry::BoundingKind;

/// Interprets the selected variables as fractions of `total_var`.
///
/// Each selected value is clamped to `[min_val, max_val]` and multiplied by the
/// value currently held in the total column of the same row. The total is read
/// once per row before anything is written, and is never bounded by this layer
/// unless it also appears among the selected variables.
#[derive(Debug, Clone)]
pub struct FractionBounding {
    selection: ColumnSelection,
    min_val: f32,
    max_val: f32,
    total_var: String,
    total: [OutputIndex; 1],
    saturation: Saturation,
}

impl FractionBounding {
    pub fn new<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        min_val: f32,
        max_val: f32,
        total_var: &str,
    ) -> BoundingResult<Self> {
        let bounds = (min_val, max_val);
        Self::build(variables, name_to_index, bounds, total_var, Saturation::Hard)
    }

    /// Leaky form of the fraction clamp.
    pub fn leaky<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        min_val: f32,
        max_val: f32,
        total_var: &str,
        negative_slope: f32,
    ) -> BoundingResult<Self> {
        let saturation = Saturation::leaky(negative_slope)?;
        Self::build(variables, name_to_index, (min_val, max_val), total_var, saturation)
    }

    fn build<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
        (min_val, max_val): (f32, f32),
        total_var: &str,
        saturation: Saturation,
    ) -> BoundingResult<Self> {
        check_interval(min_val, max_val)?;
        let selection = ColumnSelection::resolve(variables, name_to_index)?;
        let total = name_to_index.resolve(total_var)?;
        if selection.contains(total) {
            warn!(
                total_var,
                "fraction bounding rewrites its own total column; fractions use the incoming total"
            );
        }
        let bounding = Self {
            selection,
            min_val,
            max_val,
            total_var: total_var.to_string(),
            total: [total],
            saturation,
        };
        log_constructed(&bounding);
        Ok(bounding)
    }

    pub fn total_var(&self) -> &str {
        &self.total_var
    }

    pub fn total_index(&self) -> OutputIndex {
        self.total[0]
    }

    pub fn min_val(&self) -> f32 {
        self.min_val
    }

    pub fn max_val(&self) -> f32 {
        self.max_val
    }
}

impl Bounding for FractionBounding {
    fn kind(&self) -> BoundingKind {
        if self.saturation.is_leaky() {
            BoundingKind::LeakyFraction
        } else {
            BoundingKind::Fraction
        }
    }

    fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    fn reads(&self) -> &[OutputIndex] {
        &self.total
    }

    fn apply_in_place(&self, tensor: &mut Tensor) -> BoundingResult<()> {
        self.check_columns(tensor)?;
        let indices = self.selection.indices();
        let t = self.total_index().get();
        let (lower, upper, saturation) = (self.min_val, self.max_val, self.saturation);
        for_each_row(tensor, |row| {
            let total = row[t];
            for idx in indices {
                let c = idx.get();
                row[c] = saturation.clamp(row[c], lower, upper) * total;
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoundingError;

    fn name_to_index() -> NameToIndex {
        NameToIndex::from_names(&["var1", "var2", "total_var"])
    }

    fn input() -> Tensor {
        Tensor::from_rows(&[[-1.0, 2.0, 3.0], [4.0, -5.0, 6.0], [0.5, 0.5, 0.5]]).unwrap()
    }

    #[test]
    fn fractions_scale_by_total() {
        let fraction =
            FractionBounding::new(&["var1", "var2"], &name_to_index(), 0.0, 1.0, "total_var")
                .unwrap();
        assert_eq!(fraction.total_index().get(), 2);
        let output = fraction.forward(&input()).unwrap();
        let expected =
            Tensor::from_rows(&[[0.0, 3.0, 3.0], [6.0, 0.0, 6.0], [0.25, 0.25, 0.5]]).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn total_in_selection_still_scales_by_incoming_total() {
        let fraction = FractionBounding::new(
            &["total_var", "var2"],
            &name_to_index(),
            0.0,
            1.0,
            "total_var",
        )
        .unwrap();
        let output = fraction.forward(&input()).unwrap();
        // clamp(3) * 3 = 3, clamp(2) * 3 = 3 in the first row
        assert_eq!(output.row(0).unwrap(), &[-1.0, 3.0, 3.0]);
        assert_eq!(output.row(2).unwrap(), &[0.5, 0.25, 0.25]);
    }

    #[test]
    fn unknown_total_fails_construction() {
        let err = FractionBounding::new(&["var1"], &name_to_index(), 0.0, 1.0, "tp").unwrap_err();
        assert!(matches!(err, BoundingError::UnknownVariable { ref name, .. } if name == "tp"));
    }

    #[test]
    fn narrow_tensor_is_rejected_when_only_the_total_is_missing() {
        let map: NameToIndex = [("frac", 0), ("total", 5)].into_iter().collect();
        let fraction = FractionBounding::new(&["frac"], &map, 0.0, 1.0, "total").unwrap();
        let mut narrow = Tensor::from_vec(1, 2, vec![0.5, 1.0]).unwrap();
        let err = fraction.apply_in_place(&mut narrow).unwrap_err();
        assert!(matches!(err, BoundingError::ColumnOutOfBounds { index: 5, cols: 2 }));
        assert_eq!(narrow.data(), &[0.5, 1.0]);
    }

    #[test]
    fn leaky_fraction_keeps_overshoot_before_scaling() {
        let fraction =
            FractionBounding::leaky(&["var1"], &name_to_index(), 0.0, 1.0, "total_var", 0.5)
                .unwrap();
        assert_eq!(fraction.kind(), BoundingKind::LeakyFraction);
        let output = fraction.forward(&input()).unwrap();
        // -1 -> -0.5 then *3; 4 -> 2.5 then *6
        assert_eq!(output.column(0).unwrap(), vec![-1.5, 15.0, 0.25]);
    }
}
