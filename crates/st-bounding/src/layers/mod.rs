// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

pub mod fraction;
pub mod hardtanh;
pub mod normalized;
pub mod relu;
pub mod stack;

pub use fraction::FractionBounding;
pub use hardtanh::HardtanhBounding;
pub use normalized::{Normalizer, NormalizedReluBounding};
pub use relu::ReluBounding;
pub use stack::{BoundingStack, StageConflict};

use rayon::prelude::*;
use st_tensor::Tensor;
use tracing::debug;

use crate::error::{BoundingError, BoundingResult};
use crate::module::Bounding;

/// Slope used by the leaky variants when a config omits `negative_slope`.
pub const DEFAULT_NEGATIVE_SLOPE: f32 = 0.01;

// Below this many elements the row loop stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 1 << 16;

/// How a layer treats values outside the admissible region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Saturation {
    /// Values are pinned to the violated bound.
    Hard,
    /// Values are pulled towards the bound, keeping `negative_slope` of their
    /// distance past it.
    Leaky { negative_slope: f32 },
}

impl Saturation {
    pub fn leaky(negative_slope: f32) -> BoundingResult<Self> {
        if !(0.0..1.0).contains(&negative_slope) {
            return Err(BoundingError::InvalidSlope {
                slope: negative_slope,
            });
        }
        Ok(Saturation::Leaky { negative_slope })
    }

    pub fn is_leaky(self) -> bool {
        matches!(self, Saturation::Leaky { .. })
    }

    #[inline]
    fn beyond(self, value: f32, bound: f32) -> f32 {
        match self {
            Saturation::Hard => bound,
            Saturation::Leaky { negative_slope } => bound + negative_slope * (value - bound),
        }
    }

    /// Enforces `value >= lower`.
    #[inline]
    pub fn floor(self, value: f32, lower: f32) -> f32 {
        if value < lower {
            self.beyond(value, lower)
        } else {
            value
        }
    }

    /// Enforces `lower <= value <= upper`.
    #[inline]
    pub fn clamp(self, value: f32, lower: f32, upper: f32) -> f32 {
        if value < lower {
            self.beyond(value, lower)
        } else if value > upper {
            self.beyond(value, upper)
        } else {
            value
        }
    }
}

/// Runs `f` over every row of `tensor`, splitting large tensors across the
/// rayon pool.
pub(crate) fn for_each_row<F>(tensor: &mut Tensor, f: F)
where
    F: Fn(&mut [f32]) + Sync,
{
    let cols = tensor.cols();
    let data = tensor.data_mut();
    if data.len() >= PARALLEL_THRESHOLD {
        data.par_chunks_mut(cols).for_each(|row| f(row));
    } else {
        data.chunks_mut(cols).for_each(|row| f(row));
    }
}

pub(crate) fn log_constructed(bounding: &dyn Bounding) {
    debug!(
        kind = bounding.kind().tag(),
        variables = ?bounding.variables(),
        indices = ?bounding.indices(),
        reads = ?bounding.reads(),
        "bounding layer constructed"
    );
}
