// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Output bounding layers built on top of SpiralTorch tensors.
//!
//! A model that predicts physical quantities emits unconstrained values. The
//! layers in this crate rewrite a chosen subset of output columns so that they
//! respect physical limits (non-negative precipitation, fractions within
//! `[0, 1]`, components that never exceed their total) and leave every other
//! column untouched. Layers are built once from variable names and applied to
//! every forward pass, individually or chained in a [`BoundingStack`].

pub mod error;
pub mod index;
pub mod io;
pub mod layers;
pub mod module;
pub mod registry;
pub mod stats;

pub use error::{BoundingError, BoundingResult};
pub use index::{
    ColumnSelection, IndexSpace, NameIndex, NameToIndex, NameToStatIndex, OutputIndex, StatIndex,
};
pub use io::BoundingConfig;
pub use layers::{
    BoundingStack, FractionBounding, HardtanhBounding, NormalizedReluBounding, Normalizer,
    ReluBounding, Saturation, StageConflict, DEFAULT_NEGATIVE_SLOPE,
};
pub use module::Bounding;
pub use registry::{BoundingKind, BoundingSpec, BuildContext};
pub use stats::{StatEntry, Statistics};

pub use st_tensor::pure::{PureResult, Tensor, TensorError};
