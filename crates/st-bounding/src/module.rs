// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use core::fmt;

use st_tensor::Tensor;

use crate::error::BoundingResult;
use crate::index::{ensure_columns, ColumnSelection, OutputIndex};
use crate::registry::BoundingKind;

/// Output transform that enforces a constraint on a subset of columns.
///
/// Implementations are immutable once built and can be shared across threads.
/// Columns outside [`Bounding::selection`] are never written.
///
/// Tensors are copy-on-write: [`Bounding::forward`] hands back a new tensor and
/// leaves its input untouched, while [`Bounding::apply_in_place`] rewrites the
/// tensor it is given. Either form can be chained.
pub trait Bounding: fmt::Debug + Send + Sync {
    /// Variant tag of the layer.
    fn kind(&self) -> BoundingKind;

    /// Columns written by the layer.
    fn selection(&self) -> &ColumnSelection;

    /// Columns read but not written, such as the total of a fraction layer.
    fn reads(&self) -> &[OutputIndex] {
        &[]
    }

    /// Rewrites the selected columns of `tensor`.
    ///
    /// Fails with [`BoundingError::ColumnOutOfBounds`](crate::BoundingError)
    /// before touching any element when the tensor is too narrow.
    fn apply_in_place(&self, tensor: &mut Tensor) -> BoundingResult<()>;

    /// Returns a bounded copy of `input`.
    fn forward(&self, input: &Tensor) -> BoundingResult<Tensor> {
        let mut output = input.clone();
        self.apply_in_place(&mut output)?;
        Ok(output)
    }

    fn variables(&self) -> &[String] {
        self.selection().variables()
    }

    fn indices(&self) -> &[OutputIndex] {
        self.selection().indices()
    }

    /// Checks that every column the layer touches exists in `tensor`.
    fn check_columns(&self, tensor: &Tensor) -> BoundingResult<()> {
        ensure_columns(tensor, self.indices().iter().chain(self.reads()))
    }
}

impl<B: Bounding + ?Sized> Bounding for Box<B> {
    fn kind(&self) -> BoundingKind {
        (**self).kind()
    }

    fn selection(&self) -> &ColumnSelection {
        (**self).selection()
    }

    fn reads(&self) -> &[OutputIndex] {
        (**self).reads()
    }

    fn apply_in_place(&self, tensor: &mut Tensor) -> BoundingResult<()> {
        (**self).apply_in_place(tensor)
    }
}
