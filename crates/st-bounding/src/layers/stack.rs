// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use st_tensor::Tensor;
use tracing::{debug, trace};

use crate::error::BoundingResult;
use crate::index::{ensure_columns, OutputIndex};
use crate::module::Bounding;
use crate::registry::{BoundingSpec, BuildContext};

/// Ordered chain of bounding layers applied to the same tensor.
///
/// Stages that touch disjoint columns commute. Stages that share columns, or
/// where one stage reads a total another stage writes, see each other's
/// output in push order.
#[derive(Default)]
pub struct BoundingStack {
    stages: Vec<Box<dyn Bounding>>,
}

impl core::fmt::Debug for BoundingStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let kinds: Vec<&str> = self.stages.iter().map(|s| s.kind().tag()).collect();
        write!(f, "BoundingStack(stages={kinds:?})")
    }
}

/// A column shared between two stages of a stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageConflict {
    /// Position of the stage that writes the column first.
    pub earlier: usize,
    /// Position of the later stage that writes or reads the column.
    pub later: usize,
    pub column: OutputIndex,
    /// `true` when the later stage only reads the column.
    pub read_only: bool,
}

impl BoundingStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Builds every record against `ctx`, in order. The first failing record
    /// aborts the whole stack.
    pub fn from_specs(specs: &[BoundingSpec], ctx: &BuildContext<'_>) -> BoundingResult<Self> {
        let mut stack = Self::new();
        for spec in specs {
            stack.push_boxed(spec.build(ctx)?);
        }
        debug!(stages = stack.len(), "bounding stack assembled");
        Ok(stack)
    }

    /// Appends a new stage.
    pub fn push<B>(&mut self, stage: B)
    where
        B: Bounding + 'static,
    {
        self.push_boxed(Box::new(stage));
    }

    /// Appends a pre-boxed stage.
    pub fn push_boxed(&mut self, stage: Box<dyn Bounding>) {
        for conflict in overlaps(&self.stages, self.stages.len(), stage.as_ref()) {
            let StageConflict {
                earlier,
                later,
                column,
                read_only,
            } = conflict;
            if read_only {
                debug!(earlier, later, %column, "stage reads a column bounded earlier in the stack");
            } else {
                debug!(earlier, later, %column, "stage rewrites a column bounded earlier in the stack");
            }
        }
        self.stages.push(stage);
    }

    /// Returns the number of stages in the stack.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` when the stack holds no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> impl Iterator<Item = &dyn Bounding> + '_ {
        self.stages.iter().map(|stage| stage.as_ref())
    }

    /// Pairs of stages whose order matters because they share a column.
    pub fn conflicts(&self) -> Vec<StageConflict> {
        self.stages
            .iter()
            .enumerate()
            .flat_map(|(later, stage)| overlaps(&self.stages[..later], later, stage.as_ref()))
            .collect()
    }

    /// Returns a bounded copy of `input`; the input itself is left untouched.
    pub fn forward(&self, input: &Tensor) -> BoundingResult<Tensor> {
        let mut output = input.clone();
        self.apply_in_place(&mut output)?;
        Ok(output)
    }

    /// Runs every stage over `tensor` in order.
    ///
    /// Column ranges of all stages are validated first, so a tensor that is
    /// too narrow for any stage is left unchanged.
    pub fn apply_in_place(&self, tensor: &mut Tensor) -> BoundingResult<()> {
        ensure_columns(
            tensor,
            self.stages
                .iter()
                .flat_map(|stage| stage.indices().iter().chain(stage.reads())),
        )?;
        for (position, stage) in self.stages.iter().enumerate() {
            trace!(position, kind = stage.kind().tag(), "applying bounding stage");
            stage.apply_in_place(tensor)?;
        }
        Ok(())
    }
}

// Columns written by `previous` that the stage at position `later` writes
// again or reads.
fn overlaps<'a>(
    previous: &'a [Box<dyn Bounding>],
    later: usize,
    stage: &'a dyn Bounding,
) -> impl Iterator<Item = StageConflict> + 'a {
    previous
        .iter()
        .enumerate()
        .flat_map(|(earlier, prior)| prior.indices().iter().map(move |&column| (earlier, column)))
        .filter_map(move |(earlier, column)| {
            let writes = stage.selection().contains(column);
            (writes || stage.reads().contains(&column)).then_some(StageConflict {
                earlier,
                later,
                column,
                read_only: !writes,
            })
        })
}
