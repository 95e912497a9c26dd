// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Name → index lookups for the two index spaces a bounding layer touches.
//!
//! Output columns and statistics rows are numbered independently, so each
//! space gets its own index newtype. A [`StatIndex`] can never be used to
//! address a tensor column and an [`OutputIndex`] can never address a
//! statistics entry.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use st_tensor::Tensor;

use crate::error::{BoundingError, BoundingResult};

/// Marker implemented by the index newtypes of each index space.
pub trait IndexSpace: Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync {
    /// Human readable name of the space, used in error messages.
    const SPACE: &'static str;

    fn from_raw(raw: usize) -> Self;

    fn get(self) -> usize;
}

/// Column of the model output tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputIndex(usize);

/// Row of the [`Statistics`](crate::stats::Statistics) arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatIndex(usize);

impl IndexSpace for OutputIndex {
    const SPACE: &'static str = "output";

    fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    fn get(self) -> usize {
        self.0
    }
}

impl IndexSpace for StatIndex {
    const SPACE: &'static str = "statistics";

    fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for OutputIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col{}", self.0)
    }
}

impl fmt::Display for StatIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stat{}", self.0)
    }
}

/// Mapping from variable name to an index in one index space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, usize>",
    into = "BTreeMap<String, usize>",
    bound = "I: IndexSpace"
)]
pub struct NameIndex<I> {
    entries: BTreeMap<String, I>,
}

/// Variable name → output tensor column.
pub type NameToIndex = NameIndex<OutputIndex>;

/// Variable name → statistics entry.
pub type NameToStatIndex = NameIndex<StatIndex>;

impl<I: IndexSpace> Default for NameIndex<I> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<I: IndexSpace> NameIndex<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numbers the given names in order, starting at zero.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.as_ref().to_string(), idx))
            .collect()
    }

    /// Registers `name` at `raw`, returning the index it previously mapped to.
    pub fn insert(&mut self, name: impl Into<String>, raw: usize) -> Option<I> {
        self.entries.insert(name.into(), I::from_raw(raw))
    }

    pub fn get(&self, name: &str) -> Option<I> {
        self.entries.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, I)> + '_ {
        self.entries.iter().map(|(name, idx)| (name.as_str(), *idx))
    }

    /// Looks up a single name, failing when it is not registered.
    pub fn resolve(&self, name: &str) -> BoundingResult<I> {
        self.get(name).ok_or_else(|| BoundingError::UnknownVariable {
            name: name.to_string(),
            space: I::SPACE,
        })
    }

    /// Resolves every name in order. The first missing name aborts the lookup.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> BoundingResult<Vec<I>> {
        names.iter().map(|name| self.resolve(name.as_ref())).collect()
    }
}

impl<I: IndexSpace, S: Into<String>> FromIterator<(S, usize)> for NameIndex<I> {
    fn from_iter<T: IntoIterator<Item = (S, usize)>>(iter: T) -> Self {
        let mut index = Self::new();
        for (name, raw) in iter {
            index.insert(name, raw);
        }
        index
    }
}

impl<I: IndexSpace> From<BTreeMap<String, usize>> for NameIndex<I> {
    fn from(map: BTreeMap<String, usize>) -> Self {
        map.into_iter().collect()
    }
}

impl<I: IndexSpace> From<NameIndex<I>> for BTreeMap<String, usize> {
    fn from(index: NameIndex<I>) -> Self {
        index
            .entries
            .into_iter()
            .map(|(name, idx)| (name, idx.get()))
            .collect()
    }
}

/// Variables selected by a bounding layer together with their resolved
/// output columns. Resolution happens once, when the layer is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSelection {
    variables: Vec<String>,
    indices: Vec<OutputIndex>,
}

impl ColumnSelection {
    pub fn resolve<S: AsRef<str>>(
        variables: &[S],
        name_to_index: &NameToIndex,
    ) -> BoundingResult<Self> {
        let indices = name_to_index.resolve_all(variables)?;
        for (position, index) in indices.iter().enumerate() {
            if indices[..position].contains(index) {
                return Err(BoundingError::DuplicateColumn {
                    name: variables[position].as_ref().to_string(),
                    index: index.get(),
                });
            }
        }
        Ok(Self {
            variables: variables.iter().map(|v| v.as_ref().to_string()).collect(),
            indices,
        })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn indices(&self) -> &[OutputIndex] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn contains(&self, index: OutputIndex) -> bool {
        self.indices.contains(&index)
    }

    /// Iterates over `(variable, column)` pairs in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, OutputIndex)> + '_ {
        self.variables
            .iter()
            .map(String::as_str)
            .zip(self.indices.iter().copied())
    }
}

/// Fails with [`BoundingError::ColumnOutOfBounds`] when `tensor` is too narrow
/// for any of `columns`.
pub(crate) fn ensure_columns<'a, C>(tensor: &Tensor, columns: C) -> BoundingResult<()>
where
    C: IntoIterator<Item = &'a OutputIndex>,
{
    let cols = tensor.cols();
    match columns.into_iter().map(|idx| idx.get()).max() {
        Some(widest) if widest >= cols => Err(BoundingError::ColumnOutOfBounds {
            index: widest,
            cols,
        }),
        _ => Ok(()),
    }
}
