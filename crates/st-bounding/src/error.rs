// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::path::PathBuf;

use st_tensor::TensorError;
use thiserror::Error;

/// Result alias used by every bounding constructor and transform.
pub type BoundingResult<T> = Result<T, BoundingError>;

/// Errors raised while building or applying bounding layers.
///
/// Everything except [`BoundingError::ColumnOutOfBounds`] and
/// [`BoundingError::Tensor`] is raised at construction time.
#[derive(Debug, Error)]
pub enum BoundingError {
    #[error("variable `{name}` is not present in the {space} index")]
    UnknownVariable { name: String, space: &'static str },
    #[error("variable `{name}` resolves to column {index}, which is already selected")]
    DuplicateColumn { name: String, index: usize },
    #[error(
        "unsupported normalizer `{normalizer}` for variable `{variable}`; expected `mean-std` or `min-max`"
    )]
    UnsupportedNormalizer { variable: String, normalizer: String },
    #[error("unknown bounding kind `{name}`")]
    UnknownKind { name: String },
    #[error("`{parameter}` has {got} entries but {expected} variables were selected")]
    LengthMismatch {
        parameter: &'static str,
        expected: usize,
        got: usize,
    },
    #[error(
        "statistics arrays must share one length (mean={mean}, stdev={stdev}, min={min}, max={max})"
    )]
    MalformedStatistics {
        mean: usize,
        stdev: usize,
        min: usize,
        max: usize,
    },
    #[error("statistics index {index} for `{name}` exceeds the {len} available entries")]
    StatIndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },
    #[error("`{normalizer}` statistics for `{variable}` give a zero spread or a non-finite floor")]
    DegenerateStatistics {
        variable: String,
        normalizer: &'static str,
    },
    #[error("min_val ({min}) must be strictly below max_val ({max})")]
    InvalidInterval { min: f32, max: f32 },
    #[error("negative slope {slope} must lie in [0, 1)")]
    InvalidSlope { slope: f32 },
    #[error("{kind} requires `{parameter}`")]
    MissingParameter {
        kind: &'static str,
        parameter: &'static str,
    },
    #[error("column {index} is out of bounds for a tensor with {cols} columns")]
    ColumnOutOfBounds { index: usize, cols: usize },
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML bounding config{}: {source}", location(.path))]
    Toml {
        path: Option<PathBuf>,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to process JSON bounding config{}: {source}", location(.path))]
    Json {
        path: Option<PathBuf>,
        #[source]
        source: serde_json::Error,
    },
}

fn location(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {path:?}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = BoundingError::UnknownVariable {
            name: "tp".into(),
            space: "output",
        };
        assert_eq!(
            err.to_string(),
            "variable `tp` is not present in the output index"
        );

        let err = BoundingError::InvalidInterval { min: 1.0, max: 1.0 };
        assert_eq!(
            err.to_string(),
            "min_val (1) must be strictly below max_val (1)"
        );
    }

    #[test]
    fn parse_errors_mention_the_path_only_when_known() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let inline = BoundingError::Json { path: None, source };
        assert!(inline
            .to_string()
            .starts_with("failed to process JSON bounding config: "));

        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let from_file = BoundingError::Json {
            path: Some(PathBuf::from("bounds.json")),
            source,
        };
        assert!(from_file.to_string().contains("\"bounds.json\""));
    }

    #[test]
    fn tensor_errors_convert_transparently() {
        let err: BoundingError = TensorError::InvalidDimensions { rows: 0, cols: 1 }.into();
        assert!(matches!(err, BoundingError::Tensor(_)));
        assert!(err.to_string().starts_with("invalid tensor dimensions"));
    }
}
