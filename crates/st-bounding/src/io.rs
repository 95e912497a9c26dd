// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BoundingError, BoundingResult};
use crate::layers::BoundingStack;
use crate::registry::{BoundingSpec, BuildContext};

/// File-level bounding configuration: an ordered list of records.
///
/// TOML uses an array of tables:
///
/// ```toml
/// [[bounding]]
/// type = "relu"
/// variables = ["tp", "cp"]
///
/// [[bounding]]
/// type = "fraction"
/// variables = ["cp"]
/// min_val = 0.0
/// max_val = 1.0
/// total_var = "tp"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingConfig {
    #[serde(default)]
    pub bounding: Vec<BoundingSpec>,
}

impl BoundingConfig {
    pub fn new(bounding: Vec<BoundingSpec>) -> Self {
        Self { bounding }
    }

    pub fn from_toml_str(text: &str) -> BoundingResult<Self> {
        toml::from_str(text).map_err(|source| BoundingError::Toml { path: None, source })
    }

    pub fn from_json_str(text: &str) -> BoundingResult<Self> {
        serde_json::from_str(text).map_err(|source| BoundingError::Json { path: None, source })
    }

    /// Reads a config file. `.json` files are parsed as JSON, everything else
    /// as TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> BoundingResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| BoundingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            serde_json::from_str(&text).map_err(|source| BoundingError::Json {
                path: Some(path.to_path_buf()),
                source,
            })?
        } else {
            toml::from_str(&text).map_err(|source| BoundingError::Toml {
                path: Some(path.to_path_buf()),
                source,
            })?
        };
        debug!(?path, "loaded bounding config");
        Ok(config)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> BoundingResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| BoundingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| BoundingError::Json {
            path: Some(path.to_path_buf()),
            source,
        })?;
        writer.flush().map_err(|source| BoundingError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the configured stack against `ctx`.
    pub fn build(&self, ctx: &BuildContext<'_>) -> BoundingResult<BoundingStack> {
        BoundingStack::from_specs(&self.bounding, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::NameToIndex;
    use crate::registry::BoundingKind;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("st_bounding_{nanos}"));
        dir
    }

    const TOML_CONFIG: &str = r#"
        [[bounding]]
        type = "relu"
        variables = ["var1", "var2"]

        [[bounding]]
        type = "HardtanhBounding"
        variables = ["var1", "var2"]
        min_val = 0.0
        max_val = 1.0

        [[bounding]]
        type = "fraction"
        variables = ["var1", "var2"]
        min_val = 0.0
        max_val = 1.0
        total_var = "total_var"
    "#;

    #[test]
    fn toml_config_builds_an_ordered_stack() {
        let config = BoundingConfig::from_toml_str(TOML_CONFIG).unwrap();
        let kinds: Vec<BoundingKind> = config.bounding.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                BoundingKind::Relu,
                BoundingKind::Hardtanh,
                BoundingKind::Fraction
            ]
        );
        let map = NameToIndex::from_names(&["var1", "var2", "total_var"]);
        let stack = config.build(&BuildContext::new(&map)).unwrap();
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn statistics_can_be_embedded_in_toml() {
        let text = r#"
            [[bounding]]
            type = "normalized-relu"
            variables = ["q"]
            min_val = [0.0]
            normalizer = ["min-max"]
            statistics = { mean = [0.5], stdev = [0.1], min = [-1.0], max = [3.0] }
            name_to_index_stats = { q = 0 }
        "#;
        let config = BoundingConfig::from_toml_str(text).unwrap();
        let map = NameToIndex::from_names(&["q"]);
        let stack = config.build(&BuildContext::new(&map)).unwrap();
        let bounded = stack
            .forward(&st_tensor::Tensor::from_vec(1, 1, vec![-5.0]).unwrap())
            .unwrap();
        assert_eq!(bounded.data(), &[0.25]);
    }

    #[test]
    fn malformed_toml_is_reported() {
        let err = BoundingConfig::from_toml_str("[[bounding]]\ntype = 3").unwrap_err();
        assert!(matches!(err, BoundingError::Toml { path: None, .. }));
    }

    #[test]
    fn json_files_round_trip_through_disk() {
        let root = unique_temp_dir();
        fs::create_dir_all(&root).unwrap();
        let path = root.join("bounding.json");

        let config = BoundingConfig::from_toml_str(TOML_CONFIG).unwrap();
        config.save_json(&path).unwrap();
        let restored = BoundingConfig::load(&path).unwrap();
        assert_eq!(restored, config);

        let toml_path = root.join("bounding.toml");
        fs::write(&toml_path, TOML_CONFIG).unwrap();
        assert_eq!(BoundingConfig::load(&toml_path).unwrap(), config);

        let _ = fs::remove_file(path);
        let _ = fs::remove_file(toml_path);
        let _ = fs::remove_dir(root);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_flush_is_reported() {
        // The config fits in the writer's buffer, so the device error only
        // surfaces when the buffer is flushed.
        let err = BoundingConfig::from_toml_str(TOML_CONFIG)
            .unwrap()
            .save_json("/dev/full")
            .unwrap_err();
        assert!(matches!(err, BoundingError::Io { ref path, .. } if path == Path::new("/dev/full")));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let err = BoundingConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, BoundingError::Io { .. }));
    }
}
