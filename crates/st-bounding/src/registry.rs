// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Declarative construction of bounding layers.
//!
//! A [`BoundingSpec`] is a record naming one of a closed set of variants plus
//! its keyword parameters. Records are built against a [`BuildContext`] that
//! carries the model's output index and, for normalised layers, the dataset
//! statistics. Parameters written into the record win over the context.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{BoundingError, BoundingResult};
use crate::index::{NameToIndex, NameToStatIndex};
use crate::layers::{
    FractionBounding, HardtanhBounding, NormalizedReluBounding, ReluBounding,
    DEFAULT_NEGATIVE_SLOPE,
};
use crate::module::Bounding;
use crate::stats::Statistics;

/// Every bounding variant the registry can build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundingKind {
    Relu,
    LeakyRelu,
    Hardtanh,
    LeakyHardtanh,
    NormalizedRelu,
    LeakyNormalizedRelu,
    Fraction,
    LeakyFraction,
}

impl BoundingKind {
    pub const ALL: [BoundingKind; 8] = [
        BoundingKind::Relu,
        BoundingKind::LeakyRelu,
        BoundingKind::Hardtanh,
        BoundingKind::LeakyHardtanh,
        BoundingKind::NormalizedRelu,
        BoundingKind::LeakyNormalizedRelu,
        BoundingKind::Fraction,
        BoundingKind::LeakyFraction,
    ];

    /// Tag used in configuration records.
    pub fn tag(self) -> &'static str {
        match self {
            BoundingKind::Relu => "relu",
            BoundingKind::LeakyRelu => "leaky-relu",
            BoundingKind::Hardtanh => "hardtanh",
            BoundingKind::LeakyHardtanh => "leaky-hardtanh",
            BoundingKind::NormalizedRelu => "normalized-relu",
            BoundingKind::LeakyNormalizedRelu => "leaky-normalized-relu",
            BoundingKind::Fraction => "fraction",
            BoundingKind::LeakyFraction => "leaky-fraction",
        }
    }

    /// Class-style alias accepted alongside the tag.
    pub fn class_name(self) -> &'static str {
        match self {
            BoundingKind::Relu => "ReluBounding",
            BoundingKind::LeakyRelu => "LeakyReluBounding",
            BoundingKind::Hardtanh => "HardtanhBounding",
            BoundingKind::LeakyHardtanh => "LeakyHardtanhBounding",
            BoundingKind::NormalizedRelu => "NormalizedReluBounding",
            BoundingKind::LeakyNormalizedRelu => "LeakyNormalizedReluBounding",
            BoundingKind::Fraction => "FractionBounding",
            BoundingKind::LeakyFraction => "LeakyFractionBounding",
        }
    }

    pub fn is_leaky(self) -> bool {
        matches!(
            self,
            BoundingKind::LeakyRelu
                | BoundingKind::LeakyHardtanh
                | BoundingKind::LeakyNormalizedRelu
                | BoundingKind::LeakyFraction
        )
    }
}

impl fmt::Display for BoundingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BoundingKind {
    type Err = BoundingError;

    /// Accepts the tag, the class name, or a dotted path ending in the class
    /// name (`models.layers.bounding.ReluBounding`).
    fn from_str(s: &str) -> BoundingResult<Self> {
        let leaf = s.rsplit('.').next().unwrap_or(s);
        BoundingKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s || kind.class_name() == leaf)
            .ok_or_else(|| BoundingError::UnknownKind { name: s.to_string() })
    }
}

fn default_negative_slope() -> f32 {
    DEFAULT_NEGATIVE_SLOPE
}

/// Declarative description of one bounding layer.
///
/// `type` accepts anything [`BoundingKind::from_str`] does: the kebab-case
/// tag, the class name, or a dotted path ending in the class name. Records are
/// always written back with the tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "type", rename_all = "kebab-case")]
pub enum BoundingSpec {
    Relu { variables: Vec<String> },
    LeakyRelu {
        variables: Vec<String>,
        #[serde(default = "default_negative_slope")]
        negative_slope: f32,
    },
    Hardtanh {
        variables: Vec<String>,
        min_val: f32,
        max_val: f32,
    },
    LeakyHardtanh {
        variables: Vec<String>,
        min_val: f32,
        max_val: f32,
        #[serde(default = "default_negative_slope")]
        negative_slope: f32,
    },
    NormalizedRelu {
        variables: Vec<String>,
        min_val: Vec<f32>,
        normalizer: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        statistics: Option<Statistics>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name_to_index_stats: Option<NameToStatIndex>,
    },
    LeakyNormalizedRelu {
        variables: Vec<String>,
        min_val: Vec<f32>,
        normalizer: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        statistics: Option<Statistics>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name_to_index_stats: Option<NameToStatIndex>,
        #[serde(default = "default_negative_slope")]
        negative_slope: f32,
    },
    Fraction {
        variables: Vec<String>,
        min_val: f32,
        max_val: f32,
        total_var: String,
    },
    LeakyFraction {
        variables: Vec<String>,
        min_val: f32,
        max_val: f32,
        total_var: String,
        #[serde(default = "default_negative_slope")]
        negative_slope: f32,
    },
}

impl Serialize for BoundingSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        BoundingSpec::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for BoundingSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut record = Value::deserialize(deserializer)?;
        if let Some(target) = record.get("type").and_then(Value::as_str) {
            let kind: BoundingKind = target.parse().map_err(de::Error::custom)?;
            record["type"] = Value::from(kind.tag());
        }
        BoundingSpec::deserialize(record).map_err(de::Error::custom)
    }
}

/// Inputs supplied by the model at build time rather than by the record.
#[derive(Clone, Copy, Debug)]
pub struct BuildContext<'a> {
    name_to_index: &'a NameToIndex,
    statistics: Option<&'a Statistics>,
    name_to_index_stats: Option<&'a NameToStatIndex>,
}

impl<'a> BuildContext<'a> {
    pub fn new(name_to_index: &'a NameToIndex) -> Self {
        Self {
            name_to_index,
            statistics: None,
            name_to_index_stats: None,
        }
    }

    /// Supplies statistics for records that do not carry their own.
    pub fn with_statistics(
        mut self,
        statistics: &'a Statistics,
        name_to_index_stats: &'a NameToStatIndex,
    ) -> Self {
        self.statistics = Some(statistics);
        self.name_to_index_stats = Some(name_to_index_stats);
        self
    }

    pub fn name_to_index(&self) -> &'a NameToIndex {
        self.name_to_index
    }
}

impl BoundingSpec {
    pub fn kind(&self) -> BoundingKind {
        match self {
            BoundingSpec::Relu { .. } => BoundingKind::Relu,
            BoundingSpec::LeakyRelu { .. } => BoundingKind::LeakyRelu,
            BoundingSpec::Hardtanh { .. } => BoundingKind::Hardtanh,
            BoundingSpec::LeakyHardtanh { .. } => BoundingKind::LeakyHardtanh,
            BoundingSpec::NormalizedRelu { .. } => BoundingKind::NormalizedRelu,
            BoundingSpec::LeakyNormalizedRelu { .. } => BoundingKind::LeakyNormalizedRelu,
            BoundingSpec::Fraction { .. } => BoundingKind::Fraction,
            BoundingSpec::LeakyFraction { .. } => BoundingKind::LeakyFraction,
        }
    }

    pub fn variables(&self) -> &[String] {
        match self {
            BoundingSpec::Relu { variables }
            | BoundingSpec::LeakyRelu { variables, .. }
            | BoundingSpec::Hardtanh { variables, .. }
            | BoundingSpec::LeakyHardtanh { variables, .. }
            | BoundingSpec::NormalizedRelu { variables, .. }
            | BoundingSpec::LeakyNormalizedRelu { variables, .. }
            | BoundingSpec::Fraction { variables, .. }
            | BoundingSpec::LeakyFraction { variables, .. } => variables,
        }
    }

    /// Builds the layer described by this record.
    pub fn build(&self, ctx: &BuildContext<'_>) -> BoundingResult<Box<dyn Bounding>> {
        let map = ctx.name_to_index;
        let layer: Box<dyn Bounding> = match self {
            BoundingSpec::Relu { variables } => Box::new(ReluBounding::new(variables, map)?),
            BoundingSpec::LeakyRelu {
                variables,
                negative_slope,
            } => Box::new(ReluBounding::leaky(variables, map, *negative_slope)?),
            BoundingSpec::Hardtanh {
                variables,
                min_val,
                max_val,
            } => Box::new(HardtanhBounding::new(variables, map, *min_val, *max_val)?),
            BoundingSpec::LeakyHardtanh {
                variables,
                min_val,
                max_val,
                negative_slope,
            } => Box::new(HardtanhBounding::leaky(
                variables,
                map,
                *min_val,
                *max_val,
                *negative_slope,
            )?),
            BoundingSpec::NormalizedRelu {
                variables,
                min_val,
                normalizer,
                statistics,
                name_to_index_stats,
            } => Box::new(self.normalized(
                ctx,
                variables,
                min_val,
                normalizer,
                statistics.as_ref(),
                name_to_index_stats.as_ref(),
                None,
            )?),
            BoundingSpec::LeakyNormalizedRelu {
                variables,
                min_val,
                normalizer,
                statistics,
                name_to_index_stats,
                negative_slope,
            } => Box::new(self.normalized(
                ctx,
                variables,
                min_val,
                normalizer,
                statistics.as_ref(),
                name_to_index_stats.as_ref(),
                Some(*negative_slope),
            )?),
            BoundingSpec::Fraction {
                variables,
                min_val,
                max_val,
                total_var,
            } => Box::new(FractionBounding::new(
                variables, map, *min_val, *max_val, total_var,
            )?),
            BoundingSpec::LeakyFraction {
                variables,
                min_val,
                max_val,
                total_var,
                negative_slope,
            } => Box::new(FractionBounding::leaky(
                variables,
                map,
                *min_val,
                *max_val,
                total_var,
                *negative_slope,
            )?),
        };
        Ok(layer)
    }

    #[allow(clippy::too_many_arguments)]
    fn normalized(
        &self,
        ctx: &BuildContext<'_>,
        variables: &[String],
        min_val: &[f32],
        normalizer: &[String],
        statistics: Option<&Statistics>,
        name_to_index_stats: Option<&NameToStatIndex>,
        negative_slope: Option<f32>,
    ) -> BoundingResult<NormalizedReluBounding> {
        let kind = self.kind().class_name();
        let statistics = statistics
            .or(ctx.statistics)
            .ok_or(BoundingError::MissingParameter {
                kind,
                parameter: "statistics",
            })?;
        let name_to_index_stats = name_to_index_stats.or(ctx.name_to_index_stats).ok_or(
            BoundingError::MissingParameter {
                kind,
                parameter: "name_to_index_stats",
            },
        )?;
        match negative_slope {
            None => NormalizedReluBounding::new(
                variables,
                ctx.name_to_index,
                min_val,
                normalizer,
                statistics,
                name_to_index_stats,
            ),
            Some(slope) => NormalizedReluBounding::leaky(
                variables,
                ctx.name_to_index,
                min_val,
                normalizer,
                statistics,
                name_to_index_stats,
                slope,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use st_tensor::Tensor;

    fn name_to_index() -> NameToIndex {
        NameToIndex::from_names(&["var1", "var2", "total_var"])
    }

    #[test]
    fn kinds_parse_from_tags_and_class_names() {
        for kind in BoundingKind::ALL {
            assert_eq!(kind.tag().parse::<BoundingKind>().unwrap(), kind);
            assert_eq!(kind.class_name().parse::<BoundingKind>().unwrap(), kind);
        }
        assert_eq!(
            "models.layers.bounding.FractionBounding"
                .parse::<BoundingKind>()
                .unwrap(),
            BoundingKind::Fraction
        );
        assert!(matches!(
            "SoftplusBounding".parse::<BoundingKind>(),
            Err(BoundingError::UnknownKind { .. })
        ));
    }

    #[test]
    fn record_tags_match_kind_tags() {
        let spec = BoundingSpec::LeakyNormalizedRelu {
            variables: vec!["var1".into()],
            min_val: vec![0.0],
            normalizer: vec!["mean-std".into()],
            statistics: None,
            name_to_index_stats: None,
            negative_slope: 0.1,
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["type"], "leaky-normalized-relu");
        assert_eq!(value["type"], spec.kind().tag());
    }

    #[test]
    fn class_name_aliases_deserialize() {
        let spec: BoundingSpec = serde_json::from_str(
            r#"{"type": "HardtanhBounding", "variables": ["var1"], "min_val": 0.0, "max_val": 1.0}"#,
        )
        .unwrap();
        assert_eq!(spec.kind(), BoundingKind::Hardtanh);
        assert_eq!(spec.variables(), &["var1".to_string()]);
    }

    #[test]
    fn dotted_targets_deserialize() {
        let spec: BoundingSpec = serde_json::from_str(
            r#"{"type": "anemoi.models.layers.bounding.ReluBounding", "variables": ["var1"]}"#,
        )
        .unwrap();
        assert_eq!(
            spec,
            BoundingSpec::Relu {
                variables: vec!["var1".into()],
            }
        );
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["type"], "relu");

        let err = serde_json::from_str::<BoundingSpec>(
            r#"{"type": "models.layers.bounding.SoftplusBounding", "variables": ["var1"]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown bounding kind"));
    }

    #[test]
    fn leaky_records_default_their_slope() {
        let spec: BoundingSpec =
            serde_json::from_str(r#"{"type": "leaky-relu", "variables": ["var1"]}"#).unwrap();
        assert_eq!(
            spec,
            BoundingSpec::LeakyRelu {
                variables: vec!["var1".into()],
                negative_slope: DEFAULT_NEGATIVE_SLOPE,
            }
        );
    }

    #[test]
    fn unknown_tags_are_rejected() {
        let result =
            serde_json::from_str::<BoundingSpec>(r#"{"type": "softplus", "variables": ["var1"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn normalized_records_fall_back_to_context_statistics() {
        let map = name_to_index();
        let stats = Statistics::new(
            vec![1.0, 2.0, 3.0],
            vec![0.5, 0.5, 0.5],
            vec![1.0, 1.0, 1.0],
            vec![11.0, 10.0, 10.0],
        )
        .unwrap();
        let stats_index = NameToStatIndex::from_names(&["var1", "var2", "total_var"]);
        let spec = BoundingSpec::NormalizedRelu {
            variables: vec!["var1".into()],
            min_val: vec![2.0],
            normalizer: vec!["mean-std".into()],
            statistics: None,
            name_to_index_stats: None,
        };

        let err = spec.build(&BuildContext::new(&map)).unwrap_err();
        assert!(matches!(
            err,
            BoundingError::MissingParameter {
                kind: "NormalizedReluBounding",
                parameter: "statistics"
            }
        ));

        let ctx = BuildContext::new(&map).with_statistics(&stats, &stats_index);
        let layer = spec.build(&ctx).unwrap();
        assert_eq!(layer.kind(), BoundingKind::NormalizedRelu);
        let input = Tensor::from_rows(&[[-1.0, 0.0, 0.0]]).unwrap();
        assert_eq!(layer.forward(&input).unwrap().data(), &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn every_kind_builds_from_a_record() {
        let map = name_to_index();
        let stats = Statistics::new(vec![0.0; 3], vec![1.0; 3], vec![0.0; 3], vec![1.0; 3]).unwrap();
        let stats_index = NameToStatIndex::from_names(&["var1", "var2", "total_var"]);
        let ctx = BuildContext::new(&map).with_statistics(&stats, &stats_index);
        let vars = || vec!["var1".to_string(), "var2".to_string()];
        let specs = vec![
            BoundingSpec::Relu { variables: vars() },
            BoundingSpec::LeakyRelu {
                variables: vars(),
                negative_slope: 0.01,
            },
            BoundingSpec::Hardtanh {
                variables: vars(),
                min_val: 0.0,
                max_val: 1.0,
            },
            BoundingSpec::LeakyHardtanh {
                variables: vars(),
                min_val: 0.0,
                max_val: 1.0,
                negative_slope: 0.01,
            },
            BoundingSpec::NormalizedRelu {
                variables: vars(),
                min_val: vec![0.0, 0.0],
                normalizer: vec!["mean-std".into(), "min-max".into()],
                statistics: None,
                name_to_index_stats: None,
            },
            BoundingSpec::LeakyNormalizedRelu {
                variables: vars(),
                min_val: vec![0.0, 0.0],
                normalizer: vec!["mean-std".into(), "min-max".into()],
                statistics: None,
                name_to_index_stats: None,
                negative_slope: 0.01,
            },
            BoundingSpec::Fraction {
                variables: vars(),
                min_val: 0.0,
                max_val: 1.0,
                total_var: "total_var".into(),
            },
            BoundingSpec::LeakyFraction {
                variables: vars(),
                min_val: 0.0,
                max_val: 1.0,
                total_var: "total_var".into(),
                negative_slope: 0.01,
            },
        ];
        let built: Vec<BoundingKind> = specs
            .iter()
            .map(|spec| spec.build(&ctx).unwrap().kind())
            .collect();
        assert_eq!(built, BoundingKind::ALL.to_vec());
    }
}
