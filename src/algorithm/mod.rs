//! Algorithm configuration: named, ordered sequences of linkage passes.
//!
//! An [`Algorithm`] is data, not code — it is what a deployment tunes
//! without a rebuild. It is loaded from and written to JSON via
//! [`read_algorithm_config`]/[`write_algorithm_config`], round-tripping
//! byte-for-byte in field order and content (see the `Raw*` wire types
//! below), and it is what wires a pass's `funcs`/`matching_rule` strings
//! into the closed [`MatcherKind`]/[`MatchingRule`] enums exactly once, at
//! load time.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blocking::blocking_key_for_feature;
use crate::error::{Error, Result};
use crate::matching::{Kwargs, MatcherKind, MatchingRule};
use crate::pii::Feature;

/// How a block field's raw value is transformed before being compared
/// against stored blocking values. For the six fields this crate supports
/// blocking on, the transformation is intrinsic to the [`crate::blocking::BlockingKey`]
/// the field maps to — this is carried on [`BlockSpec`] purely so config
/// files round-trip with the field present, and validated against the
/// intrinsic transformation at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transformation {
    #[serde(rename = "first4")]
    First4,
    #[serde(rename = "last4")]
    Last4,
}

impl Transformation {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "first4" => Ok(Transformation::First4),
            "last4" => Ok(Transformation::Last4),
            other => Err(Error::invalid_config(format!(
                "transformation {other} is not valid"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Transformation::First4 => "first4",
            Transformation::Last4 => "last4",
        }
    }
}

/// One field a pass blocks on.
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub field: Feature,
    pub transformation: Option<Transformation>,
}

/// One pass of the linkage pipeline: which fields narrow the candidate set,
/// which matchers compare which features, and the rule + cluster ratio that
/// decide whether a group of candidates counts as a cluster match.
#[derive(Debug, Clone)]
pub struct Pass {
    pub funcs: BTreeMap<Feature, MatcherKind>,
    pub blocks: Vec<BlockSpec>,
    pub matching_rule: MatchingRule,
    pub cluster_ratio: f64,
    pub kwargs: Kwargs,
}

/// An ordered sequence of passes. Earlier passes run first; the engine
/// collects cluster-matching persons across every pass before deciding.
#[derive(Debug, Clone)]
pub struct Algorithm {
    pub passes: Vec<Pass>,
}

// --- Wire format -----------------------------------------------------------
//
// The on-disk shape mirrors the config files this system has always used:
// a JSON array of pass objects with string feature/matcher keys. Raw* types
// capture that shape exactly for serde; TryFrom/From convert to/from the
// typed `Pass`/`Algorithm` above, which is where field names get resolved
// into `Feature` and function identifiers get resolved into closed enums.

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    transformation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RawKwargs {
    #[serde(skip_serializing_if = "Option::is_none")]
    similarity_measure: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    thresholds: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    true_match_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    log_odds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPass {
    funcs: BTreeMap<String, String>,
    blocks: Vec<RawBlock>,
    matching_rule: String,
    cluster_ratio: f64,
    #[serde(default)]
    kwargs: RawKwargs,
}

impl TryFrom<RawPass> for Pass {
    type Error = Error;

    fn try_from(raw: RawPass) -> Result<Self> {
        let mut funcs = BTreeMap::new();
        for (field, identifier) in raw.funcs {
            let feature = Feature::try_from(field.as_str())?;
            funcs.insert(feature, MatcherKind::resolve(&identifier)?);
        }

        let mut blocks = Vec::with_capacity(raw.blocks.len());
        for block in raw.blocks {
            let field = Feature::try_from(block.value.as_str())?;
            if blocking_key_for_feature(field).is_none() {
                return Err(Error::invalid_config(format!(
                    "{} is not a supported blocking field",
                    block.value
                )));
            }
            let transformation = block.transformation.as_deref().map(Transformation::parse).transpose()?;
            blocks.push(BlockSpec { field, transformation });
        }

        let matching_rule = MatchingRule::resolve(&raw.matching_rule)?;

        let mut thresholds = BTreeMap::new();
        for (field, value) in raw.kwargs.thresholds {
            thresholds.insert(Feature::try_from(field.as_str())?, value);
        }
        let mut log_odds = BTreeMap::new();
        for (field, value) in raw.kwargs.log_odds {
            log_odds.insert(Feature::try_from(field.as_str())?, value);
        }

        Ok(Pass {
            funcs,
            blocks,
            matching_rule,
            cluster_ratio: raw.cluster_ratio,
            kwargs: Kwargs {
                similarity_measure: raw.kwargs.similarity_measure,
                thresholds,
                true_match_threshold: raw.kwargs.true_match_threshold,
                log_odds,
            },
        })
    }
}

impl From<&Pass> for RawPass {
    fn from(pass: &Pass) -> Self {
        RawPass {
            funcs: pass
                .funcs
                .iter()
                .map(|(f, m)| (f.name().to_string(), m.identifier().to_string()))
                .collect(),
            blocks: pass
                .blocks
                .iter()
                .map(|b| RawBlock {
                    value: b.field.name().to_string(),
                    transformation: b.transformation.map(|t| t.name().to_string()),
                })
                .collect(),
            matching_rule: pass.matching_rule.identifier().to_string(),
            cluster_ratio: pass.cluster_ratio,
            kwargs: RawKwargs {
                similarity_measure: pass.kwargs.similarity_measure.clone(),
                thresholds: pass
                    .kwargs
                    .thresholds
                    .iter()
                    .map(|(f, v)| (f.name().to_string(), *v))
                    .collect(),
                true_match_threshold: pass.kwargs.true_match_threshold,
                log_odds: pass
                    .kwargs
                    .log_odds
                    .iter()
                    .map(|(f, v)| (f.name().to_string(), *v))
                    .collect(),
            },
        }
    }
}

/// Load an algorithm config from `path`. Fails with
/// [`Error::FileNotFound`] if the file is absent, [`Error::InvalidJson`] if
/// it isn't valid JSON, and [`Error::InvalidConfig`] if it parses but
/// references an unknown feature, matcher, rule, blocking field, or
/// transformation.
pub fn read_algorithm_config(path: &Path) -> Result<Algorithm> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::invalid_input(format!("could not read {}: {e}", path.display())))?;
    let raw_passes: Vec<RawPass> = serde_json::from_str(&contents)
        .map_err(|e| Error::InvalidJson(format!("{}: {e}", path.display())))?;
    let passes = raw_passes
        .into_iter()
        .map(Pass::try_from)
        .collect::<Result<Vec<_>>>()?;
    Ok(Algorithm { passes })
}

/// Write `algorithm` to `path` as JSON, in the same shape
/// [`read_algorithm_config`] reads.
pub fn write_algorithm_config(path: &Path, algorithm: &Algorithm) -> Result<()> {
    let raw_passes: Vec<RawPass> = algorithm.passes.iter().map(RawPass::from).collect();
    let contents = serde_json::to_string_pretty(&raw_passes)
        .map_err(|e| Error::internal(format!("failed to serialize algorithm: {e}")))?;
    std::fs::write(path, contents)
        .map_err(|e| Error::invalid_input(format!("could not write {}: {e}", path.display())))
}

fn shared_thresholds() -> BTreeMap<Feature, f64> {
    BTreeMap::from([
        (Feature::FirstName, 0.9),
        (Feature::LastName, 0.9),
        (Feature::Birthdate, 0.95),
        (Feature::Address, 0.9),
        (Feature::City, 0.92),
        (Feature::Zipcode, 0.95),
    ])
}

fn shared_log_odds() -> BTreeMap<Feature, f64> {
    BTreeMap::from([
        (Feature::Address, 8.438284928858774),
        (Feature::Birthdate, 10.126641103800338),
        (Feature::City, 2.438553006137189),
        (Feature::FirstName, 6.849475906891162),
        (Feature::LastName, 6.350720397426025),
        (Feature::Mrn, 0.3051262572525359),
        (Feature::Sex, 0.7510419059643679),
        (Feature::State, 0.022376768992488694),
        (Feature::Zipcode, 4.975031471124867),
    ])
}

fn first_pass_blocks() -> Vec<BlockSpec> {
    vec![
        BlockSpec { field: Feature::Birthdate, transformation: None },
        BlockSpec { field: Feature::Mrn, transformation: Some(Transformation::Last4) },
        BlockSpec { field: Feature::Sex, transformation: None },
    ]
}

fn second_pass_blocks() -> Vec<BlockSpec> {
    vec![
        BlockSpec { field: Feature::Zipcode, transformation: None },
        BlockSpec { field: Feature::FirstName, transformation: Some(Transformation::First4) },
        BlockSpec { field: Feature::LastName, transformation: Some(Transformation::First4) },
        BlockSpec { field: Feature::Sex, transformation: None },
    ]
}

/// The bundled "basic" algorithm: boolean matchers, exact blocking-field
/// agreement required in every blocked field (`PerfectMatch`).
pub fn dibbs_basic() -> Algorithm {
    let first_pass = Pass {
        funcs: BTreeMap::from([
            (Feature::FirstName, MatcherKind::FuzzyMatch),
            (Feature::LastName, MatcherKind::ExactMatch),
        ]),
        blocks: first_pass_blocks(),
        matching_rule: MatchingRule::PerfectMatch,
        cluster_ratio: 0.9,
        kwargs: Kwargs {
            similarity_measure: None,
            thresholds: shared_thresholds(),
            true_match_threshold: None,
            log_odds: BTreeMap::new(),
        },
    };
    let second_pass = Pass {
        funcs: BTreeMap::from([
            (Feature::Address, MatcherKind::FuzzyMatch),
            (Feature::Birthdate, MatcherKind::ExactMatch),
        ]),
        blocks: second_pass_blocks(),
        matching_rule: MatchingRule::PerfectMatch,
        cluster_ratio: 0.9,
        kwargs: Kwargs {
            similarity_measure: None,
            thresholds: shared_thresholds(),
            true_match_threshold: None,
            log_odds: BTreeMap::new(),
        },
    };
    Algorithm { passes: vec![first_pass, second_pass] }
}

/// The bundled "enhanced" algorithm: log-odds weighted fuzzy matchers, a
/// cumulative-score cutoff (`LogOddsCutoff`) instead of all-or-nothing
/// agreement.
pub fn dibbs_enhanced() -> Algorithm {
    let first_pass = Pass {
        funcs: BTreeMap::from([
            (Feature::FirstName, MatcherKind::LogOddsFuzzyMatch),
            (Feature::LastName, MatcherKind::LogOddsFuzzyMatch),
        ]),
        blocks: first_pass_blocks(),
        matching_rule: MatchingRule::LogOddsCutoff,
        cluster_ratio: 0.9,
        kwargs: Kwargs {
            similarity_measure: Some("JaroWinkler".to_string()),
            thresholds: shared_thresholds(),
            true_match_threshold: Some(12.2),
            log_odds: shared_log_odds(),
        },
    };
    let second_pass = Pass {
        funcs: BTreeMap::from([
            (Feature::Address, MatcherKind::LogOddsFuzzyMatch),
            (Feature::Birthdate, MatcherKind::LogOddsFuzzyMatch),
        ]),
        blocks: second_pass_blocks(),
        matching_rule: MatchingRule::LogOddsCutoff,
        cluster_ratio: 0.9,
        kwargs: Kwargs {
            similarity_measure: Some("JaroWinkler".to_string()),
            thresholds: shared_thresholds(),
            true_match_threshold: Some(17.0),
            log_odds: shared_log_odds(),
        },
    };
    Algorithm { passes: vec![first_pass, second_pass] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_file_is_file_not_found() {
        let err = read_algorithm_config(Path::new("/does/not/exist.json")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let err = read_algorithm_config(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidJson(_)));
    }

    #[test]
    fn unsupported_blocking_field_is_invalid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("algo.json");
        std::fs::write(
            &path,
            r#"[{"funcs":{},"blocks":[{"value":"invalid"}],"matching_rule":"func:x.eval_perfect_match","cluster_ratio":0.9,"kwargs":{}}]"#,
        )
        .unwrap();
        let err = read_algorithm_config(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidFeature(_)));
    }

    #[test]
    fn dibbs_basic_round_trips_through_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dibbs_basic.json");
        let algorithm = dibbs_basic();
        write_algorithm_config(&path, &algorithm).unwrap();
        let reloaded = read_algorithm_config(&path).unwrap();
        assert_eq!(reloaded.passes.len(), algorithm.passes.len());
        assert_eq!(reloaded.passes[0].cluster_ratio, 0.9);
        assert_eq!(reloaded.passes[0].matching_rule, MatchingRule::PerfectMatch);
    }

    #[test]
    fn dibbs_enhanced_carries_true_match_thresholds() {
        let algorithm = dibbs_enhanced();
        assert_eq!(algorithm.passes[0].kwargs.true_match_threshold, Some(12.2));
        assert_eq!(algorithm.passes[1].kwargs.true_match_threshold, Some(17.0));
        assert_eq!(algorithm.passes[0].matching_rule, MatchingRule::LogOddsCutoff);
    }
}
