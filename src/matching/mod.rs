//! Matchers library: per-feature comparison functions and the matching
//! rules that combine their results into a single match/no-match verdict.
//!
//! Algorithm config files reference matchers and rules by a `func:<path>`
//! string identifier (see `algorithm`). Per the registry redesign, that
//! string is resolved into a [`MatcherKind`]/[`MatchingRule`] exactly once,
//! at config-load time — the hot evaluation path never touches a string.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::pii::Feature;

/// Per-feature comparison configuration shared by every matcher/rule in a
/// pass. Mirrors the `kwargs` block of an algorithm config.
#[derive(Debug, Clone, Default)]
pub struct Kwargs {
    /// Only `"JaroWinkler"` is implemented; present so config round-trips
    /// preserve the field even though this crate has one similarity measure.
    pub similarity_measure: Option<String>,
    pub thresholds: BTreeMap<Feature, f64>,
    pub true_match_threshold: Option<f64>,
    pub log_odds: BTreeMap<Feature, f64>,
}

/// The result of comparing one feature's values between an incoming record
/// and a candidate. Boolean matchers produce [`Bool`](FeatureOutcome::Bool);
/// log-odds matchers produce a weighted [`Score`](FeatureOutcome::Score)
/// that matching rules sum.
#[derive(Debug, Clone, Copy)]
pub enum FeatureOutcome {
    Bool(bool),
    Score(f64),
}

/// A matcher compares one feature's values between two records and
/// produces either a boolean verdict or a log-odds-weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    ExactMatch,
    FuzzyMatch,
    FourCharMatch,
    LogOddsExactMatch,
    LogOddsFuzzyMatch,
}

impl MatcherKind {
    pub fn identifier(&self) -> &'static str {
        match self {
            MatcherKind::ExactMatch => "func:master_patient_index.matching.feature_match_exact",
            MatcherKind::FuzzyMatch => "func:master_patient_index.matching.feature_match_fuzzy_string",
            MatcherKind::FourCharMatch => "func:master_patient_index.matching.feature_match_four_char",
            MatcherKind::LogOddsExactMatch => {
                "func:master_patient_index.matching.feature_match_log_odds_exact"
            }
            MatcherKind::LogOddsFuzzyMatch => {
                "func:master_patient_index.matching.feature_match_log_odds_fuzzy_compare"
            }
        }
    }

    pub fn resolve(identifier: &str) -> Result<Self> {
        match func_name(identifier)? {
            "feature_match_exact" => Ok(MatcherKind::ExactMatch),
            "feature_match_fuzzy_string" => Ok(MatcherKind::FuzzyMatch),
            "feature_match_four_char" => Ok(MatcherKind::FourCharMatch),
            "feature_match_log_odds_exact" => Ok(MatcherKind::LogOddsExactMatch),
            "feature_match_log_odds_fuzzy_compare" => Ok(MatcherKind::LogOddsFuzzyMatch),
            other => Err(Error::invalid_config(format!("unknown matcher function: {other}"))),
        }
    }

    /// Compare every value an incoming record carries for `feature` against
    /// every value the candidate carries, cartesian-style: multi-valued
    /// fields (names with more than one given name, patients with more than
    /// one address) succeed if *any* pair satisfies the matcher.
    pub fn compare(
        &self,
        feature: Feature,
        kwargs: &Kwargs,
        incoming: &[String],
        candidate: &[String],
    ) -> FeatureOutcome {
        match self {
            MatcherKind::ExactMatch => {
                FeatureOutcome::Bool(any_pair(incoming, candidate, |a, b| a == b))
            }
            MatcherKind::FourCharMatch => FeatureOutcome::Bool(any_pair(incoming, candidate, |a, b| {
                prefix4(a) == prefix4(b)
            })),
            MatcherKind::FuzzyMatch => {
                let threshold = kwargs.thresholds.get(&feature).copied();
                let matched = match threshold {
                    Some(t) => any_pair(incoming, candidate, |a, b| strsim::jaro_winkler(a, b) >= t),
                    None => false,
                };
                FeatureOutcome::Bool(matched)
            }
            MatcherKind::LogOddsExactMatch => {
                let weight = kwargs.log_odds.get(&feature).copied().unwrap_or(0.0);
                let score = if any_pair(incoming, candidate, |a, b| a == b) {
                    weight
                } else {
                    0.0
                };
                FeatureOutcome::Score(score)
            }
            MatcherKind::LogOddsFuzzyMatch => {
                let weight = kwargs.log_odds.get(&feature).copied().unwrap_or(0.0);
                let best_similarity = max_pair_similarity(incoming, candidate);
                FeatureOutcome::Score(best_similarity * weight)
            }
        }
    }
}

/// A matching rule combines the per-feature [`FeatureOutcome`]s for one
/// candidate row into a single match/no-match verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingRule {
    PerfectMatch,
    LogOddsCutoff,
}

impl MatchingRule {
    pub fn identifier(&self) -> &'static str {
        match self {
            MatchingRule::PerfectMatch => "func:master_patient_index.matching.eval_perfect_match",
            MatchingRule::LogOddsCutoff => "func:master_patient_index.matching.eval_log_odds_cutoff",
        }
    }

    pub fn resolve(identifier: &str) -> Result<Self> {
        match func_name(identifier)? {
            "eval_perfect_match" => Ok(MatchingRule::PerfectMatch),
            "eval_log_odds_cutoff" => Ok(MatchingRule::LogOddsCutoff),
            other => Err(Error::invalid_config(format!("unknown matching rule: {other}"))),
        }
    }

    /// `outcomes` is the per-feature comparison result for one candidate
    /// row, in the order the pass's `funcs` map declares them.
    pub fn evaluate(&self, outcomes: &[FeatureOutcome], kwargs: &Kwargs) -> Result<bool> {
        match self {
            MatchingRule::PerfectMatch => {
                for outcome in outcomes {
                    match outcome {
                        FeatureOutcome::Bool(true) => {}
                        FeatureOutcome::Bool(false) => return Ok(false),
                        FeatureOutcome::Score(_) => {
                            return Err(Error::internal(
                                "perfect-match rule applied to a log-odds matcher",
                            ))
                        }
                    }
                }
                Ok(true)
            }
            MatchingRule::LogOddsCutoff => {
                let threshold = kwargs.true_match_threshold.ok_or_else(|| {
                    Error::invalid_config("log-odds cutoff rule requires true_match_threshold")
                })?;
                let mut total = 0.0;
                for outcome in outcomes {
                    match outcome {
                        FeatureOutcome::Score(s) => total += s,
                        FeatureOutcome::Bool(_) => {
                            return Err(Error::internal(
                                "log-odds cutoff rule applied to a boolean matcher",
                            ))
                        }
                    }
                }
                Ok(total >= threshold)
            }
        }
    }
}

fn func_name(identifier: &str) -> Result<&str> {
    identifier
        .strip_prefix("func:")
        .and_then(|rest| rest.rsplit('.').next())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::invalid_config(format!("malformed function identifier: {identifier}")))
}

fn prefix4(s: &str) -> String {
    s.chars().take(4).collect()
}

fn any_pair(left: &[String], right: &[String], pred: impl Fn(&str, &str) -> bool) -> bool {
    left.iter().any(|a| right.iter().any(|b| pred(a, b)))
}

fn max_pair_similarity(left: &[String], right: &[String]) -> f64 {
    left.iter()
        .flat_map(|a| right.iter().map(move |b| strsim::jaro_winkler(a, b)))
        .fold(0.0_f64, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs_with_threshold(feature: Feature, threshold: f64) -> Kwargs {
        let mut k = Kwargs::default();
        k.thresholds.insert(feature, threshold);
        k
    }

    #[test]
    fn exact_match_requires_identical_value() {
        let outcome = MatcherKind::ExactMatch.compare(
            Feature::LastName,
            &Kwargs::default(),
            &["Shepard".to_string()],
            &["Shepard".to_string()],
        );
        assert!(matches!(outcome, FeatureOutcome::Bool(true)));

        let outcome = MatcherKind::ExactMatch.compare(
            Feature::LastName,
            &Kwargs::default(),
            &["Shepard".to_string()],
            &["Sheperd".to_string()],
        );
        assert!(matches!(outcome, FeatureOutcome::Bool(false)));
    }

    #[test]
    fn fuzzy_match_uses_jaro_winkler_threshold() {
        let kwargs = kwargs_with_threshold(Feature::FirstName, 0.9);
        let outcome = MatcherKind::FuzzyMatch.compare(
            Feature::FirstName,
            &kwargs,
            &["John".to_string()],
            &["Jhon".to_string()],
        );
        assert!(matches!(outcome, FeatureOutcome::Bool(true)));
    }

    #[test]
    fn fuzzy_match_without_threshold_fails_closed() {
        let outcome = MatcherKind::FuzzyMatch.compare(
            Feature::FirstName,
            &Kwargs::default(),
            &["John".to_string()],
            &["John".to_string()],
        );
        assert!(matches!(outcome, FeatureOutcome::Bool(false)));
    }

    #[test]
    fn four_char_match_compares_prefixes() {
        let outcome = MatcherKind::FourCharMatch.compare(
            Feature::LastName,
            &Kwargs::default(),
            &["Shepard".to_string()],
            &["Shepton".to_string()],
        );
        assert!(matches!(outcome, FeatureOutcome::Bool(true)));
    }

    #[test]
    fn log_odds_exact_contributes_full_weight_on_equality_only() {
        use assertables::*;

        let mut kwargs = Kwargs::default();
        kwargs.log_odds.insert(Feature::Sex, 0.75);
        let FeatureOutcome::Score(matched) = MatcherKind::LogOddsExactMatch.compare(
            Feature::Sex,
            &kwargs,
            &["M".to_string()],
            &["M".to_string()],
        ) else {
            panic!("log-odds matcher must produce a Score outcome");
        };
        assert_in_delta!(matched, 0.75, 1e-9);

        let FeatureOutcome::Score(unmatched) = MatcherKind::LogOddsExactMatch.compare(
            Feature::Sex,
            &kwargs,
            &["M".to_string()],
            &["F".to_string()],
        ) else {
            panic!("log-odds matcher must produce a Score outcome");
        };
        assert_eq!(unmatched, 0.0);
    }

    #[test]
    fn log_odds_fuzzy_scales_weight_by_best_similarity() {
        use assertables::*;

        let mut kwargs = Kwargs::default();
        kwargs.log_odds.insert(Feature::FirstName, 6.85);
        let FeatureOutcome::Score(outcome) = MatcherKind::LogOddsFuzzyMatch.compare(
            Feature::FirstName,
            &kwargs,
            &["John".to_string()],
            &["John".to_string()],
        ) else {
            panic!("log-odds matcher must produce a Score outcome");
        };
        assert_in_delta!(outcome, 6.85, 1e-9);
    }

    #[test]
    fn perfect_match_requires_every_feature_true() {
        let rule = MatchingRule::PerfectMatch;
        assert!(rule
            .evaluate(&[FeatureOutcome::Bool(true), FeatureOutcome::Bool(true)], &Kwargs::default())
            .unwrap());
        assert!(!rule
            .evaluate(&[FeatureOutcome::Bool(true), FeatureOutcome::Bool(false)], &Kwargs::default())
            .unwrap());
    }

    #[test]
    fn log_odds_cutoff_sums_scores_and_ties_count_as_match() {
        let mut kwargs = Kwargs::default();
        kwargs.true_match_threshold = Some(10.0);
        let rule = MatchingRule::LogOddsCutoff;
        assert!(rule
            .evaluate(&[FeatureOutcome::Score(6.0), FeatureOutcome::Score(4.0)], &kwargs)
            .unwrap());
        assert!(!rule
            .evaluate(&[FeatureOutcome::Score(6.0), FeatureOutcome::Score(3.9)], &kwargs)
            .unwrap());
    }

    #[test]
    fn matcher_identifiers_round_trip_through_resolve() {
        for kind in [
            MatcherKind::ExactMatch,
            MatcherKind::FuzzyMatch,
            MatcherKind::FourCharMatch,
            MatcherKind::LogOddsExactMatch,
            MatcherKind::LogOddsFuzzyMatch,
        ] {
            assert_eq!(MatcherKind::resolve(kind.identifier()).unwrap(), kind);
        }
        for rule in [MatchingRule::PerfectMatch, MatchingRule::LogOddsCutoff] {
            assert_eq!(MatchingRule::resolve(rule.identifier()).unwrap(), rule);
        }
    }
}
