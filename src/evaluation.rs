//! Linkage-quality scoring against a gold-standard clustering.
//!
//! Not part of the linkage pipeline itself — `link_record` never calls
//! into this module. It exists for callers that already hold a predicted
//! clustering and a ground truth (an offline algorithm-tuning job, a test
//! suite validating a config change) and want sensitivity/specificity/PPV/F1
//! over it. The unit of comparison is the unordered pair: every two records
//! predicted to be (or truly are) the same person count as one link.

use std::collections::{HashMap, HashSet};

/// Sensitivity, specificity, PPV, and F1 of a predicted clustering against
/// a ground-truth one, computed over every unordered pair of record ids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkageScore {
    pub sensitivity: f64,
    pub specificity: f64,
    pub ppv: f64,
    pub f1: f64,
}

/// Score `matches` against `true_matches`, pairwise, over `num_records`
/// total records. Both maps declare links as `record_id -> {other record
/// ids it's linked to}`; a link need only be declared once, under either
/// endpoint's key.
pub fn score_linkage_vs_truth(
    matches: &HashMap<i64, HashSet<i64>>,
    true_matches: &HashMap<i64, HashSet<i64>>,
    num_records: i64,
) -> LinkageScore {
    score_linkage_vs_truth_with_mode(matches, true_matches, num_records, false)
}

/// As [`score_linkage_vs_truth`], but when `cluster_mode` is set each key in
/// `matches` names a whole cluster (`key` plus every value in its set are
/// all mutually linked), rather than `key` being linked only to each
/// individual value. `true_matches` is always interpreted pairwise.
pub fn score_linkage_vs_truth_with_mode(
    matches: &HashMap<i64, HashSet<i64>>,
    true_matches: &HashMap<i64, HashSet<i64>>,
    num_records: i64,
    cluster_mode: bool,
) -> LinkageScore {
    let predicted_pairs = expand_pairs(matches, cluster_mode);
    let true_pairs = expand_pairs(true_matches, false);

    let total_pairs = num_records * (num_records - 1) / 2;
    let true_positive = predicted_pairs.intersection(&true_pairs).count() as i64;
    let false_positive = predicted_pairs.len() as i64 - true_positive;
    let false_negative = true_pairs.len() as i64 - true_positive;
    let true_negative = total_pairs - true_positive - false_positive - false_negative;

    let sensitivity = ratio(true_positive, true_positive + false_negative);
    let specificity = ratio(true_negative, true_negative + false_positive);
    let ppv = ratio(true_positive, true_positive + false_positive);
    let f1 = if ppv + sensitivity > 0.0 {
        2.0 * ppv * sensitivity / (ppv + sensitivity)
    } else {
        0.0
    };

    LinkageScore {
        sensitivity: round3(sensitivity),
        specificity: round3(specificity),
        ppv: round3(ppv),
        f1: round3(f1),
    }
}

fn ratio(numerator: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn expand_pairs(input: &HashMap<i64, HashSet<i64>>, cluster_mode: bool) -> HashSet<(i64, i64)> {
    let mut pairs = HashSet::new();
    for (&key, values) in input {
        if cluster_mode {
            let mut members: Vec<i64> = values.iter().copied().collect();
            members.push(key);
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    pairs.insert(normalize(members[i], members[j]));
                }
            }
        } else {
            for &value in values {
                pairs.insert(normalize(key, value));
            }
        }
    }
    pairs
}

fn normalize(a: i64, b: i64) -> (i64, i64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (HashMap<i64, HashSet<i64>>, HashMap<i64, HashSet<i64>>) {
        let matches = HashMap::from([
            (1, HashSet::from([5, 11, 12, 13])),
            (5, HashSet::from([11, 12, 13])),
            (11, HashSet::from([12, 13])),
            (12, HashSet::from([13])),
            (23, HashSet::from([24, 31, 32])),
            (24, HashSet::from([31, 32])),
            (31, HashSet::from([32])),
        ]);
        let true_matches = HashMap::from([
            (1, HashSet::from([5, 11, 12])),
            (5, HashSet::from([11, 12])),
            (11, HashSet::from([12])),
            (23, HashSet::from([24, 31, 32])),
            (24, HashSet::from([31, 32])),
            (31, HashSet::from([32])),
        ]);
        (matches, true_matches)
    }

    #[test]
    fn scores_pairwise_matches_against_truth() {
        let (matches, true_matches) = sample();
        let score = score_linkage_vs_truth(&matches, &true_matches, 12);
        assert_eq!(score.sensitivity, 1.0);
        assert_eq!(score.specificity, 0.926);
        assert_eq!(score.ppv, 0.75);
        assert_eq!(score.f1, 0.857);
    }

    #[test]
    fn cluster_mode_produces_the_same_score_as_the_fully_expanded_pairs() {
        let (_, true_matches) = sample();
        let cluster_matches = HashMap::from([
            (1, HashSet::from([5, 11, 12, 13])),
            (23, HashSet::from([24, 31, 32])),
        ]);
        let score = score_linkage_vs_truth_with_mode(&cluster_matches, &true_matches, 12, true);
        assert_eq!(score.sensitivity, 1.0);
        assert_eq!(score.specificity, 0.926);
        assert_eq!(score.ppv, 0.75);
        assert_eq!(score.f1, 0.857);
    }
}
