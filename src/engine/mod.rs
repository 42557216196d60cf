//! Linkage engine: the multi-pass pipeline that decides whether an
//! incoming record belongs to an existing person or starts a new one.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::instrument;

use crate::algorithm::{Algorithm, BlockSpec, Pass};
use crate::error::Result;
use crate::matching::FeatureOutcome;
use crate::pii::PIIRecord;
use crate::store::{BlockFilter, CandidateRow, MpiStore};

/// Build the field→value filter map [`crate::store::MpiStore::get_block_data`]
/// needs for one pass, from the incoming record. Each blocked field
/// contributes the first value [`PIIRecord::field_iter`] returns for it
/// (multi-valued fields like names still block correctly because every
/// value a patient carries was indexed at insert time — see
/// `BlockingKey::to_values`). A pass with a blocked field the record has no
/// value for is skipped entirely: `Ok(None)`.
pub fn extract_blocking_values(
    blocks: &[BlockSpec],
    record: &PIIRecord,
) -> Result<Option<BTreeMap<crate::pii::Feature, BlockFilter>>> {
    let mut filters = BTreeMap::new();
    for block in blocks {
        let values = record.field_iter(block.field);
        let Some(first) = values.into_iter().next() else {
            return Ok(None);
        };
        filters.insert(block.field, BlockFilter { value: first });
    }
    Ok(Some(filters))
}

/// Score every candidate row in one person's group against `record` under
/// `pass`, returning the number of rows that satisfy the pass's matching
/// rule.
fn count_matching_rows(pass: &Pass, record: &PIIRecord, rows: &[&CandidateRow]) -> Result<i64> {
    let mut matches = 0;
    for row in rows {
        let mut outcomes: Vec<FeatureOutcome> = Vec::with_capacity(pass.funcs.len());
        for (feature, matcher) in &pass.funcs {
            let incoming = record.field_iter(*feature);
            let candidate = row.record.field_iter(*feature);
            outcomes.push(matcher.compare(*feature, &pass.kwargs, &incoming, &candidate));
        }
        if pass.matching_rule.evaluate(&outcomes, &pass.kwargs)? {
            matches += 1;
        }
    }
    Ok(matches)
}

/// The multi-pass record-linkage pipeline, parameterized over whatever
/// `MpiStore` backs the index. The store is an explicit constructor
/// parameter rather than a global or thread-local — callers own the
/// store's lifetime and connection pooling.
pub struct LinkageEngine<S: MpiStore> {
    store: S,
}

impl<S: MpiStore> LinkageEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide whether `raw` belongs to an existing person under
    /// `algorithm`, and persist it either way. Returns `(true, person_id)`
    /// when attached to an existing person, `(false, person_id)` when a new
    /// person was created.
    #[instrument(skip(self, raw, algorithm), fields(passes = algorithm.passes.len()))]
    pub fn link_record(&self, raw: Value, algorithm: &Algorithm) -> Result<(bool, i64)> {
        let record = PIIRecord::try_from(raw)?;

        let mut cumulative_matches: BTreeMap<i64, i64> = BTreeMap::new();
        for (index, pass) in algorithm.passes.iter().enumerate() {
            self.run_pass(index, pass, &record, &mut cumulative_matches)?;
        }

        let best_person_id = cumulative_matches
            .iter()
            .fold(None, |best: Option<(i64, i64)>, (&person_id, &count)| match best {
                None => Some((person_id, count)),
                Some((best_id, best_count)) => {
                    if count > best_count || (count == best_count && person_id < best_id) {
                        Some((person_id, count))
                    } else {
                        Some((best_id, best_count))
                    }
                }
            });

        let external_patient_id = record.external_id.clone();
        match best_person_id {
            Some((person_id, _)) => {
                let (_, _) = self
                    .store
                    .link_patient(Some(person_id), &record, external_patient_id, None, None)?;
                Ok((true, person_id))
            }
            None => {
                let (person, _) = self.store.link_patient(None, &record, external_patient_id, None, None)?;
                Ok((false, person.id))
            }
        }
    }

    #[instrument(skip(self, pass, record, cumulative_matches), fields(pass = index))]
    fn run_pass(
        &self,
        index: usize,
        pass: &Pass,
        record: &PIIRecord,
        cumulative_matches: &mut BTreeMap<i64, i64>,
    ) -> Result<()> {
        let Some(filters) = extract_blocking_values(&pass.blocks, record)? else {
            tracing::debug!(pass = index, "skipping pass: a blocked field has no value");
            return Ok(());
        };

        let candidates = self.store.get_block_data(&filters)?;
        let mut groups: BTreeMap<i64, Vec<&CandidateRow>> = BTreeMap::new();
        for candidate in &candidates {
            groups.entry(candidate.person_id).or_default().push(candidate);
        }

        for (person_id, rows) in groups {
            let matches = count_matching_rows(pass, record, &rows)?;
            let ratio = matches as f64 / rows.len() as f64;
            if ratio >= pass.cluster_ratio {
                *cumulative_matches.entry(person_id).or_insert(0) += matches;
            }
        }
        Ok(())
    }
}
