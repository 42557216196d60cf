//! In-process `MpiStore` backed by a single mutex. Sufficient for the
//! "thread-safe for distinct concurrent ingests" contract without an async
//! runtime; used by the engine's own tests and the linkage seed scenarios
//! that don't need a live Postgres instance.

use std::collections::BTreeMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::blocking::blocking_key_for_feature;
use crate::error::{Error, Result};
use crate::pii::{Feature, PIIRecord};

use super::{scrub, BlockFilter, BlockingValue, CandidateRow, MpiStore, Patient, Person};

#[derive(Default)]
struct State {
    persons: Vec<Person>,
    patients: Vec<Patient>,
    blocking_values: Vec<BlockingValue>,
    next_person_id: i64,
    next_patient_id: i64,
    next_blocking_value_id: i64,
}

/// An in-memory `MpiStore`. Not meant for production: there is no
/// durability and every table is scanned linearly, which is fine at test
/// scale and nowhere else.
#[derive(Default)]
pub struct InMemoryMpiStore {
    state: Mutex<State>,
}

impl InMemoryMpiStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn derive_blocking_values(patient_id: i64, record: &PIIRecord, next_id: &mut i64) -> Result<Vec<BlockingValue>> {
        let mut out = Vec::new();
        for key in crate::blocking::BlockingKey::ALL {
            for value in key.to_values(record)? {
                let id = *next_id;
                *next_id += 1;
                out.push(BlockingValue { id, patient_id, blockingkey: key, value });
            }
        }
        Ok(out)
    }
}

impl MpiStore for InMemoryMpiStore {
    fn insert_person(&self) -> Result<Person> {
        let mut state = self.state.lock().map_err(|_| Error::internal("store mutex poisoned"))?;
        let id = state.next_person_id;
        state.next_person_id += 1;
        let person = Person { id, internal_id: Uuid::new_v4() };
        state.persons.push(person.clone());
        Ok(person)
    }

    fn insert_patient(
        &self,
        person_id: i64,
        record: &PIIRecord,
        external_patient_id: Option<String>,
        external_person_id: Option<String>,
        external_person_source: Option<String>,
    ) -> Result<Patient> {
        let mut state = self.state.lock().map_err(|_| Error::internal("store mutex poisoned"))?;
        let id = state.next_patient_id;
        state.next_patient_id += 1;

        let scrubbed = serde_json::from_value(scrub(serde_json::to_value(record).map_err(|e| {
            Error::internal(format!("failed to serialize record: {e}"))
        })?))
        .map_err(|e| Error::internal(format!("failed to round-trip scrubbed record: {e}")))?;

        let patient = Patient {
            id,
            person_id,
            record: scrubbed,
            external_patient_id,
            external_person_id,
            external_person_source,
        };
        state.patients.push(patient.clone());

        let mut next_blocking_value_id = state.next_blocking_value_id;
        let values = Self::derive_blocking_values(id, &patient.record, &mut next_blocking_value_id)?;
        state.next_blocking_value_id = next_blocking_value_id;
        state.blocking_values.extend(values);

        Ok(patient)
    }

    fn select_person_by_id(&self, id: i64) -> Result<Option<Person>> {
        let state = self.state.lock().map_err(|_| Error::internal("store mutex poisoned"))?;
        Ok(state.persons.iter().find(|p| p.id == id).cloned())
    }

    fn select_patient_by_id(&self, id: i64) -> Result<Option<Patient>> {
        let state = self.state.lock().map_err(|_| Error::internal("store mutex poisoned"))?;
        Ok(state.patients.iter().find(|p| p.id == id).cloned())
    }

    fn patients_for_person(&self, person_id: i64) -> Result<Vec<Patient>> {
        let state = self.state.lock().map_err(|_| Error::internal("store mutex poisoned"))?;
        Ok(state.patients.iter().filter(|p| p.person_id == person_id).cloned().collect())
    }

    fn get_block_data(&self, filters: &BTreeMap<Feature, BlockFilter>) -> Result<Vec<CandidateRow>> {
        let state = self.state.lock().map_err(|_| Error::internal("store mutex poisoned"))?;

        let mut matching_patient_ids: Option<Vec<i64>> = None;
        for (feature, filter) in filters {
            let key = blocking_key_for_feature(*feature).ok_or_else(|| {
                Error::invalid_config(format!("{} is not a supported blocking field", feature.name()))
            })?;
            let derived = key.derive_single(&filter.value);
            let ids: Vec<i64> = state
                .blocking_values
                .iter()
                .filter(|bv| bv.blockingkey == key && bv.value == derived)
                .map(|bv| bv.patient_id)
                .collect();
            matching_patient_ids = Some(match matching_patient_ids {
                None => ids,
                Some(prev) => prev.into_iter().filter(|id| ids.contains(id)).collect(),
            });
        }

        let ids = matching_patient_ids.unwrap_or_default();
        Ok(state
            .patients
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| CandidateRow {
                patient_id: p.id,
                person_id: p.person_id,
                record: p.record.clone(),
            })
            .collect())
    }

    fn link_patient(
        &self,
        person_id: Option<i64>,
        record: &PIIRecord,
        external_patient_id: Option<String>,
        external_person_id: Option<String>,
        external_person_source: Option<String>,
    ) -> Result<(Person, Patient)> {
        let person = match person_id {
            Some(id) => self
                .select_person_by_id(id)?
                .ok_or_else(|| Error::internal(format!("person {id} does not exist")))?,
            None => self.insert_person()?,
        };
        let patient = self.insert_patient(
            person.id,
            record,
            external_patient_id,
            external_person_id,
            external_person_source,
        )?;
        Ok((person, patient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::TryFrom;

    #[test]
    fn link_patient_creates_a_person_when_none_given() {
        let store = InMemoryMpiStore::new();
        let record = PIIRecord::try_from(json!({"mrn": "123456"})).unwrap();
        let (person, patient) = store.link_patient(None, &record, None, None, None).unwrap();
        assert_eq!(patient.person_id, person.id);
    }

    #[test]
    fn get_block_data_finds_patient_by_either_blocked_last_name() {
        let store = InMemoryMpiStore::new();
        let record = PIIRecord::try_from(json!({
            "name": [{"family": "Vas Neema"}, {"family": "Nar Raya"}],
        }))
        .unwrap();
        store.link_patient(None, &record, None, None, None).unwrap();

        let mut filter_a = BTreeMap::new();
        filter_a.insert(Feature::LastName, BlockFilter { value: "Vas Neema".to_string() });
        let mut filter_b = BTreeMap::new();
        filter_b.insert(Feature::LastName, BlockFilter { value: "Nar Raya".to_string() });

        let found_a = store.get_block_data(&filter_a).unwrap();
        let found_b = store.get_block_data(&filter_b).unwrap();
        assert_eq!(found_a.len(), 1);
        assert_eq!(found_a[0].patient_id, found_b[0].patient_id);
    }

    #[test]
    fn get_block_data_requires_every_filter_to_match() {
        let store = InMemoryMpiStore::new();
        let record = PIIRecord::try_from(json!({"sex": "F", "mrn": "1234567"})).unwrap();
        store.link_patient(None, &record, None, None, None).unwrap();

        let mut filters = BTreeMap::new();
        filters.insert(Feature::Sex, BlockFilter { value: "F".to_string() });
        filters.insert(Feature::Mrn, BlockFilter { value: "9999999".to_string() });
        assert!(store.get_block_data(&filters).unwrap().is_empty());
    }
}
